// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Rate engine for the boot-programmed HiSTB PLLs.
//!
//! Each PLL occupies two consecutive configuration words. The output rate
//! is `parent * fbdiv / (refdiv * postdiv1 * postdiv2)`; the fractional
//! divisor is never used and is cleared on the first prepare. The boot
//! loader is responsible for bringing the PLLs up; a PLL whose divisors
//! read back as zero is reported as uninitialised rather than cold-started
//! here.

use core::cell::Cell;

use log::error;
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::error::ErrorCode;
use crate::mmio::Mmio;

register_bitfields![u32,
    /// PLL configuration word 0.
    pub PLL_CFG0 [
        /// Fractional divisor, unused and forced to zero.
        FRAC OFFSET(0) NUMBITS(24) [],
        POSTDIV1 OFFSET(24) NUMBITS(3) [],
        POSTDIV2 OFFSET(28) NUMBITS(3) []
    ],
    /// PLL configuration word 1.
    pub PLL_CFG1 [
        FBDIV OFFSET(0) NUMBITS(12) [],
        REFDIV OFFSET(12) NUMBITS(6) [],
        /// Whole-PLL power down.
        PD OFFSET(20) NUMBITS(1) [],
        /// VCO output power down.
        FOUTVCOPD OFFSET(21) NUMBITS(1) [],
        /// Four-phase output power down.
        FOUT4PHASEPD OFFSET(22) NUMBITS(1) [],
        /// Post-divider output power down.
        FOUTPOSTDIVPD OFFSET(23) NUMBITS(1) [],
        /// DAC power down.
        DACPD OFFSET(24) NUMBITS(1) [],
        /// Delta-sigma modulator power down.
        DSMPD OFFSET(25) NUMBITS(1) [],
        BYPASS OFFSET(26) NUMBITS(1) []
    ]
];

/// Lowest legal VCO rate.
pub const PLL_VCO_MIN_RATE: u64 = 800_000_000;

/// Highest VCO rate the driver will ask for.
///
/// The datasheet stops at 3.2 GHz, but the silicon has been driven far
/// beyond that; keep the measured margin and tighten it here if a later
/// characterization says otherwise.
pub const PLL_VCO_MAX_RATE: u64 = 8_000_000_000;

type Cfg0 = LocalRegisterCopy<u32, PLL_CFG0::Register>;
type Cfg1 = LocalRegisterCopy<u32, PLL_CFG1::Register>;

/// One PLL's rate engine.
///
/// The post- and reference divisors are latched from the live registers on
/// the first [`Pll::prepare`] and cached; only the feedback divisor is
/// ever reprogrammed afterwards.
pub struct Pll {
    mmio: Mmio,
    offset: usize,
    postdiv1: Cell<u32>,
    postdiv2: Cell<u32>,
    refdiv: Cell<u32>,
    divisor: Cell<u32>,
}

impl Pll {
    pub fn new(mmio: Mmio, offset: usize) -> Pll {
        Pll {
            mmio,
            offset,
            postdiv1: Cell::new(0),
            postdiv2: Cell::new(0),
            refdiv: Cell::new(0),
            divisor: Cell::new(0),
        }
    }

    fn cfg0(&self) -> Cfg0 {
        LocalRegisterCopy::new(self.mmio.read(self.offset))
    }

    fn cfg1(&self) -> Cfg1 {
        LocalRegisterCopy::new(self.mmio.read(self.offset + 4))
    }

    /// Latch the boot-time divisor programming and clear the fractional
    /// field.
    ///
    /// Fails with [`ErrorCode::Uninit`] when any latched divisor is zero,
    /// which means the boot loader never brought this PLL up.
    pub fn prepare(&self) -> Result<(), ErrorCode> {
        let mut cfg0 = self.cfg0();
        self.postdiv1.set(cfg0.read(PLL_CFG0::POSTDIV1));
        self.postdiv2.set(cfg0.read(PLL_CFG0::POSTDIV2));
        cfg0.modify(PLL_CFG0::FRAC.val(0));
        self.mmio.write(self.offset, cfg0.get());

        self.refdiv.set(self.cfg1().read(PLL_CFG1::REFDIV));

        let divisor = self.refdiv.get() * self.postdiv1.get() * self.postdiv2.get();
        self.divisor.set(divisor);
        if divisor == 0 {
            error!(
                "PLL at {:#x} was not initialized by the boot loader",
                self.offset
            );
            return Err(ErrorCode::Uninit);
        }
        Ok(())
    }

    fn divisor(&self) -> Result<u64, ErrorCode> {
        match self.divisor.get() {
            0 => Err(ErrorCode::Uninit),
            divisor => Ok(divisor as u64),
        }
    }

    /// Current output rate for the given parent rate, truncating.
    pub fn recalc_rate(&self, parent_rate: u64) -> Result<u64, ErrorCode> {
        let divisor = self.divisor()?;
        let fbdiv = self.cfg1().read(PLL_CFG1::FBDIV) as u64;
        Ok((parent_rate as u128 * fbdiv as u128 / divisor as u128) as u64)
    }

    /// Closest achievable rate to `rate`: the VCO runs on a multiple of
    /// the divided reference and must stay inside its legal band.
    pub fn determine_rate(&self, rate: u64, parent_rate: u64) -> Result<u64, ErrorCode> {
        self.divisor()?;
        if parent_rate == 0 {
            return Err(ErrorCode::Inval);
        }
        let ref_rate = parent_rate / self.refdiv.get() as u64;
        if ref_rate == 0 {
            return Err(ErrorCode::Inval);
        }
        let postdiv = (self.postdiv1.get() * self.postdiv2.get()) as u64;

        let target = (rate as u128 * postdiv as u128)
            .clamp(PLL_VCO_MIN_RATE as u128, PLL_VCO_MAX_RATE as u128) as u64;
        let mut vco = target - target % ref_rate;
        if vco < PLL_VCO_MIN_RATE {
            vco += ref_rate;
        }

        Ok(vco / postdiv)
    }

    /// Program the feedback divisor for `rate`, preserving every other bit
    /// of the configuration word.
    pub fn set_rate(&self, rate: u64, parent_rate: u64) -> Result<(), ErrorCode> {
        let divisor = self.divisor()?;
        if parent_rate == 0 {
            return Err(ErrorCode::Inval);
        }
        let fbdiv = (rate as u128 * divisor as u128 / parent_rate as u128) as u32;

        let mut cfg1 = self.cfg1();
        cfg1.modify(PLL_CFG1::FBDIV.val(fbdiv));
        self.mmio.write(self.offset + 4, cfg1.get());

        // Whether the hardware wants a lock wait after reprogramming has
        // never been observed; none is done.
        Ok(())
    }
}
