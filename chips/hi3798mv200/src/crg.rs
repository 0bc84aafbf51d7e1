// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Hi3798MV200 clock and reset generator instances.
//!
//! Two controllers feed the clock registry: the core CRG carrying the
//! PLLs, bus/peripheral muxes, gates and the MMC/SDIO phase taps, and the
//! sysctrl block carrying the always-on low-power clocks. The phase and
//! PLL sets are registered device-scoped (their teardown rides on the
//! controller's release); fixed-rate, mux and gate sets are unwound by
//! the explicit rollback chain of the probe that registered them.

use histb::clk::{
    flags, ClockData, ClockRegistry, ClockSet, FixedRateClock, GateClock, MuxClock, PhaseClock,
    PllClock,
};
use histb::devres::Device;
use histb::error::ErrorCode;
use histb::mmio::Mmio;

use crate::bindings::{crg, sysctrl};

pub const CRG_COMPATIBLE: &str = "hisilicon,hi3798mv200-crg";
pub const SYSCTRL_COMPATIBLE: &str = "hisilicon,hi3798mv200-sysctrl";

const fn fixed(index: usize, name: &'static str, rate: u64) -> FixedRateClock {
    FixedRateClock {
        index,
        name,
        flags: 0,
        rate,
    }
}

const fn pll(index: usize, name: &'static str, offset: usize) -> PllClock {
    PllClock {
        index,
        name,
        parent: "clk_osc",
        flags: flags::IS_CRITICAL,
        offset,
    }
}

const fn mux(
    index: usize,
    name: &'static str,
    parents: &'static [&'static str],
    flags: u32,
    offset: usize,
    shift: u32,
    width: u32,
    round_closest: bool,
    table: &'static [u32],
) -> MuxClock {
    MuxClock {
        index,
        name,
        parents,
        flags,
        offset,
        shift,
        width,
        round_closest,
        table,
    }
}

const fn gate(
    index: usize,
    name: &'static str,
    parent: &'static str,
    offset: usize,
    bit: u32,
) -> GateClock {
    GateClock {
        index,
        name,
        parent: Some(parent),
        flags: flags::SET_RATE_PARENT,
        offset,
        bit,
    }
}

const fn gate_root(index: usize, name: &'static str, offset: usize, bit: u32) -> GateClock {
    GateClock {
        index,
        name,
        parent: None,
        flags: flags::SET_RATE_PARENT,
        offset,
        bit,
    }
}

const fn phase(
    index: usize,
    name: &'static str,
    parent: &'static str,
    offset: usize,
    shift: u32,
    degrees: &'static [u32],
    regvals: &'static [u32],
) -> PhaseClock {
    PhaseClock {
        index,
        name,
        parent,
        flags: 0,
        offset,
        shift,
        width: 3,
        degrees,
        regvals,
    }
}

static FIXED_RATE_CLKS: [FixedRateClock; 22] = [
    fixed(crg::OSC_CLK, "clk_osc", 24_000_000),
    fixed(crg::APB_CLK, "clk_apb", 100_000_000),
    fixed(crg::AHB_CLK, "clk_ahb", 200_000_000),
    fixed(crg::FIXED_3M, "3m", 3_000_000),
    fixed(crg::FIXED_12M, "12m", 12_000_000),
    fixed(crg::FIXED_24M, "24m", 24_000_000),
    fixed(crg::FIXED_25M, "25m", 25_000_000),
    fixed(crg::FIXED_27M, "27m", 27_000_000),
    fixed(crg::FIXED_48M, "48m", 48_000_000),
    fixed(crg::FIXED_50M, "50m", 50_000_000),
    fixed(crg::FIXED_54M, "54m", 54_000_000),
    fixed(crg::FIXED_60M, "60m", 60_000_000),
    fixed(crg::FIXED_75M, "75m", 75_000_000),
    fixed(crg::FIXED_100M, "100m", 100_000_000),
    fixed(crg::FIXED_125M, "125m", 125_000_000),
    fixed(crg::FIXED_150M, "150m", 150_000_000),
    fixed(crg::FIXED_200M, "200m", 200_000_000),
    fixed(crg::FIXED_400M, "400m", 400_000_000),
    fixed(crg::FIXED_600M, "600m", 600_000_000),
    fixed(crg::FIXED_800M, "800m", 800_000_000),
    fixed(crg::FIXED_1200M, "1200m", 1_200_000_000),
    fixed(crg::FIXED_1350M, "1350m", 1_350_000_000),
];

static SDIO_MUX_PARENTS: [&str; 4] = ["100m", "50m", "150m", "25m"];
static SDIO_MUX_TABLE: [u32; 4] = [0, 1, 2, 3];

static MMC_MUX_PARENTS: [&str; 5] = ["100m", "50m", "25m", "200m", "150m"];
static MMC_MUX_TABLE: [u32; 5] = [0, 1, 2, 3, 6];

static CPU_MUX_PARENTS: [&str; 8] = [
    "apll", "200m", "800m", "1350m", "24m", "1200m", "400m", "600m",
];
static CPU_MUX_TABLE: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

static COMBPHY_MUX_PARENTS: [&str; 2] = ["25m", "100m"];
static FEMAC_MUX_PARENTS: [&str; 2] = ["54m", "27m"];
static GMAC_MUX_PARENTS: [&str; 2] = ["125m", "75m"];
static EXT_NETPHY_MUX_PARENTS: [&str; 2] = ["25m", "50m"];
static MDE1_BUS_MUX_PARENTS: [&str; 2] = ["24m", "200m"];
static MDE3_BUS_MUX_PARENTS: [&str; 2] = ["24m", "400m"];
static MUX_TABLE_1BIT: [u32; 2] = [0, 1];

static CORE_BUS_MUX_PARENTS: [&str; 3] = ["24m", "200m", "250m"];
static MDE0_BUS_MUX_PARENTS: [&str; 3] = ["24m", "300m", "400m"];
static MDE2_BUS_MUX_PARENTS: [&str; 3] = ["24m", "400m", "450m"];
static MUX_TABLE_2BIT: [u32; 3] = [0, 1, 2];

static MUX_CLKS: [MuxClock; 13] = [
    mux(
        crg::CORE_BUS_CLK,
        "clk_core_bus",
        &CORE_BUS_MUX_PARENTS,
        0,
        0x58,
        0,
        2,
        false,
        &MUX_TABLE_2BIT,
    ),
    mux(
        crg::MDE0_BUS_CLK,
        "clk_mde0_bus",
        &MDE0_BUS_MUX_PARENTS,
        0,
        0x58,
        2,
        2,
        false,
        &MUX_TABLE_2BIT,
    ),
    mux(
        crg::MDE1_BUS_CLK,
        "clk_mde1_bus",
        &MDE1_BUS_MUX_PARENTS,
        0,
        0x58,
        4,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        crg::MDE2_BUS_CLK,
        "clk_mde2_bus",
        &MDE2_BUS_MUX_PARENTS,
        0,
        0x58,
        8,
        2,
        false,
        &MUX_TABLE_2BIT,
    ),
    mux(
        crg::MDE3_BUS_CLK,
        "clk_mde3_bus",
        &MDE3_BUS_MUX_PARENTS,
        0,
        0x58,
        10,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        crg::CPU_CLK,
        "clk_cpu",
        &CPU_MUX_PARENTS,
        flags::SET_RATE_PARENT,
        0x48,
        0,
        3,
        true,
        &CPU_MUX_TABLE,
    ),
    mux(
        crg::MMC_MUX,
        "mmc_mux",
        &MMC_MUX_PARENTS,
        0,
        0xa0,
        8,
        3,
        true,
        &MMC_MUX_TABLE,
    ),
    mux(
        crg::COMBPHY_MUX,
        "combphy_mux",
        &COMBPHY_MUX_PARENTS,
        0,
        0x188,
        3,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        crg::SDIO0_MUX,
        "sdio0_mux",
        &SDIO_MUX_PARENTS,
        0,
        0x9c,
        8,
        2,
        true,
        &SDIO_MUX_TABLE,
    ),
    mux(
        crg::SDIO1_MUX,
        "sdio1_mux",
        &SDIO_MUX_PARENTS,
        0,
        0x28c,
        8,
        2,
        true,
        &SDIO_MUX_TABLE,
    ),
    mux(
        crg::FEMAC_MUX,
        "femac_mux",
        &FEMAC_MUX_PARENTS,
        0,
        0xd0,
        2,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        crg::GMAC_MUX,
        "gmac_mux",
        &GMAC_MUX_PARENTS,
        0,
        0xcc,
        7,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        crg::EXT_NETPHY_CLK,
        "ext_netphy_mux",
        &EXT_NETPHY_MUX_PARENTS,
        0,
        0xcc,
        6,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
];

static MMC_PHASE_DEGREES: [u32; 8] = [0, 45, 90, 135, 180, 225, 270, 315];
static MMC_PHASE_REGVALS: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

static PHASE_CLKS: [PhaseClock; 6] = [
    phase(crg::SDIO0_SAMPLE_CLK, "sdio0_sample", "clk_sdio0_ciu", 0x9c, 12,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
    phase(crg::SDIO0_DRV_CLK, "sdio0_drive", "clk_sdio0_ciu", 0x9c, 16,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
    phase(crg::SDIO1_SAMPLE_CLK, "sdio1_sample", "clk_sdio1_ciu", 0x28c, 12,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
    phase(crg::SDIO1_DRV_CLK, "sdio1_drive", "clk_sdio1_ciu", 0x28c, 16,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
    phase(crg::MMC_SAMPLE_CLK, "mmc_sample", "clk_mmc_ciu", 0xa0, 12,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
    phase(crg::MMC_DRV_CLK, "mmc_drive", "clk_mmc_ciu", 0xa0, 16,
        &MMC_PHASE_DEGREES, &MMC_PHASE_REGVALS),
];

static GATE_CLKS: [GateClock; 37] = [
    // UART
    gate(crg::UART2_CLK, "clk_uart2", "75m", 0x68, 4),
    gate(crg::UART3_CLK, "clk_uart3", "75m", 0x68, 6),
    // I2C
    gate(crg::I2C0_CLK, "clk_i2c0", "clk_apb", 0x6c, 4),
    gate(crg::I2C1_CLK, "clk_i2c1", "clk_apb", 0x6c, 8),
    gate(crg::I2C2_CLK, "clk_i2c2", "clk_apb", 0x6c, 12),
    // SPI
    gate(crg::SPI0_CLK, "clk_spi0", "clk_apb", 0x70, 0),
    // SCI
    gate(crg::SCI0_CLK, "clk_sci0", "clk_apb", 0x74, 0),
    gate(crg::SCI1_CLK, "clk_sci1", "clk_apb", 0x74, 2),
    // SDIO
    gate(crg::SDIO0_BIU_CLK, "clk_sdio0_biu", "clk_ahb", 0x9c, 0),
    gate(crg::SDIO0_CIU_CLK, "clk_sdio0_ciu", "sdio0_mux", 0x9c, 1),
    gate(crg::SDIO1_BIU_CLK, "clk_sdio1_biu", "clk_ahb", 0x28c, 0),
    gate(crg::SDIO1_CIU_CLK, "clk_sdio1_ciu", "sdio1_mux", 0x28c, 1),
    // EMMC
    gate(crg::MMC_BIU_CLK, "clk_mmc_biu", "clk_ahb", 0xa0, 0),
    gate(crg::MMC_CIU_CLK, "clk_mmc_ciu", "mmc_mux", 0xa0, 1),
    // Ethernet
    gate(crg::GMAC_CLK, "clk_gmac", "gmac_mux", 0xcc, 2),
    gate(crg::GSF_CLK, "clk_gmacif", "clk_ahb", 0xcc, 0),
    gate(crg::ETH_CLK, "clk_femac", "femac_mux", 0xd0, 1),
    gate(crg::ETH_BUS_CLK, "clk_femacif", "clk_ahb", 0xd0, 0),
    gate(crg::FEPHY_CLK, "clk_fephy", "25m", 0x388, 0),
    // COMBPHY
    gate(crg::COMBPHY_CLK, "clk_combphy", "combphy_mux", 0x188, 0),
    // USB2
    gate(crg::USB2_BUS_CLK, "clk_u2_bus", "clk_ahb", 0xb8, 0),
    gate(crg::USB2_HST_PHY_CLK, "clk_u2_phy", "60m", 0xb8, 4),
    gate(crg::USB2_12M_CLK, "clk_u2_12m", "12m", 0xb8, 2),
    gate(crg::USB2_48M_CLK, "clk_u2_48m", "48m", 0xb8, 1),
    gate(crg::USB2_UTMI0_CLK, "clk_u2_utmi0", "60m", 0xb8, 5),
    gate(crg::USB2_UTMI1_CLK, "clk_u2_utmi1", "60m", 0xb8, 6),
    gate(crg::USB2_OTG_UTMI_CLK, "clk_u2_otg_utmi", "60m", 0xb8, 3),
    gate(crg::USB2_PHY1_REF_CLK, "clk_u2_phy1_ref", "24m", 0xbc, 0),
    gate(crg::USB2_PHY2_REF_CLK, "clk_u2_phy2_ref", "24m", 0xbc, 2),
    // USB3 bus
    gate(crg::USB3_GM_CLK, "clk_u3_gm", "clk_ahb", 0xb0, 6),
    gate(crg::USB3_GS_CLK, "clk_u3_gs", "clk_ahb", 0xb0, 5),
    gate(crg::USB3_BUS_CLK, "clk_u3_bus", "clk_ahb", 0xb0, 0),
    // USB3 ctrl; suspend and pipe clocks are fed from outside the CRG
    gate_root(crg::USB3_SUSPEND_CLK, "clk_u3_suspend", 0xb0, 2),
    gate_root(crg::USB3_PIPE_CLK, "clk_u3_pipe", 0xb0, 3),
    gate(crg::USB3_REF_CLK, "clk_u3_ref", "125m", 0xb0, 1),
    gate(crg::USB3_UTMI_CLK, "clk_u3_utmi", "60m", 0xb0, 4),
    // Watchdog
    gate(crg::WDG0_CLK, "clk_wdg0", "clk_osc", 0x178, 0),
];

static PLL_CLKS: [PllClock; 7] = [
    pll(crg::APLL_CLK, "apll", 0x0),
    pll(crg::BPLL_CLK, "bpll", 0x8),
    pll(crg::DPLL_CLK, "dpll", 0x10),
    pll(crg::VPLL_CLK, "vpll", 0x20),
    pll(crg::HPLL_CLK, "hpll", 0x28),
    pll(crg::EPLL_CLK, "epll", 0x30),
    pll(crg::QPLL_CLK, "qpll", 0x38),
];

/// The probed core CRG instance.
pub struct Crg {
    data: ClockData<{ crg::NR_CLKS }>,
    device: Device,
}

impl Crg {
    /// Register the instance's whole tree and publish it.
    ///
    /// On any failure every registration this probe made is gone again
    /// before the error is returned: the fixed-rate/mux/gate chain is
    /// rolled back step by step, the device-scoped phase and PLL sets by
    /// the device release.
    pub fn probe<const CAP: usize>(
        registry: &mut ClockRegistry<CAP>,
        mmio: Mmio,
    ) -> Result<Crg, ErrorCode> {
        let mut instance = Crg {
            data: ClockData::new(mmio),
            device: Device::new(),
        };
        match Crg::register_clocks(registry, &mut instance) {
            Ok(()) => Ok(instance),
            Err(e) => {
                instance.device.release(registry, &mut instance.data);
                Err(e)
            }
        }
    }

    fn register_clocks<const CAP: usize>(
        registry: &mut ClockRegistry<CAP>,
        instance: &mut Crg,
    ) -> Result<(), ErrorCode> {
        let data = &mut instance.data;

        instance
            .device
            .register_scoped(registry, ClockSet::Phase(&PHASE_CLKS), data)?;
        instance
            .device
            .register_scoped(registry, ClockSet::Pll(&PLL_CLKS), data)?;

        registry.register_clocks(ClockSet::FixedRate(&FIXED_RATE_CLKS), data)?;

        if let Err(e) = registry.register_clocks(ClockSet::Mux(&MUX_CLKS), data) {
            registry.unregister_clocks(ClockSet::FixedRate(&FIXED_RATE_CLKS), data);
            return Err(e);
        }

        if let Err(e) = registry.register_clocks(ClockSet::Gate(&GATE_CLKS), data) {
            registry.unregister_clocks(ClockSet::Mux(&MUX_CLKS), data);
            registry.unregister_clocks(ClockSet::FixedRate(&FIXED_RATE_CLKS), data);
            return Err(e);
        }

        if let Err(e) = registry.add_provider(CRG_COMPATIBLE) {
            registry.unregister_clocks(ClockSet::Gate(&GATE_CLKS), data);
            registry.unregister_clocks(ClockSet::Mux(&MUX_CLKS), data);
            registry.unregister_clocks(ClockSet::FixedRate(&FIXED_RATE_CLKS), data);
            return Err(e);
        }

        Ok(())
    }

    /// Unpublish and unregister the instance, newest set first.
    pub fn remove<const CAP: usize>(mut self, registry: &mut ClockRegistry<CAP>) {
        registry.del_provider(CRG_COMPATIBLE);
        registry.unregister_clocks(ClockSet::Gate(&GATE_CLKS), &mut self.data);
        registry.unregister_clocks(ClockSet::Mux(&MUX_CLKS), &mut self.data);
        registry.unregister_clocks(ClockSet::FixedRate(&FIXED_RATE_CLKS), &mut self.data);
        self.device.release(registry, &mut self.data);
    }

    /// The publication block consumers resolve indices through.
    pub fn clock_data(&self) -> &ClockData<{ crg::NR_CLKS }> {
        &self.data
    }
}

static UART0_MUX_PARENTS: [&str; 2] = ["3m", "75m"];
static MCU_BUS_MUX_PARENTS: [&str; 3] = ["24m", "200m", "6m"];

static SYSCTRL_MUX_CLKS: [MuxClock; 2] = [
    mux(
        sysctrl::UART0_MUX,
        "uart0_mux",
        &UART0_MUX_PARENTS,
        flags::SET_RATE_PARENT,
        0x48,
        29,
        1,
        false,
        &MUX_TABLE_1BIT,
    ),
    mux(
        sysctrl::MCU_BUS_CLK,
        "mcu_bus_mux",
        &MCU_BUS_MUX_PARENTS,
        flags::SET_RATE_PARENT,
        0x0,
        0,
        2,
        false,
        &MUX_TABLE_2BIT,
    ),
];

static SYSCTRL_GATE_CLKS: [GateClock; 4] = [
    gate(sysctrl::MCE_CLK, "clk_mce", "mcu_bus_mux", 0x48, 0),
    gate(sysctrl::IR_CLK, "clk_ir", "clk_osc", 0x48, 4),
    gate(sysctrl::TIMER01_CLK, "clk_timer01", "clk_osc", 0x48, 6),
    gate(sysctrl::UART0_CLK, "clk_uart0", "uart0_mux", 0x48, 12),
];

/// The probed sysctrl instance.
pub struct Sysctrl {
    data: ClockData<{ sysctrl::NR_CLKS }>,
}

impl Sysctrl {
    pub fn probe<const CAP: usize>(
        registry: &mut ClockRegistry<CAP>,
        mmio: Mmio,
    ) -> Result<Sysctrl, ErrorCode> {
        let mut instance = Sysctrl {
            data: ClockData::new(mmio),
        };
        let data = &mut instance.data;

        registry.register_clocks(ClockSet::Mux(&SYSCTRL_MUX_CLKS), data)?;

        if let Err(e) = registry.register_clocks(ClockSet::Gate(&SYSCTRL_GATE_CLKS), data) {
            registry.unregister_clocks(ClockSet::Mux(&SYSCTRL_MUX_CLKS), data);
            return Err(e);
        }

        if let Err(e) = registry.add_provider(SYSCTRL_COMPATIBLE) {
            registry.unregister_clocks(ClockSet::Gate(&SYSCTRL_GATE_CLKS), data);
            registry.unregister_clocks(ClockSet::Mux(&SYSCTRL_MUX_CLKS), data);
            return Err(e);
        }

        Ok(instance)
    }

    pub fn remove<const CAP: usize>(mut self, registry: &mut ClockRegistry<CAP>) {
        registry.del_provider(SYSCTRL_COMPATIBLE);
        registry.unregister_clocks(ClockSet::Gate(&SYSCTRL_GATE_CLKS), &mut self.data);
        registry.unregister_clocks(ClockSet::Mux(&SYSCTRL_MUX_CLKS), &mut self.data);
    }

    pub fn clock_data(&self) -> &ClockData<{ sysctrl::NR_CLKS }> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_CAP: usize = 128;

    fn crg_window() -> std::vec::Vec<u32> {
        std::vec![0u32; 256]
    }

    fn boot_apll(window: &mut [u32]) {
        // postdiv2 = 2, postdiv1 = 1, a stale fractional value
        window[0] = (2 << 28) | (1 << 24) | 0x123;
        // refdiv = 1, fbdiv = 1
        window[1] = (1 << 12) | 1;
    }

    #[test]
    fn probe_publishes_every_descriptor() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        assert!(registry.provider_registered(CRG_COMPATIBLE));

        for clk in &FIXED_RATE_CLKS {
            assert_eq!(
                registry.lookup(clk.name),
                instance.clock_data().get(clk.index),
                "{} missing",
                clk.name
            );
        }
        for clk in &MUX_CLKS {
            assert!(registry.lookup(clk.name).is_some(), "{} missing", clk.name);
        }
        for clk in &GATE_CLKS {
            assert!(registry.lookup(clk.name).is_some(), "{} missing", clk.name);
        }
        for clk in &PLL_CLKS {
            assert!(registry.lookup(clk.name).is_some(), "{} missing", clk.name);
        }
        for clk in &PHASE_CLKS {
            assert!(registry.lookup(clk.name).is_some(), "{} missing", clk.name);
        }
    }

    #[test]
    fn apll_reaches_1200_mhz_from_the_oscillator() {
        let mut window = crg_window();
        boot_apll(&mut window);
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let apll = instance.clock_data().get(crg::APLL_CLK).unwrap();

        assert_eq!(registry.prepare(apll), Ok(()));
        assert_eq!(registry.determine_rate(apll, 1_200_000_000), Ok(1_200_000_000));
        assert_eq!(registry.set_rate(apll, 1_200_000_000), Ok(()));
        assert_eq!(window[1] & 0xfff, 100);
        assert_eq!(registry.rate(apll), Ok(1_200_000_000));
    }

    #[test]
    fn unbooted_pll_reports_uninitialized() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let bpll = instance.clock_data().get(crg::BPLL_CLK).unwrap();
        assert_eq!(registry.prepare(bpll), Err(ErrorCode::Uninit));
    }

    #[test]
    fn mmc_mux_selects_through_the_sparse_table() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let mmc_mux = instance.clock_data().get(crg::MMC_MUX).unwrap();

        // Parent 4 ("150m") encodes as raw 0b110 in bits 10:8 of 0xa0.
        assert_eq!(registry.set_parent(mmc_mux, 4), Ok(()));
        assert_eq!(window[0xa0 / 4] >> 8 & 0x7, 0b110);
        assert_eq!(registry.get_parent(mmc_mux), Ok(4));
        assert_eq!(registry.rate(mmc_mux), Ok(150_000_000));

        // And the eMMC interface clock downstream follows it.
        let ciu = instance.clock_data().get(crg::MMC_CIU_CLK).unwrap();
        assert_eq!(registry.rate(ciu), Ok(150_000_000));
    }

    #[test]
    fn sdio0_sample_phase_scenario() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let sample = instance.clock_data().get(crg::SDIO0_SAMPLE_CLK).unwrap();

        assert_eq!(registry.set_phase(sample, 180), Ok(()));
        assert_eq!(window[0x9c / 4] >> 12 & 0x7, 0b100);
        assert_eq!(registry.get_phase(sample), Ok(180));
        assert_eq!(registry.set_phase(sample, 60), Err(ErrorCode::Inval));
    }

    #[test]
    fn uart2_gate_controls_its_bit_and_rate() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let uart2 = instance.clock_data().get(crg::UART2_CLK).unwrap();

        assert_eq!(registry.rate(uart2), Ok(75_000_000));
        registry.enable(uart2).unwrap();
        assert_eq!(window[0x68 / 4] & (1 << 4), 1 << 4);
        registry.disable(uart2).unwrap();
        assert_eq!(window[0x68 / 4] & (1 << 4), 0);
    }

    #[test]
    fn parentless_usb3_gates_have_no_rate() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let pipe = instance.clock_data().get(crg::USB3_PIPE_CLK).unwrap();
        assert_eq!(registry.rate(pipe), Ok(0));
        registry.enable(pipe).unwrap();
        assert_eq!(window[0xb0 / 4] & (1 << 3), 1 << 3);
    }

    #[test]
    fn remove_unwinds_everything() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        instance.remove(&mut registry);

        assert!(!registry.provider_registered(CRG_COMPATIBLE));
        for name in ["clk_osc", "mmc_mux", "clk_wdg0", "apll", "sdio0_sample"] {
            assert_eq!(registry.lookup(name), None, "{} survived remove", name);
        }

        // A fresh probe into the same registry works again.
        let instance = Crg::probe(&mut registry, mmio).unwrap();
        instance.remove(&mut registry);
    }

    #[test]
    fn failed_gate_registration_rolls_the_probe_back() {
        static SQUATTER: [FixedRateClock; 1] = [FixedRateClock {
            index: 0,
            name: "clk_wdg0",
            flags: 0,
            rate: 1,
        }];
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        // Occupy a gate name so the gate step fails with a duplicate.
        let mut squatter_data: ClockData<1> = ClockData::new(mmio);
        registry
            .register_clocks(ClockSet::FixedRate(&SQUATTER), &mut squatter_data)
            .unwrap();

        assert_eq!(
            Crg::probe(&mut registry, mmio).err(),
            Some(ErrorCode::Already)
        );

        // No fixed-rate or mux name from this instance resolves any more,
        // and the scoped sets went away with the failed device.
        for clk in &FIXED_RATE_CLKS {
            assert_eq!(registry.lookup(clk.name), None, "{} leaked", clk.name);
        }
        for clk in &MUX_CLKS {
            assert_eq!(registry.lookup(clk.name), None, "{} leaked", clk.name);
        }
        for clk in &PLL_CLKS {
            assert_eq!(registry.lookup(clk.name), None, "{} leaked", clk.name);
        }
        for clk in &PHASE_CLKS {
            assert_eq!(registry.lookup(clk.name), None, "{} leaked", clk.name);
        }
        assert!(!registry.provider_registered(CRG_COMPATIBLE));
        assert!(registry.lookup("clk_wdg0").is_some());
    }

    #[test]
    fn failed_publication_rolls_the_probe_back() {
        let mut window = crg_window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        registry.add_provider(CRG_COMPATIBLE).unwrap();
        assert_eq!(
            Crg::probe(&mut registry, mmio).err(),
            Some(ErrorCode::Already)
        );
        for clk in &GATE_CLKS {
            assert_eq!(registry.lookup(clk.name), None, "{} leaked", clk.name);
        }
    }

    #[test]
    fn sysctrl_parents_resolve_in_the_core_crg() {
        let mut window = crg_window();
        let mut sysctrl_window = [0u32; 32];
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let sysctrl_mmio = unsafe { Mmio::new(sysctrl_window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let core = Crg::probe(&mut registry, mmio).unwrap();
        let sys = Sysctrl::probe(&mut registry, sysctrl_mmio).unwrap();
        assert!(registry.provider_registered(SYSCTRL_COMPATIBLE));

        let uart0_mux = sys.clock_data().get(sysctrl::UART0_MUX).unwrap();
        assert_eq!(registry.rate(uart0_mux), Ok(3_000_000));
        assert_eq!(registry.set_parent(uart0_mux, 1), Ok(()));
        assert_eq!(sysctrl_window[0x48 / 4] >> 29 & 0x1, 1);
        assert_eq!(registry.rate(uart0_mux), Ok(75_000_000));

        let uart0 = sys.clock_data().get(sysctrl::UART0_CLK).unwrap();
        assert_eq!(registry.rate(uart0), Ok(75_000_000));

        // The mcu bus mux's third input is not a registered source.
        let mcu_bus = sys.clock_data().get(sysctrl::MCU_BUS_CLK).unwrap();
        assert_eq!(registry.set_parent(mcu_bus, 2), Ok(()));
        assert_eq!(registry.rate(mcu_bus), Err(ErrorCode::Inval));

        sys.remove(&mut registry);
        assert_eq!(registry.lookup("uart0_mux"), None);
        core.remove(&mut registry);
    }

    #[test]
    fn cpu_mux_prefers_the_nearest_rate() {
        let mut window = crg_window();
        boot_apll(&mut window);
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<REGISTRY_CAP> = ClockRegistry::new();

        let instance = Crg::probe(&mut registry, mmio).unwrap();
        let cpu = instance.clock_data().get(crg::CPU_CLK).unwrap();
        let apll = instance.clock_data().get(crg::APLL_CLK).unwrap();
        registry.prepare(apll).unwrap();

        // With the APLL sitting at 12 MHz (fbdiv 1), 990 MHz is closest
        // to the 800 MHz line; 1340 MHz to the 1350 MHz one.
        assert_eq!(registry.determine_rate(cpu, 990_000_000), Ok(800_000_000));
        assert_eq!(
            registry.determine_rate(cpu, 1_340_000_000),
            Ok(1_350_000_000)
        );
    }
}
