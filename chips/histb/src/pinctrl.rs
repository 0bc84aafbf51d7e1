// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! IOCONFIG pin-mux and pin-conf engine.
//!
//! Every pin owns one 32-bit word at `4 * pin` in the controller window;
//! function select, drive strength, slew rate, bias and Schmitt input all
//! live in that word. The SoC crate supplies a static descriptor per pin:
//! its function table (symbolic function id to raw 3-bit pattern), an
//! optional descending drive-strength table in milliamps, and capability
//! flags for the configurations the pad does not implement.
//!
//! Muxing is strict: a pin carries exactly one function (GPIO included)
//! and switches on the register write, with no glitch-free handover.

use log::error;
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::error::ErrorCode;
use crate::mmio::Mmio;

register_bitfields![u32,
    /// Per-pin IOCONFIG word.
    pub PIN_CFG [
        FUNC OFFSET(0) NUMBITS(3) [],
        DRV OFFSET(4) NUMBITS(4) [],
        /// 1 = fast edges.
        SLEW OFFSET(8) NUMBITS(1) [],
        PULLUP OFFSET(12) NUMBITS(1) [],
        PULLDOWN OFFSET(13) NUMBITS(1) [],
        SCHMITT OFFSET(14) NUMBITS(1) []
    ]
];

/// Capability flags of one pin.
pub mod pin_flags {
    /// Pull-up bias is not wired.
    pub const NOPU: u32 = 1 << 0;
    /// Pull-down bias is not wired.
    pub const NOPD: u32 = 1 << 1;
    /// Slew rate is not controllable.
    pub const NOSR: u32 = 1 << 2;
    /// The input Schmitt trigger is configurable.
    pub const SCHMITT: u32 = 1 << 3;
}

/// Function id 0 is GPIO on every pin.
pub const FUNCTION_GPIO: u32 = 0;

/// One selectable function of a pin: symbolic id and the raw pattern for
/// the function-select field.
pub struct PinMux {
    pub func: u32,
    pub bits: u32,
}

/// Static description of one pin.
///
/// The pin's id is its position in the SoC pin table, which is also its
/// register slot. `drv_tbl` is descending and zero-terminated; `None`
/// means drive strength is not controllable on this pad.
pub struct PinDesc {
    pub name: &'static str,
    pub drv_tbl: Option<&'static [u8]>,
    pub func_tbl: &'static [PinMux],
    pub flags: u32,
}

/// Generic pin configuration parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinConfig {
    BiasDisable,
    BiasPullUp,
    BiasPullDown,
    SlewRate,
    InputSchmittEnable,
    DriveStrength,
}

/// Bias state as read back from a pin word.
///
/// Both pull bits set decodes to `Invalid`; the engine never writes that
/// combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BiasStatus {
    Disable,
    PullDown,
    PullUp,
    Invalid,
}

/// A named function and the pins able to carry it, as published to the
/// surrounding pin framework.
pub struct PinFunction {
    pub name: &'static str,
    pub pins: &'static [&'static str],
}

/// Fixed-capacity group/function tables standing where the surrounding
/// framework's generic pinctrl publication sits.
pub struct PinRegistry<const NUM_GROUPS: usize, const NUM_FUNCTIONS: usize> {
    groups: [Option<&'static str>; NUM_GROUPS],
    num_groups: usize,
    functions: [Option<&'static PinFunction>; NUM_FUNCTIONS],
    num_functions: usize,
}

impl<const NUM_GROUPS: usize, const NUM_FUNCTIONS: usize>
    PinRegistry<NUM_GROUPS, NUM_FUNCTIONS>
{
    pub fn new() -> PinRegistry<NUM_GROUPS, NUM_FUNCTIONS> {
        PinRegistry {
            groups: [None; NUM_GROUPS],
            num_groups: 0,
            functions: [None; NUM_FUNCTIONS],
            num_functions: 0,
        }
    }

    /// Publish one pin as its own group.
    pub fn add_group(&mut self, name: &'static str) -> Result<(), ErrorCode> {
        if self.groups[..self.num_groups].contains(&Some(name)) {
            return Err(ErrorCode::Already);
        }
        if self.num_groups == NUM_GROUPS {
            return Err(ErrorCode::NoMem);
        }
        self.groups[self.num_groups] = Some(name);
        self.num_groups += 1;
        Ok(())
    }

    /// Publish one function; its position is the function's selector.
    pub fn add_function(&mut self, function: &'static PinFunction) -> Result<(), ErrorCode> {
        if self.functions[..self.num_functions]
            .iter()
            .any(|slot| slot.is_some_and(|f| f.name == function.name))
        {
            return Err(ErrorCode::Already);
        }
        if self.num_functions == NUM_FUNCTIONS {
            return Err(ErrorCode::NoMem);
        }
        self.functions[self.num_functions] = Some(function);
        self.num_functions += 1;
        Ok(())
    }

    pub fn group_count(&self) -> usize {
        self.num_groups
    }

    pub fn function_count(&self) -> usize {
        self.num_functions
    }

    pub fn function(&self, selector: usize) -> Option<&'static PinFunction> {
        self.functions.get(selector).copied().flatten()
    }
}

type PinWord = LocalRegisterCopy<u32, PIN_CFG::Register>;

/// The per-controller engine: one register window, one shared pin table.
pub struct PinController {
    mmio: Mmio,
    pins: &'static [PinDesc],
}

impl PinController {
    pub fn new(mmio: Mmio, pins: &'static [PinDesc]) -> PinController {
        PinController { mmio, pins }
    }

    pub fn pins(&self) -> &'static [PinDesc] {
        self.pins
    }

    fn pin(&self, pin: usize) -> Result<&'static PinDesc, ErrorCode> {
        self.pins.get(pin).ok_or(ErrorCode::Inval)
    }

    fn word(&self, pin: usize) -> PinWord {
        LocalRegisterCopy::new(self.mmio.read(4 * pin))
    }

    fn commit(&self, pin: usize, word: PinWord) {
        self.mmio.write(4 * pin, word.get());
    }

    /// Route `pin` to `func`.
    ///
    /// The function table is scanned linearly (it never exceeds a handful
    /// of entries) and the first match wins.
    pub fn set_mux(&self, func: u32, pin: usize) -> Result<(), ErrorCode> {
        let desc = self.pin(pin)?;
        for mux in desc.func_tbl {
            if mux.func == func {
                let mut word = self.word(pin);
                word.modify(PIN_CFG::FUNC.val(mux.bits));
                self.commit(pin, word);
                return Ok(());
            }
        }
        error!("pin {} cannot carry function {}", desc.name, func);
        Err(ErrorCode::NoFunction)
    }

    /// The function currently routed to `pin`.
    pub fn get_mux(&self, pin: usize) -> Result<u32, ErrorCode> {
        let desc = self.pin(pin)?;
        let raw = self.word(pin).read(PIN_CFG::FUNC);
        desc.func_tbl
            .iter()
            .find(|mux| mux.bits == raw)
            .map(|mux| mux.func)
            .ok_or(ErrorCode::NoFunction)
    }

    /// Claim `pin` as a GPIO.
    pub fn gpio_request(&self, pin: usize) -> Result<(), ErrorCode> {
        self.set_mux(FUNCTION_GPIO, pin)
    }

    /// Decode the pin's bias bits.
    pub fn bias_status(&self, pin: usize) -> Result<BiasStatus, ErrorCode> {
        self.pin(pin)?;
        let word = self.word(pin);
        Ok(
            match (word.is_set(PIN_CFG::PULLUP), word.is_set(PIN_CFG::PULLDOWN)) {
                (false, false) => BiasStatus::Disable,
                (false, true) => BiasStatus::PullDown,
                (true, false) => BiasStatus::PullUp,
                (true, true) => BiasStatus::Invalid,
            },
        )
    }

    /// Read one generic configuration of `pin`.
    ///
    /// Booleans are reported as 0/1; drive strength is reported in
    /// milliamps through the pin's table.
    pub fn config_get(&self, pin: usize, param: PinConfig) -> Result<u32, ErrorCode> {
        let desc = self.pin(pin)?;
        let word = self.word(pin);
        match param {
            PinConfig::BiasDisable => Ok((self.bias_status(pin)? == BiasStatus::Disable) as u32),
            PinConfig::BiasPullUp => Ok(word.read(PIN_CFG::PULLUP)),
            PinConfig::BiasPullDown => Ok(word.read(PIN_CFG::PULLDOWN)),
            PinConfig::SlewRate => Ok(word.read(PIN_CFG::SLEW)),
            PinConfig::InputSchmittEnable => Ok(word.read(PIN_CFG::SCHMITT)),
            PinConfig::DriveStrength => {
                let table = desc.drv_tbl.ok_or(ErrorCode::NoSupport)?;
                let index = word.read(PIN_CFG::DRV) as usize;
                // Out-of-table field values (possible straight out of
                // reset) read as the 0 mA sentinel.
                match table.get(index).copied().unwrap_or(0) {
                    0 => Err(ErrorCode::NoSupport),
                    milliamps => Ok(milliamps as u32),
                }
            }
        }
    }

    /// Apply one generic configuration to `pin`.
    ///
    /// A refused request leaves the pin word untouched.
    pub fn config_set(&self, pin: usize, param: PinConfig, arg: u32) -> Result<(), ErrorCode> {
        let desc = self.pin(pin)?;
        let mut word = self.word(pin);
        match param {
            PinConfig::BiasDisable => {
                word.modify(PIN_CFG::PULLUP::CLEAR + PIN_CFG::PULLDOWN::CLEAR);
            }
            PinConfig::BiasPullUp => {
                if desc.flags & pin_flags::NOPU != 0 {
                    return Err(ErrorCode::NoSupport);
                }
                word.modify(PIN_CFG::PULLDOWN::CLEAR + PIN_CFG::PULLUP::SET);
            }
            PinConfig::BiasPullDown => {
                if desc.flags & pin_flags::NOPD != 0 {
                    return Err(ErrorCode::NoSupport);
                }
                word.modify(PIN_CFG::PULLUP::CLEAR + PIN_CFG::PULLDOWN::SET);
            }
            PinConfig::SlewRate => {
                if desc.flags & pin_flags::NOSR != 0 || arg > 1 {
                    return Err(ErrorCode::NoSupport);
                }
                word.modify(PIN_CFG::SLEW.val(arg));
            }
            PinConfig::InputSchmittEnable => {
                if desc.flags & pin_flags::SCHMITT == 0 {
                    return Err(ErrorCode::NoSupport);
                }
                word.modify(PIN_CFG::SCHMITT.val((arg != 0) as u32));
            }
            PinConfig::DriveStrength => {
                let table = desc.drv_tbl.ok_or(ErrorCode::NoSupport)?;
                if arg == 0 {
                    return Err(ErrorCode::NoSupport);
                }
                // Largest strength not exceeding the request; when even
                // the weakest non-zero entry is too strong, use it
                // anyway.
                let mut index = table
                    .iter()
                    .position(|&milliamps| milliamps as u32 <= arg)
                    .ok_or(ErrorCode::NoSupport)?;
                if table[index] == 0 {
                    if index == 0 {
                        return Err(ErrorCode::NoSupport);
                    }
                    index -= 1;
                }
                word.modify(PIN_CFG::DRV.val(index as u32));
            }
        }
        self.commit(pin, word);
        Ok(())
    }
}
