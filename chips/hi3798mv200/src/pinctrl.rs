// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! IOCONFIG pin map for the Hi3798MV2x SoCs.
//!
//! 66 pins in a fixed enumeration order; a pin's position in the table is
//! both its id and its register slot. The probe publishes every pin as a
//! group of its own plus the per-function pin groups, then hands the
//! engine out for mux and configuration requests.

use histb::error::ErrorCode;
use histb::mmio::Mmio;
use histb::pinctrl::{pin_flags, PinController, PinDesc, PinFunction, PinMux, PinRegistry};

pub const IOCONFIG_COMPATIBLE: &str = "hisilicon,hi3798mv200-ioconfig";

pub const NUM_PINS: usize = 66;
pub const FUNCTION_COUNT: usize = 33;

/// Pin functions of the Hi3798MV2x; the discriminant is the function
/// selector, with GPIO on the reserved id 0.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinFunc {
    Gpio = 0,
    BootSel = 1,
    Clkout25m = 2,
    Emmc = 3,
    /// Fast Ethernet PHY LED.
    FeLed = 4,
    Hdmitx = 5,
    I2cScl = 6,
    I2cSda = 7,
    I2sClk = 8,
    I2sData = 9,
    I2sWs = 10,
    Jtag = 11,
    Nand = 12,
    Pmc = 13,
    Rgmii = 14,
    Rmii = 15,
    Sata = 16,
    Sdio = 17,
    Sim = 18,
    Spdif = 19,
    Spi = 20,
    SpiFlash = 21,
    /// Pin E19 can be transport-stream data line 0 or 1; the shared data
    /// function cannot tell those apart, so each line is its own
    /// function.
    Tsi0D0 = 22,
    Tsi0D1 = 23,
    Tsi0Data = 24,
    Tsi1Data = 25,
    Tsi2Data = 26,
    Tsi3Data = 27,
    Tso = 28,
    TsiClk = 29,
    TsiSync = 30,
    TsiValid = 31,
    Uart = 32,
}

const fn m(func: PinFunc, bits: u32) -> PinMux {
    PinMux {
        func: func as u32,
        bits,
    }
}

const fn pin(
    name: &'static str,
    drv_tbl: Option<&'static [u8]>,
    func_tbl: &'static [PinMux],
    flags: u32,
) -> PinDesc {
    PinDesc {
        name,
        drv_tbl,
        func_tbl,
        flags,
    }
}

// The two drive-strength tables most pads use.
static DRIVE_TBL_A: [u8; 5] = [4, 3, 2, 1, 0];
static DRIVE_TBL_B: [u8; 17] = [18, 17, 16, 15, 13, 12, 11, 10, 9, 8, 7, 6, 4, 3, 2, 1, 0];
// Bespoke tables of the SDIO-capable and RGMII pads.
static DRIVE_TBL_SDIO_PADS: [u8; 9] = [18, 16, 14, 12, 5, 4, 2, 1, 0];
static DRIVE_TBL_RGMII_PADS: [u8; 9] = [18, 16, 14, 12, 10, 8, 6, 4, 0];

use PinFunc::*;

/// All pins, in register-slot order.
#[rustfmt::skip]
pub static PINS: [PinDesc; NUM_PINS] = [
    pin("Y19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Nand, 0x1)], pin_flags::NOPD),
    pin("W19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Nand, 0x1)], pin_flags::NOPD),
    pin("AA20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(BootSel, 0x2)], 0),
    pin("Y20", Some(&DRIVE_TBL_B),
        &[m(Nand, 0x1)], 0),
    pin("V19", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("Y21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("W20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("W21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("V20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("V21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("U20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("U21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("T18", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("T19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Nand, 0x1)], 0),
    pin("T20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("R20", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("R21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Nand, 0x1), m(Emmc, 0x2)], 0),
    pin("P20", Some(&DRIVE_TBL_A),
        &[m(Pmc, 0x0), m(I2cSda, 0x1), m(Gpio, 0x2)], 0),
    pin("R19", Some(&DRIVE_TBL_A),
        &[m(Pmc, 0x0), m(I2cScl, 0x1), m(Gpio, 0x2)], 0),
    pin("K18", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Sata, 0x1), m(Uart, 0x2), m(Tsi0Data, 0x3),
          m(TsiClk, 0x4), m(Sim, 0x5)], 0),
    pin("J17", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Sata, 0x1), m(Uart, 0x2), m(TsiSync, 0x3),
          m(Tsi1Data, 0x4), m(Tsi0Data, 0x5), m(TsiValid, 0x6), m(Sim, 0x7)], 0),
    pin("J18", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Uart, 0x1), m(Tsi1Data, 0x2), m(Tsi0Data, 0x3),
          m(Tsi3Data, 0x4), m(Sim, 0x5)], 0),
    pin("H17", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Uart, 0x1), m(TsiClk, 0x2), m(Tsi0Data, 0x3),
          m(TsiValid, 0x4), m(Sim, 0x5)], 0),
    pin("H18", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2cSda, 0x1), m(TsiValid, 0x2), m(Tsi0Data, 0x3),
          m(Tsi2Data, 0x4), m(Sim, 0x5)], 0),
    pin("K20", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(I2cScl, 0x1), m(Spi, 0x2), m(Sim, 0x3), m(Gpio, 0x4)], 0),
    pin("K19", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(Spi, 0x1), m(Sim, 0x2), m(Gpio, 0x3), m(Uart, 0x4)], 0),
    pin("J20", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(I2sClk, 0x1), m(Spi, 0x2), m(Sim, 0x3), m(Gpio, 0x4),
          m(Uart, 0x5)], 0),
    pin("J19", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(I2sWs, 0x1), m(Spi, 0x2), m(Sim, 0x3), m(Gpio, 0x4),
          m(Uart, 0x5)], 0),
    pin("H21", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(I2sClk, 0x1), m(I2sData, 0x2), m(Sim, 0x3), m(Gpio, 0x4),
          m(Uart, 0x5)], 0),
    pin("H20", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2sClk, 0x1), m(I2sData, 0x2), m(SpiFlash, 0x3),
          m(Tso, 0x4)], pin_flags::NOPD),
    pin("H19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2sWs, 0x1), m(I2sData, 0x2), m(TsiSync, 0x3),
          m(Tsi1Data, 0x4), m(SpiFlash, 0x5), m(Tso, 0x6)], 0),
    pin("G20", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2sData, 0x1), m(Tsi1Data, 0x3), m(SpiFlash, 0x5),
          m(Tso, 0x6)], pin_flags::NOPD),
    pin("G19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2sClk, 0x1), m(I2sWs, 0x2), m(TsiClk, 0x3),
          m(SpiFlash, 0x5), m(Tso, 0x6)], pin_flags::NOPD),
    pin("F21", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(I2sData, 0x1), m(I2sClk, 0x2), m(TsiValid, 0x3),
          m(SpiFlash, 0x5)], 0),
    pin("F20", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(I2sClk, 0x2), m(SpiFlash, 0x4)], 0),
    pin("F19", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(I2cScl, 0x3), m(I2sClk, 0x4),
          m(Tsi0Data, 0x5), m(TsiClk, 0x6)], 0),
    pin("E20", Some(&DRIVE_TBL_SDIO_PADS),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(I2sWs, 0x4), m(Tsi0Data, 0x5),
          m(I2cSda, 0x6)], 0),
    pin("E19", Some(&DRIVE_TBL_SDIO_PADS),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(Tsi0D1, 0x2), m(TsiSync, 0x3),
          m(I2sClk, 0x4), m(Tsi0D0, 0x5), m(I2cScl, 0x6)], 0),
    pin("D21", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(Tsi0Data, 0x3), m(I2sClk, 0x4),
          m(TsiClk, 0x5), m(TsiValid, 0x6)], 0),
    pin("E18", Some(&DRIVE_TBL_SDIO_PADS),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(TsiClk, 0x3), m(I2sWs, 0x4),
          m(TsiValid, 0x5), m(Tsi1Data, 0x6)], 0),
    // TSI_VALID is listed twice with different patterns; the first entry
    // is the one a mux request lands on.
    pin("C20", Some(&DRIVE_TBL_SDIO_PADS),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(TsiClk, 0x2), m(TsiValid, 0x3),
          m(I2sData, 0x4), m(I2cScl, 0x5), m(TsiValid, 0x6)], 0),
    pin("D19", Some(&DRIVE_TBL_SDIO_PADS),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(I2cScl, 0x3), m(I2sClk, 0x4),
          m(I2cSda, 0x5), m(Tsi0Data, 0x6)], 0),
    pin("B21", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Sdio, 0x1), m(I2cSda, 0x3), m(I2sData, 0x4),
          m(TsiClk, 0x6)], 0),
    pin("B18", Some(&DRIVE_TBL_A),
        &[m(Jtag, 0x0), m(Gpio, 0x1)], 0),
    pin("C17", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Spdif, 0x1)], 0),
    pin("B17", Some(&DRIVE_TBL_A),
        &[m(Hdmitx, 0x1), m(Gpio, 0x2)], 0),
    pin("A17", Some(&DRIVE_TBL_A),
        &[m(Hdmitx, 0x1), m(Gpio, 0x2)], 0),
    pin("C16", Some(&DRIVE_TBL_A),
        &[m(Hdmitx, 0x1), m(Gpio, 0x2)], 0),
    pin("B16", Some(&DRIVE_TBL_A),
        &[m(Hdmitx, 0x1), m(Gpio, 0x2)],
        pin_flags::NOPU | pin_flags::NOPD | pin_flags::NOSR),
    pin("B4", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)],
        pin_flags::SCHMITT),
    pin("C4", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)],
        pin_flags::SCHMITT),
    pin("A3", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)], 0),
    pin("B3", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)],
        pin_flags::SCHMITT),
    pin("A2", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)],
        pin_flags::SCHMITT),
    pin("B2", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)],
        pin_flags::SCHMITT),
    pin("A6", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Uart, 0x2), m(FeLed, 0x3)], 0),
    pin("C6", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Uart, 0x2), m(FeLed, 0x3)], 0),
    pin("C5", Some(&DRIVE_TBL_A),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3)], 0),
    pin("C3", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(BootSel, 0x2)], pin_flags::SCHMITT),
    pin("D4", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Uart, 0x2)], pin_flags::SCHMITT),
    pin("D3", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Uart, 0x2)], pin_flags::SCHMITT),
    pin("B1", Some(&DRIVE_TBL_B),
        &[m(Gpio, 0x0), m(Rgmii, 0x1), m(Rmii, 0x2), m(BootSel, 0x3)],
        pin_flags::SCHMITT),
    pin("C2", Some(&DRIVE_TBL_RGMII_PADS),
        &[m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3), m(Gpio, 0x4)],
        pin_flags::SCHMITT),
    pin("C1", Some(&DRIVE_TBL_B),
        &[m(Rgmii, 0x1), m(Rmii, 0x2), m(Sdio, 0x3), m(Gpio, 0x4)],
        pin_flags::SCHMITT),
    pin("A5", None,
        &[m(Gpio, 0x0), m(Clkout25m, 0x1)], 0),
    pin("D5", None,
        &[m(Pmc, 0x0), m(Gpio, 0x1)],
        pin_flags::NOPU | pin_flags::NOPD | pin_flags::NOSR),
];

/// Per-function pin groups, indexed by the [`PinFunc`] selector.
#[rustfmt::skip]
pub static FUNCTIONS: [PinFunction; FUNCTION_COUNT] = [
    // Every pin that lists it can be a GPIO; no fixed group.
    PinFunction { name: "gpio", pins: &[] },
    PinFunction { name: "bootsel", pins: &["AA20", "C3", "B1"] },
    PinFunction { name: "clkout", pins: &["A5"] },
    PinFunction { name: "emmc", pins: &["V19", "Y21", "W20", "W21", "V20", "V21",
        "U20", "U21", "T18", "T20", "R20", "R21"] },
    PinFunction { name: "fe_led", pins: &["A6", "C6"] },
    PinFunction { name: "hdmitx", pins: &["B17", "A17", "C16", "B16"] },
    PinFunction { name: "i2c_scl", pins: &["R19", "K20", "F19", "E19", "C20", "D19"] },
    PinFunction { name: "i2c_sda", pins: &["P20", "H18", "E20", "D19", "B21"] },
    PinFunction { name: "i2s_clk", pins: &["J20", "H21", "H20", "G19", "F21", "F20",
        "F19", "E19", "D21", "D19"] },
    PinFunction { name: "i2s_data", pins: &["H21", "H20", "H19", "G20", "F21", "C20",
        "B21"] },
    PinFunction { name: "i2s_ws", pins: &["J19", "H19", "G19", "E20", "E18"] },
    PinFunction { name: "jtag", pins: &["K20", "K19", "J20", "J19", "H21", "B18"] },
    PinFunction { name: "nand", pins: &["Y19", "W19", "AA20", "Y20", "V19", "Y21",
        "W20", "W21", "V20", "V21", "U20", "U21", "T18", "T19", "T20", "R20", "R21"] },
    PinFunction { name: "pmc", pins: &["P20", "R19", "D5"] },
    PinFunction { name: "rgmii", pins: &["B4", "C4", "A3", "B3", "A2", "B2", "A6",
        "C6", "C5", "C3", "D4", "D3", "B1", "C2", "C1", "A5", "D5"] },
    PinFunction { name: "rmii", pins: &["B4", "C4", "A3", "B3", "A2", "B2", "C5",
        "B1", "C2", "C1"] },
    PinFunction { name: "sata", pins: &["K18", "J17"] },
    PinFunction { name: "sdio", pins: &["F20", "F19", "E20", "E19", "D21", "E18",
        "C20", "D19", "B21", "B4", "C4", "A3", "B3", "A2", "B2", "C5", "C2", "C1"] },
    PinFunction { name: "sim", pins: &["K18", "J17", "J18", "H17", "H18", "K20",
        "K19", "J20", "J19", "H21"] },
    PinFunction { name: "spdif", pins: &["C17"] },
    PinFunction { name: "spi", pins: &["K20", "K19", "J20", "J19"] },
    PinFunction { name: "spi_flash", pins: &["H20", "H19", "G20", "G19", "F21", "F20"] },
    PinFunction { name: "tsi0_d0", pins: &["E19"] },
    PinFunction { name: "tsi0_d1", pins: &["E19"] },
    PinFunction { name: "tsi0_data", pins: &["K18", "J17", "J18", "H17", "H18",
        "F19", "E20", "D21", "D19"] },
    PinFunction { name: "tsi1_data", pins: &["J17", "J18", "H19", "G20", "E18"] },
    PinFunction { name: "tsi2_data", pins: &["H18"] },
    PinFunction { name: "tsi3_data", pins: &["J18"] },
    PinFunction { name: "tso", pins: &["H20", "H19", "G20", "G19"] },
    PinFunction { name: "tsi_clk", pins: &["K18", "H17", "G19", "F19", "D21", "E18",
        "C20", "B21"] },
    PinFunction { name: "tsi_sync", pins: &["J17", "H19", "E19"] },
    PinFunction { name: "tsi_valid", pins: &["J17", "H17", "H18", "F21", "D21",
        "E18", "C20"] },
    PinFunction { name: "uart", pins: &["K18", "J17", "J18", "H17", "K19", "J20",
        "J19", "H21", "A6", "C6", "D4", "D3"] },
];

/// Bring the IOCONFIG block up: publish the groups and functions, hand
/// out the engine.
pub fn probe(
    mmio: Mmio,
    registry: &mut PinRegistry<NUM_PINS, FUNCTION_COUNT>,
) -> Result<PinController, ErrorCode> {
    let controller = PinController::new(mmio, &PINS);
    for pin in controller.pins() {
        registry.add_group(pin.name)?;
    }
    for function in FUNCTIONS.iter() {
        registry.add_function(function)?;
    }
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use histb::pinctrl::{BiasStatus, PinConfig, FUNCTION_GPIO};

    const K18: usize = 19;
    const C20: usize = 40;
    const E19: usize = 37;
    const B16: usize = 48;
    const B4: usize = 49;
    const A3: usize = 51;
    const C2: usize = 62;
    const A5: usize = 64;

    fn window() -> std::vec::Vec<u32> {
        std::vec![0u32; NUM_PINS]
    }

    fn controller(window: &mut [u32]) -> PinController {
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        PinController::new(mmio, &PINS)
    }

    #[test]
    fn table_is_addressed_by_position() {
        assert_eq!(PINS.len(), NUM_PINS);
        assert_eq!(PINS[K18].name, "K18");
        assert_eq!(PINS[C20].name, "C20");
        assert_eq!(PINS[E19].name, "E19");
        assert_eq!(PINS[B16].name, "B16");
        assert_eq!(PINS[B4].name, "B4");
        assert_eq!(PINS[A5].name, "A5");
        assert_eq!(PINS[NUM_PINS - 1].name, "D5");
    }

    #[test]
    fn function_groups_name_known_pins() {
        for function in FUNCTIONS.iter() {
            for pin_name in function.pins {
                assert!(
                    PINS.iter().any(|pin| pin.name == *pin_name),
                    "{} of {} is not a pin",
                    pin_name,
                    function.name
                );
            }
        }
    }

    #[test]
    fn probe_publishes_groups_and_functions() {
        let mut window = window();
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: PinRegistry<NUM_PINS, FUNCTION_COUNT> = PinRegistry::new();

        let _controller = probe(mmio, &mut registry).unwrap();
        assert_eq!(registry.group_count(), NUM_PINS);
        assert_eq!(registry.function_count(), FUNCTION_COUNT);
        assert_eq!(
            registry.function(PinFunc::TsiClk as usize).map(|f| f.name),
            Some("tsi_clk")
        );
    }

    #[test]
    fn k18_muxes_to_tsi_clk() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(ctrl.set_mux(PinFunc::TsiClk as u32, K18), Ok(()));
        assert_eq!(window[K18] & 0x7, 0b100);
        assert_eq!(ctrl.get_mux(K18), Ok(PinFunc::TsiClk as u32));

        // SDIO is not wired to this pad.
        assert_eq!(
            ctrl.set_mux(PinFunc::Sdio as u32, K18),
            Err(ErrorCode::NoFunction)
        );
        assert_eq!(window[K18] & 0x7, 0b100);
    }

    #[test]
    fn gpio_is_not_always_pattern_zero() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(ctrl.gpio_request(C2), Ok(()));
        assert_eq!(window[C2] & 0x7, 0x4);
        assert_eq!(ctrl.get_mux(C2), Ok(FUNCTION_GPIO));
    }

    #[test]
    fn c20_duplicate_function_takes_the_first_pattern() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(ctrl.set_mux(PinFunc::TsiValid as u32, C20), Ok(()));
        assert_eq!(window[C20] & 0x7, 0x3);
    }

    #[test]
    fn e19_distinguishes_the_two_data_lines() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(ctrl.set_mux(PinFunc::Tsi0D1 as u32, E19), Ok(()));
        assert_eq!(window[E19] & 0x7, 0x2);
        assert_eq!(ctrl.set_mux(PinFunc::Tsi0D0 as u32, E19), Ok(()));
        assert_eq!(window[E19] & 0x7, 0x5);
    }

    #[test]
    fn b4_drive_strength_scenario() {
        let mut window = window();
        let ctrl = controller(&mut window);

        // 11 mA: the strongest entry not above it is 10 mA, field 4.
        assert_eq!(ctrl.config_set(B4, PinConfig::DriveStrength, 11), Ok(()));
        assert_eq!(window[B4] >> 4 & 0xf, 4);
        assert_eq!(ctrl.config_get(B4, PinConfig::DriveStrength), Ok(10));

        // 3 mA undercuts the whole table; the weakest non-zero entry (4
        // mA, field 7) is used anyway.
        assert_eq!(ctrl.config_set(B4, PinConfig::DriveStrength, 3), Ok(()));
        assert_eq!(window[B4] >> 4 & 0xf, 7);
        assert_eq!(ctrl.config_get(B4, PinConfig::DriveStrength), Ok(4));
    }

    #[test]
    fn b16_is_fully_bias_and_slew_locked() {
        let mut window = window();
        let ctrl = controller(&mut window);

        for (param, arg) in [
            (PinConfig::BiasPullUp, 1),
            (PinConfig::BiasPullDown, 1),
            (PinConfig::SlewRate, 1),
        ] {
            assert_eq!(
                ctrl.config_set(B16, param, arg),
                Err(ErrorCode::NoSupport),
                "{:?} must be refused on B16",
                param
            );
            assert_eq!(window[B16], 0, "{:?} touched B16", param);
        }
        // Bias disable needs no capability.
        assert_eq!(ctrl.config_set(B16, PinConfig::BiasDisable, 0), Ok(()));
        assert_eq!(ctrl.bias_status(B16), Ok(BiasStatus::Disable));
    }

    #[test]
    fn schmitt_only_on_capable_pads() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(ctrl.config_set(B4, PinConfig::InputSchmittEnable, 1), Ok(()));
        assert_eq!(window[B4] & (1 << 14), 1 << 14);
        assert_eq!(
            ctrl.config_set(A3, PinConfig::InputSchmittEnable, 1),
            Err(ErrorCode::NoSupport)
        );
        assert_eq!(window[A3], 0);
    }

    #[test]
    fn clock_out_pad_has_no_drive_control() {
        let mut window = window();
        let ctrl = controller(&mut window);

        assert_eq!(
            ctrl.config_set(A5, PinConfig::DriveStrength, 4),
            Err(ErrorCode::NoSupport)
        );
        assert_eq!(
            ctrl.config_get(A5, PinConfig::DriveStrength),
            Err(ErrorCode::NoSupport)
        );
    }
}
