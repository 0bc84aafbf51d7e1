// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Shared clock and pin-control engines for HiSTB set-top-box SoCs.
//!
//! The CRG (clock and reset generator) blocks of this family expose their
//! whole clock tree through a handful of node shapes: boot-programmed PLLs,
//! fixed-rate sources, table-encoded multiplexers, dividers, single-bit
//! gates and quantised phase taps. This crate implements the rate math and
//! register programming for those shapes, the by-name registry the nodes
//! are published through, and the IOCONFIG pin-mux/pin-conf engine.
//!
//! SoC specifics (node tables, pin tables, index assignments) live in the
//! per-chip crates; see `hi3798mv200`.

#![no_std]

// This is used to run the tests on a host.
#[cfg(test)]
#[macro_use]
extern crate std;

pub mod clk;
pub mod devres;
pub mod error;
pub mod mmio;
pub mod pinctrl;
pub mod pll;

pub use error::ErrorCode;
