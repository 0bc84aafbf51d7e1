// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Standard error enum for clock and pin operations.

/// Categorised failures surfaced to the clock and pin frameworks.
///
/// Every fallible operation in these crates resolves to one of these
/// kinds; nothing is retried internally and no error is swallowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// A fixed-capacity table has no free slot left.
    NoMem,
    /// An argument is outside the operation's domain (zero parent rate,
    /// unknown phase degree, unresolvable parent name, bad index).
    Inval,
    /// The boot loader left the hardware unconfigured; the driver will
    /// not attempt a cold bring-up.
    Uninit,
    /// The pin's capability mask forbids the requested configuration.
    NoSupport,
    /// The requested function is not wired to this pin.
    NoFunction,
    /// The name is already registered.
    Already,
}
