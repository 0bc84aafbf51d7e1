// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Clock registrations tied to a controller device's lifetime.
//!
//! A probe can bind a whole descriptor set to its device: the device
//! keeps a record of the set, and releasing the device unregisters the
//! recorded sets in reverse order. The discipline is reserve-then-act: a
//! record slot is claimed before the registration runs, so a registration
//! can never succeed and then fail to be tracked.
//!
//! Sets registered this way must never be unregistered by a probe's
//! explicit rollback path: that path owns only the unscoped sets, and
//! the two disciplines do not mix.

use crate::clk::{ClockData, ClockRegistry, ClockSet};
use crate::error::ErrorCode;

/// Upper bound of scoped set registrations one device can hold.
pub const MAX_SCOPED_SETS: usize = 8;

/// The release records of one controller device.
pub struct Device {
    sets: [Option<ClockSet>; MAX_SCOPED_SETS],
    committed: usize,
}

impl Device {
    pub fn new() -> Device {
        Device {
            sets: [None; MAX_SCOPED_SETS],
            committed: 0,
        }
    }

    /// Register `set` and bind its teardown to this device.
    ///
    /// On failure nothing is recorded and nothing stays registered.
    pub fn register_scoped<const CAP: usize, const NUM_CLOCKS: usize>(
        &mut self,
        registry: &mut ClockRegistry<CAP>,
        set: ClockSet,
        data: &mut ClockData<NUM_CLOCKS>,
    ) -> Result<(), ErrorCode> {
        if self.committed == self.sets.len() {
            return Err(ErrorCode::NoMem);
        }
        registry.register_clocks(set, data)?;
        self.sets[self.committed] = Some(set);
        self.committed += 1;
        Ok(())
    }

    /// Unwind every recorded set, newest first. Runs when the device goes
    /// away, whether from a remove or from a failed probe.
    pub fn release<const CAP: usize, const NUM_CLOCKS: usize>(
        &mut self,
        registry: &mut ClockRegistry<CAP>,
        data: &mut ClockData<NUM_CLOCKS>,
    ) {
        while self.committed > 0 {
            self.committed -= 1;
            if let Some(set) = self.sets[self.committed].take() {
                registry.unregister_clocks(set, data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clk::{FixedRateClock, PhaseClock};
    use crate::mmio::Mmio;

    static FIXED: [FixedRateClock; 1] = [FixedRateClock {
        index: 0,
        name: "scoped_osc",
        flags: 0,
        rate: 24_000_000,
    }];

    static DEGREES: [u32; 2] = [0, 180];
    static REGVALS: [u32; 2] = [0, 4];

    static PHASES: [PhaseClock; 1] = [PhaseClock {
        index: 1,
        name: "scoped_phase",
        parent: "scoped_osc",
        flags: 0,
        offset: 0x0,
        shift: 0,
        width: 3,
        degrees: &DEGREES,
        regvals: &REGVALS,
    }];

    #[test]
    fn release_unwinds_committed_sets() {
        let mut window = [0u32; 4];
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<8> = ClockRegistry::new();
        let mut data: ClockData<2> = ClockData::new(mmio);
        let mut device = Device::new();

        device
            .register_scoped(&mut registry, ClockSet::FixedRate(&FIXED), &mut data)
            .unwrap();
        device
            .register_scoped(&mut registry, ClockSet::Phase(&PHASES), &mut data)
            .unwrap();
        assert!(registry.lookup("scoped_phase").is_some());

        device.release(&mut registry, &mut data);
        assert_eq!(registry.lookup("scoped_osc"), None);
        assert_eq!(registry.lookup("scoped_phase"), None);
        assert_eq!(data.get(0), None);
        assert_eq!(data.get(1), None);
    }

    #[test]
    fn failed_registration_leaves_no_record() {
        let mut window = [0u32; 4];
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<8> = ClockRegistry::new();
        let mut data: ClockData<2> = ClockData::new(mmio);
        let mut device = Device::new();

        device
            .register_scoped(&mut registry, ClockSet::FixedRate(&FIXED), &mut data)
            .unwrap();
        // Same names again: the registration is refused, so no second
        // record may be committed.
        assert_eq!(
            device.register_scoped(&mut registry, ClockSet::FixedRate(&FIXED), &mut data),
            Err(ErrorCode::Already)
        );

        device.release(&mut registry, &mut data);
        assert_eq!(registry.lookup("scoped_osc"), None);
    }

    #[test]
    fn record_slots_are_bounded() {
        let mut window = [0u32; 4];
        let mmio = unsafe { Mmio::new(window.as_mut_ptr()) };
        let mut registry: ClockRegistry<8> = ClockRegistry::new();
        let mut data: ClockData<2> = ClockData::new(mmio);
        let mut device = Device::new();

        static EMPTY: [FixedRateClock; 0] = [];
        for _ in 0..MAX_SCOPED_SETS {
            device
                .register_scoped(&mut registry, ClockSet::FixedRate(&EMPTY), &mut data)
                .unwrap();
        }
        assert_eq!(
            device.register_scoped(&mut registry, ClockSet::FixedRate(&EMPTY), &mut data),
            Err(ErrorCode::NoMem)
        );
    }
}
