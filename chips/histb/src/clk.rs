// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Clock node shapes, the by-name registry and set registration.
//!
//! A CRG instance describes its tree with static descriptor tables, one
//! table per node shape. Registration turns descriptors into live nodes in
//! a shared [`ClockRegistry`] and records the node handle in the
//! instance's [`ClockData`] under the descriptor's stable index, which is
//! what consumers resolve through.
//!
//! Parents are referenced by name and resolved late, at the first
//! operation that needs them. This lets a node's parent live in a
//! different controller instance, and tolerates tables that name sources
//! which never get registered; an operation that actually needs such a
//! parent fails with [`ErrorCode::Inval`].

use core::cell::Cell;

use crate::error::ErrorCode;
use crate::mmio::Mmio;
use crate::pll::Pll;

/// Framework flags carried by every clock node.
pub mod flags {
    /// Rate requests are expected to propagate to the parent.
    pub const SET_RATE_PARENT: u32 = 1 << 0;
    /// The clock must never be gated, whatever the enable refcount says.
    pub const IS_CRITICAL: u32 = 1 << 1;
}

/// A source with a constant rate in Hz.
pub struct FixedRateClock {
    pub index: usize,
    pub name: &'static str,
    pub flags: u32,
    pub rate: u64,
}

/// A fixed rational multiple of its parent.
pub struct FixedFactorClock {
    pub index: usize,
    pub name: &'static str,
    pub parent: &'static str,
    pub flags: u32,
    pub mult: u32,
    pub div: u32,
}

/// A parent selector.
///
/// `table` maps the logical parent position to the raw selector value, so
/// sparse encodings like `{0, 1, 2, 3, 6}` work; it is as long as
/// `parents`.
pub struct MuxClock {
    pub index: usize,
    pub name: &'static str,
    pub parents: &'static [&'static str],
    pub flags: u32,
    pub offset: usize,
    pub shift: u32,
    pub width: u32,
    /// Choose the parent with the nearest rate instead of the highest one
    /// not above the request.
    pub round_closest: bool,
    pub table: &'static [u32],
}

/// A programmable integer divider.
///
/// When `linear` is set the field value is the divisor itself; otherwise
/// the divisor is the field value plus one.
pub struct DividerClock {
    pub index: usize,
    pub name: &'static str,
    pub parent: &'static str,
    pub flags: u32,
    pub offset: usize,
    pub shift: u32,
    pub width: u32,
    pub linear: bool,
}

/// A single-bit gate; the bit set means ungated.
pub struct GateClock {
    pub index: usize,
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub flags: u32,
    pub offset: usize,
    pub bit: u32,
}

/// A quantised phase shifter.
///
/// `degrees` and `regvals` are parallel tables of the legal shifts and
/// their raw field encodings.
pub struct PhaseClock {
    pub index: usize,
    pub name: &'static str,
    pub parent: &'static str,
    pub flags: u32,
    pub offset: usize,
    pub shift: u32,
    pub width: u32,
    pub degrees: &'static [u32],
    pub regvals: &'static [u32],
}

/// A boot-programmed PLL; see [`crate::pll`].
pub struct PllClock {
    pub index: usize,
    pub name: &'static str,
    pub parent: &'static str,
    pub flags: u32,
    pub offset: usize,
}

/// One homogeneous slice of descriptors, the unit of (un)registration.
#[derive(Clone, Copy)]
pub enum ClockSet {
    FixedRate(&'static [FixedRateClock]),
    FixedFactor(&'static [FixedFactorClock]),
    Mux(&'static [MuxClock]),
    Divider(&'static [DividerClock]),
    Gate(&'static [GateClock]),
    Phase(&'static [PhaseClock]),
    Pll(&'static [PllClock]),
}

impl ClockSet {
    fn len(&self) -> usize {
        match self {
            ClockSet::FixedRate(clks) => clks.len(),
            ClockSet::FixedFactor(clks) => clks.len(),
            ClockSet::Mux(clks) => clks.len(),
            ClockSet::Divider(clks) => clks.len(),
            ClockSet::Gate(clks) => clks.len(),
            ClockSet::Phase(clks) => clks.len(),
            ClockSet::Pll(clks) => clks.len(),
        }
    }

    fn index(&self, i: usize) -> usize {
        match self {
            ClockSet::FixedRate(clks) => clks[i].index,
            ClockSet::FixedFactor(clks) => clks[i].index,
            ClockSet::Mux(clks) => clks[i].index,
            ClockSet::Divider(clks) => clks[i].index,
            ClockSet::Gate(clks) => clks[i].index,
            ClockSet::Phase(clks) => clks[i].index,
            ClockSet::Pll(clks) => clks[i].index,
        }
    }
}

enum Parents {
    None,
    One(&'static str),
    Many(&'static [&'static str]),
}

impl Parents {
    fn get(&self, position: usize) -> Option<&'static str> {
        match self {
            Parents::None => None,
            Parents::One(name) => (position == 0).then_some(*name),
            Parents::Many(names) => names.get(position).copied(),
        }
    }
}

enum ClockKind {
    FixedRate {
        rate: u64,
    },
    FixedFactor {
        mult: u32,
        div: u32,
    },
    Mux {
        offset: usize,
        shift: u32,
        width: u32,
        table: &'static [u32],
        round_closest: bool,
    },
    Divider {
        offset: usize,
        shift: u32,
        width: u32,
        linear: bool,
    },
    Gate {
        offset: usize,
        bit: u32,
    },
    Phase {
        offset: usize,
        shift: u32,
        width: u32,
        degrees: &'static [u32],
        regvals: &'static [u32],
    },
    Pll(Pll),
}

struct ClockNode {
    name: &'static str,
    parents: Parents,
    flags: u32,
    mmio: Mmio,
    kind: ClockKind,
    enable_count: Cell<u32>,
}

/// Handle on a registered clock node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockId(usize);

fn field_get(word: u32, shift: u32, width: u32) -> u32 {
    debug_assert!(width < 32);
    (word >> shift) & ((1 << width) - 1)
}

fn field_set(word: u32, shift: u32, width: u32, value: u32) -> u32 {
    debug_assert!(width < 32);
    let mask = ((1 << width) - 1) << shift;
    (word & !mask) | ((value << shift) & mask)
}

/// Per-instance publication block: the dense index-to-node map consumers
/// resolve through, plus the register window every child node uses.
pub struct ClockData<const NUM_CLOCKS: usize> {
    mmio: Mmio,
    clks: [Option<ClockId>; NUM_CLOCKS],
}

impl<const NUM_CLOCKS: usize> ClockData<NUM_CLOCKS> {
    pub fn new(mmio: Mmio) -> ClockData<NUM_CLOCKS> {
        ClockData {
            mmio,
            clks: [None; NUM_CLOCKS],
        }
    }

    pub fn mmio(&self) -> Mmio {
        self.mmio
    }

    /// The single-cell resolver: stable index to node handle.
    pub fn get(&self, index: usize) -> Option<ClockId> {
        self.clks.get(index).copied().flatten()
    }

    fn set(&mut self, index: usize, id: ClockId) -> Result<(), ErrorCode> {
        let slot = self.clks.get_mut(index).ok_or(ErrorCode::Inval)?;
        debug_assert!(slot.is_none(), "clock index {} reused", index);
        *slot = Some(id);
        Ok(())
    }

    fn clear(&mut self, index: usize) -> Option<ClockId> {
        self.clks.get_mut(index).and_then(|slot| slot.take())
    }
}

const MAX_PROVIDERS: usize = 4;

/// The shared clock table: nodes from every controller instance, keyed by
/// name, plus the published provider identifiers.
///
/// The surrounding framework serialises all calls; the registry itself
/// never blocks and holds no lock.
pub struct ClockRegistry<const CAP: usize> {
    nodes: [Option<ClockNode>; CAP],
    providers: [Option<&'static str>; MAX_PROVIDERS],
}

impl<const CAP: usize> ClockRegistry<CAP> {
    pub fn new() -> ClockRegistry<CAP> {
        ClockRegistry {
            nodes: core::array::from_fn(|_| None),
            providers: [None; MAX_PROVIDERS],
        }
    }

    /// Global by-name lookup, across controller instances.
    pub fn lookup(&self, name: &str) -> Option<ClockId> {
        self.nodes
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|node| node.name == name))
            .map(ClockId)
    }

    fn node(&self, id: ClockId) -> Result<&ClockNode, ErrorCode> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(ErrorCode::Inval)
    }

    fn insert(&mut self, node: ClockNode) -> Result<ClockId, ErrorCode> {
        if self.lookup(node.name).is_some() {
            return Err(ErrorCode::Already);
        }
        let slot = self
            .nodes
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(ErrorCode::NoMem)?;
        self.nodes[slot] = Some(node);
        Ok(ClockId(slot))
    }

    fn remove(&mut self, id: ClockId) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Publish a controller under its identifier.
    pub fn add_provider(&mut self, node: &'static str) -> Result<(), ErrorCode> {
        if self.provider_registered(node) {
            return Err(ErrorCode::Already);
        }
        let slot = self
            .providers
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(ErrorCode::NoMem)?;
        self.providers[slot] = Some(node);
        Ok(())
    }

    pub fn del_provider(&mut self, node: &str) {
        for slot in self.providers.iter_mut() {
            if *slot == Some(node) {
                *slot = None;
            }
        }
    }

    pub fn provider_registered(&self, node: &str) -> bool {
        self.providers.iter().any(|slot| *slot == Some(node))
    }

    fn make_node(set: ClockSet, i: usize, mmio: Mmio) -> ClockNode {
        match set {
            ClockSet::FixedRate(clks) => {
                let desc = &clks[i];
                ClockNode {
                    name: desc.name,
                    parents: Parents::None,
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::FixedRate { rate: desc.rate },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::FixedFactor(clks) => {
                let desc = &clks[i];
                debug_assert!(desc.div >= 1);
                ClockNode {
                    name: desc.name,
                    parents: Parents::One(desc.parent),
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::FixedFactor {
                        mult: desc.mult,
                        div: desc.div,
                    },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::Mux(clks) => {
                let desc = &clks[i];
                debug_assert_eq!(desc.table.len(), desc.parents.len());
                ClockNode {
                    name: desc.name,
                    parents: Parents::Many(desc.parents),
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::Mux {
                        offset: desc.offset,
                        shift: desc.shift,
                        width: desc.width,
                        table: desc.table,
                        round_closest: desc.round_closest,
                    },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::Divider(clks) => {
                let desc = &clks[i];
                ClockNode {
                    name: desc.name,
                    parents: Parents::One(desc.parent),
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::Divider {
                        offset: desc.offset,
                        shift: desc.shift,
                        width: desc.width,
                        linear: desc.linear,
                    },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::Gate(clks) => {
                let desc = &clks[i];
                ClockNode {
                    name: desc.name,
                    parents: match desc.parent {
                        Some(parent) => Parents::One(parent),
                        None => Parents::None,
                    },
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::Gate {
                        offset: desc.offset,
                        bit: desc.bit,
                    },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::Phase(clks) => {
                let desc = &clks[i];
                debug_assert_eq!(desc.degrees.len(), desc.regvals.len());
                ClockNode {
                    name: desc.name,
                    parents: Parents::One(desc.parent),
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::Phase {
                        offset: desc.offset,
                        shift: desc.shift,
                        width: desc.width,
                        degrees: desc.degrees,
                        regvals: desc.regvals,
                    },
                    enable_count: Cell::new(0),
                }
            }
            ClockSet::Pll(clks) => {
                let desc = &clks[i];
                ClockNode {
                    name: desc.name,
                    parents: Parents::One(desc.parent),
                    flags: desc.flags,
                    mmio,
                    kind: ClockKind::Pll(Pll::new(mmio, desc.offset)),
                    enable_count: Cell::new(0),
                }
            }
        }
    }

    /// Register every descriptor of `set` into this registry and record
    /// the handles in `data`.
    ///
    /// A failure part-way unregisters the descriptors of this set that
    /// already made it, then reports the failure; `data` and the registry
    /// are left as they were.
    pub fn register_clocks<const NUM_CLOCKS: usize>(
        &mut self,
        set: ClockSet,
        data: &mut ClockData<NUM_CLOCKS>,
    ) -> Result<(), ErrorCode> {
        for i in 0..set.len() {
            let node = Self::make_node(set, i, data.mmio());
            let result = self.insert(node).and_then(|id| {
                data.set(set.index(i), id).map_err(|e| {
                    self.remove(id);
                    e
                })
            });
            if let Err(e) = result {
                for j in (0..i).rev() {
                    if let Some(id) = data.clear(set.index(j)) {
                        self.remove(id);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop every node of `set` from the registry and from `data`, in
    /// reverse table order. Nodes that were never registered are skipped,
    /// so this is safe to run against a partially-built instance.
    pub fn unregister_clocks<const NUM_CLOCKS: usize>(
        &mut self,
        set: ClockSet,
        data: &mut ClockData<NUM_CLOCKS>,
    ) {
        for i in (0..set.len()).rev() {
            if let Some(id) = data.clear(set.index(i)) {
                self.remove(id);
            }
        }
    }

    pub fn name(&self, id: ClockId) -> Result<&'static str, ErrorCode> {
        Ok(self.node(id)?.name)
    }

    /// Resolve the node's current parent, if it has one.
    fn parent_of(&self, id: ClockId) -> Result<Option<ClockId>, ErrorCode> {
        let node = self.node(id)?;
        let position = match &node.kind {
            ClockKind::Mux {
                offset,
                shift,
                width,
                table,
                ..
            } => {
                let raw = field_get(node.mmio.read(*offset), *shift, *width);
                table
                    .iter()
                    .position(|&value| value == raw)
                    .ok_or(ErrorCode::Inval)?
            }
            _ => 0,
        };
        match node.parents.get(position) {
            None => Ok(None),
            Some(name) => Ok(Some(self.lookup(name).ok_or(ErrorCode::Inval)?)),
        }
    }

    fn parent_rate(&self, id: ClockId) -> Result<u64, ErrorCode> {
        match self.parent_of(id)? {
            Some(parent) => self.rate(parent),
            None => Err(ErrorCode::Inval),
        }
    }

    /// Latch boot-time state. Only PLL nodes do work here.
    pub fn prepare(&self, id: ClockId) -> Result<(), ErrorCode> {
        match &self.node(id)?.kind {
            ClockKind::Pll(pll) => pll.prepare(),
            _ => Ok(()),
        }
    }

    /// Current rate of the node, walking up the parent chain.
    pub fn rate(&self, id: ClockId) -> Result<u64, ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::FixedRate { rate } => Ok(*rate),
            ClockKind::FixedFactor { mult, div } => {
                let parent = self.parent_rate(id)?;
                Ok((parent as u128 * *mult as u128 / *div as u128) as u64)
            }
            ClockKind::Mux { .. } => self.parent_rate(id),
            ClockKind::Divider {
                offset,
                shift,
                width,
                linear,
            } => {
                let parent = self.parent_rate(id)?;
                let field = field_get(node.mmio.read(*offset), *shift, *width);
                let divisor = if *linear { field } else { field + 1 };
                if divisor == 0 {
                    return Err(ErrorCode::Inval);
                }
                Ok(parent / divisor as u64)
            }
            ClockKind::Gate { .. } | ClockKind::Phase { .. } => match self.parent_of(id)? {
                Some(parent) => self.rate(parent),
                // An unparented gate has no rate to report.
                None => Ok(0),
            },
            ClockKind::Pll(pll) => pll.recalc_rate(self.parent_rate(id)?),
        }
    }

    /// Position of the currently selected parent.
    pub fn get_parent(&self, id: ClockId) -> Result<usize, ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Mux {
                offset,
                shift,
                width,
                table,
                ..
            } => {
                let raw = field_get(node.mmio.read(*offset), *shift, *width);
                table
                    .iter()
                    .position(|&value| value == raw)
                    .ok_or(ErrorCode::Inval)
            }
            _ => match node.parents {
                Parents::None => Err(ErrorCode::Inval),
                _ => Ok(0),
            },
        }
    }

    /// Route the mux to the parent at `position`.
    pub fn set_parent(&self, id: ClockId, position: usize) -> Result<(), ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Mux {
                offset,
                shift,
                width,
                table,
                ..
            } => {
                let raw = *table.get(position).ok_or(ErrorCode::Inval)?;
                let word = node.mmio.read(*offset);
                node.mmio
                    .write(*offset, field_set(word, *shift, *width, raw));
                Ok(())
            }
            _ => Err(ErrorCode::NoSupport),
        }
    }

    /// Closest rate the node could provide for `rate`.
    ///
    /// PLLs solve for their feedback divisor; muxes pick among their
    /// parents' rates (nearest when the descriptor opted into
    /// round-closest, otherwise the highest candidate not above the
    /// request). Every other shape reports the rate it already has.
    pub fn determine_rate(&self, id: ClockId, rate: u64) -> Result<u64, ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Pll(pll) => pll.determine_rate(rate, self.parent_rate(id)?),
            ClockKind::Mux { table, round_closest, .. } => {
                let mut best: Option<u64> = None;
                for position in 0..table.len() {
                    let candidate = match node.parents.get(position) {
                        Some(name) => match self.lookup(name) {
                            Some(parent) => self.rate(parent)?,
                            // Parents that never got registered are not
                            // candidates.
                            None => continue,
                        },
                        None => continue,
                    };
                    let better = match best {
                        None => true,
                        Some(best) => {
                            if *round_closest {
                                candidate.abs_diff(rate) < best.abs_diff(rate)
                            } else if best > rate {
                                candidate < best
                            } else {
                                candidate <= rate && candidate > best
                            }
                        }
                    };
                    if better {
                        best = Some(candidate);
                    }
                }
                best.ok_or(ErrorCode::Inval)
            }
            _ => self.rate(id),
        }
    }

    /// Program the node for `rate`. Only PLL nodes support this; rate
    /// requests on the other shapes belong to the surrounding framework's
    /// parent propagation.
    pub fn set_rate(&self, id: ClockId, rate: u64) -> Result<(), ErrorCode> {
        match &self.node(id)?.kind {
            ClockKind::Pll(pll) => pll.set_rate(rate, self.parent_rate(id)?),
            _ => Err(ErrorCode::NoSupport),
        }
    }

    /// Ungate the node. Shapes without a gate succeed without touching
    /// hardware.
    pub fn enable(&self, id: ClockId) -> Result<(), ErrorCode> {
        let node = self.node(id)?;
        node.enable_count.set(node.enable_count.get() + 1);
        if let ClockKind::Gate { offset, bit } = &node.kind {
            let word = node.mmio.read(*offset);
            node.mmio.write(*offset, word | (1 << *bit));
        }
        Ok(())
    }

    /// Gate the node once its enable count drains. Critical clocks stay
    /// ungated no matter what.
    pub fn disable(&self, id: ClockId) -> Result<(), ErrorCode> {
        let node = self.node(id)?;
        node.enable_count
            .set(node.enable_count.get().saturating_sub(1));
        if node.enable_count.get() > 0 || node.flags & flags::IS_CRITICAL != 0 {
            return Ok(());
        }
        if let ClockKind::Gate { offset, bit } = &node.kind {
            let word = node.mmio.read(*offset);
            node.mmio.write(*offset, word & !(1 << *bit));
        }
        Ok(())
    }

    /// Current phase shift in degrees.
    pub fn get_phase(&self, id: ClockId) -> Result<u32, ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Phase {
                offset,
                shift,
                width,
                degrees,
                regvals,
            } => {
                let raw = field_get(node.mmio.read(*offset), *shift, *width);
                let position = regvals
                    .iter()
                    .position(|&value| value == raw)
                    .ok_or(ErrorCode::Inval)?;
                Ok(degrees[position])
            }
            _ => Err(ErrorCode::NoSupport),
        }
    }

    /// Shift the node by exactly `degrees`; only the quantised steps of
    /// the descriptor table are legal.
    pub fn set_phase(&self, id: ClockId, degrees: u32) -> Result<(), ErrorCode> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Phase {
                offset,
                shift,
                width,
                degrees: table,
                regvals,
            } => {
                let position = table
                    .iter()
                    .position(|&value| value == degrees)
                    .ok_or(ErrorCode::Inval)?;
                let word = node.mmio.read(*offset);
                node.mmio
                    .write(*offset, field_set(word, *shift, *width, regvals[position]));
                Ok(())
            }
            _ => Err(ErrorCode::NoSupport),
        }
    }
}
