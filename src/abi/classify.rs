//! Argument classification
//!
//! Maps a layout to the register classes it needs on a target. The result
//! depends only on the layout and the profile, so builder and reader always
//! agree on it.

use super::{AbiProfile, AggregatePassing, Demotion, RuleSet};
use crate::errors::{MarshalError, Result};
use crate::layout::{Layout, ScalarKind, StructLayout};
use smallvec::SmallVec;
use std::fmt;

/// Passing mechanism of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotMechanism {
    GpRegister,
    FpRegister,
    /// Pointer to a scope-owned copy, carried in a GP slot
    ReferenceViaRegister,
    Stack,
}

impl fmt::Display for SlotMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GpRegister => "GP_REGISTER",
            Self::FpRegister => "FP_REGISTER",
            Self::ReferenceViaRegister => "REFERENCE_VIA_REGISTER",
            Self::Stack => "STACK",
        })
    }
}

/// One classified piece of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassifiedSlot {
    pub mechanism: SlotMechanism,
    /// Byte offset inside the value carried by this slot
    pub offset: usize,
    pub byte_width: usize,
    pub byte_alignment: usize,
}

impl ClassifiedSlot {
    fn scalar(kind: ScalarKind, offset: usize) -> Self {
        Self {
            mechanism: if kind.is_float() {
                SlotMechanism::FpRegister
            } else {
                SlotMechanism::GpRegister
            },
            offset,
            byte_width: kind.size(),
            byte_alignment: kind.align(),
        }
    }
}

/// Classification of a whole argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Classification {
    pub slots: SmallVec<[ClassifiedSlot; 4]>,
    /// Aggregate moved off the register path (stack copy or reference)
    pub demoted: bool,
}

impl Classification {
    fn single(slot: ClassifiedSlot) -> Self {
        let mut slots = SmallVec::new();
        slots.push(slot);
        Self { slots, demoted: false }
    }

    fn demote(layout: &Layout, profile: &AbiProfile, how: Demotion) -> Self {
        let slot = match how {
            Demotion::Stack => ClassifiedSlot {
                mechanism: SlotMechanism::Stack,
                offset: 0,
                byte_width: layout.size(),
                byte_alignment: layout.align(),
            },
            Demotion::Reference => ClassifiedSlot {
                mechanism: SlotMechanism::ReferenceViaRegister,
                offset: 0,
                byte_width: profile.register_width,
                byte_alignment: profile.register_width,
            },
        };
        let mut this = Self::single(slot);
        this.demoted = true;
        this
    }

    pub fn count(&self, mechanism: SlotMechanism) -> usize {
        self.slots.iter().filter(|s| s.mechanism == mechanism).count()
    }

    /// GP slots needed, references included
    pub fn gp_slots(&self) -> usize {
        self.count(SlotMechanism::GpRegister) + self.count(SlotMechanism::ReferenceViaRegister)
    }

    pub fn fp_slots(&self) -> usize {
        self.count(SlotMechanism::FpRegister)
    }

    pub fn is_reference(&self) -> bool {
        self.count(SlotMechanism::ReferenceViaRegister) > 0
    }

    pub fn is_stack(&self) -> bool {
        self.count(SlotMechanism::Stack) > 0
    }
}

/// Classify `layout` for `profile`
pub fn classify(layout: &Layout, profile: &AbiProfile) -> Result<Classification> {
    profile.check_layout(layout)?;
    match layout {
        Layout::Scalar(kind) => Ok(Classification::single(ClassifiedSlot::scalar(*kind, 0))),
        Layout::Struct(s) => Ok(classify_struct(layout, s, profile)),
        Layout::Padding(_) => Err(MarshalError::invalid_layout("padding cannot be passed")),
    }
}

fn classify_struct(layout: &Layout, s: &StructLayout, profile: &AbiProfile) -> Classification {
    let caps = &profile.capabilities;
    let leaves = layout.leaf_scalars();

    if let [(_, kind)] = leaves.as_slice() {
        if kind.is_integral()
            && kind.size() < profile.register_width
            && caps.single_field_struct == AggregatePassing::ByReference
        {
            return Classification::demote(layout, profile, Demotion::Reference);
        }
    }

    if caps.homogeneous_float_aggregates {
        if let Some(members) = homogeneous_members(&leaves) {
            return Classification {
                slots: members
                    .iter()
                    .map(|&(offset, kind)| ClassifiedSlot::scalar(kind, offset))
                    .collect(),
                demoted: false,
            };
        }
    }

    if caps.power_of_two_aggregates_only {
        return match s.size() {
            1 | 2 | 4 | 8 => Classification::single(ClassifiedSlot {
                mechanism: SlotMechanism::GpRegister,
                offset: 0,
                byte_width: s.size(),
                byte_alignment: s.align(),
            }),
            _ => Classification::demote(layout, profile, caps.oversize_aggregate),
        };
    }

    let width = profile.register_width;
    let chunks = (s.size() + width - 1) / width;
    if chunks > caps.register_aggregate_limit {
        return Classification::demote(layout, profile, caps.oversize_aggregate);
    }

    let mut slots = SmallVec::new();
    for chunk in 0..chunks {
        let start = chunk * width;
        let end = (start + width).min(s.size());
        let members: Vec<ScalarKind> = leaves
            .iter()
            // A member straddling the boundary occupies both chunks
            .filter(|(offset, kind)| *offset < end && *offset + kind.size() > start)
            .map(|&(_, kind)| kind)
            .collect();
        // Padding-only chunks carry nothing
        if members.is_empty() {
            continue;
        }
        let all_float = members.iter().all(|k| k.is_float());
        let mechanism = if all_float && profile.rules == RuleSet::Eightbyte {
            SlotMechanism::FpRegister
        } else {
            SlotMechanism::GpRegister
        };
        slots.push(ClassifiedSlot {
            mechanism,
            offset: start,
            byte_width: end - start,
            byte_alignment: s.align().min(width),
        });
    }

    Classification { slots, demoted: false }
}

/// 1-4 members of one float kind and nothing else
fn homogeneous_members(leaves: &[(usize, ScalarKind)]) -> Option<&[(usize, ScalarKind)]> {
    let (_, first) = leaves.first()?;
    if !first.is_float() || leaves.len() > 4 {
        return None;
    }
    leaves.iter().all(|(_, k)| k == first).then_some(leaves)
}
