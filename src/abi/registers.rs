//! Register and stack placement
//!
//! Both the builder and the reader drive a `RegisterAllocator` over the same
//! argument sequence, so a list written by one is read back by the other.

use super::{AbiProfile, Classification, SlotMechanism};
use crate::layout::{align_up, Layout};
use smallvec::SmallVec;

/// Storage area of a va_list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// General purpose register save area
    Gp,
    /// Floating point register save area
    Fp,
    /// Overflow (stack) area; the only area on uniform-slot targets
    Stack,
}

/// One contiguous run of bytes of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub area: Area,
    /// Byte offset inside the area
    pub offset: usize,
    /// Byte offset inside the value
    pub value_offset: usize,
    /// Bytes occupied; scalars always take a full register image
    pub width: usize,
}

/// Where one argument lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgPlacement {
    pub pieces: SmallVec<[Piece; 4]>,
    /// The pieces hold a pointer to a copy of the value
    pub indirect: bool,
    /// Register passing was attempted and failed
    pub spilled: bool,
    pub value_size: usize,
}

impl ArgPlacement {
    pub fn in_registers(&self) -> bool {
        self.pieces.iter().all(|p| p.area != Area::Stack)
    }
}

/// Register allocation state for one argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAllocator {
    profile: AbiProfile,
    gp_used: usize,
    fp_used: usize,
    stack_offset: usize,
}

impl RegisterAllocator {
    #[inline]
    pub const fn new(profile: AbiProfile) -> Self {
        Self {
            profile,
            gp_used: 0,
            fp_used: 0,
            stack_offset: 0,
        }
    }

    #[inline]
    pub const fn profile(&self) -> &AbiProfile {
        &self.profile
    }

    #[inline]
    pub const fn gp_used(&self) -> usize {
        self.gp_used
    }

    #[inline]
    pub const fn fp_used(&self) -> usize {
        self.fp_used
    }

    /// Bytes of stack area consumed so far
    #[inline]
    pub const fn stack_size(&self) -> usize {
        self.stack_offset
    }

    /// Reset for new list
    #[inline]
    pub fn reset(&mut self) {
        self.gp_used = 0;
        self.fp_used = 0;
        self.stack_offset = 0;
    }

    /// Place the next argument and advance
    ///
    /// Registers are assigned all or nothing: an argument that does not fit
    /// entirely in the remaining registers goes to the stack in one piece.
    pub fn place(&mut self, class: &Classification, layout: &Layout) -> ArgPlacement {
        let indirect = class.is_reference();
        let value_size = layout.size();

        if self.profile.register_save_area && !class.is_stack() {
            // Work on a copy; registers are committed only on success
            let mut next = self.clone();
            if let Some(pieces) = next.try_registers(class, layout) {
                *self = next;
                return ArgPlacement {
                    pieces,
                    indirect,
                    spilled: false,
                    value_size,
                };
            }
            if self.profile.capabilities.exhaust_on_spill {
                if class.gp_slots() > 0 {
                    self.gp_used = self.profile.gp_registers;
                }
                if class.fp_slots() > 0 {
                    self.fp_used = self.profile.fp_registers;
                }
            }
            let mut placement = self.stack(layout, indirect);
            placement.spilled = true;
            return placement;
        }

        self.stack(layout, indirect)
    }

    fn try_registers(
        &mut self,
        class: &Classification,
        layout: &Layout,
    ) -> Option<SmallVec<[Piece; 4]>> {
        if self.gp_used + class.gp_slots() > self.profile.gp_registers
            || self.fp_used + class.fp_slots() > self.profile.fp_registers
        {
            return None;
        }

        let scalar = layout.as_scalar().is_some();
        let width = self.profile.register_width;
        let mut pieces = SmallVec::new();
        for slot in &class.slots {
            let (area, offset) = match slot.mechanism {
                SlotMechanism::FpRegister => {
                    let offset = self.fp_used * self.profile.fp_slot_width;
                    self.fp_used += 1;
                    (Area::Fp, offset)
                }
                SlotMechanism::GpRegister | SlotMechanism::ReferenceViaRegister => {
                    let offset = self.gp_used * width;
                    self.gp_used += 1;
                    (Area::Gp, offset)
                }
                SlotMechanism::Stack => return None,
            };
            pieces.push(Piece {
                area,
                offset,
                value_offset: slot.offset,
                width: if scalar || slot.mechanism == SlotMechanism::ReferenceViaRegister {
                    width
                } else {
                    slot.byte_width
                },
            });
        }
        Some(pieces)
    }

    fn stack(&mut self, layout: &Layout, indirect: bool) -> ArgPlacement {
        let width = self.profile.register_width;
        let (size, align) = if indirect {
            (width, width)
        } else if layout.as_scalar().is_some() {
            (width, width)
        } else {
            let align = if layout.align() > width { 2 * width } else { width };
            (layout.size(), align)
        };

        let offset = align_up(self.stack_offset, align);
        self.stack_offset = offset + align_up(size, width);

        let mut pieces = SmallVec::new();
        pieces.push(Piece {
            area: Area::Stack,
            offset,
            value_offset: 0,
            width: size,
        });
        ArgPlacement {
            pieces,
            indirect,
            spilled: false,
            value_size: layout.size(),
        }
    }
}
