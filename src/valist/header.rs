//! va_list header images
//!
//! The header is what native code receives: a small struct pointing at the
//! save and overflow areas, or a single slot pointer on uniform targets.

use crate::abi::{AbiProfile, RuleSet};
use crate::errors::{MarshalError, Result};
use crate::layout::Endian;

/// Decoded header of a finalized list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaListHeader {
    /// `{ gp_offset, fp_offset, overflow_arg_area, reg_save_area }`
    SysV {
        gp_offset: u32,
        fp_offset: u32,
        overflow_arg_area: usize,
        reg_save_area: usize,
    },
    /// `{ __stack, __gr_top, __vr_top, __gr_offs, __vr_offs }`
    Aapcs64 {
        stack: usize,
        gr_top: usize,
        vr_top: usize,
        gr_offs: i32,
        vr_offs: i32,
    },
    /// Pointer to the next argument slot
    Pointer { next_slot: usize },
}

impl VaListHeader {
    /// Header size in bytes for `profile`
    pub const fn size(profile: &AbiProfile) -> usize {
        match profile.rules {
            RuleSet::Eightbyte => 24,
            RuleSet::Homogeneous => 32,
            RuleSet::UniformSlots => 8,
        }
    }

    /// Header for a fresh list whose areas start at the given addresses
    pub fn initial(profile: &AbiProfile, save_area: usize, stack: usize) -> Self {
        let gp_size = profile.gp_area_size();
        let fp_size = profile.fp_area_size();
        match profile.rules {
            RuleSet::Eightbyte => Self::SysV {
                gp_offset: 0,
                fp_offset: gp_size as u32,
                overflow_arg_area: stack,
                reg_save_area: save_area,
            },
            RuleSet::Homogeneous => Self::Aapcs64 {
                stack,
                gr_top: save_area + gp_size,
                vr_top: save_area + gp_size + fp_size,
                gr_offs: -(gp_size as i32),
                vr_offs: -(fp_size as i32),
            },
            RuleSet::UniformSlots => Self::Pointer { next_slot: stack },
        }
    }

    pub fn encode(&self, endian: Endian) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        match *self {
            Self::SysV {
                gp_offset,
                fp_offset,
                overflow_arg_area,
                reg_save_area,
            } => {
                out.extend(endian.encode_bits(gp_offset as u64, 4));
                out.extend(endian.encode_bits(fp_offset as u64, 4));
                out.extend(endian.encode_bits(overflow_arg_area as u64, 8));
                out.extend(endian.encode_bits(reg_save_area as u64, 8));
            }
            Self::Aapcs64 {
                stack,
                gr_top,
                vr_top,
                gr_offs,
                vr_offs,
            } => {
                out.extend(endian.encode_bits(stack as u64, 8));
                out.extend(endian.encode_bits(gr_top as u64, 8));
                out.extend(endian.encode_bits(vr_top as u64, 8));
                out.extend(endian.encode_bits(gr_offs as u32 as u64, 4));
                out.extend(endian.encode_bits(vr_offs as u32 as u64, 4));
            }
            Self::Pointer { next_slot } => {
                out.extend(endian.encode_bits(next_slot as u64, 8));
            }
        }
        out
    }

    pub fn decode(profile: &AbiProfile, bytes: &[u8]) -> Result<Self> {
        let expected = Self::size(profile);
        if bytes.len() != expected {
            return Err(MarshalError::mismatch(
                format!("{} byte header", expected),
                format!("{} bytes", bytes.len()),
            ));
        }
        let endian = profile.endian;
        let word = |at: usize, width: usize| endian.decode_bits(&bytes[at..at + width]);
        Ok(match profile.rules {
            RuleSet::Eightbyte => Self::SysV {
                gp_offset: word(0, 4) as u32,
                fp_offset: word(4, 4) as u32,
                overflow_arg_area: word(8, 8) as usize,
                reg_save_area: word(16, 8) as usize,
            },
            RuleSet::Homogeneous => Self::Aapcs64 {
                stack: word(0, 8) as usize,
                gr_top: word(8, 8) as usize,
                vr_top: word(16, 8) as usize,
                gr_offs: word(24, 4) as u32 as i32,
                vr_offs: word(28, 4) as u32 as i32,
            },
            RuleSet::UniformSlots => Self::Pointer {
                next_slot: word(0, 8) as usize,
            },
        })
    }
}
