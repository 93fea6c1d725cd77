//! Variadic argument lists
//!
//! Design: A `VaListBuilder` stages argument bytes, `finalize` moves them into
//! scope memory and returns a read-only `VaList`. A `VaListReader` walks the
//! list with the same classification and placement the builder used.
//!
//! Architecture:
//! - `builder.rs` - append and finalize
//! - `reader.rs` - cursor over a finalized list
//! - `header.rs` - native header images per ABI family

mod builder;
mod header;
mod reader;


pub use builder::VaListBuilder;
pub use header::VaListHeader;
pub use reader::VaListReader;

use crate::abi::{AbiProfile, Area, ArgPlacement};
use crate::errors::Result;
use crate::layout::{Endian, Layout, ScalarKind};
use crate::scope::{Scope, WeakScope};
use crate::value::ArgValue;
use std::sync::Arc;

/// One appended argument as the builder placed it
#[derive(Debug, Clone)]
pub(crate) struct RecordedArg {
    pub(crate) layout: Layout,
    pub(crate) placement: ArgPlacement,
}

/// Immutable description of a finalized list, owned by its scope registry
#[derive(Debug)]
pub(crate) struct ListRecord {
    pub(crate) profile: AbiProfile,
    pub(crate) args: Vec<RecordedArg>,
    pub(crate) header: usize,
    pub(crate) gp_base: usize,
    pub(crate) fp_base: usize,
    pub(crate) stack_base: usize,
}

impl ListRecord {
    #[inline]
    pub(crate) fn base(&self, area: Area) -> usize {
        match area {
            Area::Gp => self.gp_base,
            Area::Fp => self.fp_base,
            Area::Stack => self.stack_base,
        }
    }
}

/// Finalized, read-only argument list bound to a scope
#[derive(Debug, Clone)]
pub struct VaList {
    record: Arc<ListRecord>,
    scope: WeakScope,
}

impl VaList {
    pub(crate) fn new(record: Arc<ListRecord>, scope: WeakScope) -> Self {
        Self { record, scope }
    }

    /// Recover a list from the header address native code was given
    pub fn from_address(scope: &Scope, address: usize) -> Result<Self> {
        let record = scope.lookup_list(address)?;
        Ok(Self::new(record, scope.downgrade()))
    }

    /// Header address, the value passed as `va_list`
    #[inline]
    pub fn address(&self) -> usize {
        self.record.header
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.record.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.record.args.is_empty()
    }

    #[inline]
    pub fn profile(&self) -> &AbiProfile {
        &self.record.profile
    }

    /// Placement of argument `index`
    pub fn placement(&self, index: usize) -> Option<&ArgPlacement> {
        self.record.args.get(index).map(|arg| &arg.placement)
    }

    /// Decode the native header from scope memory
    pub fn header(&self) -> Result<VaListHeader> {
        let scope = self.scope.upgrade()?;
        let profile = &self.record.profile;
        let bytes = scope.read_at(self.record.header, VaListHeader::size(profile))?;
        VaListHeader::decode(profile, &bytes)
    }

    /// Fresh cursor at the first argument
    pub fn reader(&self) -> VaListReader {
        VaListReader::new(self.record.clone(), self.scope.clone())
    }
}

/// Register image of a scalar: integers extended, `f32` in the low half
/// on little endian and the high half on big endian
pub(crate) fn scalar_slot(kind: ScalarKind, bytes: &[u8], width: usize, endian: Endian) -> Vec<u8> {
    if kind == ScalarKind::F32 {
        let mut slot = vec![0u8; width];
        let at = match endian {
            Endian::Little => 0,
            Endian::Big => width - 4,
        };
        slot[at..at + 4].copy_from_slice(bytes);
        slot
    } else {
        ArgValue::widen(kind, bytes, width, endian)
    }
}

/// Inverse of `scalar_slot`
pub(crate) fn scalar_from_slot(kind: ScalarKind, slot: &[u8], endian: Endian) -> Vec<u8> {
    let size = kind.size();
    match endian {
        Endian::Little => slot[..size].to_vec(),
        Endian::Big => slot[slot.len() - size..].to_vec(),
    }
}
