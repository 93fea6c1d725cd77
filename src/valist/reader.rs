//! Cursor over a finalized list
//!
//! Each read recomputes placement for the expected layout and checks it
//! against what the builder recorded before touching memory.

use super::{scalar_from_slot, ListRecord};
use crate::abi::{classify, ArgPlacement, RegisterAllocator};
use crate::errors::{MarshalError, Result};
use crate::layout::{Layout, ScalarKind};
use crate::logging;
use crate::scope::{Scope, WeakScope};
use crate::value::ArgValue;
use std::sync::Arc;

/// Monotonic read cursor
#[derive(Debug, Clone)]
pub struct VaListReader {
    record: Arc<ListRecord>,
    scope: WeakScope,
    allocator: RegisterAllocator,
    index: usize,
}

impl VaListReader {
    pub(crate) fn new(record: Arc<ListRecord>, scope: WeakScope) -> Self {
        let allocator = RegisterAllocator::new(record.profile);
        Self {
            record,
            scope,
            allocator,
            index: 0,
        }
    }

    /// Arguments consumed so far
    #[inline]
    pub fn position(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.record.args.len() - self.index
    }

    /// Raw bytes of the next argument read as `layout`
    pub fn next(&mut self, layout: &Layout) -> Result<Vec<u8>> {
        let scope = self.scope.upgrade()?;
        scope.ensure_usable()?;

        let recorded = self
            .record
            .args
            .get(self.index)
            .ok_or(MarshalError::ArgumentListExhausted {
                consumed: self.index,
            })?;
        let class = classify(layout, &self.record.profile)?;
        let mut allocator = self.allocator.clone();
        let placement = allocator.place(&class, layout);
        if placement != recorded.placement {
            return Err(MarshalError::mismatch(&recorded.layout, layout));
        }

        let bytes = self.load(&scope, layout, &placement)?;
        logging::log_read(self.index, layout);
        self.allocator = allocator;
        self.index += 1;
        Ok(bytes)
    }

    /// Next argument decoded as a typed value
    pub fn next_value(&mut self, layout: &Layout) -> Result<ArgValue> {
        let bytes = self.next(layout)?;
        ArgValue::decode(layout, &bytes, self.record.profile.endian)
    }

    pub fn next_i32(&mut self) -> Result<i32> {
        match self.next_value(&Layout::scalar(ScalarKind::I32))? {
            ArgValue::I32(v) => Ok(v),
            other => Err(MarshalError::mismatch(ScalarKind::I32, other.describe())),
        }
    }

    pub fn next_i64(&mut self) -> Result<i64> {
        match self.next_value(&Layout::scalar(ScalarKind::I64))? {
            ArgValue::I64(v) => Ok(v),
            other => Err(MarshalError::mismatch(ScalarKind::I64, other.describe())),
        }
    }

    pub fn next_f32(&mut self) -> Result<f32> {
        match self.next_value(&Layout::scalar(ScalarKind::F32))? {
            ArgValue::F32(v) => Ok(v),
            other => Err(MarshalError::mismatch(ScalarKind::F32, other.describe())),
        }
    }

    pub fn next_f64(&mut self) -> Result<f64> {
        match self.next_value(&Layout::scalar(ScalarKind::F64))? {
            ArgValue::F64(v) => Ok(v),
            other => Err(MarshalError::mismatch(ScalarKind::F64, other.describe())),
        }
    }

    pub fn next_address(&mut self) -> Result<usize> {
        match self.next_value(&Layout::scalar(ScalarKind::Address))? {
            ArgValue::Address(v) => Ok(v),
            other => Err(MarshalError::mismatch(ScalarKind::Address, other.describe())),
        }
    }

    /// Skip arguments of the given layouts; all or nothing
    pub fn skip(&mut self, layouts: &[Layout]) -> Result<()> {
        let mut probe = self.clone();
        for layout in layouts {
            probe.next(layout)?;
        }
        *self = probe;
        Ok(())
    }

    fn load(&self, scope: &Scope, layout: &Layout, placement: &ArgPlacement) -> Result<Vec<u8>> {
        let endian = self.record.profile.endian;

        if placement.indirect {
            let piece = &placement.pieces[0];
            let slot = scope.read_at(self.record.base(piece.area) + piece.offset, piece.width)?;
            let address = endian.decode_bits(&slot) as usize;
            return scope.read_at(address, placement.value_size);
        }

        if let Some(kind) = layout.as_scalar() {
            let piece = &placement.pieces[0];
            let slot = scope.read_at(self.record.base(piece.area) + piece.offset, piece.width)?;
            return Ok(scalar_from_slot(kind, &slot, endian));
        }

        let mut image = vec![0u8; placement.value_size];
        for piece in &placement.pieces {
            let bytes = scope.read_at(self.record.base(piece.area) + piece.offset, piece.width)?;
            image[piece.value_offset..piece.value_offset + piece.width].copy_from_slice(&bytes);
        }
        Ok(image)
    }
}
