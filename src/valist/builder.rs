//! Argument list builder
//!
//! Append is staged in builder-owned buffers shaped like the native areas.
//! Nothing touches scope memory until `finalize`.

use super::{scalar_slot, ListRecord, RecordedArg, VaList, VaListHeader};
use crate::abi::{classify, AbiProfile, Area, Piece, RegisterAllocator};
use crate::errors::{MarshalError, Result};
use crate::layout::{Layout, ScalarKind};
use crate::logging;
use crate::scope::{Scope, WeakScope};
use crate::value::ArgValue;
use std::sync::Arc;

/// Copy of a by-reference argument, materialized at finalize
#[derive(Debug, Clone)]
struct PendingCopy {
    arg: usize,
    image: Vec<u8>,
    align: usize,
}

/// Append-only builder for one argument list
#[derive(Debug)]
pub struct VaListBuilder {
    profile: AbiProfile,
    allocator: RegisterAllocator,
    gp: Vec<u8>,
    fp: Vec<u8>,
    stack: Vec<u8>,
    args: Vec<RecordedArg>,
    copies: Vec<PendingCopy>,
    scope: Option<WeakScope>,
    finalized: bool,
}

impl VaListBuilder {
    pub fn new(profile: AbiProfile) -> Self {
        Self {
            profile,
            allocator: RegisterAllocator::new(profile),
            gp: vec![0; profile.gp_area_size()],
            fp: vec![0; profile.fp_area_size()],
            stack: Vec::new(),
            args: Vec::new(),
            copies: Vec::new(),
            scope: None,
            finalized: false,
        }
    }

    /// Builder bound to `scope`; appends fail once the scope is unusable
    pub fn in_scope(profile: AbiProfile, scope: &Scope) -> Self {
        let mut builder = Self::new(profile);
        builder.scope = Some(scope.downgrade());
        builder
    }

    /// Build a list in one step
    pub fn make<F>(profile: AbiProfile, scope: &Scope, build: F) -> Result<VaList>
    where
        F: FnOnce(&mut VaListBuilder) -> Result<()>,
    {
        let mut builder = Self::in_scope(profile, scope);
        build(&mut builder)?;
        builder.finalize(scope)
    }

    #[inline]
    pub fn profile(&self) -> &AbiProfile {
        &self.profile
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append `value` laid out as `layout`
    pub fn append(&mut self, layout: &Layout, value: &ArgValue) -> Result<&mut Self> {
        self.check_usable()?;
        let endian = self.profile.endian;
        let image = value.encode(layout, endian)?;
        let class = classify(layout, &self.profile)?;

        let mut allocator = self.allocator.clone();
        let placement = allocator.place(&class, layout);

        // Infallible from here on
        let index = self.args.len();
        let width = self.profile.register_width;
        if placement.indirect {
            self.copies.push(PendingCopy {
                arg: index,
                image,
                align: layout.align().max(width),
            });
        } else {
            for piece in &placement.pieces {
                let bytes = match layout.as_scalar() {
                    Some(kind) => scalar_slot(kind, &image, piece.width, endian),
                    None => image[piece.value_offset..piece.value_offset + piece.width].to_vec(),
                };
                self.stage(piece, &bytes);
            }
        }
        self.allocator = allocator;
        if self.stack.len() < self.allocator.stack_size() {
            self.stack.resize(self.allocator.stack_size(), 0);
        }

        logging::log_append(
            self.profile.target.name(),
            index,
            layout,
            placement.in_registers(),
            placement.indirect,
        );
        self.args.push(RecordedArg {
            layout: layout.clone(),
            placement,
        });
        Ok(self)
    }

    /// Append a raw address; `pointer` must be an address layout
    pub fn append_address(&mut self, pointer: &Layout, address: usize) -> Result<&mut Self> {
        if pointer.as_scalar() != Some(ScalarKind::Address) {
            return Err(MarshalError::mismatch(ScalarKind::Address, pointer));
        }
        self.append(pointer, &ArgValue::Address(address))
    }

    /// Seal the list and move it into `scope`
    ///
    /// On failure the builder stays open and unchanged.
    pub fn finalize(&mut self, scope: &Scope) -> Result<VaList> {
        if self.finalized {
            return Err(MarshalError::ClosedBuilder);
        }
        scope.ensure_usable()?;

        let profile = self.profile;
        let word = profile.register_width;
        let mut gp = self.gp.clone();
        let mut fp = self.fp.clone();
        let mut stack = self.stack.clone();

        for copy in &self.copies {
            let segment = scope.allocate(copy.image.len(), copy.align)?;
            segment.write(0, &copy.image)?;
            let pointer = profile.endian.encode_bits(segment.address() as u64, word);
            let piece = &self.args[copy.arg].placement.pieces[0];
            let area = match piece.area {
                Area::Gp => &mut gp,
                Area::Fp => &mut fp,
                Area::Stack => &mut stack,
            };
            area[piece.offset..piece.offset + word].copy_from_slice(&pointer);
        }

        let save = scope.allocate(gp.len() + fp.len(), 16)?;
        save.write(0, &gp)?;
        save.write(gp.len(), &fp)?;
        let overflow = scope.allocate(stack.len(), 16)?;
        overflow.write(0, &stack)?;

        let header = VaListHeader::initial(&profile, save.address(), overflow.address());
        let header_bytes = header.encode(profile.endian);
        let header_segment = scope.allocate(header_bytes.len(), word)?;
        header_segment.write(0, &header_bytes)?;

        let record = Arc::new(ListRecord {
            profile,
            args: self.args.clone(),
            header: header_segment.address(),
            gp_base: save.address(),
            fp_base: save.address() + gp.len(),
            stack_base: overflow.address(),
        });
        scope.register_list(record.header, record.clone())?;

        self.finalized = true;
        logging::log_finalize(scope.id(), record.args.len(), record.header);
        Ok(VaList::new(record, scope.downgrade()))
    }

    fn check_usable(&self) -> Result<()> {
        if self.finalized {
            return Err(MarshalError::ClosedBuilder);
        }
        match &self.scope {
            Some(scope) => scope.upgrade()?.ensure_usable(),
            None => Ok(()),
        }
    }

    fn stage(&mut self, piece: &Piece, bytes: &[u8]) {
        let area = match piece.area {
            Area::Gp => &mut self.gp,
            Area::Fp => &mut self.fp,
            Area::Stack => &mut self.stack,
        };
        let end = piece.offset + bytes.len();
        if area.len() < end {
            area.resize(end, 0);
        }
        area[piece.offset..end].copy_from_slice(bytes);
    }
}
