//! Scope - lifetime boundary for marshaled memory
//!
//! Design: A scope is OPEN until `close`, then CLOSED for good. Every buffer
//! a builder writes (register save areas, overflow area, by-reference copies,
//! headers) is carved out of the scope's arenas and released together when
//! the scope closes or its last handle drops.
//!
//! A scope is confined to the thread that opened it. Handles may travel to
//! other threads but every operation there fails with
//! `ScopeConfinementViolation`.
//!
//! Architecture:
//! - `arena.rs` - zeroed arenas with bump allocation

mod arena;


pub use arena::{Arena, ArenaPool};

use crate::errors::{MarshalError, Result};
use crate::logging;
use crate::valist::ListRecord;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeState {
    open: bool,
    arenas: ArenaPool,
    /// Finalized lists keyed by header address
    lists: HashMap<usize, Arc<ListRecord>>,
}

struct ScopeInner {
    id: u64,
    owner: ThreadId,
    state: Mutex<ScopeState>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.open {
            let released = state.arenas.release();
            logging::log_scope_close(self.id, released);
        }
    }
}

/// Lifetime boundary owning every marshaled buffer
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Open a scope confined to the current thread
    pub fn open() -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        logging::log_scope_open(id);
        Self {
            inner: Arc::new(ScopeInner {
                id,
                owner: thread::current().id(),
                state: Mutex::new(ScopeState {
                    open: true,
                    arenas: ArenaPool::new(),
                    lists: HashMap::new(),
                }),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.lock().open
    }

    /// Release all memory; a second close is a no-op
    pub fn close(&self) -> Result<()> {
        self.check_thread()?;
        let mut state = self.inner.state.lock();
        if !state.open {
            return Ok(());
        }
        state.open = false;
        state.lists.clear();
        let released = state.arenas.release();
        logging::log_scope_close(self.inner.id, released);
        Ok(())
    }

    /// Allocate `size` zeroed bytes aligned to `align`
    pub fn allocate(&self, size: usize, align: usize) -> Result<Segment> {
        if !align.is_power_of_two() {
            return Err(MarshalError::AllocationFailed { size, align });
        }
        let mut state = self.lock()?;
        let address = state
            .arenas
            .alloc(size, align)
            .ok_or(MarshalError::AllocationFailed { size, align })?;
        logging::log_segment_alloc(self.inner.id, size, address);
        Ok(Segment {
            scope: self.downgrade(),
            address,
            len: size,
        })
    }

    /// Copy `len` bytes out of scope memory
    pub fn read_at(&self, address: usize, len: usize) -> Result<Vec<u8>> {
        let state = self.lock()?;
        if !state.arenas.contains(address, len) {
            return Err(MarshalError::InvalidAddress { address, len });
        }
        // In bounds of a live arena, checked above
        let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, len) };
        Ok(bytes.to_vec())
    }

    /// Copy `bytes` into scope memory
    pub fn write_at(&self, address: usize, bytes: &[u8]) -> Result<()> {
        let state = self.lock()?;
        if !state.arenas.contains(address, bytes.len()) {
            return Err(MarshalError::InvalidAddress {
                address,
                len: bytes.len(),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
        }
        Ok(())
    }

    /// Snapshot of arena usage
    pub fn stats(&self) -> ScopeStats {
        let state = self.inner.state.lock();
        ScopeStats {
            arenas: state.arenas.arena_count(),
            total_allocated: state.arenas.total_allocated(),
            lists: state.lists.len(),
        }
    }

    /// Fails exactly when any other operation would
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        self.lock().map(drop)
    }

    pub(crate) fn register_list(&self, address: usize, record: Arc<ListRecord>) -> Result<()> {
        let mut state = self.lock()?;
        state.lists.insert(address, record);
        Ok(())
    }

    pub(crate) fn lookup_list(&self, address: usize) -> Result<Arc<ListRecord>> {
        let state = self.lock()?;
        state
            .lists
            .get(&address)
            .cloned()
            .ok_or(MarshalError::InvalidAddress { address, len: 0 })
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn check_thread(&self) -> Result<()> {
        if thread::current().id() != self.inner.owner {
            return Err(MarshalError::ScopeConfinementViolation);
        }
        Ok(())
    }

    /// Confinement first, then liveness
    fn lock(&self) -> Result<parking_lot::MutexGuard<'_, ScopeState>> {
        self.check_thread()?;
        let state = self.inner.state.lock();
        if !state.open {
            return Err(MarshalError::UseAfterScopeClosed);
        }
        Ok(state)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Non-owning scope handle held by lists and segments
#[derive(Debug, Clone)]
pub(crate) struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    /// A dropped scope counts as closed
    pub(crate) fn upgrade(&self) -> Result<Scope> {
        self.inner
            .upgrade()
            .map(|inner| Scope { inner })
            .ok_or(MarshalError::UseAfterScopeClosed)
    }
}

/// Scope statistics for monitoring and debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStats {
    pub arenas: usize,
    pub total_allocated: usize,
    pub lists: usize,
}

/// A buffer carved out of a scope
#[derive(Clone)]
pub struct Segment {
    scope: WeakScope,
    address: usize,
    len: usize,
}

impl Segment {
    #[inline]
    pub fn address(&self) -> usize {
        self.address
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read `len` bytes at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let address = self.bounded(offset, len)?;
        self.scope.upgrade()?.read_at(address, len)
    }

    /// Write `bytes` at `offset`
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let address = self.bounded(offset, bytes.len())?;
        self.scope.upgrade()?.write_at(address, bytes)
    }

    fn bounded(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(self.address + offset),
            _ => Err(MarshalError::InvalidAddress {
                address: self.address.wrapping_add(offset),
                len,
            }),
        }
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("address", &format_args!("{:#x}", self.address))
            .field("len", &self.len)
            .finish()
    }
}
