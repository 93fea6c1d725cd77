//! Arena management - backing memory of a scope
//!
//! Design: A scope acquires a few zeroed blocks from the global allocator
//! and bump-allocates segments out of them. Blocks are only returned as a
//! whole, when the scope closes.

use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, dealloc, Layout};

/// Arena size strategy - va_lists are small, most scopes need one block
const DEFAULT_ARENA_SIZE: usize = 4 * 1024; // 4KB
const MAX_ARENA_SIZE: usize = 1024 * 1024; // 1MB
const ARENA_ALIGN: usize = 16;

/// One block from the global allocator
pub struct Arena {
    start: NonNull<u8>,
    layout: Layout,
}

// The arena exclusively owns its block; access is serialized by the scope lock
unsafe impl Send for Arena {}

impl Arena {
    pub fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size.max(1), ARENA_ALIGN).ok()?;
        let start = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self { start, layout })
    }

    /// Get arena bounds for bump allocator
    #[inline]
    pub fn bounds(&self) -> (usize, usize) {
        let start = self.start.as_ptr() as usize;
        (start, start + self.layout.size())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// `len` bytes at `address` lie inside this arena
    #[inline]
    pub fn contains(&self, address: usize, len: usize) -> bool {
        let (start, end) = self.bounds();
        address >= start && address.checked_add(len).map_or(false, |e| e <= end)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.start.as_ptr(), self.layout);
        }
    }
}

/// Bump pointer state over the current arena
#[derive(Debug, Default)]
struct Bump {
    current: usize,
    end: usize,
}

impl Bump {
    #[inline(always)]
    fn try_alloc(&mut self, size: usize, align: usize) -> Option<usize> {
        debug_assert!(align.is_power_of_two(), "alignment must be power of 2");
        if self.end == 0 {
            return None;
        }
        let ptr = crate::layout::align_up(self.current, align);
        let new_current = ptr.checked_add(size)?;
        if new_current <= self.end {
            self.current = new_current;
            Some(ptr)
        } else {
            None
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.current)
    }
}

/// Arena pool with bump allocation on the newest arena
pub struct ArenaPool {
    arenas: Vec<Arena>,
    bump: Bump,
    next_size: usize,
}

impl ArenaPool {
    pub fn new() -> Self {
        Self {
            arenas: Vec::new(),
            bump: Bump::default(),
            next_size: DEFAULT_ARENA_SIZE,
        }
    }

    /// Allocate `size` zeroed bytes (fast path first, then a new arena)
    pub fn alloc(&mut self, size: usize, align: usize) -> Option<usize> {
        if let Some(address) = self.bump.try_alloc(size, align) {
            return Some(address);
        }
        self.grow_with_min(size.checked_add(align)?)?;
        self.bump.try_alloc(size, align)
    }

    /// Add an arena of at least `min` bytes, growing size adaptively
    fn grow_with_min(&mut self, min: usize) -> Option<()> {
        let size = self.next_size.max(min);
        let arena = Arena::new(size)?;
        self.next_size = (self.next_size * 2).min(MAX_ARENA_SIZE);

        let (start, end) = arena.bounds();
        self.bump = Bump { current: start, end };
        self.arenas.push(arena);
        Some(())
    }

    pub fn contains(&self, address: usize, len: usize) -> bool {
        self.arenas.iter().any(|a| a.contains(address, len))
    }

    /// Drop every arena at once
    pub fn release(&mut self) -> usize {
        let released = self.total_allocated();
        self.arenas.clear();
        self.bump = Bump::default();
        released
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Total allocated memory across all arenas
    pub fn total_allocated(&self) -> usize {
        self.arenas.iter().map(Arena::size).sum()
    }

    pub fn remaining(&self) -> usize {
        self.bump.remaining()
    }
}

impl Default for ArenaPool {
    fn default() -> Self {
        Self::new()
    }
}
