//! In-process table of native entry points
//!
//! Stands in for a loaded library when the "native" side of a call is
//! implemented in Rust, e.g. functions that receive a va_list and hand it to
//! an upcall.

use super::{FunctionAddress, FunctionDescriptor, LinkError, SymbolLookup};
use crate::scope::Scope;
use crate::value::ArgValue;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Body of an in-process native function
pub type NativeFn =
    Arc<dyn Fn(&[ArgValue], &Scope) -> Result<Option<ArgValue>, LinkError> + Send + Sync>;

/// Base of the synthetic address range handed out for table entries
const TABLE_BASE: usize = 0x7f00_0000_0000;
const ENTRY_STRIDE: usize = 16;

struct NativeEntry {
    address: FunctionAddress,
    descriptor: FunctionDescriptor,
    function: NativeFn,
}

/// Named native functions, shareable across threads
pub struct SymbolTable {
    entries: DashMap<String, NativeEntry>,
    next: AtomicUsize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicUsize::new(TABLE_BASE),
        }
    }

    /// Define or replace `name`; a redefinition keeps its address
    pub fn define(
        &self,
        name: &str,
        descriptor: FunctionDescriptor,
        function: NativeFn,
    ) -> Result<FunctionAddress, LinkError> {
        validate_name(name)?;
        let mut entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| NativeEntry {
                address: FunctionAddress(self.next.fetch_add(ENTRY_STRIDE, Ordering::Relaxed)),
                descriptor: descriptor.clone(),
                function: function.clone(),
            });
        entry.descriptor = descriptor;
        entry.function = function;
        Ok(entry.address)
    }

    pub fn descriptor(&self, name: &str) -> Option<FunctionDescriptor> {
        self.entries.get(name).map(|e| e.descriptor.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check arguments against the signature and run the function
    pub fn invoke(
        &self,
        name: &str,
        args: &[ArgValue],
        scope: &Scope,
    ) -> Result<Option<ArgValue>, LinkError> {
        let entry = self
            .entries
            .get(name)
            .map(|e| (e.descriptor.clone(), e.function.clone()));
        run(name, entry, args, scope)
    }

    /// Run the entry defined at an already resolved `address`
    pub fn invoke_at(
        &self,
        name: &str,
        address: FunctionAddress,
        args: &[ArgValue],
        scope: &Scope,
    ) -> Result<Option<ArgValue>, LinkError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.address == address)
            .map(|e| (e.descriptor.clone(), e.function.clone()));
        run(name, entry, args, scope)
    }
}

// Entry is cloned out so the map is not locked while the body runs
fn run(
    name: &str,
    entry: Option<(FunctionDescriptor, NativeFn)>,
    args: &[ArgValue],
    scope: &Scope,
) -> Result<Option<ArgValue>, LinkError> {
    let (descriptor, function) = entry.ok_or_else(|| LinkError::NotFound {
        name: name.to_string(),
    })?;
    descriptor.check_args(args)?;
    let result = function(args, scope)?;
    descriptor.check_result(&result)?;
    Ok(result)
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolLookup for SymbolTable {
    fn lookup(&self, name: &str) -> Result<FunctionAddress, LinkError> {
        validate_name(name)?;
        self.entries
            .get(name)
            .map(|e| e.address)
            .ok_or_else(|| LinkError::NotFound {
                name: name.to_string(),
            })
    }
}

fn validate_name(name: &str) -> Result<(), LinkError> {
    if name.is_empty() || name.contains('\0') {
        return Err(LinkError::InvalidName);
    }
    Ok(())
}
