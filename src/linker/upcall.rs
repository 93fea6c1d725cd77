//! Upcall stubs
//!
//! Each registered handler gets a unique stub address. Native code calls
//! back through that address; `invoke` checks the arguments against the
//! registered signature and runs the handler.

use super::{CallbackRegistry, FunctionAddress, FunctionDescriptor, LinkError};
use crate::logging;
use crate::scope::Scope;
use crate::value::ArgValue;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Managed side of an upcall
pub type UpcallHandler =
    Arc<dyn Fn(&[ArgValue], &Scope) -> Result<Option<ArgValue>, LinkError> + Send + Sync>;

/// Stub addresses live in their own range, apart from symbol table entries
const STUB_BASE: usize = 0x7e00_0000_0000;
const STUB_STRIDE: usize = 16;

struct Stub {
    descriptor: FunctionDescriptor,
    handler: UpcallHandler,
}

/// Registry of upcall stubs, shareable across threads
pub struct UpcallStubs {
    stubs: DashMap<usize, Stub>,
    next: AtomicUsize,
}

impl UpcallStubs {
    pub fn new() -> Self {
        Self {
            stubs: DashMap::new(),
            next: AtomicUsize::new(STUB_BASE),
        }
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn descriptor(&self, stub: FunctionAddress) -> Option<FunctionDescriptor> {
        self.stubs.get(&stub.0).map(|s| s.descriptor.clone())
    }

    /// Remove a stub; later calls through it fail with `UnknownStub`
    pub fn unregister(&self, stub: FunctionAddress) -> bool {
        self.stubs.remove(&stub.0).is_some()
    }

    /// Call back into the handler behind `stub`
    pub fn invoke(
        &self,
        stub: FunctionAddress,
        args: &[ArgValue],
        scope: &Scope,
    ) -> Result<Option<ArgValue>, LinkError> {
        let (descriptor, handler) = self
            .stubs
            .get(&stub.0)
            .map(|s| (s.descriptor.clone(), s.handler.clone()))
            .ok_or(LinkError::UnknownStub(stub))?;
        descriptor.check_args(args)?;
        logging::log_upcall(stub.0, args.len());
        let result = handler(args, scope)?;
        descriptor.check_result(&result)?;
        Ok(result)
    }
}

impl Default for UpcallStubs {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry for UpcallStubs {
    fn register_callback(
        &self,
        descriptor: FunctionDescriptor,
        handler: UpcallHandler,
    ) -> Result<FunctionAddress, LinkError> {
        let address = self.next.fetch_add(STUB_STRIDE, Ordering::Relaxed);
        self.stubs.insert(address, Stub { descriptor, handler });
        Ok(FunctionAddress(address))
    }
}
