//! Linker - symbol resolution and upcall registration
//!
//! Design: One narrow trait per capability. A `Linker` carries whichever
//! capabilities the host provides and answers probes with `Option`; a missing
//! capability is a normal outcome, not an error.
//!
//! Architecture:
//! - `library.rs` - dynamic library loading (dlopen/LoadLibrary)
//! - `symbols.rs` - in-process table of native entry points
//! - `upcall.rs` - upcall stub registry and dispatch

mod library;
mod symbols;
mod upcall;


pub use library::NativeLibrary;
pub use symbols::{NativeFn, SymbolTable};
pub use upcall::{UpcallHandler, UpcallStubs};

use crate::errors::MarshalError;
use crate::layout::Layout;
use crate::logging;
use crate::scope::Scope;
use crate::value::ArgValue;
use std::fmt;
use std::sync::Arc;

/// Callable address of a native function or upcall stub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionAddress(pub usize);

impl FunctionAddress {
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for FunctionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Linking and dispatch errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    NotFound { name: String },
    InvalidName,
    LoadFailed(String),
    SignatureMismatch { expected: String, found: String },
    UnknownStub(FunctionAddress),
    Marshal(MarshalError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "Symbol not found: {}", name),
            Self::InvalidName => write!(f, "Invalid symbol name"),
            Self::LoadFailed(msg) => write!(f, "Failed to load library: {}", msg),
            Self::SignatureMismatch { expected, found } => {
                write!(f, "Signature mismatch: expected {}, found {}", expected, found)
            }
            Self::UnknownStub(address) => write!(f, "No upcall stub at {}", address),
            Self::Marshal(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Marshal(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MarshalError> for LinkError {
    fn from(err: MarshalError) -> Self {
        Self::Marshal(err)
    }
}

/// Signature of a native function or upcall
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDescriptor {
    pub result: Option<Layout>,
    pub args: Vec<Layout>,
}

impl FunctionDescriptor {
    pub fn of(result: impl Into<Layout>, args: impl IntoIterator<Item = Layout>) -> Self {
        Self {
            result: Some(result.into()),
            args: args.into_iter().collect(),
        }
    }

    pub fn of_void(args: impl IntoIterator<Item = Layout>) -> Self {
        Self {
            result: None,
            args: args.into_iter().collect(),
        }
    }

    /// Check call arguments against the declared parameters
    pub fn check_args(&self, args: &[ArgValue]) -> Result<(), LinkError> {
        if args.len() != self.args.len()
            || !self.args.iter().zip(args).all(|(layout, value)| accepts(layout, value))
        {
            return Err(LinkError::SignatureMismatch {
                expected: self.to_string(),
                found: describe_values(args),
            });
        }
        Ok(())
    }

    /// Check a return value against the declared result
    pub fn check_result(&self, result: &Option<ArgValue>) -> Result<(), LinkError> {
        let ok = match (&self.result, result) {
            (None, None) => true,
            (Some(layout), Some(value)) => accepts(layout, value),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(LinkError::SignatureMismatch {
                expected: self.to_string(),
                found: result
                    .as_ref()
                    .map_or_else(|| "void".to_string(), ArgValue::describe),
            })
        }
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")?;
        match &self.result {
            Some(result) => write!(f, "{}", result),
            None => f.write_str("void"),
        }
    }
}

fn accepts(layout: &Layout, value: &ArgValue) -> bool {
    match (layout, value) {
        (Layout::Scalar(kind), value) => value.kind() == Some(*kind),
        (Layout::Struct(s), ArgValue::Aggregate(bytes)) => bytes.len() == s.size(),
        _ => false,
    }
}

fn describe_values(args: &[ArgValue]) -> String {
    let parts: Vec<String> = args.iter().map(ArgValue::describe).collect();
    format!("({})", parts.join(","))
}

/// Resolve a native entry point by name
pub trait SymbolLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<FunctionAddress, LinkError>;
}

/// Obtain a callable address for an upcall handler
pub trait CallbackRegistry: Send + Sync {
    fn register_callback(
        &self,
        descriptor: FunctionDescriptor,
        handler: UpcallHandler,
    ) -> Result<FunctionAddress, LinkError>;
}

/// Composition of optional linking capabilities
#[derive(Clone, Default)]
pub struct Linker {
    symbols: Option<Arc<dyn SymbolLookup>>,
    callbacks: Option<Arc<dyn CallbackRegistry>>,
    table: Option<Arc<SymbolTable>>,
}

impl Linker {
    /// Linker without any capability
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol table and stub registry living in this process
    pub fn in_process(table: Arc<SymbolTable>, stubs: Arc<UpcallStubs>) -> Self {
        Self {
            symbols: Some(table.clone() as Arc<dyn SymbolLookup>),
            callbacks: Some(stubs as Arc<dyn CallbackRegistry>),
            table: Some(table),
        }
    }

    pub fn with_symbols(mut self, symbols: Arc<dyn SymbolLookup>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackRegistry>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn probe_symbols(&self) -> Option<&dyn SymbolLookup> {
        self.symbols.as_deref()
    }

    pub fn probe_callbacks(&self) -> Option<&dyn CallbackRegistry> {
        self.callbacks.as_deref()
    }

    /// Resolve `name` through the symbol lookup, then call the in-process
    /// function defined at that address.
    ///
    /// Fails with `NotFound` when no lookup is installed, when the lookup
    /// does not know `name`, or when the resolved address is not an entry of
    /// the in-process table.
    pub fn downcall(
        &self,
        name: &str,
        args: &[ArgValue],
        scope: &Scope,
    ) -> Result<Option<ArgValue>, LinkError> {
        let not_found = || LinkError::NotFound {
            name: name.to_string(),
        };
        let result = self
            .probe_symbols()
            .ok_or_else(not_found)
            .and_then(|symbols| symbols.lookup(name))
            .and_then(|address| {
                let table = self.table.as_ref().ok_or_else(not_found)?;
                logging::log_downcall(name, args.len());
                table.invoke_at(name, address, args, scope)
            });
        if let Err(err) = &result {
            logging::log_link_error(name, &err.to_string());
        }
        result
    }
}

impl fmt::Debug for Linker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linker")
            .field("symbols", &self.symbols.is_some())
            .field("callbacks", &self.callbacks.is_some())
            .field("downcalls", &self.table.is_some())
            .finish()
    }
}
