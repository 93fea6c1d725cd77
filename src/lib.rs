//! ffi-valist - Variadic argument list marshaling
//!
//! Builds and reads platform-faithful `va_list` images for the variadic
//! calling conventions of x86-64 (SysV, Win64), AArch64 (Linux, macOS) and
//! ppc64 (Linux, AIX). Lists live in confined, explicitly closed scopes and
//! can be handed across an upcall boundary by address.

// Core modules
pub mod abi;
pub mod config;
pub mod errors;
pub mod layout;
pub mod linker;
pub mod logging;
pub mod scope;
pub mod valist;
pub mod value;

// Re-export commonly used items
pub use abi::{AbiCapabilities, AbiProfile, AggregatePassing, Demotion, RuleSet, Target};
pub use config::{ConfigError, MarshalConfig};
pub use errors::{MarshalError, Result};
pub use layout::{AlignmentRule, Endian, Layout, LayoutDesc, ScalarKind, StructDesc, StructLayout};
pub use linker::{
    CallbackRegistry, FunctionAddress, FunctionDescriptor, LinkError, Linker, SymbolLookup,
};
pub use scope::{Scope, Segment};
pub use valist::{VaList, VaListBuilder, VaListReader};
pub use value::ArgValue;

/// Install logging from the global configuration
pub fn init() {
    logging::init_with_config(config::global().log_config());
}
