//! ABI (Application Binary Interface) handling
//!
//! Supports the variadic calling conventions of the targets we marshal for.
//!
//! Architecture:
//! - `classify.rs` - layout → `ClassifiedSlot` sequence
//! - `registers.rs` - register/stack placement shared by builder and reader

mod classify;
mod registers;


pub use classify::{classify, ClassifiedSlot, Classification, SlotMechanism};
pub use registers::{Area, ArgPlacement, Piece, RegisterAllocator};

use crate::errors::{MarshalError, Result};
use crate::layout::{AlignmentRule, Endian, Layout, ScalarKind, StructBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported target platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// System V AMD64 (Linux, macOS on x86-64)
    #[serde(rename = "sysv-x86_64")]
    SysvX86_64,
    /// Microsoft x64
    #[serde(rename = "win64")]
    Win64,
    /// AAPCS64 on Linux
    #[serde(rename = "linux-aarch64")]
    LinuxAarch64,
    /// Apple arm64 variadic convention
    #[serde(rename = "macos-aarch64")]
    MacosAarch64,
    /// ELFv2 ppc64le
    #[serde(rename = "linux-ppc64le")]
    LinuxPpc64le,
    /// AIX ppc64
    #[serde(rename = "aix-ppc64")]
    AixPpc64,
}

impl Target {
    pub const ALL: [Target; 6] = [
        Self::SysvX86_64,
        Self::Win64,
        Self::LinuxAarch64,
        Self::MacosAarch64,
        Self::LinuxPpc64le,
        Self::AixPpc64,
    ];

    /// Platform default
    #[inline]
    pub const fn host() -> Self {
        #[cfg(all(target_arch = "x86_64", target_os = "windows"))]
        return Self::Win64;

        #[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
        return Self::SysvX86_64;

        #[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
        return Self::MacosAarch64;

        #[cfg(all(target_arch = "aarch64", not(target_vendor = "apple")))]
        return Self::LinuxAarch64;

        #[cfg(all(target_arch = "powerpc64", target_os = "aix"))]
        return Self::AixPpc64;

        #[cfg(all(target_arch = "powerpc64", not(target_os = "aix")))]
        return Self::LinuxPpc64le;

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64")))]
        return Self::SysvX86_64;
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SysvX86_64 => "sysv-x86_64",
            Self::Win64 => "win64",
            Self::LinuxAarch64 => "linux-aarch64",
            Self::MacosAarch64 => "macos-aarch64",
            Self::LinuxPpc64le => "linux-ppc64le",
            Self::AixPpc64 => "aix-ppc64",
        }
    }

    pub fn profile(self) -> AbiProfile {
        AbiProfile::for_target(self)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate classification family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSet {
    /// SysV eightbyte classification: float-only chunks go to FP registers
    Eightbyte,
    /// AAPCS64: homogeneous float aggregates use FP registers, other
    /// composites use GP registers
    Homogeneous,
    /// Every argument occupies 8-byte memory slots (Windows-style)
    UniformSlots,
}

/// How an aggregate travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatePassing {
    ByValue,
    ByReference,
}

/// Where an aggregate goes once it is not register eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demotion {
    /// Copied by value into the stack area
    Stack,
    /// Copied to scope memory; a pointer takes its slot
    Reference,
}

/// Named per-ABI capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbiCapabilities {
    /// Struct whose only data member is one integral scalar narrower than a register
    pub single_field_struct: AggregatePassing,
    /// Max register chunks for a by-value aggregate
    pub register_aggregate_limit: usize,
    pub oversize_aggregate: Demotion,
    /// Only aggregates of 1, 2, 4 or 8 bytes go by value
    pub power_of_two_aggregates_only: bool,
    /// 1-4 identical float members, one per FP register
    pub homogeneous_float_aggregates: bool,
    /// A spilled argument exhausts its register class
    pub exhaust_on_spill: bool,
}

/// Calling convention description for one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbiProfile {
    pub target: Target,
    pub register_width: usize,
    pub gp_registers: usize,
    pub fp_registers: usize,
    /// Bytes per FP register in the save area
    pub fp_slot_width: usize,
    pub rules: RuleSet,
    /// The va_list carries register save areas
    pub register_save_area: bool,
    pub c_long_bits: u8,
    pub endian: Endian,
    pub alignment_rule: AlignmentRule,
    pub capabilities: AbiCapabilities,
}

impl AbiProfile {
    pub const fn sysv_x86_64() -> Self {
        Self {
            target: Target::SysvX86_64,
            register_width: 8,
            gp_registers: 6, // RDI, RSI, RDX, RCX, R8, R9
            fp_registers: 8, // XMM0-XMM7
            fp_slot_width: 16,
            rules: RuleSet::Eightbyte,
            register_save_area: true,
            c_long_bits: 64,
            endian: Endian::Little,
            alignment_rule: AlignmentRule::Natural,
            capabilities: AbiCapabilities {
                single_field_struct: AggregatePassing::ByValue,
                register_aggregate_limit: 2,
                oversize_aggregate: Demotion::Stack,
                power_of_two_aggregates_only: false,
                homogeneous_float_aggregates: false,
                exhaust_on_spill: false,
            },
        }
    }

    pub const fn win64() -> Self {
        Self {
            target: Target::Win64,
            register_width: 8,
            gp_registers: 4, // RCX, RDX, R8, R9
            fp_registers: 4,
            fp_slot_width: 8,
            rules: RuleSet::UniformSlots,
            register_save_area: false,
            c_long_bits: 32,
            endian: Endian::Little,
            alignment_rule: AlignmentRule::Natural,
            capabilities: AbiCapabilities {
                single_field_struct: AggregatePassing::ByValue,
                register_aggregate_limit: 1,
                oversize_aggregate: Demotion::Reference,
                power_of_two_aggregates_only: true,
                homogeneous_float_aggregates: false,
                exhaust_on_spill: false,
            },
        }
    }

    pub const fn linux_aarch64() -> Self {
        Self {
            target: Target::LinuxAarch64,
            register_width: 8,
            gp_registers: 8, // X0-X7
            fp_registers: 8, // V0-V7
            fp_slot_width: 16,
            rules: RuleSet::Homogeneous,
            register_save_area: true,
            c_long_bits: 64,
            endian: Endian::Little,
            alignment_rule: AlignmentRule::Natural,
            capabilities: AbiCapabilities {
                single_field_struct: AggregatePassing::ByValue,
                register_aggregate_limit: 2,
                oversize_aggregate: Demotion::Reference,
                power_of_two_aggregates_only: false,
                homogeneous_float_aggregates: true,
                exhaust_on_spill: true,
            },
        }
    }

    pub const fn macos_aarch64() -> Self {
        Self {
            target: Target::MacosAarch64,
            register_width: 8,
            gp_registers: 8,
            fp_registers: 8,
            fp_slot_width: 8,
            rules: RuleSet::UniformSlots,
            register_save_area: false,
            c_long_bits: 64,
            endian: Endian::Little,
            alignment_rule: AlignmentRule::Natural,
            capabilities: AbiCapabilities {
                single_field_struct: AggregatePassing::ByValue,
                register_aggregate_limit: 2,
                oversize_aggregate: Demotion::Reference,
                power_of_two_aggregates_only: false,
                homogeneous_float_aggregates: false,
                exhaust_on_spill: false,
            },
        }
    }

    pub const fn linux_ppc64le() -> Self {
        Self {
            target: Target::LinuxPpc64le,
            register_width: 8,
            gp_registers: 8,  // R3-R10
            fp_registers: 13, // F1-F13
            fp_slot_width: 8,
            rules: RuleSet::UniformSlots,
            register_save_area: false,
            c_long_bits: 64,
            endian: Endian::Little,
            alignment_rule: AlignmentRule::Natural,
            capabilities: AbiCapabilities {
                single_field_struct: AggregatePassing::ByValue,
                register_aggregate_limit: 8,
                oversize_aggregate: Demotion::Stack,
                power_of_two_aggregates_only: false,
                homogeneous_float_aggregates: false,
                exhaust_on_spill: false,
            },
        }
    }

    pub const fn aix_ppc64() -> Self {
        let mut profile = Self::linux_ppc64le();
        profile.target = Target::AixPpc64;
        profile.endian = Endian::Big;
        profile.alignment_rule = AlignmentRule::Power;
        profile
    }

    pub const fn for_target(target: Target) -> Self {
        match target {
            Target::SysvX86_64 => Self::sysv_x86_64(),
            Target::Win64 => Self::win64(),
            Target::LinuxAarch64 => Self::linux_aarch64(),
            Target::MacosAarch64 => Self::macos_aarch64(),
            Target::LinuxPpc64le => Self::linux_ppc64le(),
            Target::AixPpc64 => Self::aix_ppc64(),
        }
    }

    pub const fn host() -> Self {
        Self::for_target(Target::host())
    }

    pub fn with_capabilities(mut self, capabilities: AbiCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_single_field_struct(mut self, passing: AggregatePassing) -> Self {
        self.capabilities.single_field_struct = passing;
        self
    }

    /// Native C `long`
    pub fn c_long(&self) -> Layout {
        if self.c_long_bits == 32 {
            Layout::scalar(ScalarKind::I32)
        } else {
            Layout::scalar(ScalarKind::I64)
        }
    }

    /// 64-bit integer layout for "long" arguments: `long long` where
    /// native `long` is narrower (Win64), native `long` elsewhere
    pub fn long_layout(&self) -> Layout {
        Layout::scalar(ScalarKind::I64)
    }

    pub fn pointer(&self) -> Layout {
        Layout::scalar(ScalarKind::Address)
    }

    /// Struct builder following this target's member alignment rule
    pub fn struct_builder(&self) -> StructBuilder {
        StructBuilder::new().with_rule(self.alignment_rule)
    }

    /// Bytes in the GP part of the register save area
    #[inline]
    pub const fn gp_area_size(&self) -> usize {
        if self.register_save_area {
            self.gp_registers * self.register_width
        } else {
            0
        }
    }

    /// Bytes in the FP part of the register save area
    #[inline]
    pub const fn fp_area_size(&self) -> usize {
        if self.register_save_area {
            self.fp_registers * self.fp_slot_width
        } else {
            0
        }
    }

    /// Reject layouts this target cannot pass as a variadic argument
    pub fn check_layout(&self, layout: &Layout) -> Result<()> {
        match layout {
            Layout::Padding(_) => Err(MarshalError::invalid_layout(
                "padding cannot be passed as an argument",
            )),
            Layout::Scalar(kind) if kind.size() > self.register_width => {
                Err(MarshalError::invalid_layout(format!(
                    "{} is wider than the {}-byte registers of {}",
                    kind, self.register_width, self.target
                )))
            }
            Layout::Struct(s) if s.align() > 2 * self.register_width => {
                Err(MarshalError::invalid_layout(format!(
                    "over-aligned struct (align {}) unsupported on {}",
                    s.align(),
                    self.target
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for AbiProfile {
    #[inline]
    fn default() -> Self {
        Self::host()
    }
}
