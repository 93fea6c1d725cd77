//! Layout descriptors - size, alignment and field offsets of argument types
//!
//! Design: Immutable descriptors, cheap to clone and share across calls.
//!
//! Architecture:
//! - `scalar.rs` - scalar kinds and byte order
//! - `describe.rs` - serde description input (`LayoutDesc`)

mod describe;
mod scalar;


pub use describe::{FieldDesc, LayoutDesc, StructDesc};
pub use scalar::{Endian, ScalarKind};

use crate::errors::{MarshalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Argument layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
    Scalar(ScalarKind),
    Struct(Arc<StructLayout>),
    /// Explicit padding inside a struct; consumes offset space only
    Padding(usize),
}

impl Layout {
    #[inline]
    pub const fn scalar(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }

    #[inline]
    pub const fn padding(bytes: usize) -> Self {
        Self::Padding(bytes)
    }

    /// Shorthand for `StructLayout::builder()`
    pub fn structure() -> StructBuilder {
        StructLayout::builder()
    }

    #[inline]
    pub fn size(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.size(),
            Self::Struct(s) => s.size,
            Self::Padding(bytes) => *bytes,
        }
    }

    #[inline]
    pub fn align(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.align(),
            Self::Struct(s) => s.align,
            Self::Padding(_) => 1,
        }
    }

    #[inline]
    pub fn is_padding(&self) -> bool {
        matches!(self, Self::Padding(_))
    }

    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructLayout> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Flattened scalar leaves with absolute offsets, padding skipped
    pub fn leaf_scalars(&self) -> Vec<(usize, ScalarKind)> {
        let mut out = Vec::new();
        self.collect_leaves(0, &mut out);
        out
    }

    fn collect_leaves(&self, base: usize, out: &mut Vec<(usize, ScalarKind)>) {
        match self {
            Self::Scalar(kind) => out.push((base, *kind)),
            Self::Struct(s) => {
                for field in &s.fields {
                    field.layout.collect_leaves(base + field.offset, out);
                }
            }
            Self::Padding(_) => {}
        }
    }

    /// Inverse of `LayoutDesc::build`
    pub fn describe(&self) -> LayoutDesc {
        match self {
            Self::Scalar(kind) => LayoutDesc::Scalar(*kind),
            Self::Padding(bytes) => LayoutDesc::Padding(*bytes),
            Self::Struct(s) => LayoutDesc::Struct(
                StructDesc::new(
                    s.fields
                        .iter()
                        .map(|f| FieldDesc {
                            name: f.name.clone(),
                            layout: f.layout.describe(),
                        })
                        .collect(),
                )
                .with_rule(s.rule),
            ),
        }
    }
}

impl From<ScalarKind> for Layout {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl From<StructLayout> for Layout {
    fn from(s: StructLayout) -> Self {
        Self::Struct(Arc::new(s))
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{}", kind),
            Self::Padding(bytes) => write!(f, "pad({})", bytes),
            Self::Struct(s) => {
                f.write_str("struct{")?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", field.layout)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// One struct member at a resolved offset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// `None` for padding entries
    pub name: Option<String>,
    pub layout: Layout,
    pub offset: usize,
}

/// Struct layout with resolved offsets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructLayout {
    fields: Vec<Field>,
    size: usize,
    align: usize,
    rule: AlignmentRule,
}

impl StructLayout {
    pub fn builder() -> StructBuilder {
        StructBuilder::new()
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// Rule the member offsets were resolved with
    #[inline]
    pub fn rule(&self) -> AlignmentRule {
        self.rule
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_deref() == Some(name))
    }

    /// Members that carry data
    pub fn data_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.layout.is_padding())
    }
}

/// How member alignment is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentRule {
    /// Each member aligned to its own size
    #[default]
    Natural,
    /// AIX power rule: an `f64` that is not the first member aligns to 4
    Power,
}

impl AlignmentRule {
    fn member_align(self, layout: &Layout, first: bool) -> usize {
        match (self, layout) {
            (Self::Power, Layout::Scalar(ScalarKind::F64)) if !first => 4,
            _ => layout.align(),
        }
    }
}

/// Incremental struct description
#[derive(Debug, Clone, Default)]
pub struct StructBuilder {
    rule: AlignmentRule,
    entries: Vec<(Option<String>, Layout)>,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: AlignmentRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn field(mut self, name: impl Into<String>, layout: impl Into<Layout>) -> Self {
        self.entries.push((Some(name.into()), layout.into()));
        self
    }

    pub fn padding(mut self, bytes: usize) -> Self {
        self.entries.push((None, Layout::Padding(bytes)));
        self
    }

    /// Resolve offsets: each member at the smallest multiple of its alignment
    /// past the previous member, total size rounded to the struct alignment.
    pub fn build(self) -> Result<Layout> {
        self.build_struct().map(Layout::from)
    }

    pub fn build_struct(self) -> Result<StructLayout> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.entries.len());
        let mut offset = 0usize;
        let mut align = 1usize;
        let mut has_data = false;

        for (index, (name, layout)) in self.entries.into_iter().enumerate() {
            match (&name, &layout) {
                (None, Layout::Padding(0)) => {
                    return Err(MarshalError::invalid_layout("zero-sized padding entry"));
                }
                (None, Layout::Padding(_)) => {}
                (Some(_), Layout::Padding(_)) => {
                    return Err(MarshalError::invalid_layout("padding entries cannot be named"));
                }
                (None, _) => {
                    return Err(MarshalError::invalid_layout(format!(
                        "field #{} has no name",
                        index
                    )));
                }
                (Some(n), _) => {
                    if !seen.insert(n.clone()) {
                        return Err(MarshalError::invalid_layout(format!(
                            "duplicate field name '{}'",
                            n
                        )));
                    }
                    has_data = true;
                }
            }

            let member_align = if layout.is_padding() {
                1
            } else {
                self.rule.member_align(&layout, index == 0)
            };
            offset = align_up(offset, member_align);
            let size = layout.size();
            fields.push(Field { name, layout, offset });
            offset = offset
                .checked_add(size)
                .ok_or_else(|| MarshalError::invalid_layout("struct size overflows usize"))?;
            align = align.max(member_align);
        }

        if !has_data {
            return Err(MarshalError::invalid_layout("struct has no data fields"));
        }

        Ok(StructLayout {
            fields,
            size: align_up(offset, align),
            align,
            rule: self.rule,
        })
    }
}

/// Round `value` up to a multiple of `align` (a power of two)
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value.wrapping_add(align).wrapping_sub(1)) & !align.wrapping_sub(1)
}
