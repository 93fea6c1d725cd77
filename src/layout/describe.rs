//! Layout description input
//!
//! Callers describe layouts as an ordered list of named fields with optional
//! padding entries, e.g. in JSON:
//!
//! ```json
//! {"struct": [{"name": "elem1", "scalar": "i16"}, {"padding": 2}, {"name": "elem2", "scalar": "i32"}]}
//! ```
//!
//! Structs laid out with a non-natural alignment rule use the object form:
//!
//! ```json
//! {"struct": {"rule": "power", "fields": [{"name": "f", "scalar": "f32"}, {"name": "d", "scalar": "f64"}]}}
//! ```

use super::{AlignmentRule, Layout, ScalarKind, StructBuilder};
use crate::errors::{MarshalError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutDesc {
    Scalar(ScalarKind),
    Padding(usize),
    Struct(StructDesc),
}

/// Struct members plus the alignment rule that resolves their offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StructRepr", into = "StructRepr")]
pub struct StructDesc {
    pub fields: Vec<FieldDesc>,
    pub rule: AlignmentRule,
}

impl StructDesc {
    pub fn new(fields: Vec<FieldDesc>) -> Self {
        Self {
            fields,
            rule: AlignmentRule::Natural,
        }
    }

    pub fn with_rule(mut self, rule: AlignmentRule) -> Self {
        self.rule = rule;
        self
    }
}

/// Wire form: a bare field list for natural alignment, an object otherwise
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StructRepr {
    Fields(Vec<FieldDesc>),
    Ruled {
        #[serde(default)]
        rule: AlignmentRule,
        fields: Vec<FieldDesc>,
    },
}

impl From<StructRepr> for StructDesc {
    fn from(repr: StructRepr) -> Self {
        match repr {
            StructRepr::Fields(fields) => Self::new(fields),
            StructRepr::Ruled { rule, fields } => Self { fields, rule },
        }
    }
}

impl From<StructDesc> for StructRepr {
    fn from(desc: StructDesc) -> Self {
        match desc.rule {
            AlignmentRule::Natural => Self::Fields(desc.fields),
            rule => Self::Ruled {
                rule,
                fields: desc.fields,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub layout: LayoutDesc,
}

impl LayoutDesc {
    /// Each struct resolves offsets with its own recorded rule
    pub fn build(&self) -> Result<Layout> {
        self.build_as(None)
    }

    /// Resolve every struct in the tree with `rule`, ignoring recorded rules
    pub fn build_with(&self, rule: AlignmentRule) -> Result<Layout> {
        self.build_as(Some(rule))
    }

    fn build_as(&self, forced: Option<AlignmentRule>) -> Result<Layout> {
        match self {
            Self::Scalar(kind) => Ok(Layout::Scalar(*kind)),
            Self::Padding(_) => Err(MarshalError::invalid_layout(
                "padding is only valid inside a struct",
            )),
            Self::Struct(desc) => {
                let mut builder = StructBuilder::new().with_rule(forced.unwrap_or(desc.rule));
                for field in &desc.fields {
                    builder = match (&field.name, &field.layout) {
                        (None, Self::Padding(bytes)) => builder.padding(*bytes),
                        (Some(name), Self::Padding(_)) => {
                            return Err(MarshalError::invalid_layout(format!(
                                "padding entry '{}' cannot be named",
                                name
                            )));
                        }
                        (Some(name), nested) => builder.field(name.clone(), nested.build_as(forced)?),
                        (None, _) => {
                            return Err(MarshalError::invalid_layout("unnamed data field"));
                        }
                    };
                }
                builder.build()
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| MarshalError::invalid_layout(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Plain data tree; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
