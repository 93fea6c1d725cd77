//! Typed argument values and their byte images

use crate::errors::{MarshalError, Result};
use crate::layout::{Endian, Layout, ScalarKind, StructLayout};

/// A value to marshal, or one read back
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Address(usize),
    /// Raw byte image of a struct
    Aggregate(Vec<u8>),
}

impl ArgValue {
    /// Scalar kind, `None` for aggregates
    pub const fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::U8(_) => ScalarKind::U8,
            Self::U16(_) => ScalarKind::U16,
            Self::U32(_) => ScalarKind::U32,
            Self::U64(_) => ScalarKind::U64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Address(_) => ScalarKind::Address,
            Self::Aggregate(_) => return None,
        })
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Self::Aggregate(bytes) => bytes.len(),
            other => other.kind().map_or(0, ScalarKind::size),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Aggregate(bytes) => format!("aggregate[{}]", bytes.len()),
            other => other.kind().map(|k| k.to_string()).unwrap_or_default(),
        }
    }

    /// Raw bit pattern of a scalar, zero extended
    fn bits(&self) -> Option<u64> {
        Some(match *self {
            Self::I8(v) => v as u8 as u64,
            Self::I16(v) => v as u16 as u64,
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::U64(v) => v,
            Self::F32(v) => v.to_bits() as u64,
            Self::F64(v) => v.to_bits(),
            Self::Address(v) => v as u64,
            Self::Aggregate(_) => return None,
        })
    }

    fn from_bits(kind: ScalarKind, bits: u64) -> Self {
        match kind {
            ScalarKind::I8 => Self::I8(bits as i8),
            ScalarKind::I16 => Self::I16(bits as i16),
            ScalarKind::I32 => Self::I32(bits as i32),
            ScalarKind::I64 => Self::I64(bits as i64),
            ScalarKind::U8 => Self::U8(bits as u8),
            ScalarKind::U16 => Self::U16(bits as u16),
            ScalarKind::U32 => Self::U32(bits as u32),
            ScalarKind::U64 => Self::U64(bits),
            ScalarKind::F32 => Self::F32(f32::from_bits(bits as u32)),
            ScalarKind::F64 => Self::F64(f64::from_bits(bits)),
            ScalarKind::Address => Self::Address(bits as usize),
        }
    }

    /// Byte image of this value under `layout`
    ///
    /// Fails with `LayoutMismatch` when the value's kind or size disagrees
    /// with the declared layout.
    pub fn encode(&self, layout: &Layout, endian: Endian) -> Result<Vec<u8>> {
        match (self, layout) {
            (Self::Aggregate(bytes), layout) if !layout.is_padding() => {
                if bytes.len() == layout.size() {
                    Ok(bytes.clone())
                } else {
                    Err(MarshalError::mismatch(
                        format!("{} ({} bytes)", layout, layout.size()),
                        self.describe(),
                    ))
                }
            }
            (value, Layout::Scalar(kind)) if value.kind() == Some(*kind) => {
                let bits = value.bits().unwrap_or_default();
                Ok(endian.encode_bits(bits, kind.size()))
            }
            _ => Err(MarshalError::mismatch(layout, self.describe())),
        }
    }

    /// Inverse of `encode`
    pub fn decode(layout: &Layout, bytes: &[u8], endian: Endian) -> Result<Self> {
        if bytes.len() != layout.size() {
            return Err(MarshalError::mismatch(
                format!("{} ({} bytes)", layout, layout.size()),
                format!("{} bytes", bytes.len()),
            ));
        }
        match layout {
            Layout::Scalar(kind) => Ok(Self::from_bits(*kind, endian.decode_bits(bytes))),
            Layout::Struct(_) => Ok(Self::Aggregate(bytes.to_vec())),
            Layout::Padding(_) => Err(MarshalError::invalid_layout("cannot decode padding")),
        }
    }

    /// Register image: integers sign or zero extended to `width` bytes
    pub(crate) fn widen(kind: ScalarKind, bytes: &[u8], width: usize, endian: Endian) -> Vec<u8> {
        let bits = endian.decode_bits(bytes);
        let extended = if kind.is_signed() {
            let shift = 64 - kind.size() * 8;
            (((bits << shift) as i64) >> shift) as u64
        } else {
            bits
        };
        endian.encode_bits(extended, width)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I8(v) => Some(v as i64),
            Self::I16(v) => Some(v as i64),
            Self::I32(v) => Some(v as i64),
            Self::I64(v) => Some(v),
            Self::U8(v) => Some(v as i64),
            Self::U16(v) => Some(v as i64),
            Self::U32(v) => Some(v as i64),
            Self::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<usize> {
        match *self {
            Self::Address(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Aggregate(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl StructLayout {
    /// Build a struct image from named field values; unnamed bytes stay zero
    pub fn encode(&self, values: &[(&str, ArgValue)], endian: Endian) -> Result<Vec<u8>> {
        let mut image = vec![0u8; self.size()];
        for (name, value) in values {
            let field = self.field(name).ok_or_else(|| {
                MarshalError::invalid_layout(format!("struct has no field '{}'", name))
            })?;
            let bytes = value.encode(&field.layout, endian)?;
            image[field.offset..field.offset + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(image)
    }

    /// Read one named field out of a struct image
    pub fn decode_field(&self, image: &[u8], name: &str, endian: Endian) -> Result<ArgValue> {
        if image.len() != self.size() {
            return Err(MarshalError::mismatch(
                format!("{} bytes", self.size()),
                format!("{} bytes", image.len()),
            ));
        }
        let field = self.field(name).ok_or_else(|| {
            MarshalError::invalid_layout(format!("struct has no field '{}'", name))
        })?;
        let end = field.offset + field.layout.size();
        ArgValue::decode(&field.layout, &image[field.offset..end], endian)
    }
}
