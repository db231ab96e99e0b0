use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::error::{FsError, Result};

/// Typed method argument or result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    Boolean(bool),
    Byte(u8),
    UInt32(u32),
    Int32(i32),
    UInt64(u64),
    String(String),
    ByteString(Vec<u8>),
    NodeId(NodeId),
}

impl Variant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Boolean(_) => "Boolean",
            Variant::Byte(_) => "Byte",
            Variant::UInt32(_) => "UInt32",
            Variant::Int32(_) => "Int32",
            Variant::UInt64(_) => "UInt64",
            Variant::String(_) => "String",
            Variant::ByteString(_) => "ByteString",
            Variant::NodeId(_) => "NodeId",
        }
    }

    /// Any non-negative integer variant that fits in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Variant::Byte(v) => Some(v as u64),
            Variant::UInt32(v) => Some(v as u64),
            Variant::Int32(v) if v >= 0 => Some(v as u64),
            Variant::UInt64(v) => Some(v),
            _ => None,
        }
    }
}

/// Positional view over a method's input arguments.
pub struct Args<'a> {
    method: &'static str,
    values: &'a [Variant],
}

impl<'a> Args<'a> {
    pub fn new(method: &'static str, values: &'a [Variant]) -> Self {
        Self { method, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, index: usize) -> Result<&'a Variant> {
        self.values.get(index).ok_or_else(|| {
            FsError::InvalidArgument(format!("{}: missing argument {}", self.method, index))
        })
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Variant) -> FsError {
        FsError::InvalidArgument(format!(
            "{}: argument {} must be {}, got {}",
            self.method,
            index,
            expected,
            found.type_name()
        ))
    }

    pub fn string(&self, index: usize) -> Result<&'a str> {
        match self.get(index)? {
            Variant::String(s) => Ok(s),
            other => Err(self.mismatch(index, "String", other)),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool> {
        match self.get(index)? {
            Variant::Boolean(b) => Ok(*b),
            other => Err(self.mismatch(index, "Boolean", other)),
        }
    }

    pub fn bytes(&self, index: usize) -> Result<&'a [u8]> {
        match self.get(index)? {
            Variant::ByteString(b) => Ok(b),
            other => Err(self.mismatch(index, "ByteString", other)),
        }
    }

    pub fn unsigned(&self, index: usize) -> Result<u64> {
        let value = self.get(index)?;
        value
            .as_u64()
            .ok_or_else(|| self.mismatch(index, "a non-negative integer", value))
    }

    /// Signed length argument; negative values are rejected by the caller.
    pub fn int32(&self, index: usize) -> Result<i32> {
        match *self.get(index)? {
            Variant::Int32(v) => Ok(v),
            Variant::Byte(v) => Ok(v as i32),
            Variant::UInt32(v) => i32::try_from(v)
                .map_err(|_| FsError::InvalidArgument(format!("{}: {} exceeds Int32", self.method, v))),
            ref other => Err(self.mismatch(index, "Int32", other)),
        }
    }
}
