//! Scalar type definitions.
//!
//! This module contains the closed set of inline scalar kinds a resolved
//! FlatBuffers schema can use for fields, enum underlying types and vector
//! elements.

/// FlatBuffers scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Boolean (1 byte).
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
}

impl ScalarKind {
    /// Size of the largest scalar, used as the first `sortbysize` pass.
    pub const LARGEST_SIZE: usize = 8;

    /// Returns the size of the scalar in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Parses a scalar kind from its schema-language name or sized alias.
    #[must_use]
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "byte" | "int8" => Some(Self::Int8),
            "ubyte" | "uint8" => Some(Self::UInt8),
            "short" | "int16" => Some(Self::Int16),
            "ushort" | "uint16" => Some(Self::UInt16),
            "int" | "int32" => Some(Self::Int32),
            "uint" | "uint32" => Some(Self::UInt32),
            "long" | "int64" => Some(Self::Int64),
            "ulong" | "uint64" => Some(Self::UInt64),
            "float" | "float32" => Some(Self::Float32),
            "double" | "float64" => Some(Self::Float64),
            _ => None,
        }
    }

    /// Returns true if this is an integer type (booleans excluded).
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }
}
