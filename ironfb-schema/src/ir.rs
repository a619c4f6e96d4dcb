//! Intermediate representation for code generation.
//!
//! The IR is the output of the schema compiler's semantic resolution: every
//! field already carries its offset, every fixed record its byte size and
//! alignment, and every flag (`required`, `key`, `deprecated`) is decided.
//! Code generators only read it.

use crate::types::ScalarKind;

/// Resolved schema handed to the code generators.
///
/// All collections preserve declaration order so that generated output is
/// reproducible byte for byte.
#[derive(Debug, Clone, Default)]
pub struct SchemaIr {
    /// Base name of the schema file (used for merged output).
    pub file_name: String,
    /// Namespace of the last declared namespace block.
    pub namespace: Vec<String>,
    /// Enumerations and unions in declaration order.
    pub enums: Vec<EnumDef>,
    /// Fixed records and tables in declaration order.
    pub structs: Vec<StructDef>,
}

impl SchemaIr {
    /// Creates an empty IR for the given schema file.
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Looks up an enum or union by name.
    #[must_use]
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Looks up a fixed record or table by name.
    #[must_use]
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    /// Returns the root table, if one was declared.
    #[must_use]
    pub fn root(&self) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.is_root)
    }
}

/// Enumeration (or union tag) definition.
#[derive(Debug, Clone)]
pub struct EnumDef {
    /// Enum name.
    pub name: String,
    /// Declaring namespace.
    pub namespace: Vec<String>,
    /// Underlying integer type.
    pub underlying: ScalarKind,
    /// Enumerators in declaration order.
    pub values: Vec<EnumVal>,
    /// Whether this enum is the tag type of a union.
    pub is_union: bool,
}

impl EnumDef {
    /// Creates a new enum definition.
    #[must_use]
    pub fn new(name: impl Into<String>, underlying: ScalarKind) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            underlying,
            values: Vec::new(),
            is_union: false,
        }
    }

    /// Adds an enumerator.
    pub fn add_value(&mut self, name: impl Into<String>, value: i64) {
        self.values.push(EnumVal {
            name: name.into(),
            value,
        });
    }

    /// Finds the enumerator carrying the given value.
    #[must_use]
    pub fn value_named_by(&self, value: i64) -> Option<&EnumVal> {
        self.values.iter().find(|v| v.value == value)
    }

    /// Smallest declared value.
    #[must_use]
    pub fn min_value(&self) -> Option<i64> {
        self.values.iter().map(|v| v.value).min()
    }

    /// Largest declared value.
    #[must_use]
    pub fn max_value(&self) -> Option<i64> {
        self.values.iter().map(|v| v.value).max()
    }
}

/// A single enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVal {
    /// Enumerator name.
    pub name: String,
    /// Explicit integer value.
    pub value: i64,
}

/// Fixed record (struct) or table definition.
#[derive(Debug, Clone)]
pub struct StructDef {
    /// Record name.
    pub name: String,
    /// Declaring namespace.
    pub namespace: Vec<String>,
    /// True for fixed-size structs, false for tables.
    pub fixed: bool,
    /// Fields in declaration order, deprecated ones included.
    pub fields: Vec<FieldDef>,
    /// Inline size in bytes (fixed records only).
    pub bytesize: usize,
    /// Minimum alignment in bytes (fixed records only).
    pub minalign: usize,
    /// Whether builder adds should be ordered by field size.
    pub sortbysize: bool,
    /// Whether one field is the binary-search key.
    pub has_key: bool,
    /// Whether this table is the schema's root type.
    pub is_root: bool,
    /// Four-character file identifier of the root type.
    pub file_identifier: Option<String>,
}

impl StructDef {
    /// Creates a new table definition.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            fixed: false,
            fields: Vec::new(),
            bytesize: 0,
            minalign: 1,
            sortbysize: true,
            has_key: false,
            is_root: false,
            file_identifier: None,
        }
    }

    /// Creates a new fixed record definition.
    #[must_use]
    pub fn fixed(name: impl Into<String>, bytesize: usize, minalign: usize) -> Self {
        Self {
            fixed: true,
            bytesize,
            minalign,
            sortbysize: false,
            ..Self::table(name)
        }
    }

    /// Adds a field.
    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.push(field);
    }

    /// Returns the key field, if any.
    #[must_use]
    pub fn key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key && !f.deprecated)
    }

    /// Iterates over the fields that still get accessors.
    pub fn live_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.deprecated)
    }
}

/// Field of a fixed record or table.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: FieldType,
    /// Byte offset inside a fixed record, or vtable slot offset for tables.
    pub offset: usize,
    /// Default value literal.
    pub default: String,
    /// Must be present in every serialized table.
    pub required: bool,
    /// No longer generated, still occupies its slot.
    pub deprecated: bool,
    /// Binary-search key of the record.
    pub key: bool,
    /// Padding bytes following this field (fixed records only).
    pub padding: usize,
    /// Record embedded as a nested buffer in this `[ubyte]` field.
    pub nested_flatbuffer: Option<String>,
}

impl FieldDef {
    /// Creates a new field with a zero default and no flags.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType, offset: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            offset,
            default: "0".to_string(),
            required: false,
            deprecated: false,
            key: false,
            padding: 0,
            nested_flatbuffer: None,
        }
    }
}

/// Field type variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Inline scalar.
    Scalar(ScalarKind),
    /// Inline enum value, by enum name.
    Enum(String),
    /// Offset to a string.
    String,
    /// Fixed record (inline) or table (offset), by record name.
    Struct(String),
    /// Offset to a vector of the element type.
    Vector(Box<FieldType>),
    /// Offset to a union member, by union name.
    Union(String),
}

impl FieldType {
    /// Returns true for types stored inline as a single scalar.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Returns the vector element type, if this is a vector.
    #[must_use]
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            Self::Vector(element) => Some(element),
            _ => None,
        }
    }
}

/// Converts `snake_case` to `camelCase` (or `CamelCase` when `upper_first`).
#[must_use]
pub fn to_camel_case(s: &str, upper_first: bool) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = upper_first;

    for (i, c) in s.chars().enumerate() {
        if c == '_' && i > 0 {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else if i == 0 {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}
