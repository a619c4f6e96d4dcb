//! Type name mapping for the Swift target.
//!
//! Everything here is a pure function of the field type (and the IR for
//! named references): Swift type names, read/write conversions around raw
//! scalar buffer access, default value literals and inline sizes.

use crate::error::CodegenError;
use ironfb_schema::ir::{EnumDef, FieldDef, FieldType, SchemaIr, StructDef, to_camel_case};
use ironfb_schema::types::ScalarKind;

/// Generic placeholder returned by union accessors.
pub const UNION_PLACEHOLDER: &str = "TTable";

/// Size of an offset slot (`UOffset`) in bytes.
pub const OFFSET_SIZE: usize = 4;

/// Returns the Swift primitive name for a scalar kind.
#[must_use]
pub const fn swift_scalar(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Bool => "Bool",
        ScalarKind::Int8 => "Int8",
        ScalarKind::UInt8 => "UInt8",
        ScalarKind::Int16 => "Int16",
        ScalarKind::UInt16 => "UInt16",
        ScalarKind::Int32 => "Int32",
        ScalarKind::UInt32 => "UInt32",
        ScalarKind::Int64 => "Int64",
        ScalarKind::UInt64 => "UInt64",
        ScalarKind::Float32 => "Float32",
        ScalarKind::Float64 => "Double",
    }
}

/// Returns the Swift case name for an enumerator.
#[must_use]
pub fn enum_case_name(name: &str) -> String {
    if name == "NONE" {
        "none".to_string()
    } else {
        to_camel_case(name, false)
    }
}

/// Maps schema types to Swift names and conversions.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapper<'a> {
    ir: &'a SchemaIr,
}

impl<'a> TypeMapper<'a> {
    /// Creates a new type mapper over the IR.
    #[must_use]
    pub fn new(ir: &'a SchemaIr) -> Self {
        Self { ir }
    }

    /// Resolves an enum or union by name.
    ///
    /// # Errors
    /// Returns `CodegenError::UnknownType` if the name is not declared.
    pub fn enum_def(&self, name: &str) -> Result<&'a EnumDef, CodegenError> {
        self.ir
            .enum_def(name)
            .ok_or_else(|| CodegenError::unknown_type(name, ""))
    }

    /// Resolves a fixed record or table by name.
    ///
    /// # Errors
    /// Returns `CodegenError::UnknownType` if the name is not declared.
    pub fn struct_def(&self, name: &str) -> Result<&'a StructDef, CodegenError> {
        self.ir
            .struct_def(name)
            .ok_or_else(|| CodegenError::unknown_type(name, ""))
    }

    /// Returns true for fixed records stored inline.
    ///
    /// # Errors
    /// Returns `CodegenError::UnknownType` for an undeclared record.
    pub fn is_fixed_struct(&self, ty: &FieldType) -> Result<bool, CodegenError> {
        match ty {
            FieldType::Struct(name) => Ok(self.struct_def(name)?.fixed),
            _ => Ok(false),
        }
    }

    /// Returns the raw scalar kind stored in the buffer for an inline type.
    ///
    /// # Errors
    /// Returns `CodegenError::Generation` for types that are not stored as a
    /// single scalar.
    pub fn raw_scalar(&self, ty: &FieldType) -> Result<ScalarKind, CodegenError> {
        match ty {
            FieldType::Scalar(kind) => Ok(*kind),
            FieldType::Enum(name) => Ok(self.enum_def(name)?.underlying),
            FieldType::String
            | FieldType::Struct(_)
            | FieldType::Vector(_)
            | FieldType::Union(_) => Err(CodegenError::generation(format!(
                "{ty:?} is not a scalar type"
            ))),
        }
    }

    /// Swift name of an inline scalar type; enums map to the enum name.
    ///
    /// # Errors
    /// Returns `CodegenError::Generation` for non-scalar types.
    pub fn basic_name(&self, ty: &FieldType) -> Result<String, CodegenError> {
        match ty {
            FieldType::Enum(name) => Ok(self.enum_def(name)?.name.clone()),
            _ => Ok(swift_scalar(self.raw_scalar(ty)?).to_string()),
        }
    }

    /// Swift type returned by accessors of offset-indirected types.
    ///
    /// # Errors
    /// Returns `CodegenError::Generation` for scalars, vectors of vectors and
    /// vectors of unions, none of which have an accessor type.
    pub fn pointer_name(&self, ty: &FieldType) -> Result<String, CodegenError> {
        match ty {
            FieldType::String => Ok("String".to_string()),
            FieldType::Vector(element) => match element.as_ref() {
                FieldType::Vector(_) | FieldType::Union(_) => Err(CodegenError::generation(
                    format!("unsupported vector element type {element:?}"),
                )),
                _ => self.type_get(element),
            },
            FieldType::Struct(name) => Ok(self.struct_def(name)?.name.clone()),
            FieldType::Union(name) => {
                self.enum_def(name)?;
                Ok(UNION_PLACEHOLDER.to_string())
            }
            FieldType::Scalar(_) | FieldType::Enum(_) => Err(CodegenError::generation(format!(
                "{ty:?} has no pointer accessor type"
            ))),
        }
    }

    /// Swift type a reader receives for a value of this type.
    ///
    /// # Errors
    /// Propagates lookup and unsupported-type errors.
    pub fn type_get(&self, ty: &FieldType) -> Result<String, CodegenError> {
        if ty.is_scalar() {
            self.basic_name(ty)
        } else {
            self.pointer_name(ty)
        }
    }

    /// Swift type of a builder argument carrying this field's value.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn builder_arg_type(&self, ty: &FieldType) -> Result<String, CodegenError> {
        match ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => self.basic_name(ty),
            FieldType::String => Ok("Offset<String>".to_string()),
            FieldType::Struct(name) => Ok(format!("Offset<{}>", self.struct_def(name)?.name)),
            FieldType::Vector(_) | FieldType::Union(_) => Ok("Offset<UOffset>".to_string()),
        }
    }

    /// Opening text that wraps a raw read into the destination type.
    ///
    /// Enums are rebuilt from their raw value; every other type needs no
    /// conversion. Vectors use their element's cast.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn destination_cast(&self, ty: &FieldType) -> Result<String, CodegenError> {
        match ty {
            FieldType::Vector(element) => self.destination_cast(element),
            FieldType::Enum(name) => Ok(format!("{}(rawValue: ", self.enum_def(name)?.name)),
            FieldType::Scalar(_) | FieldType::String | FieldType::Struct(_) | FieldType::Union(_) => {
                Ok(String::new())
            }
        }
    }

    /// Closing text matching [`Self::destination_cast`].
    #[must_use]
    pub fn destination_mask(&self, ty: &FieldType) -> &'static str {
        match ty {
            FieldType::Vector(element) => self.destination_mask(element),
            FieldType::Enum(_) => ")!",
            FieldType::Scalar(_) | FieldType::String | FieldType::Struct(_) | FieldType::Union(_) => {
                ""
            }
        }
    }

    /// Suffix converting a destination value back to its raw scalar before a
    /// write.
    #[must_use]
    pub fn source_cast(&self, ty: &FieldType) -> &'static str {
        match ty {
            FieldType::Vector(element) => self.source_cast(element),
            FieldType::Enum(_) => ".rawValue",
            FieldType::Scalar(_) | FieldType::String | FieldType::Struct(_) | FieldType::Union(_) => {
                ""
            }
        }
    }

    /// Expression reading an inline scalar at `position`, converted to the
    /// destination type.
    ///
    /// # Errors
    /// Returns an error for non-scalar types.
    pub fn read_scalar(&self, ty: &FieldType, position: &str) -> Result<String, CodegenError> {
        let raw = swift_scalar(self.raw_scalar(ty)?);
        Ok(format!(
            "{}_accessor.bb.read(def: {raw}.self, position: Int({position})){}",
            self.destination_cast(ty)?,
            self.destination_mask(ty)
        ))
    }

    /// Default value literal with enum names resolved.
    ///
    /// Booleans render as `false` for `0` and `true` otherwise. Enum defaults
    /// render as the enumerator carrying the default value; when none does,
    /// the raw literal is kept.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn default_literal(&self, field: &FieldDef) -> Result<String, CodegenError> {
        match &field.ty {
            FieldType::Enum(name) => {
                let enum_def = self.enum_def(name)?;
                let matched = field
                    .default
                    .parse::<i64>()
                    .ok()
                    .and_then(|value| enum_def.value_named_by(value));
                match matched {
                    Some(val) => Ok(format!("{}.{}", enum_def.name, enum_case_name(&val.name))),
                    None => {
                        tracing::warn!(
                            field = %field.name,
                            enum_name = %enum_def.name,
                            default = %field.default,
                            "enum default matches no enumerator, keeping raw literal"
                        );
                        Ok(field.default.clone())
                    }
                }
            }
            _ => Ok(self.default_literal_raw(field)),
        }
    }

    /// Default value literal as stored in the buffer (enums stay numeric).
    #[must_use]
    pub fn default_literal_raw(&self, field: &FieldDef) -> String {
        match &field.ty {
            FieldType::Scalar(ScalarKind::Bool) => {
                let literal = if field.default == "0" { "false" } else { "true" };
                literal.to_string()
            }
            _ => field.default.clone(),
        }
    }

    /// Default for a builder argument: the value default for scalars, an
    /// empty offset for everything else.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn default_literal_basic(&self, field: &FieldDef) -> Result<String, CodegenError> {
        match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => self.default_literal(field),
            FieldType::String | FieldType::Struct(_) | FieldType::Vector(_) | FieldType::Union(_) => {
                Ok(format!("{}()", self.builder_arg_type(&field.ty)?))
            }
        }
    }

    /// Size of the type when stored inline (in a record or vector element).
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn inline_size(&self, ty: &FieldType) -> Result<usize, CodegenError> {
        match ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => Ok(self.raw_scalar(ty)?.size()),
            FieldType::Struct(name) => {
                let def = self.struct_def(name)?;
                Ok(if def.fixed { def.bytesize } else { OFFSET_SIZE })
            }
            FieldType::String | FieldType::Vector(_) | FieldType::Union(_) => Ok(OFFSET_SIZE),
        }
    }

    /// Alignment of the type when stored inline.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn inline_alignment(&self, ty: &FieldType) -> Result<usize, CodegenError> {
        match ty {
            FieldType::Struct(name) => {
                let def = self.struct_def(name)?;
                Ok(if def.fixed { def.minalign } else { OFFSET_SIZE })
            }
            _ => self.inline_size(ty),
        }
    }

    /// Size class used to order builder adds when `sortbysize` is set.
    ///
    /// # Errors
    /// Propagates lookup errors.
    pub fn base_size(&self, ty: &FieldType) -> Result<usize, CodegenError> {
        match ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => Ok(self.raw_scalar(ty)?.size()),
            FieldType::String | FieldType::Struct(_) | FieldType::Vector(_) | FieldType::Union(_) => {
                Ok(OFFSET_SIZE)
            }
        }
    }
}
