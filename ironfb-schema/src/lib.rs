//! # IronFB Schema
//!
//! Resolved FlatBuffers schema IR.
//!
//! This crate provides:
//! - The resolved schema IR consumed by the code generators
//! - Scalar type definitions
//! - A loader for resolved IR documents

pub mod error;
pub mod ir;
pub mod parser;
pub mod types;

pub use error::ParseError;
pub use ir::{EnumDef, EnumVal, FieldDef, FieldType, SchemaIr, StructDef, to_camel_case};
pub use parser::{parse_ir, parse_ir_file};
pub use types::ScalarKind;
