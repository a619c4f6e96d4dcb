//! # IronFB Codegen
//!
//! Swift accessor code generation from resolved FlatBuffers schemas.
//!
//! This crate provides:
//! - Enum and union tag generation with dense name tables
//! - Fixed struct construction in reverse field order
//! - Table accessors, mutators and builders
//! - Key-sorted vectors with binary-search lookup

pub mod error;
pub mod generator;
pub mod swift;

pub use error::CodegenError;
pub use generator::{GeneratedUnit, Generator, GeneratorOptions};

/// Generates Swift code from a resolved IR document.
///
/// # Arguments
/// * `xml` - IR document content
/// * `options` - Generation options
///
/// # Returns
/// The generated output units.
///
/// # Errors
/// Returns `CodegenError` if parsing or generation fails.
pub fn generate_from_xml(
    xml: &str,
    options: &GeneratorOptions,
) -> Result<Vec<GeneratedUnit>, CodegenError> {
    let ir = ironfb_schema::parse_ir(xml)?;
    let generator = Generator::with_options(&ir, options.clone());
    generator.generate()
}

/// Generates Swift code from a resolved IR document file.
///
/// # Arguments
/// * `path` - Path to the IR document
/// * `options` - Generation options
///
/// # Returns
/// The generated output units.
///
/// # Errors
/// Returns `CodegenError` if reading, parsing, or generation fails.
pub fn generate_from_file(
    path: &std::path::Path,
    options: &GeneratorOptions,
) -> Result<Vec<GeneratedUnit>, CodegenError> {
    let xml = std::fs::read_to_string(path)?;
    generate_from_xml(&xml, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAIR_SCHEMA: &str = r#"<schema file="pair" root="Pair">
    <table name="Pair">
        <field name="a" type="int" offset="4"/>
        <field name="b" type="string" offset="6"/>
    </table>
</schema>"#;

    #[test]
    fn test_generate_is_idempotent() {
        let options = GeneratorOptions::new().mutable_buffer(true);
        let first = generate_from_xml(PAIR_SCHEMA, &options).unwrap();
        let second = generate_from_xml(PAIR_SCHEMA, &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_accessors_and_builders_share_slots() {
        let units = generate_from_xml(PAIR_SCHEMA, &GeneratorOptions::default()).unwrap();
        let code = &units[0].code;

        // slot offset = 4 + 2 * declared index
        assert!(code.contains("public var a: Int32 { let o = _accessor.offset(4);"));
        assert!(code.contains("fbb.add(element: a, def: 0, at: 0)"));
        assert!(code.contains("public var b: String? { let o = _accessor.offset(6);"));
        assert!(code.contains("fbb.add(offset: bOffset, at: 1)"));

        let create = [
            "  public static func createPair(\n",
            "    _ fbb: FlatBufferBuilder,\n",
            "    a: Int32 = 0,\n",
            "    bOffset: Offset<String> = Offset<String>()\n",
            "  ) -> Offset<Pair> {\n",
            "    Pair.startPair(fbb)\n",
            "    Pair.addA(fbb, a: a)\n",
            "    Pair.addB(fbb, bOffset: bOffset)\n",
            "    return Pair.endPair(fbb)\n",
            "  }\n",
        ]
        .concat();
        assert!(code.contains(&create));
    }

    #[test]
    fn test_generate_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAIR_SCHEMA.as_bytes()).unwrap();

        let options = GeneratorOptions::new().one_file(true);
        let units = generate_from_file(file.path(), &options).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "pair");
        assert!(units[0].code.contains("public static func getRootAsPair("));
    }

    #[test]
    fn test_generate_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_from_file(&dir.path().join("absent.xml"), &GeneratorOptions::default())
            .unwrap_err();
        assert!(matches!(err, CodegenError::Io(_)));
    }

    #[test]
    fn test_generate_from_invalid_xml() {
        let err = generate_from_xml("<schema>", &GeneratorOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::Parse(_)));
    }
}
