//! Main code generator orchestrating all Swift emitters.

use crate::error::CodegenError;
use crate::swift::{EnumGenerator, RecordGenerator};
use ironfb_schema::ir::SchemaIr;

/// Banner opening every generated unit.
pub const HEADER: &str = "// automatically generated by the FlatBuffers compiler, do not modify\n\n";

/// Code generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Merge every entity into a single unit.
    pub one_file: bool,
    /// Emit in-place mutators for scalar fields.
    pub mutable_buffer: bool,
    /// Name of the merged unit; defaults to the schema file name.
    pub file_name: Option<String>,
}

impl GeneratorOptions {
    /// Creates options with every feature disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether all entities are merged into one unit.
    #[must_use]
    pub fn one_file(mut self, one_file: bool) -> Self {
        self.one_file = one_file;
        self
    }

    /// Sets whether mutators are emitted.
    #[must_use]
    pub fn mutable_buffer(mut self, mutable_buffer: bool) -> Self {
        self.mutable_buffer = mutable_buffer;
        self
    }

    /// Sets the merged unit name.
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// One output unit handed to the caller for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Unit name (entity name, or file name when merged).
    pub name: String,
    /// Namespace components of the unit.
    pub namespace: Vec<String>,
    /// Generated source text.
    pub code: String,
}

impl GeneratedUnit {
    /// Conventional file name for this unit.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_generated.swift", self.name)
    }
}

/// Main code generator.
pub struct Generator<'a> {
    ir: &'a SchemaIr,
    options: GeneratorOptions,
}

impl<'a> Generator<'a> {
    /// Creates a new generator with default options.
    #[must_use]
    pub fn new(ir: &'a SchemaIr) -> Self {
        Self::with_options(ir, GeneratorOptions::default())
    }

    /// Creates a new generator with the given options.
    #[must_use]
    pub fn with_options(ir: &'a SchemaIr, options: GeneratorOptions) -> Self {
        Self { ir, options }
    }

    /// Generates every output unit.
    ///
    /// Enums are emitted before records, each in declaration order. Any
    /// emitter failure aborts generation without partial output.
    ///
    /// # Errors
    /// Returns `CodegenError` if an entity cannot be expressed.
    pub fn generate(&self) -> Result<Vec<GeneratedUnit>, CodegenError> {
        let enums = EnumGenerator::new();
        let records = RecordGenerator::new(self.ir, self.options.mutable_buffer);
        let mut fragments = Vec::new();

        for enum_def in &self.ir.enums {
            tracing::debug!(name = %enum_def.name, is_union = enum_def.is_union, "generating enum");
            fragments.push(Fragment {
                name: &enum_def.name,
                namespace: &enum_def.namespace,
                code: enums.generate(enum_def),
                needs_runtime: false,
            });
        }

        for def in &self.ir.structs {
            tracing::debug!(name = %def.name, fixed = def.fixed, "generating record");
            fragments.push(Fragment {
                name: &def.name,
                namespace: &def.namespace,
                code: records.generate(def)?,
                needs_runtime: true,
            });
        }

        let units = if self.options.one_file {
            self.merge(fragments)
        } else {
            fragments
                .into_iter()
                .filter(|f| !f.code.is_empty())
                .map(|f| GeneratedUnit {
                    name: f.name.to_string(),
                    namespace: f.namespace.to_vec(),
                    code: unit_text(&f.code, f.needs_runtime),
                })
                .collect()
        };

        tracing::info!(
            file = %self.ir.file_name,
            root = self.ir.root().map_or("", |root| root.name.as_str()),
            units = units.len(),
            one_file = self.options.one_file,
            "generated Swift units"
        );

        Ok(units)
    }

    fn merge(&self, fragments: Vec<Fragment<'_>>) -> Vec<GeneratedUnit> {
        let needs_runtime = fragments.iter().any(|f| f.needs_runtime);
        let code: String = fragments.into_iter().map(|f| f.code).collect();
        if code.is_empty() {
            return Vec::new();
        }

        let name = self
            .options
            .file_name
            .clone()
            .unwrap_or_else(|| self.ir.file_name.clone());
        vec![GeneratedUnit {
            name,
            namespace: self.ir.namespace.clone(),
            code: unit_text(&code, needs_runtime),
        }]
    }
}

struct Fragment<'a> {
    name: &'a str,
    namespace: &'a [String],
    code: String,
    needs_runtime: bool,
}

fn unit_text(code: &str, needs_runtime: bool) -> String {
    let mut output = String::from(HEADER);
    if needs_runtime {
        output.push_str("import FlatBuffers\n\n");
    }
    output.push_str(code);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfb_schema::parse_ir;

    fn create_test_ir() -> SchemaIr {
        let xml = r#"<schema file="monster" namespace="MyGame.Sample">
    <enum name="Color" type="byte">
        <value name="Red" value="0"/>
        <value name="Green" value="1"/>
    </enum>
    <struct name="Vec3" bytesize="12" minalign="4">
        <field name="x" type="float" offset="0"/>
        <field name="y" type="float" offset="4"/>
        <field name="z" type="float" offset="8"/>
    </struct>
    <table name="Monster">
        <field name="hp" type="short" offset="4" default="100"/>
        <field name="color" type="Color" offset="6" default="1"/>
    </table>
</schema>"#;
        parse_ir(xml).expect("Failed to parse")
    }

    #[test]
    fn test_options_builder() {
        let options = GeneratorOptions::new()
            .one_file(true)
            .mutable_buffer(true)
            .file_name("bundle");

        assert!(options.one_file);
        assert!(options.mutable_buffer);
        assert_eq!(options.file_name.as_deref(), Some("bundle"));
        assert_eq!(GeneratorOptions::default(), GeneratorOptions::new());
    }

    #[test]
    fn test_unit_per_entity() {
        let ir = create_test_ir();
        let units = Generator::new(&ir).generate().unwrap();

        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Color", "Vec3", "Monster"]);
        assert!(units.iter().all(|u| u.namespace == ["MyGame", "Sample"]));
        assert!(units.iter().all(|u| u.code.starts_with(HEADER)));

        assert!(!units[0].code.contains("import FlatBuffers"));
        assert!(units[1].code.contains("import FlatBuffers\n\n"));
        assert!(units[2].code.contains("public struct Monster: FlatBufferObject {\n"));
    }

    #[test]
    fn test_one_file_merges_in_order() {
        let ir = create_test_ir();
        let options = GeneratorOptions::new().one_file(true);
        let units = Generator::with_options(&ir, options).generate().unwrap();

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.name, "monster");
        assert_eq!(unit.file_name(), "monster_generated.swift");
        assert_eq!(unit.code.matches(HEADER).count(), 1);

        let color = unit.code.find("public enum Color").unwrap();
        let vec3 = unit.code.find("public struct Vec3").unwrap();
        let monster = unit.code.find("public struct Monster").unwrap();
        assert!(color < vec3 && vec3 < monster);
    }

    #[test]
    fn test_one_file_custom_name() {
        let ir = create_test_ir();
        let options = GeneratorOptions::new().one_file(true).file_name("bundle");
        let units = Generator::with_options(&ir, options).generate().unwrap();

        assert_eq!(units[0].name, "bundle");
    }

    #[test]
    fn test_empty_schema_produces_no_units() {
        let ir = SchemaIr::new("empty");

        assert!(Generator::new(&ir).generate().unwrap().is_empty());
        let options = GeneratorOptions::new().one_file(true);
        assert!(Generator::with_options(&ir, options).generate().unwrap().is_empty());
    }

    #[test]
    fn test_enum_only_unit_has_no_import() {
        let mut ir = create_test_ir();
        ir.structs.clear();
        let options = GeneratorOptions::new().one_file(true);
        let units = Generator::with_options(&ir, options).generate().unwrap();

        assert!(!units[0].code.contains("import"));
    }

    #[test]
    fn test_mutable_buffer_option() {
        let ir = create_test_ir();
        let plain = Generator::new(&ir).generate().unwrap();
        assert!(plain.iter().all(|u| !u.code.contains("mutate")));

        let options = GeneratorOptions::new().mutable_buffer(true);
        let mutable = Generator::with_options(&ir, options).generate().unwrap();
        assert!(mutable[2].code.contains("public func mutateHp(hp: Int16) -> Bool"));
        assert!(mutable[1].code.contains("public func mutateX(_ x: Float32)"));
    }

    #[test]
    fn test_failure_returns_no_partial_output() {
        let mut ir = create_test_ir();
        ir.structs[1].fields[0].ty = ironfb_schema::FieldType::Struct("Missing".into());

        let err = Generator::new(&ir).generate().unwrap_err();
        assert!(matches!(err, CodegenError::UnknownType { .. }));
    }
}
