//! Fixed record construction.
//!
//! A fixed record is written into the builder as one contiguous block. The
//! builder grows from high addresses to low, so the block is produced by:
//!
//! 1. reserving `bytesize` bytes aligned to `minalign` once, for the
//!    outermost record only;
//! 2. walking the fields in reverse declaration order;
//! 3. for each field, writing its trailing padding first and then the field
//!    itself, so the padding lands after the field in forward order;
//! 4. recursing into nested fixed records with the same reverse walk, their
//!    argument names prefixed with the parent field's name.
//!
//! The walk is captured as a list of [`LayoutStep`]s before it is rendered.

use crate::error::CodegenError;
use crate::swift::types::TypeMapper;
use ironfb_schema::ir::{FieldType, StructDef, to_camel_case};
use ironfb_schema::types::ScalarKind;

/// One builder operation of a fixed record construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutStep {
    /// Reserve and align space for the whole record.
    Reserve {
        /// Alignment in bytes.
        alignment: usize,
        /// Record size in bytes.
        size: usize,
    },
    /// Zero padding bytes.
    Pad(usize),
    /// Write one scalar argument.
    Put {
        /// Argument name.
        arg: String,
        /// Raw scalar written.
        kind: ScalarKind,
        /// Conversion applied to the argument before the write.
        source_cast: &'static str,
    },
}

/// Flattens fixed records into builder steps and constructor arguments.
#[derive(Debug, Clone, Copy)]
pub struct LayoutGenerator<'a> {
    mapper: TypeMapper<'a>,
}

impl<'a> LayoutGenerator<'a> {
    /// Creates a new layout generator.
    #[must_use]
    pub fn new(mapper: TypeMapper<'a>) -> Self {
        Self { mapper }
    }

    /// Computes the construction steps of a fixed record.
    ///
    /// # Errors
    /// Returns `CodegenError` if a field is not storable inline or refers to
    /// an undeclared type.
    pub fn steps(&self, def: &StructDef) -> Result<Vec<LayoutStep>, CodegenError> {
        let mut steps = vec![LayoutStep::Reserve {
            alignment: def.minalign,
            size: def.bytesize,
        }];
        self.flatten(def, "", &mut steps)?;
        Ok(steps)
    }

    fn flatten(
        &self,
        def: &StructDef,
        prefix: &str,
        steps: &mut Vec<LayoutStep>,
    ) -> Result<(), CodegenError> {
        for field in def.fields.iter().rev() {
            if field.padding > 0 {
                steps.push(LayoutStep::Pad(field.padding));
            }
            match &field.ty {
                FieldType::Struct(name) => {
                    let nested = self.fixed_struct(name, &field.name)?;
                    let nested_prefix = format!("{prefix}{}_", to_camel_case(&field.name, false));
                    self.flatten(nested, &nested_prefix, steps)?;
                }
                FieldType::Scalar(_) | FieldType::Enum(_) => {
                    steps.push(LayoutStep::Put {
                        arg: format!("{prefix}{}", to_camel_case(&field.name, false)),
                        kind: self
                            .mapper
                            .raw_scalar(&field.ty)
                            .map_err(|e| e.with_field(&field.name))?,
                        source_cast: self.mapper.source_cast(&field.ty),
                    });
                }
                FieldType::String | FieldType::Vector(_) | FieldType::Union(_) => {
                    return Err(not_inline(def, &field.name));
                }
            }
        }
        Ok(())
    }

    /// Computes the constructor arguments in declaration order.
    ///
    /// # Errors
    /// Returns `CodegenError` under the same conditions as [`Self::steps`].
    pub fn arguments(&self, def: &StructDef) -> Result<Vec<(String, String)>, CodegenError> {
        let mut args = Vec::new();
        self.collect_arguments(def, "", &mut args)?;
        Ok(args)
    }

    fn collect_arguments(
        &self,
        def: &StructDef,
        prefix: &str,
        args: &mut Vec<(String, String)>,
    ) -> Result<(), CodegenError> {
        for field in &def.fields {
            match &field.ty {
                FieldType::Struct(name) => {
                    let nested = self.fixed_struct(name, &field.name)?;
                    let nested_prefix = format!("{prefix}{}_", to_camel_case(&field.name, false));
                    self.collect_arguments(nested, &nested_prefix, args)?;
                }
                FieldType::Scalar(_) | FieldType::Enum(_) => {
                    let ty = self
                        .mapper
                        .basic_name(&field.ty)
                        .map_err(|e| e.with_field(&field.name))?;
                    args.push((format!("{prefix}{}", to_camel_case(&field.name, false)), ty));
                }
                FieldType::String | FieldType::Vector(_) | FieldType::Union(_) => {
                    return Err(not_inline(def, &field.name));
                }
            }
        }
        Ok(())
    }

    /// Generates the static constructor of a fixed record.
    ///
    /// # Errors
    /// Returns `CodegenError` under the same conditions as [`Self::steps`].
    pub fn generate_create(&self, def: &StructDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        let args: Vec<String> = self
            .arguments(def)?
            .into_iter()
            .map(|(name, ty)| format!(", {name}: {ty}"))
            .collect();
        output.push_str(&format!(
            "  public static func create{}(_ fbb: FlatBufferBuilder{}) -> Offset<{}> {{\n",
            def.name,
            args.concat(),
            def.name
        ));

        for step in self.steps(def)? {
            output.push_str(&render_step(&step));
        }

        output.push_str(&format!(
            "    return Offset<{}>(offset: fbb.offset)\n",
            def.name
        ));
        output.push_str("  }\n");

        Ok(output)
    }

    fn fixed_struct(&self, name: &str, field: &str) -> Result<&'a StructDef, CodegenError> {
        let nested = self
            .mapper
            .struct_def(name)
            .map_err(|e| e.with_field(field))?;
        if !nested.fixed {
            return Err(CodegenError::generation(format!(
                "table '{name}' cannot be stored inline in field '{field}'"
            )));
        }
        Ok(nested)
    }
}

/// Renders one step as a builder call.
#[must_use]
pub fn render_step(step: &LayoutStep) -> String {
    match step {
        LayoutStep::Reserve { alignment, size } => {
            format!("    fbb.prep(alignment: {alignment}, size: {size})\n")
        }
        LayoutStep::Pad(bytes) => format!("    fbb.pad({bytes})\n"),
        LayoutStep::Put {
            arg, source_cast, ..
        } => format!("    fbb.put({arg}{source_cast})\n"),
    }
}

fn not_inline(def: &StructDef, field: &str) -> CodegenError {
    CodegenError::generation(format!(
        "field '{field}' of struct '{}' is not an inline type",
        def.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfb_schema::ir::SchemaIr;
    use ironfb_schema::parse_ir;

    fn create_test_ir() -> SchemaIr {
        let xml = r#"<schema file="layout">
    <enum name="Color" type="ubyte">
        <value name="Red" value="1"/>
        <value name="Green" value="2"/>
    </enum>
    <struct name="Test" bytesize="4" minalign="2">
        <field name="a" type="short" offset="0"/>
        <field name="b" type="byte" offset="2" padding="1"/>
    </struct>
    <struct name="Vec3" bytesize="32" minalign="8">
        <field name="x" type="float" offset="0"/>
        <field name="y" type="float" offset="4"/>
        <field name="z" type="float" offset="8" padding="4"/>
        <field name="test1" type="double" offset="16"/>
        <field name="test2" type="Color" offset="24" padding="1"/>
        <field name="test3" type="Test" offset="26" padding="2"/>
    </struct>
</schema>"#;
        parse_ir(xml).expect("Failed to parse")
    }

    /// Builder stand-in that grows towards lower addresses.
    #[derive(Default)]
    struct BackwardBuffer {
        bytes: Vec<u8>,
    }

    impl BackwardBuffer {
        fn prepend(&mut self, data: &[u8]) {
            let mut grown = data.to_vec();
            grown.extend_from_slice(&self.bytes);
            self.bytes = grown;
        }

        fn run(&mut self, steps: &[LayoutStep], values: &dyn Fn(&str) -> i64) {
            for step in steps {
                match step {
                    LayoutStep::Reserve { alignment, size } => {
                        let misalign = (self.bytes.len() + size) % alignment;
                        if misalign != 0 {
                            self.prepend(&vec![0; alignment - misalign]);
                        }
                    }
                    LayoutStep::Pad(n) => self.prepend(&vec![0; *n]),
                    LayoutStep::Put { arg, kind, .. } => {
                        let value = values(arg).to_le_bytes();
                        self.prepend(&value[..kind.size()]);
                    }
                }
            }
        }
    }

    /// Forward layout of every leaf scalar: (argument name, absolute offset, kind).
    fn forward_leaves(
        ir: &SchemaIr,
        def: &StructDef,
        base: usize,
        prefix: &str,
        out: &mut Vec<(String, usize, ScalarKind)>,
    ) {
        let mapper = TypeMapper::new(ir);
        for field in &def.fields {
            let name = format!("{prefix}{}", field.name);
            match &field.ty {
                FieldType::Struct(nested) => {
                    let nested = ir.struct_def(nested).expect("nested");
                    forward_leaves(ir, nested, base + field.offset, &format!("{name}_"), out);
                }
                ty => out.push((name, base + field.offset, mapper.raw_scalar(ty).expect("scalar"))),
            }
        }
    }

    fn value_for(arg: &str) -> i64 {
        arg.bytes().map(i64::from).sum::<i64>() % 100 + 1
    }

    #[test]
    fn test_field_sizes_sum_to_bytesize() {
        let ir = create_test_ir();
        let mapper = TypeMapper::new(&ir);

        for def in &ir.structs {
            let total: usize = def
                .fields
                .iter()
                .map(|f| mapper.inline_size(&f.ty).unwrap() + f.padding)
                .sum();
            assert_eq!(total, def.bytesize, "struct {}", def.name);
        }
    }

    #[test]
    fn test_steps_walk_fields_in_reverse() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let steps = generator.steps(ir.struct_def("Test").unwrap()).unwrap();

        assert_eq!(
            steps,
            vec![
                LayoutStep::Reserve {
                    alignment: 2,
                    size: 4
                },
                LayoutStep::Pad(1),
                LayoutStep::Put {
                    arg: "b".into(),
                    kind: ScalarKind::Int8,
                    source_cast: ""
                },
                LayoutStep::Put {
                    arg: "a".into(),
                    kind: ScalarKind::Int16,
                    source_cast: ""
                },
            ]
        );
    }

    #[test]
    fn test_nested_struct_reserves_once() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let steps = generator.steps(ir.struct_def("Vec3").unwrap()).unwrap();

        let reserves = steps
            .iter()
            .filter(|s| matches!(s, LayoutStep::Reserve { .. }))
            .count();
        assert_eq!(reserves, 1);
        assert_eq!(
            steps[0],
            LayoutStep::Reserve {
                alignment: 8,
                size: 32
            }
        );
    }

    #[test]
    fn test_executed_steps_match_forward_layout() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let vec3 = ir.struct_def("Vec3").unwrap();

        let mut buffer = BackwardBuffer::default();
        buffer.run(&generator.steps(vec3).unwrap(), &value_for);
        assert_eq!(buffer.bytes.len(), vec3.bytesize);

        let mut leaves = Vec::new();
        forward_leaves(&ir, vec3, 0, "", &mut leaves);
        assert_eq!(leaves.len(), 7);

        for (name, offset, kind) in leaves {
            let mut raw = [0u8; 8];
            raw[..kind.size()].copy_from_slice(&buffer.bytes[offset..offset + kind.size()]);
            assert_eq!(
                i64::from_le_bytes(raw),
                value_for(&name),
                "field {name} at offset {offset}"
            );
        }
    }

    #[test]
    fn test_padding_bytes_are_zero() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let vec3 = ir.struct_def("Vec3").unwrap();

        let mut buffer = BackwardBuffer::default();
        buffer.run(&generator.steps(vec3).unwrap(), &value_for);

        // z padding, test2 padding, Test.b padding, test3 padding
        for offset in [12, 13, 14, 15, 25, 29, 30, 31] {
            assert_eq!(buffer.bytes[offset], 0, "offset {offset}");
        }
    }

    #[test]
    fn test_arguments_prefix_nested_fields() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let args = generator.arguments(ir.struct_def("Vec3").unwrap()).unwrap();

        let names: Vec<&str> = args.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["x", "y", "z", "test1", "test2", "test3_a", "test3_b"]);
        assert_eq!(args[4].1, "Color");
        assert_eq!(args[3].1, "Double");
    }

    #[test]
    fn test_generate_create() {
        let ir = create_test_ir();
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));
        let output = generator
            .generate_create(ir.struct_def("Vec3").unwrap())
            .unwrap();

        assert!(output.starts_with(
            "  public static func createVec3(_ fbb: FlatBufferBuilder, x: Float32, y: Float32, \
             z: Float32, test1: Double, test2: Color, test3_a: Int16, test3_b: Int8) -> Offset<Vec3> {\n"
        ));
        let body = [
            "    fbb.prep(alignment: 8, size: 32)\n",
            "    fbb.pad(2)\n",
            "    fbb.pad(1)\n",
            "    fbb.put(test3_b)\n",
            "    fbb.put(test3_a)\n",
            "    fbb.pad(1)\n",
            "    fbb.put(test2.rawValue)\n",
            "    fbb.put(test1)\n",
            "    fbb.pad(4)\n",
            "    fbb.put(z)\n",
            "    fbb.put(y)\n",
            "    fbb.put(x)\n",
            "    return Offset<Vec3>(offset: fbb.offset)\n",
        ]
        .concat();
        assert!(output.contains(&body));
        assert!(output.ends_with("  }\n"));
    }

    #[test]
    fn test_string_in_struct_rejected() {
        let mut def = StructDef::fixed("Bad", 4, 4);
        def.add_field(ironfb_schema::FieldDef::new("s", FieldType::String, 0));
        let ir = SchemaIr::new("bad");
        let generator = LayoutGenerator::new(TypeMapper::new(&ir));

        assert!(matches!(
            generator.steps(&def),
            Err(CodegenError::Generation { .. })
        ));
    }
}
