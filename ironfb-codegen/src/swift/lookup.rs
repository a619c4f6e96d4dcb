//! Sorted vector and binary-search lookup generation for keyed tables.

use crate::error::CodegenError;
use crate::swift::types::{TypeMapper, swift_scalar};
use ironfb_schema::ir::{FieldDef, FieldType, StructDef};

/// Statements narrowing the search when the probed key is greater than the
/// query.
pub const NARROW_TO_LOWER: &[&str] = &["span = middle"];

/// Statements narrowing the search when the probed key is less than the
/// query.
pub const NARROW_TO_UPPER: &[&str] = &["middle += 1", "start += middle", "span -= middle"];

/// Generator for key-sorted vectors and `lookupByKey`.
#[derive(Debug, Clone, Copy)]
pub struct KeyLookupGenerator<'a> {
    mapper: TypeMapper<'a>,
}

impl<'a> KeyLookupGenerator<'a> {
    /// Creates a new key lookup generator.
    #[must_use]
    pub fn new(mapper: TypeMapper<'a>) -> Self {
        Self { mapper }
    }

    /// Generates the sort and lookup routines of a keyed table.
    ///
    /// # Errors
    /// Returns `CodegenError::Generation` if the table has no usable key
    /// field.
    pub fn generate(&self, def: &StructDef) -> Result<String, CodegenError> {
        let key = def.key_field().ok_or_else(|| {
            CodegenError::generation(format!("table '{}' has a key but no key field", def.name))
        })?;
        match &key.ty {
            FieldType::String | FieldType::Scalar(_) | FieldType::Enum(_) => {}
            FieldType::Struct(_) | FieldType::Vector(_) | FieldType::Union(_) => {
                return Err(CodegenError::generation(format!(
                    "key field '{}' of table '{}' must be a scalar or a string",
                    key.name, def.name
                )));
            }
        }

        let mut output = String::new();
        output.push_str(&self.generate_sort(def, key)?);
        output.push_str(&self.generate_lookup(def, key)?);
        Ok(output)
    }

    /// Generates `createSortedVectorOf<Table>`, which orders unfinished
    /// table offsets by key before the vector is written.
    fn generate_sort(&self, def: &StructDef, key: &FieldDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        output.push('\n');
        output.push_str(&format!(
            "  public static func createSortedVectorOf{}(_ fbb: FlatBufferBuilder, _ offsets: [Offset<{}>]) -> Offset<UOffset> {{\n",
            def.name, def.name
        ));
        output.push_str("    var sorted = offsets\n");
        output.push_str("    sorted.sort { o1, o2 in\n");

        let field_at = |o: &str| {
            format!(
                "Table.offset({o}.o, vOffset: {}, fbb: fbb.buffer)",
                key.offset
            )
        };
        if key.ty == FieldType::String {
            output.push_str(&format!(
                "      Table.compare({}, {}, fbb: fbb.buffer) < 0\n",
                field_at("o1"),
                field_at("o2")
            ));
        } else {
            let raw = swift_scalar(self.mapper.raw_scalar(&key.ty)?);
            output.push_str(&format!(
                "      let val1 = fbb.buffer.read(def: {raw}.self, position: Int({}))\n",
                field_at("o1")
            ));
            output.push_str(&format!(
                "      let val2 = fbb.buffer.read(def: {raw}.self, position: Int({}))\n",
                field_at("o2")
            ));
            output.push_str("      return val1 < val2\n");
        }

        output.push_str("    }\n");
        output.push_str("    return fbb.createVector(ofOffsets: sorted)\n");
        output.push_str("  }\n");

        Ok(output)
    }

    /// Generates `lookupByKey`, a binary search over a key-sorted vector of
    /// tables. Each probe follows the element's offset to reach the table
    /// before reading its key.
    fn generate_lookup(&self, def: &StructDef, key: &FieldDef) -> Result<String, CodegenError> {
        let mut output = String::new();
        let key_type = self
            .mapper
            .type_get(&key.ty)
            .map_err(|e| e.with_field(&key.name))?;
        let is_string = key.ty == FieldType::String;

        output.push('\n');
        output.push_str(&format!(
            "  public static func lookupByKey(vector: Offset<UOffset>, key: {key_type}, fbb: ByteBuffer) -> {}? {{\n",
            def.name
        ));
        if is_string {
            output.push_str("    let byteKey = Array(key.utf8)\n");
        }
        output.push_str("    var vectorLocation = Int32(fbb.capacity) - vector.o\n");
        output.push_str("    var span = fbb.read(def: Int32.self, position: Int(vectorLocation))\n");
        output.push_str("    var start: Int32 = 0\n");
        output.push_str("    vectorLocation += 4\n");
        output.push_str("    while span != 0 {\n");
        output.push_str("      var middle = span / 2\n");
        output.push_str(
            "      let tableOffset = Table.indirect(vectorLocation + 4 * (start + middle), fbb)\n",
        );

        let key_at = format!(
            "Table.offset(tableOffset, vOffset: {}, fbb: fbb)",
            key.offset
        );
        if is_string {
            output.push_str(&format!(
                "      let comp = Table.compare({key_at}, byteKey, fbb: fbb)\n"
            ));
        } else {
            let raw = swift_scalar(self.mapper.raw_scalar(&key.ty)?);
            let query = format!("key{}", self.mapper.source_cast(&key.ty));
            output.push_str(&format!(
                "      let val = fbb.read(def: {raw}.self, position: Int({key_at}))\n"
            ));
            output.push_str(&format!(
                "      let comp = val > {query} ? 1 : val < {query} ? -1 : 0\n"
            ));
        }

        output.push_str("      if comp > 0 {\n");
        for statement in NARROW_TO_LOWER {
            output.push_str(&format!("        {statement}\n"));
        }
        output.push_str("      } else if comp < 0 {\n");
        for statement in NARROW_TO_UPPER {
            output.push_str(&format!("        {statement}\n"));
        }
        output.push_str("      } else {\n");
        output.push_str(&format!(
            "        return {}(fbb, o: tableOffset)\n",
            def.name
        ));
        output.push_str("      }\n");
        output.push_str("    }\n");
        output.push_str("    return nil\n");
        output.push_str("  }\n");

        Ok(output)
    }
}
