//! Record (table and fixed struct) code generation.

use crate::error::CodegenError;
use crate::swift::layout::LayoutGenerator;
use crate::swift::lookup::KeyLookupGenerator;
use crate::swift::types::{TypeMapper, enum_case_name};
use ironfb_schema::ir::{FieldDef, FieldType, SchemaIr, StructDef, to_camel_case};
use ironfb_schema::types::ScalarKind;

/// Generator for record accessors and builders.
pub struct RecordGenerator<'a> {
    mapper: TypeMapper<'a>,
    layout: LayoutGenerator<'a>,
    lookup: KeyLookupGenerator<'a>,
    mutable_buffer: bool,
}

impl<'a> RecordGenerator<'a> {
    /// Creates a new record generator.
    ///
    /// # Arguments
    /// * `ir` - Resolved schema
    /// * `mutable_buffer` - Whether in-place mutators are emitted
    #[must_use]
    pub fn new(ir: &'a SchemaIr, mutable_buffer: bool) -> Self {
        let mapper = TypeMapper::new(ir);
        Self {
            mapper,
            layout: LayoutGenerator::new(mapper),
            lookup: KeyLookupGenerator::new(mapper),
            mutable_buffer,
        }
    }

    /// Generates the wrapper type of one record.
    ///
    /// # Errors
    /// Returns `CodegenError` if a field refers to an undeclared type or has a
    /// type this target cannot express.
    pub fn generate(&self, def: &StructDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        output.push_str(&self.generate_header(def));

        for field in def.live_fields() {
            output.push_str(
                &self
                    .generate_field(def, field)
                    .map_err(|e| e.with_field(&field.name))?,
            );
        }

        if def.fixed {
            output.push('\n');
            output.push_str(&self.layout.generate_create(def)?);
        } else {
            output.push_str(&self.generate_builder(def)?);
            if def.has_key {
                output.push_str(&self.lookup.generate(def)?);
            }
        }

        output.push_str("}\n\n");
        Ok(output)
    }

    fn generate_header(&self, def: &StructDef) -> String {
        let mut output = String::new();
        let accessor = if def.fixed { "Struct" } else { "Table" };

        output.push_str(&format!(
            "public struct {}: FlatBufferObject {{\n",
            def.name
        ));
        output.push_str(&format!("  private var _accessor: {accessor}\n\n"));
        output.push_str("  public var bb: ByteBuffer { return _accessor.bb }\n\n");

        if !def.fixed {
            output.push_str(&self.generate_root_accessors(def));
        }

        output.push_str(&format!(
            "  public init(_ bb: ByteBuffer, o: Int32) {{ _accessor = {accessor}(bb: bb, position: o) }}\n"
        ));
        output.push_str(&format!(
            "  public mutating func __assign(_ i: Int32, _ bb: ByteBuffer) -> {} {{ _accessor = {accessor}(bb: bb, position: i); return self }}\n\n",
            def.name
        ));

        output
    }

    /// Root accessors binding a table at the buffer's read position, plus the
    /// identifier check for the root table.
    fn generate_root_accessors(&self, def: &StructDef) -> String {
        let mut output = String::new();
        let root_offset = "bb.read(def: Int32.self, position: bb.reader) + Int32(bb.reader)";

        output.push_str(&format!(
            "  public static func getRootAs{}(_ bb: ByteBuffer) -> {} {{ return {}(bb, o: {root_offset}) }}\n",
            def.name, def.name, def.name
        ));
        output.push_str(&format!(
            "  public static func getRootAs{}(_ bb: ByteBuffer, _ obj: inout {}) -> {} {{ return obj.__assign({root_offset}, bb) }}\n",
            def.name, def.name, def.name
        ));

        if let Some(identifier) = root_identifier(def) {
            output.push_str(&format!(
                "  public static func {}BufferHasIdentifier(_ bb: ByteBuffer) -> Bool {{ return Table.hasIdentifier(bb, \"{identifier}\") }}\n",
                to_camel_case(&def.name, false)
            ));
        }

        output.push('\n');
        output
    }

    fn generate_field(&self, def: &StructDef, field: &FieldDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => {
                output.push_str(&self.generate_scalar_accessor(def, field)?);
            }
            FieldType::Struct(name) => {
                let nested = self.mapper.struct_def(name)?;
                if def.fixed && !nested.fixed {
                    return Err(CodegenError::generation(format!(
                        "table '{}' cannot be stored inline in struct '{}'",
                        nested.name, def.name
                    )));
                }
                output.push_str(&self.generate_struct_accessor(def, field, nested));
            }
            FieldType::String | FieldType::Vector(_) | FieldType::Union(_) if def.fixed => {
                return Err(CodegenError::generation(format!(
                    "struct '{}' can only hold scalars and structs",
                    def.name
                )));
            }
            FieldType::String => {
                output.push_str(&self.generate_string_accessor(def, field));
            }
            FieldType::Vector(element) => {
                output.push_str(&self.generate_vector_accessor(field, element)?);
            }
            FieldType::Union(name) => {
                self.mapper.enum_def(name)?;
                output.push_str(&generate_union_accessor(field));
            }
        }

        if self.has_byte_access(&field.ty) {
            output.push_str(&format!(
                "  public func get{}Bytes() -> ArraySlice<UInt8>? {{ return _accessor.vectorAsArraySlice(at: {}) }}\n",
                to_camel_case(&field.name, true),
                field.offset
            ));
        }

        if let Some(nested) = &field.nested_flatbuffer {
            output.push_str(&self.generate_nested_flatbuffer(field, nested)?);
        }

        if self.mutable_buffer {
            output.push_str(&self.generate_mutator(def, field)?);
        }

        Ok(output)
    }

    fn generate_scalar_accessor(
        &self,
        def: &StructDef,
        field: &FieldDef,
    ) -> Result<String, CodegenError> {
        let name = to_camel_case(&field.name, false);
        let ty = self.mapper.basic_name(&field.ty)?;

        if def.fixed {
            let read = self
                .mapper
                .read_scalar(&field.ty, &format!("_accessor.position + {}", field.offset))?;
            return Ok(format!(
                "  public var {name}: {ty} {{ return {read} }}\n"
            ));
        }

        let read = self.mapper.read_scalar(&field.ty, "o + _accessor.position")?;
        let default = match &field.ty {
            FieldType::Enum(_) => self.mapper.default_literal(field)?,
            _ => format!("{ty}({})", self.mapper.default_literal(field)?),
        };
        Ok(format!(
            "  public var {name}: {ty} {{ let o = _accessor.offset({}); return o != 0 ? {read} : {default} }}\n",
            field.offset
        ))
    }

    fn generate_struct_accessor(
        &self,
        def: &StructDef,
        field: &FieldDef,
        nested: &StructDef,
    ) -> String {
        let name = to_camel_case(&field.name, false);
        let ty = &nested.name;

        if def.fixed {
            return format!(
                "  public var {name}: {ty} {{ return {ty}(_accessor.bb, o: _accessor.position + {}) }}\n",
                field.offset
            );
        }

        let position = if nested.fixed {
            "o + _accessor.position"
        } else {
            "_accessor.indirect(o + _accessor.position)"
        };
        format!(
            "  public var {name}: {ty}? {{ let o = _accessor.offset({}); return o == 0 ? nil : {ty}(_accessor.bb, o: {position}) }}\n",
            field.offset
        )
    }

    fn generate_string_accessor(&self, def: &StructDef, field: &FieldDef) -> String {
        let name = to_camel_case(&field.name, false);

        if field.required {
            return format!(
                "  public var {name}: String {{ let o = _accessor.offset({}); guard o != 0 else {{ preconditionFailure(\"required field '{}' is missing in {}\") }}; return _accessor.string(at: o + _accessor.position)! }}\n",
                field.offset, field.name, def.name
            );
        }

        format!(
            "  public var {name}: String? {{ let o = _accessor.offset({}); return o != 0 ? _accessor.string(at: o + _accessor.position) : nil }}\n",
            field.offset
        )
    }

    fn generate_vector_accessor(
        &self,
        field: &FieldDef,
        element: &FieldType,
    ) -> Result<String, CodegenError> {
        let mut output = String::new();
        let name = to_camel_case(&field.name, false);
        let ty = self.mapper.pointer_name(&field.ty)?;
        let size = self.mapper.inline_size(element)?;
        let slot = format!("let o = _accessor.offset({}); ", field.offset);
        let index = format!("_accessor.vector(at: o) + j * {size}");

        output.push_str(&format!(
            "  public var {name}Length: Int32 {{ {slot}return o == 0 ? 0 : _accessor.vector(count: o) }}\n"
        ));

        let element_accessor = match element {
            FieldType::Scalar(kind) => {
                let absent = if *kind == ScalarKind::Bool {
                    "false".to_string()
                } else {
                    format!("{ty}(0)")
                };
                let read = self.mapper.read_scalar(element, &index)?;
                format!(
                    "  public func {name}(at j: Int32) -> {ty} {{ {slot}return o == 0 ? {absent} : {read} }}\n"
                )
            }
            FieldType::Enum(enum_name) => {
                // absent vectors yield the first enumerator; zero need not be a case
                let enum_def = self.mapper.enum_def(enum_name)?;
                let first = enum_def.values.first().ok_or_else(|| {
                    CodegenError::generation(format!("enum '{}' has no values", enum_def.name))
                })?;
                let read = self.mapper.read_scalar(element, &index)?;
                format!(
                    "  public func {name}(at j: Int32) -> {ty} {{ {slot}return o == 0 ? {ty}.{} : {read} }}\n",
                    enum_case_name(&first.name)
                )
            }
            FieldType::String => format!(
                "  public func {name}(at j: Int32) -> String? {{ {slot}return o == 0 ? nil : _accessor.directString(at: {index}) }}\n"
            ),
            FieldType::Struct(record) => {
                let position = if self.mapper.struct_def(record)?.fixed {
                    index
                } else {
                    format!("_accessor.indirect({index})")
                };
                format!(
                    "  public func {name}(at j: Int32) -> {ty}? {{ {slot}return o == 0 ? nil : {ty}(_accessor.bb, o: {position}) }}\n"
                )
            }
            FieldType::Vector(_) | FieldType::Union(_) => {
                return Err(CodegenError::generation(format!(
                    "unsupported vector element type {element:?}"
                )));
            }
        };
        output.push_str(&element_accessor);

        Ok(output)
    }

    fn generate_nested_flatbuffer(
        &self,
        field: &FieldDef,
        nested: &str,
    ) -> Result<String, CodegenError> {
        let nested_def = self.mapper.struct_def(nested)?;
        if nested_def.fixed {
            return Err(CodegenError::generation(format!(
                "nested buffer root '{nested}' must be a table"
            )));
        }
        Ok(format!(
            "  public func get{}As{}() -> {}? {{ let o = _accessor.offset({}); return o == 0 ? nil : {}(_accessor.bb, o: _accessor.indirect(_accessor.vector(at: o))) }}\n",
            to_camel_case(&field.name, true),
            nested_def.name,
            nested_def.name,
            field.offset,
            nested_def.name
        ))
    }

    /// Strings and vectors of scalars expose their raw bytes.
    fn has_byte_access(&self, ty: &FieldType) -> bool {
        *ty == FieldType::String || ty.element().is_some_and(FieldType::is_scalar)
    }

    fn generate_mutator(&self, def: &StructDef, field: &FieldDef) -> Result<String, CodegenError> {
        let arg = to_camel_case(&field.name, false);
        let fn_name = format!("mutate{}", to_camel_case(&field.name, true));

        let (value_ty, kind) = match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => (
                self.mapper.basic_name(&field.ty)?,
                self.mapper.raw_scalar(&field.ty)?,
            ),
            FieldType::Vector(element) if element.is_scalar() && !def.fixed => (
                self.mapper.basic_name(element)?,
                self.mapper.raw_scalar(element)?,
            ),
            _ => return Ok(String::new()),
        };
        let value = write_value(&arg, kind, self.mapper.source_cast(&field.ty));

        if def.fixed {
            return Ok(format!(
                "  public func {fn_name}(_ {arg}: {value_ty}) {{ _accessor.bb.write(value: {value}, index: Int(_accessor.position + {})) }}\n",
                field.offset
            ));
        }

        let slot = format!("let o = _accessor.offset({}); ", field.offset);
        match &field.ty {
            FieldType::Vector(element) => {
                let size = self.mapper.inline_size(element)?;
                Ok(format!(
                    "  public func {fn_name}({arg}: {value_ty}, at j: Int32) -> Bool {{ {slot}guard o != 0 else {{ return false }}; _accessor.bb.write(value: {value}, index: Int(_accessor.vector(at: o) + j * {size})); return true }}\n"
                ))
            }
            _ => Ok(format!(
                "  public func {fn_name}({arg}: {value_ty}) -> Bool {{ {slot}guard o != 0 else {{ return false }}; _accessor.bb.write(value: {value}, index: Int(o + _accessor.position)); return true }}\n"
            )),
        }
    }

    fn generate_builder(&self, def: &StructDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        output.push('\n');
        if self.has_create(def)? {
            output.push_str(&self.generate_create(def)?);
            output.push('\n');
        }

        output.push_str(&format!(
            "  public static func start{}(_ fbb: FlatBufferBuilder) {{ fbb.startTable(with: {}) }}\n",
            def.name,
            def.fields.len()
        ));

        for (index, field) in def.fields.iter().enumerate() {
            if field.deprecated {
                continue;
            }
            output.push_str(
                &self
                    .generate_add(index, field)
                    .map_err(|e| e.with_field(&field.name))?,
            );
            if let FieldType::Vector(element) = &field.ty {
                output.push_str(
                    &self
                        .generate_vector_helpers(field, element)
                        .map_err(|e| e.with_field(&field.name))?,
                );
            }
        }

        output.push_str(&self.generate_end(def));

        if def.is_root {
            let file_id = root_identifier(def)
                .map(|identifier| format!(", fileId: \"{identifier}\""))
                .unwrap_or_default();
            output.push_str(&format!(
                "  public static func finish{}Buffer(_ fbb: FlatBufferBuilder, end: Offset<{}>) {{ fbb.finish(offset: end{file_id}) }}\n",
                def.name, def.name
            ));
        }

        Ok(output)
    }

    /// One-call construction is offered only when every live field can be
    /// passed as a plain value or offset, which excludes inline structs.
    fn has_create(&self, def: &StructDef) -> Result<bool, CodegenError> {
        let mut live = 0;
        for field in def.live_fields() {
            if self
                .mapper
                .is_fixed_struct(&field.ty)
                .map_err(|e| e.with_field(&field.name))?
            {
                return Ok(false);
            }
            live += 1;
        }
        Ok(live > 0)
    }

    /// Generates `create<Table>`: start, one add per live field in size
    /// passes, end.
    fn generate_create(&self, def: &StructDef) -> Result<String, CodegenError> {
        let mut output = String::new();

        output.push_str(&format!("  public static func create{}(\n", def.name));
        output.push_str("    _ fbb: FlatBufferBuilder");
        for field in def.live_fields() {
            let ty = self
                .mapper
                .builder_arg_type(&field.ty)
                .map_err(|e| e.with_field(&field.name))?;
            let default = self
                .mapper
                .default_literal_basic(field)
                .map_err(|e| e.with_field(&field.name))?;
            output.push_str(&format!(
                ",\n    {}: {ty} = {default}",
                builder_arg_name(field)
            ));
        }
        output.push_str(&format!("\n  ) -> Offset<{}> {{\n", def.name));

        output.push_str(&format!("    {}.start{}(fbb)\n", def.name, def.name));
        for field in self.add_order(def)? {
            let arg = builder_arg_name(field);
            output.push_str(&format!(
                "    {}.add{}(fbb, {arg}: {arg})\n",
                def.name,
                to_camel_case(&field.name, true)
            ));
        }
        output.push_str(&format!("    return {}.end{}(fbb)\n", def.name, def.name));
        output.push_str("  }\n");

        Ok(output)
    }

    /// Live fields in add order: largest size class first when `sortbysize`
    /// is set, declaration order within each pass.
    fn add_order<'d>(&self, def: &'d StructDef) -> Result<Vec<&'d FieldDef>, CodegenError> {
        if !def.sortbysize {
            return Ok(def.live_fields().collect());
        }

        let mut order = Vec::new();
        let mut size = ScalarKind::LARGEST_SIZE;
        while size > 0 {
            for field in def.live_fields() {
                let base = self
                    .mapper
                    .base_size(&field.ty)
                    .map_err(|e| e.with_field(&field.name))?;
                if base == size {
                    order.push(field);
                }
            }
            size /= 2;
        }
        Ok(order)
    }

    fn generate_add(&self, index: usize, field: &FieldDef) -> Result<String, CodegenError> {
        let arg = builder_arg_name(field);
        let ty = self.mapper.builder_arg_type(&field.ty)?;

        let call = match &field.ty {
            FieldType::Scalar(_) | FieldType::Enum(_) => format!(
                "fbb.add(element: {arg}{}, def: {}, at: {index})",
                self.mapper.source_cast(&field.ty),
                self.mapper.default_literal_raw(field)
            ),
            FieldType::Struct(name) if self.mapper.struct_def(name)?.fixed => {
                format!("fbb.add(structOffset: {arg}, at: {index})")
            }
            _ => format!("fbb.add(offset: {arg}, at: {index})"),
        };

        Ok(format!(
            "  public static func add{}(_ fbb: FlatBufferBuilder, {arg}: {ty}) {{ {call} }}\n",
            to_camel_case(&field.name, true)
        ))
    }

    fn generate_vector_helpers(
        &self,
        field: &FieldDef,
        element: &FieldType,
    ) -> Result<String, CodegenError> {
        let mut output = String::new();
        let camel = to_camel_case(&field.name, true);
        let size = self.mapper.inline_size(element)?;
        let alignment = self.mapper.inline_alignment(element)?;

        if !self.mapper.is_fixed_struct(element)? {
            let item = match element {
                FieldType::Scalar(_) | FieldType::Enum(_) => format!(
                    "element: data[i]{}",
                    self.mapper.source_cast(element)
                ),
                FieldType::String | FieldType::Struct(_) => "offset: data[i]".to_string(),
                FieldType::Vector(_) | FieldType::Union(_) => {
                    return Err(CodegenError::generation(format!(
                        "unsupported vector element type {element:?}"
                    )));
                }
            };
            output.push_str(&format!(
                "  public static func create{camel}Vector(_ fbb: FlatBufferBuilder, data: [{}]) -> Offset<UOffset> {{ fbb.startVector(data.count, elementSize: {size}, alignment: {alignment}); for i in stride(from: data.count - 1, through: 0, by: -1) {{ fbb.add({item}) }}; return fbb.endVector(len: data.count) }}\n",
                self.mapper.builder_arg_type(element)?
            ));
        }

        output.push_str(&format!(
            "  public static func start{camel}Vector(_ fbb: FlatBufferBuilder, numElems: Int) {{ fbb.startVector(numElems, elementSize: {size}, alignment: {alignment}) }}\n"
        ));

        Ok(output)
    }

    fn generate_end(&self, def: &StructDef) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "  public static func end{}(_ fbb: FlatBufferBuilder) -> Offset<{}> {{\n",
            def.name, def.name
        ));
        output.push_str(&format!(
            "    let end = Offset<{}>(offset: fbb.endTable())\n",
            def.name
        ));
        for field in def.live_fields().filter(|f| f.required) {
            output.push_str(&format!(
                "    fbb.require(table: end, field: {})  // {}\n",
                field.offset, field.name
            ));
        }
        output.push_str("    return end\n");
        output.push_str("  }\n");

        output
    }
}

fn root_identifier(def: &StructDef) -> Option<&str> {
    if def.is_root {
        def.file_identifier.as_deref()
    } else {
        None
    }
}

/// Builder argument label: value fields keep their name, offset fields get
/// an `Offset` suffix.
fn builder_arg_name(field: &FieldDef) -> String {
    let name = to_camel_case(&field.name, false);
    if field.ty.is_scalar() {
        name
    } else {
        format!("{name}Offset")
    }
}

fn write_value(arg: &str, kind: ScalarKind, source_cast: &str) -> String {
    if kind == ScalarKind::Bool {
        format!("UInt8({arg} ? 1 : 0)")
    } else if source_cast.is_empty() {
        arg.to_string()
    } else {
        format!("{arg}{source_cast}")
    }
}

fn generate_union_accessor(field: &FieldDef) -> String {
    format!(
        "  public func {}<TTable: FlatBufferObject>(type: TTable.Type) -> TTable? {{ let o = _accessor.offset({}); return o == 0 ? nil : _accessor.union(o) }}\n",
        to_camel_case(&field.name, false),
        field.offset
    )
}
