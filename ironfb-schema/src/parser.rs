//! Resolved IR document loader.
//!
//! The schema compiler can hand its resolved output to the generators as a
//! small XML document. Every number in it (offsets, sizes, padding) has
//! already been computed; this module only reads them back into a
//! [`SchemaIr`].

use crate::error::ParseError;
use crate::ir::{EnumDef, FieldDef, FieldType, SchemaIr, StructDef};
use crate::types::ScalarKind;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Field as read from the document, before type names are resolved.
struct PendingField {
    field: FieldDef,
    type_name: String,
}

/// Record as read from the document, before type names are resolved.
struct PendingStruct {
    def: StructDef,
    fields: Vec<PendingField>,
}

/// Parses a resolved IR document from a string.
///
/// # Arguments
/// * `xml` - IR document content
///
/// # Returns
/// The resolved schema IR.
///
/// # Errors
/// Returns `ParseError` if the XML is malformed, an attribute is missing or
/// invalid, a type reference cannot be resolved, or a name is declared twice.
pub fn parse_ir(xml: &str) -> Result<SchemaIr, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ir: Option<SchemaIr> = None;
    let mut root_name: Option<String> = None;
    let mut file_identifier: Option<String> = None;
    let mut pending: Vec<PendingStruct> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                match name.as_str() {
                    "schema" => {
                        let (schema, root, ident) = parse_schema_element(e)?;
                        ir = Some(schema);
                        root_name = root;
                        file_identifier = ident;
                    }
                    "enum" | "union" => {
                        let schema = require_schema(&mut ir, &name)?;
                        let mut enum_def = parse_enum_header(e, name == "union", schema)?;
                        parse_enum_values(&mut reader, &mut enum_def)?;
                        push_enum(schema, &pending, enum_def)?;
                    }
                    "struct" | "table" => {
                        let schema = require_schema(&mut ir, &name)?;
                        let mut record = parse_struct_header(e, name == "struct", schema)?;
                        parse_struct_fields(&mut reader, &mut record)?;
                        push_struct(schema, &mut pending, record)?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = element_name(e)?;
                match name.as_str() {
                    "schema" => {
                        let (schema, root, ident) = parse_schema_element(e)?;
                        ir = Some(schema);
                        root_name = root;
                        file_identifier = ident;
                    }
                    "enum" | "union" => {
                        let schema = require_schema(&mut ir, &name)?;
                        let enum_def = parse_enum_header(e, name == "union", schema)?;
                        push_enum(schema, &pending, enum_def)?;
                    }
                    "struct" | "table" => {
                        let schema = require_schema(&mut ir, &name)?;
                        let record = parse_struct_header(e, name == "struct", schema)?;
                        push_struct(schema, &mut pending, record)?;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let mut ir = ir.ok_or_else(|| ParseError::structure("No schema element found"))?;
    resolve_structs(&mut ir, pending)?;

    if let Some(root) = root_name {
        let root_def = ir
            .structs
            .iter_mut()
            .find(|s| s.name == root)
            .ok_or_else(|| ParseError::invalid_attr("schema", "root", &root))?;
        if root_def.fixed {
            return Err(ParseError::invalid_attr("schema", "root", &root));
        }
        root_def.is_root = true;
        root_def.file_identifier = file_identifier;
    }

    tracing::debug!(
        file = %ir.file_name,
        enums = ir.enums.len(),
        structs = ir.structs.len(),
        "loaded schema IR"
    );

    Ok(ir)
}

/// Parses a resolved IR document from a file.
///
/// # Errors
/// Returns `ParseError` if the file cannot be read or its content is invalid.
pub fn parse_ir_file(path: &std::path::Path) -> Result<SchemaIr, ParseError> {
    let xml = std::fs::read_to_string(path)?;
    parse_ir(&xml)
}

fn element_name(e: &BytesStart<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

fn require_schema<'a>(
    ir: &'a mut Option<SchemaIr>,
    element: &str,
) -> Result<&'a mut SchemaIr, ParseError> {
    ir.as_mut().ok_or_else(|| {
        ParseError::structure(format!("<{element}> found outside of <schema>"))
    })
}

/// Parses the schema element attributes.
fn parse_schema_element(
    e: &BytesStart<'_>,
) -> Result<(SchemaIr, Option<String>, Option<String>), ParseError> {
    let mut ir = SchemaIr::default();
    let mut root = None;
    let mut file_identifier = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "file" => ir.file_name = value.to_string(),
            "namespace" => ir.namespace = split_namespace(value),
            "root" => root = Some(value.to_string()),
            "fileIdentifier" => {
                if value.len() != 4 {
                    return Err(ParseError::invalid_attr("schema", "fileIdentifier", value));
                }
                file_identifier = Some(value.to_string());
            }
            _ => {}
        }
    }

    if ir.file_name.is_empty() {
        return Err(ParseError::missing_attr("schema", "file"));
    }

    Ok((ir, root, file_identifier))
}

/// Parses an enum or union header.
fn parse_enum_header(
    e: &BytesStart<'_>,
    is_union: bool,
    schema: &SchemaIr,
) -> Result<EnumDef, ParseError> {
    let element = if is_union { "union" } else { "enum" };
    let mut name = None;
    let mut underlying = None;
    let mut namespace = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "type" => {
                let kind = ScalarKind::from_schema_name(value)
                    .filter(ScalarKind::is_integer)
                    .ok_or_else(|| ParseError::invalid_attr(element, "type", value))?;
                underlying = Some(kind);
            }
            "namespace" => namespace = Some(split_namespace(value)),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr(element, "name"))?;
    let mut enum_def = EnumDef::new(name, underlying.unwrap_or(ScalarKind::UInt8));
    enum_def.is_union = is_union;
    enum_def.namespace = namespace.unwrap_or_else(|| schema.namespace.clone());
    Ok(enum_def)
}

/// Parses the enumerators of an enum until its end tag.
fn parse_enum_values(
    reader: &mut Reader<&[u8]>,
    enum_def: &mut EnumDef,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if element_name(e)? == "value" {
                    let mut name = None;
                    let mut value = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        let key = std::str::from_utf8(attr.key.as_ref())?;
                        let raw = std::str::from_utf8(&attr.value)?;
                        match key {
                            "name" => name = Some(raw.to_string()),
                            "value" => {
                                value = Some(raw.parse::<i64>().map_err(|_| {
                                    ParseError::invalid_attr("value", "value", raw)
                                })?)
                            }
                            _ => {}
                        }
                    }
                    let name = name.ok_or_else(|| ParseError::missing_attr("value", "name"))?;
                    let value = value.ok_or_else(|| ParseError::missing_attr("value", "value"))?;
                    if enum_def.values.iter().any(|v| v.name == name) {
                        return Err(ParseError::duplicate("enumerator", name));
                    }
                    enum_def.add_value(name, value);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                if name == "enum" || name == "union" {
                    break;
                }
            }
            Ok(Event::Eof) => {
                return Err(ParseError::structure(format!(
                    "unterminated enum '{}'",
                    enum_def.name
                )));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses a struct or table header.
fn parse_struct_header(
    e: &BytesStart<'_>,
    fixed: bool,
    schema: &SchemaIr,
) -> Result<PendingStruct, ParseError> {
    let element = if fixed { "struct" } else { "table" };
    let mut name = None;
    let mut bytesize = None;
    let mut minalign = None;
    let mut sortbysize = !fixed;
    let mut namespace = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "bytesize" => bytesize = Some(parse_usize(element, key, value)?),
            "minalign" => minalign = Some(parse_usize(element, key, value)?),
            "sortbysize" => sortbysize = parse_bool(element, key, value)?,
            "namespace" => namespace = Some(split_namespace(value)),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ParseError::missing_attr(element, "name"))?;
    let mut def = if fixed {
        let bytesize = bytesize.ok_or_else(|| ParseError::missing_attr(element, "bytesize"))?;
        let minalign = minalign.ok_or_else(|| ParseError::missing_attr(element, "minalign"))?;
        StructDef::fixed(name, bytesize, minalign)
    } else {
        StructDef::table(name)
    };
    def.sortbysize = sortbysize;
    def.namespace = namespace.unwrap_or_else(|| schema.namespace.clone());

    Ok(PendingStruct {
        def,
        fields: Vec::new(),
    })
}

/// Parses the fields of a struct or table until its end tag.
fn parse_struct_fields(
    reader: &mut Reader<&[u8]>,
    record: &mut PendingStruct,
) -> Result<(), ParseError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if element_name(e)? == "field" {
                    record.fields.push(parse_field(e)?);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                if name == "struct" || name == "table" {
                    break;
                }
            }
            Ok(Event::Eof) => {
                return Err(ParseError::structure(format!(
                    "unterminated record '{}'",
                    record.def.name
                )));
            }
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parses a field element.
fn parse_field(e: &BytesStart<'_>) -> Result<PendingField, ParseError> {
    let mut name = None;
    let mut type_name = None;
    let mut offset = None;
    let mut field = FieldDef::new("", FieldType::String, 0);

    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = std::str::from_utf8(&attr.value)?;

        match key {
            "name" => name = Some(value.to_string()),
            "type" => type_name = Some(value.to_string()),
            "offset" => offset = Some(parse_usize("field", key, value)?),
            "default" => field.default = value.to_string(),
            "padding" => field.padding = parse_usize("field", key, value)?,
            "required" => field.required = parse_bool("field", key, value)?,
            "deprecated" => field.deprecated = parse_bool("field", key, value)?,
            "key" => field.key = parse_bool("field", key, value)?,
            "nested_flatbuffer" => field.nested_flatbuffer = Some(value.to_string()),
            _ => {}
        }
    }

    field.name = name.ok_or_else(|| ParseError::missing_attr("field", "name"))?;
    field.offset = offset.ok_or_else(|| ParseError::missing_attr("field", "offset"))?;
    let type_name = type_name.ok_or_else(|| ParseError::missing_attr("field", "type"))?;

    Ok(PendingField { field, type_name })
}

fn push_enum(
    schema: &mut SchemaIr,
    pending: &[PendingStruct],
    enum_def: EnumDef,
) -> Result<(), ParseError> {
    let taken = schema.enum_def(&enum_def.name).is_some()
        || pending.iter().any(|p| p.def.name == enum_def.name);
    if taken {
        let kind = if enum_def.is_union { "union" } else { "enum" };
        return Err(ParseError::duplicate(kind, enum_def.name));
    }
    schema.enums.push(enum_def);
    Ok(())
}

fn push_struct(
    schema: &SchemaIr,
    pending: &mut Vec<PendingStruct>,
    record: PendingStruct,
) -> Result<(), ParseError> {
    let taken = schema.enum_def(&record.def.name).is_some()
        || pending.iter().any(|p| p.def.name == record.def.name);
    if taken {
        let kind = if record.def.fixed { "struct" } else { "table" };
        return Err(ParseError::duplicate(kind, record.def.name));
    }
    pending.push(record);
    Ok(())
}

/// Resolves field type names once every declaration is known.
fn resolve_structs(ir: &mut SchemaIr, pending: Vec<PendingStruct>) -> Result<(), ParseError> {
    let struct_names: Vec<String> = pending.iter().map(|p| p.def.name.clone()).collect();

    for record in pending {
        let mut def = record.def;
        for PendingField { mut field, type_name } in record.fields {
            field.ty = resolve_type(&type_name, &field.name, ir, &struct_names)?;
            def.add_field(field);
        }
        def.has_key = def.fields.iter().any(|f| f.key);
        ir.structs.push(def);
    }

    Ok(())
}

fn resolve_type(
    type_name: &str,
    field: &str,
    ir: &SchemaIr,
    struct_names: &[String],
) -> Result<FieldType, ParseError> {
    if let Some(inner) = type_name
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        let element = resolve_type(inner, field, ir, struct_names)?;
        return Ok(FieldType::Vector(Box::new(element)));
    }

    if type_name == "string" {
        return Ok(FieldType::String);
    }
    if let Some(kind) = ScalarKind::from_schema_name(type_name) {
        return Ok(FieldType::Scalar(kind));
    }
    if let Some(enum_def) = ir.enum_def(type_name) {
        return Ok(if enum_def.is_union {
            FieldType::Union(enum_def.name.clone())
        } else {
            FieldType::Enum(enum_def.name.clone())
        });
    }
    if struct_names.iter().any(|n| n == type_name) {
        return Ok(FieldType::Struct(type_name.to_string()));
    }

    Err(ParseError::UnknownType {
        type_name: type_name.to_string(),
        field: field.to_string(),
    })
}

fn split_namespace(value: &str) -> Vec<String> {
    value
        .split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_usize(element: &str, attribute: &str, value: &str) -> Result<usize, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::invalid_attr(element, attribute, value))
}

fn parse_bool(element: &str, attribute: &str, value: &str) -> Result<bool, ParseError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ParseError::invalid_attr(element, attribute, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONSTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema file="monster" namespace="MyGame.Sample" root="Monster" fileIdentifier="MONS">
    <enum name="Color" type="byte">
        <value name="Red" value="0"/>
        <value name="Green" value="1"/>
        <value name="Blue" value="2"/>
    </enum>
    <union name="Equipment" type="ubyte">
        <value name="NONE" value="0"/>
        <value name="Weapon" value="1"/>
    </union>
    <struct name="Vec3" bytesize="12" minalign="4">
        <field name="x" type="float" offset="0"/>
        <field name="y" type="float" offset="4"/>
        <field name="z" type="float" offset="8"/>
    </struct>
    <table name="Monster">
        <field name="pos" type="Vec3" offset="4"/>
        <field name="hp" type="short" offset="8" default="100"/>
        <field name="name" type="string" offset="10" required="true" key="true"/>
        <field name="friendly" type="bool" offset="12" deprecated="true"/>
        <field name="inventory" type="[ubyte]" offset="14"/>
        <field name="color" type="Color" offset="16" default="2"/>
        <field name="weapons" type="[Weapon]" offset="18"/>
        <field name="equipped_type" type="ubyte" offset="20"/>
        <field name="equipped" type="Equipment" offset="22"/>
    </table>
    <table name="Weapon" sortbysize="false">
        <field name="damage" type="short" offset="4"/>
    </table>
</schema>"#;

    #[test]
    fn test_parse_monster_ir() {
        let ir = parse_ir(MONSTER).expect("Failed to parse");

        assert_eq!(ir.file_name, "monster");
        assert_eq!(ir.namespace, vec!["MyGame", "Sample"]);
        assert_eq!(ir.enums.len(), 2);
        assert_eq!(ir.structs.len(), 3);
        assert_eq!(ir.structs[0].name, "Vec3");
        assert_eq!(ir.structs[1].name, "Monster");
    }

    #[test]
    fn test_parse_enum_values_in_order() {
        let ir = parse_ir(MONSTER).expect("Failed to parse");
        let color = ir.enum_def("Color").expect("Color");

        assert_eq!(color.underlying, ScalarKind::Int8);
        assert!(!color.is_union);
        let names: Vec<&str> = color.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Red", "Green", "Blue"]);
        assert!(ir.enum_def("Equipment").is_some_and(|e| e.is_union));
    }

    #[test]
    fn test_parse_fixed_struct() {
        let ir = parse_ir(MONSTER).expect("Failed to parse");
        let vec3 = ir.struct_def("Vec3").expect("Vec3");

        assert!(vec3.fixed);
        assert_eq!(vec3.bytesize, 12);
        assert_eq!(vec3.minalign, 4);
        assert!(!vec3.sortbysize);
        assert_eq!(vec3.fields[2].offset, 8);
    }

    #[test]
    fn test_parse_table_fields_resolved() {
        let ir = parse_ir(MONSTER).expect("Failed to parse");
        let monster = ir.struct_def("Monster").expect("Monster");

        assert!(!monster.fixed);
        assert!(monster.is_root);
        assert!(monster.has_key);
        assert!(monster.sortbysize);
        assert_eq!(monster.file_identifier.as_deref(), Some("MONS"));

        assert_eq!(monster.fields[0].ty, FieldType::Struct("Vec3".into()));
        assert_eq!(monster.fields[1].default, "100");
        assert!(monster.fields[2].required && monster.fields[2].key);
        assert!(monster.fields[3].deprecated);
        assert_eq!(
            monster.fields[4].ty,
            FieldType::Vector(Box::new(FieldType::Scalar(ScalarKind::UInt8)))
        );
        assert_eq!(monster.fields[5].ty, FieldType::Enum("Color".into()));
        // Forward reference to a table declared later.
        assert_eq!(
            monster.fields[6].ty,
            FieldType::Vector(Box::new(FieldType::Struct("Weapon".into())))
        );
        assert_eq!(monster.fields[8].ty, FieldType::Union("Equipment".into()));
    }

    #[test]
    fn test_parse_unknown_type() {
        let xml = r#"<schema file="t">
    <table name="T"><field name="a" type="Missing" offset="4"/></table>
</schema>"#;
        let err = parse_ir(xml).unwrap_err();
        assert!(matches!(err, ParseError::UnknownType { ref type_name, .. } if type_name == "Missing"));
    }

    #[test]
    fn test_parse_duplicate_definition() {
        let xml = r#"<schema file="t">
    <enum name="A" type="byte"><value name="X" value="0"/></enum>
    <table name="A"/>
</schema>"#;
        assert!(matches!(
            parse_ir(xml),
            Err(ParseError::DuplicateDefinition { .. })
        ));
    }

    #[test]
    fn test_parse_missing_offset() {
        let xml = r#"<schema file="t">
    <table name="T"><field name="a" type="int"/></table>
</schema>"#;
        assert!(matches!(
            parse_ir(xml),
            Err(ParseError::MissingAttribute { ref attribute, .. }) if attribute == "offset"
        ));
    }

    #[test]
    fn test_parse_fixed_root_rejected() {
        let xml = r#"<schema file="t" root="V">
    <struct name="V" bytesize="4" minalign="4"><field name="a" type="int" offset="0"/></struct>
</schema>"#;
        assert!(matches!(
            parse_ir(xml),
            Err(ParseError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_parse_no_schema() {
        assert!(matches!(
            parse_ir("<other/>"),
            Err(ParseError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn test_parse_ir_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("monster.xml");
        std::fs::write(&path, MONSTER).expect("write");

        let ir = parse_ir_file(&path).expect("Failed to parse");
        assert_eq!(ir.structs.len(), 3);
    }

    #[test]
    fn test_parse_ir_file_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = parse_ir_file(&dir.path().join("absent.xml")).unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
