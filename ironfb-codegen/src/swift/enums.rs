//! Enum and union tag code generation.

use crate::swift::types::{enum_case_name, swift_scalar};
use ironfb_schema::ir::EnumDef;

/// Average distance between enumerator values above which a dense name
/// table is considered too sparse to emit.
pub const MAX_SPARSENESS: i128 = 5;

/// Generator for enum definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumGenerator;

impl EnumGenerator {
    /// Creates a new enum generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates one enum definition.
    #[must_use]
    pub fn generate(&self, enum_def: &EnumDef) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "public enum {}: {} {{\n",
            enum_def.name,
            swift_scalar(enum_def.underlying)
        ));

        // Values are always explicit: they can be sparse or out of order.
        for val in &enum_def.values {
            output.push_str(&format!(
                "  case {} = {}\n",
                enum_case_name(&val.name),
                val.value
            ));
        }

        if let Some(names) = name_table(enum_def) {
            let min = enum_def.min_value().unwrap_or(0);
            let entries: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();

            output.push('\n');
            output.push_str(&format!(
                "  public static let names: [String] = [{}]\n\n",
                entries.join(", ")
            ));
            output.push_str(&format!(
                "  public static func name(_ e: Int) -> String {{ return names[{}] }}\n",
                index_expression(min)
            ));
        }

        output.push_str("}\n\n");
        output
    }
}

/// Returns true when the enum is dense enough for a name lookup table.
#[must_use]
pub fn has_name_table(enum_def: &EnumDef) -> bool {
    match (enum_def.min_value(), enum_def.max_value()) {
        (Some(min), Some(max)) => {
            let range = i128::from(max) - i128::from(min) + 1;
            let count = enum_def.values.len() as i128;
            range / count < MAX_SPARSENESS
        }
        _ => false,
    }
}

/// Builds the dense name table indexed by `value - min`, with empty names
/// for values in range that have no enumerator.
#[must_use]
pub fn name_table(enum_def: &EnumDef) -> Option<Vec<String>> {
    if !has_name_table(enum_def) {
        return None;
    }
    let min = enum_def.min_value()?;
    let max = enum_def.max_value()?;

    let len = usize::try_from(i128::from(max) - i128::from(min) + 1).ok()?;
    let mut names = vec![String::new(); len];
    for val in &enum_def.values {
        let index = usize::try_from(i128::from(val.value) - i128::from(min)).ok()?;
        names[index] = enum_case_name(&val.name);
    }
    Some(names)
}

fn index_expression(min: i64) -> String {
    match min {
        0 => "e".to_string(),
        m if m < 0 => format!("e + {}", i128::from(m).abs()),
        m => format!("e - {m}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfb_schema::types::ScalarKind;

    fn enum_with(values: &[i64]) -> EnumDef {
        let mut enum_def = EnumDef::new("Level", ScalarKind::Int32);
        for (i, value) in values.iter().enumerate() {
            enum_def.add_value(format!("L{i}"), *value);
        }
        enum_def
    }

    #[test]
    fn test_generate_enum_cases_with_explicit_values() {
        let mut color = EnumDef::new("Color", ScalarKind::Int8);
        color.add_value("Red", 1);
        color.add_value("Green", 2);
        color.add_value("Blue", 8);

        let output = EnumGenerator::new().generate(&color);

        assert!(output.starts_with("public enum Color: Int8 {\n"));
        assert!(output.contains("  case red = 1\n"));
        assert!(output.contains("  case green = 2\n"));
        assert!(output.contains("  case blue = 8\n"));
        assert!(output.ends_with("}\n\n"));
    }

    #[test]
    fn test_dense_enum_has_name_table() {
        let enum_def = enum_with(&[0, 1, 2, 3, 4]);
        assert!(has_name_table(&enum_def));

        let output = EnumGenerator::new().generate(&enum_def);
        assert!(output.contains(r#"public static let names: [String] = ["l0", "l1", "l2", "l3", "l4"]"#));
        assert!(output.contains("return names[e] }"));
    }

    #[test]
    fn test_sparse_enum_omits_name_table() {
        let enum_def = enum_with(&[0, 100]);
        assert!(!has_name_table(&enum_def));

        let output = EnumGenerator::new().generate(&enum_def);
        assert!(!output.contains("names"));
        assert!(output.contains("  case l1 = 100\n"));
    }

    #[test]
    fn test_sparseness_threshold_is_strict() {
        // range 10 over 2 values: density exactly 5
        assert!(!has_name_table(&enum_with(&[0, 9])));
        // range 9 over 2 values: density 4
        assert!(has_name_table(&enum_with(&[0, 8])));
    }

    #[test]
    fn test_name_table_fills_gaps_positionally() {
        let mut color = EnumDef::new("Color", ScalarKind::UInt8);
        color.add_value("Red", 1);
        color.add_value("Green", 2);
        color.add_value("Blue", 5);

        let names = name_table(&color).expect("dense");
        assert_eq!(names, ["red", "green", "", "", "blue"]);

        let output = EnumGenerator::new().generate(&color);
        assert!(output.contains("return names[e - 1] }"));
    }

    #[test]
    fn test_name_table_out_of_order_values() {
        let enum_def = enum_with(&[2, 0, 1]);
        let names = name_table(&enum_def).expect("dense");
        assert_eq!(names, ["l1", "l2", "l0"]);
    }

    #[test]
    fn test_negative_minimum_index() {
        let enum_def = enum_with(&[-2, -1, 0]);
        let output = EnumGenerator::new().generate(&enum_def);
        assert!(output.contains("return names[e + 2] }"));
    }

    #[test]
    fn test_none_enumerator_renamed() {
        let mut any = EnumDef::new("Any", ScalarKind::UInt8);
        any.is_union = true;
        any.add_value("NONE", 0);
        any.add_value("Monster", 1);

        let output = EnumGenerator::new().generate(&any);
        assert!(output.contains("  case none = 0\n"));
        assert!(output.contains(r#"["none", "monster"]"#));
    }

    #[test]
    fn test_empty_enum() {
        let output = EnumGenerator::new().generate(&EnumDef::new("Empty", ScalarKind::UInt8));
        assert_eq!(output, "public enum Empty: UInt8 {\n}\n\n");
    }
}
