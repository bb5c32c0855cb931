//! Column rules turning an `OrderRow` into an `Order`.
//!
//! The transformations file is a JSON list of single-key objects, applied in
//! order:
//!
//! ```json
//! [
//!   {"rename": {"source_column": "Order Number", "target_column": "OrderID", "data_type": "int"}},
//!   {"concatenate_date": {"year_column": "Year", "month_column": "Month", "day_column": "Day", "target_column": "OrderDate"}},
//!   {"proper_case": {"source_column": "Product Name", "target_column": "ProductName"}},
//!   {"transform": {"source_column": "Count", "target_column": "Quantity", "func": "convert_to_float_with_two_decimals"}},
//!   {"add_weight_value": {"target_column": "Unit", "value": "kg"}}
//! ]
//! ```

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::TransformError;
use super::model::{FieldValue, Order, Row, WeightUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Str,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFunc {
    ConvertToFloatWithTwoDecimals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Rename {
        source_column: String,
        target_column: String,
        data_type: DataType,
    },
    Transform {
        source_column: String,
        target_column: String,
        func: TransformFunc,
    },
    ConcatenateDate {
        year_column: String,
        month_column: String,
        day_column: String,
        target_column: String,
    },
    ProperCase {
        source_column: String,
        target_column: String,
    },
    AddWeightValue {
        target_column: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rules {
    rules: Vec<Rule>,
}

impl Rules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn load(path: &Path) -> Result<Self, TransformError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, row: &Row) -> Result<Order, TransformError> {
        let mut order = Order::default();
        for rule in &self.rules {
            let (target, value) = evaluate(rule, row)?;
            order.set(target, value)?;
        }
        Ok(order)
    }
}

impl Default for Rules {
    /// Rules for the files produced by the order generator.
    fn default() -> Self {
        let text = |s: &str| s.to_string();
        Self::new(vec![
            Rule::Rename {
                source_column: text("Order Number"),
                target_column: text("OrderID"),
                data_type: DataType::Int,
            },
            Rule::ConcatenateDate {
                year_column: text("Year"),
                month_column: text("Month"),
                day_column: text("Day"),
                target_column: text("OrderDate"),
            },
            Rule::Rename {
                source_column: text("Product Number"),
                target_column: text("ProductId"),
                data_type: DataType::Str,
            },
            Rule::ProperCase {
                source_column: text("Product Name"),
                target_column: text("ProductName"),
            },
            Rule::Transform {
                source_column: text("Count"),
                target_column: text("Quantity"),
                func: TransformFunc::ConvertToFloatWithTwoDecimals,
            },
            Rule::AddWeightValue {
                target_column: text("Unit"),
                value: text("kg"),
            },
        ])
    }
}

fn evaluate<'r>(rule: &'r Rule, row: &Row) -> Result<(&'r str, FieldValue), TransformError> {
    let value = match rule {
        Rule::Rename {
            source_column,
            target_column,
            data_type,
        } => {
            let raw = column(row, source_column)?;
            let value = match data_type {
                DataType::Int => FieldValue::Int(parse_int(source_column, raw)?),
                DataType::Float => FieldValue::Float(parse_float(source_column, raw)?),
                DataType::Str => FieldValue::Str(raw.to_string()),
            };
            (target_column.as_str(), value)
        }
        Rule::Transform {
            source_column,
            target_column,
            func: TransformFunc::ConvertToFloatWithTwoDecimals,
        } => {
            let raw = column(row, source_column)?;
            let value = convert_to_float_with_two_decimals(source_column, raw)?;
            (target_column.as_str(), FieldValue::Float(value))
        }
        Rule::ConcatenateDate {
            year_column,
            month_column,
            day_column,
            target_column,
        } => {
            let date = parse_date(
                column(row, year_column)?,
                column(row, month_column)?,
                column(row, day_column)?,
            )?;
            (target_column.as_str(), FieldValue::Date(date))
        }
        Rule::ProperCase {
            source_column,
            target_column,
        } => {
            let raw = column(row, source_column)?;
            (target_column.as_str(), FieldValue::Str(proper_case(raw)))
        }
        Rule::AddWeightValue {
            target_column,
            value,
        } => (target_column.as_str(), FieldValue::Unit(value.parse::<WeightUnit>()?)),
    };
    Ok(value)
}

fn column<'a>(row: &'a Row, name: &str) -> Result<&'a str, TransformError> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
}

pub fn parse_int(column: &str, value: &str) -> Result<i64, TransformError> {
    value.trim().parse().map_err(|_| TransformError::InvalidNumber {
        column: column.to_string(),
        value: value.to_string(),
    })
}

pub fn parse_float(column: &str, value: &str) -> Result<f64, TransformError> {
    value.trim().parse().map_err(|_| TransformError::InvalidNumber {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Midnight on the given day.
pub fn parse_date(year: &str, month: &str, day: &str) -> Result<NaiveDateTime, TransformError> {
    let invalid = || TransformError::InvalidDate(format!("{}/{}/{}", year, month, day));
    let year: i32 = year.trim().parse().map_err(|_| invalid())?;
    let month: u32 = month.trim().parse().map_err(|_| invalid())?;
    let day: u32 = day.trim().parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)
}

/// Upper-cases the first letter of every space-separated word and joins the
/// words without separator: `"this is it"` becomes `"ThisIsIt"`.
pub fn proper_case(value: &str) -> String {
    value
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn non_numeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9.]").expect("numeric filter is a valid regex"))
}

/// Strips everything but digits and dots (`"5,234.05"` reads as `5234.05`)
/// and rounds to two decimals.
pub fn convert_to_float_with_two_decimals(column: &str, value: &str) -> Result<f64, TransformError> {
    let numeric = non_numeric().replace_all(value, "");
    let parsed = parse_float(column, &numeric)?;
    Ok((parsed * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn generated_row() -> Row {
        row(&[
            ("Order Number", "4213"),
            ("Year", "2019"),
            ("Month", "11"),
            ("Day", "3"),
            ("Product Number", "P-12345"),
            ("Product Name", "this is the product name abcdefgh ijklmnop"),
            ("Count", "5,234.051"),
            ("Extra Col1", "qwertyui"),
            ("Empty Column", ""),
        ])
    }

    #[test]
    fn strips_grouping_and_rounds() {
        assert_eq!(convert_to_float_with_two_decimals("Count", "5,234.05").unwrap(), 5234.05);
        assert_eq!(convert_to_float_with_two_decimals("Count", "1,000.456").unwrap(), 1000.46);
        assert!(convert_to_float_with_two_decimals("Count", "n/a").is_err());
    }

    #[test]
    fn proper_case_joins_capitalized_words() {
        assert_eq!(proper_case("this is  the product"), "ThisIsTheProduct");
        assert_eq!(proper_case("élan vital"), "ÉlanVital");
        assert_eq!(proper_case(""), "");
    }

    #[test]
    fn dates_are_validated() {
        let date = parse_date("2020", "02", "29").unwrap();
        assert_eq!(date.to_string(), "2020-02-29 00:00:00");
        assert!(matches!(parse_date("2021", "02", "29"), Err(TransformError::InvalidDate(_))));
        assert!(matches!(parse_date("year", "1", "1"), Err(TransformError::InvalidDate(_))));
    }

    #[test]
    fn default_rules_build_an_order() {
        let order = Rules::default().apply(&generated_row()).unwrap();
        assert_eq!(order.order_id, 4213);
        assert_eq!(order.order_date.unwrap().to_string(), "2019-11-03 00:00:00");
        assert_eq!(order.product_id, "P-12345");
        assert_eq!(order.product_name, "ThisIsTheProductNameAbcdefghIjklmnop");
        assert_eq!(order.quantity, 5234.05);
        assert_eq!(order.unit, WeightUnit::Kilograms);
    }

    #[test]
    fn missing_or_bad_columns_fail_the_row() {
        let mut incomplete = generated_row();
        incomplete.remove("Day");
        assert!(matches!(Rules::default().apply(&incomplete), Err(TransformError::MissingColumn(c)) if c == "Day"));

        let mut bad = generated_row();
        bad.insert("Order Number".to_string(), "12a".to_string());
        assert!(matches!(Rules::default().apply(&bad), Err(TransformError::InvalidNumber { .. })));
    }

    #[test]
    fn rules_load_from_json() {
        let json = r#"[
            {"rename": {"source_column": "Order Number", "target_column": "OrderID", "data_type": "int"}},
            {"add_weight_value": {"target_column": "Unit", "value": "LBS"}}
        ]"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, json.as_bytes()).unwrap();

        let rules = Rules::load(file.path()).unwrap();
        assert_eq!(rules.len(), 2);

        let order = rules.apply(&generated_row()).unwrap();
        assert_eq!(order.order_id, 4213);
        assert_eq!(order.unit, WeightUnit::Pounds);
        assert_eq!(order.product_name, "");
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let err = serde_json::from_str::<Rules>(r#"[{"explode": {}}]"#).unwrap_err();
        assert!(err.to_string().contains("explode"));
    }
}
