use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use lib_runtime::Properties;
use serde::{Deserialize, Serialize};

use super::error::TransformError;

/// A raw CSV row keyed by header name.
pub type Row = BTreeMap<String, String>;

pub const ENTITY_ORDER_ROW: &str = "OrderRow";
pub const ENTITY_PRODUCT_ROW: &str = "ProductRow";
pub const ENTITY_ORDER: &str = "Order";
pub const ENTITY_PRODUCT: &str = "Product";

/// Column order of the loaded order file.
pub const ORDER_COLUMNS: [&str; 6] = ["OrderID", "OrderDate", "ProductId", "ProductName", "Quantity", "Unit"];
pub const ORDER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const TYPE_ADD: &str = "add";
pub const TYPE_END_OF_STREAM: &str = "end_of_stream";

/// Message properties for a `type`, plus an `entity` when there is one.
pub fn properties(msg_type: &str, entity: Option<&str>) -> Properties {
    let mut properties = Properties::new();
    properties.insert("type".to_string(), msg_type.to_string());
    if let Some(entity) = entity {
        properties.insert("entity".to_string(), entity.to_string());
    }
    properties
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightUnit {
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "lbs")]
    Pounds,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kg",
            WeightUnit::Pounds => "lbs",
            WeightUnit::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightUnit {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" => Ok(WeightUnit::Kilograms),
            "lbs" => Ok(WeightUnit::Pounds),
            "unknown" => Ok(WeightUnit::Unknown),
            _ => Err(TransformError::InvalidWeightUnit(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "OrderID")]
    pub order_id: i64,
    #[serde(rename = "OrderDate")]
    pub order_date: Option<NaiveDateTime>,
    #[serde(rename = "ProductId")]
    pub product_id: String,
    #[serde(rename = "ProductName")]
    pub product_name: String,
    #[serde(rename = "Quantity")]
    pub quantity: f64,
    #[serde(rename = "Unit")]
    pub unit: WeightUnit,
}

/// A value produced by a transformation rule, before it lands in a column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDateTime),
    Unit(WeightUnit),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "str",
            FieldValue::Date(_) => "date",
            FieldValue::Unit(_) => "weight unit",
        }
    }
}

impl Order {
    /// Sets the column named `column` (its serialized name, e.g. `OrderID`).
    pub fn set(&mut self, column: &str, value: FieldValue) -> Result<(), TransformError> {
        match (column, value) {
            ("OrderID", FieldValue::Int(v)) => self.order_id = v,
            ("OrderDate", FieldValue::Date(v)) => self.order_date = Some(v),
            ("ProductId", FieldValue::Str(v)) => self.product_id = v,
            ("ProductName", FieldValue::Str(v)) => self.product_name = v,
            ("Quantity", FieldValue::Float(v)) => self.quantity = v,
            ("Quantity", FieldValue::Int(v)) => self.quantity = v as f64,
            ("Unit", FieldValue::Unit(v)) => self.unit = v,
            ("OrderID" | "OrderDate" | "ProductId" | "ProductName" | "Quantity" | "Unit", v) => {
                return Err(TransformError::FieldType {
                    column: column.to_string(),
                    found: v.kind(),
                });
            }
            _ => return Err(TransformError::UnknownColumn(column.to_string())),
        }
        Ok(())
    }

    pub fn csv_header() -> String {
        ORDER_COLUMNS.join(",")
    }

    /// One CSV line in `ORDER_COLUMNS` order, without the line break.
    pub fn to_csv_record(&self) -> String {
        let date = self
            .order_date
            .map(|d| d.format(ORDER_DATE_FORMAT).to_string())
            .unwrap_or_default();
        let fields = [
            self.order_id.to_string(),
            date,
            self.product_id.clone(),
            self.product_name.clone(),
            self.quantity.to_string(),
            self.unit.to_string(),
        ];
        fields.iter().map(|f| quote_field(f)).collect::<Vec<_>>().join(",")
    }
}

fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weight_unit_parses_case_insensitively() {
        assert_eq!("KG".parse::<WeightUnit>().unwrap(), WeightUnit::Kilograms);
        assert_eq!(" lbs ".parse::<WeightUnit>().unwrap(), WeightUnit::Pounds);
        assert!(matches!("stone".parse::<WeightUnit>(), Err(TransformError::InvalidWeightUnit(_))));
    }

    #[test]
    fn order_serializes_with_column_names() {
        let order = Order {
            order_id: 7,
            order_date: NaiveDate::from_ymd_opt(2021, 5, 4).and_then(|d| d.and_hms_opt(0, 0, 0)),
            product_id: "P-10001".to_string(),
            product_name: "ThisIsIt".to_string(),
            quantity: 5234.05,
            unit: WeightUnit::Kilograms,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["OrderID"], 7);
        assert_eq!(json["OrderDate"], "2021-05-04T00:00:00");
        assert_eq!(json["Unit"], "kg");
        assert_eq!(serde_json::from_value::<Order>(json).unwrap(), order);
    }

    #[test]
    fn csv_record_follows_the_column_order() {
        let order = Order {
            order_id: 100,
            order_date: NaiveDate::from_ymd_opt(2019, 11, 3).and_then(|d| d.and_hms_opt(0, 0, 0)),
            product_id: "P-12345".to_string(),
            product_name: "Bolts, \"M8\"".to_string(),
            quantity: 5234.05,
            unit: WeightUnit::Pounds,
        };
        assert_eq!(Order::csv_header(), "OrderID,OrderDate,ProductId,ProductName,Quantity,Unit");
        assert_eq!(
            order.to_csv_record(),
            r#"100,2019-11-03 00:00:00,P-12345,"Bolts, ""M8""",5234.05,lbs"#
        );
        assert_eq!(Order::default().to_csv_record(), "0,,,,0,unknown");
    }

    #[test]
    fn set_checks_column_and_type() {
        let mut order = Order::default();
        order.set("OrderID", FieldValue::Int(3)).unwrap();
        order.set("Quantity", FieldValue::Int(2)).unwrap();
        assert_eq!((order.order_id, order.quantity), (3, 2.0));

        assert!(matches!(
            order.set("OrderID", FieldValue::Str("x".into())),
            Err(TransformError::FieldType { found: "str", .. })
        ));
        assert!(matches!(order.set("Color", FieldValue::Int(1)), Err(TransformError::UnknownColumn(_))));
    }
}
