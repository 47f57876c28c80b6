//! Wire types for the Sheets `values.get` endpoint and the header-keyed row records
//! the pipeline works with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A single cell of a row record: text, number, or empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(Number),
    Text(String),
}

impl CellValue {
    fn from_raw(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Number(n) => CellValue::Number(n),
            Value::String(s) => CellValue::Text(s),
            Value::Bool(b) => CellValue::Text(b.to_string().to_uppercase()),
            other => CellValue::Text(other.to_string()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// One data row keyed by column header.
pub type Row = BTreeMap<String, CellValue>;

/// Response body of `GET /v4/spreadsheets/{id}/values/{range}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub major_dimension: Option<String>,
    /// Raw rows, header first. Google omits the field entirely for an empty range.
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// Response body of `GET /v4/spreadsheets/{id}?fields=sheets.properties.title`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetMeta {
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

/// Converts raw rows (row 0 is the header) into header-keyed records.
///
/// Blank header cells become `column_{n}` with a 1-based `n`. Cells missing
/// from a short row are null; with `empty_cells_as_none`, empty strings are
/// null too.
pub fn to_json(rows: Vec<Vec<Value>>, empty_cells_as_none: bool) -> Vec<Row> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = header
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = match cell {
                Value::Null => String::new(),
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name
            }
        })
        .collect();

    rows.map(|raw| {
        let mut cells = raw.into_iter();
        headers
            .iter()
            .map(|header| {
                let cell = cells.next().map(CellValue::from_raw).unwrap_or(CellValue::Null);
                let cell = if empty_cells_as_none && cell.is_empty() {
                    CellValue::Null
                } else {
                    cell
                };
                (header.clone(), cell)
            })
            .collect()
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(rows: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(rows).unwrap()
    }

    #[test]
    fn header_row_keys_records() {
        let rows = raw(json!([
            ["hour", "income_call", "answer_call"],
            ["9", "100", "95"],
            ["10", "120", "108"]
        ]));
        let records = to_json(rows, true);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["income_call"], CellValue::Text("100".into()));
        assert_eq!(records[1]["hour"], CellValue::Text("10".into()));
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let rows = raw(json!([["income_call", "", null, "  "], ["1", "2", "3", "4"]]));
        let records = to_json(rows, true);
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert!(keys.contains(&"column_2"));
        assert!(keys.contains(&"column_3"));
        assert!(keys.contains(&"column_4"));
        assert_eq!(records[0]["column_3"], CellValue::Text("3".into()));
    }

    #[test]
    fn short_rows_are_padded_with_null() {
        let rows = raw(json!([["a", "b", "c"], ["1"]]));
        let records = to_json(rows, false);
        assert_eq!(records[0]["a"], CellValue::Text("1".into()));
        assert_eq!(records[0]["b"], CellValue::Null);
        assert_eq!(records[0]["c"], CellValue::Null);
    }

    #[test]
    fn empty_cells_handling_is_optional() {
        let rows = raw(json!([["a", "b"], ["", "x"]]));
        assert_eq!(to_json(rows.clone(), true)[0]["a"], CellValue::Null);
        assert_eq!(to_json(rows, false)[0]["a"], CellValue::Text(String::new()));
    }

    #[test]
    fn numbers_and_headers_only() {
        assert!(to_json(Vec::new(), true).is_empty());
        assert!(to_json(raw(json!([["a", "b"]])), true).is_empty());

        let records = to_json(raw(json!([["n"], [42], [true]])), true);
        assert_eq!(records[0]["n"], CellValue::Number(42.into()));
        assert_eq!(records[1]["n"], CellValue::Text("TRUE".into()));
    }

    #[test]
    fn cell_value_untagged_serde() {
        let row: Row = serde_json::from_value(json!({"a": null, "b": 1.5, "c": "x"})).unwrap();
        assert_eq!(row["a"], CellValue::Null);
        assert!(matches!(row["b"], CellValue::Number(_)));
        assert_eq!(serde_json::to_value(&row).unwrap(), json!({"a": null, "b": 1.5, "c": "x"}));
    }

    #[test]
    fn value_range_without_values() {
        let body = r#"{"range": "'202501'!A1:Z1000", "majorDimension": "ROWS"}"#;
        let vr: ValueRange = serde_json::from_str(body).unwrap();
        assert!(vr.values.is_empty());
        assert_eq!(vr.major_dimension.as_deref(), Some("ROWS"));
    }
}
