//! Datablock element
//!
//! Provides a fixed block of JSON or CSV data.
//!
//! # Parameters
//! - `data_type`: `json` (default) or `csv`
//! - `data`: the data, either already structured or as text
//!
//! # Outputs
//! - `data` - Parsed data; CSV becomes a list of records keyed by header

use async_trait::async_trait;
use flow_engine::{Element, ElementCore, ElementDefinition, ElementKind, ExecutionContext, Result, ValueMap};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{core_accessors, parse_params, preview};

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DatablockParams {
    data_type: String,
    data: Value,
}

impl Default for DatablockParams {
    fn default() -> Self {
        Self {
            data_type: "json".to_string(),
            data: Value::Null,
        }
    }
}

pub struct DatablockElement {
    core: ElementCore,
    data_type: String,
    data: Value,
}

impl DatablockElement {
    pub const PORT_DATA: &'static str = "data";

    pub fn new(def: &ElementDefinition) -> Result<Self> {
        let params: DatablockParams = parse_params(def)?;
        Ok(Self {
            core: ElementCore::from_definition(ElementKind::Datablock, def),
            data_type: params.data_type,
            data: params.data,
        })
    }

    fn process(&self) -> Value {
        match (self.data_type.as_str(), &self.data) {
            ("json", Value::String(text)) => serde_json::from_str(text).unwrap_or_else(|e| {
                log::error!("Error parsing JSON data in element {}: {}", self.core.id, e);
                Value::Object(ValueMap::new())
            }),
            ("csv", Value::String(text)) => match parse_csv(text) {
                Ok(records) => Value::Array(records.into_iter().map(Value::Object).collect()),
                Err(e) => {
                    log::error!("Error parsing CSV data in element {}: {}", self.core.id, e);
                    Value::Array(Vec::new())
                }
            },
            ("json", other) | ("csv", other) => other.clone(),
            (unknown, other) => {
                log::warn!(
                    "Unknown data type '{}' in element {}, using raw data",
                    unknown,
                    self.core.id
                );
                other.clone()
            }
        }
    }
}

#[async_trait]
impl Element for DatablockElement {
    core_accessors!();

    async fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<ValueMap> {
        log::info!("Executing datablock element: {} ({})", self.core.name, self.core.id);
        let data = self.process();

        ctx.emit(
            "datablock",
            json!({
                "elementId": self.core.id,
                "data_type": self.data_type,
                "data_preview": preview(&data),
            }),
        )
        .await;

        let mut outputs = ValueMap::new();
        outputs.insert(Self::PORT_DATA.into(), data);
        Ok(self.core.set_outputs(outputs))
    }
}

/// Parse CSV text with a header row into records.
///
/// Quoted cells may contain commas, newlines and doubled quotes. Numeric
/// cells become numbers and empty cells become null.
pub fn parse_csv(text: &str) -> std::result::Result<Vec<ValueMap>, String> {
    let rows = split_rows(text)?;
    let mut rows = rows.into_iter().filter(|row| !(row.len() == 1 && row[0].is_empty()));

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for (line, row) in rows.enumerate() {
        if row.len() != header.len() {
            return Err(format!(
                "row {} has {} fields, expected {}",
                line + 2,
                row.len(),
                header.len()
            ));
        }
        let record = header
            .iter()
            .zip(row)
            .map(|(name, cell)| (name.clone(), typed_cell(cell)))
            .collect();
        records.push(record);
    }
    Ok(records)
}

fn split_rows(text: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (true, c) => cell.push(c),
            (false, '"') if cell.is_empty() => quoted = true,
            (false, ',') => row.push(std::mem::take(&mut cell)),
            (false, '\r') => {}
            (false, '\n') => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            (false, c) => cell.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    Ok(rows)
}

fn typed_cell(cell: String) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{definition, Harness};

    #[test]
    fn test_parse_csv_types_cells() {
        let records = parse_csv("name,age,score\nalice,30,1.5\n\"bob, jr\",,\"7\"\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "alice");
        assert_eq!(records[0]["age"], 30);
        assert_eq!(records[0]["score"], 1.5);
        assert_eq!(records[1]["name"], "bob, jr");
        assert_eq!(records[1]["age"], Value::Null);
        assert_eq!(records[1]["score"], 7);
    }

    #[test]
    fn test_parse_csv_rejects_ragged_rows() {
        assert!(parse_csv("a,b\n1\n").is_err());
        assert!(parse_csv("a\n\"open").is_err());
        assert!(parse_csv("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_text_is_parsed() {
        let mut element = DatablockElement::new(&definition(
            "db",
            ElementKind::Datablock,
            json!({"data_type": "json", "data": "{\"k\": [1, 2]}"}),
        ))
        .unwrap();
        let harness = Harness::new();
        let outputs = harness.run(&mut element).await.unwrap();
        assert_eq!(outputs["data"], json!({"k": [1, 2]}));
        assert_eq!(harness.events_of("datablock")[0].data["data_type"], "json");
    }

    #[tokio::test]
    async fn test_bad_json_yields_empty_object() {
        let mut element = DatablockElement::new(&definition(
            "db",
            ElementKind::Datablock,
            json!({"data": "{not json"}),
        ))
        .unwrap();
        let outputs = Harness::new().run(&mut element).await.unwrap();
        assert_eq!(outputs["data"], json!({}));
    }

    #[tokio::test]
    async fn test_csv_block() {
        let mut element = DatablockElement::new(&definition(
            "db",
            ElementKind::Datablock,
            json!({"data_type": "csv", "data": "sym,px\nAPT,8.25\n"}),
        ))
        .unwrap();
        let outputs = Harness::new().run(&mut element).await.unwrap();
        assert_eq!(outputs["data"], json!([{"sym": "APT", "px": 8.25}]));
    }
}
