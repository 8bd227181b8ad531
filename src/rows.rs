//! Row descriptors rendered by the property inspector.
//!
//! Rows are plain data: the inspector draws them and reports edits back as
//! `fieldChanged` messages carrying the row `key`, which is how a row's change
//! reaction is wired up.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RowKind {
    Text,
    Password,
    Number {
        min: i64,
        max: i64,
        step: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRow {
    pub key: String,
    pub kind: RowKind,
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ConfigRow {
    pub fn text(key: &str, label: String, value: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: RowKind::Text,
            label,
            value: Value::String(value.to_string()),
            placeholder: None,
        }
    }

    pub fn password(key: &str, label: String, value: &str) -> Self {
        Self {
            kind: RowKind::Password,
            ..Self::text(key, label, value)
        }
    }

    pub fn number(key: &str, label: String, value: i64, min: i64, max: i64) -> Self {
        Self {
            key: key.to_string(),
            kind: RowKind::Number { min, max, step: 1 },
            label,
            value: Value::from(value),
            placeholder: None,
        }
    }

    pub fn with_placeholder(mut self, placeholder: String) -> Self {
        self.placeholder = Some(placeholder);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowGroup {
    pub title: String,
    pub rows: Vec<ConfigRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_row_serializes_bounds() {
        let row = ConfigRow::number("dial_step_size", "Step".into(), 5, 1, 100);
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "key": "dial_step_size",
                "kind": { "type": "number", "min": 1, "max": 100, "step": 1 },
                "label": "Step",
                "value": 5,
            })
        );
    }

    #[test]
    fn placeholder_only_serialized_when_set() {
        let row = ConfigRow::text("k", "Label".into(), "v").with_placeholder("hint".into());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["placeholder"], "hint");
        assert_eq!(json["kind"], json!({ "type": "text" }));
    }
}
