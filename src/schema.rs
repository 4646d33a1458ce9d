use crate::error::{InsightsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single spreadsheet row: header (or slug) to scalar cell value, in column order.
pub type Row = serde_json::Map<String, Value>;

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Calendar month slot, stored as a 0-based index (0 = January).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Month(u8);

impl Month {
    pub fn new(index: usize) -> Result<Self> {
        if index >= MONTH_NAMES.len() {
            return Err(InsightsError::InvalidMonth(index));
        }
        Ok(Self(index as u8))
    }

    /// Builds a month from its 1-based calendar number.
    pub fn from_number(number: usize) -> Result<Self> {
        match number.checked_sub(1) {
            Some(index) => Self::new(index),
            None => Err(InsightsError::InvalidMonth(number)),
        }
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (0..MONTH_NAMES.len() as u8).map(Month)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// 1-based calendar number, as written to `mes_index`.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[self.index()]
    }
}

impl TryFrom<usize> for Month {
    type Error = InsightsError;

    fn try_from(index: usize) -> Result<Self> {
        Month::new(index)
    }
}

impl From<Month> for usize {
    fn from(month: Month) -> usize {
        month.index()
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const MONTH_NAME_FIELD: &str = "mes";
pub const MONTH_INDEX_FIELD: &str = "mes_index";

/// A normalized row tagged with the month it was uploaded for.
///
/// The tag fields are written after the row's own columns. A sheet column that
/// already normalizes to `mes` or `mes_index` is overwritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedRecord(Row);

impl AggregatedRecord {
    pub fn new(row: &Row, month: Month) -> Self {
        let mut fields = row.clone();
        fields.insert(MONTH_NAME_FIELD.to_string(), Value::from(month.name()));
        fields.insert(MONTH_INDEX_FIELD.to_string(), Value::from(month.number()));
        Self(fields)
    }

    pub fn fields(&self) -> &Row {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn month_name(&self) -> Option<&str> {
        self.0.get(MONTH_NAME_FIELD).and_then(Value::as_str)
    }

    pub fn month_number(&self) -> Option<u64> {
        self.0.get(MONTH_INDEX_FIELD).and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_month_bounds() {
        assert_eq!(Month::new(0).unwrap().name(), "Janeiro");
        assert_eq!(Month::new(11).unwrap().number(), 12);
        assert!(matches!(Month::new(12), Err(InsightsError::InvalidMonth(12))));
        assert!(Month::from_number(0).is_err());
        assert_eq!(Month::from_number(3).unwrap().name(), "Março");
        assert_eq!(Month::all().count(), 12);
    }

    #[test]
    fn test_aggregated_record_appends_month_tags() {
        let row = json!({ "data": "2024-06-01", "receita": 10.5 });
        let row = row.as_object().unwrap();

        let record = AggregatedRecord::new(row, Month::new(5).unwrap());
        let columns: Vec<&str> = record.columns().collect();

        assert_eq!(columns, vec!["data", "receita", "mes", "mes_index"]);
        assert_eq!(record.month_name(), Some("Junho"));
        assert_eq!(record.month_number(), Some(6));
        // Source row is left untouched.
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_aggregated_record_overwrites_existing_mes_column() {
        let row = json!({ "mes": "jan", "valor": 1 });
        let record = AggregatedRecord::new(row.as_object().unwrap(), Month::new(1).unwrap());

        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["mes", "valor", "mes_index"]);
        assert_eq!(record.month_name(), Some("Fevereiro"));
    }

    #[test]
    fn test_chat_message_serialization() {
        let msg = ChatMessage::assistant("ok");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "role": "assistant", "content": "ok" })
        );
    }
}
