use crate::errors::LookupError;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

// ========== Categories ==========

/// Logical partition of the cache. Each variant owns exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movies,
    Series,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Movies, Category::Series];

    /// Table backing this category. Only ever produced from this match.
    pub fn table_name(&self) -> &'static str {
        match self {
            Category::Movies => "movies",
            Category::Series => "series",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movies => "movies",
            Category::Series => "series",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LookupError::InvalidCategory(s.to_string()))
    }
}

// ========== Records ==========

/// Owned copy of one cached row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedRecord {
    columns: Map<String, Value>,
}

impl CachedRecord {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self { columns }
    }

    pub fn title(&self) -> Option<&str> {
        self.columns.get("title").and_then(Value::as_str)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> &Map<String, Value> {
        &self.columns
    }

    /// Copy the current row of a statement into an owned record.
    pub(crate) fn from_row(row: &rusqlite::Row<'_>, names: &[String]) -> rusqlite::Result<Self> {
        let mut columns = Map::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            columns.insert(name.clone(), value_from_ref(row.get_ref(idx)?));
        }
        Ok(Self { columns })
    }
}

impl From<Map<String, Value>> for CachedRecord {
    fn from(columns: Map<String, Value>) -> Self {
        Self::new(columns)
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        // NaN/inf have no JSON form
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}
