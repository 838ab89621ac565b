use serde::Serialize;
use serde_json::Value;

use w3ml_types::{ReplayRow, TypeError};

/// A catalog row together with the index it is stored at.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub index: u64,
    #[serde(flatten)]
    pub row: ReplayRow,
}

impl CatalogEntry {
    /// Look up one column. `"index"` is accepted in addition to the row's
    /// own columns.
    pub fn column(&self, name: &str) -> Result<Value, TypeError> {
        match name {
            "index" => Ok(Value::from(self.index)),
            other => self.row.column(other),
        }
    }

    /// Look up several columns in order.
    pub fn columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Value>, TypeError> {
        names.iter().map(|n| self.column(n.as_ref())).collect()
    }
}
