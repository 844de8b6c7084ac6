//! Engine result files. Column names are matched case-insensitively.

use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

use crate::errors::{DatasetError, EvaluationResult};

#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl ResultTable {
    pub fn from_reader<R: Read>(source: R) -> EvaluationResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source);
        let headers = reader
            .headers()
            .map_err(DatasetError::from)?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatasetError::from)?;
        Ok(Self { headers, rows })
    }

    pub fn read(path: &Path) -> EvaluationResult<Self> {
        if !path.exists() {
            return Err(DatasetError::FileNotFound(path.display().to_string()).into());
        }
        let file = std::fs::File::open(path).map_err(DatasetError::from)?;
        Self::from_reader(file)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of a column, or `None` when the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let name = name.to_lowercase();
        let position = self.headers.iter().position(|h| *h == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(position).unwrap_or("").trim())
                .collect(),
        )
    }
}
