//! The model table: append-only record of every proposed model.

use dm_types::{GeneratorError, ParameterSpace};
use serde::{Deserialize, Serialize};

/// Storage type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Float,
    Int,
    Bool,
}

/// A single table cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl CellValue {
    /// The neutral value new rows start with.
    pub fn zero(dtype: ColumnType) -> Self {
        match dtype {
            ColumnType::Float => Self::Float(0.0),
            ColumnType::Int => Self::Int(0),
            ColumnType::Bool => Self::Bool(false),
        }
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            Self::Float(_) => ColumnType::Float,
            Self::Int(_) => ColumnType::Int,
            Self::Bool(_) => ColumnType::Bool,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            Self::Int(v) => *v as f64,
            Self::Bool(v) => f64::from(u8::from(*v)),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Read/append access to the table of models.
///
/// Parameter columns lead the table in parameter-space order; result columns
/// follow. Rows are never removed.
pub trait ModelTable {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn column_names(&self) -> Vec<String>;

    fn column_type(&self, column: &str) -> Option<ColumnType>;

    /// Numeric value of one cell.
    fn value(&self, row: usize, column: &str) -> Result<f64, GeneratorError>;

    /// Append a row whose leading columns take `values`; every other column
    /// starts at the zero of its type.
    fn append_row(&mut self, values: &[f64]) -> Result<(), GeneratorError>;

    fn row_values(&self, row: usize, columns: &[String]) -> Result<Vec<f64>, GeneratorError> {
        columns.iter().map(|c| self.value(row, c)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
}

/// In-memory model table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllModels {
    columns: Vec<Column>,
    n_par: usize,
    rows: Vec<Vec<CellValue>>,
}

impl AllModels {
    /// A table with one float column per parameter followed by the
    /// `chi2` and `kinchi2` fit statistics.
    pub fn new(space: &ParameterSpace) -> Self {
        Self::with_fit_columns(space, "chi2", "kinchi2")
    }

    pub fn with_fit_columns(space: &ParameterSpace, chi2: &str, kinchi2: &str) -> Self {
        let mut names: Vec<String> = space.par_names().to_vec();
        names.push(chi2.to_string());
        names.push(kinchi2.to_string());
        let columns = names
            .into_iter()
            .map(|name| Column {
                name,
                dtype: ColumnType::Float,
            })
            .collect();
        Self {
            columns,
            n_par: space.len(),
            rows: Vec::new(),
        }
    }

    /// Add a result column; existing rows get the zero of `dtype`.
    pub fn with_result_column(mut self, name: impl Into<String>, dtype: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            dtype,
        });
        for row in &mut self.rows {
            row.push(CellValue::zero(dtype));
        }
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn n_par(&self) -> usize {
        self.n_par
    }

    fn column_index(&self, column: &str) -> Result<usize, GeneratorError> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| GeneratorError::Table {
                message: format!("unknown column {column}"),
            })
    }

    fn row(&self, row: usize) -> Result<&Vec<CellValue>, GeneratorError> {
        self.rows.get(row).ok_or_else(|| GeneratorError::Table {
            message: format!("row {row} out of range ({} rows)", self.rows.len()),
        })
    }

    pub fn cell(&self, row: usize, column: &str) -> Result<CellValue, GeneratorError> {
        let idx = self.column_index(column)?;
        Ok(self.row(row)?[idx])
    }

    /// Fill in a result column of an existing row.
    ///
    /// Parameter columns are immutable once a row exists.
    pub fn set_result(
        &mut self,
        row: usize,
        column: &str,
        value: CellValue,
    ) -> Result<(), GeneratorError> {
        let idx = self.column_index(column)?;
        if idx < self.n_par {
            return Err(GeneratorError::Table {
                message: format!("parameter column {column} cannot be modified"),
            });
        }
        let dtype = self.columns[idx].dtype;
        let value = match (dtype, value) {
            (ColumnType::Float, CellValue::Int(v)) => CellValue::Float(v as f64),
            (expected, given) if expected == given.dtype() => given,
            (expected, given) => {
                return Err(GeneratorError::Table {
                    message: format!(
                        "column {column} holds {expected:?} values, got {:?}",
                        given.dtype()
                    ),
                })
            }
        };
        let n_rows = self.rows.len();
        let cells = self.rows.get_mut(row).ok_or_else(|| GeneratorError::Table {
            message: format!("row {row} out of range ({n_rows} rows)"),
        })?;
        cells[idx] = value;
        Ok(())
    }
}

impl ModelTable for AllModels {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.dtype)
    }

    fn value(&self, row: usize, column: &str) -> Result<f64, GeneratorError> {
        Ok(self.cell(row, column)?.as_f64())
    }

    fn append_row(&mut self, values: &[f64]) -> Result<(), GeneratorError> {
        if values.len() > self.columns.len() {
            return Err(GeneratorError::Table {
                message: format!(
                    "row has {} values but the table has {} columns",
                    values.len(),
                    self.columns.len()
                ),
            });
        }
        let mut row = Vec::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let cell = match values.get(idx) {
                Some(v) => match column.dtype {
                    ColumnType::Float => CellValue::Float(*v),
                    ColumnType::Int => CellValue::Int(v.round() as i64),
                    ColumnType::Bool => CellValue::Bool(*v != 0.0),
                },
                None => CellValue::zero(column.dtype),
            };
            row.push(cell);
        }
        self.rows.push(row);
        Ok(())
    }
}
