//! In-memory data column

use ahash::AHashMap;

use crate::convert::{convert, missing_of, Domain};
use crate::error::{Error, Result};
use crate::source::ValueSource;
use crate::types::{DataType, MeasureType};
use crate::value::{Level, Value};

/// A column of raw (non-computed) values
///
/// Text columns store their values as [`Value::Labeled`] with codes
/// assigned in order of first appearance.
#[derive(Debug, Clone)]
pub struct DataColumn {
    name: String,
    data_type: DataType,
    measure_type: MeasureType,
    values: Vec<Value>,
    levels: Vec<Level>,
    /// Label → code, text columns only
    codes: AHashMap<String, i32>,
}

impl DataColumn {
    /// Create an empty column
    pub fn new<S: Into<String>>(name: S, data_type: DataType, measure_type: MeasureType) -> Self {
        Self {
            name: name.into(),
            data_type,
            measure_type,
            values: Vec::new(),
            levels: Vec::new(),
            codes: AHashMap::new(),
        }
    }

    /// Continuous integer column
    pub fn integer<S: Into<String>>(name: S, values: impl IntoIterator<Item = i32>) -> Self {
        let mut column = Self::new(name, DataType::Integer, MeasureType::Continuous);
        column.values = values.into_iter().map(Value::Integer).collect();
        column
    }

    /// Continuous decimal column
    pub fn decimal<S: Into<String>>(name: S, values: impl IntoIterator<Item = f64>) -> Self {
        let mut column = Self::new(name, DataType::Decimal, MeasureType::Continuous);
        column.values = values.into_iter().map(Value::Decimal).collect();
        column
    }

    /// Nominal text column; empty strings are missing
    pub fn text<S, I, T>(name: S, labels: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut column = Self::new(name, DataType::Text, MeasureType::Nominal);
        for label in labels {
            let value = column.labeled(label.as_ref());
            column.values.push(value);
        }
        column
    }

    /// Change the measure type, rebuilding integer levels when categorical
    pub fn with_measure_type(mut self, measure_type: MeasureType) -> Self {
        self.measure_type = measure_type;
        if self.data_type == DataType::Integer {
            self.rebuild_integer_levels();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Pad with missing values (or truncate) to a row count
    pub fn resize(&mut self, row_count: usize) {
        let missing = self.missing();
        self.values.resize(row_count, missing);
    }

    /// Store a value, converting it into the column's domain
    pub fn set_value(&mut self, row: usize, value: Value) -> Result<()> {
        let len = self.values.len();
        if row >= len {
            return Err(Error::RowOutOfBounds(row, len));
        }

        let stored = match self.data_type {
            DataType::Text => {
                let text = convert(&value, Domain::Text);
                match text {
                    Value::Text(s) => self.labeled(&s),
                    _ => self.missing(),
                }
            }
            data_type => convert(&value, Domain::for_data_type(data_type)),
        };
        self.values[row] = stored;

        if self.data_type == DataType::Integer && self.measure_type.is_categorical() {
            self.rebuild_integer_levels();
        }
        Ok(())
    }

    fn missing(&self) -> Value {
        match self.data_type {
            DataType::Text => missing_of(Domain::Labeled),
            data_type => missing_of(Domain::for_data_type(data_type)),
        }
    }

    fn labeled(&mut self, label: &str) -> Value {
        if label.is_empty() {
            return missing_of(Domain::Labeled);
        }
        let code = match self.codes.get(label) {
            Some(code) => *code,
            None => {
                let code = self.levels.len() as i32;
                self.codes.insert(label.to_string(), code);
                self.levels.push(Level::new(code, label));
                code
            }
        };
        Value::labeled(code, label)
    }

    fn rebuild_integer_levels(&mut self) {
        let mut distinct: Vec<i32> = self
            .values
            .iter()
            .filter(|v| !v.is_missing())
            .filter_map(|v| match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        distinct.sort_unstable();
        distinct.dedup();

        self.levels = if self.measure_type.is_categorical() {
            distinct
                .into_iter()
                .map(|v| Level::new(v, v.to_string()))
                .collect()
        } else {
            Vec::new()
        };
    }
}

impl ValueSource for DataColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_at(&self, row: usize) -> Result<Value> {
        self.values
            .get(row)
            .cloned()
            .ok_or(Error::RowOutOfBounds(row, self.values.len()))
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    fn levels(&self) -> Vec<Level> {
        self.levels.clone()
    }
}
