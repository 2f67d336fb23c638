use std::path::{Path, PathBuf};

use polars::prelude::*;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

use crate::error::DashError;
use crate::schema::tables;

/// Where the embedded database lives. Passed explicitly so callers can
/// point different sessions at different files.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Embedded persistence for the three dashboard tables.
pub struct SurveyStore {
    conn: Connection,
}

impl SurveyStore {
    pub fn open(config: &StoreConfig) -> Result<Self, DashError> {
        let conn = Connection::open(&config.path)?;
        Ok(Self { conn })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, DashError> {
        Self::open(&StoreConfig::new(path.as_ref()))
    }

    /// Replace a table wholesale with the frame's contents.
    pub fn replace(&mut self, table: &str, df: &DataFrame) -> Result<(), DashError> {
        validate_identifier(table)?;
        for name in df.get_column_names_str() {
            validate_identifier(name)?;
        }

        let columns = df.get_column_names_str();
        let decls: Vec<String> = columns
            .iter()
            .zip(df.dtypes())
            .map(|(name, dtype)| format!("\"{name}\" {}", sql_type(&dtype)))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{table}\";\n\
             CREATE TABLE \"{table}\" ({});",
            decls.join(", ")
        ))?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let insert = format!(
            "INSERT INTO \"{table}\" VALUES ({})",
            placeholders.join(", ")
        );
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in 0..df.height() {
                let mut values = Vec::with_capacity(columns.len());
                for name in &columns {
                    let series = df.column(name)?.as_materialized_series();
                    values.push(sql_value(series, row)?);
                }
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn write_survey(&mut self, df: &DataFrame) -> Result<(), DashError> {
        self.replace(tables::IRRIGATION, df)
    }

    pub fn write_products(&mut self, df: &DataFrame) -> Result<(), DashError> {
        self.replace(tables::PROD_CODE_NAME, df)
    }

    pub fn write_rainfall(&mut self, df: &DataFrame) -> Result<(), DashError> {
        self.replace(tables::RAINFALL_QTY, df)
    }

    /// Read a whole table back into a frame.
    ///
    /// Column types come from the stored values: all-integer columns come
    /// back Int64, any real widens the column to Float64, text comes back
    /// String.
    pub fn read(&self, table: &str) -> Result<DataFrame, DashError> {
        validate_identifier(table)?;

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM \"{table}\""))?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut cells: Vec<Vec<SqlValue>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, column) in cells.iter_mut().enumerate() {
                column.push(row.get::<_, SqlValue>(i)?);
            }
        }

        let columns = names
            .iter()
            .zip(&cells)
            .map(|(name, values)| rebuild_column(name, values))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DataFrame::new(columns)?)
    }

    pub fn read_survey(&self) -> Result<DataFrame, DashError> {
        self.read(tables::IRRIGATION)
    }

    pub fn read_products(&self) -> Result<DataFrame, DashError> {
        self.read(tables::PROD_CODE_NAME)
    }

    pub fn read_rainfall(&self) -> Result<DataFrame, DashError> {
        self.read(tables::RAINFALL_QTY)
    }
}

/// Table and column names are spliced into SQL, so they are restricted to
/// word characters.
fn validate_identifier(name: &str) -> Result<(), DashError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(DashError::Validation(format!(
            "identifier '{name}' is not storable"
        )))
    }
}

fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Boolean => "INTEGER",
        DataType::Float32 | DataType::Float64 => "REAL",
        _ => "TEXT",
    }
}

fn sql_value(series: &Series, row: usize) -> Result<SqlValue, DashError> {
    let value = series.get(row)?;
    Ok(match value {
        AnyValue::Null => SqlValue::Null,
        AnyValue::Boolean(b) => SqlValue::Integer(b as i64),
        AnyValue::Int8(v) => SqlValue::Integer(v as i64),
        AnyValue::Int16(v) => SqlValue::Integer(v as i64),
        AnyValue::Int32(v) => SqlValue::Integer(v as i64),
        AnyValue::Int64(v) => SqlValue::Integer(v),
        AnyValue::UInt8(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt16(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt32(v) => SqlValue::Integer(v as i64),
        AnyValue::UInt64(v) => SqlValue::Integer(v as i64),
        AnyValue::Float32(v) => SqlValue::Real(v as f64),
        AnyValue::Float64(v) => SqlValue::Real(v),
        AnyValue::String(s) => SqlValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => SqlValue::Text(s.to_string()),
        other => SqlValue::Text(other.to_string()),
    })
}

fn rebuild_column(name: &str, values: &[SqlValue]) -> Result<Column, DashError> {
    let mut has_real = false;
    let mut has_text = false;
    let mut all_null = true;
    for v in values {
        match v {
            SqlValue::Real(_) => {
                has_real = true;
                all_null = false;
            }
            SqlValue::Text(_) | SqlValue::Blob(_) => {
                has_text = true;
                all_null = false;
            }
            SqlValue::Integer(_) => all_null = false,
            SqlValue::Null => {}
        }
    }

    if has_text {
        let out: Vec<Option<String>> = values
            .iter()
            .map(|v| match v {
                SqlValue::Null => None,
                SqlValue::Text(s) => Some(s.clone()),
                SqlValue::Integer(i) => Some(i.to_string()),
                SqlValue::Real(r) => Some(r.to_string()),
                SqlValue::Blob(_) => None,
            })
            .collect();
        return Ok(Column::new(name.into(), out));
    }

    if has_real {
        let out: Vec<Option<f64>> = values
            .iter()
            .map(|v| match v {
                SqlValue::Integer(i) => Some(*i as f64),
                SqlValue::Real(r) => Some(*r),
                _ => None,
            })
            .collect();
        return Ok(Column::new(name.into(), out));
    }

    if all_null && !values.is_empty() {
        let out: Vec<Option<String>> = values.iter().map(|_| None).collect();
        return Ok(Column::new(name.into(), out));
    }

    let out: Vec<Option<i64>> = values
        .iter()
        .map(|v| match v {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        })
        .collect();
    Ok(Column::new(name.into(), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::survey;
    use crate::testutil::{cleaned_survey_frame, rainfall_series};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SurveyStore {
        SurveyStore::open_path(dir.path().join("dash.db")).unwrap()
    }

    #[test]
    fn survey_round_trips_through_the_store() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let df = cleaned_survey_frame();
        store.write_survey(&df).unwrap();
        let back = store.read_survey().unwrap();

        assert_eq!(back.shape(), df.shape());
        assert_eq!(
            back.get_column_names_str(),
            df.get_column_names_str()
        );
        assert!(back
            .column(survey::HOUSEHOLD_ID)
            .unwrap()
            .as_materialized_series()
            .equals(df.column(survey::HOUSEHOLD_ID).unwrap().as_materialized_series()));
    }

    #[test]
    fn nullable_floats_survive_with_integer_widening() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        store.write_rainfall(&rainfall_series()).unwrap();
        let back = store.read_rainfall().unwrap();

        assert_eq!(back.height(), rainfall_series().height());
        assert_eq!(
            back.column("rainfall_qty").unwrap().dtype(),
            &DataType::Float64
        );
        assert_eq!(back.column("year").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn replace_overwrites_previous_contents() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let df = cleaned_survey_frame();
        store.write_survey(&df).unwrap();
        let shorter = df.head(Some(1));
        store.write_survey(&shorter).unwrap();

        assert_eq!(store.read_survey().unwrap().height(), 1);
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let df = cleaned_survey_frame();
        assert!(matches!(
            store.replace("x\"; DROP TABLE irrigation; --", &df),
            Err(DashError::Validation(_))
        ));
    }
}
