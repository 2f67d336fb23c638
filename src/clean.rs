use std::collections::BTreeSet;

use polars::prelude::*;

use crate::error::DashError;
use crate::schema::{raw, survey};

/// Outcome of the cleaning pass.
///
/// A postcondition violation abandons the whole pass and hands the caller
/// the input table unmodified, so the failure is visible rather than
/// silently producing a half-cleaned table.
#[derive(Debug, Clone)]
pub enum CleanOutcome {
    Cleaned(DataFrame),
    Unchanged(DataFrame),
}

impl CleanOutcome {
    pub fn frame(&self) -> &DataFrame {
        match self {
            CleanOutcome::Cleaned(df) | CleanOutcome::Unchanged(df) => df,
        }
    }

    pub fn into_frame(self) -> DataFrame {
        match self {
            CleanOutcome::Cleaned(df) | CleanOutcome::Unchanged(df) => df,
        }
    }

    pub fn is_cleaned(&self) -> bool {
        matches!(self, CleanOutcome::Cleaned(_))
    }
}

// ── Per-column transforms ───────────────────────────────────────────────────

/// Recode a Yes/No question to the canonical {0 = No, 1 = Yes} encoding.
///
/// Accepts boolean columns, columns already coded {0, 1}, and columns coded
/// {1, 2} where 2 means "No". Anything else is a data-quality error.
pub fn recode_binary(df: &DataFrame, name: &str) -> Result<Series, DashError> {
    let column = df
        .column(name)
        .map_err(|_| DashError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    match series.dtype() {
        DataType::Boolean => Ok(series.cast(&DataType::Int64)?),
        dt if dt.is_integer() => {
            let cast = series.cast(&DataType::Int64)?;
            let ca = cast.i64()?;

            let mut distinct = BTreeSet::new();
            for v in ca.into_iter().flatten() {
                distinct.insert(v);
            }
            let values: Vec<i64> = distinct.into_iter().collect();

            if values == [1, 2] {
                let recoded = ca.apply_values(|v| if v == 2 { 0 } else { 1 });
                Ok(recoded.into_series())
            } else if values == [0, 1] {
                Ok(cast)
            } else if values.len() > 2 {
                Err(DashError::InvalidData(format!(
                    "more than 2 unique values in {name}, expected 2"
                )))
            } else {
                Err(DashError::InvalidData(format!(
                    "unknown binary coding for {name}, expected [1, 2] or [0, 1]"
                )))
            }
        }
        dt => Err(DashError::InvalidData(format!(
            "{name} has non-binary dtype {dt}"
        ))),
    }
}

/// Strip punctuation from `input`, collapsing runs of '.' to a single '.'.
fn strip_punctuation(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dot = false;
    for ch in input.chars() {
        if ch == '.' {
            if !prev_dot {
                out.push('.');
            }
            prev_dot = true;
        } else {
            prev_dot = false;
            if !ch.is_ascii_punctuation() {
                out.push(ch);
            }
        }
    }
    out
}

/// Coerce a punctuated text column to Int64 or Float64.
///
/// No-op when the column is not a string column; the caller's dtype
/// postcondition decides whether that is acceptable.
pub fn coerce_numeric(df: &DataFrame, name: &str, as_int: bool) -> Result<Series, DashError> {
    let column = df
        .column(name)
        .map_err(|_| DashError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    let DataType::String = series.dtype() else {
        return Ok(series.clone());
    };

    let ca = series.str()?;
    if as_int {
        let mut out: Vec<Option<i64>> = Vec::with_capacity(ca.len());
        for v in ca {
            match v {
                None => out.push(None),
                Some(txt) => {
                    let cleaned = strip_punctuation(txt);
                    let parsed = cleaned.trim().parse::<i64>().map_err(|_| {
                        DashError::InvalidData(format!("{name}: '{txt}' is not an integer"))
                    })?;
                    out.push(Some(parsed));
                }
            }
        }
        Ok(Series::new(name.into(), out))
    } else {
        let mut out: Vec<Option<f64>> = Vec::with_capacity(ca.len());
        for v in ca {
            match v {
                None => out.push(None),
                Some(txt) => {
                    let cleaned = strip_punctuation(txt);
                    let parsed = cleaned.trim().parse::<f64>().map_err(|_| {
                        DashError::InvalidData(format!("{name}: '{txt}' is not a number"))
                    })?;
                    out.push(Some(parsed));
                }
            }
        }
        Ok(Series::new(name.into(), out))
    }
}

/// Normalize the head-of-household gender column to {"Male", "Female"}.
///
/// Two-valued text maps recognized male tokens to "Male" and everything
/// else to "Female". Integer coding treats the majority value as "Male".
pub fn normalize_gender(df: &DataFrame, name: &str) -> Result<Series, DashError> {
    let column = df
        .column(name)
        .map_err(|_| DashError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    match series.dtype() {
        DataType::String => {
            let ca = series.str()?;
            let mut distinct = BTreeSet::new();
            for v in ca.into_iter().flatten() {
                distinct.insert(v);
            }
            if distinct.len() != 2 {
                return Ok(series.clone());
            }
            let out: Vec<Option<&str>> = ca
                .into_iter()
                .map(|v| {
                    v.map(|g| match g {
                        "M" | "m" | "male" | "Male" => survey::MALE,
                        _ => survey::FEMALE,
                    })
                })
                .collect();
            Ok(Series::new(name.into(), out))
        }
        dt if dt.is_integer() => {
            let cast = series.cast(&DataType::Int64)?;
            let ca = cast.i64()?;

            let mut counts: std::collections::HashMap<i64, usize> = Default::default();
            for v in ca.into_iter().flatten() {
                *counts.entry(v).or_insert(0) += 1;
            }
            let male_value = counts
                .into_iter()
                .max_by_key(|&(v, c)| (c, std::cmp::Reverse(v)))
                .map(|(v, _)| v)
                .ok_or_else(|| DashError::InvalidData(format!("{name} is empty")))?;

            let out: Vec<Option<&str>> = ca
                .into_iter()
                .map(|v| {
                    v.map(|g| {
                        if g == male_value {
                            survey::MALE
                        } else {
                            survey::FEMALE
                        }
                    })
                })
                .collect();
            Ok(Series::new(name.into(), out))
        }
        _ => Ok(series.clone()),
    }
}

/// Replace missing water-source values with the literal "NA" sentinel.
pub fn fill_water_source(df: &DataFrame, name: &str) -> Result<Series, DashError> {
    let column = df
        .column(name)
        .map_err(|_| DashError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    let DataType::String = series.dtype() else {
        return Ok(series.clone());
    };

    let ca = series.str()?;
    let out: Vec<Option<&str>> = ca.into_iter().map(|v| v.or(Some(survey::WATER_NA))).collect();
    Ok(Series::new(name.into(), out))
}

/// Strip the `DEPARTURE. ` prefix from the department column.
pub fn strip_department_prefix(df: &DataFrame) -> Result<Series, DashError> {
    let name = survey::DEPARTMENT;
    let column = df
        .column(name)
        .map_err(|_| DashError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    let DataType::String = series.dtype() else {
        return Ok(series.clone());
    };

    let ca = series.str()?;
    let out: Vec<Option<String>> = ca
        .into_iter()
        .map(|v| v.map(|d| d.replace(raw::DEPARTMENT_PREFIX.trim_end(), "").trim().to_string()))
        .collect();
    Ok(Series::new(name.into(), out))
}

// ── Cleaning pass ───────────────────────────────────────────────────────────

/// Apply every per-column normalization with its postcondition.
///
/// Individual binary/numeric conversions degrade to the unconverted column,
/// but the postcondition that follows each one aborts the whole pass, so
/// the outcome is all-or-nothing.
pub fn clean_survey(df: &DataFrame) -> CleanOutcome {
    match try_clean(df) {
        Ok(cleaned) => CleanOutcome::Cleaned(cleaned),
        Err(e) => {
            log::warn!("cleaning pass abandoned: {e}");
            CleanOutcome::Unchanged(df.clone())
        }
    }
}

fn try_clean(df: &DataFrame) -> Result<DataFrame, DashError> {
    let mut out = df.clone();

    out.with_column(strip_department_prefix(&out)?)?;

    out.with_column(normalize_gender(&out, survey::GENDER)?)?;
    ensure_gender(&out)?;

    out.with_column(fill_water_source(&out, survey::WATER_SOURCE)?)?;
    if out.column(survey::WATER_SOURCE)?.null_count() > 0 {
        return Err(DashError::Validation(format!(
            "failed to fill missing values in {}",
            survey::WATER_SOURCE
        )));
    }

    for name in survey::BINARY {
        match recode_binary(&out, name) {
            Ok(s) => {
                out.with_column(s)?;
            }
            Err(e) => log::warn!("{name} left unconverted: {e}"),
        }
        ensure_binary(&out, name)?;
    }

    for name in survey::TO_INT {
        match coerce_numeric(&out, name, true) {
            Ok(s) => {
                out.with_column(s)?;
            }
            Err(e) => log::warn!("{name} left unconverted: {e}"),
        }
        if out.column(name)?.dtype() != &DataType::Int64 {
            return Err(DashError::Validation(format!(
                "{name} failed to convert to Integer"
            )));
        }
    }

    for name in survey::TO_FLOAT {
        match coerce_numeric(&out, name, false) {
            Ok(s) => {
                out.with_column(s)?;
            }
            Err(e) => log::warn!("{name} left unconverted: {e}"),
        }
        if out.column(name)?.dtype() != &DataType::Float64 {
            return Err(DashError::Validation(format!(
                "{name} failed to convert to Float"
            )));
        }
    }

    Ok(out)
}

fn ensure_gender(df: &DataFrame) -> Result<(), DashError> {
    let ca = df
        .column(survey::GENDER)?
        .as_materialized_series()
        .str()
        .map_err(|_| {
            DashError::Validation(format!("{} cleaning failed", survey::GENDER))
        })?;

    let mut distinct = BTreeSet::new();
    for v in ca.into_iter().flatten() {
        distinct.insert(v.to_string());
    }
    if distinct.contains(survey::MALE) && distinct.contains(survey::FEMALE) {
        Ok(())
    } else {
        Err(DashError::Validation(format!(
            "{} cleaning failed, expected both Male and Female",
            survey::GENDER
        )))
    }
}

fn ensure_binary(df: &DataFrame, name: &str) -> Result<(), DashError> {
    let series = df.column(name)?.as_materialized_series();
    let err = || {
        DashError::Validation(format!(
            "{name} failed to convert to binary [1, 0]"
        ))
    };

    let cast = series.cast(&DataType::Int64).map_err(|_| err())?;
    let ca = cast.i64().map_err(|_| err())?;
    if cast.null_count() > 0 {
        return Err(err());
    }

    let mut distinct = BTreeSet::new();
    for v in ca.into_iter().flatten() {
        distinct.insert(v);
    }
    let values: Vec<i64> = distinct.into_iter().collect();
    if values == [0, 1] {
        Ok(())
    } else {
        Err(err())
    }
}
