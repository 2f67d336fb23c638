use std::collections::HashMap;

use polars::prelude::*;

use crate::error::DashError;
use crate::schema::{products, survey};

/// Denominator used for the irrigation-by-crop percentages.
///
/// The dashboard historically divided by the grand total of the whole
/// result set, so group percentages do not sum to 100 within a crop.
/// `GroupTotal` is the per-(department, crop) alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Denominator {
    #[default]
    GrandTotal,
    GroupTotal,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Restrict a table to one department.
pub fn filter_department(df: &DataFrame, department: &str) -> Result<DataFrame, DashError> {
    Ok(df
        .clone()
        .lazy()
        .filter(col(survey::DEPARTMENT).eq(lit(department)))
        .collect()?)
}

/// Distinct household count. Zero input rows is an error, not a zero:
/// an unknown department selection must surface as a failed metric.
pub fn count_households(df: &DataFrame) -> Result<i64, DashError> {
    if df.height() == 0 {
        return Err(DashError::Insufficient(
            "no rows to count households".into(),
        ));
    }
    let n = df
        .column(survey::HOUSEHOLD_ID)?
        .as_materialized_series()
        .n_unique()?;
    Ok(n as i64)
}

/// Mean processed-product count, rounded to 1 decimal.
pub fn avg_processed_products(df: &DataFrame) -> Result<f64, DashError> {
    let mean = df
        .column(survey::N_PRODUCTS)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .mean()
        .ok_or_else(|| DashError::Insufficient("no processed-product values".into()))?;
    Ok(round_to(mean, 1))
}

/// Share of households practicing irrigation, as a percentage.
///
/// Looks up the affirmative code 1 explicitly rather than relying on the
/// sort order of a frequency table.
pub fn irrigation_share(df: &DataFrame) -> Result<f64, DashError> {
    let cast = df
        .column(survey::IRRIGATION)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let ca = cast.i64()?;

    let mut total = 0usize;
    let mut yes = 0usize;
    for v in ca.into_iter().flatten() {
        total += 1;
        if v == 1 {
            yes += 1;
        }
    }
    if total == 0 {
        return Err(DashError::Insufficient("no irrigation answers".into()));
    }
    Ok(round_to(yes as f64 / total as f64 * 100.0, 1))
}

/// Most frequent water source, excluding the "NA" sentinel.
pub fn top_water_source(df: &DataFrame) -> Result<String, DashError> {
    let ca = df
        .column(survey::WATER_SOURCE)?
        .as_materialized_series()
        .str()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in ca.into_iter().flatten() {
        if v != survey::WATER_NA {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(name, c)| (c, std::cmp::Reverse(name)))
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| DashError::Insufficient("no non-NA water sources".into()))
}

/// Count of recognized crop observations per department, ascending.
pub fn crop_department_count(
    survey_df: &DataFrame,
    products_df: &DataFrame,
) -> Result<DataFrame, DashError> {
    let out = survey_df
        .select([survey::DEPARTMENT, survey::HOUSEHOLD_ID])?
        .lazy()
        .join(
            products_df
                .select([products::HOUSEHOLD_ID, products::CROP_NAME])?
                .lazy(),
            [col(survey::HOUSEHOLD_ID)],
            [col(products::HOUSEHOLD_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .group_by([col(survey::DEPARTMENT)])
        .agg([col(products::CROP_NAME).count().alias("count")])
        .sort(["count"], SortMultipleOptions::default())
        .collect()?;

    Ok(out)
}

/// Household counts per (department, practices-irrigation) pair.
pub fn irrigation_by_department(survey_df: &DataFrame) -> Result<DataFrame, DashError> {
    let out = survey_df
        .select([
            survey::DEPARTMENT,
            survey::HOUSEHOLD_ID,
            survey::IRRIGATION,
        ])?
        .lazy()
        .group_by([col(survey::DEPARTMENT), col(survey::IRRIGATION)])
        .agg([col(survey::HOUSEHOLD_ID).count().alias("households")])
        .with_column(
            when(col(survey::IRRIGATION).eq(lit(1)))
                .then(lit("Yes"))
                .otherwise(lit("No"))
                .alias("practice_irrigation"),
        )
        .select([
            col(survey::DEPARTMENT),
            col("practice_irrigation"),
            col("households"),
        ])
        .sort(
            ["households", survey::DEPARTMENT],
            SortMultipleOptions::default(),
        )
        .collect()?;

    Ok(out)
}

/// Irrigation Yes/No breakdown per crop, with household counts and a
/// percentage against the chosen denominator.
pub fn irrigation_by_crop(
    filtered: &DataFrame,
    products_df: &DataFrame,
    denominator: Denominator,
) -> Result<DataFrame, DashError> {
    let denom_expr = match denominator {
        Denominator::GrandTotal => col("households").cast(DataType::Float64).sum(),
        Denominator::GroupTotal => col("households")
            .cast(DataType::Float64)
            .sum()
            .over([col(survey::DEPARTMENT), col(products::CROP_NAME)]),
    };

    let mut out = filtered
        .select([
            survey::DEPARTMENT,
            survey::HOUSEHOLD_ID,
            survey::IRRIGATION,
        ])?
        .lazy()
        .join(
            products_df
                .select([products::HOUSEHOLD_ID, products::CROP_NAME])?
                .lazy(),
            [col(survey::HOUSEHOLD_ID)],
            [col(products::HOUSEHOLD_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .filter(col(products::CROP_NAME).is_not_null())
        .group_by([
            col(survey::DEPARTMENT),
            col(products::CROP_NAME),
            col(survey::IRRIGATION),
        ])
        .agg([col(survey::HOUSEHOLD_ID).count().alias("households")])
        .with_column(
            (col("households").cast(DataType::Float64) * lit(100.0) / denom_expr)
                .alias("percentage"),
        )
        .with_column(
            when(col(survey::IRRIGATION).eq(lit(1)))
                .then(lit("Yes"))
                .otherwise(lit("No"))
                .alias("practice_irrigation"),
        )
        .select([
            col(products::CROP_NAME),
            col("practice_irrigation"),
            col("households"),
            col("percentage"),
        ])
        .sort(
            [products::CROP_NAME, "practice_irrigation"],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let rounded: Vec<Option<f64>> = out
        .column("percentage")?
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.map(|p| round_to(p, 1)))
        .collect();
    out.with_column(Series::new("percentage".into(), rounded))?;

    Ok(out)
}

/// Department-mean share of roots & tubers consumed vs sold, ×100,
/// one row per (department, share type).
pub fn roots_tubers_share(survey_df: &DataFrame) -> Result<DataFrame, DashError> {
    let means = survey_df
        .select([survey::DEPARTMENT, survey::RT_CONSUMED, survey::RT_SOLD])?
        .lazy()
        .group_by([col(survey::DEPARTMENT)])
        .agg([
            col(survey::RT_CONSUMED).mean().alias("Consumed"),
            col(survey::RT_SOLD).mean().alias("Sold"),
        ])
        .collect()?;

    let mut out: Option<DataFrame> = None;
    for label in ["Consumed", "Sold"] {
        let scaled: Vec<Option<f64>> = means
            .column(label)?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .map(|v| v.map(|s| round_to(s * 100.0, 2)))
            .collect();

        let part = DataFrame::new(vec![
            means.column(survey::DEPARTMENT)?.clone(),
            Column::new(
                "share_root_tuber".into(),
                vec![label.to_string(); means.height()],
            ),
            Column::new("value".into(), scaled),
        ])?;

        out = Some(match out {
            None => part,
            Some(acc) => acc.vstack(&part)?,
        });
    }

    out.ok_or_else(|| DashError::Insufficient("no share columns".into()))
}

/// Distinct values of a column, optionally restricted by an equality
/// filter on another column. Populates the selector dropdowns.
pub fn unique_values(
    df: &DataFrame,
    column: &str,
    by: Option<(&str, &str)>,
) -> Result<Vec<String>, DashError> {
    let scoped = match by {
        Some((var, value)) => df
            .clone()
            .lazy()
            .filter(col(var).eq(lit(value)))
            .collect()?,
        None => df.clone(),
    };

    let series = scoped
        .column(column)
        .map_err(|_| DashError::ColumnNotFound(column.to_string()))?
        .as_materialized_series()
        .clone();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for i in 0..series.len() {
        let value = series.get(i)?;
        let text = match value {
            AnyValue::Null => continue,
            AnyValue::String(s) => s.to_string(),
            AnyValue::StringOwned(s) => s.to_string(),
            other => format!("{other}"),
        };
        if seen.insert(text.clone()) {
            out.push(text);
        }
    }
    Ok(out)
}
