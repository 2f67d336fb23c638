use augurs::ets::AutoETS;
use augurs::mstl::MSTLModel;
use augurs::prelude::*;
use chrono::{Months, NaiveDate};
use polars::prelude::*;

use crate::error::DashError;
use crate::schema::{forecast, rainfall};

/// A fitted seasonal model, ready to produce point forecasts.
pub trait FittedModel {
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, DashError>;
}

/// External forecasting capability. Any model with additive time-series
/// decomposition and seasonality satisfies this seam.
pub trait SeasonalModel {
    fn fit(&self, y: &[f64]) -> Result<Box<dyn FittedModel>, DashError>;
}

/// Shipped implementation: MSTL seasonal decomposition over a
/// non-seasonal AutoETS trend.
#[derive(Debug, Clone, Copy)]
pub struct MstlRainfallModel {
    pub season_length: usize,
}

impl Default for MstlRainfallModel {
    fn default() -> Self {
        Self { season_length: 12 }
    }
}

struct FittedMstl<F>(F);

impl<F> FittedModel for FittedMstl<F>
where
    F: Predict,
    F::Error: std::fmt::Display,
{
    fn predict(&self, horizon: usize) -> Result<Vec<f64>, DashError> {
        let out = self
            .0
            .predict(horizon, None::<f64>)
            .map_err(|e| DashError::Forecast(e.to_string()))?;
        Ok(out.point)
    }
}

impl SeasonalModel for MstlRainfallModel {
    fn fit(&self, y: &[f64]) -> Result<Box<dyn FittedModel>, DashError> {
        let model = MSTLModel::new(
            vec![self.season_length],
            AutoETS::non_seasonal().into_trend_model(),
        );
        let fitted = model
            .fit(y)
            .map_err(|e| DashError::Forecast(e.to_string()))?;
        Ok(Box::new(FittedMstl(fitted)))
    }
}

/// The MoM/YoY result: the percentage change and the peak calendar month
/// it is anchored to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeMetric {
    pub value: f64,
    pub peak_month: u32,
}

// ── Series preparation ──────────────────────────────────────────────────────

/// Append new rainfall rows to the historical series.
///
/// Backfilling or overlapping appends would silently corrupt the forecast,
/// so a new minimum date at or before the existing maximum is a hard error
/// rather than a degraded result.
pub fn append_rainfall(history: &DataFrame, new: &DataFrame) -> Result<DataFrame, DashError> {
    let max_existing = date_bound(history, true)?;
    let min_new = date_bound(new, false)?;

    if min_new <= max_existing {
        return Err(DashError::AppendOrder(format!(
            "new data starts at {min_new}, existing data ends at {max_existing}"
        )));
    }

    let aligned = new.select(history.get_column_names_str())?;
    Ok(history.vstack(&aligned)?)
}

fn date_bound(df: &DataFrame, max: bool) -> Result<String, DashError> {
    let ca = df
        .column(rainfall::DATE)
        .map_err(|_| DashError::MissingColumn(rainfall::DATE.into()))?
        .as_materialized_series()
        .str()?;

    let mut bound: Option<&str> = None;
    for v in ca.into_iter().flatten() {
        bound = Some(match bound {
            None => v,
            Some(b) if max && v > b => v,
            Some(b) if !max && v < b => v,
            Some(b) => b,
        });
    }
    bound
        .map(|b| b.to_string())
        .ok_or_else(|| DashError::Insufficient("rainfall series has no dates".into()))
}

/// Extract one department's (date, quantity) series in ascending order.
pub fn department_series(
    rainfall_df: &DataFrame,
    department: &str,
) -> Result<(Vec<NaiveDate>, Vec<f64>), DashError> {
    let sorted = rainfall_df
        .clone()
        .lazy()
        .filter(
            col(rainfall::DEPARTMENT)
                .eq(lit(department))
                .and(col(rainfall::QTY).is_not_null()),
        )
        .select([col(rainfall::DATE), col(rainfall::QTY)])
        .sort([rainfall::DATE], SortMultipleOptions::default())
        .collect()?;

    if sorted.height() == 0 {
        return Err(DashError::Insufficient(format!(
            "no rainfall observations for department {department}"
        )));
    }

    let date_ca = sorted
        .column(rainfall::DATE)?
        .as_materialized_series()
        .str()?;
    let qty_cast = sorted
        .column(rainfall::QTY)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let qty_ca = qty_cast.f64()?;

    let mut dates = Vec::with_capacity(sorted.height());
    let mut values = Vec::with_capacity(sorted.height());
    for i in 0..sorted.height() {
        let (Some(ds), Some(y)) = (date_ca.get(i), qty_ca.get(i)) else {
            continue;
        };
        let parsed = NaiveDate::parse_from_str(ds, "%Y-%m-%d")
            .map_err(|_| DashError::InvalidData(format!("unparseable date '{ds}'")))?;
        dates.push(parsed);
        values.push(y);
    }

    Ok((dates, values))
}

// ── Forecasting ─────────────────────────────────────────────────────────────

/// Fit a fresh model on one department's history and stitch actuals and
/// the future-only horizon into one tagged series with derived year/month
/// columns. Each call refits from scratch.
pub fn forecast_department(
    rainfall_df: &DataFrame,
    department: &str,
    horizon: usize,
    append_new_data: Option<&DataFrame>,
    model: &dyn SeasonalModel,
) -> Result<DataFrame, DashError> {
    let data = match append_new_data {
        Some(new) => append_rainfall(rainfall_df, new)?,
        None => rainfall_df.clone(),
    };

    let (dates, y) = department_series(&data, department)?;
    let fitted = model.fit(&y)?;
    let predicted = fitted.predict(horizon)?;

    let last = dates
        .last()
        .copied()
        .ok_or_else(|| DashError::Insufficient("empty department series".into()))?;

    let mut ds: Vec<String> = Vec::with_capacity(dates.len() + horizon);
    let mut values: Vec<f64> = Vec::with_capacity(dates.len() + horizon);
    let mut tags: Vec<&str> = Vec::with_capacity(dates.len() + horizon);
    let mut years: Vec<i64> = Vec::with_capacity(dates.len() + horizon);
    let mut months: Vec<i64> = Vec::with_capacity(dates.len() + horizon);

    use chrono::Datelike;
    for (d, v) in dates.iter().zip(&y) {
        ds.push(d.format("%Y-%m-%d").to_string());
        values.push(*v);
        tags.push(forecast::HISTORY);
        years.push(d.year() as i64);
        months.push(d.month() as i64);
    }

    let mut cursor = last;
    for v in &predicted {
        cursor = cursor
            .checked_add_months(Months::new(1))
            .ok_or_else(|| DashError::Forecast("forecast horizon overflows the calendar".into()))?;
        ds.push(cursor.format("%Y-%m-%d").to_string());
        values.push(*v);
        tags.push(forecast::FORECAST);
        years.push(cursor.year() as i64);
        months.push(cursor.month() as i64);
    }

    Ok(DataFrame::new(vec![
        Column::new(forecast::DS.into(), ds),
        Column::new(forecast::Y.into(), values),
        Column::new(forecast::DATA_TYPE.into(), tags),
        Column::new(forecast::YEAR.into(), years),
        Column::new(forecast::MONTH.into(), months),
    ])?)
}

// ── Change metrics ──────────────────────────────────────────────────────────

struct CombinedRows {
    y: Vec<f64>,
    tag: Vec<String>,
    year: Vec<i64>,
    month: Vec<i64>,
}

fn combined_rows(combined: &DataFrame) -> Result<CombinedRows, DashError> {
    let sorted = combined.sort([forecast::DS], SortMultipleOptions::default())?;

    let y_cast = sorted
        .column(forecast::Y)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let y_ca = y_cast.f64()?;
    let tag_ca = sorted
        .column(forecast::DATA_TYPE)?
        .as_materialized_series()
        .str()?;
    let year_cast = sorted
        .column(forecast::YEAR)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let year_ca = year_cast.i64()?;
    let month_cast = sorted
        .column(forecast::MONTH)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let month_ca = month_cast.i64()?;

    let mut out = CombinedRows {
        y: Vec::new(),
        tag: Vec::new(),
        year: Vec::new(),
        month: Vec::new(),
    };
    for i in 0..sorted.height() {
        let (Some(y), Some(tag), Some(year), Some(month)) = (
            y_ca.get(i),
            tag_ca.get(i),
            year_ca.get(i),
            month_ca.get(i),
        ) else {
            continue;
        };
        out.y.push(y);
        out.tag.push(tag.to_string());
        out.year.push(year);
        out.month.push(month);
    }
    Ok(out)
}

/// Calendar month holding the single highest value across the combined
/// series, both tags included.
fn peak_month(rows: &CombinedRows) -> Result<i64, DashError> {
    let mut best: Option<(f64, i64)> = None;
    for (y, month) in rows.y.iter().zip(&rows.month) {
        match best {
            Some((b, _)) if *y <= b => {}
            _ => best = Some((*y, *month)),
        }
    }
    best.map(|(_, m)| m)
        .ok_or_else(|| DashError::Insufficient("series has no observations".into()))
}

/// Percentage change between the peak calendar month and the immediately
/// preceding month, within the most recent year carrying the requested tag.
pub fn month_over_month(combined: &DataFrame, tag: &str) -> Result<ChangeMetric, DashError> {
    let rows = combined_rows(combined)?;
    let peak = peak_month(&rows)?;

    let latest_year = rows
        .year
        .iter()
        .zip(&rows.tag)
        .filter(|(_, t)| t.as_str() == tag)
        .map(|(y, _)| *y)
        .max()
        .ok_or_else(|| DashError::Insufficient(format!("no rows tagged {tag}")))?;

    let mut previous: Option<f64> = None;
    let mut current: Option<f64> = None;
    for i in 0..rows.y.len() {
        if rows.tag[i] != tag || rows.year[i] != latest_year {
            continue;
        }
        if rows.month[i] == peak {
            current = Some(rows.y[i]);
        } else if rows.month[i] == peak - 1 {
            previous = Some(rows.y[i]);
        }
    }

    let (Some(prev), Some(cur)) = (previous, current) else {
        return Err(DashError::Insufficient(format!(
            "need both month {peak} and month {} in year {latest_year}",
            peak - 1
        )));
    };

    Ok(ChangeMetric {
        value: (cur - prev) / prev * 100.0,
        peak_month: peak as u32,
    })
}

/// Percentage change between the two most recent occurrences of the peak
/// calendar month, within the requested tag.
pub fn year_over_year(combined: &DataFrame, tag: &str) -> Result<ChangeMetric, DashError> {
    let rows = combined_rows(combined)?;
    let peak = peak_month(&rows)?;

    let qualifying: Vec<f64> = (0..rows.y.len())
        .filter(|&i| rows.tag[i] == tag && rows.month[i] == peak)
        .map(|i| rows.y[i])
        .collect();

    if qualifying.len() < 2 {
        return Err(DashError::Insufficient(format!(
            "need at least two occurrences of month {peak} tagged {tag}"
        )));
    }

    let cur = qualifying[qualifying.len() - 1];
    let prev = qualifying[qualifying.len() - 2];
    Ok(ChangeMetric {
        value: (cur - prev) / prev * 100.0,
        peak_month: peak as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::rainfall_series;

    /// Three years of monthly history, single peak in August, +10 per year.
    fn synthetic_combined() -> DataFrame {
        let mut ds = Vec::new();
        let mut y = Vec::new();
        let mut tag = Vec::new();
        let mut year = Vec::new();
        let mut month = Vec::new();

        for yr in 2019i64..=2021 {
            for m in 1i64..=12 {
                let base = match m {
                    8 => 50.0,
                    7 => 30.0,
                    _ => 10.0 + m as f64,
                };
                ds.push(format!("{yr:04}-{m:02}-01"));
                y.push(base + (yr - 2019) as f64 * 10.0);
                tag.push(forecast::HISTORY);
                year.push(yr);
                month.push(m);
            }
        }

        DataFrame::new(vec![
            Column::new(forecast::DS.into(), ds),
            Column::new(forecast::Y.into(), y),
            Column::new(forecast::DATA_TYPE.into(), tag),
            Column::new(forecast::YEAR.into(), year),
            Column::new(forecast::MONTH.into(), month),
        ])
        .unwrap()
    }

    #[test]
    fn mom_matches_hand_computed_value() {
        let out = month_over_month(&synthetic_combined(), forecast::HISTORY).unwrap();
        assert_eq!(out.peak_month, 8);
        // 2021: August 70, July 50 → +40%.
        assert!((out.value - 40.0).abs() < 0.01);
    }

    #[test]
    fn yoy_matches_hand_computed_value() {
        let out = year_over_year(&synthetic_combined(), forecast::HISTORY).unwrap();
        assert_eq!(out.peak_month, 8);
        // August 2021 = 70 vs August 2020 = 60 → +16.67%.
        assert!((out.value - 16.67).abs() < 0.01);
    }

    #[test]
    fn change_metrics_need_two_observations() {
        let single = synthetic_combined().head(Some(12));
        assert!(matches!(
            year_over_year(&single, forecast::HISTORY),
            Err(DashError::Insufficient(_))
        ));
        assert!(matches!(
            month_over_month(&single, forecast::FORECAST),
            Err(DashError::Insufficient(_))
        ));
    }

    #[test]
    fn overlapping_append_is_rejected() {
        let history = rainfall_series();
        assert!(matches!(
            append_rainfall(&history, &history),
            Err(DashError::AppendOrder(_))
        ));
    }

    #[test]
    fn strictly_later_append_extends_the_series() {
        let history = rainfall_series();
        let new = DataFrame::new(vec![
            Column::new("department".into(), vec!["ZOU".to_string()]),
            Column::new("date".into(), vec!["2022-01-01".to_string()]),
            Column::new("rainfall_qty".into(), vec![Some(31.0f64)]),
            Column::new("year".into(), vec![2022i64]),
            Column::new("month_name".into(), vec!["January".to_string()]),
            Column::new("month".into(), vec![1i64]),
        ])
        .unwrap();

        let combined = append_rainfall(&history, &new).unwrap();
        assert_eq!(combined.height(), history.height() + 1);

        let (dates, _) = department_series(&combined, "ZOU").unwrap();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(dates.last().copied(), NaiveDate::from_ymd_opt(2022, 1, 1));
    }

    #[test]
    fn forecast_stitches_history_and_horizon() {
        let history = rainfall_series();
        let combined = forecast_department(
            &history,
            "ZOU",
            6,
            None,
            &MstlRainfallModel::default(),
        )
        .unwrap();

        let tags: Vec<&str> = combined
            .column(forecast::DATA_TYPE)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        let n_history = tags.iter().filter(|t| **t == forecast::HISTORY).count();
        let n_forecast = tags.iter().filter(|t| **t == forecast::FORECAST).count();
        assert_eq!(n_history, 36);
        assert_eq!(n_forecast, 6);

        // The horizon continues at monthly frequency from the last actual.
        let ds: Vec<&str> = combined
            .column(forecast::DS)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ds[35], "2021-12-01");
        assert_eq!(ds[36], "2022-01-01");
        assert_eq!(ds[41], "2022-06-01");
    }
}
