use polars::prelude::*;

use crate::error::DashError;
use crate::schema::rainfall;

/// Melt the wide rainfall CSV (one row per community × year, months as
/// columns) into the monthly series shape:
/// department, date, rainfall_qty, year, month_name, month.
///
/// Drops the "Total "/"Average" summary columns, strips both spellings of
/// the department prefix, and discards the excluded community row. The
/// date is carried as an ISO `YYYY-MM-01` string so lexicographic order
/// is chronological order.
pub fn clean_rainfall(raw: &DataFrame) -> Result<DataFrame, DashError> {
    let df = raw.drop_many([rainfall::RAW_TOTAL, rainfall::RAW_AVERAGE]);

    let communities = df
        .column(rainfall::RAW_COMMUNITIES)
        .map_err(|_| DashError::MissingColumn(rainfall::RAW_COMMUNITIES.into()))?
        .as_materialized_series()
        .str()?;
    let years_cast = df
        .column(rainfall::RAW_YEAR)
        .map_err(|_| DashError::MissingColumn(rainfall::RAW_YEAR.into()))?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let years = years_cast.i64()?;

    let mut dep_out: Vec<String> = Vec::new();
    let mut date_out: Vec<String> = Vec::new();
    let mut qty_out: Vec<Option<f64>> = Vec::new();
    let mut year_out: Vec<i64> = Vec::new();
    let mut month_name_out: Vec<String> = Vec::new();
    let mut month_out: Vec<i64> = Vec::new();

    for (m_idx, m_name) in rainfall::MONTH_NAMES.iter().enumerate() {
        let month = m_idx as i64 + 1;
        let qty_cast = df
            .column(m_name)
            .map_err(|_| DashError::MissingColumn(m_name.to_string()))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let qty = qty_cast.f64()?;

        for i in 0..df.height() {
            let Some(community) = communities.get(i) else {
                continue;
            };
            let Some(year) = years.get(i) else {
                continue;
            };

            let mut department = community.to_string();
            for prefix in rainfall::PREFIXES {
                department = department.replace(prefix, "");
            }
            let department = department.trim().to_string();
            if department == rainfall::EXCLUDED {
                continue;
            }

            dep_out.push(department);
            date_out.push(format!("{year:04}-{month:02}-01"));
            qty_out.push(qty.get(i));
            year_out.push(year);
            month_name_out.push(m_name.to_string());
            month_out.push(month);
        }
    }

    Ok(DataFrame::new(vec![
        Column::new(rainfall::DEPARTMENT.into(), dep_out),
        Column::new(rainfall::DATE.into(), date_out),
        Column::new(rainfall::QTY.into(), qty_out),
        Column::new(rainfall::YEAR.into(), year_out),
        Column::new(rainfall::MONTH_NAME.into(), month_name_out),
        Column::new(rainfall::MONTH.into(), month_out),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::rainfall_wide_frame;

    #[test]
    fn melts_months_and_strips_prefixes() {
        let out = clean_rainfall(&rainfall_wide_frame()).unwrap();

        // 4 community×year rows survive the exclusion, each melted 12 ways.
        assert_eq!(out.height(), 4 * 12);

        let departments: Vec<&str> = out
            .column(rainfall::DEPARTMENT)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(departments.iter().all(|d| *d == "ZOU" || *d == "MONO"));
    }

    #[test]
    fn dates_are_iso_month_starts() {
        let out = clean_rainfall(&rainfall_wide_frame()).unwrap();
        let dates: Vec<&str> = out
            .column(rainfall::DATE)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(dates.contains(&"2019-01-01"));
        assert!(dates.contains(&"2021-12-01"));
        assert!(dates.iter().all(|d| d.len() == 10 && d.ends_with("-01")));
    }

    #[test]
    fn summary_columns_are_not_required() {
        let trimmed = rainfall_wide_frame()
            .drop(rainfall::RAW_TOTAL)
            .unwrap()
            .drop(rainfall::RAW_AVERAGE)
            .unwrap();
        assert!(clean_rainfall(&trimmed).is_ok());
    }
}
