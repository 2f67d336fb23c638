use std::path::Path;

use polars::prelude::*;

use crate::error::DashError;
use crate::schema::raw;

/// Outcome of the column selection stage.
///
/// Schema problems are a soft failure: the caller receives the original
/// table untouched and downstream stages must tolerate the mismatch.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Columns selected, renamed and department-filtered.
    Selected(DataFrame),
    /// Selection failed; the unmodified input is passed through.
    Raw(DataFrame),
}

impl Selection {
    pub fn frame(&self) -> &DataFrame {
        match self {
            Selection::Selected(df) | Selection::Raw(df) => df,
        }
    }

    pub fn into_frame(self) -> DataFrame {
        match self {
            Selection::Selected(df) | Selection::Raw(df) => df,
        }
    }

    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected(_))
    }
}

/// Read a survey CSV with schema inference and trimmed column names.
pub fn read_survey_csv(path: &Path) -> Result<DataFrame, DashError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Normalize a human-readable label to a snake_case identifier.
pub fn normalize_identifier(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// Select the fixed raw columns in order, rename them to normalized
/// identifiers and restrict rows to the department whitelist.
///
/// Falls back to the unmodified input when the source columns are missing,
/// the filter leaves zero rows, or fewer than the minimum column count
/// survives.
pub fn select_rename_filter(df: &DataFrame) -> Selection {
    match try_select(df) {
        Ok(selected) => Selection::Selected(selected),
        Err(e) => {
            log::warn!("column selection degraded to raw table: {e}");
            Selection::Raw(df.clone())
        }
    }
}

fn try_select(df: &DataFrame) -> Result<DataFrame, DashError> {
    for name in raw::SELECT {
        if df.column(name).is_err() {
            return Err(DashError::MissingColumn(name.to_string()));
        }
    }

    let selected = df.select(raw::SELECT)?;

    let targets: Vec<String> = raw::RENAME.iter().map(|l| normalize_identifier(l)).collect();
    let old: Vec<&str> = raw::SELECT.to_vec();
    let new: Vec<&str> = targets.iter().map(|s| s.as_str()).collect();
    let renamed = selected.lazy().rename(old, new, true).collect()?;

    let departments = Series::new(
        "allowed".into(),
        raw::DEPARTMENTS
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>(),
    );
    let filtered = renamed
        .lazy()
        .filter(col(crate::schema::survey::DEPARTMENT).is_in(lit(departments), false))
        .collect()?;

    if filtered.height() == 0 {
        return Err(DashError::Validation(
            "selection cannot have zero rows".into(),
        ));
    }
    if filtered.width() < raw::MIN_COLUMNS {
        return Err(DashError::Validation(format!(
            "selection cannot have fewer than {} columns",
            raw::MIN_COLUMNS
        )));
    }

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::survey;
    use crate::testutil::raw_survey_frame;

    #[test]
    fn selects_renames_and_filters() {
        let df = raw_survey_frame();
        let out = select_rename_filter(&df);
        assert!(out.is_selected());

        let frame = out.frame();
        assert_eq!(frame.width(), raw::MIN_COLUMNS);
        assert!(frame.column(survey::DEPARTMENT).is_ok());
        assert!(frame.column(survey::HOUSEHOLD_ID).is_ok());
        // The row with a department outside the whitelist is dropped.
        assert_eq!(frame.height(), raw_survey_frame().height() - 1);
    }

    #[test]
    fn missing_columns_fall_back_to_raw() {
        let df = raw_survey_frame().drop("MEN_404").unwrap();
        let out = select_rename_filter(&df);
        assert!(!out.is_selected());
        assert_eq!(out.frame().width(), df.width());
    }

    #[test]
    fn unknown_departments_only_fall_back_to_raw() {
        let df = raw_survey_frame();
        let height = df.height();
        let replaced = Column::new(
            "MEN_DEPARTURE".into(),
            vec!["ELSEWHERE".to_string(); height],
        );
        let mut df = df;
        df.with_column(replaced).unwrap();

        let out = select_rename_filter(&df);
        assert!(!out.is_selected());
    }

    #[test]
    fn labels_normalize_to_snake_case() {
        assert_eq!(
            normalize_identifier("Gender of head of household"),
            "gender_of_head_of_household"
        );
        assert_eq!(normalize_identifier(" Household ID "), "household_id");
    }
}
