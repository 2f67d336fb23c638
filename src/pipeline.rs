use std::path::PathBuf;

use polars::prelude::*;

use crate::error::DashError;
use crate::ingest;
use crate::rainfall;
use crate::reshape;
use crate::store::{StoreConfig, SurveyStore};

/// End-to-end import settings: where the survey CSV lives and where the
/// embedded database goes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_csv: PathBuf,
    pub store: StoreConfig,
}

/// What the import actually did, stage by stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Whether column selection applied or fell back to the raw table.
    pub selected: bool,
    /// Whether the cleaning pass applied or degraded to its input.
    pub cleaned: bool,
    pub survey_rows: usize,
    pub product_rows: usize,
    /// Whether both tables were written to the store.
    pub persisted: bool,
}

/// Run the survey import: read, select, clean + reshape, persist.
///
/// Persistence only happens when the cleaning pass applied and both
/// output tables are non-empty; a degraded run still returns a report so
/// the caller can see which stage fell through.
pub fn run_import(config: &PipelineConfig) -> Result<PipelineReport, DashError> {
    let raw = ingest::read_survey_csv(&config.input_csv)?;
    log::info!(
        "read {} rows x {} columns from {}",
        raw.height(),
        raw.width(),
        config.input_csv.display()
    );

    let selection = ingest::select_rename_filter(&raw);
    let selected = selection.is_selected();
    let frame = selection.into_frame();

    let output = reshape::run_survey_transformation(&frame)?;

    let persisted =
        output.cleaned && output.survey.height() > 0 && output.products.height() > 0;
    if persisted {
        let mut store = SurveyStore::open(&config.store)?;
        store.write_survey(&output.survey)?;
        store.write_products(&output.products)?;
        log::info!(
            "persisted {} survey rows and {} product rows",
            output.survey.height(),
            output.products.height()
        );
    } else {
        log::warn!("import degraded or produced an empty table, nothing persisted");
    }

    Ok(PipelineReport {
        selected,
        cleaned: output.cleaned,
        survey_rows: output.survey.height(),
        product_rows: output.products.height(),
        persisted,
    })
}

/// Import the wide rainfall workbook export into the store.
pub fn import_rainfall(store: &StoreConfig, input_csv: &std::path::Path) -> Result<usize, DashError> {
    let raw = ingest::read_survey_csv(input_csv)?;
    let series = rainfall::clean_rainfall(&raw)?;

    let mut db = SurveyStore::open(store)?;
    db.write_rainfall(&series)?;
    log::info!("persisted {} rainfall observations", series.height());
    Ok(series.height())
}

/// Clean one already-loaded survey table without touching the store.
/// Exposed for callers that manage persistence themselves.
pub fn transform_only(df: &DataFrame) -> Result<reshape::TransformOutput, DashError> {
    reshape::run_survey_transformation(df)
}
