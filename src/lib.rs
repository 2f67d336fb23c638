//! Core of the agricultural household survey dashboard: CSV ingest,
//! cleaning and reshaping, embedded persistence, dashboard metrics and
//! rainfall forecasting, wired together through an explicit dependency
//! graph.

pub mod clean;
pub mod derive;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod rainfall;
pub mod reshape;
pub mod schema;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use clean::{clean_survey, CleanOutcome};
pub use derive::{DeriveGraph, Value};
pub use error::DashError;
pub use forecast::{ChangeMetric, MstlRainfallModel, SeasonalModel};
pub use ingest::{read_survey_csv, select_rename_filter, Selection};
pub use metrics::Denominator;
pub use pipeline::{run_import, PipelineConfig, PipelineReport};
pub use reshape::{run_survey_transformation, TransformOutput};
pub use session::OverviewSession;
pub use store::{StoreConfig, SurveyStore};
