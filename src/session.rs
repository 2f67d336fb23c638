use polars::prelude::DataFrame;

use crate::derive::{DeriveGraph, Value};
use crate::error::DashError;
use crate::forecast::{self, MstlRainfallModel, SeasonalModel};
use crate::metrics::{self, Denominator};
use crate::schema::{forecast as fcst, survey};
use crate::store::SurveyStore;

pub const DEFAULT_HORIZON: i64 = 24;

/// A failed metric degrades to `Value::Empty` so one broken widget does
/// not take the page down. Structural errors inside the graph itself
/// still propagate.
fn soft(name: &str, result: Result<Value, DashError>) -> Result<Value, DashError> {
    match result {
        Ok(v) => Ok(v),
        Err(e) => {
            log::warn!("metric '{name}' unavailable: {e}");
            Ok(Value::Empty)
        }
    }
}

fn frame_arg(args: &[Value], i: usize) -> Result<&DataFrame, DashError> {
    args[i]
        .as_frame()
        .ok_or_else(|| DashError::InvalidData(format!("dependency {i} is not a frame")))
}

/// The overview dashboard state: three tables, a department selection,
/// and every widget value derived from them through the invalidation
/// graph. Changing an input recomputes only the widgets downstream of it.
pub struct OverviewSession {
    graph: DeriveGraph,
}

impl OverviewSession {
    pub fn from_frames(
        survey_df: DataFrame,
        products_df: DataFrame,
        rainfall_df: DataFrame,
    ) -> Self {
        let mut graph = DeriveGraph::new();

        let survey_in = graph.add_input("survey", Value::Frame(survey_df));
        let products_in = graph.add_input("products", Value::Frame(products_df));
        let rainfall_in = graph.add_input("rainfall", Value::Frame(rainfall_df));
        let department_in = graph.add_input("department", Value::Empty);
        let horizon_in = graph.add_input("horizon", Value::Int(DEFAULT_HORIZON));

        graph.add_derived(
            "departments",
            &[survey_in],
            Box::new(|args| {
                soft(
                    "departments",
                    metrics::unique_values(frame_arg(args, 0)?, survey::DEPARTMENT, None)
                        .map(Value::List),
                )
            }),
        );

        // No selection means the whole country.
        let dept_survey = graph.add_derived(
            "dept_survey",
            &[survey_in, department_in],
            Box::new(|args| {
                let df = frame_arg(args, 0)?;
                match args[1].as_text() {
                    Some(dep) => Ok(Value::Frame(metrics::filter_department(df, dep)?)),
                    None => Ok(Value::Frame(df.clone())),
                }
            }),
        );

        graph.add_derived(
            "household_count",
            &[dept_survey],
            Box::new(|args| {
                soft(
                    "household_count",
                    metrics::count_households(frame_arg(args, 0)?).map(Value::Int),
                )
            }),
        );

        graph.add_derived(
            "avg_processed",
            &[dept_survey],
            Box::new(|args| {
                soft(
                    "avg_processed",
                    metrics::avg_processed_products(frame_arg(args, 0)?).map(Value::Real),
                )
            }),
        );

        graph.add_derived(
            "irrigation_pct",
            &[dept_survey],
            Box::new(|args| {
                soft(
                    "irrigation_pct",
                    metrics::irrigation_share(frame_arg(args, 0)?).map(Value::Real),
                )
            }),
        );

        graph.add_derived(
            "water_source",
            &[dept_survey],
            Box::new(|args| {
                soft(
                    "water_source",
                    metrics::top_water_source(frame_arg(args, 0)?).map(Value::Text),
                )
            }),
        );

        graph.add_derived(
            "crop_counts",
            &[survey_in, products_in],
            Box::new(|args| {
                soft(
                    "crop_counts",
                    metrics::crop_department_count(frame_arg(args, 0)?, frame_arg(args, 1)?)
                        .map(Value::Frame),
                )
            }),
        );

        graph.add_derived(
            "irrigation_by_department",
            &[survey_in],
            Box::new(|args| {
                soft(
                    "irrigation_by_department",
                    metrics::irrigation_by_department(frame_arg(args, 0)?).map(Value::Frame),
                )
            }),
        );

        graph.add_derived(
            "irrigated_crops",
            &[dept_survey, products_in],
            Box::new(|args| {
                soft(
                    "irrigated_crops",
                    metrics::irrigation_by_crop(
                        frame_arg(args, 0)?,
                        frame_arg(args, 1)?,
                        Denominator::default(),
                    )
                    .map(Value::Frame),
                )
            }),
        );

        graph.add_derived(
            "roots_tubers",
            &[survey_in],
            Box::new(|args| {
                soft(
                    "roots_tubers",
                    metrics::roots_tubers_share(frame_arg(args, 0)?).map(Value::Frame),
                )
            }),
        );

        let forecast_node = graph.add_derived(
            "forecast",
            &[rainfall_in, department_in, horizon_in],
            Box::new(move |args| {
                let rainfall_df = frame_arg(args, 0)?;
                let Some(department) = args[1].as_text() else {
                    return Ok(Value::Empty);
                };
                let horizon = match args[2] {
                    Value::Int(h) if h > 0 => h as usize,
                    _ => DEFAULT_HORIZON as usize,
                };
                let model = MstlRainfallModel::default();
                soft(
                    "forecast",
                    forecast::forecast_department(
                        rainfall_df,
                        department,
                        horizon,
                        None,
                        &model as &dyn SeasonalModel,
                    )
                    .map(Value::Frame),
                )
            }),
        );

        // The change metrics describe the observed series, not the
        // projection.
        graph.add_derived(
            "mom",
            &[forecast_node],
            Box::new(|args| {
                let Some(combined) = args[0].as_frame() else {
                    return Ok(Value::Empty);
                };
                soft(
                    "mom",
                    forecast::month_over_month(combined, fcst::HISTORY)
                        .map(|m| Value::Real(m.value)),
                )
            }),
        );

        graph.add_derived(
            "yoy",
            &[forecast_node],
            Box::new(|args| {
                let Some(combined) = args[0].as_frame() else {
                    return Ok(Value::Empty);
                };
                soft(
                    "yoy",
                    forecast::year_over_year(combined, fcst::HISTORY)
                        .map(|m| Value::Real(m.value)),
                )
            }),
        );

        Self { graph }
    }

    pub fn from_store(store: &SurveyStore) -> Result<Self, DashError> {
        Ok(Self::from_frames(
            store.read_survey()?,
            store.read_products()?,
            store.read_rainfall()?,
        ))
    }

    /// Select a department, or `None` for the whole country.
    pub fn set_department(&mut self, department: Option<&str>) -> Result<(), DashError> {
        let value = match department {
            Some(d) => Value::Text(d.to_string()),
            None => Value::Empty,
        };
        self.graph.set_input("department", value)
    }

    pub fn set_horizon(&mut self, horizon: i64) -> Result<(), DashError> {
        self.graph.set_input("horizon", Value::Int(horizon))
    }

    /// Pull one widget value by node name.
    pub fn value(&mut self, name: &str) -> Result<Value, DashError> {
        self.graph.evaluate(name)
    }
}
