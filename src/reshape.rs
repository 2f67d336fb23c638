use polars::prelude::*;

use crate::clean::{clean_survey, CleanOutcome};
use crate::error::DashError;
use crate::schema::products;

const VAR_NAME: &str = "var_name";
const VAR_CODE: &str = "var_code";

/// Output of the coupled cleaning + reshaping run.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Cleaned wide table with the product slot columns removed.
    pub survey: DataFrame,
    /// Household × product long table; empty when alignment failed.
    pub products: DataFrame,
    /// Whether the cleaning pass applied or degraded to the input.
    pub cleaned: bool,
}

/// Parse the trailing slot index from a column identifier,
/// e.g. `processed_product_code_3` → 3.
pub fn slot_index(identifier: &str) -> Option<usize> {
    identifier.rsplit('_').next()?.parse().ok()
}

/// Product-name columns of the wide table, in schema order.
pub fn name_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .iter()
        .filter(|c| c.contains(products::NAME_MARKER))
        .map(|c| c.to_string())
        .collect()
}

/// Product-code columns of the wide table, in schema order.
pub fn code_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .iter()
        .filter(|c| c.contains(products::CODE_MARKER))
        .map(|c| c.to_string())
        .collect()
}

/// Melt one group of slot columns to long form keyed by household.
///
/// Row order is slot-major then household-major, identically on the name
/// and code side, so the two melts can be aligned positionally.
pub fn melt_product_slots(
    df: &DataFrame,
    columns: &[String],
    var_column: &str,
    value_column: &str,
) -> Result<DataFrame, DashError> {
    let mut out: Option<DataFrame> = None;

    for colname in columns {
        let mut part = df.select([products::HOUSEHOLD_ID, colname.as_str()])?;
        part.rename(colname, value_column.into())?;
        part.insert_column(
            1,
            Column::new(var_column.into(), vec![colname.clone(); df.height()]),
        )?;

        out = Some(match out {
            None => part,
            Some(acc) => acc.vstack(&part)?,
        });
    }

    out.ok_or_else(|| DashError::MissingColumn("no product slot columns".into()))
}

/// Combine the two melted tables side by side after the structural check:
/// equal expected row counts, per-row household equality, and per-row slot
/// index equality parsed from the column identifiers.
pub fn align_name_code(
    names: &DataFrame,
    codes: &DataFrame,
    households: usize,
) -> Result<DataFrame, DashError> {
    let expected = households * products::SLOTS;
    if names.height() != expected || codes.height() != expected {
        return Err(DashError::Validation(format!(
            "expected {expected} melted rows, got {} names and {} codes",
            names.height(),
            codes.height()
        )));
    }

    let hh_names = names.column(products::HOUSEHOLD_ID)?.as_materialized_series();
    let hh_codes = codes.column(products::HOUSEHOLD_ID)?.as_materialized_series();
    if !hh_names.equals_missing(hh_codes) {
        return Err(DashError::Validation(
            "household order differs between name and code melts".into(),
        ));
    }

    let var_names = names.column(VAR_NAME)?.as_materialized_series().str()?;
    let var_codes = codes.column(VAR_CODE)?.as_materialized_series().str()?;
    for i in 0..expected {
        let slot_n = var_names.get(i).and_then(slot_index);
        let slot_c = var_codes.get(i).and_then(slot_index);
        match (slot_n, slot_c) {
            (Some(a), Some(b)) if a == b => {}
            _ => {
                return Err(DashError::Validation(format!(
                    "slot index mismatch at melted row {i}"
                )))
            }
        }
    }

    let combined = DataFrame::new(vec![
        hh_names.clone().into_column(),
        names
            .column(VAR_NAME)?
            .as_materialized_series()
            .clone()
            .with_name(products::PRODUCT.into())
            .into_column(),
        names
            .column(products::CROP_NAME)?
            .as_materialized_series()
            .clone()
            .into_column(),
        codes
            .column(products::CROP_CODE)?
            .as_materialized_series()
            .clone()
            .into_column(),
    ])?;

    Ok(combined)
}

/// Melt the product name/code slot groups into the household × product
/// long table.
///
/// A structural-consistency violation degrades to an empty table rather
/// than fabricating incorrect name/code pairings.
pub fn products_long(df: &DataFrame) -> Result<DataFrame, DashError> {
    let names = name_columns(df);
    let codes = code_columns(df);

    let aligned = (|| -> Result<DataFrame, DashError> {
        let melted_names =
            melt_product_slots(df, &names, VAR_NAME, products::CROP_NAME)?;
        let melted_codes =
            melt_product_slots(df, &codes, VAR_CODE, products::CROP_CODE)?;
        align_name_code(&melted_names, &melted_codes, df.height())
    })();

    let combined = match aligned {
        Ok(combined) => combined,
        Err(e) => {
            log::warn!("product reshape degraded to empty table: {e}");
            return empty_products();
        }
    };

    // Preserve leading-zero category codes as sortable-looking strings.
    let code_cast = combined
        .column(products::CROP_CODE)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let prefixed: Vec<Option<String>> = code_cast
        .str()?
        .into_iter()
        .map(|v| v.map(|c| format!("0{c}")))
        .collect();

    let mut out = combined;
    out.with_column(Series::new(products::CROP_CODE.into(), prefixed))?;

    let crops = Series::new(
        "crops".into(),
        products::RECOGNIZED_CROPS.map(String::from).to_vec(),
    );
    let out = out
        .lazy()
        .filter(
            col(products::CROP_NAME)
                .str()
                .to_lowercase()
                .is_in(lit(crops), false),
        )
        .collect()?;

    Ok(out)
}

fn empty_products() -> Result<DataFrame, DashError> {
    Ok(DataFrame::new(vec![
        Column::new(products::HOUSEHOLD_ID.into(), Vec::<i64>::new()),
        Column::new(products::PRODUCT.into(), Vec::<String>::new()),
        Column::new(products::CROP_NAME.into(), Vec::<String>::new()),
        Column::new(products::CROP_CODE.into(), Vec::<String>::new()),
    ])?)
}

/// Remove the product slot columns from the wide table.
pub fn drop_product_columns(df: &DataFrame) -> Result<DataFrame, DashError> {
    let doomed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .filter(|c| c.contains("processed_product") || c.contains("transformed_product_code"))
        .map(|c| c.to_string())
        .collect();
    Ok(df.drop_many(doomed))
}

/// Clean the wide table, extract the product long table, and drop the slot
/// columns from the wide result.
pub fn run_survey_transformation(df: &DataFrame) -> Result<TransformOutput, DashError> {
    let outcome = clean_survey(df);
    let cleaned = matches!(outcome, CleanOutcome::Cleaned(_));
    let frame = outcome.into_frame();

    let products = products_long(&frame)?;
    let survey = drop_product_columns(&frame)?;

    Ok(TransformOutput {
        survey,
        products,
        cleaned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::cleaned_survey_frame;

    #[test]
    fn slot_indices_parse_from_identifiers() {
        assert_eq!(slot_index("processed_product_name_1"), Some(1));
        assert_eq!(slot_index("transformed_product_code_3"), Some(3));
        assert_eq!(slot_index("department"), None);
    }

    #[test]
    fn aligned_input_produces_four_rows_per_household() {
        let df = cleaned_survey_frame();
        let out = products_long(&df).unwrap();
        // Every slot in the fixture holds a recognized crop.
        assert_eq!(out.height(), df.height() * products::SLOTS);

        let codes: Vec<&str> = out
            .column(products::CROP_CODE)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(codes.iter().all(|c| c.starts_with('0')));
    }

    #[test]
    fn unrecognized_crops_are_filtered_out() {
        let mut df = cleaned_survey_frame();
        let height = df.height();
        df.with_column(Column::new(
            "processed_product_name_1".into(),
            vec!["Maize".to_string(); height],
        ))
        .unwrap();

        let out = products_long(&df).unwrap();
        assert_eq!(out.height(), height * (products::SLOTS - 1));
    }

    #[test]
    fn mismatched_slot_pairing_yields_empty_table() {
        let mut df = cleaned_survey_frame();
        // Break the pairing: code slot 1 now claims to be slot 9.
        df.rename("processed_product_code_1", "processed_product_code_9".into())
            .unwrap();

        let out = products_long(&df).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn missing_slot_column_yields_empty_table() {
        let df = cleaned_survey_frame()
            .drop("processed_product_name_4")
            .unwrap();
        let out = products_long(&df).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn transformation_drops_slot_columns_from_wide_table() {
        let df = cleaned_survey_frame();
        let out = run_survey_transformation(&df).unwrap();
        assert!(out.cleaned);
        assert!(out
            .survey
            .get_column_names_str()
            .iter()
            .all(|c| !c.contains("product_code") && !c.contains("product_name")));
    }
}
