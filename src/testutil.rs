//! Shared fixtures for the unit tests. Small hand-built frames that walk
//! the full ingest path, so every stage's fixture is the previous stage's
//! output.

use polars::prelude::*;

use crate::clean::clean_survey;
use crate::ingest::select_rename_filter;
use crate::rainfall::clean_rainfall;
use crate::reshape::products_long;

pub fn single_column_frame<T, P: ?Sized>(name: &str, values: T) -> DataFrame
where
    Series: NamedFrom<T, P>,
{
    DataFrame::new(vec![Series::new(name.into(), values).into_column()]).unwrap()
}

/// Five raw survey rows under the source variable names. The last row
/// carries a department outside the whitelist and is dropped by the
/// selection stage; the surviving four satisfy every cleaning
/// postcondition.
pub fn raw_survey_frame() -> DataFrame {
    DataFrame::new(vec![
        Column::new(
            "MEN_DEPARTURE".into(),
            vec![
                "DEPARTURE. ZOU",
                "DEPARTURE. ZOU",
                "DEPARTURE. MONO",
                "DEPARTURE. BORGOU",
                "SOMEWHERE ELSE",
            ],
        ),
        Column::new("HOUSEHOLD_ID".into(), vec![1i64, 2, 3, 4, 5]),
        Column::new("MEN_404".into(), vec!["M", "F", "M", "F", "M"]),
        Column::new("MEN_511".into(), vec![1i64, 2, 1, 2, 1]),
        Column::new("MEN_521".into(), vec![2i64, 1, 2, 1, 2]),
        Column::new("MEN_522".into(), vec![4i64, 4, 4, 4, 4]),
        Column::new("MEN_52311".into(), vec!["Cotton"; 5]),
        Column::new("MEN_52321".into(), vec![1i64; 5]),
        Column::new("MEN_52312".into(), vec!["Yam"; 5]),
        Column::new("MEN_52322".into(), vec![2i64; 5]),
        Column::new("MEN_52313".into(), vec!["Cocoa"; 5]),
        Column::new("MEN_52323".into(), vec![3i64; 5]),
        Column::new("MEN_52314".into(), vec!["Cassava"; 5]),
        Column::new("MEN_52324".into(), vec![4i64; 5]),
        Column::new("MEN_111".into(), vec![1i64, 2, 1, 2, 1]),
        Column::new(
            "MEN_1141".into(),
            vec![Some("River"), None, Some("Well"), Some("River"), None],
        ),
        Column::new("MEN_1221".into(), vec![10i64, 12, 8, 9, 11]),
        Column::new(
            "CMEN_12231".into(),
            vec!["0..4", "0.25", "0.5", "0.75", "0.1"],
        ),
        Column::new(
            "CMEN_12232".into(),
            vec!["0.6", "0..75", "0.5", "0.25", "0.9"],
        ),
        Column::new(
            "MEN_1251".into(),
            vec!["1,200", "35", "4;1", "2", "7"],
        ),
        Column::new("MEN_1611".into(), vec![2i64, 2, 1, 1, 2]),
        Column::new("MEN_1612".into(), vec![1i64, 1, 2, 2, 1]),
        Column::new("MEN_1621".into(), vec![2i64, 1, 1, 2, 2]),
        Column::new("MEN_1622".into(), vec![1i64, 2, 2, 1, 1]),
    ])
    .unwrap()
}

/// The raw fixture after column selection, under normalized identifiers.
pub fn cleanable_survey_frame() -> DataFrame {
    let selection = select_rename_filter(&raw_survey_frame());
    assert!(selection.is_selected(), "fixture must pass selection");
    selection.into_frame()
}

/// The fully cleaned wide table, product slot columns still present.
pub fn cleaned_survey_frame() -> DataFrame {
    let outcome = clean_survey(&cleanable_survey_frame());
    assert!(outcome.is_cleaned(), "fixture must pass cleaning");
    outcome.into_frame()
}

/// The household × product long table derived from the cleaned fixture.
pub fn products_frame() -> DataFrame {
    products_long(&cleaned_survey_frame()).unwrap()
}

/// Wide rainfall export: one row per community × year, months as columns,
/// with the summary columns, both prefix spellings and the excluded
/// community row present.
pub fn rainfall_wide_frame() -> DataFrame {
    let communities = vec![
        "DEPARTURE. ZOU",
        "DEPARTURE. ZOU",
        "DEAPRTURE. ZOU",
        "DEPARTURE. MONO",
        "BENIGN",
    ];
    let years = vec![2019i64, 2020, 2021, 2019, 2019];

    let mut columns = vec![
        Column::new("Communities".into(), communities),
        Column::new("Year".into(), years.clone()),
    ];

    for (m_idx, m_name) in crate::schema::rainfall::MONTH_NAMES.iter().enumerate() {
        let month = m_idx as f64 + 1.0;
        // Seasonal shape with a mild yearly drift, peak in August.
        let values: Vec<f64> = years
            .iter()
            .map(|y| {
                let seasonal = if m_idx == 7 { 180.0 } else { 40.0 + month * 8.0 };
                seasonal + (y - 2019) as f64 * 5.0
            })
            .collect();
        columns.push(Column::new((*m_name).into(), values));
    }

    columns.push(Column::new("Total ".into(), vec![900.0f64; 5]));
    columns.push(Column::new("Average".into(), vec![75.0f64; 5]));

    DataFrame::new(columns).unwrap()
}

/// The monthly rainfall series melted from the wide fixture: 48 rows,
/// ZOU covering 2019 through 2021 and MONO covering 2019.
pub fn rainfall_series() -> DataFrame {
    clean_rainfall(&rainfall_wide_frame()).unwrap()
}
