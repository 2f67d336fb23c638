/// Column-name constants for the household survey schema.
/// Single source of truth for every module in the crate.

// ── Raw survey extract ──────────────────────────────────────────────────────
pub mod raw {
    /// Source variable names, in the order they are selected from the CSV.
    pub const SELECT: [&str; 24] = [
        "MEN_DEPARTURE",
        "HOUSEHOLD_ID",
        "MEN_404",
        "MEN_511",
        "MEN_521",
        "MEN_522",
        "MEN_52311",
        "MEN_52321",
        "MEN_52312",
        "MEN_52322",
        "MEN_52313",
        "MEN_52323",
        "MEN_52314",
        "MEN_52324",
        "MEN_111",
        "MEN_1141",
        "MEN_1221",
        "CMEN_12231",
        "CMEN_12232",
        "MEN_1251",
        "MEN_1611",
        "MEN_1612",
        "MEN_1621",
        "MEN_1622",
    ];

    /// Human-readable target labels, 1:1 with SELECT. Normalized to
    /// lowercase snake_case identifiers before use.
    pub const RENAME: [&str; 24] = [
        "Department",
        "Household ID",
        "Gender of head of household",
        "Crop production",
        "Processing of agricultural products",
        "Number of products processed",
        "Processed product name 1",
        "Processed product code 1",
        "Processed product name 2",
        "Processed product code 2",
        "Processed product name 3",
        "Transformed product code 3",
        "Processed product name 4",
        "Processed product code 4",
        "Irrigation practice on household farm",
        "Source of irrigation water used",
        "Number of roots and tubers used",
        "Share of roots and tubers consumed",
        "Share of roots and tubers sold",
        "Number of industrial crops grown",
        "Use of mineral fertilizers by men",
        "Use of mineral fertilizers by women",
        "Use of organic fertilizers by men",
        "Use of organic fertilizers by women",
    ];

    /// Department values accepted from the raw extract, prefix included.
    pub const DEPARTMENTS: [&str; 12] = [
        "DEPARTURE. BORGOU",
        "DEPARTURE. ALIBORI",
        "DEPARTURE. ATACORA",
        "DEPARTURE. DONGA",
        "DEPARTURE. ZOU",
        "DEPARTURE. HILLS",
        "DEPARTURE. MONO",
        "DEPARTURE. COUFFO",
        "DEPARTURE. OUEME",
        "DEPARTURE. PLATEAU",
        "DEPARTURE. ATLANTIC",
        "DEPARTURE. LITTORAL",
    ];

    pub const DEPARTMENT_PREFIX: &str = "DEPARTURE. ";

    /// Minimum column count for a selection to be accepted.
    pub const MIN_COLUMNS: usize = 24;
}

// ── Cleaned wide table ──────────────────────────────────────────────────────
pub mod survey {
    pub const DEPARTMENT: &str = "department";
    pub const HOUSEHOLD_ID: &str = "household_id";
    pub const GENDER: &str = "gender_of_head_of_household";
    pub const N_PRODUCTS: &str = "number_of_products_processed";
    pub const IRRIGATION: &str = "irrigation_practice_on_household_farm";
    pub const WATER_SOURCE: &str = "source_of_irrigation_water_used";
    pub const RT_CONSUMED: &str = "share_of_roots_and_tubers_consumed";
    pub const RT_SOLD: &str = "share_of_roots_and_tubers_sold";

    /// Yes/No questions recoded to {0, 1}.
    pub const BINARY: [&str; 7] = [
        "crop_production",
        "processing_of_agricultural_products",
        "irrigation_practice_on_household_farm",
        "use_of_mineral_fertilizers_by_men",
        "use_of_mineral_fertilizers_by_women",
        "use_of_organic_fertilizers_by_men",
        "use_of_organic_fertilizers_by_women",
    ];

    pub const TO_INT: [&str; 7] = [
        "number_of_products_processed",
        "processed_product_code_1",
        "processed_product_code_2",
        "transformed_product_code_3",
        "processed_product_code_4",
        "number_of_roots_and_tubers_used",
        "number_of_industrial_crops_grown",
    ];

    pub const TO_FLOAT: [&str; 2] = [
        "share_of_roots_and_tubers_consumed",
        "share_of_roots_and_tubers_sold",
    ];

    /// Sentinel for a missing water source. A real value, not a null, so it
    /// participates in equality filters downstream.
    pub const WATER_NA: &str = "NA";

    pub const MALE: &str = "Male";
    pub const FEMALE: &str = "Female";
}

// ── Product long table ──────────────────────────────────────────────────────
pub mod products {
    pub const HOUSEHOLD_ID: &str = "household_id";
    pub const PRODUCT: &str = "product";
    pub const CROP_NAME: &str = "crop_name";
    pub const CROP_CODE: &str = "crop_code";

    /// Number of parallel name/code slots in the wide table.
    pub const SLOTS: usize = 4;

    /// Substring marking a product-name column.
    pub const NAME_MARKER: &str = "processed_product_name";
    /// Substring marking a product-code column. Matches both the
    /// `processed_product_code_*` columns and the `transformed_product_code_3`
    /// spelling in the source schema.
    pub const CODE_MARKER: &str = "product_code";

    /// Crops retained in the long table, matched case-insensitively.
    pub const RECOGNIZED_CROPS: [&str; 4] = ["cotton", "yam", "cocoa", "cassava"];
}

// ── Monthly rainfall series ─────────────────────────────────────────────────
pub mod rainfall {
    pub const DEPARTMENT: &str = "department";
    pub const DATE: &str = "date";
    pub const QTY: &str = "rainfall_qty";
    pub const YEAR: &str = "year";
    pub const MONTH_NAME: &str = "month_name";
    pub const MONTH: &str = "month";

    /// Raw wide-format columns.
    pub const RAW_COMMUNITIES: &str = "Communities";
    pub const RAW_YEAR: &str = "Year";
    /// The trailing space is present in the source file.
    pub const RAW_TOTAL: &str = "Total ";
    pub const RAW_AVERAGE: &str = "Average";

    pub const MONTH_NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    /// A misspelled prefix variant occurs in the rainfall source.
    pub const PREFIXES: [&str; 2] = ["DEPARTURE.", "DEAPRTURE."];

    /// Community row excluded from the series.
    pub const EXCLUDED: &str = "BENIGN";
}

// ── Forecast series ─────────────────────────────────────────────────────────
pub mod forecast {
    pub const DS: &str = "ds";
    pub const Y: &str = "y";
    pub const DATA_TYPE: &str = "data_type";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";

    pub const HISTORY: &str = "History";
    pub const FORECAST: &str = "Forecast";
}

// ── Database tables ─────────────────────────────────────────────────────────
pub mod tables {
    pub const IRRIGATION: &str = "irrigation";
    pub const PROD_CODE_NAME: &str = "prod_code_name";
    pub const RAINFALL_QTY: &str = "rainfall_qty";
}
