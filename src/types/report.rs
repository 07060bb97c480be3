//! Report records: the wide emissions schema persisted per company/year

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All emissions columns on the reports table. Each holds a numeric string
/// or the `"-"` placeholder. Order matches the schema definition.
pub const EMISSION_COLUMNS: &[&str] = &[
    "scope_1",
    "scope_2_market_based",
    "scope_3",
    "scope_1_total",
    "scope_1_company_vehicles",
    "scope_1_company_facilities",
    "scope_2_total",
    "scope_2_purchased_energy_location_based",
    "scope_2_purchased_energy_market_based",
    "scope_3_total",
    "scope_3_1_purchased_goods_and_services",
    "scope_3_2_capital_goods",
    "scope_3_3_fuel_and_energy_related_activities",
    "scope_3_4_upstream_transportation_and_distribution",
    "scope_3_5_waste_generated_in_operations",
    "scope_3_6_business_travel",
    "scope_3_7_employee_commuting",
    "scope_3_8_upstream_leased_assets",
    "scope_3_9_downstream_transportation_and_distribution",
    "scope_3_10_processing_of_sold_products",
    "scope_3_11_use_of_sold_products",
    "scope_3_12_end_of_life_treatment_of_sold_products",
    "scope_3_13_downstream_leased_assets",
    "franchises",
    "scope_3_15_investments",
    "scope_1_2",
    "scope_1_2_3",
    "biogenic_outside_scopes",
    "tot_1_2_3",
];

/// Placeholder value for emissions fields with no extracted data
pub const PLACEHOLDER: &str = "-";

/// A row of the reports table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_1_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_tsek: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_of_emissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Emissions columns, keyed by column name
    #[serde(flatten)]
    pub emissions: BTreeMap<String, String>,
}
