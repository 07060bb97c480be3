//! Emissions category definitions
//!
//! Each category owns a disjoint set of report columns, a retrieval query
//! used to find relevant passages, and a completion prompt instructing the
//! model to answer with a fixed-key JSON object.

use std::collections::BTreeMap;

use crate::types::report::PLACEHOLDER;

/// One retrieval-augmented extraction category
pub struct Category {
    pub name: &'static str,
    /// Report columns this category fills
    pub keys: &'static [&'static str],
    /// Keyword query used for vector retrieval
    pub query: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "scope summary",
        keys: &["scope_1", "scope_2_market_based", "scope_3"],
        query: "total greenhouse gas emissions scope 1 scope 2 market-based scope 3 tCO2e summary table",
    },
    Category {
        name: "scope 1 total",
        keys: &["scope_1_total"],
        query: "scope 1 total direct greenhouse gas emissions tCO2e",
    },
    Category {
        name: "scope 1 company vehicles",
        keys: &["scope_1_company_vehicles"],
        query: "scope 1 emissions company vehicles fleet fuel combustion",
    },
    Category {
        name: "scope 1 company facilities",
        keys: &["scope_1_company_facilities"],
        query: "scope 1 emissions company facilities stationary combustion heating",
    },
    Category {
        name: "scope 2 total",
        keys: &["scope_2_total"],
        query: "scope 2 total indirect emissions purchased energy tCO2e",
    },
    Category {
        name: "scope 2 location-based",
        keys: &["scope_2_purchased_energy_location_based"],
        query: "scope 2 purchased electricity location-based emissions",
    },
    Category {
        name: "scope 2 market-based",
        keys: &["scope_2_purchased_energy_market_based"],
        query: "scope 2 purchased electricity market-based emissions",
    },
    Category {
        name: "scope 3 total",
        keys: &["scope_3_total"],
        query: "scope 3 total value chain indirect emissions tCO2e",
    },
    Category {
        name: "scope 3.1 purchased goods and services",
        keys: &["scope_3_1_purchased_goods_and_services"],
        query: "scope 3 category 1 purchased goods and services emissions",
    },
    Category {
        name: "scope 3.2 capital goods",
        keys: &["scope_3_2_capital_goods"],
        query: "scope 3 category 2 capital goods emissions",
    },
    Category {
        name: "scope 3.3 fuel and energy related activities",
        keys: &["scope_3_3_fuel_and_energy_related_activities"],
        query: "scope 3 category 3 fuel and energy related activities emissions",
    },
    Category {
        name: "scope 3.4 upstream transportation",
        keys: &["scope_3_4_upstream_transportation_and_distribution"],
        query: "scope 3 category 4 upstream transportation and distribution emissions",
    },
    Category {
        name: "scope 3.5 waste",
        keys: &["scope_3_5_waste_generated_in_operations"],
        query: "scope 3 category 5 waste generated in operations emissions",
    },
    Category {
        name: "scope 3.6 business travel",
        keys: &["scope_3_6_business_travel"],
        query: "scope 3 category 6 business travel emissions flights",
    },
    Category {
        name: "scope 3.7 employee commuting",
        keys: &["scope_3_7_employee_commuting"],
        query: "scope 3 category 7 employee commuting emissions",
    },
    Category {
        name: "scope 3.8 upstream leased assets",
        keys: &["scope_3_8_upstream_leased_assets"],
        query: "scope 3 category 8 upstream leased assets emissions",
    },
    Category {
        name: "scope 3.9 downstream transportation",
        keys: &["scope_3_9_downstream_transportation_and_distribution"],
        query: "scope 3 category 9 downstream transportation and distribution emissions",
    },
    Category {
        name: "scope 3.10 processing of sold products",
        keys: &["scope_3_10_processing_of_sold_products"],
        query: "scope 3 category 10 processing of sold products emissions",
    },
    Category {
        name: "scope 3.11 use of sold products",
        keys: &["scope_3_11_use_of_sold_products"],
        query: "scope 3 category 11 use of sold products emissions",
    },
    Category {
        name: "scope 3.12 end-of-life treatment",
        keys: &["scope_3_12_end_of_life_treatment_of_sold_products"],
        query: "scope 3 category 12 end of life treatment of sold products emissions",
    },
    Category {
        name: "scope 3.13 downstream leased assets",
        keys: &["scope_3_13_downstream_leased_assets"],
        query: "scope 3 category 13 downstream leased assets emissions",
    },
    Category {
        name: "scope 3.14 franchises",
        keys: &["franchises"],
        query: "scope 3 category 14 franchises emissions",
    },
    Category {
        name: "scope 3.15 investments",
        keys: &["scope_3_15_investments"],
        query: "scope 3 category 15 investments financed emissions",
    },
    Category {
        name: "scope 1 and 2 combined",
        keys: &["scope_1_2"],
        query: "combined scope 1 and scope 2 emissions total tCO2e",
    },
    Category {
        name: "scope 1, 2 and 3 combined",
        keys: &["scope_1_2_3"],
        query: "combined scope 1 2 and 3 emissions total tCO2e",
    },
    Category {
        name: "biogenic emissions",
        keys: &["biogenic_outside_scopes"],
        query: "biogenic CO2 emissions outside of scopes",
    },
    Category {
        name: "grand total",
        keys: &["tot_1_2_3"],
        query: "total greenhouse gas emissions all scopes tCO2e",
    },
];

impl Category {
    /// Query text fed to the embedding model for retrieval
    pub fn retrieval_query(&self, year: &str) -> String {
        format!("{} {}", self.query, year)
    }

    /// Completion prompt asking for a fixed-key JSON object
    pub fn prompt(&self, context: &str, year: &str) -> String {
        let keys: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("\"{}\": \"<number or ->\"", k))
            .collect();
        format!(
            r#"You are extracting greenhouse-gas emissions figures from a sustainability report.

Using ONLY the context below, find the {name} for the year {year}.
Report values in tonnes of CO2 equivalents. If a value is not stated in the
context, use "-".

Respond with exactly one JSON object and nothing else:
{{ {keys} }}

CONTEXT:
{context}"#,
            name = self.name,
            year = year,
            keys = keys.join(", "),
            context = context
        )
    }

    /// All of this category's keys mapped to the placeholder
    pub fn placeholder(&self) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .map(|k| (k.to_string(), PLACEHOLDER.to_string()))
            .collect()
    }
}

/// Prompt asking the completion model to translate a retrieval query
pub fn translation_prompt(query: &str, language_code: &str) -> String {
    format!(
        "Translate the following search query into the language with ISO-639-1 \
         code \"{}\". Respond with the translation only.\n\n{}",
        language_code, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMISSION_COLUMNS;

    #[test]
    fn there_are_27_categories_with_disjoint_keys() {
        assert_eq!(CATEGORIES.len(), 27);
        let mut seen = std::collections::HashSet::new();
        for category in CATEGORIES {
            for key in category.keys {
                assert!(seen.insert(*key), "key {} appears twice", key);
            }
        }
    }

    #[test]
    fn every_key_is_a_report_column() {
        for category in CATEGORIES {
            for key in category.keys {
                assert!(
                    EMISSION_COLUMNS.contains(key),
                    "key {} has no report column",
                    key
                );
            }
        }
    }

    #[test]
    fn prompt_names_every_key_and_the_year() {
        let category = &CATEGORIES[0];
        let prompt = category.prompt("some context", "2023");
        assert!(prompt.contains("2023"));
        for key in category.keys {
            assert!(prompt.contains(key));
        }
    }
}
