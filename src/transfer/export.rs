//! Paged CSV export of report records

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::Database;
use crate::types::EMISSION_COLUMNS;

/// Page size used when walking the reports table
pub const MAX_RECORDS_PER_REQUEST: usize = 1000;

const CORE_COLUMNS: &[&str] = &[
    "id",
    "company_name",
    "country_code",
    "revenue_tsek",
    "year_of_emissions",
    "language_code",
    "status",
    "created_at",
];

/// Serialize every report row to CSV, paging through the table
pub fn export_csv(db: &Arc<Database>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let header: Vec<&str> = CORE_COLUMNS
        .iter()
        .chain(EMISSION_COLUMNS.iter())
        .copied()
        .collect();
    writer
        .write_record(&header)
        .map_err(|e| Error::internal(format!("csv write failed: {}", e)))?;

    let mut offset = 0;
    loop {
        let page = db.list_reports_page(MAX_RECORDS_PER_REQUEST, offset)?;
        if page.is_empty() {
            break;
        }
        offset += page.len();

        for report in &page {
            let mut record: Vec<String> = vec![
                report.id.to_string(),
                report.company_name.clone(),
                report.country_code.clone().unwrap_or_default(),
                report
                    .revenue_tsek
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
                report.year_of_emissions.clone().unwrap_or_default(),
                report.language_code.clone().unwrap_or_default(),
                report.status.clone().unwrap_or_default(),
                report.created_at.to_rfc3339(),
            ];
            for column in EMISSION_COLUMNS {
                record.push(
                    report
                        .emissions
                        .get(*column)
                        .cloned()
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            writer
                .write_record(&record)
                .map_err(|e| Error::internal(format!("csv write failed: {}", e)))?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| Error::internal(format!("csv flush failed: {}", e)))
}
