//! Bulk xlsx import with conflict checkpointing
//!
//! Rows import until one collides with an existing report on company + year.
//! The session then pauses and surfaces the conflict; the caller resolves it
//! with an explicit action and the session resumes from where it stopped.
//! Sessions are independent objects in a registry, so parallel imports and
//! crashes cannot corrupt each other's state.

use std::collections::BTreeMap;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{Database, NewReport};
use crate::types::EMISSION_COLUMNS;

/// Resolution for a paused conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Insert the row anyway, creating a sibling record
    Override,
    /// Drop the conflicting row
    Skip,
}

/// Conflict surfaced to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ConflictInfo {
    pub company_name: String,
    pub year_of_emissions: String,
    pub existing_report_id: i64,
}

/// Result of starting or resuming an import
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportOutcome {
    Completed {
        inserted: usize,
        skipped: usize,
    },
    Paused {
        session_id: Uuid,
        inserted: usize,
        conflicts: Vec<ConflictInfo>,
    },
}

struct ImportSession {
    remaining: Vec<NewReport>,
    conflict_row: Option<NewReport>,
    inserted: usize,
    skipped: usize,
}

/// Registry of live import sessions
pub struct ImportManager {
    db: Arc<Database>,
    sessions: DashMap<Uuid, ImportSession>,
}

impl ImportManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            sessions: DashMap::new(),
        }
    }

    /// Parse a workbook and import its rows until done or paused
    pub fn start(&self, workbook: &[u8]) -> Result<ImportOutcome> {
        let mut rows = parse_workbook(workbook)?;
        rows.reverse(); // pop from the back = original order
        let session = ImportSession {
            remaining: rows,
            conflict_row: None,
            inserted: 0,
            skipped: 0,
        };
        let session_id = Uuid::new_v4();
        self.sessions.insert(session_id, session);
        self.drive(session_id)
    }

    /// Apply a resolution to a paused session and continue importing
    pub fn resolve(&self, session_id: Uuid, action: ConflictAction) -> Result<ImportOutcome> {
        {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or(Error::ImportSessionNotFound(session_id))?;
            let row = session
                .conflict_row
                .take()
                .ok_or(Error::ImportSessionNotFound(session_id))?;
            match action {
                ConflictAction::Override => {
                    self.db.insert_full_report(&row)?;
                    session.inserted += 1;
                }
                ConflictAction::Skip => {
                    session.skipped += 1;
                }
            }
        }
        self.drive(session_id)
    }

    /// Import rows until the session pauses or runs out
    fn drive(&self, session_id: Uuid) -> Result<ImportOutcome> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(Error::ImportSessionNotFound(session_id))?;

        while let Some(row) = session.remaining.pop() {
            let year = row.year_of_emissions.clone().unwrap_or_default();
            if let Some(existing) = self.db.find_conflict(&row.company_name, &year)? {
                let info = ConflictInfo {
                    company_name: row.company_name.clone(),
                    year_of_emissions: year,
                    existing_report_id: existing,
                };
                session.conflict_row = Some(row);
                let inserted = session.inserted;
                tracing::info!(%session_id, company = %info.company_name, "import paused on conflict");
                return Ok(ImportOutcome::Paused {
                    session_id,
                    inserted,
                    conflicts: vec![info],
                });
            }
            self.db.insert_full_report(&row)?;
            session.inserted += 1;
        }

        let outcome = ImportOutcome::Completed {
            inserted: session.inserted,
            skipped: session.skipped,
        };
        drop(session);
        self.sessions.remove(&session_id);
        tracing::info!(%session_id, "import session completed");
        Ok(outcome)
    }
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Data::Float(f) => Some(trim_float(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn trim_float(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Parse the first worksheet into report rows. The header row names the
/// columns; unknown headers are ignored.
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<NewReport>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidInput(format!("unreadable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::InvalidInput("workbook has no sheets".to_string()))?
        .map_err(|e| Error::InvalidInput(format!("unreadable sheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| Error::InvalidInput("workbook sheet is empty".to_string()))?
        .iter()
        .map(|c| {
            cell_to_string(c)
                .unwrap_or_default()
                .to_lowercase()
                .replace(' ', "_")
        })
        .collect();

    if !headers.iter().any(|h| h == "company_name") {
        return Err(Error::InvalidInput(
            "workbook is missing a company_name column".to_string(),
        ));
    }

    let mut reports = Vec::new();
    for row in rows {
        let mut company_name = None;
        let mut source_1_link = None;
        let mut country_code = None;
        let mut revenue_tsek = None;
        let mut year_of_emissions = None;
        let mut emissions: BTreeMap<String, String> = BTreeMap::new();

        for (header, cell) in headers.iter().zip(row.iter()) {
            let Some(value) = cell_to_string(cell) else {
                continue;
            };
            match header.as_str() {
                "company_name" => company_name = Some(value),
                "source_1_link" => source_1_link = Some(value),
                "country_code" => country_code = Some(value),
                "revenue_tsek" => revenue_tsek = value.parse::<f64>().ok(),
                "year_of_emissions" => year_of_emissions = Some(value),
                other if EMISSION_COLUMNS.contains(&other) => {
                    emissions.insert(other.to_string(), value);
                }
                _ => {}
            }
        }

        let Some(company_name) = company_name else {
            continue; // blank row
        };
        reports.push(NewReport {
            company_name,
            source_1_link,
            country_code,
            revenue_tsek,
            year_of_emissions,
            emissions,
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(company: &str, year: &str) -> NewReport {
        NewReport {
            company_name: company.to_string(),
            source_1_link: None,
            country_code: Some("SE".to_string()),
            revenue_tsek: Some(500.0),
            year_of_emissions: Some(year.to_string()),
            emissions: BTreeMap::new(),
        }
    }

    fn manager_with_rows(rows: Vec<NewReport>) -> (ImportManager, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let manager = ImportManager::new(db.clone());
        let mut rows = rows;
        rows.reverse();
        let session = ImportSession {
            remaining: rows,
            conflict_row: None,
            inserted: 0,
            skipped: 0,
        };
        manager.sessions.insert(Uuid::nil(), session);
        (manager, db)
    }

    #[test]
    fn clean_rows_import_to_completion() {
        let (manager, db) = manager_with_rows(vec![row("Acme", "2023"), row("Beta", "2023")]);
        let outcome = manager.drive(Uuid::nil()).unwrap();
        match outcome {
            ImportOutcome::Completed { inserted, skipped } => {
                assert_eq!(inserted, 2);
                assert_eq!(skipped, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(db.find_conflict("Acme", "2023").unwrap().is_some());
    }

    #[test]
    fn conflict_pauses_then_skip_resumes() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.insert_full_report(&row("Acme", "2023")).unwrap();
        let manager = ImportManager::new(db.clone());
        let mut rows = vec![row("Acme", "2023"), row("Beta", "2023")];
        rows.reverse();
        let session = ImportSession {
            remaining: rows,
            conflict_row: None,
            inserted: 0,
            skipped: 0,
        };
        let session_id = Uuid::new_v4();
        manager.sessions.insert(session_id, session);

        let outcome = manager.drive(session_id).unwrap();
        let ImportOutcome::Paused { conflicts, .. } = outcome else {
            panic!("expected pause");
        };
        assert_eq!(conflicts[0].company_name, "Acme");

        let outcome = manager.resolve(session_id, ConflictAction::Skip).unwrap();
        let ImportOutcome::Completed { inserted, skipped } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(inserted, 1);
        assert_eq!(skipped, 1);

        // Only one Acme 2023 row exists.
        let hits = db.search_reports(Some("Acme"), None, None).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn override_inserts_a_sibling() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.insert_full_report(&row("Acme", "2023")).unwrap();
        let manager = ImportManager::new(db.clone());
        let session = ImportSession {
            remaining: vec![row("Acme", "2023")],
            conflict_row: None,
            inserted: 0,
            skipped: 0,
        };
        let session_id = Uuid::new_v4();
        manager.sessions.insert(session_id, session);

        let ImportOutcome::Paused { .. } = manager.drive(session_id).unwrap() else {
            panic!("expected pause");
        };
        let ImportOutcome::Completed { inserted, .. } =
            manager.resolve(session_id, ConflictAction::Override).unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(inserted, 1);
        assert_eq!(db.search_reports(Some("Acme"), None, None).unwrap().len(), 2);
    }

    #[test]
    fn resolve_on_unknown_session_errors() {
        let db = Arc::new(Database::in_memory().unwrap());
        let manager = ImportManager::new(db);
        assert!(matches!(
            manager.resolve(Uuid::new_v4(), ConflictAction::Skip),
            Err(Error::ImportSessionNotFound(_))
        ));
    }

    #[test]
    fn sessions_are_independent() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.insert_full_report(&row("Acme", "2023")).unwrap();
        let manager = ImportManager::new(db);

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        manager.sessions.insert(
            a,
            ImportSession {
                remaining: vec![row("Acme", "2023")],
                conflict_row: None,
                inserted: 0,
                skipped: 0,
            },
        );
        manager.sessions.insert(
            b,
            ImportSession {
                remaining: vec![row("Gamma", "2022")],
                conflict_row: None,
                inserted: 0,
                skipped: 0,
            },
        );

        assert!(matches!(
            manager.drive(a).unwrap(),
            ImportOutcome::Paused { .. }
        ));
        assert!(matches!(
            manager.drive(b).unwrap(),
            ImportOutcome::Completed { .. }
        ));
        // Session a is still paused and resolvable.
        assert!(manager.resolve(a, ConflictAction::Skip).is_ok());
    }
}
