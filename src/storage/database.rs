//! SQLite database for reports, the job-log mailbox, and the job lease

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::migrations;
use crate::types::{JobLog, JobStatus, Report};

/// Fields for a report row created outside the upload flow (bulk import)
#[derive(Debug, Clone)]
pub struct NewReport {
    pub company_name: String,
    pub source_1_link: Option<String>,
    pub country_code: Option<String>,
    pub revenue_tsek: Option<f64>,
    pub year_of_emissions: Option<String>,
    pub emissions: BTreeMap<String, String>,
}

/// SQLite-backed relational store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            "#,
        )
        .map_err(|e| Error::database(format!("failed to set pragmas: {}", e)))?;

        migrations::apply_migrations(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ---- reports ----

    /// Insert the report row created at upload time
    pub fn insert_report(
        &self,
        company_name: &str,
        source_link: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reports (company_name, source_1_link, created_at) VALUES (?1, ?2, ?3)",
            params![company_name, source_link, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a full report row (bulk import path)
    pub fn insert_full_report(&self, report: &NewReport) -> Result<i64> {
        let conn = self.conn.lock();

        let table_columns = migrations::report_columns(&conn)?;
        let mut columns = vec![
            "company_name".to_string(),
            "source_1_link".to_string(),
            "country_code".to_string(),
            "revenue_tsek".to_string(),
            "year_of_emissions".to_string(),
            "created_at".to_string(),
        ];
        let mut values: Vec<Value> = vec![
            Value::Text(report.company_name.clone()),
            option_text(&report.source_1_link),
            option_text(&report.country_code),
            report
                .revenue_tsek
                .map(Value::Real)
                .unwrap_or(Value::Null),
            option_text(&report.year_of_emissions),
            Value::Text(Utc::now().to_rfc3339()),
        ];

        for (key, value) in &report.emissions {
            if !table_columns.iter().any(|c| c == key) {
                return Err(Error::ColumnNotAllowed(key.clone()));
            }
            columns.push(key.clone());
            values.push(Value::Text(value.clone()));
        }

        let placeholders: Vec<String> =
            (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO reports ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        conn.execute(&sql, rusqlite::params_from_iter(values))
            .map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_report(&self, id: i64) -> Result<Report> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM reports WHERE id = ?1")
            .map_err(db_err)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        stmt.query_row(params![id], |row| report_from_row(&column_names, row))
            .optional()
            .map_err(db_err)?
            .ok_or(Error::ReportNotFound(id))
    }

    pub fn update_report_status(&self, id: i64, status: JobStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE reports SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn update_report_language(&self, id: i64, language_code: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE reports SET language_code = ?1 WHERE id = ?2",
            params![language_code, id],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Write merged structured-extraction results onto a report row.
    /// Keys are validated against the actual table columns.
    pub fn upsert_emissions(
        &self,
        id: i64,
        year: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let table_columns = migrations::report_columns(&conn)?;

        let mut assignments = vec!["year_of_emissions = ?1".to_string()];
        let mut values: Vec<Value> = vec![Value::Text(year.to_string())];
        for (key, value) in fields {
            if !table_columns.iter().any(|c| c == key) {
                return Err(Error::ColumnNotAllowed(key.clone()));
            }
            values.push(Value::Text(value.clone()));
            assignments.push(format!("{} = ?{}", key, values.len()));
        }
        values.push(Value::Integer(id));
        let sql = format!(
            "UPDATE reports SET {} WHERE id = ?{}",
            assignments.join(", "),
            values.len()
        );

        let updated = conn
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(db_err)?;
        if updated == 0 {
            return Err(Error::ReportNotFound(id));
        }
        Ok(())
    }

    /// Search reports by company-name substring, country code, and a
    /// revenue ceiling, newest first
    pub fn search_reports(
        &self,
        company: Option<&str>,
        country_code: Option<&str>,
        max_revenue: Option<f64>,
    ) -> Result<Vec<Report>> {
        let conn = self.conn.lock();

        let mut sql = String::from("SELECT * FROM reports WHERE 1=1");
        let mut values: Vec<Value> = Vec::new();
        if let Some(company) = company {
            values.push(Value::Text(format!("%{}%", company)));
            sql.push_str(&format!(
                " AND company_name LIKE ?{} COLLATE NOCASE",
                values.len()
            ));
        }
        if let Some(country) = country_code {
            values.push(Value::Text(country.to_string()));
            sql.push_str(&format!(" AND country_code = ?{}", values.len()));
        }
        if let Some(revenue) = max_revenue {
            values.push(Value::Real(revenue));
            sql.push_str(&format!(" AND revenue_tsek <= ?{}", values.len()));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                report_from_row(&column_names, row)
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// One page of reports for export, oldest first
    pub fn list_reports_page(&self, limit: usize, offset: usize) -> Result<Vec<Report>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM reports ORDER BY id ASC LIMIT ?1 OFFSET ?2")
            .map_err(db_err)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                report_from_row(&column_names, row)
            })
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(rows)
    }

    /// Id of an existing report with the same company and year, if any
    pub fn find_conflict(&self, company_name: &str, year: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id FROM reports WHERE company_name = ?1 AND year_of_emissions = ?2 LIMIT 1",
            params![company_name, year],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    // ---- logs (single-row mailbox) ----

    /// Delete all log rows and insert the given one
    pub fn replace_log(&self, log: &JobLog) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM logs", []).map_err(db_err)?;
        tx.execute(
            "INSERT INTO logs (job_id, document_id, status, msg, job_processed) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.job_id.to_string(),
                log.document_id,
                log.status.as_str(),
                log.msg,
                log.job_processed
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn current_log(&self) -> Result<Option<JobLog>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT job_id, document_id, status, msg, job_processed FROM logs LIMIT 1",
            [],
            |row| {
                let job_id: String = row.get(0)?;
                let status: String = row.get(2)?;
                Ok((
                    job_id,
                    row.get::<_, i64>(1)?,
                    status,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?
        .map(|(job_id, document_id, status, msg, job_processed)| {
            let job_id = Uuid::parse_str(&job_id)
                .map_err(|e| Error::database(format!("corrupt log job id: {}", e)))?;
            let status = JobStatus::parse(&status)
                .ok_or_else(|| Error::database(format!("corrupt log status: {}", status)))?;
            Ok(JobLog {
                job_id,
                document_id,
                status,
                msg,
                job_processed,
            })
        })
        .transpose()
    }

    /// Update the live log row in place. A row already in a terminal status
    /// is left untouched; the return value says whether the write happened.
    pub fn update_log(
        &self,
        job_id: Uuid,
        status: JobStatus,
        msg: &str,
        job_processed: &str,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM logs WHERE job_id = ?1",
                params![job_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if current
            .as_deref()
            .and_then(JobStatus::parse)
            .is_some_and(|s| s.is_terminal())
        {
            tracing::debug!(%job_id, attempted = %status, "log row is terminal, skipping update");
            return Ok(false);
        }
        let updated = conn
            .execute(
                "UPDATE logs SET status = ?1, msg = ?2, job_processed = ?3 WHERE job_id = ?4",
                params![status.as_str(), msg, job_processed, job_id.to_string()],
            )
            .map_err(db_err)?;
        Ok(updated > 0)
    }

    // ---- job lease (single processing slot) ----

    /// Atomically acquire the single processing slot. Expired leases are
    /// swept in the same transaction.
    pub fn try_acquire_lease(&self, job_id: Uuid, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now();
        tx.execute(
            "DELETE FROM job_lease WHERE expires_at <= ?1",
            params![now.to_rfc3339()],
        )
        .map_err(db_err)?;
        let expires = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO job_lease (id, job_id, acquired_at, expires_at) \
                 VALUES (1, ?1, ?2, ?3)",
                params![job_id.to_string(), now.to_rfc3339(), expires.to_rfc3339()],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(inserted == 1)
    }

    /// Release the slot if held by the given job
    pub fn release_lease(&self, job_id: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM job_lease WHERE job_id = ?1",
            params![job_id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Current lease holder, ignoring expired leases
    pub fn lease_holder(&self) -> Result<Option<Uuid>> {
        let conn = self.conn.lock();
        let holder: Option<String> = conn
            .query_row(
                "SELECT job_id FROM job_lease WHERE expires_at > ?1",
                params![Utc::now().to_rfc3339()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        holder
            .map(|s| {
                Uuid::parse_str(&s).map_err(|e| Error::database(format!("corrupt lease: {}", e)))
            })
            .transpose()
    }

    // ---- schema ----

    /// Apply an allow-listed emissions column addition
    pub fn add_emissions_column(&self, column: &str) -> Result<()> {
        let conn = self.conn.lock();
        migrations::add_allowed_column(&conn, column)
    }
}

fn option_text(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map(|v| Value::Text(v.clone()))
        .unwrap_or(Value::Null)
}

/// Build a Report from a `SELECT *` row, routing unknown text columns into
/// the emissions map so runtime-added columns round-trip.
fn report_from_row(
    columns: &[String],
    row: &rusqlite::Row<'_>,
) -> std::result::Result<Report, rusqlite::Error> {
    let mut report = Report {
        id: 0,
        company_name: String::new(),
        source_1_link: None,
        language_code: None,
        country_code: None,
        revenue_tsek: None,
        year_of_emissions: None,
        status: None,
        created_at: Utc::now(),
        emissions: BTreeMap::new(),
    };

    for (i, name) in columns.iter().enumerate() {
        match name.as_str() {
            "id" => report.id = row.get(i)?,
            "company_name" => report.company_name = row.get(i)?,
            "source_1_link" => report.source_1_link = row.get(i)?,
            "language_code" => report.language_code = row.get(i)?,
            "country_code" => report.country_code = row.get(i)?,
            "revenue_tsek" => report.revenue_tsek = row.get(i)?,
            "year_of_emissions" => report.year_of_emissions = row.get(i)?,
            "status" => report.status = row.get(i)?,
            "created_at" => {
                let raw: String = row.get(i)?;
                report.created_at = DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
            }
            _ => {
                if let Ok(Some(value)) = row.get::<_, Option<String>>(i) {
                    report.emissions.insert(name.clone(), value);
                }
            }
        }
    }
    Ok(report)
}
