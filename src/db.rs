use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::orchestrator::RunOutcome;

pub const DEFAULT_DB_PATH: &str = "data/jobs.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            external_id      TEXT PRIMARY KEY,
            company_name     TEXT NOT NULL,
            title            TEXT NOT NULL,
            location         TEXT NOT NULL DEFAULT '',
            city             TEXT NOT NULL DEFAULT '',
            state            TEXT NOT NULL DEFAULT '',
            country          TEXT NOT NULL DEFAULT '',
            apply_url        TEXT NOT NULL,
            department       TEXT NOT NULL DEFAULT '',
            job_function     TEXT NOT NULL DEFAULT '',
            employment_type  TEXT NOT NULL DEFAULT '',
            experience_level TEXT NOT NULL DEFAULT '',
            salary_range     TEXT NOT NULL DEFAULT '',
            remote_type      TEXT NOT NULL DEFAULT '',
            posted_date      TEXT NOT NULL DEFAULT '',
            description      TEXT NOT NULL DEFAULT '',
            status           TEXT NOT NULL,
            first_seen       TEXT NOT NULL,
            last_seen        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company_name);

        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            company     TEXT NOT NULL,
            started_at  TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            reason      TEXT NOT NULL,
            pages       INTEGER NOT NULL,
            records     INTEGER NOT NULL,
            error       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_runs_company ON runs(company);
        ",
    )?;
    Ok(())
}

// ── Runs ──

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SavedRun {
    pub inserted: usize,
    pub updated: usize,
}

/// Upsert every record of a run by `external_id` and log the run itself,
/// in one transaction.
pub fn save_run(
    conn: &Connection,
    company: &str,
    outcome: &RunOutcome,
    started_at: DateTime<Utc>,
) -> Result<SavedRun> {
    let now = Utc::now().to_rfc3339();
    let mut saved = SavedRun::default();
    let tx = conn.unchecked_transaction()?;
    {
        let mut exists = tx.prepare("SELECT 1 FROM jobs WHERE external_id = ?1")?;
        let mut upsert = tx.prepare(
            "INSERT INTO jobs
             (external_id, company_name, title, location, city, state, country, apply_url,
              department, job_function, employment_type, experience_level, salary_range,
              remote_type, posted_date, description, status, first_seen, last_seen)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?18)
             ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title, location = excluded.location, city = excluded.city,
                state = excluded.state, country = excluded.country, apply_url = excluded.apply_url,
                department = excluded.department, job_function = excluded.job_function,
                employment_type = excluded.employment_type,
                experience_level = excluded.experience_level,
                salary_range = excluded.salary_range, remote_type = excluded.remote_type,
                posted_date = excluded.posted_date, description = excluded.description,
                status = excluded.status, last_seen = excluded.last_seen",
        )?;
        for r in &outcome.records {
            let known = exists
                .query_row(params![r.external_id], |_| Ok(()))
                .optional()?
                .is_some();
            upsert.execute(params![
                r.external_id, r.company_name, r.title, r.location, r.city, r.state, r.country,
                r.apply_url, r.department, r.job_function, r.employment_type, r.experience_level,
                r.salary_range, r.remote_type, r.posted_date, r.description, r.status, now,
            ])?;
            if known {
                saved.updated += 1;
            } else {
                saved.inserted += 1;
            }
        }

        tx.execute(
            "INSERT INTO runs (company, started_at, finished_at, reason, pages, records, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                company,
                started_at.to_rfc3339(),
                now,
                outcome.reason.as_str(),
                outcome.pages as i64,
                outcome.records.len() as i64,
                outcome.error,
            ],
        )?;
    }
    tx.commit()?;
    Ok(saved)
}

// ── Stats ──

pub struct CompanyStats {
    pub company: String,
    pub jobs: usize,
    pub last_run: Option<String>,
    pub last_reason: Option<String>,
}

pub struct Stats {
    pub jobs: usize,
    pub runs: usize,
    pub companies: Vec<CompanyStats>,
}

pub fn fetch_stats(conn: &Connection) -> Result<Stats> {
    let jobs: usize = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let mut stmt = conn.prepare(
        "SELECT j.company_name, COUNT(*),
                (SELECT finished_at FROM runs WHERE company = j.company_name ORDER BY id DESC LIMIT 1),
                (SELECT reason FROM runs WHERE company = j.company_name ORDER BY id DESC LIMIT 1)
         FROM jobs j
         GROUP BY j.company_name
         ORDER BY COUNT(*) DESC, j.company_name",
    )?;
    let companies = stmt
        .query_map([], |row| {
            Ok(CompanyStats {
                company: row.get(0)?,
                jobs: row.get(1)?,
                last_run: row.get(2)?,
                last_reason: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats { jobs, runs, companies })
}
