use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;

/// A job as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub experiment: String,
    pub job_id: String,
    pub host: String,
    pub start_time: i64,
    pub state: String,
    pub cleaned: bool,
}

static COLUMNS: &str = "experiment, job_id, host, start_time, state, cleaned";

/// Most recently recorded job whose remote logs haven't been removed yet
pub fn latest_uncleaned(conn: &Connection) -> Result<Option<LedgerEntry>> {
    let sql = format!("SELECT {COLUMNS} FROM job WHERE cleaned == 0 ORDER BY id DESC LIMIT 1");
    let entry = conn.query_row(&sql, [], from_row).optional()?;
    if let Some(entry) = &entry {
        info!("Latest uncleaned job in ledger: {} ({})", entry.job_id, entry.experiment);
    }
    Ok(entry)
}

pub fn find_job(conn: &Connection, job_id: &str) -> Result<Option<LedgerEntry>> {
    let sql = format!("SELECT {COLUMNS} FROM job WHERE job_id == ?1");
    Ok(conn.query_row(&sql, params![job_id], from_row).optional()?)
}

fn from_row(row: &Row) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        experiment: row.get(0)?,
        job_id: row.get(1)?,
        host: row.get(2)?,
        start_time: row.get(3)?,
        state: row.get(4)?,
        cleaned: row.get(5)?,
    })
}
