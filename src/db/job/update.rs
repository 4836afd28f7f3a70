use log::info;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::job::JobRecord;

impl JobRecord {
    /// Insert a freshly submitted job; a recycled scheduler id replaces the old row
    pub fn save(&self, conn: &Connection, experiment: &str, host: &str) -> Result<()> {
        let (job_id, _) = self.submitted_ids()?;
        let state = self.state().to_db_string();
        info!("Recording job {job_id} of experiment {experiment} with state {state}");
        conn.execute(
            "INSERT OR REPLACE INTO job (experiment, job_id, host, start_time, state) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![experiment, job_id, host, self.start_time().unwrap_or_default(), state],
        )?;
        Ok(())
    }

    pub fn update_state(&self, conn: &Connection) -> Result<()> {
        let (job_id, _) = self.submitted_ids()?;
        let state = self.state().to_db_string();
        info!("Updating {job_id} with state {state}");
        conn.execute("UPDATE job SET state = ?1 WHERE job_id = ?2", params![state, job_id])?;
        Ok(())
    }
}

pub fn mark_cleaned(conn: &Connection, job_id: &str) -> Result<()> {
    info!("Marking {job_id} as cleaned");
    conn.execute("UPDATE job SET cleaned = 1 WHERE job_id = ?1", params![job_id])?;
    Ok(())
}
