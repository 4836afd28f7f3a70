use log::info;
use rusqlite::Connection;

use crate::WorkingDirectory;

pub fn open_db(wd: &WorkingDirectory) -> rusqlite::Result<Connection> {
    let path = &wd.path.join("hpc-workload.db");
    if !path.exists() { info!("Creating new database {}", path.display()) }
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));
    conn.execute(SCHEMA, [])?;
    Ok(())
}
