use std::{error::Error, fs, path::PathBuf};

use rusqlite::{params, Connection};
use tauri::{AppHandle, Manager};

use crate::schedule::DEFAULT_DUE_DAY;

type AnyResult<T> = Result<T, Box<dyn Error>>;

fn db_path(app: &AppHandle) -> AnyResult<PathBuf> {
    let data_dir = app.path().app_data_dir()?;
    fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join("rentmate.sqlite"))
}

pub fn open_connection(app: &AppHandle) -> AnyResult<Connection> {
    let path = db_path(app)?;
    Ok(Connection::open(path)?)
}

pub fn init_db(app: &AppHandle) -> AnyResult<()> {
    let conn = open_connection(app)?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS obligations (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          amount INTEGER NOT NULL,
          due_day INTEGER NOT NULL,
          is_active INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS payments (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          obligation_id INTEGER NOT NULL,
          ts_utc INTEGER NOT NULL,
          date_local TEXT NOT NULL,
          period_ym TEXT NOT NULL,
          amount INTEGER NOT NULL,
          FOREIGN KEY(obligation_id) REFERENCES obligations(id)
        );
        CREATE TABLE IF NOT EXISTS config (
          id INTEGER PRIMARY KEY CHECK (id = 1),
          default_due_day INTEGER NOT NULL,
          reminder_window_days INTEGER NOT NULL,
          late_cycle_policy TEXT NOT NULL,
          created_ts_utc INTEGER NOT NULL,
          updated_ts_utc INTEGER NOT NULL
        );",
    )?;

    ensure_config_row(&conn)?;
    ensure_payment_columns(&conn)?;
    Ok(())
}

fn ensure_config_row(conn: &Connection) -> AnyResult<()> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0))?;
    if existing == 0 {
        conn.execute(
            "INSERT INTO config (id, default_due_day, reminder_window_days, late_cycle_policy, created_ts_utc, updated_ts_utc)
             VALUES (1, ?1, ?2, ?3, ?4, ?4)",
            params![
                DEFAULT_DUE_DAY as i64,
                7_i64,
                "hold_max",
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
    }
    Ok(())
}

// Databases created before payments were attributed to a billing month lack
// the period_ym column.
fn ensure_payment_columns(conn: &Connection) -> AnyResult<()> {
    if !table_has_column(conn, "payments", "period_ym")? {
        conn.execute(
            "ALTER TABLE payments ADD COLUMN period_ym TEXT NOT NULL DEFAULT ''",
            [],
        )?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> AnyResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
