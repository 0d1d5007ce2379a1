mod db;
mod reminder;
pub mod schedule;

use chrono::{Local, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tauri::AppHandle;

use schedule::{format_cedis, next_due_date, payment_status, LateCyclePolicy};

#[derive(Serialize)]
struct Obligation {
    id: i64,
    name: String,
    amount: i64,
    due_day: i64,
    is_active: bool,
}

#[derive(Serialize)]
struct Payment {
    id: i64,
    obligation_id: i64,
    ts_utc: i64,
    date_local: String,
    period_ym: String,
    amount: i64,
}

#[derive(Serialize)]
pub(crate) struct Config {
    pub default_due_day: i64,
    pub reminder_window_days: i64,
    pub late_cycle_policy: String,
}

#[derive(Deserialize)]
struct ConfigPayload {
    default_due_day: i64,
    reminder_window_days: i64,
    late_cycle_policy: String,
}

/// Everything the dashboard's upcoming-payment card needs, amounts both in
/// pesewas and preformatted.
#[derive(Serialize)]
struct UpcomingPayment {
    obligation_id: i64,
    name: String,
    amount: i64,
    amount_display: String,
    due_date: String,
    days_until_due: i64,
    late_fee: i64,
    late_fee_display: String,
    total_due: i64,
    total_due_display: String,
    status_label: String,
}

pub(crate) struct UnpaidObligation {
    pub id: i64,
    pub name: String,
    pub amount: i64,
    pub due_day: u32,
}

fn resolve_date_local(date_local: Option<String>) -> String {
    date_local.unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
}

pub(crate) fn period_ym_from_date(date_local: &str) -> String {
    date_local.get(0..7).unwrap_or(date_local).to_string()
}

pub(crate) fn fetch_config(conn: &Connection) -> Result<Config, String> {
    conn.query_row(
        "SELECT default_due_day, reminder_window_days, late_cycle_policy FROM config WHERE id = 1",
        [],
        |row| {
            Ok(Config {
                default_due_day: row.get(0)?,
                reminder_window_days: row.get(1)?,
                late_cycle_policy: row.get(2)?,
            })
        },
    )
    .map_err(|err| err.to_string())
}

fn fetch_obligation(conn: &Connection, obligation_id: i64) -> Result<Obligation, String> {
    conn.query_row(
        "SELECT id, name, amount, due_day, is_active FROM obligations WHERE id = ?1",
        [obligation_id],
        |row| {
            let active: i64 = row.get(4)?;
            Ok(Obligation {
                id: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
                due_day: row.get(3)?,
                is_active: active != 0,
            })
        },
    )
    .map_err(|err| err.to_string())
}

/// Active obligations with no payment recorded for the given billing month.
pub(crate) fn unpaid_obligations(
    conn: &Connection,
    period_ym: &str,
) -> Result<Vec<UnpaidObligation>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT o.id, o.name, o.amount, o.due_day FROM obligations o
             LEFT JOIN payments p
               ON p.obligation_id = o.id AND p.period_ym = ?1
             WHERE o.is_active = 1 AND p.id IS NULL
             ORDER BY o.due_day ASC, o.id ASC",
        )
        .map_err(|err| err.to_string())?;

    let rows = stmt
        .query_map([period_ym], |row| {
            let due_day: i64 = row.get(3)?;
            Ok(UnpaidObligation {
                id: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
                due_day: due_day as u32,
            })
        })
        .map_err(|err| err.to_string())?;

    let mut obligations = Vec::new();
    for row in rows {
        obligations.push(row.map_err(|err| err.to_string())?);
    }

    Ok(obligations)
}

fn compute_upcoming_payments_for_date(
    conn: &Connection,
    today_local: &str,
) -> Result<Vec<UpcomingPayment>, String> {
    let today = NaiveDate::parse_from_str(today_local, "%Y-%m-%d")
        .map_err(|err| format!("invalid date_local: {}", err))?;
    let config = fetch_config(conn)?;
    let policy = LateCyclePolicy::from_db(&config.late_cycle_policy)?;
    let period_ym = period_ym_from_date(today_local);

    let mut cards = Vec::new();
    for obligation in unpaid_obligations(conn, &period_ym)? {
        let due_date = next_due_date(obligation.due_day, today, false)?;
        let status = payment_status(obligation.amount, due_date, today, policy)?;
        cards.push(UpcomingPayment {
            obligation_id: obligation.id,
            name: obligation.name,
            amount: obligation.amount,
            amount_display: format_cedis(obligation.amount),
            due_date: due_date.format("%Y-%m-%d").to_string(),
            days_until_due: status.days_until_due,
            late_fee: status.late_fee,
            late_fee_display: format_cedis(status.late_fee),
            total_due: status.total_due,
            total_due_display: format_cedis(status.total_due),
            status_label: status.label,
        });
    }
    cards.sort_by_key(|card| card.days_until_due);

    Ok(cards)
}

#[tauri::command(rename_all = "snake_case")]
fn list_obligations(app: AppHandle) -> Result<Vec<Obligation>, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    let mut stmt = conn
        .prepare("SELECT id, name, amount, due_day, is_active FROM obligations ORDER BY id DESC")
        .map_err(|err| err.to_string())?;

    let rows = stmt
        .query_map([], |row| {
            let active: i64 = row.get(4)?;
            Ok(Obligation {
                id: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
                due_day: row.get(3)?,
                is_active: active != 0,
            })
        })
        .map_err(|err| err.to_string())?;

    let mut obligations = Vec::new();
    for row in rows {
        obligations.push(row.map_err(|err| err.to_string())?);
    }

    Ok(obligations)
}

#[tauri::command(rename_all = "snake_case")]
fn add_obligation(
    app: AppHandle,
    name: String,
    amount: i64,
    due_day: Option<i64>,
) -> Result<Obligation, String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if amount <= 0 {
        return Err("amount must be positive".to_string());
    }

    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    let due_day = match due_day {
        Some(day) => day,
        None => fetch_config(&conn)?.default_due_day,
    };
    if !(1..=31).contains(&due_day) {
        return Err("due_day must be between 1 and 31".to_string());
    }

    conn.execute(
        "INSERT INTO obligations (name, amount, due_day, is_active) VALUES (?1, ?2, ?3, 1)",
        params![name, amount, due_day],
    )
    .map_err(|err| err.to_string())?;

    let id = conn.last_insert_rowid();

    fetch_obligation(&conn, id)
}

#[tauri::command(rename_all = "snake_case")]
fn delete_obligation(app: AppHandle, obligation_id: i64) -> Result<(), String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    conn.execute(
        "DELETE FROM payments WHERE obligation_id = ?1",
        params![obligation_id],
    )
    .map_err(|err| err.to_string())?;
    conn.execute(
        "DELETE FROM obligations WHERE id = ?1",
        params![obligation_id],
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}

#[tauri::command(rename_all = "snake_case")]
fn set_obligation_active(
    app: AppHandle,
    obligation_id: i64,
    is_active: bool,
) -> Result<Obligation, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    conn.execute(
        "UPDATE obligations SET is_active = ?1 WHERE id = ?2",
        params![is_active as i64, obligation_id],
    )
    .map_err(|err| err.to_string())?;

    fetch_obligation(&conn, obligation_id)
}

#[tauri::command(rename_all = "snake_case")]
fn record_payment(
    app: AppHandle,
    obligation_id: i64,
    amount: i64,
    date_local: Option<String>,
    period_ym: Option<String>,
) -> Result<Payment, String> {
    if amount <= 0 {
        return Err("amount must be positive".to_string());
    }

    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    fetch_obligation(&conn, obligation_id)?;

    let date_local = resolve_date_local(date_local);
    let period_ym = period_ym.unwrap_or_else(|| period_ym_from_date(&date_local));
    let ts_utc = Utc::now().timestamp_millis();

    conn.execute(
        "INSERT INTO payments (obligation_id, ts_utc, date_local, period_ym, amount)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![obligation_id, ts_utc, date_local, period_ym, amount],
    )
    .map_err(|err| err.to_string())?;

    let id = conn.last_insert_rowid();

    Ok(Payment {
        id,
        obligation_id,
        ts_utc,
        date_local,
        period_ym,
        amount,
    })
}

#[tauri::command(rename_all = "snake_case")]
fn list_recent_payments(app: AppHandle, limit: u32) -> Result<Vec<Payment>, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT id, obligation_id, ts_utc, date_local, period_ym, amount FROM payments
             ORDER BY ts_utc DESC LIMIT ?1",
        )
        .map_err(|err| err.to_string())?;

    let rows = stmt
        .query_map([limit], |row| {
            Ok(Payment {
                id: row.get(0)?,
                obligation_id: row.get(1)?,
                ts_utc: row.get(2)?,
                date_local: row.get(3)?,
                period_ym: row.get(4)?,
                amount: row.get(5)?,
            })
        })
        .map_err(|err| err.to_string())?;

    let mut payments = Vec::new();
    for row in rows {
        payments.push(row.map_err(|err| err.to_string())?);
    }

    Ok(payments)
}

#[tauri::command(rename_all = "snake_case")]
fn get_config(app: AppHandle) -> Result<Config, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    fetch_config(&conn)
}

#[tauri::command(rename_all = "snake_case")]
fn update_config(app: AppHandle, payload: ConfigPayload) -> Result<Config, String> {
    // Capped at 28 so the default day exists in every month.
    if !(1..=28).contains(&payload.default_due_day) {
        return Err("default_due_day must be between 1 and 28".to_string());
    }
    if payload.reminder_window_days < 1 {
        return Err("reminder_window_days must be >= 1".to_string());
    }
    LateCyclePolicy::from_db(&payload.late_cycle_policy)?;

    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    conn.execute(
        "UPDATE config SET default_due_day = ?1, reminder_window_days = ?2, late_cycle_policy = ?3, updated_ts_utc = ?4 WHERE id = 1",
        params![
            payload.default_due_day,
            payload.reminder_window_days,
            payload.late_cycle_policy,
            Utc::now().timestamp_millis()
        ],
    )
    .map_err(|err| err.to_string())?;

    fetch_config(&conn)
}

#[tauri::command(rename_all = "snake_case")]
fn get_upcoming_payments(app: AppHandle) -> Result<Vec<UpcomingPayment>, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    let today_local = Local::now().format("%Y-%m-%d").to_string();
    compute_upcoming_payments_for_date(&conn, &today_local)
}

#[tauri::command(rename_all = "snake_case")]
fn get_payment_reminder(app: AppHandle) -> Result<reminder::PaymentReminder, String> {
    let conn = db::open_connection(&app).map_err(|err| err.to_string())?;
    reminder::compute_payment_reminder(&conn)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            db::init_db(&app.handle())?;
            Ok(())
        })
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            list_obligations,
            add_obligation,
            delete_obligation,
            set_obligation_active,
            record_payment,
            list_recent_payments,
            get_config,
            update_config,
            get_upcoming_payments,
            get_payment_reminder
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
