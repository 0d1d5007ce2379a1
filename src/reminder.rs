use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::schedule::{format_cedis, next_due_date, payment_status, LateCyclePolicy, PaymentStatus};
use crate::{fetch_config, period_ym_from_date, unpaid_obligations, Config};

#[derive(Serialize)]
pub struct ReminderDebugMeta {
    pub rule_id: String,
    pub key_numbers: Vec<i64>,
}

#[derive(Serialize)]
pub struct PaymentReminder {
    pub status_title: String,
    pub bullets: Vec<String>,
    pub next_step: String,
    pub tone: String,
    pub debug_meta: Option<ReminderDebugMeta>,
}

struct DueEntry {
    name: String,
    amount: i64,
    status: PaymentStatus,
}

struct ReminderInputs {
    config: Config,
    obligation_count: i64,
    paid_amount_period: i64,
    // Unpaid obligations for the current period, most urgent first.
    due: Vec<DueEntry>,
    // Earliest due date of the next cycle, once everything is paid.
    next_cycle_due: Option<NaiveDate>,
}

pub fn compute_payment_reminder(conn: &Connection) -> Result<PaymentReminder, String> {
    let today_local = Local::now().format("%Y-%m-%d").to_string();
    compute_payment_reminder_for_date(conn, &today_local)
}

fn compute_payment_reminder_for_date(
    conn: &Connection,
    today_local: &str,
) -> Result<PaymentReminder, String> {
    let today = NaiveDate::parse_from_str(today_local, "%Y-%m-%d")
        .map_err(|err| format!("invalid date_local: {}", err))?;
    let config = fetch_config(conn)?;
    let policy = LateCyclePolicy::from_db(&config.late_cycle_policy)?;
    let period_ym = period_ym_from_date(today_local);

    let obligation_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM obligations WHERE is_active = 1",
            [],
            |row| row.get(0),
        )
        .map_err(|err| err.to_string())?;
    let paid_amount_period: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE period_ym = ?1",
            [period_ym.as_str()],
            |row| row.get(0),
        )
        .map_err(|err| err.to_string())?;

    let mut due = Vec::new();
    for obligation in unpaid_obligations(conn, &period_ym)? {
        let due_date = next_due_date(obligation.due_day, today, false)?;
        let status = payment_status(obligation.amount, due_date, today, policy)?;
        due.push(DueEntry {
            name: obligation.name,
            amount: obligation.amount,
            status,
        });
    }
    due.sort_by_key(|entry| entry.status.days_until_due);

    let mut next_cycle_due: Option<NaiveDate> = None;
    if due.is_empty() && obligation_count > 0 {
        let mut stmt = conn
            .prepare("SELECT due_day FROM obligations WHERE is_active = 1")
            .map_err(|err| err.to_string())?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|err| err.to_string())?;
        for row in rows {
            let due_day = row.map_err(|err| err.to_string())?;
            let rolled = next_due_date(due_day as u32, today, true)?;
            next_cycle_due = Some(match next_cycle_due {
                Some(current) if current <= rolled => current,
                _ => rolled,
            });
        }
    }

    let inputs = ReminderInputs {
        config,
        obligation_count,
        paid_amount_period,
        due,
        next_cycle_due,
    };

    Ok(select_reminder_rule(&inputs))
}

fn select_reminder_rule(inputs: &ReminderInputs) -> PaymentReminder {
    if inputs.obligation_count == 0 {
        return PaymentReminder {
            status_title: "No payment obligations tracked yet.".to_string(),
            bullets: vec![
                "Add your monthly rent to start tracking due dates.".to_string(),
                "Late fees start at 10% once the 3-day grace window closes.".to_string(),
            ],
            next_step: "Small step: add your first obligation with its amount and due day."
                .to_string(),
            tone: "neutral".to_string(),
            debug_meta: Some(ReminderDebugMeta {
                rule_id: "onboarding".to_string(),
                key_numbers: vec![0],
            }),
        };
    }

    let overdue: Vec<&DueEntry> = inputs
        .due
        .iter()
        .filter(|entry| entry.status.days_until_due < 0)
        .collect();
    if let Some(worst) = overdue.first() {
        let status_title = if overdue.len() == 1 {
            format!("{} is {}.", worst.name, worst.status.label)
        } else {
            format!("{} payments are overdue.", overdue.len())
        };
        return PaymentReminder {
            status_title,
            bullets: vec![
                format!(
                    "{} late fee so far on {}.",
                    format_cedis(worst.status.late_fee),
                    worst.name
                ),
                format!("Total due {}.", format_cedis(worst.status.total_due)),
            ],
            next_step: format!(
                "Settle {} today before the fee climbs a tier.",
                worst.name
            ),
            tone: "warn".to_string(),
            debug_meta: Some(ReminderDebugMeta {
                rule_id: "overdue".to_string(),
                key_numbers: vec![
                    overdue.len() as i64,
                    worst.status.late_fee,
                    worst.status.total_due,
                ],
            }),
        };
    }

    if let Some(entry) = inputs
        .due
        .iter()
        .find(|entry| entry.status.days_until_due == 0)
    {
        return PaymentReminder {
            status_title: format!("{} is due today.", entry.name),
            bullets: vec![
                format!("Amount due {}.", format_cedis(entry.amount)),
                "Paying inside the 3-day grace window keeps the fee at zero.".to_string(),
            ],
            next_step: format!("Small step: pay {} before the day ends.", entry.name),
            tone: "warn".to_string(),
            debug_meta: Some(ReminderDebugMeta {
                rule_id: "due_today".to_string(),
                key_numbers: vec![entry.amount],
            }),
        };
    }

    if let Some(entry) = inputs.due.iter().find(|entry| {
        entry.status.days_until_due > 0
            && entry.status.days_until_due <= inputs.config.reminder_window_days
    }) {
        let days = entry.status.days_until_due;
        let when = if days == 1 {
            "tomorrow".to_string()
        } else {
            format!("in {} days", days)
        };
        return PaymentReminder {
            status_title: format!("{} is due {}.", entry.name, when),
            bullets: vec![
                format!("Amount due {}.", format_cedis(entry.amount)),
                "Set the money aside now and nothing is owed on top.".to_string(),
            ],
            next_step: format!(
                "Small step: keep {} ready for the due date.",
                format_cedis(entry.amount)
            ),
            tone: "calm".to_string(),
            debug_meta: Some(ReminderDebugMeta {
                rule_id: "due_soon".to_string(),
                key_numbers: vec![entry.amount, entry.status.days_until_due],
            }),
        };
    }

    if inputs.due.is_empty() {
        let mut bullets = vec![
            format!("Paid {} this period.", format_cedis(inputs.paid_amount_period)),
            format!("{} obligations tracked.", inputs.obligation_count),
        ];
        let next_step = match inputs.next_cycle_due {
            Some(due_date) => {
                bullets.push(format!(
                    "Next due date {}.",
                    due_date.format("%Y-%m-%d")
                ));
                format!(
                    "Keep it up: nothing owed until {}.",
                    due_date.format("%Y-%m-%d")
                )
            }
            None => "Keep it up: nothing owed until the next cycle.".to_string(),
        };
        return PaymentReminder {
            status_title: "All obligations settled for this period.".to_string(),
            bullets,
            next_step,
            tone: "praise".to_string(),
            debug_meta: Some(ReminderDebugMeta {
                rule_id: "all_paid".to_string(),
                key_numbers: vec![inputs.obligation_count, inputs.paid_amount_period],
            }),
        };
    }

    let nearest = &inputs.due[0];
    PaymentReminder {
        status_title: format!(
            "Nothing due in the next {} days.",
            inputs.config.reminder_window_days
        ),
        bullets: vec![
            format!(
                "Next up: {} in {} days.",
                nearest.name, nearest.status.days_until_due
            ),
            format!("Amount to plan for {}.", format_cedis(nearest.amount)),
        ],
        next_step: "Small step: nothing to pay yet, check back closer to the due date."
            .to_string(),
        tone: "neutral".to_string(),
        debug_meta: Some(ReminderDebugMeta {
            rule_id: "ahead".to_string(),
            key_numbers: vec![nearest.status.days_until_due, nearest.amount],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params, Connection};

    fn setup_conn(reminder_window_days: i64, late_cycle_policy: &str) -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                default_due_day INTEGER NOT NULL,
                reminder_window_days INTEGER NOT NULL,
                late_cycle_policy TEXT NOT NULL,
                created_ts_utc INTEGER NOT NULL,
                updated_ts_utc INTEGER NOT NULL
            );
            CREATE TABLE obligations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                amount INTEGER NOT NULL,
                due_day INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                obligation_id INTEGER NOT NULL,
                ts_utc INTEGER NOT NULL,
                date_local TEXT NOT NULL,
                period_ym TEXT NOT NULL,
                amount INTEGER NOT NULL,
                FOREIGN KEY(obligation_id) REFERENCES obligations(id)
            );",
        )
        .expect("create schema");
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO config (id, default_due_day, reminder_window_days, late_cycle_policy, created_ts_utc, updated_ts_utc)
             VALUES (1, 28, ?1, ?2, ?3, ?3)",
            params![reminder_window_days, late_cycle_policy, now],
        )
        .expect("insert config");
        conn
    }

    fn insert_obligation(conn: &Connection, name: &str, amount: i64, due_day: i64) -> i64 {
        conn.execute(
            "INSERT INTO obligations (name, amount, due_day, is_active) VALUES (?1, ?2, ?3, 1)",
            params![name, amount, due_day],
        )
        .expect("insert obligation");
        conn.last_insert_rowid()
    }

    fn insert_payment(conn: &Connection, obligation_id: i64, date_local: &str, amount: i64) {
        conn.execute(
            "INSERT INTO payments (obligation_id, ts_utc, date_local, period_ym, amount)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                obligation_id,
                chrono::Utc::now().timestamp_millis(),
                date_local,
                crate::period_ym_from_date(date_local),
                amount
            ],
        )
        .expect("insert payment");
    }

    #[test]
    fn rule_onboarding_when_no_obligations() {
        let conn = setup_conn(7, "hold_max");

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.debug_meta.unwrap().rule_id, "onboarding");
    }

    #[test]
    fn rule_overdue_wins_over_everything() {
        let conn = setup_conn(7, "hold_max");
        insert_obligation(&conn, "Monthly rent", 120_000, 5);
        insert_obligation(&conn, "Internet", 30_000, 10);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        let meta = reminder.debug_meta.expect("meta");
        assert_eq!(meta.rule_id, "overdue");
        // Internet is due today on the 10th, only rent counts as overdue.
        assert_eq!(meta.key_numbers[0], 1);
    }

    #[test]
    fn overdue_reminder_quotes_fee_from_schedule() {
        let conn = setup_conn(7, "hold_max");
        insert_obligation(&conn, "Monthly rent", 120_000, 5);

        // Checked on the 10th: 10% tier on GH₵1,200.00.
        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.status_title, "Monthly rent is 5 days overdue.");
        assert_eq!(reminder.tone, "warn");
        let meta = reminder.debug_meta.expect("meta");
        assert_eq!(meta.key_numbers, vec![1, 12_000, 132_000]);
        assert!(reminder.bullets[0].contains("GH₵120.00"));
    }

    #[test]
    fn rule_due_today() {
        let conn = setup_conn(7, "hold_max");
        insert_obligation(&conn, "Monthly rent", 120_000, 10);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.debug_meta.unwrap().rule_id, "due_today");
    }

    #[test]
    fn rule_due_soon_inside_window() {
        let conn = setup_conn(7, "hold_max");
        insert_obligation(&conn, "Monthly rent", 120_000, 15);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        let meta = reminder.debug_meta.expect("meta");
        assert_eq!(meta.rule_id, "due_soon");
        assert_eq!(meta.key_numbers, vec![120_000, 5]);
    }

    #[test]
    fn rule_all_paid_announces_next_cycle() {
        let conn = setup_conn(7, "hold_max");
        let id = insert_obligation(&conn, "Monthly rent", 120_000, 15);
        insert_payment(&conn, id, "2025-05-02", 120_000);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.tone, "praise");
        // The paid obligation rolls to next month's due date.
        assert!(reminder.bullets.iter().any(|b| b.contains("2025-06-15")));
        assert_eq!(reminder.next_step, "Keep it up: nothing owed until 2025-06-15.");
        assert_eq!(reminder.debug_meta.unwrap().rule_id, "all_paid");
    }

    #[test]
    fn all_paid_picks_earliest_rolled_due_date() {
        let conn = setup_conn(7, "hold_max");
        let rent = insert_obligation(&conn, "Monthly rent", 120_000, 28);
        let net = insert_obligation(&conn, "Internet", 30_000, 5);
        insert_payment(&conn, rent, "2025-05-02", 120_000);
        insert_payment(&conn, net, "2025-05-03", 30_000);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.debug_meta.unwrap().rule_id, "all_paid");
        assert!(reminder.bullets.iter().any(|b| b.contains("2025-06-05")));
    }

    #[test]
    fn rule_ahead_outside_window() {
        let conn = setup_conn(7, "hold_max");
        insert_obligation(&conn, "Monthly rent", 120_000, 28);

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-01").expect("reminder");
        let meta = reminder.debug_meta.expect("meta");
        assert_eq!(meta.rule_id, "ahead");
        assert_eq!(meta.key_numbers[0], 27);
    }

    #[test]
    fn inactive_obligations_are_ignored() {
        let conn = setup_conn(7, "hold_max");
        let id = insert_obligation(&conn, "Old lease", 120_000, 5);
        conn.execute("UPDATE obligations SET is_active = 0 WHERE id = ?1", [id])
            .expect("deactivate");

        let reminder = compute_payment_reminder_for_date(&conn, "2025-05-10").expect("reminder");
        assert_eq!(reminder.debug_meta.unwrap().rule_id, "onboarding");
    }
}
