use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Business rule: rent is due on the 28th of each month unless an
/// obligation overrides it.
pub const DEFAULT_DUE_DAY: u32 = 28;

/// Late fee bands keyed by day-of-month: (first day, last day, penalty %).
/// The penalty always applies to the original amount, never to a previous fee.
const LATE_FEE_TIERS: [(u32, u32, i64); 4] = [(1, 3, 0), (4, 10, 10), (11, 18, 15), (19, 25, 25)];

/// What happens after day 25, where the tier table ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateCyclePolicy {
    /// Days 26-31 keep charging the top 25% tier.
    HoldMaxTier,
    /// Days 26-31 charge nothing; the next billing cycle has started.
    ResetNewCycle,
}

impl LateCyclePolicy {
    pub fn from_db(value: &str) -> Result<Self, String> {
        match value {
            "hold_max" => Ok(LateCyclePolicy::HoldMaxTier),
            "new_cycle" => Ok(LateCyclePolicy::ResetNewCycle),
            other => Err(format!("unknown late_cycle_policy: {}", other)),
        }
    }

    pub fn as_db(self) -> &'static str {
        match self {
            LateCyclePolicy::HoldMaxTier => "hold_max",
            LateCyclePolicy::ResetNewCycle => "new_cycle",
        }
    }
}

fn penalty_percent(current_day: u32, policy: LateCyclePolicy) -> Result<i64, String> {
    if !(1..=31).contains(&current_day) {
        return Err(format!("current_day must be between 1 and 31, got {}", current_day));
    }
    for (first, last, percent) in LATE_FEE_TIERS {
        if (first..=last).contains(&current_day) {
            return Ok(percent);
        }
    }
    Ok(match policy {
        LateCyclePolicy::HoldMaxTier => 25,
        LateCyclePolicy::ResetNewCycle => 0,
    })
}

/// Late fee in pesewas for a payment still unpaid on `current_day` of the
/// month. Pure: same inputs always give the same fee.
pub fn calculate_late_payment_fee(
    amount: i64,
    current_day: u32,
    policy: LateCyclePolicy,
) -> Result<i64, String> {
    if amount <= 0 {
        return Err(format!("amount must be positive, got {}", amount));
    }
    let percent = penalty_percent(current_day, policy)?;
    amount
        .checked_mul(percent)
        .map(|scaled| scaled / 100)
        .ok_or_else(|| format!("amount {} is too large to compute a late fee", amount))
}

/// Formats pesewas as cedis for display: `GH₵1,234.56`. Locale-fixed.
pub fn format_cedis(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}GH₵{}.{:02}", sign, grouped, abs % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentStatus {
    pub days_until_due: i64,
    pub late_fee: i64,
    pub total_due: i64,
    pub label: String,
}

/// The upcoming-payment computation: how far from due, what fee applies at
/// the reference date, and the label the dashboard card shows. The reference
/// date is always passed in; this function never looks at the clock.
pub fn payment_status(
    amount: i64,
    due_date: NaiveDate,
    reference_date: NaiveDate,
    policy: LateCyclePolicy,
) -> Result<PaymentStatus, String> {
    if amount <= 0 {
        return Err(format!("amount must be positive, got {}", amount));
    }
    let days_until_due = (due_date - reference_date).num_days();
    let late_fee = if days_until_due < 0 {
        calculate_late_payment_fee(amount, reference_date.day(), policy)?
    } else {
        0
    };
    let total_due = amount
        .checked_add(late_fee)
        .ok_or_else(|| format!("amount {} is too large to compute a total due", amount))?;
    let label = match days_until_due {
        1 => "Due in 1 day".to_string(),
        n if n > 1 => format!("Due in {} days", n),
        0 => "Due today".to_string(),
        -1 => "1 day overdue".to_string(),
        n => format!("{} days overdue", -n),
    };
    Ok(PaymentStatus {
        days_until_due,
        late_fee,
        total_due,
        label,
    })
}

fn clamped_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, String> {
    let mut day = day;
    while day >= 28 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Ok(date);
        }
        day -= 1;
    }
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("invalid date {}-{}-{}", year, month, day))
}

/// Resolves an obligation's next due date relative to `reference`. Day 29-31
/// clamps to the last day of short months. A paid obligation rolls to the
/// next month.
pub fn next_due_date(
    due_day: u32,
    reference: NaiveDate,
    paid_current_period: bool,
) -> Result<NaiveDate, String> {
    if !(1..=31).contains(&due_day) {
        return Err(format!("due_day must be between 1 and 31, got {}", due_day));
    }
    let (year, month) = if paid_current_period {
        match reference.month() {
            12 => (reference.year() + 1, 1),
            m => (reference.year(), m + 1),
        }
    } else {
        (reference.year(), reference.month())
    };
    clamped_date(year, month, due_day)
}
