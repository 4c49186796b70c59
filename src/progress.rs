use crate::models::HabitCard;
use chrono::NaiveDate;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// Percent credited per completion for automatic cards without a deadline.
pub const STEP_PERCENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub complete: bool,
}

impl Progress {
    fn from_percent(percent: u8) -> Self {
        Self {
            percent,
            complete: percent >= 100,
        }
    }
}

/// Derives the progress of a card from its completions.
///
/// Manual cards are binary. Automatic cards with a deadline are paced against the
/// number of days between creation and the deadline (00:00 UTC); without a
/// deadline each completion is worth a fixed step.
pub fn derive(completions: u32, deadline: Option<NaiveDate>, created_at: i64, manual: bool) -> Progress {
    if manual {
        return Progress::from_percent(if completions > 0 { 100 } else { 0 });
    }

    let percent = match deadline {
        Some(deadline) => {
            let days = total_days(created_at, deadline_millis(deadline));
            let pct = (f64::from(completions) / days as f64 * 100.0).round();
            pct.clamp(0.0, 100.0) as u8
        }
        None => completions.saturating_mul(STEP_PERCENT).min(100) as u8,
    };
    Progress::from_percent(percent)
}

pub fn of_card(card: &HabitCard) -> Progress {
    derive(card.completions, card.deadline, card.created_at, card.manual_progress)
}

pub fn deadline_millis(deadline: NaiveDate) -> i64 {
    deadline
        .and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc().timestamp_millis())
        .unwrap_or_default()
}

fn total_days(created_at: i64, deadline_ms: i64) -> i64 {
    let span = deadline_ms - created_at;
    let whole = span.div_euclid(DAY_MS);
    let days = if span.rem_euclid(DAY_MS) > 0 { whole + 1 } else { whole };
    days.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_days_before(deadline: NaiveDate, days: i64) -> i64 {
        deadline_millis(deadline) - days * DAY_MS
    }

    #[test]
    fn manual_mode_is_binary() {
        for completions in [0u32, 1, 2, 17, u32::MAX] {
            let progress = derive(completions, None, 0, true);
            let expected = if completions > 0 { 100 } else { 0 };
            assert_eq!(progress.percent, expected);
            assert_eq!(progress.complete, completions > 0);
        }
    }

    #[test]
    fn deadline_ten_days_out_with_three_completions_is_thirty() {
        let deadline = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        let created = created_days_before(deadline, 10);
        let progress = derive(3, Some(deadline), created, false);
        assert_eq!(progress.percent, 30);
        assert!(!progress.complete);
    }

    #[test]
    fn partial_days_round_up() {
        let deadline = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        // 2.5 days -> 3 days
        let created = deadline_millis(deadline) - (5 * DAY_MS) / 2;
        assert_eq!(derive(1, Some(deadline), created, false).percent, 33);
        assert_eq!(derive(2, Some(deadline), created, false).percent, 67);
    }

    #[test]
    fn deadline_percent_is_clamped() {
        let deadline = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        let created = created_days_before(deadline, 4);
        let progress = derive(9, Some(deadline), created, false);
        assert_eq!(progress.percent, 100);
        assert!(progress.complete);
    }

    #[test]
    fn deadline_in_the_past_counts_as_one_day() {
        let deadline = NaiveDate::from_ymd_opt(2026, 1, 11).unwrap();
        let created = deadline_millis(deadline) + 3 * DAY_MS;
        assert_eq!(derive(0, Some(deadline), created, false).percent, 0);
        assert_eq!(derive(1, Some(deadline), created, false).percent, 100);
    }

    #[test]
    fn deadline_formula_matches_for_a_range_of_spans() {
        let deadline = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        for days in 1..=40i64 {
            let created = created_days_before(deadline, days);
            for completions in 0..=45u32 {
                let expected = ((f64::from(completions) / days as f64) * 100.0)
                    .round()
                    .clamp(0.0, 100.0) as u8;
                assert_eq!(derive(completions, Some(deadline), created, false).percent, expected);
            }
        }
    }

    #[test]
    fn no_deadline_steps_by_five() {
        assert_eq!(derive(7, None, 0, false).percent, 35);
        assert_eq!(derive(20, None, 0, false).percent, 100);
        assert_eq!(derive(400, None, 0, false).percent, 100);
        assert!(!derive(19, None, 0, false).complete);
    }
}
