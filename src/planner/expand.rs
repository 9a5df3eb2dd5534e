//! Recurring-event expansion
//!
//! Turns a template event and a query window into the concrete occurrences
//! that start inside the window. Pure: no storage, no clock, no logging.
//!
//! The n-th candidate is always computed from the template start
//! (`start + n * interval` periods) rather than from the previous candidate,
//! so a clamped month-end (Jan 31 -> Feb 29) does not drift the following
//! months (Mar 31, not Mar 29).

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::models::{
    CalendarEvent, MonthEndPolicy, Occurrence, PlannerSettings, RecurrenceKind, RecurrenceRule,
};

/// Hard bound on steps for rules without a `count`.
pub const DEFAULT_MAX_STEPS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionOptions {
    pub month_end: MonthEndPolicy,
    /// Zone the calendar arithmetic happens in.
    pub time_zone: Tz,
    pub max_steps: u32,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            month_end: MonthEndPolicy::Clamp,
            time_zone: chrono_tz::UTC,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl From<&PlannerSettings> for ExpansionOptions {
    fn from(settings: &PlannerSettings) -> Self {
        Self {
            month_end: settings.month_end_policy,
            time_zone: settings.time_zone,
            max_steps: settings.max_expansion_steps.max(1),
        }
    }
}

/// Why expansion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No rule, or kind `none`: plain overlap check.
    NotRecurring,
    /// The rule's own `count` was reached.
    ReachedCount,
    /// The safety cap was reached before anything else stopped iteration.
    ReachedCap,
    /// Candidate start passed the rule's `end_date`.
    PassedEndDate,
    /// Candidate start passed the end of the query window.
    PassedWindow,
    /// Kind not understood; only the template step was considered.
    UnknownKind,
    /// Stored interval of 0; only the template step was considered.
    NonAdvancing,
    /// Date arithmetic left chrono's representable range.
    OutOfRange,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::NotRecurring => "not_recurring",
            Termination::ReachedCount => "reached_count",
            Termination::ReachedCap => "reached_cap",
            Termination::PassedEndDate => "passed_end_date",
            Termination::PassedWindow => "passed_window",
            Termination::UnknownKind => "unknown_kind",
            Termination::NonAdvancing => "non_advancing",
            Termination::OutOfRange => "out_of_range",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub occurrences: Vec<Occurrence>,
    pub termination: Termination,
    /// Candidates generated, inside the window or not.
    pub steps: u32,
}

/// Occurrences of `template` starting inside `[window_start, window_end]`.
pub fn expand_occurrences(
    template: &CalendarEvent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    options: &ExpansionOptions,
) -> Vec<Occurrence> {
    expand(template, window_start, window_end, options).occurrences
}

pub fn expand(
    template: &CalendarEvent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    options: &ExpansionOptions,
) -> Expansion {
    let rule = match &template.recurrence {
        Some(rule) if rule.kind.is_recurring() => rule,
        _ => return expand_single(template, window_start, window_end),
    };

    let duration = template.duration();
    let stop_at = match rule.end_date {
        Some(end_date) => end_date.min(window_end),
        None => window_end,
    };
    let count_limited = rule.count.map(|c| c <= options.max_steps).unwrap_or(false);
    let limit = rule
        .count
        .map(|c| c.min(options.max_steps))
        .unwrap_or(options.max_steps);

    let mut occurrences = Vec::new();
    let mut step: u32 = 0;

    let termination = loop {
        if step >= limit {
            break if count_limited {
                Termination::ReachedCount
            } else {
                Termination::ReachedCap
            };
        }

        let Some(start) = nth_start(template.start, rule, step, options) else {
            break Termination::OutOfRange;
        };

        if start > stop_at {
            break match rule.end_date {
                Some(end_date) if end_date < window_end => Termination::PassedEndDate,
                _ => Termination::PassedWindow,
            };
        }

        if start >= window_start {
            occurrences.push(instance(template, step, start, duration));
        }
        step += 1;

        if matches!(rule.kind, RecurrenceKind::Unknown(_)) {
            break Termination::UnknownKind;
        }
        if rule.interval == 0 {
            break Termination::NonAdvancing;
        }
    };

    Expansion {
        occurrences,
        termination,
        steps: step,
    }
}

fn expand_single(
    template: &CalendarEvent,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Expansion {
    let occurrences = if template.overlaps(window_start, window_end) {
        vec![Occurrence {
            event: template.clone(),
            is_recurring_instance: false,
            original_event_id: None,
            sequence: 0,
        }]
    } else {
        Vec::new()
    };

    Expansion {
        occurrences,
        termination: Termination::NotRecurring,
        steps: 1,
    }
}

fn instance(template: &CalendarEvent, step: u32, start: DateTime<Utc>, duration: Duration) -> Occurrence {
    let mut event = template.clone();
    event.id = Occurrence::instance_id(&template.id, step);
    event.start = start;
    event.end = start + duration;

    Occurrence {
        event,
        is_recurring_instance: true,
        original_event_id: Some(template.id.clone()),
        sequence: step,
    }
}

/// Start of candidate `step`, or `None` when it cannot be represented.
fn nth_start(
    origin: DateTime<Utc>,
    rule: &RecurrenceRule,
    step: u32,
    options: &ExpansionOptions,
) -> Option<DateTime<Utc>> {
    if step == 0 {
        return Some(origin);
    }
    let periods = step.checked_mul(rule.interval)?;

    let local = origin.with_timezone(&options.time_zone).naive_local();
    let shifted = match rule.kind {
        RecurrenceKind::Daily => local.checked_add_days(Days::new(u64::from(periods)))?,
        RecurrenceKind::Weekly => local.checked_add_days(Days::new(u64::from(periods) * 7))?,
        RecurrenceKind::Monthly => add_months(local, periods, options.month_end)?,
        RecurrenceKind::Yearly => add_months(local, periods.checked_mul(12)?, options.month_end)?,
        RecurrenceKind::None | RecurrenceKind::Unknown(_) => return None,
    };

    localize(&options.time_zone, shifted)
}

/// Calendar month addition under an explicit month-end policy.
pub fn add_months(local: NaiveDateTime, months: u32, policy: MonthEndPolicy) -> Option<NaiveDateTime> {
    match policy {
        MonthEndPolicy::Clamp => local.checked_add_months(Months::new(months)),
        MonthEndPolicy::Overflow => {
            let date = local.date();
            let first = date.with_day(1)?.checked_add_months(Months::new(months))?;
            let target = first.checked_add_days(Days::new(u64::from(date.day() - 1)))?;
            Some(target.and_time(local.time()))
        }
    }
}

/// Local wall time to an instant. Ambiguous times take the earlier instant;
/// times inside a DST gap are read with the offset in force before the gap,
/// which moves them forward by the gap length.
fn localize(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = local.checked_sub_signed(Duration::hours(3))?;
            let offset = tz.offset_from_local_datetime(&before).earliest()?.fix();
            let utc = local.checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))?;
            Some(Utc.from_utc_datetime(&utc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, EventType};
    use chrono::{NaiveDate, Timelike};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn template(start: DateTime<Utc>, duration: Duration, rule: Option<RecurrenceRule>) -> CalendarEvent {
        CalendarEvent {
            id: "tpl".to_string(),
            company_id: "co-1".to_string(),
            title: "Site inspection".to_string(),
            description: None,
            location: None,
            start,
            end: start + duration,
            all_day: false,
            recurrence: rule,
            created_by: "user-1".to_string(),
            client_id: None,
            status: EventStatus::Scheduled,
            event_type: EventType::SiteVisit,
            created_at: start,
            updated_at: start,
        }
    }

    fn starts(occurrences: &[Occurrence]) -> Vec<DateTime<Utc>> {
        occurrences.iter().map(Occurrence::start).collect()
    }

    #[test]
    fn test_non_recurring_inside_window() {
        let event = template(at(2024, 5, 10), Duration::hours(2), None);
        let result = expand(&event, at(2024, 5, 1), at(2024, 5, 31), &ExpansionOptions::default());
        assert_eq!(result.termination, Termination::NotRecurring);
        assert_eq!(result.occurrences.len(), 1);
        assert_eq!(result.occurrences[0].event, event);
        assert!(!result.occurrences[0].is_recurring_instance);
    }

    #[test]
    fn test_non_recurring_overlapping_window_edge() {
        // Starts before the window, ends inside it.
        let event = template(at(2024, 4, 30), Duration::days(2), None);
        let found = expand_occurrences(&event, at(2024, 5, 1), at(2024, 5, 31), &ExpansionOptions::default());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_non_recurring_outside_window() {
        let event = template(at(2024, 6, 10), Duration::hours(1), None);
        let found = expand_occurrences(&event, at(2024, 5, 1), at(2024, 5, 31), &ExpansionOptions::default());
        assert!(found.is_empty());
    }

    #[test]
    fn test_kind_none_behaves_as_single() {
        let rule = RecurrenceRule::new(RecurrenceKind::None, 1);
        let event = template(at(2024, 5, 10), Duration::hours(1), Some(rule));
        let result = expand(&event, at(2024, 5, 1), at(2024, 5, 31), &ExpansionOptions::default());
        assert_eq!(result.termination, Termination::NotRecurring);
        assert_eq!(result.occurrences.len(), 1);
    }

    #[test]
    fn test_biweekly_in_january() {
        let event = template(at(2024, 1, 1), Duration::hours(1), Some(RecurrenceRule::weekly(2)));
        let result = expand(&event, at(2024, 1, 1), at(2024, 2, 1), &ExpansionOptions::default());
        assert_eq!(
            starts(&result.occurrences),
            vec![at(2024, 1, 1), at(2024, 1, 15), at(2024, 1, 29)]
        );
        assert_eq!(result.termination, Termination::PassedWindow);
    }

    #[test]
    fn test_month_end_clamps_without_drift() {
        let event = template(at(2024, 1, 31), Duration::hours(3), Some(RecurrenceRule::monthly(1)));
        let found = expand_occurrences(&event, at(2024, 1, 1), at(2024, 4, 1), &ExpansionOptions::default());
        assert_eq!(starts(&found), vec![at(2024, 1, 31), at(2024, 2, 29), at(2024, 3, 31)]);

        let wider = expand_occurrences(&event, at(2024, 1, 1), at(2024, 5, 1), &ExpansionOptions::default());
        assert_eq!(wider.last().map(Occurrence::start), Some(at(2024, 4, 30)));
    }

    #[test]
    fn test_month_end_overflow_rolls_into_next_month() {
        let event = template(at(2024, 1, 31), Duration::hours(3), Some(RecurrenceRule::monthly(1)));
        let options = ExpansionOptions {
            month_end: MonthEndPolicy::Overflow,
            ..ExpansionOptions::default()
        };
        let found = expand_occurrences(&event, at(2024, 1, 1), at(2024, 4, 1), &options);
        assert_eq!(starts(&found), vec![at(2024, 1, 31), at(2024, 3, 2), at(2024, 3, 31)]);
    }

    #[test]
    fn test_yearly_leap_day() {
        let event = template(at(2024, 2, 29), Duration::hours(1), Some(RecurrenceRule::yearly(1)));
        let clamp = expand_occurrences(&event, at(2024, 1, 1), at(2025, 12, 31), &ExpansionOptions::default());
        assert_eq!(starts(&clamp), vec![at(2024, 2, 29), at(2025, 2, 28)]);

        let overflow = ExpansionOptions {
            month_end: MonthEndPolicy::Overflow,
            ..ExpansionOptions::default()
        };
        let rolled = expand_occurrences(&event, at(2024, 1, 1), at(2025, 12, 31), &overflow);
        assert_eq!(starts(&rolled), vec![at(2024, 2, 29), at(2025, 3, 1)]);
    }

    #[test]
    fn test_count_bounds_wide_window() {
        let start = at(2024, 3, 1);
        let event = template(start, Duration::minutes(30), Some(RecurrenceRule::daily(1).times(5)));
        let result = expand(&event, start, start + Duration::days(100), &ExpansionOptions::default());
        assert_eq!(result.occurrences.len(), 5);
        assert_eq!(result.termination, Termination::ReachedCount);
    }

    #[test]
    fn test_count_applies_across_windows() {
        // Steps before the window consume the count.
        let event = template(at(2024, 3, 1), Duration::hours(1), Some(RecurrenceRule::daily(1).times(5)));
        let found = expand_occurrences(&event, at(2024, 3, 4), at(2024, 12, 31), &ExpansionOptions::default());
        assert_eq!(starts(&found), vec![at(2024, 3, 4), at(2024, 3, 5)]);
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let rule = RecurrenceRule::daily(1).until(at(2024, 3, 3));
        let event = template(at(2024, 3, 1), Duration::hours(1), Some(rule));
        let result = expand(&event, at(2024, 1, 1), at(2024, 12, 31), &ExpansionOptions::default());
        assert_eq!(starts(&result.occurrences), vec![at(2024, 3, 1), at(2024, 3, 2), at(2024, 3, 3)]);
        assert_eq!(result.termination, Termination::PassedEndDate);
    }

    #[test]
    fn test_unbounded_rule_hits_cap() {
        let event = template(at(2000, 1, 1), Duration::hours(1), Some(RecurrenceRule::daily(1)));
        let options = ExpansionOptions {
            max_steps: 10,
            ..ExpansionOptions::default()
        };
        let result = expand(&event, at(2000, 1, 1), at(2100, 1, 1), &options);
        assert_eq!(result.occurrences.len(), 10);
        assert_eq!(result.termination, Termination::ReachedCap);
    }

    #[test]
    fn test_cap_wins_over_larger_count() {
        let event = template(at(2000, 1, 1), Duration::hours(1), Some(RecurrenceRule::daily(1).times(5000)));
        let result = expand(&event, at(2000, 1, 1), at(2100, 1, 1), &ExpansionOptions::default());
        assert_eq!(result.occurrences.len(), DEFAULT_MAX_STEPS as usize);
        assert_eq!(result.termination, Termination::ReachedCap);
    }

    #[test]
    fn test_unknown_kind_yields_template_step_only() {
        let rule = RecurrenceRule::new(RecurrenceKind::parse("fortnightly"), 1);
        let event = template(at(2024, 3, 1), Duration::hours(1), Some(rule));
        let result = expand(&event, at(2024, 1, 1), at(2024, 12, 31), &ExpansionOptions::default());
        assert_eq!(result.termination, Termination::UnknownKind);
        assert_eq!(starts(&result.occurrences), vec![at(2024, 3, 1)]);
        assert_eq!(result.steps, 1);
    }

    #[test]
    fn test_zero_interval_does_not_repeat() {
        let event = template(at(2024, 3, 1), Duration::hours(1), Some(RecurrenceRule::daily(0)));
        let result = expand(&event, at(2024, 1, 1), at(2024, 12, 31), &ExpansionOptions::default());
        assert_eq!(result.termination, Termination::NonAdvancing);
        assert_eq!(result.occurrences.len(), 1);
    }

    #[test]
    fn test_occurrences_before_window_are_skipped() {
        let event = template(at(2024, 1, 1), Duration::hours(1), Some(RecurrenceRule::weekly(1)));
        let found = expand_occurrences(&event, at(2024, 2, 1), at(2024, 2, 15), &ExpansionOptions::default());
        assert_eq!(starts(&found), vec![at(2024, 2, 5), at(2024, 2, 12)]);
        assert_eq!(found[0].sequence, 5);
        assert_eq!(found[0].event.id, "tpl-instance-5");
        assert_eq!(found[0].original_event_id.as_deref(), Some("tpl"));
    }

    #[test]
    fn test_instances_keep_duration_and_order() {
        let duration = Duration::minutes(95);
        let event = template(at(2024, 1, 31), duration, Some(RecurrenceRule::monthly(1)));
        let found = expand_occurrences(&event, at(2024, 1, 1), at(2026, 1, 1), &ExpansionOptions::default());
        assert_eq!(found.len(), 24);
        assert!(found.iter().all(|o| o.end() - o.start() == duration));
        assert!(found.windows(2).all(|w| w[0].start() <= w[1].start()));
        assert!(found.iter().all(|o| o.is_recurring_instance));
    }

    #[test]
    fn test_daily_keeps_local_time_across_dst() {
        let tz: Tz = "America/New_York".parse().unwrap();
        // 09:00 EST on 2024-03-08, DST begins 2024-03-10.
        let start = tz
            .with_ymd_and_hms(2024, 3, 8, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let event = template(start, Duration::hours(1), Some(RecurrenceRule::daily(1).times(4)));
        let options = ExpansionOptions {
            time_zone: tz,
            ..ExpansionOptions::default()
        };
        let found = expand_occurrences(&event, start, start + Duration::days(10), &options);
        assert_eq!(found.len(), 4);
        for occurrence in &found {
            assert_eq!(occurrence.start().with_timezone(&tz).hour(), 9);
            assert_eq!(occurrence.end() - occurrence.start(), Duration::hours(1));
        }
        // 24h apart before the switch, 23h across it.
        assert_eq!(found[1].start() - found[0].start(), Duration::hours(24));
        assert_eq!(found[2].start() - found[1].start(), Duration::hours(23));
    }

    #[test]
    fn test_localize_gap_moves_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let in_gap = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let instant = localize(&tz, in_gap).unwrap();
        let wall = instant.with_timezone(&tz);
        assert_eq!((wall.hour(), wall.minute()), (3, 30));
    }

    #[test]
    fn test_add_months_policies() {
        let jan31 = NaiveDate::from_ymd_opt(2023, 1, 31)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        let clamp = add_months(jan31, 1, MonthEndPolicy::Clamp).unwrap();
        let overflow = add_months(jan31, 1, MonthEndPolicy::Overflow).unwrap();
        assert_eq!(clamp.date(), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(overflow.date(), NaiveDate::from_ymd_opt(2023, 3, 3).unwrap());
        assert_eq!(overflow.time(), jan31.time());
    }
}
