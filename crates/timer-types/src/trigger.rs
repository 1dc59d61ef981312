//! Trigger computation for scheduled jobs.
//!
//! A trigger answers "when does this job fire next". Three kinds exist:
//!
//! - **PointInTime**: fires once at a fixed instant.
//! - **Interval**: fires every `period_ms` from `start_time`, bounded by a
//!   repeat limit and/or an end time.
//! - **SimpleTimer**: like Interval, but the period is expressed in a
//!   calendar unit and day arithmetic happens in the trigger's time zone,
//!   so a daily 09:00 trigger stays at 09:00 local time across DST.
//!
//! Triggers are immutable snapshots. [`Trigger::has_next_fire_time`] is a
//! pure peek; [`Trigger::next_fire_time`] returns the instant that fires now
//! together with the advanced snapshot, which the caller persists.

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Unit for trigger periods and execution timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis_per_unit(self) -> i64 {
        match self {
            TimeUnit::Millis => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    /// Convert `amount` of this unit to milliseconds, `None` on overflow.
    pub fn to_millis(self, amount: i64) -> Option<i64> {
        amount.checked_mul(self.millis_per_unit())
    }

    /// Convert `amount` of this unit to a std duration (saturating).
    pub fn to_duration(self, amount: u64) -> std::time::Duration {
        let per_unit = self.millis_per_unit().unsigned_abs();
        std::time::Duration::from_millis(amount.saturating_mul(per_unit))
    }
}

/// Fires exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointInTimeTrigger {
    /// The single fire instant, cleared once it has fired
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// Fires every `period_ms` milliseconds from `start_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTrigger {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Total number of firings allowed; `<= 0` means unlimited
    #[serde(default)]
    pub repeat_limit: i32,
    /// Firings so far
    #[serde(default)]
    pub repeat_count: i32,
    pub period_ms: i64,
    pub next_fire_time: Option<DateTime<Utc>>,
}

impl IntervalTrigger {
    fn limit_reached(&self) -> bool {
        self.repeat_limit > 0 && self.repeat_count >= self.repeat_limit
    }

    fn past_end(&self, instant: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| instant > end)
    }

    fn occurrence(&self, index: i32) -> Option<DateTime<Utc>> {
        let offset = self.period_ms.checked_mul(i64::from(index))?;
        self.start_time
            .checked_add_signed(Duration::try_milliseconds(offset)?)
    }

    fn advance(&self) -> (Option<DateTime<Utc>>, Self) {
        let mut next = self.clone();
        let Some(current) = self.next_fire_time else {
            return (None, next);
        };
        if self.limit_reached() || self.past_end(current) {
            next.next_fire_time = None;
            return (None, next);
        }

        next.repeat_count = self.repeat_count.saturating_add(1);
        next.next_fire_time = if next.limit_reached() {
            None
        } else {
            self.occurrence(next.repeat_count)
                .filter(|following| !self.past_end(*following))
        };
        (Some(current), next)
    }

    fn skip_until(&self, threshold: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if self.next_fire_time.map_or(true, |current| current >= threshold) {
            return next;
        }

        // First occurrence at or after the threshold.
        let elapsed = threshold
            .signed_duration_since(self.start_time)
            .num_milliseconds();
        let index = elapsed.div_euclid(self.period_ms)
            + i64::from(elapsed.rem_euclid(self.period_ms) != 0);
        next.repeat_count = i32::try_from(index)
            .unwrap_or(i32::MAX)
            .max(self.repeat_count);
        next.next_fire_time = if next.limit_reached() {
            None
        } else {
            self.occurrence(next.repeat_count)
                .filter(|following| !self.past_end(*following))
        };
        next
    }
}

/// Fires every `period` calendar units from `start_time`, in `zone_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTimerTrigger {
    pub start_time: DateTime<Utc>,
    pub period: i64,
    pub period_unit: TimeUnit,
    /// Repetitions after the first firing; negative means unlimited
    #[serde(default)]
    pub repeat_count: i32,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// IANA zone id used for day arithmetic
    pub zone_id: String,
    pub next_fire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_repeat_count: i32,
    #[serde(default)]
    pub end_time_reached: bool,
}

impl SimpleTimerTrigger {
    /// Parse the configured zone id.
    pub fn zone(&self) -> Result<Tz, TypesError> {
        self.zone_id
            .parse::<Tz>()
            .map_err(|_| TypesError::InvalidTimezone(self.zone_id.clone()))
    }

    fn past_end(&self, instant: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| instant > end)
    }

    fn repetitions_exhausted(&self) -> bool {
        self.repeat_count >= 0 && self.current_repeat_count > self.repeat_count
    }

    /// Instant of the `index`-th firing, counted from `start_time`.
    ///
    /// Computing every occurrence from the start keeps a DST gap adjustment
    /// on one day from drifting all following occurrences.
    fn occurrence(&self, index: i32) -> Option<DateTime<Utc>> {
        let steps = self.period.checked_mul(i64::from(index))?;
        match self.period_unit {
            TimeUnit::Days => {
                let tz = self.zone().ok()?;
                let local = self.start_time.with_timezone(&tz).naive_local();
                let shifted = local.checked_add_days(Days::new(u64::try_from(steps).ok()?))?;
                resolve_local(&tz, shifted)
            }
            unit => self
                .start_time
                .checked_add_signed(Duration::try_milliseconds(unit.to_millis(steps)?)?),
        }
    }

    fn advance(&self) -> (Option<DateTime<Utc>>, Self) {
        let mut next = self.clone();
        let Some(current) = self.next_fire_time else {
            return (None, next);
        };
        if self.past_end(current) {
            next.next_fire_time = None;
            next.end_time_reached = true;
            return (None, next);
        }

        next.current_repeat_count = self.current_repeat_count.saturating_add(1);
        let following = if next.repetitions_exhausted() {
            None
        } else {
            self.occurrence(next.current_repeat_count)
                .filter(|instant| !self.past_end(*instant))
        };
        next.end_time_reached = following.is_none();
        next.next_fire_time = following;
        (Some(current), next)
    }

    fn skip_until(&self, threshold: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if self.next_fire_time.map_or(true, |current| current >= threshold) {
            return next;
        }

        // Start one period early: day occurrences drift from the nominal
        // length by the zone's DST shifts.
        let nominal = self
            .period_unit
            .to_millis(self.period)
            .unwrap_or(i64::MAX)
            .max(1);
        let elapsed = threshold
            .signed_duration_since(self.start_time)
            .num_milliseconds();
        let mut index = i32::try_from(elapsed / nominal - 1)
            .unwrap_or(i32::MAX)
            .max(self.current_repeat_count);

        let following = loop {
            next.current_repeat_count = index;
            if next.repetitions_exhausted() {
                break None;
            }
            match self.occurrence(index) {
                Some(instant) if instant < threshold && index < i32::MAX => index += 1,
                Some(instant) if instant >= threshold => break Some(instant),
                _ => break None,
            }
        }
        .filter(|instant| !self.past_end(*instant));

        next.end_time_reached = following.is_none();
        next.next_fire_time = following;
        next
    }
}

/// Map a local wall-clock time to an absolute instant.
///
/// Ambiguous times (DST fall-back) take the earlier mapping. Times inside a
/// DST gap are read with the offset in force before the gap, which moves
/// them forward by the length of the gap.
fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let before = local.checked_sub_signed(Duration::try_days(1)?)?;
            let offset = tz.from_local_datetime(&before).earliest()?.offset().fix();
            let utc = local.checked_sub_signed(Duration::try_seconds(i64::from(
                offset.local_minus_utc(),
            ))?)?;
            Some(Utc.from_utc_datetime(&utc))
        }
    }
}

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    PointInTime(PointInTimeTrigger),
    Interval(IntervalTrigger),
    SimpleTimer(SimpleTimerTrigger),
}

impl Trigger {
    /// A trigger firing once at `at`.
    pub fn point_in_time(at: DateTime<Utc>) -> Self {
        Trigger::PointInTime(PointInTimeTrigger {
            next_fire_time: Some(at),
        })
    }

    /// A trigger firing every `period_ms` from `start_time`.
    ///
    /// # Errors
    ///
    /// Returns `TypesError::InvalidTrigger` for a non-positive period or an
    /// end time before the start time.
    pub fn interval(
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        repeat_limit: i32,
        period_ms: i64,
    ) -> Result<Self, TypesError> {
        if period_ms <= 0 {
            return Err(TypesError::InvalidTrigger(format!(
                "period must be positive, got {}ms",
                period_ms
            )));
        }
        check_window(start_time, end_time)?;

        Ok(Trigger::Interval(IntervalTrigger {
            start_time,
            end_time,
            repeat_limit,
            repeat_count: 0,
            period_ms,
            next_fire_time: Some(start_time),
        }))
    }

    /// A zone-aware trigger firing every `period` units from `start_time`.
    ///
    /// `repeat_count` is the number of repetitions after the first firing.
    ///
    /// # Errors
    ///
    /// Returns `TypesError::InvalidTimezone` for an unknown zone id and
    /// `TypesError::InvalidTrigger` for a bad period or window.
    pub fn simple_timer(
        start_time: DateTime<Utc>,
        period: i64,
        period_unit: TimeUnit,
        repeat_count: i32,
        end_time: Option<DateTime<Utc>>,
        zone_id: &str,
    ) -> Result<Self, TypesError> {
        if period <= 0 {
            return Err(TypesError::InvalidTrigger(format!(
                "period must be positive, got {}",
                period
            )));
        }
        check_window(start_time, end_time)?;

        let trigger = SimpleTimerTrigger {
            start_time,
            period,
            period_unit,
            repeat_count,
            end_time,
            zone_id: zone_id.to_string(),
            next_fire_time: Some(start_time),
            current_repeat_count: 0,
            end_time_reached: false,
        };
        trigger.zone()?;
        Ok(Trigger::SimpleTimer(trigger))
    }

    /// Stable name of the trigger kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::PointInTime(_) => "point_in_time",
            Trigger::Interval(_) => "interval",
            Trigger::SimpleTimer(_) => "simple_timer",
        }
    }

    /// Peek at the upcoming fire instant without advancing.
    pub fn has_next_fire_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Trigger::PointInTime(t) => t.next_fire_time,
            Trigger::Interval(t) => t.next_fire_time,
            Trigger::SimpleTimer(t) => t.next_fire_time,
        }
    }

    /// Consume the upcoming firing.
    ///
    /// Returns the instant that fires now (or `None` when exhausted) and the
    /// advanced trigger. Call once per actual firing, never speculatively.
    pub fn next_fire_time(&self) -> (Option<DateTime<Utc>>, Trigger) {
        match self {
            Trigger::PointInTime(t) => (
                t.next_fire_time,
                Trigger::PointInTime(PointInTimeTrigger {
                    next_fire_time: None,
                }),
            ),
            Trigger::Interval(t) => {
                let (fired, next) = t.advance();
                (fired, Trigger::Interval(next))
            }
            Trigger::SimpleTimer(t) => {
                let (fired, next) = t.advance();
                (fired, Trigger::SimpleTimer(next))
            }
        }
    }

    /// Drop every occurrence earlier than `threshold` without firing it.
    ///
    /// Skipped occurrences count toward repeat limits. The result is
    /// exhausted if no occurrence at or after `threshold` remains.
    pub fn skip_until(&self, threshold: DateTime<Utc>) -> Trigger {
        match self {
            Trigger::PointInTime(t) => Trigger::PointInTime(PointInTimeTrigger {
                next_fire_time: t.next_fire_time.filter(|at| *at >= threshold),
            }),
            Trigger::Interval(t) => Trigger::Interval(t.skip_until(threshold)),
            Trigger::SimpleTimer(t) => Trigger::SimpleTimer(t.skip_until(threshold)),
        }
    }

    /// Up to `count` upcoming fire instants; `self` is left untouched.
    pub fn preview(&self, count: usize) -> Vec<DateTime<Utc>> {
        let mut instants = Vec::with_capacity(count);
        let mut current = self.clone();
        while instants.len() < count {
            let (fired, next) = current.next_fire_time();
            match fired {
                Some(instant) => instants.push(instant),
                None => break,
            }
            current = next;
        }
        instants
    }
}

fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), TypesError> {
    match end {
        Some(end) if end < start => Err(TypesError::InvalidTrigger(format!(
            "end time {} is before start time {}",
            end, start
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_point_in_time_fires_once() {
        let at = utc("2024-05-01T10:00:00Z");
        let trigger = Trigger::point_in_time(at);
        assert_eq!(trigger.has_next_fire_time(), Some(at));

        let (fired, trigger) = trigger.next_fire_time();
        assert_eq!(fired, Some(at));
        assert_eq!(trigger.has_next_fire_time(), None);

        let (fired, _) = trigger.next_fire_time();
        assert_eq!(fired, None);
    }

    #[test]
    fn test_peek_is_idempotent() {
        let trigger = Trigger::interval(utc("2024-05-01T10:00:00Z"), None, 3, 2000).unwrap();
        let first = trigger.has_next_fire_time();
        assert_eq!(trigger.has_next_fire_time(), first);
        assert_eq!(trigger.has_next_fire_time(), first);
    }

    #[test]
    fn test_interval_repeat_limit_caps_total_firings() {
        let start = utc("2024-05-01T10:00:00Z");
        let mut trigger = Trigger::interval(start, None, 3, 2000).unwrap();

        let mut fired = Vec::new();
        for _ in 0..3 {
            let (instant, next) = trigger.next_fire_time();
            fired.push(instant.unwrap());
            trigger = next;
        }
        assert_eq!(
            fired,
            vec![
                start,
                utc("2024-05-01T10:00:02Z"),
                utc("2024-05-01T10:00:04Z")
            ]
        );
        assert_eq!(trigger.has_next_fire_time(), None);
        let (instant, _) = trigger.next_fire_time();
        assert_eq!(instant, None);

        match trigger {
            Trigger::Interval(t) => assert_eq!(t.repeat_count, 3),
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_interval_unlimited_stops_at_end_time() {
        let start = utc("2024-05-01T10:00:00Z");
        let end = utc("2024-05-01T10:00:05Z");
        let trigger = Trigger::interval(start, Some(end), 0, 2000).unwrap();

        let instants = trigger.preview(10);
        assert_eq!(
            instants,
            vec![
                start,
                utc("2024-05-01T10:00:02Z"),
                utc("2024-05-01T10:00:04Z")
            ]
        );
    }

    #[test]
    fn test_interval_rejects_bad_period_and_window() {
        let start = utc("2024-05-01T10:00:00Z");
        assert!(matches!(
            Trigger::interval(start, None, 1, 0),
            Err(TypesError::InvalidTrigger(_))
        ));
        assert!(matches!(
            Trigger::interval(start, Some(utc("2024-04-01T10:00:00Z")), 1, 1000),
            Err(TypesError::InvalidTrigger(_))
        ));
    }

    #[test]
    fn test_simple_timer_fires_repeat_count_plus_one() {
        let start = utc("2024-05-01T10:00:00Z");
        let mut trigger =
            Trigger::simple_timer(start, 30, TimeUnit::Seconds, 2, None, "UTC").unwrap();

        let mut count = 0;
        loop {
            let (instant, next) = trigger.next_fire_time();
            trigger = next;
            match instant {
                Some(_) => count += 1,
                None => break,
            }
        }
        assert_eq!(count, 3);

        match trigger {
            Trigger::SimpleTimer(t) => {
                assert!(t.end_time_reached);
                assert_eq!(t.current_repeat_count, 3);
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_simple_timer_zero_repeat_fires_once() {
        let start = utc("2024-05-01T10:00:00Z");
        let trigger = Trigger::simple_timer(start, 1, TimeUnit::Hours, 0, None, "UTC").unwrap();
        assert_eq!(trigger.preview(5), vec![start]);
    }

    #[test]
    fn test_simple_timer_end_time_marks_reached() {
        let start = utc("2024-05-01T10:00:00Z");
        let end = utc("2024-05-01T12:30:00Z");
        let mut trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Hours, -1, Some(end), "UTC").unwrap();

        assert_eq!(trigger.preview(10).len(), 3);
        for _ in 0..3 {
            trigger = trigger.next_fire_time().1;
        }
        match &trigger {
            Trigger::SimpleTimer(t) => assert!(t.end_time_reached),
            other => panic!("unexpected trigger {:?}", other),
        }
        assert_eq!(trigger.has_next_fire_time(), None);
    }

    #[test]
    fn test_simple_timer_daily_keeps_local_time_across_dst() {
        // 09:00 EST on the day before the US spring-forward transition
        let start = utc("2024-03-09T14:00:00Z");
        let trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Days, 2, None, "America/New_York").unwrap();

        assert_eq!(
            trigger.preview(3),
            vec![
                start,
                utc("2024-03-10T13:00:00Z"),
                utc("2024-03-11T13:00:00Z")
            ]
        );
    }

    #[test]
    fn test_simple_timer_hours_are_absolute_across_dst() {
        let start = utc("2024-03-10T06:00:00Z");
        let trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Hours, 1, None, "America/New_York").unwrap();
        assert_eq!(
            trigger.preview(2),
            vec![start, utc("2024-03-10T07:00:00Z")]
        );
    }

    #[test]
    fn test_simple_timer_gap_rolls_forward_without_drift() {
        // 02:30 CET; the next day's 02:30 falls into the Berlin DST gap
        let start = utc("2024-03-30T01:30:00Z");
        let trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Days, 2, None, "Europe/Berlin").unwrap();

        assert_eq!(
            trigger.preview(3),
            vec![
                start,
                utc("2024-03-31T01:30:00Z"),
                utc("2024-04-01T00:30:00Z")
            ]
        );
    }

    #[test]
    fn test_simple_timer_rejects_unknown_zone() {
        let result = Trigger::simple_timer(
            utc("2024-05-01T10:00:00Z"),
            1,
            TimeUnit::Days,
            0,
            None,
            "Mars/Olympus_Mons",
        );
        assert!(matches!(result, Err(TypesError::InvalidTimezone(_))));
    }

    #[test]
    fn test_zone_survives_serialization() {
        let start = utc("2024-03-09T14:00:00Z");
        let trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Days, 5, None, "America/New_York").unwrap();
        let advanced = trigger.next_fire_time().1;

        let json = serde_json::to_string(&advanced).unwrap();
        assert!(json.contains("\"type\":\"simple_timer\""));
        let decoded: Trigger = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, advanced);
        assert_eq!(
            decoded.has_next_fire_time(),
            Some(utc("2024-03-10T13:00:00Z"))
        );
    }

    #[test]
    fn test_preview_leaves_trigger_untouched() {
        let start = utc("2024-05-01T10:00:00Z");
        let trigger = Trigger::interval(start, None, 0, 1000).unwrap();
        assert_eq!(trigger.preview(4).len(), 4);
        assert_eq!(trigger.has_next_fire_time(), Some(start));
    }

    #[test]
    fn test_simple_timer_gap_shift_matches_zone_gap() {
        // Lord Howe springs forward by 30 minutes, 02:00 -> 02:30 local
        let start = utc("2024-10-04T15:45:00Z"); // 02:15 +10:30
        let trigger =
            Trigger::simple_timer(start, 1, TimeUnit::Days, 2, None, "Australia/Lord_Howe")
                .unwrap();

        assert_eq!(
            trigger.preview(3),
            vec![
                start,
                utc("2024-10-05T15:45:00Z"), // 02:45 +11:00
                utc("2024-10-06T15:15:00Z"), // 02:15 +11:00
            ]
        );
    }

    #[test]
    fn test_skip_until_interval_lands_on_next_occurrence() {
        let start = utc("2024-05-01T10:00:00Z");
        let trigger = Trigger::interval(start, None, 0, 60_000).unwrap();

        let skipped = trigger.skip_until(utc("2024-05-01T10:05:30Z"));
        assert_eq!(
            skipped.has_next_fire_time(),
            Some(utc("2024-05-01T10:06:00Z"))
        );
        match &skipped {
            Trigger::Interval(t) => assert_eq!(t.repeat_count, 6),
            other => panic!("unexpected trigger {:?}", other),
        }

        let on_boundary = trigger.skip_until(utc("2024-05-01T10:05:00Z"));
        assert_eq!(
            on_boundary.has_next_fire_time(),
            Some(utc("2024-05-01T10:05:00Z"))
        );

        // Nothing to skip
        assert_eq!(trigger.skip_until(utc("2024-05-01T09:00:00Z")), trigger);
    }

    #[test]
    fn test_skip_until_counts_skipped_toward_limit() {
        let start = utc("2024-05-01T10:00:00Z");
        let limited = Trigger::interval(start, None, 3, 60_000).unwrap();
        assert_eq!(
            limited
                .skip_until(utc("2024-05-01T10:05:00Z"))
                .has_next_fire_time(),
            None
        );

        let once = Trigger::point_in_time(start);
        assert_eq!(
            once.skip_until(utc("2024-05-01T10:00:01Z"))
                .has_next_fire_time(),
            None
        );
        assert_eq!(once.skip_until(start).has_next_fire_time(), Some(start));
    }

    #[test]
    fn test_skip_until_simple_timer_keeps_local_time() {
        // 09:00 CET, daily, across the Berlin spring-forward
        let start = utc("2024-03-29T08:00:00Z");
        let unlimited =
            Trigger::simple_timer(start, 1, TimeUnit::Days, -1, None, "Europe/Berlin").unwrap();

        let skipped = unlimited.skip_until(utc("2024-04-02T00:00:00Z"));
        assert_eq!(
            skipped.has_next_fire_time(),
            Some(utc("2024-04-02T07:00:00Z"))
        );
        match &skipped {
            Trigger::SimpleTimer(t) => {
                assert_eq!(t.current_repeat_count, 4);
                assert!(!t.end_time_reached);
            }
            other => panic!("unexpected trigger {:?}", other),
        }

        let three_firings =
            Trigger::simple_timer(start, 1, TimeUnit::Days, 2, None, "Europe/Berlin").unwrap();
        match three_firings.skip_until(utc("2024-04-02T00:00:00Z")) {
            Trigger::SimpleTimer(t) => {
                assert_eq!(t.next_fire_time, None);
                assert!(t.end_time_reached);
            }
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_time_unit_conversions() {
        assert_eq!(TimeUnit::Minutes.to_millis(2), Some(120_000));
        assert_eq!(TimeUnit::Days.to_millis(i64::MAX), None);
        assert_eq!(
            TimeUnit::Seconds.to_duration(3),
            std::time::Duration::from_secs(3)
        );
    }
}
