use chrono::{DateTime, Days, Duration, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};

/// Clock
///
/// Source of the current instant, expressed in the deployment's time zone so
/// that day-based durations follow the local calendar.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

pub type ClockState = Arc<dyn Clock>;

/// Wall clock in a fixed IANA zone.
#[derive(Clone, Debug)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Clock pinned to one instant. Used by tests.
#[derive(Clone, Debug)]
pub struct FixedClock {
    instant: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }

    /// Builds the instant from a local wall-clock time in `tz`. Times that fall
    /// in a DST gap or overlap are rejected rather than guessed.
    pub fn at(tz: Tz, year: i32, month: u32, day: u32, hour: u32, minute: u32) -> CoreResult<Self> {
        tz.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(Self::new)
            .ok_or_else(|| CoreError::validation("local time is nonexistent or ambiguous in this zone"))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.instant
    }
}

/// add_calendar_days
///
/// Adds `days` calendar days to `start`, keeping the local wall-clock time.
/// Across a DST change the result is therefore 23 or 25 hours per crossed day
/// away in absolute terms. When the target wall-clock time falls in a gap the
/// result moves forward past the gap; when it is ambiguous the earlier
/// instant is taken.
pub fn add_calendar_days(start: DateTime<Tz>, days: u64) -> CoreResult<DateTime<Tz>> {
    let tz = start.timezone();
    let local = start
        .naive_local()
        .checked_add_days(Days::new(days))
        .ok_or_else(|| CoreError::validation("ban duration is out of range"))?;

    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Ok(t),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => {
            // Gaps are at most an hour in the zones we care about; step forward.
            let shifted = local + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .ok_or_else(|| CoreError::internal("unresolvable local time after DST gap"))
        }
    }
}
