use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, Offset as _, SecondsFormat, TimeZone as _, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// The only accepted input layout: naive wall-clock time, no offset.
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("'{value}' is not a 'YYYY-MM-DD HH:MM:SS' timestamp: {source}")]
    InvalidFormat {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("local time {local} cannot be placed in {timezone}")]
    Unresolvable { local: NaiveDateTime, timezone: Tz },
}

/// Reads naive local timestamps as wall-clock time in one fixed zone and
/// renders them in UTC.
///
/// Daylight-saving edge cases:
/// - an ambiguous time (clocks going back) resolves to the earliest instant,
/// - a nonexistent time (clocks going forward) is read with the offset in force
///   one hour earlier, i.e. standard time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampNormalizer {
    timezone: Tz,
}

impl TimestampNormalizer {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn to_utc(&self, value: &str) -> Result<DateTime<Utc>, TimestampError> {
        let local = NaiveDateTime::parse_from_str(value, LOCAL_TIMESTAMP_FORMAT).map_err(
            |source| TimestampError::InvalidFormat {
                value: value.to_string(),
                source,
            },
        )?;

        let zoned = match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => self.resolve_gap(local)?,
        };

        Ok(zoned.with_timezone(&Utc))
    }

    /// UTC rendering with an explicit offset, e.g. `2018-07-02T10:00:00+00:00`.
    pub fn normalize(&self, value: &str) -> Result<String, TimestampError> {
        Ok(self
            .to_utc(value)?
            .to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    fn resolve_gap(&self, local: NaiveDateTime) -> Result<DateTime<Tz>, TimestampError> {
        let unresolvable = || TimestampError::Unresolvable {
            local,
            timezone: self.timezone,
        };
        let before_gap = local - Duration::hours(1);
        let offset = self
            .timezone
            .offset_from_local_datetime(&before_gap)
            .earliest()
            .ok_or_else(unresolvable)?;
        let utc = local - Duration::seconds(i64::from(offset.fix().local_minus_utc()));
        Ok(self.timezone.from_utc_datetime(&utc))
    }
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Oslo)
    }
}
