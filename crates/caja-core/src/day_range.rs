//! # Day Range
//!
//! Business-day boundaries and wall-clock formatting in the store's
//! timezone.
//!
//! ## Why Not the Device Clock Zone?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Instant: 2025-11-01T05:30:00Z                                          │
//! │                                                                         │
//! │  Terminal set to UTC:         day = 2025-11-01   ❌ wrong shift          │
//! │  Business tz (UTC-06:00):     day = 2025-10-31   ✅ 23:30 local         │
//! │                                                                         │
//! │  Stored stamps ("YYYY-MM-DD HH:MM:SS") are always business-local, so   │
//! │  two terminals with different OS settings write comparable values.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Date components are always read from the instant localized into the
//! business offset; the host's `TZ` is never consulted.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

/// Stored timestamp layout for `cierres.fecha`, `pagos.fecha_hora`, ...
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stored date-only layout (`gastos.fecha`).
pub const LOCAL_DATE_FORMAT: &str = "%Y-%m-%d";

const SECONDS_PER_DAY: i64 = 86_400;

// =============================================================================
// Business Timezone
// =============================================================================

/// The named timezone every persisted timestamp is written in.
///
/// Honduras observes no daylight saving, so a fixed offset represents
/// America/Tegucigalpa exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessTimezone {
    name: String,
    offset: FixedOffset,
}

impl BusinessTimezone {
    /// Builds a timezone from a name and its offset east of UTC in minutes.
    pub fn new(name: impl Into<String>, offset_minutes: i32) -> Result<Self, ValidationError> {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -1439,
                max: 1439,
            })?;
        Ok(BusinessTimezone {
            name: name.into(),
            offset,
        })
    }

    /// America/Tegucigalpa, UTC-06:00.
    pub fn honduras() -> Self {
        BusinessTimezone {
            name: "America/Tegucigalpa".to_string(),
            offset: FixedOffset::west_opt(6 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Wall-clock time at `instant` in this timezone.
    pub fn localize<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    /// The UTC instant of a business-local wall-clock time.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}

impl Default for BusinessTimezone {
    fn default() -> Self {
        BusinessTimezone::honduras()
    }
}

// =============================================================================
// Day Range
// =============================================================================

/// Calendar day in the business timezone: `[00:00:00, 23:59:59]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayRange {
    #[ts(as = "String")]
    pub day: NaiveDate,
    #[ts(as = "String")]
    pub start: NaiveDateTime,
    #[ts(as = "String")]
    pub end: NaiveDateTime,
}

impl DayRange {
    /// The business day containing `reference`, or the current instant.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::day_range::{BusinessTimezone, DayRange};
    /// use chrono::{TimeZone, Utc};
    ///
    /// // 23:30 in Tegucigalpa on Oct 31 is already Nov 1 in UTC.
    /// let instant = Utc.with_ymd_and_hms(2025, 11, 1, 5, 30, 0).unwrap();
    /// let range = DayRange::compute(Some(instant), &BusinessTimezone::honduras());
    ///
    /// assert_eq!(range.day_str(), "2025-10-31");
    /// assert_eq!(range.start_str(), "2025-10-31 00:00:00");
    /// assert_eq!(range.end_str(), "2025-10-31 23:59:59");
    /// ```
    pub fn compute(reference: Option<DateTime<Utc>>, tz: &BusinessTimezone) -> Self {
        let instant = reference.unwrap_or_else(Utc::now);
        Self::for_local_date(tz.localize(&instant).date())
    }

    /// The range for a known business date.
    pub fn for_local_date(day: NaiveDate) -> Self {
        let start = day.and_time(NaiveTime::MIN);
        let end = start + Duration::seconds(SECONDS_PER_DAY - 1);
        DayRange { day, start, end }
    }

    pub fn day_str(&self) -> String {
        self.day.format(LOCAL_DATE_FORMAT).to_string()
    }

    pub fn start_str(&self) -> String {
        self.start.format(LOCAL_TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(LOCAL_TIMESTAMP_FORMAT).to_string()
    }

    /// Inclusive on both ends.
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        local >= self.start && local <= self.end
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Formats `instant` as `YYYY-MM-DD HH:MM:SS` in the business timezone.
pub fn format_local<Tz: TimeZone>(instant: &DateTime<Tz>, tz: &BusinessTimezone) -> String {
    tz.localize(instant).format(LOCAL_TIMESTAMP_FORMAT).to_string()
}

/// Formats an already-localized timestamp in the stored layout.
pub fn format_naive(local: &NaiveDateTime) -> String {
    local.format(LOCAL_TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored `YYYY-MM-DD HH:MM:SS` business-local timestamp.
///
/// A bare `YYYY-MM-DD` is accepted as midnight, matching rows written
/// before stamps carried a time.
pub fn parse_local(value: &str) -> Result<NaiveDateTime, ValidationError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, LOCAL_TIMESTAMP_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(value, LOCAL_DATE_FORMAT).map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| ValidationError::invalid_format("timestamp", format!("'{}': {}", value, e)))
}

/// Parses a stored `YYYY-MM-DD` business date.
pub fn parse_local_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), LOCAL_DATE_FORMAT)
        .map_err(|e| ValidationError::invalid_format("date", format!("'{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_late_evening_stays_on_local_day() {
        // 23:30 on 2025-10-31 in UTC-6
        let range = DayRange::compute(Some(at(2025, 11, 1, 5, 30, 0)), &BusinessTimezone::honduras());
        assert_eq!(range.day_str(), "2025-10-31");
        assert_eq!(range.start_str(), "2025-10-31 00:00:00");
        assert_eq!(range.end_str(), "2025-10-31 23:59:59");
    }

    #[test]
    fn test_day_depends_only_on_business_offset() {
        let instant = at(2025, 11, 1, 5, 30, 0);
        let honduras = DayRange::compute(Some(instant), &BusinessTimezone::honduras());
        let utc = DayRange::compute(Some(instant), &BusinessTimezone::new("UTC", 0).unwrap());
        let manila = DayRange::compute(Some(instant), &BusinessTimezone::new("Asia/Manila", 480).unwrap());

        assert_eq!(honduras.day_str(), "2025-10-31");
        assert_eq!(utc.day_str(), "2025-11-01");
        assert_eq!(manila.day_str(), "2025-11-01");
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(BusinessTimezone::new("Far", 24 * 60).is_err());
        // Large enough that seconds overflow i32
        for minutes in [40_000_000, i32::MAX, i32::MIN] {
            let err = BusinessTimezone::new("Far", minutes).unwrap_err();
            assert!(matches!(err, ValidationError::OutOfRange { .. }));
        }
    }

    #[test]
    fn test_format_local() {
        let tz = BusinessTimezone::honduras();
        assert_eq!(format_local(&at(2025, 11, 1, 5, 30, 15), &tz), "2025-10-31 23:30:15");

        // Same instant expressed in another offset formats identically
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = at(2025, 11, 1, 5, 30, 15).with_timezone(&plus_two);
        assert_eq!(format_local(&shifted, &tz), "2025-10-31 23:30:15");
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DayRange::for_local_date(NaiveDate::from_ymd_opt(2025, 10, 31).unwrap());
        assert!(range.contains(range.start));
        assert!(range.contains(range.end));
        assert!(!range.contains(range.end + Duration::seconds(1)));
    }

    #[test]
    fn test_to_utc_inverts_localize() {
        let tz = BusinessTimezone::honduras();
        let instant = at(2025, 3, 9, 2, 15, 0);
        assert_eq!(tz.to_utc(tz.localize(&instant)), instant);
    }

    #[test]
    fn test_parse_local() {
        let parsed = parse_local("2025-10-31 23:30:00").unwrap();
        assert_eq!(format_naive(&parsed), "2025-10-31 23:30:00");

        let midnight = parse_local("2025-10-31").unwrap();
        assert_eq!(format_naive(&midnight), "2025-10-31 00:00:00");

        assert!(parse_local("31/10/2025").is_err());
        assert_eq!(
            parse_local_date("2025-10-31").unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(BusinessTimezone::new("Nowhere", 24 * 60).is_err());
    }
}
