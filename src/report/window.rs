use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AttendanceError, AttendanceResult},
    models::SessionRecord,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WindowKind {
    Last7Days,
    Last28Days,
    Custom,
    AllTime,
}

impl Default for WindowKind {
    fn default() -> Self {
        WindowKind::Last7Days
    }
}

/// Date range a report is restricted to. Every bound is inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReportWindow {
    /// From midnight (UTC) seven days before today up to now.
    Last7Days,
    /// From midnight (UTC) twenty-eight days before today up to now.
    Last28Days,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    AllTime,
}

impl ReportWindow {
    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> AttendanceResult<Self> {
        if start > end {
            return Err(AttendanceError::validation(format!(
                "window start {start} is after end {end}"
            )));
        }
        Ok(ReportWindow::Custom { start, end })
    }

    /// Whole calendar days, `start` 00:00 through the last instant of `end`.
    pub fn custom_dates(start: NaiveDate, end: NaiveDate) -> AttendanceResult<Self> {
        let end_of_day = end
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .ok_or_else(|| AttendanceError::validation(format!("invalid end date {end}")))?;
        Self::custom(start.and_time(NaiveTime::MIN).and_utc(), end_of_day.and_utc())
    }

    /// Window for a configured kind. `Custom` needs explicit bounds; the
    /// other kinds ignore them.
    pub fn from_kind(
        kind: WindowKind,
        custom: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> AttendanceResult<Self> {
        match kind {
            WindowKind::Last7Days => Ok(ReportWindow::Last7Days),
            WindowKind::Last28Days => Ok(ReportWindow::Last28Days),
            WindowKind::AllTime => Ok(ReportWindow::AllTime),
            WindowKind::Custom => {
                let (start, end) = custom.ok_or_else(|| {
                    AttendanceError::validation("a custom window needs a start and an end")
                })?;
                Self::custom(start, end)
            }
        }
    }

    pub fn kind(&self) -> WindowKind {
        match self {
            ReportWindow::Last7Days => WindowKind::Last7Days,
            ReportWindow::Last28Days => WindowKind::Last28Days,
            ReportWindow::Custom { .. } => WindowKind::Custom,
            ReportWindow::AllTime => WindowKind::AllTime,
        }
    }

    /// Inclusive bounds at `now`; `None` means unbounded.
    pub fn bounds(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            ReportWindow::Last7Days => Some((days_back(now, 7), now)),
            ReportWindow::Last28Days => Some((days_back(now, 28), now)),
            ReportWindow::Custom { start, end } => Some((*start, *end)),
            ReportWindow::AllTime => None,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.bounds(now) {
            Some((start, end)) => instant >= start && instant <= end,
            None => true,
        }
    }
}

fn days_back(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    (now.date_naive() - Duration::days(days))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Records captured inside `window`, in their original order.
pub fn filter_by_window(
    records: &[SessionRecord],
    window: &ReportWindow,
    now: DateTime<Utc>,
) -> Vec<SessionRecord> {
    records
        .iter()
        .filter(|record| window.contains(record.captured_at, now))
        .cloned()
        .collect()
}
