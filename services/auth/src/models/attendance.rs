//! Attendance log model and related functionality

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Outcome of one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Success,
    Failed,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Success => "SUCCESS",
            AttendanceStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(AttendanceStatus::Success),
            "FAILED" => Ok(AttendanceStatus::Failed),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

/// Attendance log entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub phone_number: String,
    pub otp: String,
    pub status: AttendanceStatus,
    pub created_at: DateTime<Utc>,
}

/// New attendance entry payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttendanceEntry {
    pub user_id: i64,
    pub phone_number: String,
    pub otp: String,
    pub status: AttendanceStatus,
}

/// Attendance entry joined with the profile name, as listed by `/api/logs`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceLogView {
    pub name: String,
    pub phone_number: String,
    pub otp: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for attendance listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    /// Case-insensitive substring of the profile name
    pub name: Option<String>,
    /// First day included
    pub from: Option<NaiveDate>,
    /// Last day included
    pub to: Option<NaiveDate>,
    /// Filter by status
    pub status: Option<AttendanceStatus>,
}

impl LogFilter {
    /// Start of the range, at 00:00:00 UTC of `from`
    pub fn from_time(&self) -> Option<DateTime<Utc>> {
        self.from.map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// End of the range, at 23:59:59 UTC of `to`
    pub fn to_time(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc())
    }

    /// Lowercased name needle, ignoring blank input
    pub fn name_needle(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether a listed entry passes every set filter
    pub fn matches(&self, view: &AttendanceLogView) -> bool {
        let name_ok = self
            .name_needle()
            .is_none_or(|needle| view.name.to_lowercase().contains(&needle));
        let from_ok = self.from_time().is_none_or(|from| view.created_at >= from);
        let to_ok = self.to_time().is_none_or(|to| view.created_at <= to);
        let status_ok = self
            .status
            .is_none_or(|status| view.status.eq_ignore_ascii_case(status.as_str()));

        name_ok && from_ok && to_ok && status_ok
    }
}
