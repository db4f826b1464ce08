//! Attendance repository for database operations
//!
//! Entries are append-only: nothing here updates or deletes a logged
//! attempt.

use async_trait::async_trait;
use chrono::Utc;
use common::{Profile, Role};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::models::{
    AttendanceLogEntry, AttendanceLogView, AttendanceStatus, LogFilter, NewAttendanceEntry,
};

/// Persistence failure while reading profiles or writing the audit trail
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

/// Profile lookup and attendance persistence
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    /// Find the registered profile behind a user id
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StorageError>;

    /// Append one attendance entry
    async fn record(&self, entry: &NewAttendanceEntry) -> Result<AttendanceLogEntry, StorageError>;

    /// List entries joined with profile names, newest first
    async fn list(&self, filter: &LogFilter) -> Result<Vec<AttendanceLogView>, StorageError>;
}

/// PostgreSQL attendance repository
#[derive(Clone)]
pub struct PgAttendanceRepository {
    pool: PgPool,
}

impl PgAttendanceRepository {
    /// Create a new attendance repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceRepository for PgAttendanceRepository {
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, phone_number, designation, photo, is_admin
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let is_admin: i16 = row.get("is_admin");
                let role = Role::try_from(is_admin.clamp(0, 2) as u8).unwrap_or_default();
                let profile = Profile {
                    id: row.get("id"),
                    name: row.get("name"),
                    phone_number: row
                        .get::<Option<String>, _>("phone_number")
                        .unwrap_or_default(),
                    email: row.get("email"),
                    designation: row.get("designation"),
                    photo: row.get("photo"),
                    role,
                };
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    async fn record(&self, entry: &NewAttendanceEntry) -> Result<AttendanceLogEntry, StorageError> {
        info!(
            "Recording {} attendance attempt for user {}",
            entry.status, entry.user_id
        );

        let row = sqlx::query(
            r#"
            INSERT INTO attendance_logs (user_id, phone_number, otp, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.phone_number)
        .bind(&entry.otp)
        .bind(entry.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(AttendanceLogEntry {
            id: row.get("id"),
            user_id: entry.user_id,
            phone_number: entry.phone_number.clone(),
            otp: entry.otp.clone(),
            status: entry.status,
            created_at: row.get("created_at"),
        })
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<AttendanceLogView>, StorageError> {
        let logs = sqlx::query_as::<_, AttendanceLogView>(
            r#"
            SELECT COALESCE(profiles.name, 'Unknown') AS name,
                   attendance_logs.phone_number,
                   attendance_logs.otp,
                   attendance_logs.status,
                   attendance_logs.created_at
            FROM attendance_logs
            LEFT JOIN profiles ON attendance_logs.user_id = profiles.id
            WHERE ($1::TEXT IS NULL OR LOWER(COALESCE(profiles.name, 'Unknown')) LIKE '%' || $1 || '%')
              AND ($2::TIMESTAMPTZ IS NULL OR attendance_logs.created_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR attendance_logs.created_at <= $3)
              AND ($4::TEXT IS NULL OR attendance_logs.status = $4)
            ORDER BY attendance_logs.created_at DESC, attendance_logs.id DESC
            "#,
        )
        .bind(filter.name_needle())
        .bind(filter.from_time())
        .bind(filter.to_time())
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

/// In-memory attendance repository for tests and storage-less runs
#[derive(Clone, Default)]
pub struct MemoryAttendanceRepository {
    profiles: Arc<Mutex<HashMap<i64, Profile>>>,
    entries: Arc<Mutex<Vec<AttendanceLogEntry>>>,
}

impl MemoryAttendanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile so attempts for it can be validated and named
    pub async fn insert_profile(&self, profile: Profile) {
        self.profiles.lock().await.insert(profile.id, profile);
    }

    /// Every recorded entry in insertion order
    pub async fn entries(&self) -> Vec<AttendanceLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AttendanceRepository for MemoryAttendanceRepository {
    async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StorageError> {
        Ok(self.profiles.lock().await.get(&id).cloned())
    }

    async fn record(&self, entry: &NewAttendanceEntry) -> Result<AttendanceLogEntry, StorageError> {
        let mut entries = self.entries.lock().await;
        let logged = AttendanceLogEntry {
            id: entries.len() as i64 + 1,
            user_id: entry.user_id,
            phone_number: entry.phone_number.clone(),
            otp: entry.otp.clone(),
            status: entry.status,
            created_at: Utc::now(),
        };
        entries.push(logged.clone());
        Ok(logged)
    }

    async fn list(&self, filter: &LogFilter) -> Result<Vec<AttendanceLogView>, StorageError> {
        let profiles = self.profiles.lock().await;
        let entries = self.entries.lock().await;

        let mut logs: Vec<(i64, AttendanceLogView)> = entries
            .iter()
            .map(|entry| {
                let name = profiles
                    .get(&entry.user_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                let view = AttendanceLogView {
                    name,
                    phone_number: entry.phone_number.clone(),
                    otp: entry.otp.clone(),
                    status: entry.status.to_string(),
                    created_at: entry.created_at,
                };
                (entry.id, view)
            })
            .filter(|(_, view)| filter.matches(view))
            .collect();

        logs.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at.cmp(&a.created_at).then(b_id.cmp(a_id))
        });

        Ok(logs.into_iter().map(|(_, view)| view).collect())
    }
}

/// Attendance logger used by the verification pipeline
///
/// A failed write is reported to the operator log and returned to the
/// caller; it never decides the outcome of a verification.
#[derive(Clone)]
pub struct AttendanceLogger {
    repository: Arc<dyn AttendanceRepository>,
}

impl AttendanceLogger {
    pub fn new(repository: Arc<dyn AttendanceRepository>) -> Self {
        Self { repository }
    }

    /// Append one entry for a verification attempt
    pub async fn record(
        &self,
        user_id: i64,
        phone: &str,
        code: &str,
        status: AttendanceStatus,
    ) -> Result<AttendanceLogEntry, StorageError> {
        let entry = NewAttendanceEntry {
            user_id,
            phone_number: phone.to_string(),
            otp: code.to_string(),
            status,
        };

        self.repository.record(&entry).await.map_err(|e| {
            error!(
                "Failed to record {} attendance for user {} ({}): {}",
                status, user_id, phone, e
            );
            e
        })
    }

    pub async fn find_profile(&self, id: i64) -> Result<Option<Profile>, StorageError> {
        self.repository.find_profile(id).await
    }

    pub async fn list(&self, filter: &LogFilter) -> Result<Vec<AttendanceLogView>, StorageError> {
        self.repository.list(filter).await
    }
}
