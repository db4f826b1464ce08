//! Repositories for database operations

pub mod attendance;

pub use attendance::{
    AttendanceLogger, AttendanceRepository, MemoryAttendanceRepository, PgAttendanceRepository,
    StorageError,
};
