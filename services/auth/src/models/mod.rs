//! Authentication service models

pub mod attendance;
pub mod pending_code;

// Re-export for convenience
pub use attendance::{
    AttendanceLogEntry, AttendanceLogView, AttendanceStatus, LogFilter, NewAttendanceEntry,
};
pub use pending_code::PendingCode;
