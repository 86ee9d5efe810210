//! # relay-task
//!
//! Background process supervision for relay.
//! Runs shell commands as tracked tasks without blocking the caller.
//!
//! ## Features
//!
//! - Task lifecycle (`Pending → Running → Done | Error | Cancelled`)
//! - Rolling, bounded stdout/stderr capture
//! - Two-phase cancellation (graceful signal, forced kill after a grace period)
//! - Lifecycle events with record snapshots
//! - Human-readable status summaries

pub mod buffer;
pub mod event;
pub mod format;
pub mod state;
pub mod supervisor;
pub mod task;

pub use buffer::{OutputBuffer, DEFAULT_BUFFER_CAPACITY};
pub use event::{TaskEvent, TaskEventKind};
pub use format::StatusFormatter;
pub use state::TaskStatus;
pub use supervisor::{ProcessSupervisor, SupervisorConfig, DEFAULT_GRACE_PERIOD};
pub use task::{TaskFailure, TaskId, TaskRecord};
