//! # relay-foundation
//!
//! Foundation layer for relay:
//! - Error: central error type and `Result` alias
//! - Storage: `JsonStore` for global / project JSON files
//! - Config: `RelayConfig` (global + project merge)
//! - Event: typed, synchronous `EventBus`

pub mod config;
pub mod error;
pub mod event;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{RelayConfig, RELAY_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Event
// ============================================================================
pub use event::{EventBus, EventListener, ListenerId};
