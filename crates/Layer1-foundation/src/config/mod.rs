//! Config - layered configuration
//!
//! - `relay.rs` - `RelayConfig` (global + project merge)

mod relay;

pub use relay::{RelayConfig, RELAY_CONFIG_FILE};
