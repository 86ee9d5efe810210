//! Storage module for relay
//!
//! - `json`: JSON file store for configuration

mod json;

pub use json::JsonStore;
