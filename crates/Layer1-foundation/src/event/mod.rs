//! Event System - synchronous publish/subscribe
//!
//! A small, typed listener bus. Publishing calls every listener inline, in
//! subscription order, on the publishing thread:
//!
//! ```text
//! publish(event) ──▶ Listener 1 ──▶ Listener 2 ──▶ ... ──▶ Listener N
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use relay_foundation::event::EventBus;
//!
//! let bus: EventBus<String> = EventBus::new();
//! let id = bus.subscribe_fn("printer", |event: &String| println!("{}", event));
//! bus.publish(&"hello".to_string());
//! bus.unsubscribe(id);
//! ```

pub mod bus;

pub use bus::{EventBus, EventListener, ListenerId};
