//! # edurtc-client-core - RTC client coordination layer
//!
//! This crate is the thin coordination layer an education web application
//! uses to run real-time audio/video calls over a pluggable RTC engine:
//!
//! - **Session management**: one engine client plus at most one local
//!   stream per [`session::StreamSession`], with promise-style async
//!   operations over the engine's callback API
//! - **Call coordination**: [`coordinator::CallCoordinator`] sequences
//!   join+publish, leave+teardown, and screen-share start/stop across the
//!   primary and secondary sessions
//! - **Event forwarding**: the engine's named event emissions become closed
//!   enums re-broadcast on session- and coordinator-level buses
//!
//! The engine itself (capture, codecs, transport, congestion control) sits
//! behind the [`sdk`] traits and is out of scope here; [`sdk::mock`] ships
//! a scriptable double for tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edurtc_client_core::{AdapterConfig, CallCoordinator, StreamSpec};
//! use edurtc_client_core::sdk::mock::MockRtcEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(MockRtcEngine::new());
//!     let config = AdapterConfig::new("my-app-id");
//!     let mut coordinator = CallCoordinator::new(engine, config);
//!
//!     // Listen before joining so no lifecycle event is missed
//!     let mut events = coordinator.subscribe();
//!
//!     coordinator.join_channel(42, "room1", false).await?;
//!     coordinator.publish_local_stream(&StreamSpec::camera(42)).await?;
//!
//!     // ... the call runs; events arrive on `events` ...
//!
//!     coordinator.leave_channel().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error policy
//!
//! Engine failures pass through unmodified inside [`AdapterError`]; there
//! are no retries and no classification. Remote-stream subscription is the
//! one fire-and-forget exception: its failures are logged and swallowed.

#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/edurtc-client-core/0.1.0")]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod sdk;
pub mod session;
pub mod types;

// Re-export main types
pub use config::AdapterConfig;
pub use coordinator::CallCoordinator;
pub use error::{AdapterError, AdapterResult};
pub use events::{
    ClientSdkEvent, ConnectionState, CoordinatorEvent, EventBus, SessionEvent, StreamSdkEvent,
};
pub use session::StreamSession;
pub use types::{
    AudioOutputSpec, MediaDeviceInfo, MediaDeviceKind, RemoteStreamType, SessionId, SessionRole,
    StreamSpec, Uid,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
