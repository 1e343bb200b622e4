//! # callflow-core
//!
//! Core library for callflow - a journey and insights viewer for voice agent calls.
//!
//! This library provides:
//! - Domain types for calls, transcripts, tool invocations and timeline stages
//! - Timestamp normalization and elapsed-time formatting
//! - The call timeline builder
//! - Escalation and engagement insights
//! - Call sources (HTTP API or saved JSON files)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Source:** raw API responses, read through a [`CallSource`]
//! - **Normalized:** timestamps coerced to UTC instants, payloads decoded
//! - **Derived:** ordered stages, journeys and dashboard statistics
//!
//! ## Example
//!
//! ```rust,no_run
//! use callflow_core::{load_journey, Config, HttpCallSource};
//!
//! let config = Config::load().expect("failed to load config");
//! let source = HttpCallSource::new(config.api).expect("failed to create source");
//!
//! let journey = load_journey(&source, "call-123", chrono::Utc::now())
//!     .expect("failed to load journey");
//! for stage in &journey.stages {
//!     println!("{} {}", stage.icon, stage.name);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use insights::DashboardStats;
pub use journey::{recent_calls, CallJourney, CallRow};
pub use source::{load_all_details, load_journey, CallSource, FileCallSource, HttpCallSource};
pub use time::{normalize_timestamp, CallDuration};
pub use timeline::{build_timeline, RoleInference};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod format;
pub mod insights;
pub mod journey;
pub mod logging;
pub mod source;
pub mod time;
pub mod timeline;
pub mod types;
