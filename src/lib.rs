//! # flaredns
//!
//! A dynamic DNS updater for Cloudflare.
//!
//! ## Features
//!
//! - Public IP detection over DNS (OpenDNS, Google) with HTTP fallbacks
//! - One-shot updates or a long-running polling daemon
//! - Self-healing: a record edited by someone else is put back on the next poll
//! - Typed status stream for presenting what the daemon is doing
//!
//! ## Usage
//!
//! ```bash
//! # Update once
//! flaredns --domain example.com --record home.example.com --token $CF_API_TOKEN
//!
//! # Keep the record up to date
//! DOMAIN=example.com RECORD=home.example.com TOKEN=... flaredns --daemon
//! ```

pub mod config;
pub mod daemon;
pub mod detector;
pub mod error;
pub mod providers;
pub mod status;

pub use config::Settings;
pub use daemon::{Daemon, DaemonConfig};
pub use detector::IpDetector;
pub use error::{DdnsError, Result};
