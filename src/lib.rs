//! # Filterbank Directory Monitor
//!
//! A long-lived daemon that watches the output tree of a radio-telescope
//! beamforming pipeline, computes per-channel bandpass statistics (mean and
//! standard deviation) from the most recently completed filterbank file of
//! each beam, and publishes the results to a shared key-value store for
//! dashboards to render. The store is the only thing this process writes;
//! the scanned filesystem is strictly read-only.
//!
//! ## Crate Structure
//!
//! - **`bandpass`**: the per-channel statistics table and its packed,
//!   language-neutral wire layout.
//! - **`config`**: TOML + environment configuration with validation. See
//!   [`config::MonitorConfig`].
//! - **`error`**: the [`MonitorError`] enum shared across the crate.
//! - **`filterbank`**: SIGPROC header parsing and chunked statistics
//!   extraction over the sample data.
//! - **`monitor`**: the periodic scan → extract → publish loop with
//!   per-cycle failure isolation.
//! - **`scanner`**: recording-directory and beam-file selection heuristics.
//! - **`store`**: the [`store::SnapshotStore`] seam with Redis and
//!   in-memory implementations.

pub mod bandpass;
pub mod config;
pub mod error;
pub mod filterbank;
pub mod monitor;
pub mod scanner;
pub mod store;

pub use error::{MonitorError, MonitorResult};
