//! # Game Server Status Monitor
//!
//! This library keeps a list of SA-MP game servers and reports, for each of
//! them, whether it answers the UDP info query and what it advertises: its
//! name, player count and player limit.
//!
//! ## Core Responsibilities
//!
//! ### Endpoint Registry
//! An insertion-ordered list of `(host, port, added_by)` records, unique on
//! `(host, port)`, optionally persisted as a JSON array. Mutations are
//! serialized; probe cycles only read snapshots.
//!
//! ### Status Probing
//! One probe is one datagram out and at most one datagram back, on a socket
//! owned by that probe alone. Timeouts, socket errors and malformed replies
//! all fold into an offline result at the probe boundary, so nothing above
//! it has to handle network failures.
//!
//! ### Probe Cycles
//! A cycle takes a registry snapshot, fans out one probe per endpoint under
//! a concurrency cap, and reassembles results by index. The cost of a cycle
//! is bounded by `ceil(N / K)` probe timeouts rather than `N`, and an
//! optional batch deadline bounds it further.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Endpoint storage, validation on load, atomic file updates.
//!
//! ### Probe Module (`probe`)
//! The single-endpoint query with its explicit failure type.
//!
//! ### Scheduler Module (`scheduler`)
//! Bounded concurrent fan-out and index-ordered collection.
//!
//! ### Aggregator Module (`aggregator`)
//! Flattens endpoint metadata and probe results into consumer records.
//!
//! ### Auth Module (`auth`)
//! The seam where an external permission check decides on removals.
//!
//! ### Service Module (`service`)
//! [`Monitor`], the facade that ties the pieces together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use monitor::{AdminList, Monitor, ProbeScheduler, Registry, StatusProbe};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(Registry::open("servers.json").await?);
//!     let scheduler = ProbeScheduler::new(StatusProbe::new(Duration::from_millis(1500)), 32);
//!     let monitor = Monitor::new(registry, scheduler, Box::new(AdminList::new(["admin"])));
//!
//!     monitor.add("203.0.113.5", 7777, "alice").await?;
//!
//!     for record in monitor.status().await {
//!         println!(
//!             "{} {} {}/{}",
//!             record.endpoint.address(),
//!             record.display_name(),
//!             record.players(),
//!             record.max_players()
//!         );
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod auth;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use aggregator::{aggregate, AggregatedRecord};
pub use auth::{AdminList, AllowAll, Authorizer};
pub use probe::{ProbeError, StatusProbe};
pub use registry::{Registry, RegistryError};
pub use scheduler::{ProbeScheduler, DEFAULT_CONCURRENCY};
pub use service::{Monitor, MonitorError};
