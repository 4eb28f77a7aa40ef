//! # hosts-sync
//!
//! Keep a managed `/etc/hosts` section pointed at a registry whose backing
//! pod can be rescheduled to another node at any time.
//!
//! The engine owns one delimited block of the hosts file:
//!
//! ```text
//! # Generate by Rainbond. DO NOT EDIT
//! 10.0.0.5 goodrain.me
//! # End of Section
//! ```
//!
//! On every trigger it looks up the first ready registry pod, removes the
//! old block and appends a fresh one. Lines outside the block are written
//! back verbatim, including comments and lines that fail to parse.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use hosts_sync::{SyncConfig, SyncEngine, stop_channel, trigger_channel};
//!
//! let (trigger, queue) = trigger_channel();
//! let (stop, signal) = stop_channel();
//! let config = SyncConfig::new("rbd-system", "name=rbd-hub", "goodrain.me");
//! let engine = SyncEngine::new(config, lister, queue, signal)?;
//! let handle = tokio::spawn(engine.run());
//!
//! // From the pod watcher: bursts collapse into one pending resync.
//! trigger.fire();
//!
//! // On shutdown.
//! stop.stop();
//! handle.await?;
//! ```
//!
//! ## Failure handling
//!
//! A failed cycle never stops the loop. Resolution failures leave the file
//! untouched, a start marker without an end marker aborts the cycle and is
//! logged at `error`, and I/O failures are retried on the next trigger.
//! Every failure is logged with a `kind` field (see [`ErrorKind`]).
//!
//! ## Permissions
//!
//! Writing `/etc/hosts` requires root. The caller is responsible for
//! running with sufficient privileges.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod hosts_file;
pub mod hosts_line;
pub mod selector;
pub mod trigger;

pub use config::SyncConfig;
pub use endpoint::{
    PodLister, PodStatus, ResolvedEndpoint, StaticLister, resolve_endpoint,
    resolve_endpoint_with_deadline,
};
pub use engine::{CycleReport, EngineState, SyncEngine};
pub use error::{ErrorKind, LineParseError, QueryError, Result, SyncError};
pub use hosts_file::{HostsDocument, SectionMarkers};
pub use hosts_line::HostsLine;
pub use selector::LabelSelector;
pub use trigger::{
    ResyncTrigger, StopHandle, StopSignal, TriggerQueue, stop_channel, trigger_channel,
};
