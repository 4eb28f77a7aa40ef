//! The synchronization loop.
//!
//! Each trigger runs one cycle: resolve the registry endpoint, reload the
//! hosts file, swap the managed section, flush. A failed cycle is logged
//! and the loop goes back to waiting; nothing is propagated to the caller.
//!
//! After a failed flush the file on disk may be partially written, so the
//! next cycle works from the retained in-memory lines instead of reloading.

use tracing::Instrument;

use crate::config::SyncConfig;
use crate::endpoint::{PodLister, ResolvedEndpoint, resolve_endpoint_with_deadline};
use crate::error::{ErrorKind, Result, SyncError};
use crate::hosts_file::{HostsDocument, SectionMarkers};
use crate::selector::LabelSelector;
use crate::trigger::{StopSignal, TriggerQueue};

/// Whether a cycle is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for the next trigger.
    Idle,
    /// Executing a cycle.
    Running,
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub endpoint: ResolvedEndpoint,
    /// `false` when the file already carried this exact section.
    pub changed: bool,
}

enum Wake {
    Stop,
    Trigger,
    Closed,
}

/// Keeps the managed hosts section pointed at the registry.
///
/// The engine is the only writer of its [`HostsDocument`]; nothing else
/// holds a handle to it.
pub struct SyncEngine<L> {
    config: SyncConfig,
    selector: LabelSelector,
    markers: SectionMarkers,
    lister: L,
    document: Option<HostsDocument>,
    /// Set while the last flush of `document` failed.
    unflushed: bool,
    triggers: TriggerQueue,
    stop: StopSignal,
    state: EngineState,
}

impl<L: PodLister> SyncEngine<L> {
    /// Builds an engine consuming `triggers` until `stop` fires.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] or [`SyncError::InvalidSelector`]
    /// if `config` cannot produce a valid section.
    pub fn new(
        config: SyncConfig,
        lister: L,
        triggers: TriggerQueue,
        stop: StopSignal,
    ) -> Result<Self> {
        config.validate()?;
        let selector = LabelSelector::parse(&config.selector)?;
        let markers = SectionMarkers::new(&config.agent);
        Ok(Self {
            config,
            selector,
            markers,
            lister,
            document: None,
            unflushed: false,
            triggers,
            stop,
            state: EngineState::Idle,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn markers(&self) -> &SectionMarkers {
        &self.markers
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// The document as of the last cycle that got past resolution.
    #[must_use]
    pub const fn document(&self) -> Option<&HostsDocument> {
        self.document.as_ref()
    }

    /// Waits for triggers and runs a cycle for each, until stopped.
    ///
    /// Stops when the stop signal fires, when every stop handle is dropped,
    /// or when every trigger is dropped. Returns the number of cycles run.
    pub async fn run(mut self) -> usize {
        tracing::debug!(
            hostname = %self.config.hostname,
            path = %self.config.hosts_path.display(),
            "Hosts sync loop started"
        );

        let mut cycles = 0;
        loop {
            let wake = tokio::select! {
                biased;
                () = self.stop.stopped() => Wake::Stop,
                t = self.triggers.next() => if t.is_some() { Wake::Trigger } else { Wake::Closed },
            };

            match wake {
                Wake::Stop => {
                    tracing::debug!(cycles, "Stop requested, hosts sync loop exiting");
                    break;
                }
                Wake::Closed => {
                    tracing::debug!(cycles, "Trigger source closed, hosts sync loop exiting");
                    break;
                }
                Wake::Trigger => {}
            }

            cycles += 1;
            match self.run_cycle().await {
                Ok(report) if report.changed => tracing::info!(
                    endpoint = %report.endpoint,
                    path = %self.config.hosts_path.display(),
                    "Updated managed hosts section"
                ),
                Ok(report) => tracing::debug!(
                    endpoint = %report.endpoint,
                    "Managed hosts section already up to date"
                ),
                Err(err) => log_cycle_error(&err),
            }
        }
        cycles
    }

    /// Runs one cycle immediately.
    ///
    /// The hosts file is left untouched unless every step up to the flush
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ResolutionNotFound`], [`SyncError::Query`] or
    ///   [`SyncError::QueryTimeout`] if no endpoint could be resolved.
    /// - [`SyncError::StructuralIntegrity`] if the file has a start marker
    ///   without an end marker.
    /// - [`SyncError::Io`] if the file cannot be read or written.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let span = tracing::info_span!(
            "hosts_sync_cycle",
            hostname = %self.config.hostname,
            path = %self.config.hosts_path.display()
        );
        self.state = EngineState::Running;
        let result = self.cycle().instrument(span).await;
        self.state = EngineState::Idle;
        result
    }

    async fn cycle(&mut self) -> Result<CycleReport> {
        let address = resolve_endpoint_with_deadline(
            &self.lister,
            &self.config.namespace,
            &self.selector,
            self.config.query_timeout,
        )
        .await?;
        let endpoint = ResolvedEndpoint::new(address, self.config.hostname.clone());

        let document = match self.document {
            Some(ref mut doc) if self.unflushed => {
                tracing::debug!("Retrying with the lines kept from the failed write");
                doc
            }
            Some(ref mut doc) => {
                doc.reload()?;
                doc
            }
            ref mut slot @ None => slot.insert(HostsDocument::load(&self.config.hosts_path)?),
        };

        let before = document.render();
        document.replace_managed_section(&self.markers, &endpoint)?;
        let changed = self.unflushed || document.render() != before;
        let flushed = document.flush();
        self.unflushed = flushed.is_err();
        flushed?;

        Ok(CycleReport { endpoint, changed })
    }
}

fn log_cycle_error(err: &SyncError) {
    let kind = err.kind();
    if kind == ErrorKind::StructuralIntegrity {
        tracing::error!(
            kind = %kind,
            error = %err,
            "Managed hosts section is corrupted, leaving the file untouched"
        );
    } else {
        tracing::warn!(kind = %kind, error = %err, "Hosts sync cycle skipped");
    }
}
