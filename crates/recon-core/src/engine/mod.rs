//! Convergence engine
//!
//! The ConvergeEngine plays the host-framework role: it walks the
//! declared resources, consults the tracked store for remote identity,
//! drives the reconcilers, and persists identity transitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ ReconConfig  │─── declared resources ───┐
//! └──────────────┘                          ▼
//!                                  ┌────────────────┐
//!                                  │ ConvergeEngine │
//!                                  └────────────────┘
//!                                           │
//!          ┌────────────────────────────────┼─────────────────────┐
//!          ▼                                ▼                     ▼
//!  ┌──────────────┐               ┌──────────────────┐    ┌─────────────┐
//!  │ TrackedStore │               │ DnsApi/ComputeApi│    │   Events    │
//!  │ (identity)   │               │ (remote calls)   │    │  (notify)   │
//!  └──────────────┘               └──────────────────┘    └─────────────┘
//! ```
//!
//! ## Convergence pass
//!
//! 1. Untracked declaration → create, then record identity
//! 2. Tracked declaration → read; drift → full-replace update
//! 3. Tracked declaration the remote reports not-found → evict
//!    identity, re-create
//! 4. Tracked entry no longer declared → delete, verify destruction,
//!    clear identity only on confirmed absence
//!
//! ## Identity contract
//!
//! Identity is cleared only after a confirmed delete and retained on
//! failure so the next pass can retry. An indeterminate lookup
//! failure leaves identity untouched.
//!
//! ## Retry policy
//!
//! The engine owns all retries. Clients are single-shot; every failed
//! remote call is retried here up to the configured attempt budget
//! with a fixed delay.

use crate::config::{ReconConfig, RecordSpec};
use crate::error::{Error, Result};
use crate::reconciler::{GroupReconciler, RecordReconciler};
use crate::resource::SecurityGroupSpec;
use crate::traits::{ComputeApi, DnsApi, TrackedGroup, TrackedRecord, TrackedStore};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the ConvergeEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A convergence pass started
    ConvergeStarted { records: usize, groups: usize },

    /// A record was created on the remote system
    RecordCreated {
        key: String,
        hostname: String,
        id: i64,
    },

    /// A record drifted and was replaced
    RecordUpdated { key: String, id: i64 },

    /// A record already matched its declaration
    RecordUnchanged { key: String, id: i64 },

    /// Tracked identity was dropped because the remote system
    /// confirmed the record no longer exists
    RecordEvicted { key: String, id: i64 },

    /// An undeclared record was deleted
    RecordDeleted { key: String, id: i64 },

    /// A security group was created
    GroupCreated { name: String, id: String },

    /// An undeclared security group was deleted
    GroupDeleted { name: String, id: String },

    /// A group's remote attributes differ from its declaration;
    /// the remote system has no update verb for groups
    GroupDrift { name: String },

    /// A resource could not be converged after all retries
    ResourceFailed {
        key: String,
        error: String,
        attempts: usize,
    },

    /// A convergence pass finished
    ConvergeFinished { report: ConvergeReport },
}

/// Outcome counts for one convergence pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ConvergeReport {
    /// True if every resource converged
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Convergence engine
///
/// ## Lifecycle
///
/// 1. Create with [`ConvergeEngine::new()`]
/// 2. Run one pass with [`ConvergeEngine::converge()`], or
///    continuously with [`ConvergeEngine::run()`]
/// 3. State is flushed at the end of every pass
pub struct ConvergeEngine {
    /// Remote DNS record API
    dns: Box<dyn DnsApi>,

    /// Remote security-group API
    compute: Box<dyn ComputeApi>,

    /// Tracked identity store
    store: Box<dyn TrackedStore>,

    /// Declared DNS records
    records: Vec<RecordSpec>,

    /// Declared security groups
    groups: Vec<SecurityGroupSpec>,

    /// Maximum attempts per remote operation
    max_retries: usize,

    /// Delay between retries (in seconds)
    retry_delay_secs: u64,

    /// Interval between convergence passes (0 = one-shot)
    converge_interval_secs: u64,

    /// Whether undeclared tracked resources get deleted
    prune_undeclared: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ConvergeEngine {
    /// Create a new convergence engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        dns: Box<dyn DnsApi>,
        compute: Box<dyn ComputeApi>,
        store: Box<dyn TrackedStore>,
        config: ReconConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            dns,
            compute,
            store,
            records: config.records,
            groups: config.security_groups,
            max_retries: config.engine.max_retries,
            retry_delay_secs: config.engine.retry_delay_secs,
            converge_interval_secs: config.engine.converge_interval_secs,
            prune_undeclared: config.engine.prune_undeclared,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine
    ///
    /// Performs one convergence pass, then (when an interval is
    /// configured) repeats until a shutdown signal is received. On
    /// unix both SIGTERM and SIGINT stop the loop; tracked state is
    /// flushed before exit.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Test-only helper to run the engine with a controlled shutdown
    /// signal
    ///
    /// Production code should use `run()`, which manages shutdown via
    /// OS signals rather than programmatic channels.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let report = self.converge().await?;
        info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            deleted = report.deleted,
            failed = report.failed,
            "convergence pass finished"
        );

        if self.converge_interval_secs == 0 {
            self.store.flush().await?;
            return Ok(());
        }

        let interval = tokio::time::Duration::from_secs(self.converge_interval_secs);

        if let Some(mut rx) = shutdown_rx {
            // Test mode: wait for provided shutdown signal
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.converge().await {
                            error!("Convergence pass failed: {}", e);
                        }
                    }
                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            // Production mode: stop on SIGTERM or SIGINT
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            if let Err(e) = self.converge().await {
                                error!("Convergence pass failed: {}", e);
                                // Continue running despite errors
                            }
                        }
                        _ = sigterm.recv() => {
                            info!("SIGTERM received");
                            break;
                        }
                        _ = sigint.recv() => {
                            info!("SIGINT received");
                            break;
                        }
                    }
                }
            }

            #[cfg(not(unix))]
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.converge().await {
                            error!("Convergence pass failed: {}", e);
                            // Continue running despite errors
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        // Flush state before exiting
        self.store.flush().await?;
        info!("State flushed, engine stopped");

        Ok(())
    }

    /// Run one convergence pass over every declared resource
    ///
    /// Per-resource failures are counted and reported, never fatal to
    /// the pass; only a state-store failure aborts.
    pub async fn converge(&self) -> Result<ConvergeReport> {
        self.emit_event(EngineEvent::ConvergeStarted {
            records: self.records.len(),
            groups: self.groups.len(),
        });

        let mut report = ConvergeReport::default();

        for spec in &self.records {
            if !spec.enabled {
                debug!("Record {} is disabled, skipping", spec.tracking_key());
                continue;
            }

            match self.converge_record(spec, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    error!("Failed to converge record {}: {}", spec.tracking_key(), e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::ResourceFailed {
                        key: spec.tracking_key(),
                        error: e.to_string(),
                        attempts: self.max_retries,
                    });
                }
            }
        }

        for group in &self.groups {
            match self.converge_group(group, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    error!("Failed to converge security group {}: {}", group.name, e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::ResourceFailed {
                        key: group.name.clone(),
                        error: e.to_string(),
                        attempts: self.max_retries,
                    });
                }
            }
        }

        if self.prune_undeclared {
            self.prune(&mut report).await?;
        }

        self.store.flush().await?;

        self.emit_event(EngineEvent::ConvergeFinished { report });
        Ok(report)
    }

    /// Converge a single declared record
    async fn converge_record(&self, spec: &RecordSpec, report: &mut ConvergeReport) -> Result<()> {
        let key = spec.tracking_key();
        let reconciler = RecordReconciler::new(&*self.dns);

        if let Some(tracked) = self.store.get_record(&key).await? {
            // Refresh observed state; a determinate not-found evicts
            // identity and falls through to the create path
            match self.read_with_retry(&reconciler, &tracked).await {
                Ok(observed) => {
                    if observed.matches(&spec.record) {
                        debug!(key, "record already converged");
                        report.unchanged += 1;
                        self.emit_event(EngineEvent::RecordUnchanged {
                            key,
                            id: observed.id,
                        });
                        return Ok(());
                    }

                    let updated = self
                        .update_with_retry(&reconciler, observed.id, spec)
                        .await?;
                    self.store
                        .set_record(
                            &key,
                            &TrackedRecord::new(updated.id, &updated.domain, &updated.hostname),
                        )
                        .await?;
                    info!(key, id = updated.id, "record updated");
                    report.updated += 1;
                    self.emit_event(EngineEvent::RecordUpdated {
                        key,
                        id: updated.id,
                    });
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    warn!(key, id = tracked.id, "tracked record gone remotely, evicting");
                    self.store.delete_record(&key).await?;
                    self.emit_event(EngineEvent::RecordEvicted {
                        key: key.clone(),
                        id: tracked.id,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let observed = self.create_with_retry(&reconciler, spec).await?;
        self.store
            .set_record(
                &key,
                &TrackedRecord::new(observed.id, &observed.domain, &observed.hostname),
            )
            .await?;
        info!(key, id = observed.id, hostname = %observed.hostname, "record created");
        report.created += 1;
        self.emit_event(EngineEvent::RecordCreated {
            key,
            hostname: observed.hostname,
            id: observed.id,
        });

        Ok(())
    }

    /// Converge a single declared security group
    async fn converge_group(
        &self,
        spec: &SecurityGroupSpec,
        report: &mut ConvergeReport,
    ) -> Result<()> {
        let reconciler = GroupReconciler::new(&*self.compute);

        if let Some(tracked) = self.store.get_group(&spec.name).await? {
            match reconciler.read(&tracked.id).await {
                Ok(observed) => {
                    if observed.description != spec.description {
                        // No update verb for groups; report only
                        warn!(
                            name = %spec.name,
                            "security group description drifted, cannot repair in place"
                        );
                        self.emit_event(EngineEvent::GroupDrift {
                            name: spec.name.clone(),
                        });
                    }
                    report.unchanged += 1;
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    warn!(name = %spec.name, "tracked security group gone remotely, evicting");
                    self.store.delete_group(&spec.name).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let observed = reconciler.create(spec).await?;
        self.store
            .set_group(&spec.name, &TrackedGroup::new(&observed.id))
            .await?;
        info!(name = %spec.name, id = %observed.id, "security group created");
        report.created += 1;
        self.emit_event(EngineEvent::GroupCreated {
            name: spec.name.clone(),
            id: observed.id,
        });

        Ok(())
    }

    /// Delete tracked resources that are no longer declared
    ///
    /// Identity is cleared only once the remote confirms the resource
    /// is gone; a failed or unconfirmed delete keeps the entry so the
    /// next pass retries it.
    async fn prune(&self, report: &mut ConvergeReport) -> Result<()> {
        let declared: std::collections::HashSet<String> = self
            .records
            .iter()
            .map(|spec| spec.tracking_key())
            .collect();

        let reconciler = RecordReconciler::new(&*self.dns);

        for key in self.store.list_records().await? {
            if declared.contains(&key) {
                continue;
            }

            let Some(tracked) = self.store.get_record(&key).await? else {
                continue;
            };

            match self
                .delete_with_retry(&reconciler, &tracked.domain, tracked.id)
                .await
            {
                Ok(()) => match reconciler.verify_destroyed(&tracked.domain, tracked.id).await {
                    Ok(true) => {
                        self.store.delete_record(&key).await?;
                        info!(key, id = tracked.id, "undeclared record deleted");
                        report.deleted += 1;
                        self.emit_event(EngineEvent::RecordDeleted {
                            key,
                            id: tracked.id,
                        });
                    }
                    Ok(false) => {
                        warn!(
                            key,
                            id = tracked.id,
                            "record still present after delete, keeping identity for retry"
                        );
                        report.failed += 1;
                        self.emit_event(EngineEvent::ResourceFailed {
                            key,
                            error: "record still present after delete".to_string(),
                            attempts: self.max_retries,
                        });
                    }
                    Err(e) => {
                        warn!(key, "could not verify record destruction: {}", e);
                        report.failed += 1;
                        self.emit_event(EngineEvent::ResourceFailed {
                            key,
                            error: e.to_string(),
                            attempts: self.max_retries,
                        });
                    }
                },
                Err(e) => {
                    // Identity retained for retry on the next pass
                    error!(key, id = tracked.id, "failed to delete record: {}", e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::ResourceFailed {
                        key,
                        error: e.to_string(),
                        attempts: self.max_retries,
                    });
                }
            }
        }

        let declared_groups: std::collections::HashSet<&str> =
            self.groups.iter().map(|g| g.name.as_str()).collect();

        let group_reconciler = GroupReconciler::new(&*self.compute);

        for name in self.store.list_groups().await? {
            if declared_groups.contains(name.as_str()) {
                continue;
            }

            let Some(tracked) = self.store.get_group(&name).await? else {
                continue;
            };

            match group_reconciler.delete(&tracked.id).await {
                Ok(()) => match group_reconciler.verify_destroyed(&tracked.id).await {
                    Ok(true) => {
                        self.store.delete_group(&name).await?;
                        info!(name, id = %tracked.id, "undeclared security group deleted");
                        report.deleted += 1;
                        self.emit_event(EngineEvent::GroupDeleted {
                            name,
                            id: tracked.id,
                        });
                    }
                    Ok(false) => {
                        warn!(
                            name,
                            id = %tracked.id,
                            "group still present after delete, keeping identity for retry"
                        );
                        report.failed += 1;
                        self.emit_event(EngineEvent::ResourceFailed {
                            key: name,
                            error: "group still present after delete".to_string(),
                            attempts: self.max_retries,
                        });
                    }
                    Err(e) => {
                        warn!(name, "could not verify group destruction: {}", e);
                        report.failed += 1;
                        self.emit_event(EngineEvent::ResourceFailed {
                            key: name,
                            error: e.to_string(),
                            attempts: self.max_retries,
                        });
                    }
                },
                Err(e) => {
                    error!(name, id = %tracked.id, "failed to delete security group: {}", e);
                    report.failed += 1;
                    self.emit_event(EngineEvent::ResourceFailed {
                        key: name,
                        error: e.to_string(),
                        attempts: self.max_retries,
                    });
                }
            }
        }

        Ok(())
    }

    async fn create_with_retry(
        &self,
        reconciler: &RecordReconciler<'_>,
        spec: &RecordSpec,
    ) -> Result<crate::resource::ObservedRecord> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match reconciler.create(&spec.record).await {
                Ok(observed) => return Ok(observed),
                // Validation failures are deterministic, never retried
                Err(e @ Error::Validation(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Create attempt {} failed for {}: {}",
                        attempt,
                        spec.tracking_key(),
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        self.retry_pause().await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Other("Unknown error".to_string())))
    }

    async fn read_with_retry(
        &self,
        reconciler: &RecordReconciler<'_>,
        tracked: &TrackedRecord,
    ) -> Result<crate::resource::ObservedRecord> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match reconciler.read(&tracked.domain, tracked.id).await {
                Ok(observed) => return Ok(observed),
                // Determinate absence propagates immediately: the
                // caller evicts rather than retries
                Err(e) if e.is_not_found() => return Err(e),
                Err(e) => {
                    warn!("Read attempt {} failed for id {}: {}", attempt, tracked.id, e);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        self.retry_pause().await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Other("Unknown error".to_string())))
    }

    async fn update_with_retry(
        &self,
        reconciler: &RecordReconciler<'_>,
        id: i64,
        spec: &RecordSpec,
    ) -> Result<crate::resource::ObservedRecord> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match reconciler.update(id, &spec.record).await {
                Ok(observed) => return Ok(observed),
                Err(e @ Error::Validation(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        "Update attempt {} failed for {}: {}",
                        attempt,
                        spec.tracking_key(),
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        self.retry_pause().await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Other("Unknown error".to_string())))
    }

    async fn delete_with_retry(
        &self,
        reconciler: &RecordReconciler<'_>,
        domain: &str,
        id: i64,
    ) -> Result<()> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match reconciler.delete(domain, id).await {
                Ok(()) => return Ok(()),
                // The record being already gone is the goal state
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => {
                    warn!("Delete attempt {} failed for id {}: {}", attempt, id, e);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        self.retry_pause().await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Other("Unknown error".to_string())))
    }

    async fn retry_pause(&self) {
        tokio::time::sleep(tokio::time::Duration::from_secs(self.retry_delay_secs)).await;
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging a warning if the channel is full. The
        // event is dropped rather than letting the channel grow
        // without bound when nobody drains it.
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. \
                Consider increasing event_channel_capacity."
            );
        }
    }
}
