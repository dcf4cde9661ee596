//! Concurrent multi-engine scanning under a global deadline.

use futures_util::future::join_all;
use malscan_core::{EngineError, EngineStatus, Result, ScanReport, UpdateOutcome, Verdict};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::artifact::Artifact;
use crate::config::ScanSettings;
use crate::registry::EngineRegistry;
use crate::staging::ArtifactStaging;

/// Runs every registered engine against one artifact and merges the verdicts.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    registry: EngineRegistry,
    staging: ArtifactStaging,
    deadline: Duration,
}

impl ScanOrchestrator {
    #[must_use]
    pub fn new(registry: EngineRegistry, settings: &ScanSettings) -> Self {
        Self {
            registry,
            staging: ArtifactStaging::new(settings.staging_dir.clone()),
            deadline: settings.global_deadline(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Global deadline applied by [`scan_all`](Self::scan_all)
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Wrap `bytes` in an [`Artifact`] and scan it.
    ///
    /// # Errors
    ///
    /// See [`scan_all`](Self::scan_all).
    pub async fn scan_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<ScanReport> {
        self.scan_all(&Artifact::new(bytes)).await
    }

    /// Scan with the configured global deadline.
    ///
    /// # Errors
    ///
    /// Fails only if the artifact cannot be staged. Engine failures are
    /// reported inside the returned report.
    pub async fn scan_all(&self, artifact: &Artifact) -> Result<ScanReport> {
        self.scan_all_with_deadline(artifact, self.deadline).await
    }

    /// Scan with an explicit global deadline.
    ///
    /// The report holds exactly one verdict per registered engine. Engines
    /// still running when `budget` elapses are aborted and reported as
    /// `orchestrator timeout`. The staged file is gone when this returns,
    /// and also if this future is dropped early.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Staging` if the artifact cannot be written to disk;
    /// no engine is dispatched in that case.
    pub async fn scan_all_with_deadline(
        &self,
        artifact: &Artifact,
        budget: Duration,
    ) -> Result<ScanReport> {
        let deadline = deadline_after(budget);
        let staged = self.staging.stage(artifact).await?;
        let path: Arc<Path> = Arc::from(staged.path());

        let mut report = ScanReport::new(artifact.summary());
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, String> = HashMap::new();

        for adapter in self.registry.iter() {
            let name = adapter.name().to_string();
            if !adapter.is_installed() {
                debug!(engine = %name, "not installed, not dispatching");
                let err = EngineError::NotInstalled {
                    engine: name.clone(),
                };
                report.insert(Verdict::failed(name, &err));
                continue;
            }

            let adapter = Arc::clone(adapter);
            let path = Arc::clone(&path);
            let handle = tasks.spawn(async move { adapter.scan(&path).await });
            pending.insert(handle.id(), name);
        }

        debug!(
            sha256 = artifact.sha256(),
            dispatched = pending.len(),
            budget = ?budget,
            "dispatched engines"
        );

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(None) => break,
                Ok(Some(Ok((id, verdict)))) => {
                    let Some(name) = pending.remove(&id) else {
                        continue;
                    };
                    // The registry name is the report key, whatever the adapter wrote.
                    report.insert(Verdict {
                        engine: name,
                        ..verdict
                    });
                }
                Ok(Some(Err(join_err))) => {
                    let Some(name) = pending.remove(&join_err.id()) else {
                        continue;
                    };
                    let err = if join_err.is_panic() {
                        error!(engine = %name, "adapter panicked");
                        EngineError::Panicked
                    } else {
                        EngineError::DeadlineExceeded
                    };
                    report.insert(Verdict::failed(name, &err));
                }
                Err(_) => {
                    warn!(
                        outstanding = pending.len(),
                        budget = ?budget,
                        "global deadline reached, abandoning engines"
                    );
                    tasks.shutdown().await;
                    break;
                }
            }
        }

        for name in pending.into_values() {
            report.insert(Verdict::failed(name, &EngineError::DeadlineExceeded));
        }

        drop(path);
        if let Err(e) = staged.release() {
            warn!(error = %e, "failed to remove staged artifact");
        }

        report.finish();
        let summary = report.summary();
        info!(
            sha256 = artifact.sha256(),
            engines = summary.engines,
            infected = summary.infected,
            clean = summary.clean,
            inconclusive = summary.inconclusive,
            duration_ms = report.duration_ms(),
            "scan complete"
        );
        Ok(report)
    }

    /// Installation state and version of every engine, queried concurrently.
    pub async fn engine_status(&self) -> Vec<EngineStatus> {
        join_all(self.registry.iter().map(|a| a.status())).await
    }

    /// Ask every engine whether new definitions exist, concurrently.
    pub async fn check_updates(&self) -> Vec<(String, std::result::Result<bool, EngineError>)> {
        let checks = self.registry.iter().map(|a| async move {
            (a.name().to_string(), a.is_update_available().await)
        });
        join_all(checks).await
    }

    /// Update every engine's definitions, concurrently.
    pub async fn update_all(
        &self,
    ) -> Vec<(String, std::result::Result<UpdateOutcome, EngineError>)> {
        let updates = self.registry.iter().map(|a| async move {
            let result = a.update_definitions().await;
            match &result {
                Ok(outcome) => debug!(engine = %a.name(), %outcome, "update finished"),
                Err(e) => warn!(engine = %a.name(), error = %e, "update failed"),
            }
            (a.name().to_string(), result)
        });
        join_all(updates).await
    }
}

/// `now + budget`, saturating at a far-future instant for huge budgets.
fn deadline_after(budget: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EngineAdapter;
    use async_trait::async_trait;
    use malscan_core::{EngineDescriptor, Platform, VerdictErrorKind, VerdictState};
    use std::path::PathBuf;

    struct Fixed {
        descriptor: EngineDescriptor,
        installed: bool,
        delay: Duration,
        infected: bool,
    }

    impl Fixed {
        fn new(name: &str) -> Self {
            Self {
                descriptor: EngineDescriptor {
                    name: name.into(),
                    platform: Platform::Any,
                    engine_path: PathBuf::from("/bin/true"),
                    update_path: PathBuf::from("/bin/true"),
                    authors: Vec::new(),
                    references: Vec::new(),
                },
                installed: true,
                delay: Duration::ZERO,
                infected: false,
            }
        }
    }

    #[async_trait]
    impl EngineAdapter for Fixed {
        fn descriptor(&self) -> &EngineDescriptor {
            &self.descriptor
        }

        fn is_installed(&self) -> bool {
            self.installed
        }

        async fn version(&self) -> std::result::Result<String, EngineError> {
            Ok("1.0".into())
        }

        async fn is_update_available(&self) -> std::result::Result<bool, EngineError> {
            Ok(false)
        }

        async fn update_definitions(&self) -> std::result::Result<UpdateOutcome, EngineError> {
            Ok(UpdateOutcome::AlreadyUpToDate)
        }

        async fn scan(&self, artifact: &Path) -> Verdict {
            assert!(artifact.exists());
            tokio::time::sleep(self.delay).await;
            if self.infected {
                Verdict::infected("someone-else", Some("EICAR".into()))
            } else {
                Verdict::clean(self.name())
            }
        }
    }

    fn orchestrator(engines: Vec<Fixed>, dir: &Path) -> ScanOrchestrator {
        let mut registry = EngineRegistry::new();
        for engine in engines {
            registry.register(Arc::new(engine)).unwrap();
        }
        let settings = ScanSettings {
            staging_dir: Some(dir.to_path_buf()),
            ..ScanSettings::default()
        };
        ScanOrchestrator::new(registry, &settings)
    }

    #[tokio::test]
    async fn verdicts_are_keyed_by_registered_name() {
        let dir = tempfile::tempdir().unwrap();
        let infected = Fixed {
            infected: true,
            ..Fixed::new("avg")
        };
        let orch = orchestrator(vec![infected, Fixed::new("other")], dir.path());

        let report = orch.scan_bytes(b"payload".to_vec()).await.unwrap();

        assert_eq!(report.verdicts.len(), 2);
        let avg = report.get("avg").unwrap();
        assert_eq!(avg.engine, "avg");
        assert_eq!(avg.state(), VerdictState::Infected);
        assert_eq!(report.get("other").unwrap().state(), VerdictState::Clean);
        assert!(report.get("someone-else").is_none());
    }

    #[tokio::test]
    async fn not_installed_engines_are_reported_not_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Fixed {
            installed: false,
            ..Fixed::new("missing")
        };
        let orch = orchestrator(vec![missing], dir.path());

        let report = orch.scan_bytes(b"x".to_vec()).await.unwrap();
        let verdict = report.get("missing").unwrap();
        assert_eq!(verdict.error().unwrap().kind, VerdictErrorKind::NotInstalled);
        assert_eq!(verdict.error().unwrap().message, "not installed");
    }

    #[tokio::test]
    async fn deadline_marks_slow_engines() {
        let dir = tempfile::tempdir().unwrap();
        let slow = Fixed {
            delay: Duration::from_secs(30),
            ..Fixed::new("slow")
        };
        let orch = orchestrator(vec![slow, Fixed::new("fast")], dir.path());
        let start = std::time::Instant::now();

        let report = orch
            .scan_all_with_deadline(&Artifact::new(b"x".to_vec()), Duration::from_millis(300))
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(report.get("fast").unwrap().state(), VerdictState::Clean);
        let slow = report.get("slow").unwrap();
        assert_eq!(slow.error().unwrap().message, "orchestrator timeout");
        assert!(slow.infected_flag().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn huge_deadline_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(vec![Fixed::new("avg")], dir.path());

        let report = orch
            .scan_all_with_deadline(&Artifact::new(b"x".to_vec()), Duration::MAX)
            .await
            .unwrap();
        assert_eq!(report.get("avg").unwrap().state(), VerdictState::Clean);

        let settings = ScanSettings {
            global_deadline_secs: u64::MAX,
            staging_dir: Some(dir.path().to_path_buf()),
            ..ScanSettings::default()
        };
        settings.validate().unwrap();
        let mut registry = EngineRegistry::new();
        registry.register(Arc::new(Fixed::new("avg"))).unwrap();
        let orch = ScanOrchestrator::new(registry, &settings);

        let report = orch.scan_bytes(b"x".to_vec()).await.unwrap();
        assert_eq!(report.verdicts.len(), 1);
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(Vec::new(), dir.path());

        let report = orch.scan_bytes(b"x".to_vec()).await.unwrap();
        assert!(report.verdicts.is_empty());
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn status_and_updates_cover_every_engine() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(vec![Fixed::new("a"), Fixed::new("b")], dir.path());

        let status = orch.engine_status().await;
        assert_eq!(status.len(), 2);
        assert!(status.iter().all(|s| s.version.as_deref() == Some("1.0")));

        let checks = orch.check_updates().await;
        assert!(checks.iter().all(|(_, r)| matches!(r, Ok(false))));

        let updates = orch.update_all().await;
        assert_eq!(updates[0].0, "a");
        assert!(matches!(updates[1].1, Ok(UpdateOutcome::AlreadyUpToDate)));
    }
}
