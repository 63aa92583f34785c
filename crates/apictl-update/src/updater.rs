//! Orchestrates check, fetch, verify, and install
//!
//! The pipeline is strictly sequential and stops at the first failure,
//! returning that failure's error unchanged. Retries, when configured,
//! cover only fetch + verify; nothing is retried once the installer has
//! started moving files.

use std::fmt;
use std::path::PathBuf;

use apictl_core::retry::{ClosurePredicate, RetryExecutor, TracingObserver};
use apictl_core::types::RetryPolicy;
use apictl_core::RuntimeConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::descriptor::{Platform, UpdateDescriptor};
use crate::download::ArtifactFetcher;
use crate::error::{Result, UpdateError};
use crate::installer::{BackupRetention, InstallPlan, InstallReport, Installer};
use crate::lock::UpdateLock;
use crate::oracle::{UpdateRequest, VersionOracle, UNASSIGNED_MACHINE_ID};
use crate::verify::{IntegrityVerifier, VerifiedArtifact};
use crate::version::{is_update_available, Version};

/// How an update run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate {
        current: Version,
    },
    Updated {
        from: Version,
        to: Version,
        /// Previous binary, when it was kept
        backup: Option<PathBuf>,
    },
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::UpToDate { current } => write!(f, "already up to date ({current})"),
            UpdateOutcome::Updated { from, to, .. } => write!(f, "updated {from} -> {to}"),
        }
    }
}

/// Ties the oracle, fetcher, verifier, and installer together
pub struct UpdateCoordinator {
    oracle: Box<dyn VersionOracle>,
    fetcher: ArtifactFetcher,
    verifier: IntegrityVerifier,
    installer: Installer,
    target: Option<PathBuf>,
    platform: Platform,
    machine_id: i64,
    retry_policy: Option<RetryPolicy>,
}

impl UpdateCoordinator {
    /// Coordinator that updates the running executable
    pub fn new(oracle: impl VersionOracle + 'static, fetcher: ArtifactFetcher) -> Self {
        Self {
            oracle: Box::new(oracle),
            fetcher,
            verifier: IntegrityVerifier::new(),
            installer: Installer::new(),
            target: None,
            platform: Platform::current(),
            machine_id: UNASSIGNED_MACHINE_ID,
            retry_policy: None,
        }
    }

    /// Wire everything from the runtime configuration
    pub fn from_config(oracle: impl VersionOracle + 'static, config: &RuntimeConfig) -> Result<Self> {
        let update = &config.update;
        let retention = if update.keep_backup {
            BackupRetention::KeepOne
        } else {
            BackupRetention::Delete
        };
        let download_policy = config.retry_policies.for_operation("download");

        let mut coordinator = Self::new(oracle, ArtifactFetcher::from_config(config)?)
            .with_verifier(IntegrityVerifier::from_config(update)?)
            .with_installer(
                Installer::new()
                    .with_retention(retention)
                    .with_verify_swap(update.verify_swap),
            )
            .with_machine_id(update.machine_id);
        if download_policy.max_attempts > 1 {
            coordinator = coordinator.with_retry_policy(download_policy);
        }
        Ok(coordinator)
    }

    pub fn with_verifier(mut self, verifier: IntegrityVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = installer;
        self
    }

    /// Install over `path` instead of the running executable
    pub fn with_target(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = Some(path.into());
        self
    }

    /// Platform that `apply` accepts descriptors for
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_machine_id(mut self, machine_id: i64) -> Self {
        self.machine_id = machine_id;
        self
    }

    /// Retry fetch + verify on transient network failures
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Ask the oracle; `Some` only for a strictly newer version. No disk access.
    pub async fn check(
        &self,
        app: &str,
        current: &Version,
        platform: &Platform,
        cancel: &CancellationToken,
    ) -> Result<Option<UpdateDescriptor>> {
        let request = UpdateRequest {
            project_name: app.to_string(),
            current_version: current.clone(),
            platform: platform.clone(),
            machine_id: self.machine_id,
        };

        let offered = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            res = self.oracle.next_update(&request) => res?,
        };

        match offered {
            Some(descriptor) if is_update_available(current, &descriptor.next_version) => {
                info!(from = %current, to = %descriptor.next_version, "update available");
                Ok(Some(descriptor))
            }
            Some(descriptor) => {
                debug!(current = %current, offered = %descriptor.next_version, "offered version is not newer");
                Ok(None)
            }
            None => {
                debug!(current = %current, "no update offered");
                Ok(None)
            }
        }
    }

    /// Check, and install if something newer exists
    pub async fn run(
        &self,
        app: &str,
        current: &Version,
        platform: &Platform,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        match self.check(app, current, platform, cancel).await? {
            Some(descriptor) => self.apply_for(current, &descriptor, platform, cancel).await,
            None => Ok(UpdateOutcome::UpToDate {
                current: current.clone(),
            }),
        }
    }

    /// Install `descriptor` over the target
    ///
    /// Refuses anything not strictly newer than `current`, whatever the
    /// oracle said.
    pub async fn apply(
        &self,
        current: &Version,
        descriptor: &UpdateDescriptor,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        self.apply_for(current, descriptor, &self.platform, cancel)
            .await
    }

    async fn apply_for(
        &self,
        current: &Version,
        descriptor: &UpdateDescriptor,
        platform: &Platform,
        cancel: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        if !is_update_available(current, &descriptor.next_version) {
            return Err(UpdateError::NotNewer {
                current: current.clone(),
                candidate: descriptor.next_version.clone(),
            });
        }
        if descriptor.platform != *platform {
            return Err(UpdateError::PlatformMismatch {
                expected: platform.clone(),
                actual: descriptor.platform.clone(),
            });
        }

        let plan = match &self.target {
            Some(path) => InstallPlan::for_target(path.clone())?,
            None => InstallPlan::for_current_exe()?,
        };
        let _lock = UpdateLock::acquire(plan.lock_path())?;

        info!(from = %current, to = %descriptor.next_version, target = %plan.target_path().display(), "applying update");

        let artifact = self.stage(&plan, descriptor, cancel).await?;
        let report = self.install(&plan, artifact, cancel).await?;

        Ok(UpdateOutcome::Updated {
            from: current.clone(),
            to: descriptor.next_version.clone(),
            backup: report.backup,
        })
    }

    async fn stage(
        &self,
        plan: &InstallPlan,
        descriptor: &UpdateDescriptor,
        cancel: &CancellationToken,
    ) -> Result<VerifiedArtifact> {
        let Some(policy) = &self.retry_policy else {
            return self.fetch_and_verify(plan, descriptor, cancel).await;
        };

        RetryExecutor::new(policy.clone())
            .with_predicate(ClosurePredicate::new(|e: &UpdateError| e.is_retryable()))
            .with_observer(TracingObserver::new("download"))
            .with_cancellation(cancel.clone())
            .execute(|| self.fetch_and_verify(plan, descriptor, cancel))
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    UpdateError::Cancelled
                } else {
                    err.into_source().unwrap_or(UpdateError::Cancelled)
                }
            })
    }

    /// Renames and the re-hash are blocking; keep them off the runtime workers
    async fn install(
        &self,
        plan: &InstallPlan,
        artifact: VerifiedArtifact,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let installer = self.installer.clone();
        let task_plan = plan.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || installer.install(&task_plan, artifact, &cancel))
            .await
            .map_err(|e| UpdateError::Fatal {
                target: plan.target_path().to_path_buf(),
                backup: plan.backup_path().to_path_buf(),
                reason: format!("install task did not complete: {e}"),
            })?
    }

    async fn fetch_and_verify(
        &self,
        plan: &InstallPlan,
        descriptor: &UpdateDescriptor,
        cancel: &CancellationToken,
    ) -> Result<VerifiedArtifact> {
        let download = self
            .fetcher
            .fetch(&descriptor.artifact_url, plan.staging_path(), cancel)
            .await?;
        self.verifier.verify(
            download,
            &descriptor.sha256,
            descriptor.signature.as_deref(),
        )
    }
}
