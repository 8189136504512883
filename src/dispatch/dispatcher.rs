//! Role hand-off
//!
//! Each mode ends in exactly one hand-off. Discovery failures in the node
//! listing and managed scheduler roles propagate unchanged; nothing is
//! retried or partially recovered here.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::mode::InvocationMode;
use crate::cluster::{
    discover_slaves, resolve_leader, ClusterAddress, DiscoveryError, SlaveEntry, StateClient,
};
use crate::config::{ConfigError, Settings};
use crate::feature::FeatureRegistry;
use crate::framework::{Collaborators, FrameworkError, FrameworkHandle};
use crate::server::{ServiceError, WorkerService};

/// Errors surfaced to the process boundary
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Framework error: {0}")]
    Framework(#[from] FrameworkError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Interrupted during cluster discovery")]
    Interrupted,
}

/// How a role ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleOutcome {
    /// Slave hosts of the cluster, for printing
    NodesListed {
        leader: ClusterAddress,
        slaves: Vec<SlaveEntry>,
    },
    /// The framework terminated on its own and was shut down
    FrameworkFinished,
    /// The framework was interrupted and shut down
    FrameworkInterrupted,
    /// An executor role stopped (signal or remote stop)
    ExecutorStopped,
}

/// Routes an invocation mode to its role
pub struct RoleDispatcher {
    settings: Settings,
    state_client: Arc<dyn StateClient>,
    features: FeatureRegistry,
    collaborators: Collaborators,
}

impl RoleDispatcher {
    pub fn new(
        settings: Settings,
        state_client: Arc<dyn StateClient>,
        features: FeatureRegistry,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            settings,
            state_client,
            features,
            collaborators,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the role for `mode` until it finishes or `cancel` fires.
    ///
    /// `feature` names the feature factory; it is only resolved for the
    /// scheduler modes.
    pub async fn dispatch(
        &self,
        mode: &InvocationMode,
        feature: &str,
        cancel: CancellationToken,
    ) -> Result<RoleOutcome, DispatchError> {
        info!(mode = mode.name(), "{}", mode);

        match mode {
            InvocationMode::EnumerateNodes { master } => {
                let (leader, slaves) =
                    until_cancelled(&cancel, discover_slaves(self.state_client.as_ref(), master))
                        .await?;
                Ok(RoleOutcome::NodesListed { leader, slaves })
            }

            InvocationMode::RunManagedScheduler { master, executors } => {
                let provider = self.features.resolve(feature)?;
                info!(feature = provider.name(), "using feature factory");

                let leader =
                    until_cancelled(&cancel, resolve_leader(self.state_client.as_ref(), master))
                        .await?;
                let executable = self.settings.executable_path()?;

                let handle = self
                    .collaborators
                    .launcher
                    .launch(&leader, &executable, *executors, provider)
                    .await?;
                self.run_framework(handle, cancel).await
            }

            InvocationMode::RunStandaloneScheduler { slaves } => {
                let provider = self.features.resolve(feature)?;
                info!(feature = provider.name(), "using feature factory");

                let handle = self
                    .collaborators
                    .orchestrator
                    .orchestrate(slaves, provider)
                    .await?;
                self.run_framework(handle, cancel).await
            }

            InvocationMode::RunStandaloneExecutor { port } => {
                let service = WorkerService::new(self.settings.bind_addr.clone(), *port, &cancel);
                service.start().await?;
                Ok(RoleOutcome::ExecutorStopped)
            }

            InvocationMode::RunManagedExecutor => {
                self.collaborators.executor.run(cancel).await?;
                Ok(RoleOutcome::ExecutorStopped)
            }
        }
    }

    /// Block until the framework terminates or is interrupted, then hand off
    /// to its shutdown
    async fn run_framework(
        &self,
        mut handle: FrameworkHandle,
        cancel: CancellationToken,
    ) -> Result<RoleOutcome, DispatchError> {
        let waited = tokio::select! {
            result = handle.wait() => result.map(|()| RoleOutcome::FrameworkFinished),
            _ = cancel.cancelled() => {
                info!("interrupted, shutting the framework down");
                Ok(RoleOutcome::FrameworkInterrupted)
            }
        };

        // Shards are stopped whichever way the wait ended
        let stopped = handle.shutdown().await;
        let outcome = waited?;
        stopped?;
        Ok(outcome)
    }
}

/// Await a discovery call unless `cancel` fires first.
///
/// Only discovery is raced: it holds no remote state, so dropping it midway
/// leaves nothing behind.
async fn until_cancelled<T, E>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, DispatchError>
where
    DispatchError: From<E>,
{
    tokio::select! {
        result = call => Ok(result?),
        _ = cancel.cancelled() => Err(DispatchError::Interrupted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::state::mock::MockStateClient;
    use crate::feature::DEFAULT_FEATURE;
    use crate::framework::mock::{MockExecutor, MockLauncher, MockOrchestrator};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Fixture {
        launcher: Arc<MockLauncher>,
        orchestrator: Arc<MockOrchestrator>,
        executor: Arc<MockExecutor>,
        state: Arc<MockStateClient>,
    }

    impl Fixture {
        fn new(state: MockStateClient) -> Self {
            Self::with_launcher(state, MockLauncher::default())
        }

        fn with_launcher(state: MockStateClient, launcher: MockLauncher) -> Self {
            Self {
                launcher: Arc::new(launcher),
                orchestrator: Arc::new(MockOrchestrator::default()),
                executor: Arc::new(MockExecutor::default()),
                state: Arc::new(state),
            }
        }

        fn dispatcher(&self) -> RoleDispatcher {
            let settings = Settings {
                executable: Some(PathBuf::from("/opt/exelixi/bin/exelixi")),
                ..Settings::default()
            };
            RoleDispatcher::new(
                settings,
                self.state.clone(),
                FeatureRegistry::builtin(),
                Collaborators {
                    launcher: self.launcher.clone(),
                    orchestrator: self.orchestrator.clone(),
                    executor: self.executor.clone(),
                },
            )
        }
    }

    fn cluster_state() -> MockStateClient {
        MockStateClient::new()
            .with_state("10.0.0.9:5050", json!({"leader": "master@10.0.0.1:5050"}))
            .with_state(
                "10.0.0.1:5050",
                json!({
                    "leader": "master@10.0.0.1:5050",
                    "slaves": [
                        {"pid": "s1@10.0.0.2:5051"},
                        {"pid": "s2@10.0.0.3:5051"}
                    ]
                }),
            )
    }

    fn addr(s: &str) -> ClusterAddress {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_enumerate_nodes_via_follower() {
        let fixture = Fixture::new(cluster_state());
        let mode = InvocationMode::EnumerateNodes {
            master: addr("10.0.0.9:5050"),
        };

        let outcome = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RoleOutcome::NodesListed {
                leader: addr("10.0.0.1:5050"),
                slaves: vec![SlaveEntry::new("10.0.0.2"), SlaveEntry::new("10.0.0.3")],
            }
        );
    }

    #[tokio::test]
    async fn test_enumerate_nodes_ignores_unknown_feature() {
        let fixture = Fixture::new(cluster_state());
        let mode = InvocationMode::EnumerateNodes {
            master: addr("10.0.0.1:5050"),
        };

        let result = fixture
            .dispatcher()
            .dispatch(&mode, "nope.Nothing", CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bad_leader_stops_before_enumeration() {
        let state =
            MockStateClient::new().with_state("10.0.0.1:5050", json!({"leader": "10.0.0.1:5050"}));
        let fixture = Fixture::new(state);
        let mode = InvocationMode::EnumerateNodes {
            master: addr("10.0.0.1:5050"),
        };

        let err = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Discovery(DiscoveryError::Format { .. })
        ));
        assert_eq!(fixture.state.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_managed_scheduler_hands_resolved_leader_to_launcher() {
        let fixture = Fixture::new(cluster_state());
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.9:5050"),
            executors: 2,
        };

        let outcome = fixture
            .dispatcher()
            .dispatch(&mode, "default", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, RoleOutcome::FrameworkFinished);

        let launches = fixture.launcher.launches.lock().unwrap().clone();
        assert_eq!(
            launches,
            vec![(
                addr("10.0.0.1:5050"),
                PathBuf::from("/opt/exelixi/bin/exelixi"),
                2,
                DEFAULT_FEATURE.to_string()
            )]
        );
        assert_eq!(fixture.launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_managed_scheduler_unknown_feature() {
        let fixture = Fixture::new(cluster_state());
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.9:5050"),
            executors: 1,
        };

        let err = fixture
            .dispatcher()
            .dispatch(&mode, "ga.Missing", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Config(ConfigError::UnknownFeature(_))
        ));
        assert!(fixture.launcher.launches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_managed_scheduler_unreachable_master() {
        let fixture = Fixture::new(MockStateClient::new());
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.7:5050"),
            executors: 1,
        };

        let err = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("10.0.0.7:5050"));
        assert!(fixture.launcher.launches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_framework_is_shut_down() {
        let launcher = MockLauncher {
            never_terminates: true,
            ..MockLauncher::default()
        };
        let fixture = Fixture::with_launcher(cluster_state(), launcher);
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.1:5050"),
            executors: 1,
        };

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, cancel)
            .await
            .unwrap();
        assert_eq!(outcome, RoleOutcome::FrameworkInterrupted);
        assert_eq!(fixture.launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_framework_is_still_shut_down() {
        let launcher = MockLauncher {
            wait_fails: true,
            ..MockLauncher::default()
        };
        let fixture = Fixture::with_launcher(cluster_state(), launcher);
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.1:5050"),
            executors: 1,
        };

        let err = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Framework(FrameworkError::NoSlaves)
        ));
        assert_eq!(fixture.launcher.shutdowns.load(Ordering::SeqCst), 1);
    }

    /// State client whose requests never complete
    struct StalledStateClient;

    #[async_trait::async_trait]
    impl StateClient for StalledStateClient {
        async fn fetch_state(
            &self,
            _addr: &ClusterAddress,
        ) -> Result<crate::cluster::StateDocument, DiscoveryError> {
            std::future::pending().await
        }
    }

    fn stalled_dispatcher(fixture: &Fixture) -> RoleDispatcher {
        let settings = Settings {
            executable: Some(PathBuf::from("/opt/exelixi/bin/exelixi")),
            ..Settings::default()
        };
        RoleDispatcher::new(
            settings,
            Arc::new(StalledStateClient),
            FeatureRegistry::builtin(),
            Collaborators {
                launcher: fixture.launcher.clone(),
                orchestrator: fixture.orchestrator.clone(),
                executor: fixture.executor.clone(),
            },
        )
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    #[tokio::test]
    async fn test_interrupt_during_enumeration() {
        let fixture = Fixture::new(MockStateClient::new());
        let mode = InvocationMode::EnumerateNodes {
            master: addr("10.0.0.1:5050"),
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            stalled_dispatcher(&fixture).dispatch(
                &mode,
                DEFAULT_FEATURE,
                cancel_after(Duration::from_millis(50)),
            ),
        )
        .await
        .expect("interruption should end discovery");

        assert!(matches!(result, Err(DispatchError::Interrupted)));
    }

    #[tokio::test]
    async fn test_interrupt_during_leader_resolution() {
        let fixture = Fixture::new(MockStateClient::new());
        let mode = InvocationMode::RunManagedScheduler {
            master: addr("10.0.0.1:5050"),
            executors: 1,
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            stalled_dispatcher(&fixture).dispatch(
                &mode,
                DEFAULT_FEATURE,
                cancel_after(Duration::from_millis(50)),
            ),
        )
        .await
        .expect("interruption should end discovery");

        assert!(matches!(result, Err(DispatchError::Interrupted)));
        assert!(fixture.launcher.launches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_standalone_scheduler_uses_orchestrator() {
        let fixture = Fixture::new(MockStateClient::new());
        let mode = InvocationMode::RunStandaloneScheduler {
            slaves: vec![addr("10.0.0.2:9311"), addr("10.0.0.3:9311")],
        };

        let outcome = fixture
            .dispatcher()
            .dispatch(&mode, DEFAULT_FEATURE, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RoleOutcome::FrameworkFinished);
        assert_eq!(fixture.orchestrator.slaves.lock().unwrap().len(), 2);
        assert_eq!(fixture.orchestrator.shutdowns.load(Ordering::SeqCst), 1);
        assert!(fixture.state.queries().is_empty());
    }

    #[tokio::test]
    async fn test_managed_executor_runs_until_cancelled() {
        let fixture = Fixture::new(MockStateClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fixture
            .dispatcher()
            .dispatch(&InvocationMode::RunManagedExecutor, DEFAULT_FEATURE, cancel)
            .await
            .unwrap();

        assert_eq!(outcome, RoleOutcome::ExecutorStopped);
        assert!(fixture.executor.ran.load(Ordering::SeqCst));
    }
}
