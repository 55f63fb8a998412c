//! Lifecycle of the managed container
//!
//! State is never cached: every decision is made from a fresh runtime query.
//!
//! ```text
//! NoImage -> Building -> NoContainer -> Stopped -> Running
//! ```

use crate::{CoreError, ManagedContainer, Result};
use std::time::Duration;
use tiny42_config::WorkspaceConfig;
use tiny42_runtime::{ContainerPresence, RuntimeClient};
use tokio_util::sync::CancellationToken;

/// State of the runtime daemon after `ensure_daemon`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    AlreadyRunning,
    /// Launched by us and answered within the wait
    Launched,
}

/// What `guarantee_ready` and `init` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    AlreadyRunning,
    /// A stopped container was started
    Started,
    /// A new container was created from the existing image
    Created,
    /// The image was built, then a container was created
    BuiltAndCreated,
}

/// Drives the managed container towards the running state
pub struct Lifecycle<'a> {
    runtime: &'a dyn RuntimeClient,
    config: &'a WorkspaceConfig,
    daemon_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl<'a> Lifecycle<'a> {
    pub fn new(runtime: &'a dyn RuntimeClient, config: &'a WorkspaceConfig) -> Self {
        Self {
            runtime,
            config,
            daemon_timeout: config.daemon_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Override the daemon wait bounds
    pub fn with_daemon_wait(mut self, timeout: Option<Duration>, poll_interval: Duration) -> Self {
        self.daemon_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn config(&self) -> &'a WorkspaceConfig {
        self.config
    }

    pub fn runtime(&self) -> &'a dyn RuntimeClient {
        self.runtime
    }

    fn container(&self) -> ManagedContainer<'a> {
        ManagedContainer::new(self.config)
    }

    /// Make sure the runtime daemon answers, launching it if needed
    pub async fn ensure_daemon(&self, cancel: &CancellationToken) -> Result<DaemonStatus> {
        if self.runtime.daemon_running().await? {
            tracing::debug!("{} daemon is already running", self.runtime.info().kind);
            return Ok(DaemonStatus::AlreadyRunning);
        }

        tracing::info!("{} is starting up...", self.runtime.info().kind);
        self.runtime.launch_daemon().await?;
        self.wait_for_daemon(cancel).await?;
        tracing::info!("{} is up", self.runtime.info().kind);
        Ok(DaemonStatus::Launched)
    }

    /// Poll the daemon until it answers, the wait times out or `cancel` fires
    async fn wait_for_daemon(&self, cancel: &CancellationToken) -> Result<()> {
        let interval = self.poll_interval;
        let poll = async {
            loop {
                if self.runtime.daemon_running().await? {
                    return Ok::<(), CoreError>(());
                }
                tracing::debug!("Daemon not ready, retrying in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
        };

        let bounded = async {
            match self.daemon_timeout {
                Some(limit) => match tokio::time::timeout(limit, poll).await {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::DaemonTimeout(limit)),
                },
                None => poll.await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            result = bounded => result,
        }
    }

    /// Bring the managed container to the running state.
    ///
    /// Running: nothing to do. Stopped: start it. Absent: create it, building
    /// the image first when it does not exist either.
    pub async fn guarantee_ready(&self, cancel: &CancellationToken) -> Result<LifecycleAction> {
        self.ensure_daemon(cancel).await?;
        let container = self.container();

        match self.runtime.container_state(container.name()).await? {
            ContainerPresence::Running => Ok(LifecycleAction::AlreadyRunning),
            ContainerPresence::Stopped => {
                tracing::info!("Starting container {}", container.name());
                self.runtime.start(container.name()).await?;
                Ok(LifecycleAction::Started)
            }
            ContainerPresence::Absent => {
                if self.runtime.image_exists(container.image()).await? {
                    self.create().await?;
                    Ok(LifecycleAction::Created)
                } else {
                    self.build().await?;
                    self.create().await?;
                    Ok(LifecycleAction::BuiltAndCreated)
                }
            }
        }
    }

    /// Initialize the managed container.
    ///
    /// An existing container is reused (started if stopped). Otherwise the
    /// image is always rebuilt before the container is created, so `init`
    /// picks up recipe changes even when an old image is around.
    pub async fn init(&self, cancel: &CancellationToken) -> Result<LifecycleAction> {
        self.ensure_daemon(cancel).await?;
        let container = self.container();

        match self.runtime.container_state(container.name()).await? {
            ContainerPresence::Running => Ok(LifecycleAction::AlreadyRunning),
            ContainerPresence::Stopped => {
                tracing::info!("Starting container {}", container.name());
                self.runtime.start(container.name()).await?;
                Ok(LifecycleAction::Started)
            }
            ContainerPresence::Absent => {
                self.build().await?;
                self.create().await?;
                Ok(LifecycleAction::BuiltAndCreated)
            }
        }
    }

    /// Rebuild the image and recreate the container.
    ///
    /// Always build, stop, remove, create in that order. Stop and remove
    /// failures are tolerated since the container may not exist; a build
    /// failure aborts before the old container is touched.
    pub async fn reload(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_daemon(cancel).await?;
        let container = self.container();

        self.build().await?;

        if let Err(e) = self.runtime.stop(container.name()).await {
            tracing::warn!("Could not stop {}: {}", container.name(), e);
        }
        if let Err(e) = self.runtime.remove(container.name()).await {
            tracing::warn!("Could not remove {}: {}", container.name(), e);
        }

        self.create().await
    }

    async fn build(&self) -> Result<()> {
        let spec = self.container().build_spec();
        tracing::info!(
            "Building image {} from {}",
            spec.tag,
            spec.recipe.display()
        );
        self.runtime.build(&spec).await?;
        Ok(())
    }

    async fn create(&self) -> Result<()> {
        let spec = self.container().run_spec();
        tracing::info!(
            "Creating container {} with {} mounted at {}",
            spec.name,
            self.config.workspace.display(),
            self.config.container.mount_point
        );
        let id = self.runtime.run_detached(&spec).await?;
        tracing::debug!("Container {} has id {}", spec.name, id.short());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{command_failed, MockCall, MockRuntime};
    use tiny42_runtime::{PortSpec, RuntimeError};

    fn config() -> WorkspaceConfig {
        WorkspaceConfig::for_workspace("/home/student/Projects")
    }

    fn fast(lifecycle: Lifecycle<'_>) -> Lifecycle<'_> {
        lifecycle.with_daemon_wait(Some(Duration::from_millis(200)), Duration::from_millis(5))
    }

    fn run_call(ports: Vec<PortSpec>) -> MockCall {
        MockCall::RunDetached {
            name: "tiny42".to_string(),
            image: "tiny42".to_string(),
            ports,
        }
    }

    fn build_call() -> MockCall {
        MockCall::Build {
            tag: "tiny42".to_string(),
        }
    }

    // ==================== guarantee_ready ====================

    #[tokio::test]
    async fn test_ready_builds_then_creates_when_nothing_exists() {
        let mock = MockRuntime::new();
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, LifecycleAction::BuiltAndCreated);
        assert_eq!(mock.mutating_calls(), vec![build_call(), run_call(Vec::new())]);
        assert_eq!(mock.presence(), ContainerPresence::Running);
    }

    #[tokio::test]
    async fn test_ready_creates_from_existing_image() {
        let mock = MockRuntime::new();
        *mock.image.lock().unwrap() = true;
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, LifecycleAction::Created);
        assert_eq!(mock.mutating_calls(), vec![run_call(Vec::new())]);
    }

    #[tokio::test]
    async fn test_ready_starts_stopped_container() {
        let mock = MockRuntime::with_container(ContainerPresence::Stopped);
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, LifecycleAction::Started);
        assert_eq!(
            mock.mutating_calls(),
            vec![MockCall::Start {
                name: "tiny42".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_ready_is_noop_when_running() {
        let mock = MockRuntime::with_container(ContainerPresence::Running);
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, LifecycleAction::AlreadyRunning);
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_ready_is_idempotent() {
        let mock = MockRuntime::new();
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);
        let cancel = CancellationToken::new();

        lifecycle.guarantee_ready(&cancel).await.unwrap();
        mock.clear_calls();

        let action = lifecycle.guarantee_ready(&cancel).await.unwrap();
        assert_eq!(action, LifecycleAction::AlreadyRunning);
        assert!(mock.mutating_calls().is_empty());
        // State is queried again rather than assumed
        assert!(mock.get_calls().contains(&MockCall::ContainerState {
            name: "tiny42".to_string()
        }));
    }

    #[tokio::test]
    async fn test_ready_publishes_configured_port() {
        let mock = MockRuntime::new();
        let mut config = config();
        config.port_publishing.enabled = true;
        config.port_publishing.host = 3000;
        config.port_publishing.container = 3001;
        let lifecycle = Lifecycle::new(&mock, &config);

        lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap();

        assert!(mock.get_calls().contains(&run_call(vec![PortSpec {
            host: 3000,
            container: 3001
        }])));
    }

    #[tokio::test]
    async fn test_ready_build_failure_creates_nothing() {
        let mock = MockRuntime::new();
        *mock.build_result.lock().unwrap() = Err(RuntimeError::BuildFailed("tiny42".into()));
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let err = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Runtime(RuntimeError::BuildFailed(_))));
        assert_eq!(mock.mutating_calls(), vec![build_call()]);
        assert_eq!(mock.presence(), ContainerPresence::Absent);
    }

    #[tokio::test]
    async fn test_ready_query_failure_aborts() {
        let mock = MockRuntime::new();
        *mock.query_error.lock().unwrap() = Some(command_failed("ps", "permission denied"));
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let result = lifecycle.guarantee_ready(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CoreError::Runtime(_))));
        assert!(mock.mutating_calls().is_empty());
    }

    // ==================== daemon ====================

    #[tokio::test]
    async fn test_daemon_already_running_is_not_launched() {
        let mock = MockRuntime::new();
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let status = lifecycle
            .ensure_daemon(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status, DaemonStatus::AlreadyRunning);
        assert_eq!(mock.get_calls(), vec![MockCall::DaemonRunning]);
    }

    #[tokio::test]
    async fn test_daemon_is_launched_and_polled() {
        let mock = MockRuntime::new();
        mock.daemon_probes
            .lock()
            .unwrap()
            .extend([false, false, false]);
        let config = config();
        let lifecycle = fast(Lifecycle::new(&mock, &config));

        let status = lifecycle
            .ensure_daemon(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(status, DaemonStatus::Launched);
        let calls = mock.get_calls();
        assert_eq!(calls[0], MockCall::DaemonRunning);
        assert_eq!(calls[1], MockCall::LaunchDaemon);
        // Two failed polls, then the successful one
        assert_eq!(
            calls.iter().filter(|c| **c == MockCall::DaemonRunning).count(),
            4
        );
    }

    #[tokio::test]
    async fn test_daemon_wait_times_out() {
        let mock = MockRuntime::new();
        *mock.daemon_up.lock().unwrap() = false;
        let config = config();
        let lifecycle = fast(Lifecycle::new(&mock, &config));

        let err = lifecycle
            .ensure_daemon(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::DaemonTimeout(_)));
    }

    #[tokio::test]
    async fn test_daemon_wait_is_cancellable() {
        let mock = MockRuntime::new();
        *mock.daemon_up.lock().unwrap() = false;
        let config = config();
        // No timeout: only cancellation can end the wait
        let lifecycle =
            Lifecycle::new(&mock, &config).with_daemon_wait(None, Duration::from_millis(5));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = lifecycle.ensure_daemon(&cancel).await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[tokio::test]
    async fn test_daemon_launch_failure_is_reported() {
        let mock = MockRuntime::new();
        *mock.daemon_up.lock().unwrap() = false;
        *mock.launch_result.lock().unwrap() =
            Err(RuntimeError::Unsupported("no launcher".into()));
        let config = config();
        let lifecycle = fast(Lifecycle::new(&mock, &config));

        let err = lifecycle
            .guarantee_ready(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Runtime(RuntimeError::Unsupported(_))));
    }

    // ==================== init ====================

    #[tokio::test]
    async fn test_init_rebuilds_when_no_container() {
        let mock = MockRuntime::new();
        // A stale image does not skip the build
        *mock.image.lock().unwrap() = true;
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle.init(&CancellationToken::new()).await.unwrap();

        assert_eq!(action, LifecycleAction::BuiltAndCreated);
        assert_eq!(mock.mutating_calls(), vec![build_call(), run_call(Vec::new())]);
    }

    #[tokio::test]
    async fn test_init_starts_existing_container() {
        let mock = MockRuntime::with_container(ContainerPresence::Stopped);
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        let action = lifecycle.init(&CancellationToken::new()).await.unwrap();
        assert_eq!(action, LifecycleAction::Started);
        assert_eq!(mock.presence(), ContainerPresence::Running);
    }

    // ==================== reload ====================

    fn reload_sequence() -> Vec<MockCall> {
        vec![
            build_call(),
            MockCall::Stop {
                name: "tiny42".to_string(),
            },
            MockCall::Remove {
                name: "tiny42".to_string(),
            },
            run_call(Vec::new()),
        ]
    }

    #[tokio::test]
    async fn test_reload_order_with_running_container() {
        let mock = MockRuntime::with_container(ContainerPresence::Running);
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        lifecycle.reload(&CancellationToken::new()).await.unwrap();

        assert_eq!(mock.mutating_calls(), reload_sequence());
        assert_eq!(mock.presence(), ContainerPresence::Running);
    }

    #[tokio::test]
    async fn test_reload_without_container_continues_past_stop_and_remove() {
        let mock = MockRuntime::new();
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        lifecycle.reload(&CancellationToken::new()).await.unwrap();

        assert_eq!(mock.mutating_calls(), reload_sequence());
        assert_eq!(mock.presence(), ContainerPresence::Running);
    }

    #[tokio::test]
    async fn test_reload_build_failure_keeps_old_container() {
        let mock = MockRuntime::with_container(ContainerPresence::Running);
        *mock.build_result.lock().unwrap() = Err(RuntimeError::BuildFailed("tiny42".into()));
        let config = config();
        let lifecycle = Lifecycle::new(&mock, &config);

        assert!(lifecycle.reload(&CancellationToken::new()).await.is_err());
        assert_eq!(mock.mutating_calls(), vec![build_call()]);
        assert_eq!(mock.presence(), ContainerPresence::Running);
    }
}
