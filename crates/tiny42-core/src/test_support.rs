//! Test support utilities for tiny42-core
//!
//! Provides MockRuntime, a fake container runtime that records every call
//! and tracks image/container state the way a real runtime would, so the
//! lifecycle can be tested without Docker or Podman.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tiny42_runtime::*;

/// Records which methods were called on the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    DaemonRunning,
    LaunchDaemon,
    ContainerState { name: String },
    ImageExists { image: String },
    Build { tag: String },
    RunDetached { name: String, image: String, ports: Vec<PortSpec> },
    Start { name: String },
    Stop { name: String },
    Remove { name: String },
    Exec(ExecSpec),
}

impl MockCall {
    /// Whether this call changes runtime state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::LaunchDaemon
                | Self::Build { .. }
                | Self::RunDetached { .. }
                | Self::Start { .. }
                | Self::Stop { .. }
                | Self::Remove { .. }
        )
    }
}

/// Configurable fake runtime for testing
pub struct MockRuntime {
    pub calls: Mutex<Vec<MockCall>>,
    /// Successive answers for `daemon_running`; once drained, `daemon_up` answers
    pub daemon_probes: Mutex<VecDeque<bool>>,
    pub daemon_up: Mutex<bool>,
    /// Current container presence
    pub container: Mutex<ContainerPresence>,
    /// Whether the image exists
    pub image: Mutex<bool>,
    /// Result for launch_daemon calls
    pub launch_result: Mutex<Result<()>>,
    /// Result for build calls
    pub build_result: Mutex<Result<()>>,
    /// Result for run_detached calls
    pub run_result: Mutex<Result<()>>,
    /// Result for start calls
    pub start_result: Mutex<Result<()>>,
    /// Result for stop calls
    pub stop_result: Mutex<Result<()>>,
    /// Result for remove calls
    pub remove_result: Mutex<Result<()>>,
    /// Result for container_state and image_exists queries
    pub query_error: Mutex<Option<RuntimeError>>,
    /// Exit code for exec calls
    pub exec_exit_code: Mutex<i32>,
}

impl MockRuntime {
    /// A runtime whose daemon is up and which has neither image nor container
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            daemon_probes: Mutex::new(VecDeque::new()),
            daemon_up: Mutex::new(true),
            container: Mutex::new(ContainerPresence::Absent),
            image: Mutex::new(false),
            launch_result: Mutex::new(Ok(())),
            build_result: Mutex::new(Ok(())),
            run_result: Mutex::new(Ok(())),
            start_result: Mutex::new(Ok(())),
            stop_result: Mutex::new(Ok(())),
            remove_result: Mutex::new(Ok(())),
            query_error: Mutex::new(None),
            exec_exit_code: Mutex::new(0),
        }
    }

    /// A runtime that already has the image and a container in `presence`
    pub fn with_container(presence: ContainerPresence) -> Self {
        let mock = Self::new();
        *mock.image.lock().unwrap() = true;
        *mock.container.lock().unwrap() = presence;
        mock
    }

    /// Record a call
    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Get recorded calls that changed runtime state
    pub fn mutating_calls(&self) -> Vec<MockCall> {
        self.get_calls()
            .into_iter()
            .filter(MockCall::is_mutating)
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn presence(&self) -> ContainerPresence {
        *self.container.lock().unwrap()
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to clone a Result<()> from a Mutex<Result<()>>
fn clone_result(r: &Mutex<Result<()>>) -> Result<()> {
    match &*r.lock().unwrap() {
        Ok(()) => Ok(()),
        Err(e) => Err(clone_runtime_error(e)),
    }
}

/// Clone a RuntimeError (thiserror types don't implement Clone)
pub fn clone_runtime_error(e: &RuntimeError) -> RuntimeError {
    match e {
        RuntimeError::NotInstalled(s) => RuntimeError::NotInstalled(s.clone()),
        RuntimeError::CommandFailed { command, stderr } => RuntimeError::CommandFailed {
            command: command.clone(),
            stderr: stderr.clone(),
        },
        RuntimeError::BuildFailed(s) => RuntimeError::BuildFailed(s.clone()),
        RuntimeError::Parse(s) => RuntimeError::Parse(s.clone()),
        RuntimeError::Unsupported(s) => RuntimeError::Unsupported(s.clone()),
        RuntimeError::Io(e) => RuntimeError::Io(std::io::Error::new(e.kind(), e.to_string())),
    }
}

/// Convenience constructor for a failed runtime command
pub fn command_failed(verb: &str, stderr: &str) -> RuntimeError {
    RuntimeError::CommandFailed {
        command: format!("docker {}", verb),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn daemon_running(&self) -> Result<bool> {
        self.record(MockCall::DaemonRunning);
        if let Some(answer) = self.daemon_probes.lock().unwrap().pop_front() {
            return Ok(answer);
        }
        Ok(*self.daemon_up.lock().unwrap())
    }

    async fn launch_daemon(&self) -> Result<()> {
        self.record(MockCall::LaunchDaemon);
        clone_result(&self.launch_result)
    }

    async fn container_state(&self, name: &str) -> Result<ContainerPresence> {
        self.record(MockCall::ContainerState {
            name: name.to_string(),
        });
        if let Some(e) = self.query_error.lock().unwrap().as_ref() {
            return Err(clone_runtime_error(e));
        }
        Ok(self.presence())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(MockCall::ImageExists {
            image: image.to_string(),
        });
        if let Some(e) = self.query_error.lock().unwrap().as_ref() {
            return Err(clone_runtime_error(e));
        }
        Ok(*self.image.lock().unwrap())
    }

    async fn build(&self, spec: &BuildSpec) -> Result<()> {
        self.record(MockCall::Build {
            tag: spec.tag.clone(),
        });
        clone_result(&self.build_result)?;
        *self.image.lock().unwrap() = true;
        Ok(())
    }

    async fn run_detached(&self, spec: &RunSpec) -> Result<ContainerId> {
        self.record(MockCall::RunDetached {
            name: spec.name.clone(),
            image: spec.image.clone(),
            ports: spec.ports.clone(),
        });
        clone_result(&self.run_result)?;
        let mut container = self.container.lock().unwrap();
        if *container != ContainerPresence::Absent {
            return Err(command_failed(
                "run",
                &format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            ));
        }
        *container = ContainerPresence::Running;
        Ok(ContainerId::new("mock_container_id"))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.record(MockCall::Start {
            name: name.to_string(),
        });
        clone_result(&self.start_result)?;
        *self.container.lock().unwrap() = ContainerPresence::Running;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.record(MockCall::Stop {
            name: name.to_string(),
        });
        clone_result(&self.stop_result)?;
        let mut container = self.container.lock().unwrap();
        if *container == ContainerPresence::Absent {
            return Err(command_failed("stop", &format!("No such container: {}", name)));
        }
        *container = ContainerPresence::Stopped;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.record(MockCall::Remove {
            name: name.to_string(),
        });
        clone_result(&self.remove_result)?;
        let mut container = self.container.lock().unwrap();
        match *container {
            ContainerPresence::Absent => {
                Err(command_failed("rm", &format!("No such container: {}", name)))
            }
            ContainerPresence::Running => Err(command_failed(
                "rm",
                "You cannot remove a running container. Stop the container before attempting removal",
            )),
            ContainerPresence::Stopped => {
                *container = ContainerPresence::Absent;
                Ok(())
            }
        }
    }

    async fn exec_interactive(&self, spec: &ExecSpec) -> Result<i32> {
        self.record(MockCall::Exec(spec.clone()));
        Ok(*self.exec_exit_code.lock().unwrap())
    }

    fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            kind: RuntimeKind::Docker,
            command: "mock-docker".to_string(),
        }
    }
}
