//! Worker Spawner: composes a worker's tool manifest, system prompt, and
//! credentials, launches the subprocess, and persists the resulting
//! `Session` row. The sole component authorized to create sessions.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::warn;
use uuid::Uuid;

use crate::adapters::stdio_mcp::{RegisteredTool, StdioMcpServer};
use crate::domain::errors::DomainError;
use crate::domain::models::{Session, TriggerKind};
use crate::domain::ports::{ModuleRegistryLookup, SessionRepository};
use crate::services::approval_gate::ApprovalGate;
use crate::services::module_registry::ModuleRegistry;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("failed to launch worker subprocess: {0}")]
    LaunchFailed(String),
    #[error("worker subprocess timed out after {0:?}")]
    Timeout(Duration),
}

pub type SpawnResult<T> = Result<T, SpawnError>;

/// A unit of work handed to the spawner by the Switchboard or Scheduler.
pub struct SpawnRequest {
    pub butler: String,
    pub trigger_kind: TriggerKind,
    pub prompt: String,
    pub identity_preamble: Option<String>,
    pub session_id: Option<Uuid>,
}

/// Outcome of one worker invocation.
pub struct SpawnOutcome {
    pub session_id: Uuid,
    pub output_summary: Option<String>,
    pub error: Option<String>,
}

const STATIC_PERSONA: &str = "You are a butler: a disciplined assistant operating on behalf of your owner. \
Use only the tools granted to you, and respect the approval gate's decisions without trying to route around them.";

pub struct WorkerSpawnerConfig {
    pub worker_binary: String,
    pub grace_period: Duration,
    pub launch_timeout: Duration,
}

impl Default for WorkerSpawnerConfig {
    fn default() -> Self {
        Self {
            worker_binary: "butler-worker".to_string(),
            grace_period: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(300),
        }
    }
}

pub struct WorkerSpawner {
    sessions: Arc<dyn SessionRepository>,
    registry: Arc<ModuleRegistry>,
    gate: Arc<ApprovalGate>,
    config: WorkerSpawnerConfig,
}

impl WorkerSpawner {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        registry: Arc<ModuleRegistry>,
        gate: Arc<ApprovalGate>,
        config: WorkerSpawnerConfig,
    ) -> Self {
        Self { sessions, registry, gate, config }
    }

    /// Union of every loaded module's tool descriptors. Identity-prefix and
    /// safety-net validation already happened at module-registry load time;
    /// this is purely the manifest the worker receives.
    fn tool_manifest(&self) -> Vec<String> {
        self.registry.all_descriptors().into_iter().map(|d| d.name).collect()
    }

    /// Every registered tool paired with its handler, for the MCP server
    /// bridged into the worker's stdio.
    fn registered_tools(&self) -> Vec<RegisteredTool> {
        self.registry
            .all_descriptors()
            .into_iter()
            .filter_map(|descriptor| {
                let handler = self.registry.handler_for(&descriptor.name)?;
                Some(RegisteredTool { descriptor, handler })
            })
            .collect()
    }

    /// `static persona ⊕ module-provided memory context ⊕ identity preamble`.
    /// The memory context call is fail-open: a failing or absent memory
    /// module contributes an empty block, never a hard error.
    fn compose_system_prompt(&self, prompt: &str, butler: &str, identity_preamble: Option<&str>) -> String {
        let memory_context = self.registry.modules().iter().find_map(|m| m.context(prompt, butler)).unwrap_or_default();

        let mut sections = vec![STATIC_PERSONA.to_string()];
        if !memory_context.is_empty() {
            sections.push(memory_context);
        }
        if let Some(preamble) = identity_preamble {
            sections.push(preamble.to_string());
        }
        sections.join("\n\n")
    }

    /// Credentials environment: every env-var name declared by a loaded
    /// module's `credentials_env()`, resolved from the daemon's own
    /// environment. A missing value is omitted rather than passed empty —
    /// the module itself decides whether that's fatal at call time.
    fn credentials_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for module in self.registry.modules() {
            for name in module.credentials_env() {
                if let Ok(value) = std::env::var(name) {
                    env.insert((*name).to_string(), value);
                }
            }
        }
        env
    }

    /// Launch the worker subprocess and bridge its stdio to a
    /// `StdioMcpServer`: the worker is the MCP client, this process is the
    /// server, so the worker's stdout is our read side and the worker's
    /// stdin is our write side. `tools/call` requests therefore route
    /// through the Approval Gate exactly as they would for any other MCP
    /// transport. The system/trigger prompt goes over environment
    /// variables rather than stdin, since stdin is reserved for MCP
    /// responses; the worker's final textual summary is read off its
    /// stderr once the process exits.
    async fn run_subprocess(&self, system_prompt: &str, prompt: &str, session_id: Uuid) -> SpawnResult<(String, Option<String>)> {
        let mut cmd = Command::new(&self.config.worker_binary);
        cmd.env("BUTLER_SYSTEM_PROMPT", system_prompt)
            .env("BUTLER_PROMPT", prompt)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in self.credentials_env() {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| SpawnError::LaunchFailed(e.to_string()))?;

        let child_stdin = child.stdin.take().ok_or_else(|| SpawnError::LaunchFailed("no stdin".to_string()))?;
        let child_stdout = child.stdout.take().ok_or_else(|| SpawnError::LaunchFailed("no stdout".to_string()))?;
        let stderr = child.stderr.take().ok_or_else(|| SpawnError::LaunchFailed("no stderr".to_string()))?;

        let server = StdioMcpServer::new(self.gate.clone(), self.registered_tools(), Some(session_id));
        let mcp_task = tokio::spawn(async move {
            if let Err(e) = server.run_io(child_stdout, child_stdin).await {
                warn!(session_id = %session_id, error = %e, "mcp stdio bridge to worker ended with error");
            }
        });

        let run = async {
            let mut output = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                output.push_str(&line);
                output.push('\n');
            }
            output
        };

        let output = match tokio::time::timeout(self.config.launch_timeout, run).await {
            Ok(output) => output,
            Err(_) => {
                mcp_task.abort();
                self.terminate_with_grace(&mut child).await;
                return Err(SpawnError::Timeout(self.config.launch_timeout));
            }
        };

        let status = child.wait().await.map_err(|e| SpawnError::LaunchFailed(e.to_string()))?;
        mcp_task.abort();
        let error = if status.success() { None } else { Some(format!("worker exited with {status}")) };

        Ok((output.trim().to_string(), error))
    }

    /// SIGTERM, wait up to `grace_period`, SIGKILL if still alive. Used on
    /// timeout and on daemon shutdown for any in-flight worker.
    async fn terminate_with_grace(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            let pid = nix::unistd::Pid::from_raw(pid as i32);
            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
            if tokio::time::timeout(self.config.grace_period, child.wait()).await.is_err() {
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
            }
            return;
        }
        let _ = child.start_kill();
    }

    /// Spawn a worker for `request`, persist the resulting `Session` row,
    /// and call the memory module's `store_episode` (fail-open).
    pub async fn spawn(&self, request: SpawnRequest) -> SpawnResult<SpawnOutcome> {
        let session = Session::new(&request.butler, request.trigger_kind, &request.prompt);
        let session_id = request.session_id.unwrap_or(session.session_id);
        let mut session = session;
        session.session_id = session_id;
        self.sessions.create(&session).await?;

        let system_prompt =
            self.compose_system_prompt(&request.prompt, &request.butler, request.identity_preamble.as_deref());

        let (output_summary, error) = match self.run_subprocess(&system_prompt, &request.prompt, session_id).await {
            Ok((output, error)) => (Some(output), error),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "worker subprocess failed to complete");
                (None, Some(e.to_string()))
            }
        };

        if error.is_none() {
            if let Some(memory_module) = self.registry.module_by_name("memory") {
                if let Err(e) = memory_module.store_episode(&request.butler, session_id, output_summary.as_deref().unwrap_or_default()) {
                    warn!(session_id = %session_id, error = %e, "store_episode failed, continuing (fail-open)");
                }
            }
        }

        self.sessions.finish(session_id, output_summary.clone(), error.clone(), None).await?;

        Ok(SpawnOutcome { session_id, output_summary, error })
    }

    /// The tool manifest exposed to the worker, for logging/introspection.
    pub fn manifest_for_logging(&self) -> Vec<String> {
        self.tool_manifest()
    }
}
