// Server lifecycle - owns the tool server process for the length of a dispatch.
//
// `ManagedServer::start` only returns once the server answered the
// handshake. The child is killed when the guard drops, so every exit path
// (errors, panics, a cancelled future) tears the process down; `shutdown`
// is the graceful path for normal completion.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::config::ServerSpec;
use super::dispatch::mcp::{McpSession, ServerInfo};
use super::error::{LifecycleError, TransportError};

/// How long a server gets to exit after its stdin closes before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub type ServerSession = McpSession<ChildStdout, ChildStdin>;

pub struct ManagedServer {
    child: Child,
    session: ServerSession,
    info: ServerInfo,
}

impl ManagedServer {
    /// Launch the server and block until it is ready or `startup_timeout` elapses.
    pub async fn start(
        spec: &ServerSpec,
        startup_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, LifecycleError> {
        log::info!("Starting tool server: {} {}", spec.command, spec.args.join(" "));
        let spawn_error = |source| LifecycleError::Spawn {
            command: spec.command.clone(),
            source,
        };

        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(spawn_error(std::io::Error::other("child pipes unavailable")));
        };
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("[server] {}", line);
                }
            });
        }

        let mut session = McpSession::new(stdout, stdin, request_timeout);
        let handshake = tokio::time::timeout(startup_timeout, session.initialize()).await;

        let info = match handshake {
            Ok(Ok(info)) => info,
            Ok(Err(TransportError::Timeout(_))) | Err(_) => {
                log::error!("Tool server not ready after {:?}", startup_timeout);
                terminate(&mut child).await;
                return Err(LifecycleError::StartupTimeout(startup_timeout));
            }
            Ok(Err(e)) => {
                log::error!("Tool server handshake failed: {}", e);
                terminate(&mut child).await;
                return Err(LifecycleError::Handshake(e));
            }
        };

        Ok(Self { child, session, info })
    }

    pub fn session_mut(&mut self) -> &mut ServerSession {
        &mut self.session
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Close the server's stdin and wait for it to exit, killing it after the grace period.
    pub async fn shutdown(mut self) -> Option<ExitStatus> {
        if let Err(e) = self.session.close().await {
            log::debug!("Closing server stdin: {}", e);
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                log::info!("Tool server exited ({})", status);
                Some(status)
            }
            Ok(Err(e)) => {
                log::warn!("Waiting for tool server failed: {}", e);
                None
            }
            Err(_) => {
                log::warn!("Tool server ignored shutdown, killing it");
                terminate(&mut self.child).await
            }
        }
    }
}

impl Drop for ManagedServer {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            log::warn!("Tool server still running on drop, killing it");
            if let Err(e) = self.child.start_kill() {
                log::error!("Failed to kill tool server: {}", e);
            }
        }
    }
}

async fn terminate(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.kill().await {
        log::error!("Failed to kill tool server: {}", e);
        return None;
    }
    child.try_wait().ok().flatten()
}
