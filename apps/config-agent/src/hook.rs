//! Post-update hook processes
//!
//! A hook is launched after a successful file write and supervised under a
//! deadline: either the child is reaped when it exits or it is killed when
//! the deadline elapses, never both.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

pub const HOOK_ENV_GROUP: &str = "CONFIG_AGENT_GROUP";
pub const HOOK_ENV_KEY: &str = "CONFIG_AGENT_KEY";
pub const HOOK_ENV_SELECTORS: &str = "CONFIG_AGENT_SEL";
pub const HOOK_ENV_OPTIONAL_SELECTORS: &str = "CONFIG_AGENT_OPTSEL";
pub const HOOK_ENV_VERSION: &str = "CONFIG_AGENT_VERSION";

/// Selector metadata exposed to a hook through its environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    pub group: String,
    pub key: String,
    pub selectors: String,
    pub optional_selectors: String,
    pub version: String,
}

impl HookContext {
    pub fn env_vars(&self) -> [(&'static str, &str); 5] {
        [
            (HOOK_ENV_GROUP, self.group.as_str()),
            (HOOK_ENV_KEY, self.key.as_str()),
            (HOOK_ENV_SELECTORS, self.selectors.as_str()),
            (HOOK_ENV_OPTIONAL_SELECTORS, self.optional_selectors.as_str()),
            (HOOK_ENV_VERSION, self.version.as_str()),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to launch hook {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal state of a supervised hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Reaped after a natural exit; `None` when ended by a signal
    Exited(Option<i32>),
    /// Killed when the deadline elapsed
    TimedOut,
    WaitFailed(String),
    KillFailed(String),
}

/// Start the hook with the agent's environment plus the context variables
pub fn launch(path: &Path, ctx: &HookContext) -> Result<Child, HookError> {
    let mut cmd = Command::new(path);
    cmd.envs(ctx.env_vars())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let child = cmd.spawn().map_err(|source| HookError::Launch {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        hook = %path.display(),
        pid = ?child.id(),
        group = %ctx.group,
        key = %ctx.key,
        "hook launched"
    );
    Ok(child)
}

/// Wait for the hook to exit, killing it once `deadline` elapses
pub async fn supervise(mut child: Child, deadline: Duration, path: PathBuf) -> HookOutcome {
    let waited = tokio::time::timeout(deadline, child.wait()).await;

    match waited {
        Ok(Ok(status)) => {
            info!(hook = %path.display(), code = ?status.code(), "hook exited");
            HookOutcome::Exited(status.code())
        }
        Ok(Err(e)) => {
            warn!(hook = %path.display(), error = %e, "waiting for hook failed");
            HookOutcome::WaitFailed(e.to_string())
        }
        Err(_) => match child.kill().await {
            Ok(()) => {
                warn!(hook = %path.display(), deadline = ?deadline, "hook killed after deadline");
                HookOutcome::TimedOut
            }
            Err(e) => {
                error!(hook = %path.display(), error = %e, "failed to kill hook after deadline");
                HookOutcome::KillFailed(e.to_string())
            }
        },
    }
}

/// Launch and supervise in one step
pub async fn run(path: &Path, ctx: &HookContext, deadline: Duration) -> Result<HookOutcome, HookError> {
    let child = launch(path, ctx)?;
    debug!(hook = %path.display(), "supervising hook");
    Ok(supervise(child, deadline, path.to_path_buf()).await)
}
