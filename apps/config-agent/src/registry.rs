//! Registry of running transports, owned by the agent lifecycle

use crate::transport::ConfigTransport;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Transport stop failures collected during shutdown
#[derive(Debug, thiserror::Error)]
#[error("failed to stop {} transport(s): {}", .failures.len(), .failures.join("; "))]
pub struct StopError {
    pub failures: Vec<String>,
}

struct Entry {
    label: String,
    transport: Box<dyn ConfigTransport>,
    started: bool,
}

#[derive(Default)]
pub struct ClientRegistry {
    entries: Vec<Entry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: impl Into<String>, transport: Box<dyn ConfigTransport>) {
        self.entries.push(Entry {
            label: label.into(),
            transport,
            started: false,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start every transport in registration order and wait for each
    /// initial load before starting the next
    pub async fn start_all(&mut self) -> Result<()> {
        for entry in &mut self.entries {
            entry
                .transport
                .start()
                .await
                .with_context(|| format!("failed to start transport {}", entry.label))?;
            entry.started = true;
            entry
                .transport
                .wait_initial_load()
                .await
                .with_context(|| format!("initial load failed for {}", entry.label))?;
            info!(transport = %entry.label, "initial configuration loaded");
        }
        Ok(())
    }

    /// Stop every started transport, continuing past failures
    pub async fn stop_all(&mut self) -> Result<(), StopError> {
        let mut failures = Vec::new();
        for mut entry in self.entries.drain(..) {
            if !entry.started {
                continue;
            }
            if let Err(e) = entry.transport.stop().await {
                warn!(transport = %entry.label, error = %e, "transport stop failed");
                failures.push(format!("{}: {e:#}", entry.label));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StopError { failures })
        }
    }
}
