//! Single consumer that persists queued updates and triggers hooks

use crate::config::WriterConfig;
use crate::hook::{self, HookOutcome};
use crate::queue::{DeliveryEvent, DeliveryReceiver};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub hook_timeout: Duration,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterConfig::default().into()
    }
}

impl From<WriterConfig> for WriterOptions {
    fn from(cfg: WriterConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            retry_delay: cfg.retry_delay,
            hook_timeout: cfg.hook_timeout,
        }
    }
}

/// What happened to the hook of a written event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDispatch {
    NotConfigured,
    /// Running under supervision; the worker does not wait for it
    Launched,
    LaunchFailed,
}

/// Terminal state of one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Written { attempts: usize, hook: HookDispatch },
    /// Every write attempt failed; the event is dropped
    Abandoned { attempts: usize },
}

pub struct WriterWorker {
    queue: DeliveryReceiver,
    options: WriterOptions,
    hooks: JoinSet<HookOutcome>,
}

impl WriterWorker {
    pub fn new(queue: DeliveryReceiver, options: WriterOptions) -> Self {
        Self {
            queue,
            options,
            hooks: JoinSet::new(),
        }
    }

    /// Drain the queue in arrival order until it is closed and empty, then
    /// wait for running hooks to reach a terminal state.
    pub async fn run(mut self) {
        info!(
            max_attempts = self.options.max_attempts,
            retry_delay = ?self.options.retry_delay,
            "writer started"
        );
        let mut draining = false;

        loop {
            let next = tokio::select! {
                event = self.queue.rx.recv() => event,
                _ = self.queue.closed.cancelled(), if !draining => {
                    self.queue.rx.close();
                    draining = true;
                    continue;
                }
            };

            match next {
                Some(event) => {
                    self.deliver(event).await;
                }
                None => break,
            }
        }

        while let Some(joined) = self.hooks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "hook supervisor task failed");
            }
        }
        info!("writer stopped");
    }

    /// Write one event, retrying on I/O failure, then launch its hook
    pub async fn deliver(&mut self, event: DeliveryEvent) -> DeliveryReport {
        self.reap_finished_hooks();

        let max_attempts = self.options.max_attempts;
        for attempt in 1..=max_attempts {
            match tokio::fs::write(&event.output, &event.payload).await {
                Ok(()) => {
                    info!(
                        output = %event.output.display(),
                        group = %event.context.group,
                        key = %event.context.key,
                        version = %event.context.version,
                        attempt,
                        "configuration written"
                    );
                    let hook = self.dispatch_hook(&event);
                    return DeliveryReport::Written {
                        attempts: attempt,
                        hook,
                    };
                }
                Err(e) => {
                    warn!(
                        output = %event.output.display(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "configuration write failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }

        warn!(
            output = %event.output.display(),
            group = %event.context.group,
            key = %event.context.key,
            attempts = max_attempts,
            "configuration write abandoned"
        );
        DeliveryReport::Abandoned {
            attempts: max_attempts,
        }
    }

    /// Hooks still under supervision
    pub fn running_hooks(&self) -> usize {
        self.hooks.len()
    }

    fn dispatch_hook(&mut self, event: &DeliveryEvent) -> HookDispatch {
        let Some(path) = event.hook.as_deref() else {
            return HookDispatch::NotConfigured;
        };

        match hook::launch(path, &event.context) {
            Ok(child) => {
                self.hooks.spawn(hook::supervise(
                    child,
                    self.options.hook_timeout,
                    path.to_path_buf(),
                ));
                HookDispatch::Launched
            }
            Err(e) => {
                warn!(error = %e, output = %event.output.display(), "hook not run");
                HookDispatch::LaunchFailed
            }
        }
    }

    fn reap_finished_hooks(&mut self) {
        while let Some(joined) = self.hooks.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "hook supervisor task failed");
            }
        }
    }
}
