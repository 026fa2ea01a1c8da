//! Agent lifecycle: wire subscriptions to transports, queue and writer

use crate::config::{AgentConfig, Subscription};
use crate::hook::HookContext;
use crate::queue::{delivery_queue, DeliveryEvent, DeliveryQueue, FaultHandler, QueueError};
use crate::registry::ClientRegistry;
use crate::transport::{ConfigUpdate, RequestedKey, TransportFactory, UpdateCallback};
use crate::writer::{WriterOptions, WriterWorker};
use crate::DELIVERY_QUEUE_CAPACITY;
use anyhow::{Context, Result};
use config_publish::Selectors;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A running agent
pub struct Agent {
    registry: ClientRegistry,
    queue: DeliveryQueue,
    writer: JoinHandle<()>,
}

impl Agent {
    /// Validate `config`, start the writer, then start one transport per
    /// selector pair and wait for every initial load.
    pub async fn start(
        config: &AgentConfig,
        factory: &dyn TransportFactory,
        on_fault: FaultHandler,
    ) -> Result<Self> {
        config.validate()?;

        let (queue, receiver) = delivery_queue(DELIVERY_QUEUE_CAPACITY, on_fault);
        let writer = tokio::spawn(
            WriterWorker::new(receiver, WriterOptions::from(config.writer.clone())).run(),
        );

        let mut agent = Self {
            registry: ClientRegistry::new(),
            queue,
            writer,
        };

        for ((selectors, optional_selectors), subscriptions) in group_subscriptions(config)? {
            let mut transport = factory.create(&selectors, &optional_selectors);
            for sub in subscriptions {
                transport.add_requirement(
                    RequestedKey::new(&sub.group, &sub.key),
                    enqueue_callback(agent.queue.clone(), sub),
                );
            }
            agent
                .registry
                .register(format!("{selectors}::{optional_selectors}"), transport);
        }

        info!(transports = agent.registry.len(), "starting agent");
        if let Err(e) = agent.registry.start_all().await {
            if let Err(stop) = agent.shutdown().await {
                warn!(error = %stop, "cleanup after failed start");
            }
            return Err(e);
        }

        info!("initial configurations applied, listening for updates");
        Ok(agent)
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Stop transports, close the queue and let the writer drain it
    pub async fn shutdown(mut self) -> Result<()> {
        let stopped = self.registry.stop_all().await;
        self.queue.close();
        self.writer.await.context("writer task failed")?;
        info!("agent stopped");
        Ok(stopped?)
    }
}

type SelectorPair = (Selectors, Selectors);

/// Group subscriptions by canonical (selectors, optional selectors)
fn group_subscriptions(config: &AgentConfig) -> Result<Vec<(SelectorPair, Vec<&Subscription>)>> {
    let mut groups: BTreeMap<(String, String), (SelectorPair, Vec<&Subscription>)> =
        BTreeMap::new();

    for sub in &config.config_list {
        let selectors = Selectors::parse(&sub.selectors)
            .with_context(|| format!("invalid selectors {:?}", sub.selectors))?;
        let optional = Selectors::parse(&sub.optional_selectors)
            .with_context(|| format!("invalid optional selectors {:?}", sub.optional_selectors))?;
        groups
            .entry((selectors.canonical(), optional.canonical()))
            .or_insert_with(|| ((selectors, optional), Vec::new()))
            .1
            .push(sub);
    }

    Ok(groups.into_values().collect())
}

fn enqueue_callback(queue: DeliveryQueue, sub: &Subscription) -> UpdateCallback {
    let output = sub.output.clone();
    let hook = sub.hook().map(|path| path.to_path_buf());

    Arc::new(move |update: ConfigUpdate| {
        let event = DeliveryEvent {
            output: output.clone(),
            payload: update.value,
            hook: hook.clone(),
            context: HookContext {
                group: update.requested.group,
                key: update.requested.key,
                selectors: update.selectors,
                optional_selectors: update.optional_selectors,
                version: update.version,
            },
        };
        match queue.enqueue(event) {
            Ok(()) => debug!(output = %output.display(), "configuration update queued"),
            Err(QueueError::Closed) => {
                warn!(output = %output.display(), "update arrived after shutdown, dropped")
            }
            // Already escalated through the fault handler.
            Err(QueueError::Saturated { .. }) => {}
        }
    })
}
