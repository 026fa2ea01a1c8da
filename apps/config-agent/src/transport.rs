//! Server-facing transport seam and the store-polling implementation

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use config_publish::infra::storage::feed::ArtifactFeed;
use config_publish::{ConfigArtifact, Selectors, WireConfiguration};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A watched (group, key) under a transport's selectors
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestedKey {
    pub group: String,
    pub key: String,
}

impl RequestedKey {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}

/// A configuration value delivered to a registered callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub requested: RequestedKey,
    pub version: String,
    pub value: Vec<u8>,
    pub selectors: String,
    pub optional_selectors: String,
}

/// Must return quickly; the transport calls it inline
pub type UpdateCallback = Arc<dyn Fn(ConfigUpdate) + Send + Sync>;

/// Delivers configuration for one selector pair to registered callbacks.
/// Delivery is at-least-once with no ordering across keys.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Register interest in a key; only valid before `start`
    fn add_requirement(&mut self, key: RequestedKey, callback: UpdateCallback);

    async fn start(&mut self) -> Result<()>;

    /// Resolves once every currently published watched key was delivered
    async fn wait_initial_load(&self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

/// Builds one transport per selector pair
pub trait TransportFactory: Send + Sync {
    fn create(&self, selectors: &Selectors, optional_selectors: &Selectors)
        -> Box<dyn ConfigTransport>;
}

// ===== Store polling =====

/// Polls the artifact store and delivers keys whose sequence advanced
pub struct StorePollingTransport {
    feed: ArtifactFeed,
    selectors: String,
    optional_selectors: String,
    poll_interval: Duration,
    watched: HashMap<RequestedKey, Vec<UpdateCallback>>,
    cancel: CancellationToken,
    loaded: watch::Receiver<bool>,
    loaded_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl StorePollingTransport {
    pub fn new(
        feed: ArtifactFeed,
        selectors: &Selectors,
        optional_selectors: &Selectors,
        poll_interval: Duration,
    ) -> Self {
        let (loaded_tx, loaded) = watch::channel(false);
        Self {
            feed,
            selectors: selectors.canonical(),
            optional_selectors: optional_selectors.canonical(),
            poll_interval,
            watched: HashMap::new(),
            cancel: CancellationToken::new(),
            loaded,
            loaded_tx: Some(loaded_tx),
            task: None,
        }
    }
}

#[async_trait]
impl ConfigTransport for StorePollingTransport {
    fn add_requirement(&mut self, key: RequestedKey, callback: UpdateCallback) {
        self.watched.entry(key).or_default().push(callback);
    }

    async fn start(&mut self) -> Result<()> {
        let loaded_tx = self
            .loaded_tx
            .take()
            .ok_or_else(|| anyhow!("transport for {} already started", self.selectors))?;

        let poller = Poller {
            feed: self.feed.clone(),
            selectors: self.selectors.clone(),
            optional_selectors: self.optional_selectors.clone(),
            keys: self.watched.keys().cloned().collect(),
            watched: std::mem::take(&mut self.watched),
            last_seen: HashMap::new(),
        };
        let cancel = self.cancel.clone();
        let poll_interval = self.poll_interval;

        info!(
            selectors = %self.selectors,
            optional_selectors = %self.optional_selectors,
            keys = poller.keys.len(),
            "store polling transport started"
        );
        self.task = Some(tokio::spawn(poller.run(poll_interval, cancel, loaded_tx)));
        Ok(())
    }

    async fn wait_initial_load(&self) -> Result<()> {
        let mut loaded = self.loaded.clone();
        loaded
            .wait_for(|done| *done)
            .await
            .map(|_| ())
            .map_err(|_| anyhow!("transport for {} stopped before initial load", self.selectors))
    }

    async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .with_context(|| format!("poller for {} failed", self.selectors))?;
        }
        debug!(selectors = %self.selectors, "store polling transport stopped");
        Ok(())
    }
}

struct Poller {
    feed: ArtifactFeed,
    selectors: String,
    optional_selectors: String,
    keys: Vec<RequestedKey>,
    watched: HashMap<RequestedKey, Vec<UpdateCallback>>,
    last_seen: HashMap<RequestedKey, i64>,
}

impl Poller {
    async fn run(
        mut self,
        poll_interval: Duration,
        cancel: CancellationToken,
        loaded: watch::Sender<bool>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll().await {
                Ok(delivered) => {
                    if delivered > 0 {
                        debug!(selectors = %self.selectors, delivered, "configuration updates delivered");
                    }
                    loaded.send_if_modified(|done| !std::mem::replace(done, true));
                }
                Err(e) => {
                    warn!(selectors = %self.selectors, error = %e, "configuration poll failed");
                }
            }
        }
    }

    /// One pass over the watched keys; returns how many updates were delivered
    async fn poll(&mut self) -> Result<usize> {
        let pairs: Vec<(String, String)> = self
            .keys
            .iter()
            .map(|k| (k.group.clone(), k.key.clone()))
            .collect();
        let artifacts = self
            .feed
            .fetch(&self.selectors, &self.optional_selectors, &pairs)
            .await?;

        let mut delivered = 0;
        for artifact in artifacts {
            if self.deliver(artifact) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn deliver(&mut self, artifact: ConfigArtifact) -> bool {
        let requested = RequestedKey::new(artifact.identity.group, artifact.identity.key);
        if self
            .last_seen
            .get(&requested)
            .is_some_and(|seen| *seen >= artifact.sequence)
        {
            return false;
        }
        self.last_seen.insert(requested.clone(), artifact.sequence);

        let wire = match WireConfiguration::decode(&artifact.payload) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(
                    group = %requested.group,
                    key = %requested.key,
                    sequence = artifact.sequence,
                    error = %e,
                    "undecodable configuration payload skipped"
                );
                return false;
            }
        };

        let update = ConfigUpdate {
            requested,
            version: wire.version,
            value: wire.value,
            selectors: self.selectors.clone(),
            optional_selectors: self.optional_selectors.clone(),
        };
        if let Some(callbacks) = self.watched.get(&update.requested) {
            for callback in callbacks {
                callback(update.clone());
            }
        }
        true
    }
}

/// Creates store-polling transports sharing one artifact feed
pub struct StorePollingFactory {
    feed: ArtifactFeed,
    poll_interval: Duration,
}

impl StorePollingFactory {
    pub fn new(feed: ArtifactFeed, poll_interval: Duration) -> Self {
        Self {
            feed,
            poll_interval,
        }
    }
}

impl TransportFactory for StorePollingFactory {
    fn create(
        &self,
        selectors: &Selectors,
        optional_selectors: &Selectors,
    ) -> Box<dyn ConfigTransport> {
        Box::new(StorePollingTransport::new(
            self.feed.clone(),
            selectors,
            optional_selectors,
            self.poll_interval,
        ))
    }
}
