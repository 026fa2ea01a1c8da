//! Common test utilities: an in-process transport hub and filesystem helpers

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use config_agent::hook::HookContext;
use config_agent::queue::{DeliveryEvent, FaultHandler, QueueError};
use config_agent::transport::{
    ConfigTransport, ConfigUpdate, RequestedKey, TransportFactory, UpdateCallback,
};
use config_publish::Selectors;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct HubState {
    /// (transport id, key, callback) for started transports
    callbacks: Vec<(String, RequestedKey, UpdateCallback)>,
    /// Values delivered on start, keyed by (selectors, group, key)
    initial: HashMap<(String, String, String), Vec<u8>>,
    created: Vec<String>,
    stopped: usize,
}

/// Stands in for the server side of every transport the agent creates
#[derive(Clone, Default)]
pub struct FakeHub {
    state: Arc<Mutex<HubState>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value delivered when a transport watching this key starts
    pub fn publish_initial(&self, selectors: &str, group: &str, key: &str, value: &[u8]) {
        self.state.lock().initial.insert(
            (selectors.to_string(), group.to_string(), key.to_string()),
            value.to_vec(),
        );
    }

    /// Push an update to every started transport watching the key; returns
    /// how many callbacks ran
    pub fn push(&self, selectors: &str, group: &str, key: &str, version: &str, value: &[u8]) -> usize {
        let requested = RequestedKey::new(group, key);
        let targets: Vec<UpdateCallback> = self
            .state
            .lock()
            .callbacks
            .iter()
            .filter(|(id, k, _)| id.starts_with(&format!("{selectors}::")) && *k == requested)
            .map(|(_, _, cb)| cb.clone())
            .collect();

        for callback in &targets {
            callback(ConfigUpdate {
                requested: requested.clone(),
                version: version.to_string(),
                value: value.to_vec(),
                selectors: selectors.to_string(),
                optional_selectors: String::new(),
            });
        }
        targets.len()
    }

    /// Selector pairs of the transports created so far
    pub fn created(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    pub fn stopped(&self) -> usize {
        self.state.lock().stopped
    }

    pub fn active_callbacks(&self) -> usize {
        self.state.lock().callbacks.len()
    }
}

pub struct FakeTransport {
    hub: FakeHub,
    id: String,
    selectors: String,
    pending: Vec<(RequestedKey, UpdateCallback)>,
}

#[async_trait]
impl ConfigTransport for FakeTransport {
    fn add_requirement(&mut self, key: RequestedKey, callback: UpdateCallback) {
        self.pending.push((key, callback));
    }

    async fn start(&mut self) -> Result<()> {
        let mut initial = Vec::new();
        {
            let mut state = self.hub.state.lock();
            for (key, callback) in self.pending.drain(..) {
                let lookup = (self.selectors.clone(), key.group.clone(), key.key.clone());
                if let Some(value) = state.initial.get(&lookup) {
                    initial.push((key.clone(), callback.clone(), value.clone()));
                }
                state.callbacks.push((self.id.clone(), key, callback));
            }
        }

        for (requested, callback, value) in initial {
            callback(ConfigUpdate {
                requested,
                version: "v0000000000000001".to_string(),
                value,
                selectors: self.selectors.clone(),
                optional_selectors: String::new(),
            });
        }
        Ok(())
    }

    async fn wait_initial_load(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let mut state = self.hub.state.lock();
        state.callbacks.retain(|(id, _, _)| *id != self.id);
        state.stopped += 1;
        Ok(())
    }
}

pub struct FakeFactory(pub FakeHub);

impl TransportFactory for FakeFactory {
    fn create(&self, selectors: &Selectors, optional_selectors: &Selectors) -> Box<dyn ConfigTransport> {
        let id = format!("{selectors}::{optional_selectors}");
        self.0.state.lock().created.push(id.clone());
        Box::new(FakeTransport {
            hub: self.0.clone(),
            id,
            selectors: selectors.canonical(),
            pending: Vec::new(),
        })
    }
}

/// Fault handler for tests that must never saturate
pub fn fail_on_fault() -> FaultHandler {
    Arc::new(|err: &QueueError| panic!("unexpected queue fault: {err}"))
}

pub fn event(output: &Path, payload: &[u8]) -> DeliveryEvent {
    DeliveryEvent {
        output: output.to_path_buf(),
        payload: payload.to_vec(),
        hook: None,
        context: HookContext {
            group: "db".to_string(),
            key: "pool.toml".to_string(),
            selectors: "app=billing,env=prod".to_string(),
            optional_selectors: String::new(),
            version: "v0000000000000001".to_string(),
        },
    }
}

/// Poll until `path` holds exactly `expected`
pub async fn wait_for_contents(path: &Path, expected: &[u8]) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if let Ok(actual) = tokio::fs::read(path).await {
            if actual == expected {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Executable shell script in `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create script");
    writeln!(file, "#!/bin/sh\n{body}").expect("write script");
    file.sync_all().expect("sync script");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

pub fn print_test_header(test_name: &str, purpose: &str) {
    println!("\n🧪 TEST: {}", test_name);
    println!("📋 PURPOSE: {}", purpose);
}
