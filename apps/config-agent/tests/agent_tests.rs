//! Agent lifecycle against an in-process transport hub

use config_agent::config::WriterConfig;
use config_agent::{Agent, AgentConfig, Subscription};
use std::path::Path;
use std::time::Duration;

mod common;
use common::{fail_on_fault, print_test_header, wait_for_contents, FakeFactory, FakeHub};

const PROD: &str = "app=billing,env=prod";
const STAGING: &str = "app=billing,env=staging";

fn subscription(selectors: &str, group: &str, key: &str, output: &Path) -> Subscription {
    Subscription {
        selectors: selectors.to_string(),
        optional_selectors: String::new(),
        group: group.to_string(),
        key: key.to_string(),
        output: output.to_path_buf(),
        hook: None,
    }
}

fn agent_config(config_list: Vec<Subscription>) -> AgentConfig {
    AgentConfig {
        config_list,
        writer: WriterConfig {
            retry_delay: Duration::from_millis(10),
            hook_timeout: Duration::from_secs(5),
            ..WriterConfig::default()
        },
        ..AgentConfig::default()
    }
}

#[tokio::test]
async fn test_initial_load_and_updates_reach_outputs() {
    print_test_header(
        "test_initial_load_and_updates_reach_outputs",
        "Subscriptions sharing selectors share one transport; every output gets its value.",
    );
    let dir = tempfile::tempdir().unwrap();
    let pool = dir.path().join("pool.toml");
    let redis = dir.path().join("redis.toml");
    let staging = dir.path().join("staging-pool.toml");

    let hub = FakeHub::new();
    hub.publish_initial(PROD, "db", "pool.toml", b"pool v1");
    hub.publish_initial(PROD, "cache", "redis.toml", b"redis v1");
    hub.publish_initial(STAGING, "db", "pool.toml", b"staging v1");

    let config = agent_config(vec![
        subscription(PROD, "db", "pool.toml", &pool),
        // Same selectors, different order
        subscription("env=prod,app=billing", "cache", "redis.toml", &redis),
        subscription(STAGING, "db", "pool.toml", &staging),
    ]);

    let agent = Agent::start(&config, &FakeFactory(hub.clone()), fail_on_fault())
        .await
        .expect("agent should start");

    let mut created = hub.created();
    created.sort();
    assert_eq!(
        created,
        vec![format!("{PROD}::"), format!("{STAGING}::")]
    );

    assert!(wait_for_contents(&pool, b"pool v1").await);
    assert!(wait_for_contents(&redis, b"redis v1").await);
    assert!(wait_for_contents(&staging, b"staging v1").await);

    assert_eq!(hub.push(PROD, "db", "pool.toml", "v0000000000000002", b"pool v2"), 1);
    assert!(wait_for_contents(&pool, b"pool v2").await);
    assert!(wait_for_contents(&staging, b"staging v1").await);

    agent.shutdown().await.expect("shutdown should succeed");
    assert_eq!(hub.stopped(), 2);
    assert_eq!(hub.active_callbacks(), 0);
}

#[tokio::test]
async fn test_shutdown_drains_queued_updates() {
    print_test_header(
        "test_shutdown_drains_queued_updates",
        "Updates queued before shutdown are still written, in order.",
    );
    let dir = tempfile::tempdir().unwrap();
    let pool = dir.path().join("pool.toml");
    let hub = FakeHub::new();

    let config = agent_config(vec![subscription(PROD, "db", "pool.toml", &pool)]);
    let agent = Agent::start(&config, &FakeFactory(hub.clone()), fail_on_fault())
        .await
        .expect("agent should start");

    for n in 1..=50 {
        hub.push(PROD, "db", "pool.toml", "v0000000000000001", format!("rev {n}").as_bytes());
    }
    agent.shutdown().await.expect("shutdown should succeed");

    assert_eq!(std::fs::read(&pool).unwrap(), b"rev 50");
}

#[tokio::test]
async fn test_invalid_config_creates_no_transport() {
    print_test_header(
        "test_invalid_config_creates_no_transport",
        "Two subscriptions writing the same file are rejected before anything starts.",
    );
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared.toml");
    let hub = FakeHub::new();

    let config = agent_config(vec![
        subscription(PROD, "db", "pool.toml", &shared),
        subscription(PROD, "cache", "redis.toml", &shared),
    ]);

    let result = Agent::start(&config, &FakeFactory(hub.clone()), fail_on_fault()).await;
    assert!(result.is_err());
    assert!(hub.created().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_hook_runs_after_write_with_context() {
    print_test_header(
        "test_hook_runs_after_write_with_context",
        "A subscription's hook sees the delivered key, selectors and version.",
    );
    let dir = tempfile::tempdir().unwrap();
    let pool = dir.path().join("pool.toml");
    let seen = dir.path().join("seen.txt");
    let script = common::write_script(
        dir.path(),
        "reload.sh",
        &format!(
            "printf '%s|%s|%s|%s' \"$CONFIG_AGENT_GROUP\" \"$CONFIG_AGENT_KEY\" \"$CONFIG_AGENT_SEL\" \"$CONFIG_AGENT_VERSION\" > {}",
            seen.display()
        ),
    );

    let hub = FakeHub::new();
    hub.publish_initial(PROD, "db", "pool.toml", b"pool v1");

    let mut sub = subscription(PROD, "db", "pool.toml", &pool);
    sub.hook = Some(script);
    let agent = Agent::start(&agent_config(vec![sub]), &FakeFactory(hub.clone()), fail_on_fault())
        .await
        .expect("agent should start");

    assert!(
        wait_for_contents(&seen, format!("db|pool.toml|{PROD}|v0000000000000001").as_bytes())
            .await
    );
    assert_eq!(std::fs::read(&pool).unwrap(), b"pool v1");

    agent.shutdown().await.expect("shutdown should succeed");
}
