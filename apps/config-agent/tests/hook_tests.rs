//! Hook supervision: env context, normal exit and deadline kill

#![cfg(unix)]

use config_agent::hook::{self, HookContext, HookError, HookOutcome};
use config_agent::queue::delivery_queue;
use config_agent::writer::{DeliveryReport, HookDispatch, WriterOptions, WriterWorker};
use std::time::{Duration, Instant};

mod common;
use common::{event, fail_on_fault, print_test_header, wait_for_contents, write_script};

fn context() -> HookContext {
    HookContext {
        group: "db".to_string(),
        key: "pool.toml".to_string(),
        selectors: "app=billing,env=prod".to_string(),
        optional_selectors: String::new(),
        version: "v000000000000002a".to_string(),
    }
}

#[tokio::test]
async fn test_hook_exit_code_is_reported() {
    print_test_header(
        "test_hook_exit_code_is_reported",
        "A hook exiting within the deadline is reaped with its exit code.",
    );
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "exit3.sh", "exit 3");

    let outcome = hook::run(&script, &context(), Duration::from_secs(10)).await.unwrap();

    assert_eq!(outcome, HookOutcome::Exited(Some(3)));
}

#[tokio::test]
async fn test_hook_receives_context_env() {
    print_test_header(
        "test_hook_receives_context_env",
        "Group, key, selectors and version reach the hook through its environment.",
    );
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.txt");
    let script = write_script(
        dir.path(),
        "env.sh",
        &format!(
            "printf '%s|%s|%s|%s|%s' \"$CONFIG_AGENT_GROUP\" \"$CONFIG_AGENT_KEY\" \"$CONFIG_AGENT_SEL\" \"$CONFIG_AGENT_OPTSEL\" \"$CONFIG_AGENT_VERSION\" > {}",
            seen.display()
        ),
    );

    let outcome = hook::run(&script, &context(), Duration::from_secs(10)).await.unwrap();

    assert_eq!(outcome, HookOutcome::Exited(Some(0)));
    assert_eq!(
        std::fs::read_to_string(&seen).unwrap(),
        "db|pool.toml|app=billing,env=prod||v000000000000002a"
    );
}

#[tokio::test]
async fn test_hook_past_deadline_is_killed() {
    print_test_header(
        "test_hook_past_deadline_is_killed",
        "A hook outliving its deadline is killed exactly once.",
    );
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "slow.sh", "exec sleep 30");

    let started = Instant::now();
    let outcome = hook::run(&script, &context(), Duration::from_millis(200)).await.unwrap();

    assert_eq!(outcome, HookOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_hook_fails_to_launch() {
    let dir = tempfile::tempdir().unwrap();
    let err = hook::launch(&dir.path().join("absent.sh"), &context()).unwrap_err();
    assert!(matches!(err, HookError::Launch { .. }));
}

#[tokio::test]
async fn test_slow_hook_does_not_block_next_delivery() {
    print_test_header(
        "test_slow_hook_does_not_block_next_delivery",
        "The worker moves on while a hook runs and reaps it before stopping.",
    );
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("hook-done");
    let script = write_script(
        dir.path(),
        "slow.sh",
        &format!("sleep 1\nprintf done > {}", marker.display()),
    );
    let first = dir.path().join("a.toml");
    let second = dir.path().join("b.toml");

    let (queue, receiver) = delivery_queue(8, fail_on_fault());
    let mut worker = WriterWorker::new(
        receiver,
        WriterOptions {
            max_attempts: 10,
            retry_delay: Duration::from_millis(10),
            hook_timeout: Duration::from_secs(10),
        },
    );

    let mut hooked = event(&first, b"a");
    hooked.hook = Some(script);
    let started = Instant::now();
    let report = worker.deliver(hooked).await;
    assert_eq!(
        report,
        DeliveryReport::Written {
            attempts: 1,
            hook: HookDispatch::Launched
        }
    );
    worker.deliver(event(&second, b"b")).await;
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(worker.running_hooks(), 1);

    // Closing lets run() return only after the hook is reaped.
    queue.close();
    worker.run().await;
    assert!(wait_for_contents(&marker, b"done").await);
    assert_eq!(std::fs::read(&second).unwrap(), b"b");
}
