//! WriterWorker delivery, retry and drain behaviour

use config_agent::queue::delivery_queue;
use config_agent::writer::{DeliveryReport, HookDispatch, WriterOptions, WriterWorker};
use std::time::{Duration, Instant};

mod common;
use common::{event, fail_on_fault, print_test_header, wait_for_contents};

fn fast_options(retry_delay: Duration) -> WriterOptions {
    WriterOptions {
        max_attempts: 10,
        retry_delay,
        hook_timeout: Duration::from_secs(5),
    }
}

fn idle_worker(options: WriterOptions) -> WriterWorker {
    let (_queue, receiver) = delivery_queue(8, fail_on_fault());
    WriterWorker::new(receiver, options)
}

#[test]
fn test_default_options() {
    assert_eq!(
        WriterOptions::default(),
        WriterOptions {
            max_attempts: 10,
            retry_delay: Duration::from_secs(1),
            hook_timeout: Duration::from_secs(60),
        }
    );
}

#[tokio::test]
async fn test_write_replaces_previous_contents() {
    print_test_header(
        "test_write_replaces_previous_contents",
        "A delivery truncates the target and rewrites it completely.",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("pool.toml");
    std::fs::write(&output, b"max = 1000000\nmin = 1\n").unwrap();

    let mut worker = idle_worker(fast_options(Duration::from_millis(10)));
    let report = worker.deliver(event(&output, b"max = 10\n")).await;

    assert_eq!(
        report,
        DeliveryReport::Written {
            attempts: 1,
            hook: HookDispatch::NotConfigured
        }
    );
    assert_eq!(std::fs::read(&output).unwrap(), b"max = 10\n");
}

#[tokio::test]
async fn test_temporarily_unwritable_target_is_retried() {
    print_test_header(
        "test_temporarily_unwritable_target_is_retried",
        "Writes into a missing directory are retried until the directory appears.",
    );
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("late");
    let output = parent.join("pool.toml");

    let creator = {
        let parent = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tokio::fs::create_dir(&parent).await.unwrap();
        })
    };

    let mut worker = idle_worker(fast_options(Duration::from_millis(50)));
    let report = worker.deliver(event(&output, b"max = 10")).await;
    creator.await.unwrap();

    match report {
        DeliveryReport::Written { attempts, .. } => assert!((2..=10).contains(&attempts)),
        other => panic!("expected a successful write, got {other:?}"),
    }
    assert_eq!(std::fs::read(&output).unwrap(), b"max = 10");
}

#[tokio::test]
async fn test_exhausted_retries_abandon_event() {
    print_test_header(
        "test_exhausted_retries_abandon_event",
        "A target that never becomes writable is abandoned after the bounded attempts.",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("missing").join("pool.toml");
    let delay = Duration::from_millis(20);

    let mut worker = idle_worker(fast_options(delay));
    let started = Instant::now();
    let report = worker.deliver(event(&output, b"x")).await;

    assert_eq!(report, DeliveryReport::Abandoned { attempts: 10 });
    // Nine pauses separate ten attempts.
    assert!(started.elapsed() >= delay * 9);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_worker_continues_after_abandoned_event() {
    print_test_header(
        "test_worker_continues_after_abandoned_event",
        "An abandoned event does not stop the worker from delivering the next one.",
    );
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("missing").join("a.toml");
    let healthy = dir.path().join("b.toml");

    let (queue, receiver) = delivery_queue(8, fail_on_fault());
    queue.enqueue(event(&broken, b"a")).unwrap();
    queue.enqueue(event(&healthy, b"b")).unwrap();
    queue.close();

    WriterWorker::new(receiver, fast_options(Duration::from_millis(5)))
        .run()
        .await;

    assert!(!broken.exists());
    assert_eq!(std::fs::read(&healthy).unwrap(), b"b");
}

#[tokio::test]
async fn test_events_are_written_in_arrival_order() {
    print_test_header(
        "test_events_are_written_in_arrival_order",
        "The last queued update for an output is the one left on disk.",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("pool.toml");

    let (queue, receiver) = delivery_queue(64, fail_on_fault());
    let worker = tokio::spawn(WriterWorker::new(receiver, fast_options(Duration::from_millis(5))).run());
    for n in 0..32 {
        queue.enqueue(event(&output, format!("rev {n}").as_bytes())).unwrap();
    }
    queue.close();
    worker.await.unwrap();

    assert!(wait_for_contents(&output, b"rev 31").await);
}

#[tokio::test]
async fn test_missing_hook_is_logged_not_fatal() {
    print_test_header(
        "test_missing_hook_is_logged_not_fatal",
        "A hook that cannot be launched leaves the written file in place.",
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("pool.toml");
    let mut with_hook = event(&output, b"max = 10");
    with_hook.hook = Some(dir.path().join("no-such-hook"));

    let mut worker = idle_worker(fast_options(Duration::from_millis(10)));
    let report = worker.deliver(with_hook).await;

    assert_eq!(
        report,
        DeliveryReport::Written {
            attempts: 1,
            hook: HookDispatch::LaunchFailed
        }
    );
    assert_eq!(std::fs::read(&output).unwrap(), b"max = 10");
}
