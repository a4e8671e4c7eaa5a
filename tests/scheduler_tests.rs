// Scheduler tests: ordering, skipping bad destinations, burst shapes, shutdown

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingSink, StubResolver, StubTransport, scheduler_with};
use pingwatch::error::ProbeError;
use pingwatch::models::{DestinationTarget, ProbeReport};
use pingwatch::scheduler::{BurstShape, Pacing, RunMode, SchedulerConfig};
use tokio::sync::watch;

fn targets(list: &[(&str, u32)]) -> Vec<DestinationTarget> {
    list.iter()
        .map(|(addr, count)| DestinationTarget::new(*addr, *count))
        .collect()
}

#[tokio::test]
async fn test_one_shot_publishes_in_order() {
    let transport = Arc::new(StubTransport::new(4.0));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (_tx, rx) = watch::channel(false);

    let summary = scheduler
        .run(&targets(&[("A", 3), ("B", 2)]), Duration::ZERO, rx)
        .await;

    assert_eq!(summary.passes, 1);
    assert_eq!(summary.published, 2);
    assert!(!summary.cancelled);
    assert_eq!(sink.destinations(), vec!["A", "B"]);
    let records = sink.records();
    assert_eq!(records[0].packets_transmitted, 3);
    assert_eq!(records[1].packets_transmitted, 2);
    assert_eq!(
        transport.calls(),
        vec![("A".to_string(), 3), ("B".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_invalid_destinations_are_skipped() {
    let transport = Arc::new(StubTransport::new(1.0));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::rejecting(&["no.such.host"]),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (_tx, rx) = watch::channel(false);

    let summary = scheduler
        .run(
            &targets(&[("no.such.host", 2), ("", 2), ("zero", 0), ("ok", 1)]),
            Duration::ZERO,
            rx,
        )
        .await;

    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.published, 1);
    assert_eq!(sink.destinations(), vec!["ok"]);
    assert_eq!(transport.calls(), vec![("ok".to_string(), 1)]);
}

#[tokio::test]
async fn test_validate_reports_error_kind() {
    let scheduler = scheduler_with(
        Arc::new(StubTransport::new(1.0)),
        StubResolver::rejecting(&["bad"]),
        Arc::new(RecordingSink::default()),
        SchedulerConfig::default(),
    );
    assert!(matches!(
        scheduler.validate(&DestinationTarget::new("", 1)).await,
        Err(ProbeError::InvalidDestination { .. })
    ));
    assert!(matches!(
        scheduler.validate(&DestinationTarget::new("bad", 1)).await,
        Err(ProbeError::InvalidDestination { .. })
    ));
    assert!(matches!(
        scheduler.validate(&DestinationTarget::new("good", 0)).await,
        Err(ProbeError::InvalidParameter { .. })
    ));
    assert!(
        scheduler
            .validate(&DestinationTarget::new("good", 1))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_transport_failure_publishes_nothing_and_continues() {
    let transport = Arc::new(StubTransport::new(2.0).failing_for("down"));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport,
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (_tx, rx) = watch::channel(false);

    let summary = scheduler
        .run(&targets(&[("down", 2), ("up", 2)]), Duration::ZERO, rx)
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(sink.destinations(), vec!["up"]);
}

#[tokio::test]
async fn test_total_loss_is_still_published() {
    let transport =
        Arc::new(StubTransport::new(2.0).scripted("silent", vec![ProbeReport::lost(3)]));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport,
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (_tx, rx) = watch::channel(false);

    scheduler
        .run(&targets(&[("silent", 3)]), Duration::ZERO, rx)
        .await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].packet_loss_rate, Some(1.0));
    assert_eq!(records[0].rtt_avg, None);
}

#[tokio::test]
async fn test_per_probe_bursts_request_one_probe_each() {
    let transport = Arc::new(StubTransport::new(3.0).scripted(
        "A",
        vec![
            ProbeReport::new(1, 1, vec![10.0]),
            ProbeReport::lost(1),
            ProbeReport::new(1, 1, vec![20.0]),
        ],
    ));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig {
            burst_shape: BurstShape::PerProbe,
            ..SchedulerConfig::default()
        },
    );
    let (_tx, rx) = watch::channel(false);

    scheduler.run(&targets(&[("A", 3)]), Duration::ZERO, rx).await;

    assert_eq!(transport.calls().len(), 3);
    assert!(transport.calls().iter().all(|(_, count)| *count == 1));
    let stats = &sink.records()[0];
    assert_eq!(stats.bursts, 3);
    assert_eq!(stats.packets_transmitted, 3);
    assert_eq!(stats.packets_received, 2);
    assert_eq!(stats.rtt_avg, Some(15.0));
}

#[tokio::test]
async fn test_shutdown_during_wait_cancels_without_publishing() {
    let transport = Arc::new(StubTransport::new(1.0));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move {
        scheduler
            .run(&targets(&[("A", 1)]), Duration::from_secs(60), rx)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.published, 0);
    assert!(transport.calls().is_empty());
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_shutdown_during_probe_discards_partial_result() {
    let transport = Arc::new(StubTransport::new(1.0).with_delay(Duration::from_secs(60)));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move {
        scheduler
            .run(&targets(&[("A", 1), ("B", 1)]), Duration::ZERO, rx)
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(transport.calls().len(), 1);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_per_target_interval_overrides_default() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        Arc::new(StubTransport::new(1.0)),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig::default(),
    );
    let (_tx, rx) = watch::channel(false);
    let list = vec![DestinationTarget::new("A", 1).with_interval(0)];

    // A default of one hour would time the test out if it applied.
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(&list, Duration::from_secs(3600), rx),
    )
    .await
    .expect("per-target interval was not used");
    assert_eq!(summary.published, 1);
}

#[tokio::test]
async fn test_shared_pacing_ignores_per_target_interval() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        Arc::new(StubTransport::new(1.0)),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig {
            pacing: Pacing::Shared,
            ..SchedulerConfig::default()
        },
    );
    let (_tx, rx) = watch::channel(false);
    let list = vec![DestinationTarget::new("A", 1).with_interval(3600)];

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(&list, Duration::ZERO, rx),
    )
    .await
    .expect("shared interval was not used");
    assert_eq!(summary.published, 1);
}

#[tokio::test]
async fn test_concurrent_pass_keeps_publication_count() {
    let transport = Arc::new(StubTransport::new(1.0).with_delay(Duration::from_millis(20)));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::rejecting(&["bad"]),
        sink.clone(),
        SchedulerConfig {
            concurrency: 3,
            ..SchedulerConfig::default()
        },
    );
    let (_tx, rx) = watch::channel(false);

    let summary = scheduler
        .run(
            &targets(&[("A", 1), ("bad", 1), ("B", 2), ("C", 3)]),
            Duration::ZERO,
            rx,
        )
        .await;

    assert_eq!(summary.published, 3);
    assert_eq!(summary.skipped, 1);
    let mut published = sink.destinations();
    published.sort();
    assert_eq!(published, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_continuous_mode_idles_until_shutdown() {
    let transport = Arc::new(StubTransport::new(1.0));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig {
            mode: RunMode::Continuous,
            ..SchedulerConfig::default()
        },
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move {
        scheduler
            .run(&targets(&[("A", 1)]), Duration::ZERO, rx)
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!run.is_finished());
    assert_eq!(sink.records().len(), 1);

    tx.send(true).unwrap();
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(summary.passes, 1);
    assert!(summary.cancelled);
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn test_shutdown_during_concurrent_pass_discards_in_flight() {
    let transport = Arc::new(StubTransport::new(1.0).with_delay(Duration::from_secs(60)));
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_with(
        transport.clone(),
        StubResolver::default(),
        sink.clone(),
        SchedulerConfig {
            concurrency: 2,
            ..SchedulerConfig::default()
        },
    );
    let (tx, rx) = watch::channel(false);

    let run = tokio::spawn(async move {
        scheduler
            .run(
                &targets(&[("A", 1), ("B", 1), ("C", 1)]),
                Duration::ZERO,
                rx,
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.published, 0);
    assert!(sink.records().is_empty());
    // A and B were in flight; C never reached the transport.
    let mut probed: Vec<String> = transport.calls().into_iter().map(|(d, _)| d).collect();
    probed.sort();
    assert_eq!(probed, vec!["A", "B"]);
}
