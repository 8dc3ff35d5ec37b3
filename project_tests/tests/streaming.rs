use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lib_shodan::{
    BackoffPolicy, Dispatcher, ShodanError, StreamConfig, StreamEvent, StreamState, StreamTarget,
    Subscription,
};
use project_tests::{banner_line, split_every, Attempt, Ending, ScriptedTransport};

fn transient(reason: &str) -> ShodanError {
    ShodanError::TransientNetwork(reason.to_string())
}

fn quick_config() -> StreamConfig {
    StreamConfig {
        backoff: BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_secs(60),
            max_attempts: 10,
            jitter: Duration::ZERO,
        },
        ..StreamConfig::default()
    }
}

fn subscribe(transport: &Arc<ScriptedTransport>, config: StreamConfig) -> Subscription {
    Dispatcher::new("test-key", transport.clone())
        .unwrap()
        .with_stream_config(config)
        .subscribe(&StreamTarget::Ports(vec![80, 443]))
        .unwrap()
}

async fn next(sub: &mut Subscription) -> StreamEvent {
    sub.next_event()
        .await
        .expect("stream ended early")
        .expect("stream failed")
}

async fn next_banner_port(sub: &mut Subscription) -> u16 {
    match next(sub).await {
        StreamEvent::Banner(banner) => banner.port,
        other => panic!("expected a banner, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chunk_boundaries_do_not_change_banners() {
    let body = [
        banner_line("10.0.0.1", 22),
        banner_line("10.0.0.2", 80),
        banner_line("10.0.0.3", 443),
    ]
    .concat();

    for size in [1, 2, 7, 64, body.len()] {
        let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::Chunks(
            split_every(&body, size),
            Ending::Hang,
        )]));
        let mut sub = subscribe(&transport, quick_config());

        let mut ips = Vec::new();
        for _ in 0..3 {
            let banner = next(&mut sub).await.into_banner().expect("banner");
            ips.push((banner.ip_str, banner.port));
        }
        assert_eq!(
            ips,
            vec![
                ("10.0.0.1".to_string(), 22),
                ("10.0.0.2".to_string(), 80),
                ("10.0.0.3".to_string(), 443),
            ],
            "chunk size {size}"
        );
        sub.cancel().await;
    }
}

#[tokio::test]
async fn test_crlf_and_blank_lines_are_tolerated() {
    let body = format!(
        "\r\n{}\r\n\n{}",
        banner_line("10.0.0.1", 21).trim_end(),
        banner_line("10.0.0.2", 25)
    );
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [body],
        Ending::Hang,
    )]));
    let mut sub = subscribe(&transport, quick_config());

    assert_eq!(next_banner_port(&mut sub).await, 21);
    assert_eq!(next_banner_port(&mut sub).await, 25);
    sub.cancel().await;
}

#[tokio::test]
async fn test_malformed_line_mid_stream_is_reported_and_skipped() {
    let body = [
        banner_line("10.0.0.1", 80),
        "{\"port\":\n".to_string(),
        "{\"timestamp\":\"2021-03-04T05:06:07.000000\"}\n".to_string(),
        banner_line("10.0.0.2", 8080),
    ]
    .concat();
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [body],
        Ending::Hang,
    )]));
    let mut sub = subscribe(&transport, quick_config());

    assert_eq!(next_banner_port(&mut sub).await, 80);
    for _ in 0..2 {
        match next(&mut sub).await {
            StreamEvent::Malformed(line) => {
                assert!(matches!(line.error, ShodanError::MalformedRecord { .. }));
                assert!(line.preview.starts_with('{'));
            }
            other => panic!("expected a malformed notice, got {other:?}"),
        }
    }
    assert_eq!(next_banner_port(&mut sub).await, 8080);
    assert_eq!(transport.connects(), 1);
    sub.cancel().await;
}

#[tokio::test]
async fn test_oversized_line_is_dropped() {
    let body = format!("{}\n{}", "x".repeat(1_000), banner_line("10.0.0.9", 23));
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        split_every(&body, 100)
            .into_iter()
            .map(|chunk| String::from_utf8_lossy(&chunk).into_owned()),
        Ending::Hang,
    )]));
    let config = StreamConfig {
        max_line_bytes: 256,
        ..quick_config()
    };
    let mut sub = subscribe(&transport, config);

    assert!(matches!(next(&mut sub).await, StreamEvent::Malformed(_)));
    assert_eq!(next_banner_port(&mut sub).await, 23);
    sub.cancel().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_reconnect_with_growing_delays() {
    let transport = Arc::new(ScriptedTransport::with_attempts([
        Attempt::Fail(transient("connection reset")),
        Attempt::Fail(transient("connection reset")),
        Attempt::Fail(transient("503 service unavailable")),
        Attempt::chunks([banner_line("10.0.0.1", 443)], Ending::Hang),
    ]));
    let mut sub = subscribe(&transport, quick_config());

    let mut delays = Vec::new();
    for expected_attempt in 1..=3 {
        match next(&mut sub).await {
            StreamEvent::Gap(gap) => {
                assert_eq!(gap.attempt, expected_attempt);
                assert!(gap.reason.contains("transient"));
                assert_eq!(u128::from(gap.delay_ms()), gap.delay.as_millis());
                delays.push(gap.delay);
            }
            other => panic!("expected a gap, got {other:?}"),
        }
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ]
    );
    assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));

    assert_eq!(next_banner_port(&mut sub).await, 443);
    assert_eq!(sub.state(), StreamState::Streaming);
    assert_eq!(transport.connects(), 4);
    assert_eq!(transport.opened(), 1);

    sub.cancel().await;
    assert_eq!(transport.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_resets_the_failure_count() {
    let transport = Arc::new(ScriptedTransport::with_attempts([
        Attempt::Fail(transient("refused")),
        Attempt::chunks([banner_line("10.0.0.1", 80)], Ending::Close),
        Attempt::Fail(transient("refused")),
        Attempt::chunks([banner_line("10.0.0.1", 81)], Ending::Hang),
    ]));
    let mut sub = subscribe(&transport, quick_config());

    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(match next(&mut sub).await {
            StreamEvent::Gap(gap) => format!("gap{}", gap.attempt),
            StreamEvent::Banner(banner) => format!("banner{}", banner.port),
            StreamEvent::Malformed(line) => panic!("unexpected malformed line {line:?}"),
        });
    }
    assert_eq!(seen, ["gap1", "banner80", "gap1", "gap2", "banner81"]);
    sub.cancel().await;
    assert_eq!(transport.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_partial_line_is_discarded_on_reconnect() {
    let partial = "{\"port\":80,\"ip_str\":";
    let transport = Arc::new(ScriptedTransport::with_attempts([
        Attempt::chunks([partial], Ending::Error(transient("reset mid-line"))),
        Attempt::chunks([banner_line("10.0.0.2", 8443)], Ending::Hang),
    ]));
    let mut sub = subscribe(&transport, quick_config());

    match next(&mut sub).await {
        StreamEvent::Gap(gap) => assert_eq!(gap.discarded_bytes, partial.len()),
        other => panic!("expected a gap, got {other:?}"),
    }
    assert_eq!(next_banner_port(&mut sub).await, 8443);
    sub.cancel().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_connection_times_out_and_reconnects() {
    let transport = Arc::new(ScriptedTransport::with_attempts([
        Attempt::chunks([banner_line("10.0.0.1", 80)], Ending::Hang),
        Attempt::chunks([banner_line("10.0.0.1", 81)], Ending::Hang),
    ]));
    let config = StreamConfig {
        read_timeout: Duration::from_secs(5),
        ..quick_config()
    };
    let mut sub = subscribe(&transport, config);

    assert_eq!(next_banner_port(&mut sub).await, 80);
    match next(&mut sub).await {
        StreamEvent::Gap(gap) => {
            assert_eq!(gap.attempt, 1);
            assert!(gap.reason.contains("no data"));
        }
        other => panic!("expected a gap, got {other:?}"),
    }
    assert_eq!(next_banner_port(&mut sub).await, 81);
    assert_eq!(transport.closed(), 1);
    sub.cancel().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_give_up_with_connection_lost() {
    let transport = Arc::new(ScriptedTransport::with_attempts(
        (0..3).map(|_| Attempt::Fail(transient("unreachable"))),
    ));
    let config = StreamConfig {
        backoff: BackoffPolicy {
            max_attempts: 2,
            ..quick_config().backoff
        },
        ..quick_config()
    };
    let mut sub = subscribe(&transport, config);

    assert!(matches!(next(&mut sub).await, StreamEvent::Gap(_)));
    assert!(matches!(next(&mut sub).await, StreamEvent::Gap(_)));
    match sub.next_event().await {
        Some(Err(ShodanError::ConnectionLost { attempts, last_error })) => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("unreachable"));
        }
        other => panic!("expected ConnectionLost, got {other:?}"),
    }
    assert!(sub.next_event().await.is_none());
    assert_eq!(transport.connects(), 3);
    assert_eq!(sub.state(), StreamState::Closed);
}

#[tokio::test]
async fn test_fatal_connect_error_ends_the_stream() {
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::Fail(
        ShodanError::AuthenticationFailed("Invalid API key".to_string()),
    )]));
    let mut sub = subscribe(&transport, quick_config());

    assert!(matches!(
        sub.next_event().await,
        Some(Err(ShodanError::AuthenticationFailed(_)))
    ));
    assert!(sub.next_event().await.is_none());
    assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn test_fatal_read_error_closes_the_source() {
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [banner_line("10.0.0.1", 80)],
        Ending::Error(ShodanError::NotFound("alert removed".to_string())),
    )]));
    let mut sub = subscribe(&transport, quick_config());

    assert_eq!(next_banner_port(&mut sub).await, 80);
    assert!(matches!(sub.next_event().await, Some(Err(ShodanError::NotFound(_)))));
    assert!(sub.next_event().await.is_none());
    assert_eq!(transport.closed(), 1);
}

#[tokio::test]
async fn test_cancel_closes_the_connection_promptly() {
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [banner_line("10.0.0.1", 80)],
        Ending::Hang,
    )]));
    let mut sub = subscribe(&transport, quick_config());
    assert_eq!(next_banner_port(&mut sub).await, 80);

    tokio::time::timeout(Duration::from_secs(1), sub.cancel())
        .await
        .expect("cancel did not finish in time");

    assert_eq!(transport.closed(), 1);
    assert_eq!(sub.state(), StreamState::Closed);
    assert!(sub.next_event().await.is_none());
}

#[tokio::test]
async fn test_cancel_discards_buffered_banners() {
    let body: String = (1..=20).map(|port| banner_line("10.0.0.1", port)).collect();
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [body],
        Ending::Hang,
    )]));
    let config = StreamConfig {
        buffer_capacity: 4,
        ..quick_config()
    };
    let mut sub = subscribe(&transport, config);
    assert_eq!(next_banner_port(&mut sub).await, 1);

    sub.cancel().await;
    assert!(sub.next_event().await.is_none());
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn test_dropping_the_subscription_releases_the_connection() {
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [banner_line("10.0.0.1", 80)],
        Ending::Hang,
    )]));
    let mut sub = subscribe(&transport, quick_config());
    assert_eq!(next_banner_port(&mut sub).await, 80);
    drop(sub);

    let released = tokio::time::timeout(Duration::from_secs(1), async {
        while transport.closed() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "byte source was never closed");
}

#[tokio::test]
async fn test_slow_consumer_loses_nothing() {
    let body: String = (1..=50).map(|port| banner_line("10.0.0.1", port)).collect();
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [body],
        Ending::Hang,
    )]));
    let config = StreamConfig {
        buffer_capacity: 1,
        ..quick_config()
    };
    let mut sub = subscribe(&transport, config);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut ports = Vec::new();
    while ports.len() < 50 {
        let event = sub.next().await.expect("stream ended").expect("stream failed");
        if let Some(banner) = event.into_banner() {
            ports.push(banner.port);
        }
    }
    assert_eq!(ports, (1..=50).collect::<Vec<u16>>());
    sub.cancel().await;
}

#[tokio::test]
async fn test_subscription_uses_the_stream_path() {
    let transport = Arc::new(ScriptedTransport::with_attempts([Attempt::chunks(
        [banner_line("10.0.0.1", 80)],
        Ending::Hang,
    )]));
    let mut sub = subscribe(&transport, quick_config());
    assert_eq!(sub.path(), "shodan/ports/80,443");
    assert_eq!(next_banner_port(&mut sub).await, 80);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query_value("key"), Some("test-key"));
    sub.cancel().await;
}
