//! End-to-end runs of the shell against a mock counter server.

use std::time::Duration;

use tether_engine::ShellError;
use tether_providers::TransportError;
use tether_types::{EffectKind, Event};
use wiremock::MockServer;

use crate::common::{
    count_body, fast_policy, mount_http, mount_quiet_sse, mount_sse, next_fault, shell_for,
    sse_body, wait_for_request, wait_for_text,
};

#[tokio::test]
async fn bootstrap_follows_server_pushed_counts() {
    let server = MockServer::start().await;
    mount_sse(&server, sse_body(&[3, 4, 7])).await;

    let runtime = shell_for(&server, &fast_policy(2));
    runtime.bootstrap().await.unwrap();

    wait_for_text(&runtime.view, "7").await;
}

#[tokio::test]
async fn increment_is_optimistic_then_confirmed() {
    let server = MockServer::start().await;
    mount_quiet_sse(&server).await;
    mount_http(&server, "POST", "/inc", 200, count_body(10)).await;

    let runtime = shell_for(&server, &fast_policy(2));
    runtime.bootstrap().await.unwrap();

    runtime.shell.dispatch(Event::Increment).await.unwrap();
    let optimistic = runtime.view.latest().text;
    assert!(optimistic == "1" || optimistic == "10", "unexpected {optimistic}");

    wait_for_text(&runtime.view, "10").await;
}

#[tokio::test]
async fn refresh_reads_the_server_count() {
    let server = MockServer::start().await;
    mount_quiet_sse(&server).await;
    mount_http(&server, "GET", "/", 200, count_body(-4)).await;

    let runtime = shell_for(&server, &fast_policy(2));
    runtime.bootstrap().await.unwrap();
    runtime.shell.dispatch(Event::Get).await.unwrap();

    wait_for_text(&runtime.view, "-4").await;
}

#[tokio::test]
async fn server_error_keeps_the_optimistic_value() {
    let server = MockServer::start().await;
    mount_quiet_sse(&server).await;
    mount_http(&server, "POST", "/dec", 500, "boom".to_string()).await;

    let mut runtime = shell_for(&server, &fast_policy(2));
    runtime.bootstrap().await.unwrap();
    runtime.shell.dispatch(Event::Decrement).await.unwrap();
    assert_eq!(runtime.view.latest().text, "-1");

    wait_for_request(&server, "POST", "/dec").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A 500 is a valid response: the Core ignores it and nothing is faulted.
    assert_eq!(runtime.view.latest().text, "-1");
    assert!(runtime.faults.try_next().is_none());
}

#[tokio::test]
async fn rejected_stream_is_reported_after_every_attempt() {
    let server = MockServer::start().await;
    mount_http(&server, "GET", "/sse", 503, String::new()).await;

    let mut runtime = shell_for(&server, &fast_policy(3));
    runtime.bootstrap().await.unwrap();

    let fault = next_fault(&mut runtime.faults).await;
    assert!(matches!(
        fault,
        ShellError::Transport {
            effect: EffectKind::ServerSentEvents,
            source: TransportError::Rejected {
                status: 503,
                attempts: 3,
                ..
            },
            ..
        }
    ));
    assert!(!fault.is_fatal());

    let attempts = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn unreachable_server_faults_the_http_effect() {
    // Reserve a port, then free it so nothing listens there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let capabilities = tether_providers::Capabilities::reqwest(
        &tether_providers::HttpSettings::default(),
        &fast_policy(1),
    )
    .unwrap();
    let mut runtime = tether_engine::Runtime::spawn(
        Box::new(tether_core::CounterCore::new(base)),
        capabilities,
        &tether_engine::DispatchConfig::default(),
    );
    runtime.shell.dispatch(Event::Increment).await.unwrap();

    let fault = next_fault(&mut runtime.faults).await;
    assert!(matches!(
        fault,
        ShellError::Transport {
            effect: EffectKind::Http,
            source: TransportError::Request { .. },
            ..
        }
    ));
    assert_eq!(runtime.view.latest().text, "1");
}

#[tokio::test]
async fn start_dispatches_start_watch_before_returning() {
    let server = MockServer::start().await;
    mount_sse(&server, sse_body(&[12])).await;

    let capabilities = tether_providers::Capabilities::reqwest(
        &tether_providers::HttpSettings::default(),
        &fast_policy(2),
    )
    .unwrap();
    let runtime = tether_engine::start(
        Box::new(tether_core::CounterCore::new(server.uri())),
        capabilities,
        &tether_engine::DispatchConfig::default(),
    )
    .await
    .unwrap();

    wait_for_request(&server, "GET", "/sse").await;
    wait_for_text(&runtime.view, "12").await;
    runtime.stop().await.unwrap();
}
