//! Shared test utilities and fixtures
//!
//! A mock counter server and a shell wired to it through the real reqwest
//! providers.

#![allow(dead_code)]

use std::time::Duration;

use tether_core::CounterCore;
use tether_engine::{DispatchConfig, Faults, Runtime, ShellError, ViewHandle};
use tether_providers::{Capabilities, ConnectPolicy, HttpSettings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WAIT: Duration = Duration::from_secs(5);

/// Counter server JSON, as sent by the real service.
pub fn count_body(value: i64) -> String {
    serde_json::json!({ "value": value, "id": "test" }).to_string()
}

/// SSE body carrying one `data:` event per value.
pub fn sse_body(values: &[i64]) -> String {
    values
        .iter()
        .map(|value| format!("data: {}\n\n", count_body(*value)))
        .collect()
}

/// Mount `/sse` returning `body` and then closing the stream.
pub async fn mount_sse(server: &MockServer, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into(), "text/event-stream"))
        .mount(server)
        .await;
}

/// Mount `/sse` carrying only a comment line, so the view is left alone.
pub async fn mount_quiet_sse(server: &MockServer) {
    mount_sse(server, ": connected\n\n").await;
}

/// Mount `method path` answering `status` with `body`.
pub async fn mount_http(server: &MockServer, verb: &str, route: &str, status: u16, body: String) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Connect policy with millisecond backoff so retry tests stay quick.
pub fn fast_policy(max_attempts: u32) -> ConnectPolicy {
    ConnectPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        ..ConnectPolicy::default()
    }
}

/// A shell driving a counter Core against `server`, not yet bootstrapped.
pub fn shell_for(server: &MockServer, policy: &ConnectPolicy) -> Runtime {
    let capabilities = Capabilities::reqwest(&HttpSettings::default(), policy)
        .expect("reqwest capabilities build");
    Runtime::spawn(
        Box::new(CounterCore::new(server.uri())),
        capabilities,
        &DispatchConfig::default(),
    )
}

pub async fn wait_for_text(view: &ViewHandle, text: &str) {
    let mut view = view.clone();
    tokio::time::timeout(WAIT, async {
        while view.latest().text != text {
            view.changed().await.expect("dispatch loop alive");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("view never showed {text:?}; last was {:?}", view.latest().text));
}

pub async fn next_fault(faults: &mut Faults) -> ShellError {
    tokio::time::timeout(WAIT, faults.next())
        .await
        .expect("fault within timeout")
        .expect("fault channel open")
}

/// Wait until the server has seen `verb path` at least once.
pub async fn wait_for_request(server: &MockServer, verb: &str, route: &str) {
    tokio::time::timeout(WAIT, async {
        loop {
            let seen = server
                .received_requests()
                .await
                .unwrap_or_default()
                .iter()
                .any(|request| request.method.as_str() == verb && request.url.path() == route);
            if seen {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("server never received {verb} {route}"));
}
