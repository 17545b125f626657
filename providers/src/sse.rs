//! Server-sent-events subscriptions over reqwest.
//!
//! The stream body is split on line boundaries (LF or CRLF). Every non-blank
//! line is forwarded on its own, framed as `line + "\n\n"` so each chunk is a
//! complete SSE event for the Core to parse. Blank separator lines carry no
//! data and are skipped.

use futures_util::StreamExt;
use futures_util::stream::{self, Stream};
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::retry::{ConnectOutcome, connect_with_retry};
use crate::{
    ChunkStream, ConnectPolicy, ProviderFut, SseProvider, SseRequest, TransportError,
    build_stream_client,
};

/// Longest line accepted before the stream is abandoned (4 MiB).
pub const MAX_SSE_LINE_BYTES: usize = 4 * 1024 * 1024;

const CHUNK_TERMINATOR: &[u8] = b"\n\n";

#[derive(Debug, Clone)]
pub struct ReqwestSse {
    client: Client,
    policy: ConnectPolicy,
}

impl ReqwestSse {
    pub fn new(policy: ConnectPolicy) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_stream_client(&policy)?,
            policy,
        })
    }
}

impl SseProvider for ReqwestSse {
    fn subscribe<'a>(&'a self, request: &'a SseRequest) -> ProviderFut<'a, ChunkStream> {
        Box::pin(async move {
            let url = request.url.clone();
            let build = || {
                self.client
                    .get(url.as_str())
                    .header(ACCEPT, "text/event-stream")
                    .header(CACHE_CONTROL, "no-cache")
            };

            let response = match connect_with_retry(build, &self.policy).await {
                ConnectOutcome::Established(response) => response,
                ConnectOutcome::Rejected { response, attempts } => {
                    return Err(TransportError::Rejected {
                        url,
                        status: response.status().as_u16(),
                        attempts,
                    });
                }
                ConnectOutcome::ConnectionError { attempts, source } => {
                    return Err(TransportError::Connect {
                        url,
                        attempts,
                        source,
                    });
                }
            };

            tracing::info!(url = %url, "SSE stream established");
            Ok(line_chunks(url, response.bytes_stream(), MAX_SSE_LINE_BYTES))
        })
    }
}

/// Accumulates stream bytes and yields complete lines.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Append bytes. Fails when any line, terminated or not, exceeds the limit.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<(), usize> {
        let checked = self
            .buffer
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos + 1);
        self.buffer.extend_from_slice(bytes);
        if self.buffer[checked..]
            .split(|b| *b == b'\n')
            .any(|line| line.len() > self.limit)
        {
            return Err(self.limit);
        }
        Ok(())
    }

    /// Next complete non-blank line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pos = self.buffer.iter().position(|b| *b == b'\n')?;
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !is_blank(&line) {
                return Some(line);
            }
        }
    }

    /// Whatever is left once the stream has ended, if it is not blank.
    pub(crate) fn take_remainder(&mut self) -> Option<Vec<u8>> {
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if is_blank(&line) { None } else { Some(line) }
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn frame(mut line: Vec<u8>) -> Vec<u8> {
    line.extend_from_slice(CHUNK_TERMINATOR);
    line
}

struct LineState<S> {
    body: S,
    lines: LineBuffer,
    url: String,
    eof: bool,
    failed: bool,
}

/// Turn a byte stream into framed line chunks.
///
/// The returned stream ends after the body ends or after the first error.
pub(crate) fn line_chunks<S, B>(url: String, body: S, limit: usize) -> ChunkStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = LineState {
        body: Box::pin(body),
        lines: LineBuffer::new(limit),
        url,
        eof: false,
        failed: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.failed {
                return None;
            }
            if let Some(line) = state.lines.next_line() {
                return Some((Ok(frame(line)), state));
            }
            if state.eof {
                let rest = state.lines.take_remainder()?;
                return Some((Ok(frame(rest)), state));
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    if let Err(limit) = state.lines.push(bytes.as_ref()) {
                        state.failed = true;
                        let err = TransportError::LineTooLong {
                            url: state.url.clone(),
                            limit,
                        };
                        return Some((Err(err), state));
                    }
                }
                Some(Err(source)) => {
                    state.failed = true;
                    let err = TransportError::Body {
                        url: state.url.clone(),
                        source,
                    };
                    return Some((Err(err), state));
                }
                None => state.eof = true,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    mod line_buffer {
        use super::super::LineBuffer;

        #[test]
        fn yields_lf_and_crlf_lines() {
            let mut lines = LineBuffer::new(1024);
            lines.push(b"data: a\ndata: b\r\npartial").unwrap();
            assert_eq!(lines.next_line(), Some(b"data: a".to_vec()));
            assert_eq!(lines.next_line(), Some(b"data: b".to_vec()));
            assert_eq!(lines.next_line(), None);
            assert_eq!(lines.take_remainder(), Some(b"partial".to_vec()));
        }

        #[test]
        fn skips_blank_separator_lines() {
            let mut lines = LineBuffer::new(1024);
            lines.push(b"data: 1\n\n\r\ndata: 2\n\n").unwrap();
            assert_eq!(lines.next_line(), Some(b"data: 1".to_vec()));
            assert_eq!(lines.next_line(), Some(b"data: 2".to_vec()));
            assert_eq!(lines.next_line(), None);
            assert_eq!(lines.take_remainder(), None);
        }

        #[test]
        fn joins_lines_split_across_pushes() {
            let mut lines = LineBuffer::new(1024);
            lines.push(b"data: {\"val").unwrap();
            assert_eq!(lines.next_line(), None);
            lines.push(b"ue\":3}\n").unwrap();
            assert_eq!(lines.next_line(), Some(b"data: {\"value\":3}".to_vec()));
        }

        #[test]
        fn rejects_oversized_unterminated_tail() {
            let mut lines = LineBuffer::new(8);
            assert!(lines.push(b"short\n").is_ok());
            assert_eq!(lines.push(b"0123456789"), Err(8));
        }

        #[test]
        fn rejects_oversized_terminated_line() {
            let mut lines = LineBuffer::new(8);
            assert_eq!(lines.push(b"ok\n0123456789abcdef\nok\n"), Err(8));

            let mut lines = LineBuffer::new(8);
            lines.push(b"0123").unwrap();
            assert_eq!(lines.push(b"456789\n"), Err(8));
        }

        #[test]
        fn accepts_line_at_the_limit() {
            let mut lines = LineBuffer::new(8);
            lines.push(b"01234567\n").unwrap();
            assert_eq!(lines.next_line(), Some(b"01234567".to_vec()));
        }
    }

    mod stream {
        use super::super::{ReqwestSse, line_chunks};
        use crate::{ConnectPolicy, SseProvider, SseRequest, TransportError};
        use futures_util::StreamExt;
        use futures_util::stream;
        use std::time::Duration;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn fast_policy() -> ConnectPolicy {
            ConnectPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                ..ConnectPolicy::default()
            }
        }

        #[tokio::test]
        async fn frames_each_line_as_a_chunk() {
            let body = stream::iter(vec![
                Ok::<_, reqwest::Error>(b"data: 1\n\nda".to_vec()),
                Ok(b"ta: 2\n\ndata: 3".to_vec()),
            ]);
            let chunks: Vec<_> = line_chunks("test".to_string(), body, 1024)
                .map(Result::unwrap)
                .collect()
                .await;

            assert_eq!(
                chunks,
                vec![
                    b"data: 1\n\n".to_vec(),
                    b"data: 2\n\n".to_vec(),
                    b"data: 3\n\n".to_vec(),
                ]
            );
        }

        #[tokio::test]
        async fn ends_after_oversized_line() {
            let body = stream::iter(vec![
                Ok::<_, reqwest::Error>(b"ok\n".to_vec()),
                Ok(vec![b'x'; 32]),
                Ok(b"\nnever\n".to_vec()),
            ]);
            let items: Vec<_> = line_chunks("test".to_string(), body, 16).collect().await;

            assert_eq!(items.len(), 2);
            assert_eq!(items[0].as_ref().unwrap(), b"ok\n\n");
            assert!(matches!(
                items[1],
                Err(TransportError::LineTooLong { limit: 16, .. })
            ));
        }

        #[tokio::test]
        async fn ends_on_oversized_line_delivered_whole() {
            let body = stream::iter(vec![
                Ok::<_, reqwest::Error>(b"ok\n".to_vec()),
                Ok([vec![b'x'; 32], b"\nnever\n".to_vec()].concat()),
            ]);
            let items: Vec<_> = line_chunks("test".to_string(), body, 16).collect().await;

            assert_eq!(items.len(), 2);
            assert_eq!(items[0].as_ref().unwrap(), b"ok\n\n");
            assert!(matches!(
                items[1],
                Err(TransportError::LineTooLong { limit: 16, .. })
            ));
        }

        #[tokio::test]
        async fn subscribes_and_streams_server_lines_in_order() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/sse"))
                .and(header("accept", "text/event-stream"))
                .respond_with(ResponseTemplate::new(200).set_body_raw(
                    "data: {\"value\":1}\n\ndata: {\"value\":2}\n\n",
                    "text/event-stream",
                ))
                .mount(&server)
                .await;

            let sse = ReqwestSse::new(fast_policy()).unwrap();
            let request = SseRequest {
                url: format!("{}/sse", server.uri()),
            };
            let chunks: Vec<_> = sse
                .subscribe(&request)
                .await
                .unwrap()
                .map(Result::unwrap)
                .collect()
                .await;

            assert_eq!(
                chunks,
                vec![
                    b"data: {\"value\":1}\n\n".to_vec(),
                    b"data: {\"value\":2}\n\n".to_vec(),
                ]
            );
        }

        #[tokio::test]
        async fn exhausted_connect_attempts_fail_the_subscription() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(502))
                .mount(&server)
                .await;

            let sse = ReqwestSse::new(fast_policy()).unwrap();
            let request = SseRequest {
                url: format!("{}/sse", server.uri()),
            };
            let err = sse.subscribe(&request).await.err().unwrap();

            assert!(matches!(
                err,
                TransportError::Rejected {
                    status: 502,
                    attempts: 3,
                    ..
                }
            ));
        }
    }
}
