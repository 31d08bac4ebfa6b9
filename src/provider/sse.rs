//! Incremental decoding of `text/event-stream` bodies.
//!
//! Both streaming providers send one JSON document per `data:` line and
//! OpenRouter ends with `data: [DONE]`. Comment lines (`: keep-alive`) and
//! other fields are ignored.

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;

use crate::error::ProviderError;

struct DecodeState<S> {
    body: S,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    done: bool,
}

/// Split a byte stream into the payloads of its `data:` lines.
pub fn data_lines<S, B, E>(body: S) -> BoxStream<'static, Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                return Some((Ok(data), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(bytes.as_ref());
                    drain_lines(&mut state, false);
                }
                Some(Err(err)) => {
                    state.done = true;
                    state.pending.clear();
                    return Some((
                        Err(ProviderError::Network(format!("stream interrupted: {}", err))),
                        state,
                    ));
                }
                None => drain_lines(&mut state, true),
            }
        }
    })
    .boxed()
}

fn drain_lines<S>(state: &mut DecodeState<S>, at_eof: bool) {
    while let Some(pos) = state.buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = state.buffer.drain(..=pos).collect();
        push_line(state, &line);
    }
    if at_eof {
        if !state.buffer.is_empty() {
            let line = std::mem::take(&mut state.buffer);
            push_line(state, &line);
        }
        state.done = true;
    }
}

fn push_line<S>(state: &mut DecodeState<S>, raw: &[u8]) {
    if state.done {
        return;
    }
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return;
    };
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data == "[DONE]" {
        state.done = true;
        state.buffer.clear();
        return;
    }
    if !data.is_empty() {
        state.pending.push_back(data.to_string());
    }
}

/// End a stream right after its first error.
pub fn stop_after_error<T>(
    inner: BoxStream<'static, Result<T, ProviderError>>,
) -> BoxStream<'static, Result<T, ProviderError>>
where
    T: Send + 'static,
{
    inner
        .scan(false, |failed, item| {
            if *failed {
                return futures_util::future::ready(None);
            }
            if item.is_err() {
                *failed = true;
            }
            futures_util::future::ready(Some(item))
        })
        .boxed()
}
