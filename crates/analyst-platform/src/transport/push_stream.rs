//! Push-stream channel: one POST per request, response body read as
//! line-delimited `data: {json}` frames.
//!
//! There is no standing connection, so the channel always reports `Open`;
//! the session id arrives in the first (`start`) frame of each response.
//! Cancellation aborts the fetch and bumps the request sequence so chunks
//! already in flight are dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{AbortController, ReadableStreamDefaultReader};

use analyst_core::ports::{EventSink, TransportPort};
use analyst_core::stream_parser::PushStreamDecoder;
use analyst_types::{
    AnalystError, Result,
    config::{ClientConfig, TransportKind},
    event::{ChannelState, OutboundRequest, TransportEvent},
};

struct Inner {
    config: ClientConfig,
    sink: EventSink,
    session_id: Option<String>,
    in_flight: Option<AbortController>,
    seq: u64,
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        if self.sink.unbounded_send(event).is_err() {
            log::debug!("Event receiver dropped");
        }
    }
}

pub struct PushStreamChannel {
    inner: Rc<RefCell<Inner>>,
}

impl PushStreamChannel {
    pub fn new(config: ClientConfig, sink: EventSink) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                sink,
                session_id: None,
                in_flight: None,
                seq: 0,
            })),
        }
    }
}

impl TransportPort for PushStreamChannel {
    fn connect(&self, session_id: Option<&str>) {
        let mut inner = self.inner.borrow_mut();
        inner.session_id = session_id.map(String::from);
        log::info!("Push stream ready ({})", inner.config.backend.stream_url());
    }

    fn send(&self, request: &OutboundRequest) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.in_flight.is_some() {
            log::error!("A push stream request is already running");
            inner.emit(TransportEvent::Error {
                text: "A request is already in progress.".to_string(),
            });
            return false;
        }

        let controller = match AbortController::new() {
            Ok(controller) => controller,
            Err(e) => {
                log::error!("AbortController unavailable: {:?}", e);
                inner.emit(TransportEvent::Error {
                    text: "Streaming is not supported in this browser.".to_string(),
                });
                return false;
            }
        };

        inner.seq += 1;
        let seq = inner.seq;
        let url = inner.config.backend.stream_url();
        let body = request.to_stream_body(inner.session_id.as_deref());
        let signal = controller.signal();
        inner.in_flight = Some(controller);

        let weak = Rc::downgrade(&self.inner);
        spawn_local(async move {
            let result = run_stream(&weak, seq, &url, &body, &signal).await;
            let Some(rc) = weak.upgrade() else { return };
            let mut inner = rc.borrow_mut();
            if inner.seq != seq {
                log::debug!("Stream {} finished after cancel", seq);
                return;
            }
            inner.in_flight = None;
            if let Err(e) = result {
                log::error!("Push stream failed: {}", e);
                inner.emit(TransportEvent::Error { text: e.to_string() });
            }
        });
        true
    }

    fn cancel_in_flight(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.seq += 1;
        if let Some(controller) = inner.in_flight.take() {
            controller.abort();
            log::info!("Push stream aborted");
        }
        false
    }

    fn disconnect(&self) {
        self.cancel_in_flight();
        self.inner.borrow_mut().session_id = None;
    }

    fn state(&self) -> ChannelState {
        ChannelState::Open
    }

    fn kind(&self) -> TransportKind {
        TransportKind::PushStream
    }
}

/// POST the request and pump the body through the decoder until a
/// terminal frame or the end of the body.
async fn run_stream(
    weak: &Weak<RefCell<Inner>>,
    seq: u64,
    url: &str,
    body: &serde_json::Value,
    signal: &web_sys::AbortSignal,
) -> Result<()> {
    let response = Request::post(url)
        .abort_signal(Some(signal))
        .json(body)
        .map_err(|e| AnalystError::Network(e.to_string()))?
        .send()
        .await
        .map_err(|e| AnalystError::Network(e.to_string()))?;

    if !response.ok() {
        return Err(AnalystError::Network(format!(
            "HTTP {} from stream endpoint",
            response.status()
        )));
    }

    let stream = response
        .body()
        .ok_or_else(|| AnalystError::Protocol("Stream response has no body".to_string()))?;
    let reader: ReadableStreamDefaultReader = stream.get_reader().unchecked_into();
    let mut decoder = PushStreamDecoder::new();

    loop {
        let chunk = JsFuture::from(reader.read())
            .await
            .map_err(|e| AnalystError::Network(format!("{:?}", e)))?;
        let done = Reflect::get(&chunk, &JsValue::from_str("done"))
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let events = if done {
            decoder.finish()
        } else {
            let value = Reflect::get(&chunk, &JsValue::from_str("value"))
                .map_err(|e| AnalystError::JsInterop(format!("{:?}", e)))?;
            decoder.push(&Uint8Array::new(&value).to_vec())
        };

        if !forward(weak, seq, events) {
            let _ = reader.cancel();
            return Ok(());
        }
        if decoder.is_finished() {
            let _ = reader.cancel();
            return Ok(());
        }
        if done {
            log::warn!("Stream ended without a done frame");
            forward(weak, seq, vec![TransportEvent::Done]);
            return Ok(());
        }
    }
}

/// Deliver events for request `seq`. Returns false once the request was
/// cancelled or the channel dropped.
fn forward(weak: &Weak<RefCell<Inner>>, seq: u64, events: Vec<TransportEvent>) -> bool {
    let Some(rc) = weak.upgrade() else {
        return false;
    };
    let mut inner = rc.borrow_mut();
    if inner.seq != seq {
        return false;
    }
    for event in events {
        if let TransportEvent::Connected { session_id: Some(id) } = &event {
            inner.session_id = Some(id.clone());
        }
        inner.emit(event);
    }
    true
}
