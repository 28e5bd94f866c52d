//! Duplex channel over a browser WebSocket.
//!
//! Handshake: on open the channel sends `init` and sits in `Handshaking`
//! until the server's `connected` frame; only then is it `Open` for
//! requests. While open a `ping` goes out every keep-alive interval and the
//! matching `pong` is swallowed here.
//!
//! Reconnects are decided by [`ChannelLifecycle`]. Socket callbacks hold a
//! `Weak` to the channel and carry the generation of the socket they were
//! attached to, so callbacks from a replaced socket are ignored.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_timers::callback::{Interval, Timeout};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use analyst_core::lifecycle::{ChannelLifecycle, CloseAction, NORMAL_CLOSURE};
use analyst_core::ports::{EventSink, TransportPort};
use analyst_types::{
    config::{ClientConfig, TransportKind},
    event::{ChannelState, ClientFrame, OutboundRequest, TransportEvent, decode_frame},
};

/// Callbacks attached to one socket. Kept alive for as long as the socket
/// may call them.
struct Handlers {
    _onopen: Closure<dyn FnMut(Event)>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
    _onerror: Closure<dyn FnMut(Event)>,
}

struct Inner {
    config: ClientConfig,
    sink: EventSink,
    socket: Option<WebSocket>,
    handlers: Option<Handlers>,
    /// Handlers of closed sockets; a callback must never drop itself, so
    /// these are released on the next open.
    retired: Vec<Handlers>,
    state: ChannelState,
    lifecycle: ChannelLifecycle,
    session_id: Option<String>,
    generation: u64,
    keepalive: Option<Interval>,
    reconnect_timer: Option<Timeout>,
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        if self.sink.unbounded_send(event).is_err() {
            log::debug!("Event receiver dropped");
        }
    }

    fn send_frame(&self, frame: &ClientFrame) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode frame: {}", e);
                return false;
            }
        };
        match socket.send_with_str(&json) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("WebSocket send failed: {:?}", e);
                false
            }
        }
    }

    fn retire_handlers(&mut self) {
        if let Some(socket) = &self.socket {
            socket.set_onopen(None);
            socket.set_onmessage(None);
            socket.set_onclose(None);
            socket.set_onerror(None);
        }
        if let Some(handlers) = self.handlers.take() {
            self.retired.push(handlers);
        }
    }
}

pub struct WebSocketChannel {
    inner: Rc<RefCell<Inner>>,
}

impl WebSocketChannel {
    pub fn new(config: ClientConfig, sink: EventSink) -> Self {
        let lifecycle = ChannelLifecycle::new(config.reconnect.clone());
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                sink,
                socket: None,
                handlers: None,
                retired: Vec::new(),
                state: ChannelState::Closed,
                lifecycle,
                session_id: None,
                generation: 0,
                keepalive: None,
                reconnect_timer: None,
            })),
        }
    }
}

impl TransportPort for WebSocketChannel {
    fn connect(&self, session_id: Option<&str>) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.lifecycle.on_connect_requested();
            inner.session_id = session_id.map(String::from);
            if inner.state != ChannelState::Closed {
                log::debug!("connect() while {:?}; keeping the current socket", inner.state);
                return;
            }
            inner.reconnect_timer = None;
        }
        open_socket(&self.inner);
    }

    fn send(&self, request: &OutboundRequest) -> bool {
        let inner = self.inner.borrow();
        if inner.state != ChannelState::Open {
            log::error!("Cannot send while the channel is {:?}", inner.state);
            inner.emit(TransportEvent::Error {
                text: "Not connected to the analysis server. Please try again.".to_string(),
            });
            return false;
        }
        if !inner.send_frame(&request.to_frame()) {
            inner.emit(TransportEvent::Error {
                text: "Failed to send the request.".to_string(),
            });
            return false;
        }
        log::debug!("Sent analyze frame");
        true
    }

    fn cancel_in_flight(&self) -> bool {
        let inner = self.inner.borrow();
        if inner.state == ChannelState::Open && inner.send_frame(&ClientFrame::Cancel) {
            log::info!("Cancel frame sent");
            return true;
        }
        false
    }

    fn disconnect(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.lifecycle.mark_intentional();
        inner.reconnect_timer = None;
        inner.keepalive = None;
        inner.retire_handlers();
        if let Some(socket) = inner.socket.take() {
            if let Err(e) = socket.close_with_code(NORMAL_CLOSURE) {
                log::warn!("WebSocket close failed: {:?}", e);
            }
        }
        inner.state = ChannelState::Closed;
        log::info!("WebSocket disconnected");
    }

    fn state(&self) -> ChannelState {
        self.inner.borrow().state
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }
}

// ─── Socket plumbing ─────────────────────────────────────────

fn open_socket(rc: &Rc<RefCell<Inner>>) {
    let mut inner = rc.borrow_mut();
    inner.retired.clear();

    let url = inner.config.backend.ws_url(inner.session_id.as_deref());
    let socket = match WebSocket::new(&url) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Cannot open WebSocket to {}: {:?}", url, e);
            inner.emit(TransportEvent::Error {
                text: format!("Cannot connect to {}", url),
            });
            return;
        }
    };
    log::info!("Opening WebSocket {}", url);

    inner.generation += 1;
    let generation = inner.generation;
    let weak = Rc::downgrade(rc);

    let w = weak.clone();
    let onopen = Closure::wrap(Box::new(move |_: Event| {
        if let Some(rc) = live(&w, generation) {
            on_open(&rc);
        }
    }) as Box<dyn FnMut(Event)>);

    let w = weak.clone();
    let onmessage = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Some(rc) = live(&w, generation) {
            on_message(&rc, event);
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    let w = weak.clone();
    let onclose = Closure::wrap(Box::new(move |event: CloseEvent| {
        if let Some(rc) = live(&w, generation) {
            on_close(&rc, event.code());
        }
    }) as Box<dyn FnMut(CloseEvent)>);

    let onerror = Closure::wrap(Box::new(move |_: Event| {
        log::warn!("WebSocket error (generation {})", generation);
    }) as Box<dyn FnMut(Event)>);

    socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));

    inner.retire_handlers();
    inner.handlers = Some(Handlers {
        _onopen: onopen,
        _onmessage: onmessage,
        _onclose: onclose,
        _onerror: onerror,
    });
    inner.socket = Some(socket);
    inner.state = ChannelState::Connecting;
}

/// Upgrade the weak handle if the callback still belongs to the current socket.
fn live(weak: &Weak<RefCell<Inner>>, generation: u64) -> Option<Rc<RefCell<Inner>>> {
    let rc = weak.upgrade()?;
    let current = rc.borrow().generation;
    if current != generation {
        log::debug!("Ignoring callback from stale socket {}", generation);
        return None;
    }
    Some(rc)
}

fn on_open(rc: &Rc<RefCell<Inner>>) {
    let mut inner = rc.borrow_mut();
    inner.state = ChannelState::Handshaking;
    let init = ClientFrame::Init {
        session_id: inner.session_id.clone(),
    };
    if !inner.send_frame(&init) {
        log::error!("Failed to send init frame");
    }
}

fn on_message(rc: &Rc<RefCell<Inner>>, event: MessageEvent) {
    let Some(text) = event.data().as_string() else {
        log::warn!("Ignoring non-text WebSocket frame");
        return;
    };

    let event = decode_frame(&text);
    match &event {
        TransportEvent::HeartbeatAck => {
            log::debug!("pong");
            return;
        }
        TransportEvent::Connected { session_id } => {
            let mut inner = rc.borrow_mut();
            inner.state = ChannelState::Open;
            inner.lifecycle.on_connected();
            if let Some(id) = session_id {
                inner.session_id = Some(id.clone());
            }
            let interval_ms = inner.config.keepalive_interval_ms;
            inner.keepalive = Some(start_keepalive(Rc::downgrade(rc), interval_ms));
        }
        _ => log::debug!("Received {:?}", event),
    }
    rc.borrow().emit(event);
}

fn on_close(rc: &Rc<RefCell<Inner>>, code: u16) {
    let mut inner = rc.borrow_mut();
    inner.keepalive = None;
    inner.retire_handlers();
    inner.socket = None;
    inner.state = ChannelState::Closed;

    let action = inner.lifecycle.on_close(code);
    for event in action.events(code) {
        inner.emit(event);
    }
    match action {
        CloseAction::Reconnect { attempt, delay_ms } => {
            let weak = Rc::downgrade(rc);
            inner.reconnect_timer = Some(Timeout::new(delay_ms, move || {
                let Some(rc) = weak.upgrade() else { return };
                let fire = rc.borrow_mut().lifecycle.on_reconnect_fired();
                if fire {
                    log::info!("Reconnect attempt {}", attempt);
                    open_socket(&rc);
                }
            }));
        }
        CloseAction::GiveUp { .. } | CloseAction::Stay => {
            log::info!("WebSocket closed with code {}", code);
        }
    }
}

fn start_keepalive(weak: Weak<RefCell<Inner>>, interval_ms: u32) -> Interval {
    Interval::new(interval_ms, move || {
        let Some(rc) = weak.upgrade() else { return };
        let inner = rc.borrow();
        if inner.state == ChannelState::Open && !inner.send_frame(&ClientFrame::Ping) {
            log::warn!("Keep-alive ping failed");
        }
    })
}
