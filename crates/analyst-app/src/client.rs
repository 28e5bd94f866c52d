//! `AnalystClient`: the JavaScript-facing handle.
//!
//! Transport events arrive on an unbounded channel and are folded into the
//! coordinator by a single `spawn_local` pump. REST operations validate
//! synchronously, release the borrow, await the call, then borrow again to
//! record the outcome.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::StreamExt;
use futures::channel::mpsc;
use gloo_utils::format::JsValueSerdeExt;
use js_sys::{Promise, Uint8Array};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use analyst_core::coordinator::ChatCoordinator;
use analyst_core::event_bus::EventBus;
use analyst_core::ports::{RestPort, StoragePort, TransportPort};
use analyst_platform::HttpRestClient;
use analyst_platform::storage::auto_detect_storage;
use analyst_platform::transport::{PushStreamChannel, RestChannel, WebSocketChannel};
use analyst_types::{
    config::{ClientConfig, TransportKind},
    event::TransportEvent,
};

use crate::config::load_config;

#[wasm_bindgen]
pub struct AnalystClient {
    coordinator: Rc<RefCell<ChatCoordinator>>,
    rest: Rc<dyn RestPort>,
}

#[wasm_bindgen]
impl AnalystClient {
    /// `config` is an optional partial `ClientConfig` object merged over the
    /// stored one.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<AnalystClient, JsValue> {
        let overrides = if config.is_undefined() || config.is_null() {
            None
        } else {
            Some(config.into_serde::<Value>().map_err(js_error)?)
        };

        let storage: Rc<dyn StoragePort> = auto_detect_storage();
        let config = load_config(storage.as_ref(), overrides);
        log::info!(
            "Backend {} via {}",
            config.backend.base_url,
            config.transport.label()
        );

        let (sink, events) = mpsc::unbounded();
        let rest: Rc<dyn RestPort> = Rc::new(HttpRestClient::new(config.backend.clone()));
        let transport = build_transport(&config, rest.clone(), sink);

        let coordinator = Rc::new(RefCell::new(ChatCoordinator::new(
            config,
            storage,
            transport,
            EventBus::new(),
        )));
        spawn_pump(Rc::downgrade(&coordinator), events);
        coordinator.borrow_mut().connect();

        Ok(AnalystClient { coordinator, rest })
    }

    /// Submit user input. Resolves the turn kind (`analysis` or `chat`).
    pub fn submit(&self, text: &str) -> Result<JsValue, JsValue> {
        let kind = self.coordinator.borrow_mut().submit(text).map_err(js_error)?;
        to_js(&kind)
    }

    pub fn cancel(&self) -> bool {
        self.coordinator.borrow_mut().cancel()
    }

    #[wasm_bindgen(js_name = newConversation)]
    pub fn new_conversation(&self) {
        self.coordinator.borrow_mut().new_conversation();
    }

    #[wasm_bindgen(js_name = goBack)]
    pub fn go_back(&self) -> bool {
        self.coordinator.borrow_mut().go_back()
    }

    #[wasm_bindgen(js_name = goForward)]
    pub fn go_forward(&self) -> bool {
        self.coordinator.borrow_mut().go_forward()
    }

    // ─── Snapshots ───────────────────────────────────────────

    #[wasm_bindgen(js_name = viewModel)]
    pub fn view_model(&self) -> Result<JsValue, JsValue> {
        to_js(self.coordinator.borrow().view_model())
    }

    pub fn messages(&self) -> Result<JsValue, JsValue> {
        to_js(self.coordinator.borrow().messages())
    }

    pub fn indicators(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().indicators())
    }

    pub fn suggestions(&self) -> Result<JsValue, JsValue> {
        to_js(self.coordinator.borrow().suggestions())
    }

    pub fn progress(&self) -> String {
        self.coordinator.borrow().progress().to_string()
    }

    pub fn phase(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().phase())
    }

    #[wasm_bindgen(js_name = sessionId)]
    pub fn session_id(&self) -> Option<String> {
        self.coordinator.borrow().session_id().map(String::from)
    }

    #[wasm_bindgen(js_name = uniqueRepositories)]
    pub fn unique_repositories(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().unique_repositories())
    }

    /// Change notifications since the last call.
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<JsValue, JsValue> {
        let events = self.coordinator.borrow().bus().drain();
        to_js(&events)
    }

    // ─── REST operations ─────────────────────────────────────

    /// Compare two analysed repositories given as `owner/name` keys.
    /// Resolves the updated view model.
    pub fn compare(&self, keys: JsValue) -> Promise {
        let coordinator = self.coordinator.clone();
        let rest = self.rest.clone();
        future_to_promise(async move {
            let keys: Vec<String> = keys.into_serde().map_err(js_error)?;
            let request = coordinator.borrow_mut().begin_compare(&keys).map_err(js_error)?;
            let result = rest.compare(&request.repo_urls).await;
            let mut coordinator = coordinator.borrow_mut();
            coordinator.finish_compare(&request, result);
            to_js(coordinator.view_model())
        })
    }

    /// Regenerate the onboarding plan for `beginner`, `intermediate` or
    /// `advanced`. Resolves the updated view model.
    #[wasm_bindgen(js_name = regeneratePlan)]
    pub fn regenerate_plan(&self, experience_level: String) -> Promise {
        let coordinator = self.coordinator.clone();
        let rest = self.rest.clone();
        future_to_promise(async move {
            let request = coordinator
                .borrow_mut()
                .begin_plan_regeneration(&experience_level)
                .map_err(js_error)?;
            let result = rest
                .generate_onboarding_plan(&request.repo_url, &request.experience_level)
                .await;
            let mut coordinator = coordinator.borrow_mut();
            coordinator.finish_plan_regeneration(&request, result);
            to_js(coordinator.view_model())
        })
    }

    /// Resolves the exported document as a `Uint8Array`.
    #[wasm_bindgen(js_name = exportReport)]
    pub fn export_report(&self, format: String) -> Promise {
        let coordinator = self.coordinator.clone();
        let rest = self.rest.clone();
        future_to_promise(async move {
            let (report, format) = coordinator
                .borrow()
                .prepare_export(&format)
                .map_err(js_error)?;
            match rest.export_report(&report, format).await {
                Ok(bytes) => {
                    coordinator
                        .borrow_mut()
                        .note_outcome(Ok(format!("Report exported as {}.", format.as_str())));
                    Ok(Uint8Array::from(bytes.as_slice()).into())
                }
                Err(e) => {
                    let err = js_error(&e);
                    coordinator.borrow_mut().note_outcome(Err(e));
                    Err(err)
                }
            }
        })
    }

    #[wasm_bindgen(js_name = sendReportPdf)]
    pub fn send_report_pdf(&self, email: String) -> Promise {
        let coordinator = self.coordinator.clone();
        let rest = self.rest.clone();
        future_to_promise(async move {
            let (email, report) = coordinator
                .borrow()
                .prepare_report_email(&email)
                .map_err(js_error)?;
            match rest.send_report_pdf(&email, &report).await {
                Ok(()) => {
                    coordinator
                        .borrow_mut()
                        .note_outcome(Ok(format!("Report sent to {}.", email)));
                    Ok(JsValue::TRUE)
                }
                Err(e) => {
                    let err = js_error(&e);
                    coordinator.borrow_mut().note_outcome(Err(e));
                    Err(err)
                }
            }
        })
    }
}

fn build_transport(
    config: &ClientConfig,
    rest: Rc<dyn RestPort>,
    sink: mpsc::UnboundedSender<TransportEvent>,
) -> Rc<dyn TransportPort> {
    match config.transport {
        TransportKind::WebSocket => Rc::new(WebSocketChannel::new(config.clone(), sink)),
        TransportKind::PushStream => Rc::new(PushStreamChannel::new(config.clone(), sink)),
        TransportKind::Rest => Rc::new(RestChannel::new(rest, sink)),
    }
}

/// Fold transport events into the coordinator until the client is dropped.
fn spawn_pump(
    coordinator: Weak<RefCell<ChatCoordinator>>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    spawn_local(async move {
        while let Some(event) = events.next().await {
            let Some(coordinator) = coordinator.upgrade() else {
                break;
            };
            coordinator.borrow_mut().handle_event(event);
        }
        log::debug!("Event pump stopped");
    });
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(js_error)
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}
