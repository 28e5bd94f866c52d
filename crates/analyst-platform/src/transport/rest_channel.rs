//! Non-streaming fallback: one `analyze` REST call per analysis request,
//! replayed as agent completions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen_futures::spawn_local;

use analyst_core::ports::{EventSink, RestPort, TransportPort};
use analyst_types::{
    config::TransportKind,
    event::{ChannelState, OutboundRequest, TransportEvent},
};

pub struct RestChannel {
    rest: Rc<dyn RestPort>,
    sink: EventSink,
    /// Bumped on every send and cancel; responses for an older value are dropped
    generation: Rc<Cell<u64>>,
    session_id: RefCell<Option<String>>,
}

impl RestChannel {
    pub fn new(rest: Rc<dyn RestPort>, sink: EventSink) -> Self {
        Self {
            rest,
            sink,
            generation: Rc::new(Cell::new(0)),
            session_id: RefCell::new(None),
        }
    }

    fn emit(&self, event: TransportEvent) {
        emit(&self.sink, event);
    }
}

fn emit(sink: &EventSink, event: TransportEvent) {
    if sink.unbounded_send(event).is_err() {
        log::debug!("Event receiver dropped");
    }
}

impl TransportPort for RestChannel {
    fn connect(&self, session_id: Option<&str>) {
        *self.session_id.borrow_mut() = session_id.map(String::from);
        log::info!("REST channel ready");
    }

    fn send(&self, request: &OutboundRequest) -> bool {
        let Some(repository) = request.repository.clone() else {
            log::warn!("REST channel cannot answer follow-up questions");
            self.emit(TransportEvent::Error {
                text: "Follow-up questions need a streaming connection.".to_string(),
            });
            return false;
        };

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let current = self.generation.clone();
        let rest = self.rest.clone();
        let sink = self.sink.clone();

        spawn_local(async move {
            let url = repository.url();
            log::info!("REST analyze {}", url);
            let result = rest.analyze(&url).await;
            if current.get() != generation {
                log::debug!("Dropping REST response for cancelled request {}", generation);
                return;
            }
            match result {
                Ok(response) => {
                    for event in TransportEvent::from_analysis_response(&response) {
                        emit(&sink, event);
                    }
                }
                Err(e) => {
                    log::error!("REST analyze failed: {}", e);
                    emit(&sink, TransportEvent::Error { text: e.to_string() });
                }
            }
        });
        true
    }

    fn cancel_in_flight(&self) -> bool {
        self.generation.set(self.generation.get() + 1);
        false
    }

    fn disconnect(&self) {
        self.cancel_in_flight();
        *self.session_id.borrow_mut() = None;
    }

    fn state(&self) -> ChannelState {
        ChannelState::Open
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }
}
