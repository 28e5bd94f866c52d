//! WASM-target tests for analyst-types.
//!
//! Runs frame decoding and view-model checks under wasm32-unknown-unknown
//! via `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use analyst_types::analysis::*;
use analyst_types::event::*;
use analyst_types::message::*;
use analyst_types::session::*;

#[wasm_bindgen_test]
fn decode_connected_frame() {
    assert_eq!(
        decode_frame(r#"{"type":"connected","session_id":"abc"}"#),
        TransportEvent::Connected { session_id: Some("abc".to_string()) }
    );
}

#[wasm_bindgen_test]
fn decode_unknown_frame_never_fails() {
    assert!(matches!(decode_frame("{{{"), TransportEvent::Unknown { .. }));
    assert!(matches!(
        decode_frame(r#"{"type":"something_new"}"#),
        TransportEvent::Unknown { .. }
    ));
}

#[wasm_bindgen_test]
fn message_ids_and_timestamps_work_in_wasm() {
    // uuid and chrono both need their js features under wasm32
    let msg = ChatMessage::user("hi");
    assert_eq!(msg.id.len(), 36);
    assert!(!msg.timestamp.is_empty());
}

#[wasm_bindgen_test]
fn session_created_at_is_set() {
    assert!(!Session::new().created_at.is_empty());
}

#[wasm_bindgen_test]
fn view_model_content_detection() {
    let mut vm = AnalysisViewModel::for_repository(RepositoryRef::new("a", "b"));
    assert!(!vm.has_content());
    vm.risks.push(Risk { title: "Bus factor".to_string(), ..Default::default() });
    assert!(vm.has_content());
}
