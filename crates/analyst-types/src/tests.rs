#[cfg(test)]
mod tests {
    use crate::analysis::*;
    use crate::config::*;
    use crate::error::*;
    use crate::event::*;
    use crate::message::*;
    use crate::session::*;
    use serde_json::json;

    // ─── RepositoryRef / Session Tests ───────────────────────

    #[test]
    fn test_repository_ref_forms() {
        let repo = RepositoryRef::new("facebook", "react");
        assert_eq!(repo.full_name(), "facebook/react");
        assert_eq!(repo.url(), "https://github.com/facebook/react");
        assert_eq!(repo.to_string(), "facebook/react");
    }

    #[test]
    fn test_repository_hint_roundtrip() {
        let repo = RepositoryRef::new("octocat", "Hello-World");
        let hint = RepositoryHint::from(&repo);
        assert_eq!(hint.full_name, "octocat/Hello-World");

        let json = serde_json::to_string(&hint).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["owner"], "octocat");
        assert_eq!(value["repo"], "Hello-World");

        let back: RepositoryRef = serde_json::from_str::<RepositoryHint>(&json).unwrap().into();
        assert_eq!(back, repo);
    }

    #[test]
    fn test_repository_hint_without_full_name() {
        let hint: RepositoryHint = serde_json::from_str(r#"{"owner":"a","repo":"b"}"#).unwrap();
        assert!(hint.full_name.is_empty());
    }

    #[test]
    fn test_session_new_is_empty() {
        let session = Session::new();
        assert!(session.session_id.is_none());
        assert!(session.repository.is_none());
        assert_eq!(session.turn_count, 0);
        assert!(!session.is_resumable());
        assert!(!session.created_at.is_empty());
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.keepalive_interval_ms, 30_000);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"transport":"push_stream"}"#).unwrap();
        assert_eq!(config.transport, TransportKind::PushStream);
        assert_eq!(config.backend, BackendConfig::default());
    }

    #[test]
    fn test_backend_ws_url_scheme() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.ws_url(None), "ws://localhost:8000/ws/chat");

        backend.base_url = "https://api.example.com/".to_string();
        assert_eq!(
            backend.ws_url(Some("abc")),
            "wss://api.example.com/ws/chat?session_id=abc"
        );
        assert_eq!(backend.ws_url(Some("")), "wss://api.example.com/ws/chat");
    }

    #[test]
    fn test_backend_endpoints() {
        let backend = BackendConfig::default();
        assert_eq!(backend.stream_url(), "http://localhost:8000/api/chat/stream");
        assert_eq!(backend.endpoint("analyze"), "http://localhost:8000/api/analyze");
    }

    #[test]
    fn test_transport_kind_labels() {
        for kind in TransportKind::all() {
            assert!(!kind.label().is_empty());
        }
    }

    // ─── AgentName Tests ─────────────────────────────────────

    #[test]
    fn test_agent_name_parse() {
        assert_eq!("security".parse::<AgentName>().unwrap(), AgentName::Security);
        assert_eq!("Diagnosis".parse::<AgentName>().unwrap(), AgentName::Diagnosis);
        assert_eq!("onboarding_agent".parse::<AgentName>().unwrap(), AgentName::Onboarding);
        assert_eq!("onboarding_plan".parse::<AgentName>().unwrap(), AgentName::Onboarding);
        assert_eq!("recommendations".parse::<AgentName>().unwrap(), AgentName::Recommend);
        assert!("supervisor".parse::<AgentName>().is_err());
    }

    #[test]
    fn test_agent_name_as_str_parses_back() {
        for agent in AgentName::all() {
            assert_eq!(agent.as_str().parse::<AgentName>().unwrap(), *agent);
        }
        assert_eq!(AgentName::all().len(), 6);
    }

    #[test]
    fn test_agent_status_terminal() {
        assert!(AgentStatus::Complete.is_terminal());
        assert!(AgentStatus::Error.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(!AgentStatus::Idle.is_terminal());
    }

    // ─── View model Tests ────────────────────────────────────

    #[test]
    fn test_view_model_empty_has_no_content() {
        let vm = AnalysisViewModel::for_repository(RepositoryRef::new("a", "b"));
        assert!(!vm.has_content());
        assert_eq!(vm.repository_key().as_deref(), Some("a/b"));
        assert!(vm.score().is_none());
    }

    #[test]
    fn test_view_model_with_summary_has_content() {
        let mut vm = AnalysisViewModel::default();
        vm.summary = Some(HealthSummary {
            score: Some(82.0),
            ..Default::default()
        });
        assert!(vm.has_content());
        assert_eq!(vm.score(), Some(82.0));
    }

    #[test]
    fn test_payload_aliases() {
        let diag: DiagnosisPayload =
            serde_json::from_value(json!({"score": 70, "description": "ok"})).unwrap();
        assert_eq!(diag.health_score, Some(70.0));
        assert_eq!(diag.summary.as_deref(), Some("ok"));
        assert!(diag.risks.is_none());

        let onboarding: OnboardingPayload =
            serde_json::from_value(json!({"plan": [{"week": 1, "title": "Setup"}]})).unwrap();
        assert_eq!(onboarding.weeks.unwrap()[0].title, "Setup");
    }

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_constructors() {
        let user = ChatMessage::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.body.as_text(), "hello");

        let warn = ChatMessage::warning("careful");
        assert_eq!(warn.role, Role::System);
        assert!(matches!(warn.body, MessageBody::Warning(_)));

        let err = ChatMessage::error("boom");
        assert_eq!(err.role, Role::Assistant);
        assert!(err.is_error());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = ChatMessage::assistant("x");
        let b = ChatMessage::assistant("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_report_message_serialization() {
        let mut report = ReportGeneration::new(RepositoryRef::new("a", "b"));
        report.agents.insert(AgentName::Security, AgentStatus::Complete);
        report.agents.insert(AgentName::Diagnosis, AgentStatus::Running);
        assert_eq!(report.completed_count(), 1);

        let msg = ChatMessage::report(report);
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    // ─── Client frame Tests ──────────────────────────────────

    #[test]
    fn test_client_frames_json() {
        let init = ClientFrame::Init { session_id: Some("s1".to_string()) }.to_json().unwrap();
        assert_eq!(init, r#"{"type":"init","session_id":"s1"}"#);

        let init_fresh = ClientFrame::Init { session_id: None }.to_json().unwrap();
        assert_eq!(init_fresh, r#"{"type":"init","session_id":null}"#);

        assert_eq!(ClientFrame::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(ClientFrame::Cancel.to_json().unwrap(), r#"{"type":"cancel"}"#);
    }

    #[test]
    fn test_outbound_request_frame() {
        let req = OutboundRequest {
            message: "analyze facebook/react".to_string(),
            repository: Some(RepositoryRef::new("facebook", "react")),
        };
        let json: serde_json::Value =
            serde_json::from_str(&req.to_frame().to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "analyze");
        assert_eq!(json["owner"], "facebook");
        assert_eq!(json["repo"], "react");

        let chat = OutboundRequest { message: "hi".to_string(), repository: None };
        let json: serde_json::Value =
            serde_json::from_str(&chat.to_frame().to_json().unwrap()).unwrap();
        assert!(json.get("owner").is_none());
    }

    #[test]
    fn test_outbound_stream_body() {
        let req = OutboundRequest {
            message: "hi".to_string(),
            repository: Some(RepositoryRef::new("a", "b")),
        };
        let body = req.to_stream_body(Some("sess"));
        assert_eq!(body["session_id"], "sess");
        assert_eq!(body["repo"], "b");
        assert!(req.to_stream_body(None).get("session_id").is_none());
    }

    // ─── Server frame decoding Tests ─────────────────────────

    #[test]
    fn test_decode_connected_and_start() {
        assert_eq!(
            decode_frame(r#"{"type":"connected","session_id":"abc"}"#),
            TransportEvent::Connected { session_id: Some("abc".to_string()) }
        );
        assert_eq!(
            decode_frame(r#"{"type":"start","session_id":"xyz"}"#),
            TransportEvent::Connected { session_id: Some("xyz".to_string()) }
        );
    }

    #[test]
    fn test_decode_processing() {
        let event = decode_frame(
            r#"{"type":"processing","agent":"security","message":"Scanning deps","progress":42.5}"#,
        );
        assert_eq!(
            event,
            TransportEvent::Progress {
                agent: Some(AgentName::Security),
                message: "Scanning deps".to_string(),
                percent: Some(42),
            }
        );
    }

    #[test]
    fn test_decode_processing_unknown_agent_keeps_message() {
        let event = decode_frame(r#"{"type":"processing","agent":"supervisor","message":"Routing"}"#);
        assert!(matches!(
            event,
            TransportEvent::Progress { agent: None, ref message, .. } if message == "Routing"
        ));
    }

    #[test]
    fn test_decode_agent_complete_result_or_data() {
        let a = decode_frame(r#"{"type":"agent_complete","agent":"diagnosis","result":{"health_score":80}}"#);
        let b = decode_frame(r#"{"type":"agent_complete","agent":"diagnosis","data":{"health_score":80}}"#);
        assert_eq!(a, b);
        assert!(matches!(a, TransportEvent::AgentComplete { agent: AgentName::Diagnosis, .. }));
    }

    #[test]
    fn test_decode_agent_complete_unknown_agent() {
        let event = decode_frame(r#"{"type":"agent_complete","agent":"mystery","result":{}}"#);
        assert!(matches!(event, TransportEvent::Unknown { .. }));
    }

    #[test]
    fn test_decode_answer_variants() {
        let plain = decode_frame(r#"{"type":"answer","content":"Hello"}"#);
        assert!(matches!(plain, TransportEvent::Answer { ref text, .. } if text == "Hello"));

        let final_answer = decode_frame(r#"{"type":"final_answer","message":"Bye"}"#);
        assert!(matches!(final_answer, TransportEvent::Answer { ref text, .. } if text == "Bye"));

        let structured = decode_frame(
            r#"{"type":"answer","data":{"answer":"Report ready","suggestions":["More?"],"diagnosis":{"health_score":55},"onboarding_plan":[{"week":1}]}}"#,
        );
        match structured {
            TransportEvent::Answer { text, suggestions, attachments } => {
                assert_eq!(text, "Report ready");
                assert_eq!(suggestions, vec!["More?".to_string()]);
                let agents: Vec<AgentName> = attachments.iter().map(|a| a.agent).collect();
                assert!(agents.contains(&AgentName::Diagnosis));
                assert!(agents.contains(&AgentName::Onboarding));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_answer_top_level_suggestions_win() {
        let event = decode_frame(
            r#"{"type":"answer","content":"x","suggestions":["a"],"data":{"suggestions":["b"]}}"#,
        );
        assert!(matches!(event, TransportEvent::Answer { ref suggestions, .. } if suggestions == &vec!["a".to_string()]));
    }

    #[test]
    fn test_decode_error_variants() {
        assert_eq!(
            decode_frame(r#"{"type":"error","error":"rate limited"}"#),
            TransportEvent::Error { text: "rate limited".to_string() }
        );
        assert_eq!(
            decode_frame(r#"{"type":"error","message":"timeout","agent":"security"}"#),
            TransportEvent::AgentError {
                agent: AgentName::Security,
                text: "timeout".to_string()
            }
        );
    }

    #[test]
    fn test_decode_simple_tags() {
        assert_eq!(decode_frame(r#"{"type":"done"}"#), TransportEvent::Done);
        assert_eq!(decode_frame(r#"{"type":"cancelled"}"#), TransportEvent::Cancelled);
        assert_eq!(decode_frame(r#"{"type":"pong"}"#), TransportEvent::HeartbeatAck);
        assert_eq!(
            decode_frame(r#"{"type":"warning","message":"partial data"}"#),
            TransportEvent::Warning { text: "partial data".to_string() }
        );
    }

    #[test]
    fn test_decode_unknown_tag_is_absorbed() {
        assert_eq!(
            decode_frame(r#"{"type":"telemetry","x":1}"#),
            TransportEvent::Unknown { tag: "telemetry".to_string() }
        );
    }

    #[test]
    fn test_decode_malformed_is_absorbed() {
        assert!(matches!(decode_frame("not json"), TransportEvent::Unknown { .. }));
        assert!(matches!(decode_frame(r#"{"no_type":true}"#), TransportEvent::Unknown { .. }));
    }

    #[test]
    fn test_terminal_events() {
        assert!(TransportEvent::Done.is_terminal());
        assert!(TransportEvent::Error { text: String::new() }.is_terminal());
        assert!(!TransportEvent::Cancelled.is_terminal());
        assert!(!TransportEvent::HeartbeatAck.is_terminal());
    }

    #[test]
    fn test_events_from_analysis_response() {
        let response = json!({
            "diagnosis": {"health_score": 90},
            "security": {"grade": "A"},
            "recommendations": [{"title": "Add CI"}],
            "meta": {"elapsed": 3},
            "contributor": null
        });
        let events = TransportEvent::from_analysis_response(&response);
        assert_eq!(events.last(), Some(&TransportEvent::Done));
        let agents: Vec<AgentName> = events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::AgentComplete { agent, .. } => Some(*agent),
                _ => None,
            })
            .collect();
        assert_eq!(agents.len(), 3);
        assert!(agents.contains(&AgentName::Recommend));
        assert!(!agents.contains(&AgentName::Contributor));
    }

    // ─── ClientEvent Tests ───────────────────────────────────

    #[test]
    fn test_client_event_json_shape() {
        let json = serde_json::to_value(ClientEvent::IndicatorsChanged {
            typing: true,
            streaming: false,
        })
        .unwrap();
        assert_eq!(json["kind"], "indicators_changed");
        assert_eq!(json["typing"], true);
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_error_display() {
        assert_eq!(
            AnalystError::Transport("closed".into()).to_string(),
            "Transport error: closed"
        );
        assert_eq!(
            AnalystError::Validation("Select two repositories".into()).to_string(),
            "Select two repositories"
        );
        assert_eq!(
            AnalystError::Agent { agent: "security".into(), message: "timeout".into() }.to_string(),
            "Agent security failed: timeout"
        );
        assert_eq!(AnalystError::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_error_from_serde() {
        let err: AnalystError = serde_json::from_str::<serde_json::Value>("{bad")
            .unwrap_err()
            .into();
        assert!(matches!(err, AnalystError::Serialization(_)));
    }

    #[test]
    fn test_result_alias() {
        fn ok() -> crate::Result<u8> {
            Ok(1)
        }
        assert_eq!(ok().unwrap(), 1);
    }
}
