//! Integration tests for the HTTP backend client
//!
//! A wiremock server plays the Yuanbao backend: session creation, streamed
//! chat replies, and the failures the retry path has to recognise.

use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yuanbao_gateway::GatewayError;
use yuanbao_gateway::backend::{
    BackendClient, HttpBackendClient, VendorEvent, is_session_invalid, vendor_events,
};
use yuanbao_gateway::config::{BackendConfig, BackendHeaders};
use yuanbao_gateway::orchestrator::RetryOrchestrator;
use yuanbao_gateway::session::SessionStore;
use yuanbao_gateway::testing::{text_line, think_line, wire_response};

// =============================================================================
// Test Fixtures
// =============================================================================

fn test_config(base_url: String) -> BackendConfig {
    BackendConfig {
        base_url,
        request_timeout_secs: 5,
        read_timeout_secs: 5,
        ..Default::default()
    }
}

fn test_headers() -> BackendHeaders {
    BackendHeaders::from_lines("cookie: hy_user=abc; hy_token=xyz\nx-agentid: naQivTmsDa").unwrap()
}

fn client_for(server: &MockServer) -> HttpBackendClient {
    HttpBackendClient::new(&test_config(server.uri()), Some(test_headers())).unwrap()
}

fn streamed_body(lines: &[String]) -> String {
    let mut body = wire_response(lines).join("\n");
    body.push('\n');
    body
}

async fn mount_session_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/user/agent/conversation/v1/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"convs": []})))
        .mount(server)
        .await;
}

// =============================================================================
// Session Creation Tests
// =============================================================================

mod session_creation_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_session_posts_generated_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/user/agent/conversation/v1/detail"))
            .and(header("cookie", "hy_user=abc; hy_token=xyz"))
            .and(body_partial_json(json!({"limit": 30, "offset": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"convs": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = client.create_session("deep_seek_v3").await.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["conversationId"], id);
    }

    #[tokio::test]
    async fn test_create_session_rejected_with_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/user/agent/conversation/v1/detail"))
            .respond_with(ResponseTemplate::new(401).set_body_string("login required"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_session("deep_seek")
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Backend(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("login required"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_error() {
        let client = HttpBackendClient::new(
            &test_config("http://127.0.0.1:1".to_string()),
            Some(test_headers()),
        )
        .unwrap();

        let err = client.create_session("deep_seek").await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend(_)));
    }
}

// =============================================================================
// Chat Send Tests
// =============================================================================

mod chat_send_tests {
    use super::*;

    #[tokio::test]
    async fn test_send_chat_streams_decoded_events() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat/conv-1"))
            .and(header("content-type", "text/plain;charset=UTF-8"))
            .and(header("x-agentid", "naQivTmsDa"))
            .and(body_partial_json(json!({
                "chatModelId": "deep_seek",
                "prompt": "你好",
                "displayPrompt": "你好",
                "model": "gpt_175B_0404",
                "plugin": "Adaptive",
                "version": "v2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(streamed_body(&[
                think_line("嗯"),
                think_line("。"),
                text_line("你好！"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let lines = client_for(&server)
            .send_chat("deep_seek", "conv-1", "你好")
            .await
            .unwrap();
        let events: Vec<VendorEvent> = vendor_events(lines).collect().await;

        assert_eq!(
            events,
            vec![
                VendorEvent::Reasoning("嗯".to_string()),
                VendorEvent::Reasoning("。".to_string()),
                VendorEvent::Answer("你好！".to_string()),
                VendorEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_conversation_is_classified_invalid() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat("deep_seek", "gone", "hi")
            .await
            .err()
            .expect("expected failure");

        match err {
            GatewayError::Backend(message) => {
                assert!(message.starts_with("Backend returned 404"));
                assert!(is_session_invalid(&message));
            }
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_not_classified_invalid() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat/conv-1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat("deep_seek", "conv-1", "hi")
            .await
            .err()
            .expect("expected failure");

        assert!(!is_session_invalid(&err.to_string()));
    }

    #[tokio::test]
    async fn test_missing_headers_fail_before_any_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = HttpBackendClient::new(&test_config(server.uri()), None).unwrap();
        let err = client
            .send_chat("deep_seek", "conv-1", "hi")
            .await
            .err()
            .expect("expected failure");
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat/conv-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(streamed_body(&[]))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = BackendConfig {
            request_timeout_secs: 1,
            ..test_config(server.uri())
        };
        let client = HttpBackendClient::new(&config, Some(test_headers())).unwrap();

        let err = client
            .send_chat("deep_seek", "conv-1", "hi")
            .await
            .err()
            .expect("expected failure");
        assert_eq!(err.to_string(), "Request timed out after 1s");
    }
}

// =============================================================================
// Recovery Tests
// =============================================================================

mod recovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_dead_conversation_is_replaced_transparently() {
        let server = MockServer::start().await;
        mount_session_endpoint(&server).await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/api/chat/[0-9a-f-]+$"))
            .respond_with(ResponseTemplate::new(404).set_body_string("conversation not found"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path_regex(r"^/api/chat/[0-9a-f-]+$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(streamed_body(&[text_line("back")])),
            )
            .mount(&server)
            .await;

        let backend: Arc<dyn BackendClient> = Arc::new(client_for(&server));
        let store = Arc::new(SessionStore::new(backend.clone()));
        let orchestrator = RetryOrchestrator::new(store, backend, 1);

        let events: Vec<VendorEvent> = orchestrator
            .send("deepseek_v3", "hello")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![VendorEvent::Answer("back".to_string()), VendorEvent::End]
        );

        let requests = server.received_requests().await.unwrap();
        let chat_paths: Vec<String> = requests
            .iter()
            .filter(|r| r.url.path().starts_with("/api/chat/"))
            .map(|r| r.url.path().to_string())
            .collect();
        let sessions = requests.len() - chat_paths.len();

        assert_eq!(chat_paths.len(), 2);
        assert_ne!(chat_paths[0], chat_paths[1]);
        assert_eq!(sessions, 2);
    }
}
