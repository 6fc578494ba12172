//! Integration tests for session management and send recovery
//!
//! Tests for the retry orchestrator's invalid-session handling and for the
//! session store under concurrent use.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use yuanbao_gateway::GatewayError;
use yuanbao_gateway::backend::VendorEvent;
use yuanbao_gateway::orchestrator::RetryOrchestrator;
use yuanbao_gateway::session::SessionStore;
use yuanbao_gateway::testing::StubBackend;

// =============================================================================
// Test Fixtures
// =============================================================================

fn setup(stub: StubBackend, max_retries: u32) -> (Arc<StubBackend>, Arc<SessionStore>, RetryOrchestrator) {
    let stub = Arc::new(stub);
    let store = Arc::new(SessionStore::new(stub.clone()));
    let orchestrator = RetryOrchestrator::new(store.clone(), stub.clone(), max_retries);
    (stub, store, orchestrator)
}

// =============================================================================
// Retry Tests
// =============================================================================

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_session_is_recreated_once() {
        let (stub, store, orchestrator) =
            setup(StubBackend::new().failing_first_sends(1, "conversation not found"), 1);

        let events: Vec<VendorEvent> = orchestrator
            .send("deepseek_v3", "hello")
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events,
            vec![VendorEvent::Answer("ok".to_string()), VendorEvent::End]
        );
        assert_eq!(stub.send_attempts(), 2);
        assert_eq!(stub.sessions_created(), 2);

        let used = stub.conversations();
        assert_ne!(used[0], used[1]);
        assert_eq!(
            store.current("deepseek_v3").await.unwrap().conversation_id,
            used[1]
        );
    }

    #[tokio::test]
    async fn test_retries_exhausted_returns_failure() {
        let (stub, _store, orchestrator) =
            setup(StubBackend::new().always_failing("Backend returned 404 Not Found: not found"), 1);

        let err = orchestrator
            .send("deepseek_v3", "hello")
            .await
            .err()
            .expect("expected failure");

        assert!(matches!(err, GatewayError::Backend(_)));
        assert_eq!(err.to_string(), "Backend returned 404 Not Found: not found");
        assert_eq!(stub.send_attempts(), 2);
    }

    #[tokio::test]
    async fn test_more_retries_allow_more_attempts() {
        let (stub, _store, orchestrator) =
            setup(StubBackend::new().failing_first_sends(2, "会话已删除"), 2);

        assert!(orchestrator.send("deepseek_r1", "hello").await.is_ok());
        assert_eq!(stub.send_attempts(), 3);
        assert_eq!(stub.sessions_created(), 3);
    }

    #[tokio::test]
    async fn test_prompt_is_forwarded_unchanged() {
        let (stub, _store, orchestrator) = setup(StubBackend::new(), 1);

        orchestrator.send("deepseek_v3", "User: 你好").await.unwrap();
        assert_eq!(stub.prompts(), vec!["User: 你好".to_string()]);
    }

    #[tokio::test]
    async fn test_session_is_reused_across_requests() {
        let (stub, _store, orchestrator) = setup(StubBackend::new(), 1);

        orchestrator.send("deepseek_v3", "one").await.unwrap();
        orchestrator.send("deepseek_v3", "two").await.unwrap();

        assert_eq!(stub.sessions_created(), 1);
        let used = stub.conversations();
        assert_eq!(used[0], used[1]);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_get_or_create_creates_one_session() {
        let stub = Arc::new(StubBackend::new().with_session_delay(Duration::from_millis(20)));
        let store = Arc::new(SessionStore::new(stub.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_or_create("deepseek_v3", false).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(stub.sessions_created(), 1);
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    #[tokio::test]
    async fn test_concurrent_renew_of_same_stale_id_creates_one_replacement() {
        let stub = Arc::new(StubBackend::new().with_session_delay(Duration::from_millis(10)));
        let store = Arc::new(SessionStore::new(stub.clone()));
        let stale = store.get_or_create("deepseek_r1", false).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let stale = stale.clone();
                tokio::spawn(async move { store.renew("deepseek_r1", &stale).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(stub.sessions_created(), 2);
        assert!(ids.iter().all(|id| id == &ids[0] && id != &stale));
    }

    #[tokio::test]
    async fn test_models_do_not_block_each_other() {
        let stub = Arc::new(StubBackend::new());
        let store = Arc::new(SessionStore::new(stub.clone()));

        let (v3, r1) = tokio::join!(
            store.get_or_create("deepseek_v3", false),
            store.get_or_create("deepseek_r1", false)
        );

        assert_ne!(v3.unwrap(), r1.unwrap());
        assert_eq!(store.len().await, 2);
    }
}
