use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use support_chat::client::{CHAT_PATH, HttpChatService};
use support_chat::error::ServiceError;
use support_chat::message::MessageRole;
use support_chat::routes::create_router;
use support_chat::session::{Dispatcher, SubmitOutcome, project};
use support_chat::state::AppState;
use tokio::net::TcpListener;

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn reference_service() -> SocketAddr {
    spawn(create_router().with_state(Arc::new(AppState::new(60)))).await
}

fn dispatcher_for(addr: SocketAddr) -> Dispatcher {
    let service =
        HttpChatService::new(format!("http://{addr}/"), Some(Duration::from_secs(5))).unwrap();
    Dispatcher::new(Arc::new(service))
}

#[tokio::test]
async fn conversation_against_reference_service() {
    let addr = reference_service().await;
    let dispatcher = dispatcher_for(addr);

    dispatcher.load_graph_structure().await.unwrap();
    assert_eq!(dispatcher.snapshot().graph().unwrap().next_node, "");

    assert_eq!(
        dispatcher.submit("How much is a hotel in Rome?", "u-1").await,
        SubmitOutcome::Reconciled
    );
    assert_eq!(
        dispatcher.submit("The app shows an error", "u-1").await,
        SubmitOutcome::Reconciled
    );

    let state = dispatcher.snapshot();
    let roles: Vec<_> = state.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant
        ]
    );
    assert!(!state.is_pending());
    assert_eq!(state.error(), None);

    let view = project(&state);
    let graph = view.graph.unwrap();
    assert!(graph.node("ROUTER").unwrap().active);
    assert!(graph.node("TECHNICAL").unwrap().next);
    let edge = graph.active_edge().unwrap();
    assert_eq!(edge.target, "TECHNICAL");
}

#[tokio::test]
async fn server_error_is_a_protocol_failure() {
    let app = Router::new().route(
        CHAT_PATH,
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"model unavailable"}"#) }),
    );
    let dispatcher = dispatcher_for(spawn(app).await);

    let message = match dispatcher.submit("hello", "u-1").await {
        SubmitOutcome::Failed(ServiceError::Protocol(message)) => message,
        other => panic!("expected protocol failure, got {other:?}"),
    };
    assert!(message.contains("500"));
    assert!(message.contains("model unavailable"));

    let state = dispatcher.snapshot();
    assert!(!state.is_pending());
    assert_eq!(state.messages().len(), 1);
    assert!(state.error().is_some());
}

#[tokio::test]
async fn non_json_body_is_a_protocol_failure() {
    let app = Router::new().route(CHAT_PATH, post(|| async { "<html>gateway</html>" }));
    let dispatcher = dispatcher_for(spawn(app).await).echo_errors_inline(true);

    let outcome = dispatcher.submit("hello", "u-1").await;
    assert!(matches!(outcome, SubmitOutcome::Failed(ServiceError::Protocol(_))));

    let state = dispatcher.snapshot();
    assert!(!state.is_pending());
    assert!(state.error().unwrap().contains("invalid JSON"));
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.messages()[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dispatcher = dispatcher_for(addr);

    let outcome = dispatcher.submit("anyone there?", "u-1").await;
    assert!(matches!(outcome, SubmitOutcome::Failed(ServiceError::Transport(_))));

    let state = dispatcher.snapshot();
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].content, "anyone there?");
    assert!(!state.is_pending());
    assert!(!state.error().unwrap().is_empty());

    // the session stays usable once the service is back
    assert!(project(&state).input.enabled);
}
