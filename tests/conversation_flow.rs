//! End-to-end turns against an in-process stand-in for the chat service.

use std::sync::Arc;
use supportline::config::{Config, UiConfig};
use supportline::events::{AppEvent, MessageRole};
use supportline::ui::conversation::{ConversationManager, ExchangeState};
use supportline::ChatClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Read one HTTP request and return its JSON body
async fn read_request(socket: &mut TcpStream) -> serde_json::Value {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed the connection mid-request");
        request.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&request).into_owned();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = head_end + 4;
            if request.len() >= body_start + content_length {
                return serde_json::from_slice(&request[body_start..body_start + content_length])
                    .unwrap();
            }
        }
    }
}

/// Serve the given replies in order, one connection each, and hand back
/// the request bodies that came in
async fn serve(
    replies: Vec<(&'static str, &'static str)>,
) -> (String, JoinHandle<Vec<serde_json::Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut bodies = Vec::new();
        for (status_line, body) in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            bodies.push(read_request(&mut socket).await);

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
        bodies
    });

    (format!("http://{}", addr), handle)
}

fn manager_for(base_url: &str) -> (ConversationManager, mpsc::UnboundedReceiver<AppEvent>) {
    let config = Config::default().with_base_url(base_url).unwrap();
    let client = ChatClient::new(config).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    (ConversationManager::new(Arc::new(client), &UiConfig::default(), tx), rx)
}

async fn settle(manager: &mut ConversationManager, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
    while let Some(event) = rx.recv().await {
        let finished = matches!(event, AppEvent::ExchangeFinished(_));
        manager.handle_app_event(event);
        if finished {
            return;
        }
    }
    panic!("event channel closed before the exchange finished");
}

#[tokio::test]
async fn two_turns_share_one_conversation() {
    let (base_url, server) = serve(vec![
        (
            "HTTP/1.1 200 OK",
            r#"{"conversation_id":"c1","message_id":"m1","content":"Hi there","agent":"billing"}"#,
        ),
        (
            "HTTP/1.1 200 OK",
            r#"{"conversation_id":"c1","message_id":"m2","content":"It shipped","agent":"order"}"#,
        ),
    ])
    .await;
    let (mut manager, mut rx) = manager_for(&base_url);

    manager.submit("Hello").unwrap();
    settle(&mut manager, &mut rx).await;
    manager.submit("Status?").unwrap();
    settle(&mut manager, &mut rx).await;

    let bodies = server.await.unwrap();
    assert_eq!(bodies[0], serde_json::json!({"message": "Hello", "conversation_id": null}));
    assert_eq!(bodies[1], serde_json::json!({"message": "Status?", "conversation_id": "c1"}));

    let log: Vec<_> = manager
        .session()
        .messages()
        .map(|m| (m.role, m.content.clone(), m.agent_type.clone()))
        .collect();
    assert_eq!(
        log,
        [
            (MessageRole::User, "Hello".to_string(), None),
            (MessageRole::Assistant, "Hi there".to_string(), Some("billing".to_string())),
            (MessageRole::User, "Status?".to_string(), None),
            (MessageRole::Assistant, "It shipped".to_string(), Some("order".to_string())),
        ]
    );
    assert_eq!(manager.session().conversation_id().map(|c| c.as_str()), Some("c1"));
}

#[tokio::test]
async fn server_error_leaves_only_the_user_turn() {
    let (base_url, server) = serve(vec![(
        "HTTP/1.1 500 Internal Server Error",
        r#"{"success":false,"error":"Failed to process message: model offline"}"#,
    )])
    .await;
    let (mut manager, mut rx) = manager_for(&base_url);

    manager.submit("Hello").unwrap();
    settle(&mut manager, &mut rx).await;
    server.await.unwrap();

    assert_eq!(manager.session().len(), 1);
    assert_eq!(manager.state(), ExchangeState::Idle);
    assert!(manager.history().notice().unwrap().text.contains("model offline"));
}
