//! Jog link manager over a real WebSocket transport

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use xytable_communication::{
    websocket_url, JogCommand, JogLinkManager, LinkEvent, LinkEventKind, WebSocketTransport,
    DEFAULT_JOG_PATH,
};
use xytable_core::{Axis, Direction};

async fn next_event(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> LinkEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_commands_reach_backend_and_replies_arrive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let (received_tx, mut received_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                received_tx.send(text.to_string()).unwrap();
                ws.send(Message::Text(
                    r#"{"status":"ok","message":"Started jog y 1 at 0.01"}"#.into(),
                ))
                .await
                .unwrap();
            }
        }
    });

    let url = websocket_url(&base, DEFAULT_JOG_PATH).unwrap();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut manager = JogLinkManager::new(
        WebSocketTransport::new(url),
        events_tx,
        Duration::from_secs(2),
    );

    manager.ensure_link(true);
    let opened = next_event(&mut events_rx).await;
    assert_eq!(opened.kind, LinkEventKind::Opened);
    manager.handle_event(opened, true);
    assert!(manager.is_ready());

    assert!(manager.send_jog(&JogCommand::start(Axis::Y, Direction::Positive, 0.01)));
    let sent = timeout(Duration::from_secs(5), received_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        sent,
        r#"{"action":"start","axis":"y","direction":1,"speed":0.01}"#
    );

    let reply = next_event(&mut events_rx).await;
    assert!(matches!(reply.kind, LinkEventKind::Message(_)));
    manager.handle_event(reply, true);
}

#[tokio::test]
async fn test_peer_close_reports_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        ws.close(None).await.ok();
    });

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut manager = JogLinkManager::new(
        WebSocketTransport::new(websocket_url(&base, DEFAULT_JOG_PATH).unwrap()),
        events_tx,
        Duration::from_secs(2),
    );
    manager.ensure_link(true);

    let opened = next_event(&mut events_rx).await;
    manager.handle_event(opened, true);

    loop {
        let event = next_event(&mut events_rx).await;
        let closed = event.kind == LinkEventKind::Closed;
        let outcome = manager.handle_event(event, true);
        if closed {
            assert!(outcome.clear_jog_state);
            assert_eq!(outcome.reopen_after, Some(Duration::from_secs(2)));
            break;
        }
    }
    assert!(!manager.is_open());
}

#[tokio::test]
async fn test_unreachable_backend_reports_error_then_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut manager = JogLinkManager::new(
        WebSocketTransport::new(websocket_url(&base, DEFAULT_JOG_PATH).unwrap()),
        events_tx,
        Duration::from_secs(2),
    );
    manager.ensure_link(true);

    let error = next_event(&mut events_rx).await;
    match &error.kind {
        LinkEventKind::Error(reason) => assert!(reason.starts_with("WebSocket error:")),
        other => panic!("expected an error event, got {:?}", other),
    }
    let closed = next_event(&mut events_rx).await;
    assert_eq!(closed.kind, LinkEventKind::Closed);

    manager.handle_event(error, true);
    let outcome = manager.handle_event(closed, false);
    assert_eq!(outcome.reopen_after, None);
    assert!(!manager.send_jog(&JogCommand::stop(Axis::Y)));
}
