//! Integration tests for the WebSocket transport over real sockets.

use std::time::Duration;

use questboard_transport::{
    Connection, Inbound, PendingConnection, Transport, TransportError,
    WebSocketConnection, WebSocketTransport, connect,
};
use tokio::net::TcpStream;

async fn bind_local() -> (WebSocketTransport, String) {
    let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    (transport, format!("ws://{addr}"))
}

async fn upgrade_next(
    transport: &mut WebSocketTransport,
) -> Result<WebSocketConnection, TransportError> {
    transport.accept().await?.upgrade().await
}

#[tokio::test]
async fn test_send_and_recv_both_directions() {
    let (mut transport, base) = bind_local().await;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/ws")).await.unwrap();
    let server_conn = server.await.unwrap().unwrap();

    client.send(&[1, 2, 3]).await.unwrap();
    assert_eq!(
        server_conn.recv().await.unwrap(),
        Some(Inbound::Data(vec![1, 2, 3]))
    );

    server_conn.send(&[9]).await.unwrap();
    assert_eq!(client.recv().await.unwrap(), Some(Inbound::Data(vec![9])));
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let (mut transport, base) = bind_local().await;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/ws")).await.unwrap();
    let server_conn = server.await.unwrap().unwrap();

    // The client must be reading for tungstenite to flush its pong.
    let reader = tokio::spawn(async move {
        while let Ok(Some(_)) = client.recv().await {}
    });

    server_conn.ping().await.unwrap();
    let inbound = tokio::time::timeout(Duration::from_secs(5), server_conn.recv())
        .await
        .expect("pong within timeout")
        .unwrap();

    assert_eq!(inbound, Some(Inbound::Pong));
    reader.abort();
}

#[tokio::test]
async fn test_send_does_not_wait_for_pending_recv() {
    let (mut transport, base) = bind_local().await;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = std::sync::Arc::new(connect(&format!("{base}/ws")).await.unwrap());
    let server_conn = server.await.unwrap().unwrap();

    let parked = std::sync::Arc::clone(&client);
    let reader = tokio::spawn(async move { parked.recv().await });

    tokio::time::timeout(Duration::from_secs(5), client.send(&[7]))
        .await
        .expect("send is not blocked by recv")
        .unwrap();
    assert_eq!(
        server_conn.recv().await.unwrap(),
        Some(Inbound::Data(vec![7]))
    );
    reader.abort();
}

#[tokio::test]
async fn test_close_ends_peer_recv() {
    let (mut transport, base) = bind_local().await;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/ws")).await.unwrap();
    let server_conn = server.await.unwrap().unwrap();

    client.close().await.unwrap();

    assert_eq!(server_conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_accept_wrong_path_is_refused() {
    let (mut transport, base) = bind_local().await;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/elsewhere")).await;

    assert!(matches!(client, Err(TransportError::ConnectFailed(_))));
    assert!(matches!(
        server.await.unwrap(),
        Err(TransportError::AcceptFailed(_))
    ));
}

#[tokio::test]
async fn test_custom_path_is_accepted() {
    let transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_path("/rooms");
    let base = format!("ws://{}", transport.local_addr().unwrap());
    let mut transport = transport;
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/rooms")).await;

    assert!(client.is_ok());
    assert!(server.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_accept_after_shutdown_returns_shutdown() {
    let (mut transport, _base) = bind_local().await;

    transport.shutdown().await.unwrap();

    assert!(matches!(
        transport.accept().await,
        Err(TransportError::Shutdown)
    ));
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let (transport, base) = bind_local().await;
    drop(transport);

    assert!(matches!(
        connect(&format!("{base}/ws")).await,
        Err(TransportError::ConnectFailed(_))
    ));
}

#[tokio::test]
async fn test_silent_peer_does_not_block_next_accept() {
    let (mut transport, base) = bind_local().await;
    let addr = transport.local_addr().unwrap();

    // Connects over TCP and never sends an upgrade request.
    let _silent = TcpStream::connect(addr).await.unwrap();
    let stalled = transport.accept().await.unwrap();
    let server = tokio::spawn(async move { upgrade_next(&mut transport).await });

    let client = connect(&format!("{base}/ws")).await.unwrap();
    let server_conn = server.await.unwrap().unwrap();
    client.send(&[7]).await.unwrap();

    assert_eq!(
        server_conn.recv().await.unwrap(),
        Some(Inbound::Data(vec![7]))
    );
    drop(stalled);
}

#[tokio::test]
async fn test_upgrade_of_silent_peer_times_out() {
    let transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_handshake_timeout(Duration::from_millis(100));
    let addr = transport.local_addr().unwrap();
    let mut transport = transport;

    let _silent = TcpStream::connect(addr).await.unwrap();
    let pending = transport.accept().await.unwrap();
    let upgraded = tokio::time::timeout(Duration::from_secs(5), pending.upgrade())
        .await
        .expect("upgrade gives up on its own");

    let Err(TransportError::AcceptFailed(e)) = upgraded else {
        panic!("expected a failed upgrade");
    };
    assert_eq!(e.kind(), std::io::ErrorKind::TimedOut);
}
