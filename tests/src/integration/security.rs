//! # Wire Security and Hardening
//!
//! Encrypted relay, key mismatch, oversize frames and stalled handshakes.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use ledger_bus::{
        AccountEvent, BusError, ClientConfig, ClientError, FrameCodec, Message, TagEvent,
        WireCrypto, MAX_FRAME_LENGTH,
    };
    use ledger_types::Engine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_util::codec::Framed;

    use crate::fixtures::{
        client_config, start_server, wait_for_connections, Node, DATABASE_PATH, WAIT,
    };

    const PASSWORD: &str = "correct horse battery staple";

    #[tokio::test]
    async fn test_encrypted_relay_between_hubs() {
        let server = start_server(Some(PASSWORD)).await;
        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, Some(PASSWORD)).await;
        b.attach(&server, Some(PASSWORD)).await;
        wait_for_connections(&server, 2).await;

        a.bus
            .fire_event_and_wait(Message::new(TagEvent::Modify, a.engine.uuid()))
            .await;

        let received = b.recorder.wait_for(1).await;
        assert_eq!(received[0].event().as_str(), "TAG_MODIFY");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_frames_on_the_wire_are_opaque() {
        let server = start_server(Some(PASSWORD)).await;
        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let mut raw = Framed::new(stream, FrameCodec::new());

        let frame = timeout(WAIT, raw.next()).await.unwrap().unwrap().unwrap();
        assert!(!frame.starts_with('<'));
        assert!(frame.chars().all(|c| c.is_ascii_hexdigit()));

        let crypto = WireCrypto::from_password(Some(PASSWORD));
        assert!(crypto.decode(&frame).starts_with("<PATH>"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_wrong_password_fails_handshake() {
        let server = start_server(Some(PASSWORD)).await;
        let node = Node::new("intruder");

        let result = node
            .bus
            .attach_remote_with(client_config(&server, Some("guess")))
            .await;

        assert!(matches!(
            result,
            Err(BusError::Remote(ClientError::HandshakeAborted))
        ));
        assert!(!node.bus.is_remote());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_plaintext_client_rejected_by_encrypted_server() {
        let server = start_server(Some(PASSWORD)).await;
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_connections(&server, 1).await;

        stream.write_all(b"<STOP_SERVER>\r\n").await.unwrap();
        wait_for_connections(&server, 0).await;
        assert!(server.is_running().await);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversize_frame_closes_connection() {
        let server = start_server(None).await;
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_connections(&server, 1).await;

        let mut oversize = vec![b'x'; MAX_FRAME_LENGTH + 100];
        oversize.extend_from_slice(b"\r\n");
        stream.write_all(&oversize).await.unwrap();

        wait_for_connections(&server, 0).await;
        let mut sink = Vec::new();
        let closed = timeout(WAIT, stream.read_to_end(&mut sink)).await;
        assert!(closed.is_ok(), "connection left open");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let silent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let node = Node::new("waiting");
        let config = ClientConfig::new("127.0.0.1", port)
            .with_handshake_timeout(Duration::from_millis(200));
        let result = timeout(WAIT, node.bus.attach_remote_with(config))
            .await
            .unwrap();

        assert!(matches!(
            result,
            Err(BusError::Remote(ClientError::HandshakeTimeout(_)))
        ));
        assert!(!node.bus.is_remote());
        silent.abort();
    }

    #[tokio::test]
    async fn test_undecryptable_frame_drops_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let tampering = tokio::spawn(async move {
            let crypto = WireCrypto::from_password(Some(PASSWORD));
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::new());
            for text in [format!("<PATH>{DATABASE_PATH}"), "<TYPE>H2_DATABASE".to_string()] {
                framed.send(crypto.encode(&text).unwrap()).await.unwrap();
            }
            framed.send("00ff00ff".to_string()).await.unwrap();

            let mut written = Vec::new();
            while let Some(Ok(frame)) = framed.next().await {
                written.push(frame);
            }
            written
        });

        let node = Node::new("victim");
        node.bus
            .attach_remote("127.0.0.1", port, Some(PASSWORD))
            .await
            .unwrap();

        timeout(WAIT, async {
            while node.bus.is_remote() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        node.bus
            .fire_event_and_wait(Message::new(AccountEvent::Modify, node.engine.uuid()))
            .await;

        assert_eq!(node.recorder.wait_for(1).await.len(), 1);
        assert!(!node.bus.is_remote());
        assert!(node.bus.remote_database().is_none());

        let written = timeout(WAIT, tampering).await.unwrap().unwrap();
        assert!(written.is_empty(), "wrote to an untrusted connection: {written:?}");
        assert!(!node.engine.is_closed());
    }
}
