//! # Remote Shutdown
//!
//! `<STOP_SERVER>` is relayed like any other frame: every connected engine
//! closes, and a relay runtime watching for it stops.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ledger_bus::{AccountEvent, BusConfig, Message};
    use ledger_types::Engine;
    use relay_runtime::RelayRuntime;
    use tokio::time::{sleep, timeout};

    use crate::fixtures::{start_server, wait_for_connections, Node, DATABASE_PATH, WAIT};

    async fn wait_closed(node: &Node) {
        timeout(WAIT, async {
            while !node.engine.is_closed() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("engine of {} never closed", node.bus.name()));
    }

    #[tokio::test]
    async fn test_shutdown_request_closes_connected_engines() {
        let server = start_server(None).await;
        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, None).await;
        b.attach(&server, None).await;
        wait_for_connections(&server, 2).await;

        let requester = Node::new("admin");
        let port = server.local_addr().port();
        requester
            .bus
            .shut_down_remote_server("127.0.0.1", port, None)
            .await
            .unwrap();

        wait_closed(&a).await;
        wait_closed(&b).await;
        assert!(!requester.engine.is_closed());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_relay_runtime_stops_on_shutdown_request() {
        let config = BusConfig {
            host: "127.0.0.1".to_string(),
            database_path: DATABASE_PATH.to_string(),
            ..BusConfig::default()
        };
        let runtime = RelayRuntime::start_on(&config, 0).await.unwrap();
        let port = runtime.local_addr().port();

        let a = Node::new("a");
        a.bus.attach_remote("127.0.0.1", port, None).await.unwrap();
        wait_for_connections(runtime.server(), 1).await;

        let requester = Node::new("admin");
        requester
            .bus
            .shut_down_remote_server("127.0.0.1", port, None)
            .await
            .unwrap();

        timeout(WAIT, runtime.run_until(std::future::pending()))
            .await
            .unwrap();
        wait_closed(&a).await;
        assert!(!runtime.server().is_running().await);
    }

    #[tokio::test]
    async fn test_server_shutdown_disconnects_bridge() {
        let server = start_server(None).await;
        let a = Node::new("a");
        a.attach(&server, None).await;
        assert!(a.bus.is_remote());

        server.shutdown().await;

        timeout(WAIT, async {
            while a.bus.is_remote() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!a.engine.is_closed());

        a.bus
            .fire_event_and_wait(Message::new(AccountEvent::Add, a.engine.uuid()))
            .await;
        assert_eq!(a.recorder.wait_for(1).await.len(), 1);
        assert!(a.bus.remote_database().is_none());
    }
}
