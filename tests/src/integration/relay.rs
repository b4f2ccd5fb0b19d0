//! # Relay Flows
//!
//! ```text
//! Node A ──fire──► hub A ──► client A ──► server ──► client B ──► hub B
//!                                           └──────► client C ──► hub C
//! ```

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use ledger_bus::{
        AccountEvent, ChannelEvent, LocalServerListener, Message, SystemEvent, TransactionEvent,
    };
    use ledger_types::{Account, AccountType, Engine};

    use crate::fixtures::{start_server, wait_for_connections, Node};

    const SETTLE: Duration = Duration::from_millis(300);

    struct FrameCounter(AtomicUsize);

    impl LocalServerListener for FrameCounter {
        fn message_posted(&self, _frame: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_three_clients() {
        let server = start_server(None).await;
        let nodes = [Node::new("a"), Node::new("b"), Node::new("c")];
        for node in &nodes {
            node.attach(&server, None).await;
        }
        wait_for_connections(&server, 3).await;

        let account = Account::new("Checking", AccountType::Bank);
        for node in &nodes {
            node.engine.store().insert(account.clone());
        }

        let sender = &nodes[0];
        let local = sender.engine.store().get::<Account>(&account.uuid).unwrap();
        sender
            .bus
            .fire_event_and_wait(
                Message::new(AccountEvent::Modify, sender.engine.uuid()).with_object(local),
            )
            .await;

        for node in &nodes[1..] {
            let received = node.recorder.wait_for(1).await;
            assert_eq!(received[0].event(), ChannelEvent::from(AccountEvent::Modify));
            assert_eq!(received[0].source(), sender.engine.uuid());
            assert!(received[0].is_remote());
        }

        // Only the local delivery; the relayed copy is discarded by source.
        sender.recorder.assert_settles_at(1, SETTLE).await;
        assert!(!sender.recorder.messages()[0].is_remote());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_system_channel_stays_local() {
        let server = start_server(None).await;
        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, None).await;
        b.attach(&server, None).await;
        wait_for_connections(&server, 2).await;

        a.bus
            .fire_event_and_wait(Message::new(SystemEvent::FileLoadSuccess, a.engine.uuid()))
            .await;

        assert_eq!(a.recorder.wait_for(1).await.len(), 1);
        b.recorder.assert_settles_at(0, SETTLE).await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_messages_are_not_reforwarded() {
        let server = start_server(None).await;
        let counter = Arc::new(FrameCounter(AtomicUsize::new(0)));
        server.add_local_listener(counter.clone()).await;

        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, None).await;
        b.attach(&server, None).await;
        wait_for_connections(&server, 2).await;

        a.bus
            .fire_event_and_wait(Message::new(TransactionEvent::Add, a.engine.uuid()))
            .await;
        b.recorder.wait_for(1).await;

        tokio::time::sleep(SETTLE).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_order_matches_publish_order() {
        let server = start_server(None).await;
        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, None).await;
        b.attach(&server, None).await;
        wait_for_connections(&server, 2).await;

        let events = [
            AccountEvent::Add,
            AccountEvent::Modify,
            AccountEvent::VisibilityChange,
            AccountEvent::Remove,
        ];
        for event in events {
            a.bus.fire_event(Message::new(event, a.engine.uuid()));
        }

        b.recorder.wait_for(events.len()).await;
        assert_eq!(
            b.recorder.events(),
            vec![
                "ACCOUNT_ADD",
                "ACCOUNT_MODIFY",
                "ACCOUNT_VISIBILITY_CHANGE",
                "ACCOUNT_REMOVE"
            ]
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_handshake_visible_through_hub() {
        let server = start_server(None).await;
        let a = Node::new("a");
        a.attach(&server, None).await;

        let database = a.bus.remote_database().unwrap();
        assert!(database.is_complete());
        assert_eq!(database.path.as_deref(), Some(crate::fixtures::DATABASE_PATH));
        assert!(a.bus.is_remote());

        a.bus.detach_remote().await;
        assert!(!a.bus.is_remote());
        wait_for_connections(&server, 0).await;
        server.shutdown().await;
    }
}
