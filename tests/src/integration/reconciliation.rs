//! # Reconciliation Across Stores
//!
//! Two engines hold separate in-memory copies of the same objects. A remote
//! message must arrive carrying the receiver's own instances, after the
//! receiver has reloaded what the event changed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ledger_bus::{AccountEvent, BudgetEvent, Message, TagEvent, TransactionEvent};
    use ledger_types::{
        Account, AccountType, Budget, Engine, ObjectKind, Stored, Tag, Transaction,
    };

    use crate::fixtures::{start_server, wait_for_connections, Node};

    async fn connected_pair() -> (ledger_bus::MessageBusServer, Node, Node) {
        let server = start_server(None).await;
        let a = Node::new("a");
        let b = Node::new("b");
        a.attach(&server, None).await;
        b.attach(&server, None).await;
        wait_for_connections(&server, 2).await;
        (server, a, b)
    }

    #[tokio::test]
    async fn test_receiver_gets_its_own_instances() {
        let (server, a, b) = connected_pair().await;

        let parent = Account::new("Assets", AccountType::Root);
        let child = Account::new("Savings", AccountType::Bank).with_parent(parent.uuid);
        let theirs = a.engine.store().insert(child.clone());
        a.engine.store().insert(parent.clone());
        let ours = b.engine.store().insert(child.clone());
        b.engine.store().insert(parent.clone());

        a.bus
            .fire_event_and_wait(Message::new(AccountEvent::Add, a.engine.uuid()).with_object(theirs.clone()))
            .await;

        let received = b.recorder.wait_for(1).await;
        let resolved = received[0].get::<Account>().unwrap();
        assert!(Arc::ptr_eq(resolved, &ours));
        assert!(!Arc::ptr_eq(resolved, &theirs));

        assert_eq!(
            b.engine.store().refreshed(),
            vec![
                (ObjectKind::Account, child.uuid),
                (ObjectKind::Account, parent.uuid)
            ]
        );
        assert!(a.engine.store().refreshed().is_empty());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_transaction_refreshes_transaction_then_account() {
        let (server, a, b) = connected_pair().await;

        let account = Account::new("Cash", AccountType::Bank);
        let transaction = Transaction::new("Groceries", -4_250, vec![account.uuid]);
        for node in [&a, &b] {
            node.engine.store().insert(account.clone());
            node.engine.store().insert(transaction.clone());
        }

        let message = Message::new(TransactionEvent::Add, a.engine.uuid())
            .with_object(a.engine.store().get::<Account>(&account.uuid).unwrap())
            .with_object(a.engine.store().get::<Transaction>(&transaction.uuid).unwrap());
        a.bus.fire_event_and_wait(message).await;

        let received = b.recorder.wait_for(1).await;
        assert!(received[0].get::<Transaction>().is_some());
        assert!(received[0].get::<Account>().is_some());
        assert_eq!(
            b.engine.store().refreshed(),
            vec![
                (ObjectKind::Transaction, transaction.uuid),
                (ObjectKind::Account, account.uuid)
            ]
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_reference_dropped_message_still_delivered() {
        let (server, a, b) = connected_pair().await;

        let tag = a.engine.store().insert(Tag::new("travel"));
        a.bus
            .fire_event_and_wait(Message::new(TagEvent::Add, a.engine.uuid()).with_object(tag))
            .await;

        let received = b.recorder.wait_for(1).await;
        assert!(received[0].object(Tag::KIND).is_none());
        assert!(received[0].is_remote());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_budget_refreshed_before_resolution() {
        let (server, a, b) = connected_pair().await;

        let budget = Budget::new("2026");
        a.engine.store().insert(budget.clone());
        b.engine.store().insert(budget.clone());

        a.bus
            .fire_event_and_wait(
                Message::new(BudgetEvent::GoalUpdate, a.engine.uuid())
                    .with_object(a.engine.store().get::<Budget>(&budget.uuid).unwrap()),
            )
            .await;

        let received = b.recorder.wait_for(1).await;
        assert_eq!(received[0].get::<Budget>().unwrap().uuid, budget.uuid);
        assert_eq!(
            b.engine.store().refreshed(),
            vec![(ObjectKind::Budget, budget.uuid)]
        );
        server.shutdown().await;
    }
}
