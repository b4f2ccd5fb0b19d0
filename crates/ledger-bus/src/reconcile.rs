//! # Identity Reconciliation
//!
//! A reference received over the wire names an object in the sender's
//! object graph. Before a remote message is usable locally every reference
//! is resolved by durable id against the local store, after asking the store
//! to reload the objects the event is known to have changed.

use ledger_types::{Account, ObjectId, ObjectKind, ObjectStore, Stored};
use tracing::{debug, trace, warn};

use crate::events::{
    AccountEvent, BudgetEvent, ChannelEvent, CommodityEvent, ConfigEvent, ReminderEvent,
    TransactionEvent,
};
use crate::message::{Message, RemoteMessage};

/// Resolve a remote message against the local store and mark it remote.
///
/// References the store cannot resolve are dropped.
pub fn reconcile<S: ObjectStore + ?Sized>(store: &S, remote: &RemoteMessage) -> Message {
    refresh(store, remote);

    let mut message = Message::new(remote.event, remote.source);
    for reference in &remote.properties {
        match store.find_by_id(reference.kind, &reference.id) {
            Some(object) => {
                message.set_object(object);
            }
            None => warn!(
                event = %remote.event,
                kind = %reference.kind,
                id = %reference.id,
                "Remote reference not found in local store, dropping"
            ),
        }
    }

    message.mark_remote();
    message
}

/// Objects the event names directly, in the order they should be reloaded.
///
/// The parent of an added or removed account is not included; it is only
/// known once the account itself has been reloaded.
pub fn refresh_targets(remote: &RemoteMessage) -> Vec<(ObjectKind, ObjectId)> {
    let carried = |kind| remote.reference(kind).map(|id| (kind, id));
    let mut targets = Vec::new();

    match remote.event {
        ChannelEvent::Account(
            AccountEvent::Add
            | AccountEvent::Remove
            | AccountEvent::Modify
            | AccountEvent::SecurityAdd
            | AccountEvent::SecurityRemove
            | AccountEvent::VisibilityChange,
        ) => targets.extend(carried(ObjectKind::Account)),
        ChannelEvent::Budget(
            BudgetEvent::Add | BudgetEvent::Update | BudgetEvent::Remove | BudgetEvent::GoalUpdate,
        ) => targets.extend(carried(ObjectKind::Budget)),
        ChannelEvent::Commodity(
            CommodityEvent::CurrencyAdd
            | CommodityEvent::CurrencyModify
            | CommodityEvent::SecurityAdd
            | CommodityEvent::SecurityModify
            | CommodityEvent::SecurityHistoryAdd
            | CommodityEvent::SecurityHistoryRemove,
        ) => targets.extend(carried(ObjectKind::Commodity)),
        ChannelEvent::Commodity(
            CommodityEvent::ExchangeRateAdd | CommodityEvent::ExchangeRateRemove,
        ) => targets.extend(carried(ObjectKind::ExchangeRate)),
        ChannelEvent::Config(ConfigEvent::Modify) => targets.extend(carried(ObjectKind::Config)),
        ChannelEvent::Reminder(ReminderEvent::Add | ReminderEvent::Remove) => {
            targets.extend(carried(ObjectKind::Reminder))
        }
        ChannelEvent::Transaction(TransactionEvent::Add | TransactionEvent::Remove) => {
            targets.extend(carried(ObjectKind::Transaction));
            targets.extend(carried(ObjectKind::Account));
        }
        _ => {}
    }

    targets
}

fn refresh<S: ObjectStore + ?Sized>(store: &S, remote: &RemoteMessage) {
    let with_parent = matches!(
        remote.event,
        ChannelEvent::Account(AccountEvent::Add | AccountEvent::Remove)
    );

    for (kind, id) in refresh_targets(remote) {
        reload(store, kind, &id);
        if with_parent && kind == ObjectKind::Account {
            match parent_of(store, &id) {
                Some(parent) => reload(store, ObjectKind::Account, &parent),
                None => debug!(%id, "Account has no parent to refresh"),
            }
        }
    }
}

fn reload<S: ObjectStore + ?Sized>(store: &S, kind: ObjectKind, id: &ObjectId) {
    trace!(%kind, %id, "Refreshing");
    store.refresh(kind, id);
}

fn parent_of<S: ObjectStore + ?Sized>(store: &S, account: &ObjectId) -> Option<ObjectId> {
    let object = store.find_by_id(ObjectKind::Account, account)?;
    Account::from_stored(&object).and_then(|a| a.parent)
}
