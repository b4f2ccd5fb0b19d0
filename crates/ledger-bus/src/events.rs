//! # Channels and Events
//!
//! A [`MessageChannel`] is the topic listeners subscribe to. Every event verb
//! belongs to exactly one channel: [`ChannelEvent`] is a tagged union with one
//! variant per channel, so the channel of a message is derived from its event
//! and can never disagree with it.
//!
//! On the wire an event is its flat name (`ACCOUNT_ADD`, `TRANSACTION_REMOVE`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Topic-level partition of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageChannel {
    Account,
    Budget,
    Commodity,
    Config,
    Reminder,
    /// Process-internal notifications. Never relayed to the wire.
    System,
    Tag,
    Transaction,
}

impl MessageChannel {
    /// Every channel.
    pub const ALL: [MessageChannel; 8] = [
        MessageChannel::Account,
        MessageChannel::Budget,
        MessageChannel::Commodity,
        MessageChannel::Config,
        MessageChannel::Reminder,
        MessageChannel::System,
        MessageChannel::Tag,
        MessageChannel::Transaction,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageChannel::Account => "ACCOUNT",
            MessageChannel::Budget => "BUDGET",
            MessageChannel::Commodity => "COMMODITY",
            MessageChannel::Config => "CONFIG",
            MessageChannel::Reminder => "REMINDER",
            MessageChannel::System => "SYSTEM",
            MessageChannel::Tag => "TAG",
            MessageChannel::Transaction => "TRANSACTION",
        }
    }

    /// Whether messages on this channel may cross the wire.
    pub fn is_relayable(&self) -> bool {
        !matches!(self, MessageChannel::System)
    }
}

impl fmt::Display for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an event name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown channel event: {0}")]
pub struct UnknownEvent(pub String);

macro_rules! channel_events {
    (
        $(#[$meta:meta])*
        $name:ident => $channel:ident {
            $( $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            /// Every verb of this channel.
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// Wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire, )+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $wire => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for ChannelEvent {
            fn from(event: $name) -> Self {
                ChannelEvent::$channel(event)
            }
        }
    };
}

channel_events! {
    /// Account tree changes.
    AccountEvent => Account {
        Add => "ACCOUNT_ADD",
        AddFailed => "ACCOUNT_ADD_FAILED",
        Modify => "ACCOUNT_MODIFY",
        ModifyFailed => "ACCOUNT_MODIFY_FAILED",
        Remove => "ACCOUNT_REMOVE",
        RemoveFailed => "ACCOUNT_REMOVE_FAILED",
        SecurityAdd => "ACCOUNT_SECURITY_ADD",
        SecurityAddFailed => "ACCOUNT_SECURITY_ADD_FAILED",
        SecurityRemove => "ACCOUNT_SECURITY_REMOVE",
        SecurityRemoveFailed => "ACCOUNT_SECURITY_REMOVE_FAILED",
        VisibilityChange => "ACCOUNT_VISIBILITY_CHANGE",
        VisibilityChangeFailed => "ACCOUNT_VISIBILITY_CHANGE_FAILED",
    }
}

channel_events! {
    /// Budget changes.
    BudgetEvent => Budget {
        Add => "BUDGET_ADD",
        AddFailed => "BUDGET_ADD_FAILED",
        Update => "BUDGET_UPDATE",
        UpdateFailed => "BUDGET_UPDATE_FAILED",
        Remove => "BUDGET_REMOVE",
        RemoveFailed => "BUDGET_REMOVE_FAILED",
        GoalUpdate => "BUDGET_GOAL_UPDATE",
        GoalUpdateFailed => "BUDGET_GOAL_UPDATE_FAILED",
    }
}

channel_events! {
    /// Currency, security and exchange rate changes.
    CommodityEvent => Commodity {
        CurrencyAdd => "CURRENCY_ADD",
        CurrencyAddFailed => "CURRENCY_ADD_FAILED",
        CurrencyModify => "CURRENCY_MODIFY",
        CurrencyModifyFailed => "CURRENCY_MODIFY_FAILED",
        CurrencyRemove => "CURRENCY_REMOVE",
        CurrencyRemoveFailed => "CURRENCY_REMOVE_FAILED",
        SecurityAdd => "SECURITY_ADD",
        SecurityAddFailed => "SECURITY_ADD_FAILED",
        SecurityModify => "SECURITY_MODIFY",
        SecurityModifyFailed => "SECURITY_MODIFY_FAILED",
        SecurityRemove => "SECURITY_REMOVE",
        SecurityRemoveFailed => "SECURITY_REMOVE_FAILED",
        SecurityHistoryAdd => "SECURITY_HISTORY_ADD",
        SecurityHistoryAddFailed => "SECURITY_HISTORY_ADD_FAILED",
        SecurityHistoryRemove => "SECURITY_HISTORY_REMOVE",
        SecurityHistoryRemoveFailed => "SECURITY_HISTORY_REMOVE_FAILED",
        ExchangeRateAdd => "EXCHANGE_RATE_ADD",
        ExchangeRateRemove => "EXCHANGE_RATE_REMOVE",
        ExchangeRateRemoveFailed => "EXCHANGE_RATE_REMOVE_FAILED",
    }
}

channel_events! {
    /// Engine configuration changes.
    ConfigEvent => Config {
        Modify => "CONFIG_MODIFY",
        ModifyFailed => "CONFIG_MODIFY_FAILED",
    }
}

channel_events! {
    /// Scheduled reminder changes.
    ReminderEvent => Reminder {
        Add => "REMINDER_ADD",
        AddFailed => "REMINDER_ADD_FAILED",
        Remove => "REMINDER_REMOVE",
        RemoveFailed => "REMINDER_REMOVE_FAILED",
    }
}

channel_events! {
    /// Tag changes.
    TagEvent => Tag {
        Add => "TAG_ADD",
        Modify => "TAG_MODIFY",
        Remove => "TAG_REMOVE",
    }
}

channel_events! {
    /// Transaction changes.
    TransactionEvent => Transaction {
        Add => "TRANSACTION_ADD",
        AddFailed => "TRANSACTION_ADD_FAILED",
        Remove => "TRANSACTION_REMOVE",
        RemoveFailed => "TRANSACTION_REMOVE_FAILED",
    }
}

channel_events! {
    /// File and UI lifecycle notifications.
    SystemEvent => System {
        FileLoadSuccess => "FILE_LOAD_SUCCESS",
        FileNewSuccess => "FILE_NEW_SUCCESS",
        FileClosing => "FILE_CLOSING",
        UiRestarting => "UI_RESTARTING",
        UiRestarted => "UI_RESTARTED",
    }
}

/// An event verb together with the channel it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChannelEvent {
    Account(AccountEvent),
    Budget(BudgetEvent),
    Commodity(CommodityEvent),
    Config(ConfigEvent),
    Reminder(ReminderEvent),
    System(SystemEvent),
    Tag(TagEvent),
    Transaction(TransactionEvent),
}

impl ChannelEvent {
    /// Channel this event is published on.
    pub fn channel(&self) -> MessageChannel {
        match self {
            ChannelEvent::Account(_) => MessageChannel::Account,
            ChannelEvent::Budget(_) => MessageChannel::Budget,
            ChannelEvent::Commodity(_) => MessageChannel::Commodity,
            ChannelEvent::Config(_) => MessageChannel::Config,
            ChannelEvent::Reminder(_) => MessageChannel::Reminder,
            ChannelEvent::System(_) => MessageChannel::System,
            ChannelEvent::Tag(_) => MessageChannel::Tag,
            ChannelEvent::Transaction(_) => MessageChannel::Transaction,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelEvent::Account(e) => e.as_str(),
            ChannelEvent::Budget(e) => e.as_str(),
            ChannelEvent::Commodity(e) => e.as_str(),
            ChannelEvent::Config(e) => e.as_str(),
            ChannelEvent::Reminder(e) => e.as_str(),
            ChannelEvent::System(e) => e.as_str(),
            ChannelEvent::Tag(e) => e.as_str(),
            ChannelEvent::Transaction(e) => e.as_str(),
        }
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountEvent::from_name(s)
            .map(ChannelEvent::Account)
            .or_else(|| BudgetEvent::from_name(s).map(ChannelEvent::Budget))
            .or_else(|| CommodityEvent::from_name(s).map(ChannelEvent::Commodity))
            .or_else(|| ConfigEvent::from_name(s).map(ChannelEvent::Config))
            .or_else(|| ReminderEvent::from_name(s).map(ChannelEvent::Reminder))
            .or_else(|| SystemEvent::from_name(s).map(ChannelEvent::System))
            .or_else(|| TagEvent::from_name(s).map(ChannelEvent::Tag))
            .or_else(|| TransactionEvent::from_name(s).map(ChannelEvent::Transaction))
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl From<ChannelEvent> for String {
    fn from(event: ChannelEvent) -> Self {
        event.as_str().to_string()
    }
}

impl TryFrom<String> for ChannelEvent {
    type Error = UnknownEvent;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
