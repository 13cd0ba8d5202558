use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::{AccountId, Asset, AssetAmount, FundId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The sending half funds and the factory publish on.
pub type EventSender = broadcast::Sender<FundEvent>;

/// Everything observable that happens to a fund.
///
/// Serialized with `#[serde(tag = "type", content = "payload")]`, so a `Sold`
/// event looks like `{ "type": "Sold", "payload": { "fund": "...", ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum FundEvent {
    FundCreated {
        fund: FundId,
        name: String,
        ticker: String,
        creator: AccountId,
        fee_paid: u128,
        timestamp: DateTime<Utc>,
    },
    Bought {
        fund: FundId,
        holder: AccountId,
        deposit: u128,
        deposit_value: u128,
        shares: u128,
        timestamp: DateTime<Utc>,
    },
    /// A buy failed after some legs executed; those legs were unwound.
    BuyRolledBack {
        fund: FundId,
        holder: AccountId,
        deposit: u128,
        refund: Vec<AssetAmount>,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    Sold {
        fund: FundId,
        holder: AccountId,
        shares: u128,
        proceeds: u128,
        timestamp: DateTime<Utc>,
    },
    SellRolledBack {
        fund: FundId,
        holder: AccountId,
        shares: u128,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    ProportionsUpdated {
        fund: FundId,
        by: AccountId,
        proportions: Vec<(Asset, u8)>,
        timestamp: DateTime<Utc>,
    },
    Rebalanced {
        fund: FundId,
        by: AccountId,
        legs_executed: usize,
        legs_failed: usize,
        timestamp: DateTime<Utc>,
    },
    ManagerAdded {
        fund: FundId,
        manager: AccountId,
        timestamp: DateTime<Utc>,
    },
    ManagerRemoved {
        fund: FundId,
        manager: AccountId,
        timestamp: DateTime<Utc>,
    },
}

impl FundEvent {
    /// The fund this event belongs to.
    pub fn fund(&self) -> FundId {
        match self {
            FundEvent::FundCreated { fund, .. }
            | FundEvent::Bought { fund, .. }
            | FundEvent::BuyRolledBack { fund, .. }
            | FundEvent::Sold { fund, .. }
            | FundEvent::SellRolledBack { fund, .. }
            | FundEvent::ProportionsUpdated { fund, .. }
            | FundEvent::Rebalanced { fund, .. }
            | FundEvent::ManagerAdded { fund, .. }
            | FundEvent::ManagerRemoved { fund, .. } => *fund,
        }
    }

    pub fn to_json(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Publishes `event` if a sender is attached. Having no subscribers is not an error.
pub fn publish(sender: Option<&EventSender>, event: FundEvent) {
    if let Some(tx) = sender {
        if tx.send(event).is_err() {
            tracing::trace!("No event subscribers attached.");
        }
    }
}
