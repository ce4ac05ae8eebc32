//! PotShare: a two-person expense-splitting ledger served over HTTP.
//!
//! Users register and log in for a signed bearer token, record expenses
//! split 50/50 with another user, and read back a balance that is always
//! derived from the current set of expenses.

pub mod api;
pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod expenses;
pub mod money;
pub mod schemas;
pub mod store;

use std::sync::Arc;

use tracing::warn;

use crate::config::{Config, StoreBackend};
use crate::error::StoreError;
use crate::store::{InMemoryLedgerStore, LedgerStore, MongoLedgerStore};

/// Opens the ledger store selected by `config`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn LedgerStore>, StoreError> {
    match &config.store {
        StoreBackend::Mongo { uri, database } => {
            Ok(Arc::new(MongoLedgerStore::connect(uri, database).await?))
        }
        StoreBackend::Memory => {
            warn!("using the in-memory ledger; data is lost on shutdown");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}
