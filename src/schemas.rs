use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

pub type UserNick = String;
pub type UserId = ObjectId;
pub type ExpenseId = ObjectId;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: UserNick,
    // Lower-cased username, carries the case-insensitive unique index
    pub username_key: String,
    pub email: String,
    pub password_hash: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Current time at the millisecond precision BSON dates keep, so a record
/// reads back exactly as it was created.
pub fn stored_now() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

impl User {
    pub fn username_key(username: &str) -> String {
        username.to_lowercase()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: ExpenseId,
    pub description: String,
    pub amount: Money,
    pub payer_id: UserId,
    pub payer_username: UserNick,
    pub split_with_id: UserId,
    pub split_with_username: UserNick,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
}

impl Expense {
    pub fn involves(&self, user: &UserId) -> bool {
        self.payer_id == *user || self.split_with_id == *user
    }
}
