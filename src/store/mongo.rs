use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{bson::doc, Client, Collection, IndexModel};
use tracing::info;

use super::{LedgerStore, StoreResult};
use crate::error::StoreError;
use crate::schemas::{Expense, ExpenseId, User, UserId};

const USERS: &str = "Users";
const EXPENSES: &str = "Expenses";
const DUPLICATE_KEY: i32 = 11000;
const EMAIL_INDEX: &str = "email_unique";
const USERNAME_INDEX: &str = "username_key_unique";

#[derive(Clone)]
pub struct MongoLedgerStore {
    users: Collection<User>,
    expenses: Collection<Expense>,
}

impl MongoLedgerStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self::new(&client, database);
        store.ensure_indexes().await?;
        info!(database, "connected to MongoDB");
        Ok(store)
    }

    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        Self {
            users: db.collection(USERS),
            expenses: db.collection(EXPENSES),
        }
    }

    /// Unique indexes back the registration conflict checks, so they must
    /// exist before the first insert.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = |name: &str| {
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build()
        };
        self.users
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "username_key": 1 })
                        .options(unique(USERNAME_INDEX))
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "email": 1 })
                        .options(unique(EMAIL_INDEX))
                        .build(),
                ],
                None,
            )
            .await?;
        self.expenses
            .create_indexes(
                vec![
                    IndexModel::builder()
                        .keys(doc! { "payer_id": 1, "date": -1 })
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "split_with_id": 1, "date": -1 })
                        .build(),
                ],
                None,
            )
            .await?;
        Ok(())
    }
}

/// Maps a duplicate-key write error to the user field whose unique index
/// rejected it.
fn duplicate_key_field(err: &mongodb::error::Error) -> Option<&'static str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            conflicting_field(write_error.code, &write_error.message)
        }
        _ => None,
    }
}

// The server names the violated index in the message, e.g.
// `E11000 duplicate key error collection: PotShare.Users index: email_unique ...`
fn conflicting_field(code: i32, message: &str) -> Option<&'static str> {
    if code != DUPLICATE_KEY {
        None
    } else if message.contains(EMAIL_INDEX) {
        Some("email")
    } else {
        Some("username")
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        match self.users.insert_one(&user, None).await {
            Ok(_) => Ok(()),
            Err(err) => match duplicate_key_field(&err) {
                Some(field) => Err(StoreError::Conflict { field }),
                None => Err(err.into()),
            },
        }
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": *id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let key = User::username_key(username);
        Ok(self
            .users
            .find_one(doc! { "username_key": key }, None)
            .await?)
    }

    async fn insert_expense(&self, expense: Expense) -> StoreResult<()> {
        self.expenses.insert_one(&expense, None).await?;
        Ok(())
    }

    async fn find_expense(&self, id: &ExpenseId) -> StoreResult<Option<Expense>> {
        Ok(self.expenses.find_one(doc! { "_id": *id }, None).await?)
    }

    async fn list_expenses_involving(&self, user: &UserId) -> StoreResult<Vec<Expense>> {
        let options = FindOptions::builder()
            .sort(doc! { "date": -1, "_id": -1 })
            .build();
        let cursor = self
            .expenses
            .find(
                doc! { "$or": [ { "payer_id": *user }, { "split_with_id": *user } ] },
                options,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_expense_paid_by(&self, id: &ExpenseId, payer: &UserId) -> StoreResult<bool> {
        let result = self
            .expenses
            .delete_one(doc! { "_id": *id, "payer_id": *payer }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        11000,
        "E11000 duplicate key error collection: PotShare.Users index: email_unique",
        Some("email")
    )]
    #[case(
        11000,
        "E11000 duplicate key error collection: PotShare.Users index: username_key_unique",
        Some("username")
    )]
    #[case(121, "Document failed validation", None)]
    #[case(2, "index: email_unique", None)]
    fn duplicate_keys_name_the_taken_field(
        #[case] code: i32,
        #[case] message: &str,
        #[case] expected: Option<&'static str>,
    ) {
        assert_eq!(conflicting_field(code, message), expected);
    }
}
