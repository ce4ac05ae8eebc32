use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{sort_newest_first, LedgerStore, StoreResult};
use crate::error::StoreError;
use crate::schemas::{Expense, ExpenseId, User, UserId};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    expenses: Vec<Expense>,
}

/// Ledger kept in process memory. Used by the tests and by
/// `POTSHARE_STORE=memory` for local runs without MongoDB.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    tables: Mutex<Tables>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.username_key == user.username_key) {
            return Err(StoreError::Conflict { field: "username" });
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict { field: "email" });
        }
        tables.users.push(user);
        Ok(())
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == *id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let key = User::username_key(username);
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.username_key == key).cloned())
    }

    async fn insert_expense(&self, expense: Expense) -> StoreResult<()> {
        self.tables.lock().await.expenses.push(expense);
        Ok(())
    }

    async fn find_expense(&self, id: &ExpenseId) -> StoreResult<Option<Expense>> {
        let tables = self.tables.lock().await;
        Ok(tables.expenses.iter().find(|e| e.id == *id).cloned())
    }

    async fn list_expenses_involving(&self, user: &UserId) -> StoreResult<Vec<Expense>> {
        let tables = self.tables.lock().await;
        let mut expenses: Vec<Expense> = tables
            .expenses
            .iter()
            .filter(|e| e.involves(user))
            .cloned()
            .collect();
        sort_newest_first(&mut expenses);
        Ok(expenses)
    }

    async fn delete_expense_paid_by(&self, id: &ExpenseId, payer: &UserId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.expenses.len();
        tables
            .expenses
            .retain(|e| !(e.id == *id && e.payer_id == *payer));
        Ok(tables.expenses.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use bson::oid::ObjectId;
    use chrono::{Duration, Utc};
    use rstest::rstest;

    fn user(username: &str, email: &str) -> User {
        User {
            id: ObjectId::new(),
            username: username.to_string(),
            username_key: User::username_key(username),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    fn expense(payer: &User, split_with: &User, minutes_ago: i64) -> Expense {
        Expense {
            id: ObjectId::new(),
            description: format!("{minutes_ago} minutes ago"),
            amount: Money::from_minor(1000),
            payer_id: payer.id,
            payer_username: payer.username.clone(),
            split_with_id: split_with.id,
            split_with_username: split_with.username.clone(),
            date: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[rstest]
    #[case("Alice", "other@example.com", "username")]
    #[case("bob", "alice@example.com", "email")]
    #[tokio::test]
    async fn rejects_duplicate_unique_fields(
        #[case] username: &str,
        #[case] email: &str,
        #[case] field: &'static str,
    ) {
        let store = InMemoryLedgerStore::new();
        store.insert_user(user("alice", "alice@example.com")).await.unwrap();

        let err = store.insert_user(user(username, email)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: f } if f == field));
    }

    #[tokio::test]
    async fn username_lookup_ignores_case() {
        let store = InMemoryLedgerStore::new();
        let alice = user("Alice", "alice@example.com");
        store.insert_user(alice.clone()).await.unwrap();

        let found = store.find_user_by_username("aLiCe").await.unwrap();
        assert_eq!(found, Some(alice));
    }

    #[tokio::test]
    async fn lists_only_involved_expenses_newest_first() {
        let store = InMemoryLedgerStore::new();
        let (a, b, c) = (
            user("a", "a@example.com"),
            user("b", "b@example.com"),
            user("c", "c@example.com"),
        );
        let old = expense(&a, &b, 30);
        let new = expense(&b, &a, 1);
        let unrelated = expense(&b, &c, 5);
        for e in [old.clone(), unrelated, new.clone()] {
            store.insert_expense(e).await.unwrap();
        }

        let listed = store.list_expenses_involving(&a.id).await.unwrap();
        assert_eq!(listed, vec![new, old]);
    }

    #[tokio::test]
    async fn delete_requires_the_payer() {
        let store = InMemoryLedgerStore::new();
        let (a, b) = (user("a", "a@example.com"), user("b", "b@example.com"));
        let e = expense(&a, &b, 0);
        store.insert_expense(e.clone()).await.unwrap();

        assert!(!store.delete_expense_paid_by(&e.id, &b.id).await.unwrap());
        assert!(store.delete_expense_paid_by(&e.id, &a.id).await.unwrap());
        assert!(!store.delete_expense_paid_by(&e.id, &a.id).await.unwrap());
        assert_eq!(store.find_expense(&e.id).await.unwrap(), None);
    }
}
