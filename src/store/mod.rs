//! Persistence port for users and expenses.
//!
//! The store enforces uniqueness of usernames and emails (case-insensitive)
//! with a single atomic check-and-insert, and only ever deletes expenses
//! conditionally on the payer. Expenses are immutable once written, so
//! there is no update operation.

mod memory;
mod mongo;

pub use memory::InMemoryLedgerStore;
pub use mongo::MongoLedgerStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::schemas::{Expense, ExpenseId, User, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the username or email is taken.
    async fn insert_user(&self, user: User) -> StoreResult<()>;

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>>;

    /// `email` must already be lower-cased.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Matches regardless of case.
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn insert_expense(&self, expense: Expense) -> StoreResult<()>;

    async fn find_expense(&self, id: &ExpenseId) -> StoreResult<Option<Expense>>;

    /// Expenses the user paid or was split with, newest first.
    async fn list_expenses_involving(&self, user: &UserId) -> StoreResult<Vec<Expense>>;

    /// Deletes the expense only if `payer` paid it. Returns whether a record
    /// was removed.
    async fn delete_expense_paid_by(&self, id: &ExpenseId, payer: &UserId) -> StoreResult<bool>;
}

// Newest first; the id breaks ties between expenses created in the same
// millisecond.
pub(crate) fn sort_newest_first(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}
