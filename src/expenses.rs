use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Session;
use crate::balance::{compute_balance, Balance};
use crate::error::{LedgerError, LedgerResult};
use crate::money::{Money, MAX_EXPENSE_MINOR};
use crate::schemas::{stored_now, Expense, UserNick};
use crate::store::LedgerStore;

const MAX_DESCRIPTION_LEN: usize = 200;
const EXPENSE_NOT_FOUND: &str = "Expense not found";

#[derive(Debug, Deserialize, Serialize)]
pub struct NewExpense {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub split_with: UserNick,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpenseJson {
    pub id: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payer: UserNick,
    pub split_with: UserNick,
    pub date: DateTime<Utc>,
}

impl From<Expense> for ExpenseJson {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id.to_hex(),
            description: expense.description,
            amount: expense.amount.to_decimal(),
            payer: expense.payer_username,
            split_with: expense.split_with_username,
            date: expense.date,
        }
    }
}

fn validate_amount(amount: Decimal) -> LedgerResult<Money> {
    let amount = Money::from_decimal(amount)
        .filter(|money| money.minor() <= MAX_EXPENSE_MINOR)
        .ok_or_else(|| LedgerError::validation("Amount is too large"))?;
    if !amount.is_positive() {
        return Err(LedgerError::validation("Amount must be greater than zero"));
    }
    Ok(amount)
}

pub struct ExpenseService {
    store: Arc<dyn LedgerStore>,
}

impl ExpenseService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, session: &Session, new: NewExpense) -> LedgerResult<Expense> {
        let description = new.description.trim();
        if description.is_empty() {
            return Err(LedgerError::validation("Description is required"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::validation(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        let amount = validate_amount(new.amount)?;
        let split_with = new.split_with.trim();
        if split_with.is_empty() {
            return Err(LedgerError::validation("Split with username is required"));
        }

        let payer = self
            .store
            .find_user_by_id(&session.user_id)
            .await?
            .ok_or_else(|| LedgerError::unauthenticated("Invalid or expired token"))?;
        let partner = self
            .store
            .find_user_by_username(split_with)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("User '{split_with}' not found")))?;
        if partner.id == payer.id {
            return Err(LedgerError::validation("You cannot split an expense with yourself"));
        }

        let expense = Expense {
            id: ObjectId::new(),
            description: description.to_owned(),
            amount,
            payer_id: payer.id,
            payer_username: payer.username,
            split_with_id: partner.id,
            split_with_username: partner.username,
            date: stored_now(),
        };
        self.store.insert_expense(expense.clone()).await?;
        info!(
            expense_id = %expense.id,
            payer_id = %expense.payer_id,
            split_with_id = %expense.split_with_id,
            amount = %expense.amount,
            "expense created"
        );
        Ok(expense)
    }

    pub async fn list(&self, session: &Session) -> LedgerResult<Vec<Expense>> {
        Ok(self.store.list_expenses_involving(&session.user_id).await?)
    }

    /// Only the payer may delete. Malformed ids are reported as missing.
    pub async fn delete(&self, session: &Session, expense_id: &str) -> LedgerResult<()> {
        let id = ObjectId::parse_str(expense_id)
            .map_err(|_| LedgerError::not_found(EXPENSE_NOT_FOUND))?;
        let expense = self
            .store
            .find_expense(&id)
            .await?
            .ok_or_else(|| LedgerError::not_found(EXPENSE_NOT_FOUND))?;
        if expense.payer_id != session.user_id {
            return Err(LedgerError::Authorization(
                "Only the payer can delete this expense".into(),
            ));
        }
        // A concurrent delete may have won since the lookup.
        if !self.store.delete_expense_paid_by(&id, &session.user_id).await? {
            return Err(LedgerError::not_found(EXPENSE_NOT_FOUND));
        }
        info!(expense_id = %id, payer_id = %session.user_id, "expense deleted");
        Ok(())
    }

    /// Recomputed from one fresh read of the ledger on every call.
    pub async fn balance(&self, session: &Session) -> LedgerResult<Balance> {
        let expenses = self.list(session).await?;
        Ok(compute_balance(&session.user_id, &expenses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{User, UserId};
    use crate::store::InMemoryLedgerStore;
    use rstest::{fixture, rstest};
    use rust_decimal_macros::dec;

    struct Ledger {
        service: ExpenseService,
        store: Arc<InMemoryLedgerStore>,
        alice: Session,
        bob: Session,
    }

    fn user(username: &str) -> User {
        User {
            id: ObjectId::new(),
            username: username.to_string(),
            username_key: User::username_key(username),
            email: format!("{}@example.com", username.to_lowercase()),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[fixture]
    async fn ledger() -> Ledger {
        let store = Arc::new(InMemoryLedgerStore::new());
        let alice = user("Alice");
        let bob = user("bob");
        let session = |id: UserId| Session { user_id: id };
        let (alice_id, bob_id) = (alice.id, bob.id);
        store.insert_user(alice).await.unwrap();
        store.insert_user(bob).await.unwrap();
        Ledger {
            service: ExpenseService::new(store.clone()),
            store,
            alice: session(alice_id),
            bob: session(bob_id),
        }
    }

    fn new_expense(description: &str, amount: Decimal, split_with: &str) -> NewExpense {
        NewExpense {
            description: description.to_string(),
            amount,
            split_with: split_with.to_string(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn thirty_pound_dinner_splits_evenly(#[future] ledger: Ledger) {
        let ledger = ledger.await;
        let expense = ledger
            .service
            .create(&ledger.alice, new_expense("Dinner", dec!(30.00), "bob"))
            .await
            .unwrap();
        assert_eq!(expense.payer_username, "Alice");
        assert_eq!(expense.split_with_username, "bob");
        assert_eq!(expense.date.timestamp_subsec_nanos() % 1_000_000, 0);

        let for_alice = ledger.service.list(&ledger.alice).await.unwrap();
        let for_bob = ledger.service.list(&ledger.bob).await.unwrap();
        assert_eq!(for_alice, vec![expense.clone()]);
        assert_eq!(for_bob, vec![expense]);

        let alice = ledger.service.balance(&ledger.alice).await.unwrap();
        assert_eq!(alice.owes, Money::ZERO);
        assert_eq!(alice.is_owed.to_decimal(), dec!(15.00));
        assert_eq!(alice.net_balance().to_decimal(), dec!(15.00));

        let bob = ledger.service.balance(&ledger.bob).await.unwrap();
        assert_eq!(bob.owes.to_decimal(), dec!(15.00));
        assert_eq!(bob.is_owed, Money::ZERO);
        assert_eq!(bob.net_balance().to_decimal(), dec!(-15.00));
    }

    #[rstest]
    #[tokio::test]
    async fn only_the_payer_can_delete(#[future] ledger: Ledger) {
        let ledger = ledger.await;
        let expense = ledger
            .service
            .create(&ledger.alice, new_expense("Dinner", dec!(30.00), "bob"))
            .await
            .unwrap();
        let id = expense.id.to_hex();

        let err = ledger.service.delete(&ledger.bob, &id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Authorization(_)));
        assert_eq!(ledger.service.list(&ledger.bob).await.unwrap().len(), 1);

        ledger.service.delete(&ledger.alice, &id).await.unwrap();
        assert_eq!(ledger.service.balance(&ledger.alice).await.unwrap(), Balance::default());
        assert_eq!(ledger.service.balance(&ledger.bob).await.unwrap(), Balance::default());

        let err = ledger.service.delete(&ledger.alice, &id).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EXPENSE_NOT_FOUND));
    }

    #[rstest]
    #[case("not-an-object-id")]
    #[case("65f1c0ffee0000000000beef")]
    #[tokio::test]
    async fn deleting_unknown_expense_is_not_found(#[future] ledger: Ledger, #[case] id: &str) {
        let ledger = ledger.await;
        let err = ledger.service.delete(&ledger.alice, id).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EXPENSE_NOT_FOUND));
    }

    #[rstest]
    #[case::self_split("Rent", dec!(10), "ALICE")]
    #[case::empty_description("  ", dec!(10), "bob")]
    #[case::zero_amount("Rent", dec!(0), "bob")]
    #[case::negative_amount("Rent", dec!(-5), "bob")]
    #[case::rounds_to_zero("Rent", dec!(0.004), "bob")]
    #[case::too_large("Rent", dec!(1000000000.01), "bob")]
    #[case::empty_partner("Rent", dec!(10), " ")]
    #[tokio::test]
    async fn invalid_expenses_are_rejected(
        #[future] ledger: Ledger,
        #[case] description: &str,
        #[case] amount: Decimal,
        #[case] split_with: &str,
    ) {
        let ledger = ledger.await;
        let err = ledger
            .service
            .create(&ledger.alice, new_expense(description, amount, split_with))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)), "{err:?}");
        let stored = ledger
            .store
            .list_expenses_involving(&ledger.alice.user_id)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_partner_is_not_found(#[future] ledger: Ledger) {
        let ledger = ledger.await;
        let err = ledger
            .service
            .create(&ledger.alice, new_expense("Taxi", dec!(12.50), "carol"))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::not_found("User 'carol' not found"));
    }

    #[rstest]
    #[tokio::test]
    async fn amounts_round_half_up_to_pence(#[future] ledger: Ledger) {
        let ledger = ledger.await;
        let expense = ledger
            .service
            .create(&ledger.alice, new_expense("Coffee", dec!(3.005), "bob"))
            .await
            .unwrap();
        assert_eq!(expense.amount, Money::from_minor(301));

        let bob = ledger.service.balance(&ledger.bob).await.unwrap();
        assert_eq!(bob.owes, Money::from_minor(151));
    }

    #[test]
    fn expense_json_uses_usernames() {
        let payer = ObjectId::new();
        let expense = Expense {
            id: ObjectId::new(),
            description: "Groceries".into(),
            amount: Money::from_minor(4250),
            payer_id: payer,
            payer_username: "Alice".into(),
            split_with_id: ObjectId::new(),
            split_with_username: "bob".into(),
            date: Utc::now(),
        };
        let json = serde_json::to_value(ExpenseJson::from(expense.clone())).unwrap();
        assert_eq!(json["id"], expense.id.to_hex());
        assert_eq!(json["amount"], serde_json::json!(42.5));
        assert_eq!(json["payer"], "Alice");
        assert_eq!(json["split_with"], "bob");
    }
}
