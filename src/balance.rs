use serde::Serialize;

use crate::money::Money;
use crate::schemas::{Expense, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    pub owes: Money,
    pub is_owed: Money,
}

impl Balance {
    pub fn net_balance(&self) -> Money {
        self.is_owed - self.owes
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceJson {
    #[serde(with = "rust_decimal::serde::float")]
    pub owes: rust_decimal::Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub is_owed: rust_decimal::Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_balance: rust_decimal::Decimal,
}

impl From<Balance> for BalanceJson {
    fn from(balance: Balance) -> Self {
        BalanceJson {
            owes: balance.owes.to_decimal(),
            is_owed: balance.is_owed.to_decimal(),
            net_balance: balance.net_balance().to_decimal(),
        }
    }
}

// Each expense is a 50/50 split: the counterparty carries half (rounded
// half-up), the payer absorbs whatever is left.
pub fn compute_balance(user: &UserId, expenses: &[Expense]) -> Balance {
    let mut balance = Balance::default();
    for expense in expenses {
        if expense.payer_id == expense.split_with_id {
            continue;
        }
        let share = expense.amount.half_up();
        if expense.payer_id == *user {
            balance.is_owed = balance.is_owed + share;
        } else if expense.split_with_id == *user {
            balance.owes = balance.owes + share;
        }
    }
    balance
}
