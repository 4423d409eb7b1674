use super::Cents;

/// Caller-supplied, opaque account identifier.
pub type AccountId = String;

/// A single ledger account.
///
/// The balance is only ever changed through [`Account::credit`] and
/// [`Account::debit`], both of which refuse to leave it in an invalid state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    balance: Cents,
}

impl Account {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            balance: 0,
        }
    }

    pub fn balance(&self) -> Cents {
        self.balance
    }

    /// Add `amount` and return the new balance, or `None` on overflow.
    pub fn credit(&mut self, amount: Cents) -> Option<Cents> {
        let balance = self.balance.checked_add(amount)?;
        self.balance = balance;
        Some(balance)
    }

    /// Subtract `amount` and return the new balance, or `None` if the
    /// balance does not cover it.
    pub fn debit(&mut self, amount: Cents) -> Option<Cents> {
        let balance = self.balance.checked_sub(amount)?;
        self.balance = balance;
        Some(balance)
    }

    pub fn reset(&mut self) {
        self.balance = 0;
    }
}
