use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A participant ledger row. Users are created on first reference and never
/// destroyed. `locked` is escrow backing resting orders; it is counted inside
/// `balance`, so spendable funds are `balance - locked`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub balance: Decimal,
    pub locked: Decimal,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Funds not committed to resting orders.
    pub fn available(&self) -> Decimal {
        self.balance - self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_available_balance() {
        let user = User {
            id: "u1".to_string(),
            balance: dec!(100),
            locked: dec!(37.5),
            created_at: Utc::now(),
        };
        assert_eq!(user.available(), dec!(62.5));
    }
}
