use serde::{Deserialize, Serialize};

use crate::values::Price;

/// Account snapshot used for sizing and admission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Uninvested cash
    pub cash: Price,
    /// Cash plus market value of all holdings
    pub portfolio_value: Price,
    /// Cash available for new purchases
    pub buying_power: Price,
}

impl AccountState {
    /// Cash-only account (nothing held)
    pub fn with_cash(cash: Price) -> Self {
        Self {
            cash,
            portfolio_value: cash,
            buying_power: cash,
        }
    }
}
