use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The direction of a trade. Stored as the `trade_side` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "trade_side", rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Applies the log's sign convention: buys are recorded positive, sells negative.
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            TradeSide::Buy => quantity,
            TradeSide::Sell => -quantity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sell_quantities_are_recorded_negative() {
        assert_eq!(TradeSide::Buy.signed(dec!(10)), dec!(10));
        assert_eq!(TradeSide::Sell.signed(dec!(10)), dec!(-10));
    }

    #[test]
    fn serializes_as_uppercase_words() {
        assert_eq!(serde_json::to_string(&TradeSide::Sell).unwrap(), "\"SELL\"");
        let side: TradeSide = serde_json::from_str("\"BUY\"").unwrap();
        assert_eq!(side, TradeSide::Buy);
        assert_eq!(TradeSide::Sell.to_string(), "SELL");
    }
}
