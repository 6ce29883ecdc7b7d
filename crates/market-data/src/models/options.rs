use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Call or put
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

/// A single listed option contract
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    pub contract_symbol: String,
    pub kind: OptionKind,
    pub strike: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
    pub in_the_money: bool,
    pub expiration: NaiveDate,
}

/// Calls and puts for one expiration date
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChain {
    pub symbol: String,
    pub expiration: NaiveDate,
    pub underlying_price: f64,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,

    /// Set when the chain was synthesized because live data was unavailable
    #[serde(default)]
    pub is_mock: bool,
}

impl OptionChain {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }

    /// Keep at most `limit` calls and puts, nearest the underlying price.
    pub fn truncate_around_price(&mut self, limit: usize) {
        let price = self.underlying_price;
        for side in [&mut self.calls, &mut self.puts] {
            if side.len() > limit {
                side.sort_by(|a, b| {
                    (a.strike - price)
                        .abs()
                        .total_cmp(&(b.strike - price).abs())
                });
                side.truncate(limit);
            }
            side.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(kind: OptionKind, strike: f64) -> OptionContract {
        OptionContract {
            contract_symbol: format!("AAPL{strike}"),
            kind,
            strike,
            last_price: 1.0,
            bid: 0.9,
            ask: 1.1,
            volume: 10,
            open_interest: 100,
            implied_volatility: 0.3,
            in_the_money: false,
            expiration: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
        }
    }

    #[test]
    fn test_truncate_keeps_strikes_nearest_price() {
        let mut chain = OptionChain {
            symbol: "AAPL".to_string(),
            expiration: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            underlying_price: 100.0,
            calls: [80.0, 90.0, 100.0, 110.0, 120.0]
                .into_iter()
                .map(|s| contract(OptionKind::Call, s))
                .collect(),
            puts: vec![contract(OptionKind::Put, 95.0)],
            is_mock: false,
        };

        chain.truncate_around_price(3);

        let strikes: Vec<f64> = chain.calls.iter().map(|c| c.strike).collect();
        assert_eq!(strikes, vec![90.0, 100.0, 110.0]);
        assert_eq!(chain.puts.len(), 1);
    }
}
