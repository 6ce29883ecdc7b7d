//! Derived outputs: SMA trade signal, options pick and mock option chains.
//!
//! Pure functions over already-fetched data; the service decides what to
//! fetch and what to cache.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::Rng;

use crate::models::{
    OptionChain, OptionContract, OptionKind, OptionsRecommendation, OptionsStrategy, PriceBar,
    Signal, TradeRecommendation,
};

const SHORT_WINDOW: usize = 50;
const LONG_WINDOW: usize = 200;

/// Days ahead of today an options recommendation aims its expiration at.
pub const TARGET_DAYS_TO_EXPIRY: i64 = 35;

/// Spacing between synthetic strikes, as a fraction of the underlying price.
const MOCK_STRIKE_STEP: f64 = 0.025;
pub const DEFAULT_CHAIN_LIMIT: usize = 10;
/// Upper bound on strikes per side for any chain served to a caller.
pub const MAX_CHAIN_LIMIT: usize = 50;

/// SPDR sector ETFs and the sector each tracks.
pub const SECTOR_ETFS: [(&str, &str); 11] = [
    ("XLK", "Technology"),
    ("XLV", "Healthcare"),
    ("XLF", "Financials"),
    ("XLY", "Consumer Discretionary"),
    ("XLP", "Consumer Staples"),
    ("XLE", "Energy"),
    ("XLI", "Industrials"),
    ("XLB", "Materials"),
    ("XLU", "Utilities"),
    ("XLRE", "Real Estate"),
    ("XLC", "Communication Services"),
];

/// Mean of the last `window` values, if there are that many.
pub fn simple_moving_average(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// SMA50/SMA200 crossover signal over daily bars, oldest first.
pub fn trade_recommendation(symbol: &str, bars: &[PriceBar]) -> TradeRecommendation {
    let closes: Vec<f64> = bars
        .iter()
        .map(|bar| bar.close)
        .filter(|close| close.is_finite())
        .collect();

    let (Some(sma50), Some(sma200), Some(&current_price)) = (
        simple_moving_average(&closes, SHORT_WINDOW),
        simple_moving_average(&closes, LONG_WINDOW),
        closes.last(),
    ) else {
        return TradeRecommendation::unavailable(
            "Not enough historical data to generate a recommendation.",
        );
    };

    let (signal, summary, confidence) = if sma50 > sma200 {
        (
            Signal::Buy,
            format!(
                "{} is in a bullish trend. The 50-day moving average is above the 200-day moving average, which is a positive sign.",
                symbol
            ),
            (sma50 - sma200) / sma200 * 100.0,
        )
    } else if sma50 < sma200 {
        (
            Signal::Sell,
            format!(
                "{} is in a bearish trend. The 50-day moving average is below the 200-day moving average, which is a negative sign.",
                symbol
            ),
            (sma200 - sma50) / sma50 * 100.0,
        )
    } else {
        (
            Signal::Hold,
            "Market conditions are neutral. There is no clear trend based on moving averages."
                .to_string(),
            50.0,
        )
    };

    TradeRecommendation {
        signal,
        summary,
        confidence: if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        },
        current_price,
        sma50,
        sma200,
    }
}

/// The listed expiration closest to `today + TARGET_DAYS_TO_EXPIRY`.
pub fn target_expiration(expirations: &[NaiveDate], today: NaiveDate) -> Option<NaiveDate> {
    let target = today + Duration::days(TARGET_DAYS_TO_EXPIRY);
    expirations
        .iter()
        .copied()
        .min_by_key(|date| (*date - target).num_days().abs())
}

/// Pick a long call (BUY) or long put (SELL) from `chain`.
///
/// Calls: the lowest strike above the current price, else the highest strike
/// at or below it. Puts: the highest strike below the current price, else the
/// lowest strike at or above it.
pub fn options_recommendation(
    symbol: &str,
    trade: &TradeRecommendation,
    chain: &OptionChain,
) -> OptionsRecommendation {
    let price = trade.current_price;

    let (strategy, contract, summary) = match trade.signal {
        Signal::Buy => {
            let mut calls: Vec<&OptionContract> = chain.calls.iter().collect();
            calls.sort_by(|a, b| a.strike.total_cmp(&b.strike));
            let pick = calls
                .iter()
                .find(|c| c.strike > price)
                .or_else(|| calls.iter().rev().find(|c| c.strike <= price));
            (
                OptionsStrategy::LongCall,
                pick.map(|c| (*c).clone()),
                format!(
                    "A bullish outlook for {} suggests buying a call option. This strategy profits if the stock price increases significantly before the option expires.",
                    symbol
                ),
            )
        }
        Signal::Sell => {
            let mut puts: Vec<&OptionContract> = chain.puts.iter().collect();
            puts.sort_by(|a, b| b.strike.total_cmp(&a.strike));
            let pick = puts
                .iter()
                .find(|p| p.strike < price)
                .or_else(|| puts.iter().rev().find(|p| p.strike >= price));
            (
                OptionsStrategy::LongPut,
                pick.map(|p| (*p).clone()),
                format!(
                    "A bearish outlook for {} suggests buying a put option. This strategy profits if the stock price falls significantly before the option expires.",
                    symbol
                ),
            )
        }
        Signal::Hold | Signal::Unavailable => return OptionsRecommendation::neutral(),
    };

    match contract {
        Some(contract) => OptionsRecommendation {
            strategy,
            summary,
            contract: Some(contract),
            confidence: trade.confidence,
        },
        None => OptionsRecommendation::unavailable(match strategy {
            OptionsStrategy::LongCall => "Could not find a suitable call option.",
            _ => "Could not find a suitable put option.",
        }),
    }
}

/// Expiration used for a mock chain when none was requested: the first
/// Friday at least 30 days out.
pub fn default_mock_expiration(today: NaiveDate) -> NaiveDate {
    let mut date = today + Duration::days(30);
    while date.weekday() != Weekday::Fri {
        date += Duration::days(1);
    }
    date
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Synthetic chain around `underlying_price` with `limit` strikes per side.
pub fn mock_option_chain(
    symbol: &str,
    underlying_price: f64,
    expiration: NaiveDate,
    limit: usize,
) -> OptionChain {
    let mut rng = rand::thread_rng();
    let limit = limit.clamp(1, MAX_CHAIN_LIMIT);
    let center = (limit / 2) as i64;

    let mut calls = Vec::with_capacity(limit);
    let mut puts = Vec::with_capacity(limit);

    for i in 0..limit as i64 {
        let strike = round_cents(underlying_price * (1.0 + MOCK_STRIKE_STEP * (i - center) as f64));
        if strike <= 0.0 {
            continue;
        }
        let moneyness = strike / underlying_price;
        let distance = (moneyness - 1.0).abs();
        let time_value = underlying_price * 0.03 * (1.0 - distance * 4.0).max(0.1);
        let iv = 0.25 + distance * 0.1;

        for kind in [OptionKind::Call, OptionKind::Put] {
            let (intrinsic, in_the_money, tag, skew) = match kind {
                OptionKind::Call => ((underlying_price - strike).max(0.0), strike < underlying_price, 'C', 0.0),
                OptionKind::Put => ((strike - underlying_price).max(0.0), strike > underlying_price, 'P', 0.02),
            };
            let premium = round_cents(intrinsic + time_value);

            let contract = OptionContract {
                contract_symbol: format!(
                    "{}{}{}{:08}",
                    symbol,
                    expiration.format("%y%m%d"),
                    tag,
                    (strike * 1000.0).round() as u64
                ),
                kind,
                strike,
                last_price: premium,
                bid: round_cents(premium * 0.97),
                ask: round_cents(premium * 1.03),
                volume: rng.gen_range(10..5_000),
                open_interest: rng.gen_range(100..20_000),
                implied_volatility: iv + skew,
                in_the_money,
                expiration,
            };
            match kind {
                OptionKind::Call => calls.push(contract),
                OptionKind::Put => puts.push(contract),
            }
        }
    }

    OptionChain {
        symbol: symbol.to_string(),
        expiration,
        underlying_price,
        calls,
        puts,
        is_mock: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars_from(closes: impl IntoIterator<Item = f64>) -> Vec<PriceBar> {
        closes
            .into_iter()
            .map(|close| PriceBar {
                date: "2026-01-02".to_string(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            })
            .collect()
    }

    fn contract(kind: OptionKind, strike: f64) -> OptionContract {
        OptionContract {
            contract_symbol: format!("T{strike}"),
            kind,
            strike,
            last_price: 1.0,
            bid: 1.0,
            ask: 1.0,
            volume: 1,
            open_interest: 1,
            implied_volatility: 0.3,
            in_the_money: false,
            expiration: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
        }
    }

    fn chain(strikes: &[f64]) -> OptionChain {
        OptionChain {
            symbol: "AAPL".to_string(),
            expiration: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            underlying_price: 100.0,
            calls: strikes.iter().map(|s| contract(OptionKind::Call, *s)).collect(),
            puts: strikes.iter().map(|s| contract(OptionKind::Put, *s)).collect(),
            is_mock: false,
        }
    }

    fn trade(signal: Signal, price: f64) -> TradeRecommendation {
        TradeRecommendation {
            signal,
            summary: String::new(),
            confidence: 12.0,
            current_price: price,
            sma50: 0.0,
            sma200: 0.0,
        }
    }

    #[test]
    fn test_sma() {
        assert_eq!(simple_moving_average(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(simple_moving_average(&[1.0], 2), None);
        assert_eq!(simple_moving_average(&[1.0], 0), None);
    }

    #[test]
    fn test_uptrend_is_buy() {
        let bars = bars_from((1..=250).map(|i| i as f64));
        let rec = trade_recommendation("AAPL", &bars);

        assert_eq!(rec.signal, Signal::Buy);
        assert_eq!(rec.current_price, 250.0);
        assert!(rec.sma50 > rec.sma200);
        assert!(rec.confidence > 0.0 && rec.confidence <= 100.0);
    }

    #[test]
    fn test_downtrend_is_sell() {
        let bars = bars_from((1..=250).rev().map(|i| i as f64));
        assert_eq!(trade_recommendation("AAPL", &bars).signal, Signal::Sell);
    }

    #[test]
    fn test_flat_is_hold() {
        let rec = trade_recommendation("AAPL", &bars_from(std::iter::repeat(10.0).take(200)));
        assert_eq!(rec.signal, Signal::Hold);
        assert_eq!(rec.confidence, 50.0);
    }

    #[test]
    fn test_short_history_is_unavailable() {
        let rec = trade_recommendation("AAPL", &bars_from((1..=199).map(|i| i as f64)));
        assert_eq!(rec.signal, Signal::Unavailable);
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut closes: Vec<f64> = std::iter::repeat(1.0).take(150).collect();
        closes.extend(std::iter::repeat(1000.0).take(50));
        let rec = trade_recommendation("AAPL", &bars_from(closes));
        assert_eq!(rec.confidence, 100.0);
    }

    #[test]
    fn test_target_expiration() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let dates = [
            NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
        ];
        assert_eq!(target_expiration(&dates, today), Some(dates[1]));
        assert_eq!(target_expiration(&[], today), None);
    }

    #[test]
    fn test_buy_picks_lowest_otm_call() {
        let rec = options_recommendation("AAPL", &trade(Signal::Buy, 101.0), &chain(&[95.0, 100.0, 105.0, 110.0]));
        assert_eq!(rec.strategy, OptionsStrategy::LongCall);
        assert_eq!(rec.contract.unwrap().strike, 105.0);
        assert_eq!(rec.confidence, 12.0);
    }

    #[test]
    fn test_buy_falls_back_to_highest_itm_call() {
        let rec = options_recommendation("AAPL", &trade(Signal::Buy, 200.0), &chain(&[95.0, 100.0]));
        assert_eq!(rec.contract.unwrap().strike, 100.0);
    }

    #[test]
    fn test_sell_picks_highest_otm_put() {
        let rec = options_recommendation("AAPL", &trade(Signal::Sell, 101.0), &chain(&[95.0, 100.0, 105.0]));
        assert_eq!(rec.strategy, OptionsStrategy::LongPut);
        assert_eq!(rec.contract.unwrap().strike, 100.0);
    }

    #[test]
    fn test_sell_falls_back_to_lowest_itm_put() {
        let rec = options_recommendation("AAPL", &trade(Signal::Sell, 50.0), &chain(&[95.0, 100.0]));
        assert_eq!(rec.contract.unwrap().strike, 95.0);
    }

    #[test]
    fn test_no_contracts_is_unavailable() {
        let rec = options_recommendation("AAPL", &trade(Signal::Buy, 100.0), &chain(&[]));
        assert_eq!(rec.strategy, OptionsStrategy::Unavailable);
        assert!(rec.contract.is_none());
    }

    #[test]
    fn test_hold_is_neutral() {
        let rec = options_recommendation("AAPL", &trade(Signal::Hold, 100.0), &chain(&[100.0]));
        assert_eq!(rec.strategy, OptionsStrategy::Neutral);
    }

    #[test]
    fn test_mock_chain_shape() {
        let expiration = NaiveDate::from_ymd_opt(2026, 11, 20).unwrap();
        let chain = mock_option_chain("AAPL", 200.0, expiration, 10);

        assert!(chain.is_mock);
        assert_eq!(chain.calls.len(), 10);
        assert_eq!(chain.puts.len(), 10);

        let strikes: Vec<f64> = chain.calls.iter().map(|c| c.strike).collect();
        assert!(strikes.contains(&200.0));
        assert_eq!(strikes[1] - strikes[0], 5.0);

        for call in &chain.calls {
            assert!(call.last_price >= (200.0 - call.strike).max(0.0));
            assert_eq!(call.in_the_money, call.strike < 200.0);
            assert!(call.bid <= call.ask);
        }
        assert!(chain.calls[0].contract_symbol.starts_with("AAPL261120C"));
    }

    #[test]
    fn test_mock_chain_limit_is_clamped() {
        let expiration = NaiveDate::from_ymd_opt(2026, 11, 20).unwrap();

        let chain = mock_option_chain("AAPL", 100.0, expiration, usize::MAX);
        assert_eq!(chain.calls.len(), MAX_CHAIN_LIMIT);
        assert!(chain.calls.iter().all(|c| c.strike > 0.0));

        let chain = mock_option_chain("AAPL", 100.0, expiration, 0);
        assert_eq!(chain.calls.len(), 1);
    }

    #[test]
    fn test_default_mock_expiration_is_friday() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let date = default_mock_expiration(today);
        assert_eq!(date.weekday(), Weekday::Fri);
        assert!(date >= today + Duration::days(30));
        assert!(date < today + Duration::days(37));
    }
}
