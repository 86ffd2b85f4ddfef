use chrono::Utc;
use papertrader::error::LedgerError;
use papertrader::portfolio::Portfolio;
use papertrader::risk::RiskLimits;
use papertrader::{ExitReason, Side};
use proptest::prelude::*;

const SYMBOLS: [&str; 3] = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];

#[derive(Debug, Clone)]
enum Op {
    Open {
        symbol: usize,
        side: Side,
        price: f64,
        value: f64,
    },
    Mark {
        symbol: usize,
        price: f64,
    },
    Close {
        symbol: usize,
    },
}

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn price() -> impl Strategy<Value = f64> {
    10.0..1000.0f64
}

// Independent of entry, so shorts regularly gap far past twice their entry
fn mark() -> impl Strategy<Value = f64> {
    1.0..10_000.0f64
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, side(), price(), 1.0..4000.0f64).prop_map(|(symbol, side, price, value)| {
            Op::Open {
                symbol,
                side,
                price,
                value,
            }
        }),
        (0..3usize, mark()).prop_map(|(symbol, price)| Op::Mark { symbol, price }),
        (0..3usize).prop_map(|symbol| Op::Close { symbol }),
    ]
}

fn recomputed_total(pf: &Portfolio) -> f64 {
    pf.cash() + pf.positions().map(|p| p.market_value()).sum::<f64>()
}

fn apply(pf: &mut Portfolio, op: &Op) {
    let now = Utc::now();
    match *op {
        Op::Open {
            symbol,
            side,
            price,
            value,
        } => {
            let _ = pf.open(SYMBOLS[symbol], side, price, value / price, now);
        }
        Op::Mark { symbol, price } => pf.mark_price(SYMBOLS[symbol], price),
        Op::Close { symbol } => {
            let symbol = SYMBOLS[symbol];
            if let Some(price) = pf.position(symbol).map(|p| p.current_price) {
                let _ = pf.close(symbol, price, now, ExitReason::Manual);
            }
        }
    }
}

proptest! {
    #[test]
    fn cash_never_negative_and_value_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let mut pf = Portfolio::new(10000.0, RiskLimits::default());

        for op in &ops {
            apply(&mut pf, op);

            prop_assert!(pf.cash() >= 0.0, "cash went negative: {}", pf.cash());
            prop_assert!(pf.total_value() >= 0.0);
            prop_assert!((pf.total_value() - recomputed_total(&pf)).abs() < 1e-6);
            prop_assert!(pf.open_count() <= SYMBOLS.len());
        }
    }

    #[test]
    fn short_closed_at_any_price_keeps_cash_non_negative(
        entry in price(),
        exit in mark(),
        longs in 0..4usize,
    ) {
        let mut pf = Portfolio::new(10000.0, RiskLimits::default());
        let now = Utc::now();

        // Spend cash down with longs so the short's collateral is all that backs it
        for symbol in ["AAAUSDT", "BBBUSDT", "CCCUSDT"].iter().take(longs) {
            pf.open(symbol, Side::Long, 100.0, 20.0, now).unwrap();
        }
        pf.open("SHORTUSDT", Side::Short, entry, 2000.0 / entry, now).unwrap();
        let cash_before = pf.cash();

        pf.mark_price("SHORTUSDT", exit);
        let trade = pf.close("SHORTUSDT", exit, now, ExitReason::StopLoss).unwrap();

        prop_assert!(pf.cash() >= 0.0, "cash went negative: {}", pf.cash());
        prop_assert!(pf.cash() >= cash_before);
        prop_assert!(trade.pnl >= -2000.0 - 1e-9);
    }

    #[test]
    fn can_open_is_pure(
        ops in prop::collection::vec(op(), 0..20),
        price in price(),
        value in 1.0..4000.0f64,
    ) {
        let mut pf = Portfolio::new(10000.0, RiskLimits::default());
        for op in &ops {
            apply(&mut pf, op);
        }

        let cash = pf.cash();
        let open = pf.open_count();
        let trades = pf.trades().len();

        let first = pf.can_open("SOLUSDT", price, value / price);
        let second = pf.can_open("SOLUSDT", price, value / price);

        prop_assert_eq!(first, second);
        prop_assert_eq!(pf.cash(), cash);
        prop_assert_eq!(pf.open_count(), open);
        prop_assert_eq!(pf.trades().len(), trades);
    }

    #[test]
    fn second_open_is_duplicate_and_changes_nothing(
        side_a in side(),
        side_b in side(),
        price in price(),
        value in 100.0..1500.0f64,
    ) {
        let mut pf = Portfolio::new(10000.0, RiskLimits::default());
        pf.open("BTCUSDT", side_a, price, value / price, Utc::now()).unwrap();

        let cash = pf.cash();
        let before = pf.position("BTCUSDT").cloned();

        let err = pf.open("BTCUSDT", side_b, price, value / price, Utc::now()).unwrap_err();

        let is_duplicate = matches!(err, LedgerError::DuplicatePosition { .. });
        prop_assert!(is_duplicate);
        prop_assert_eq!(pf.cash(), cash);
        prop_assert_eq!(pf.position("BTCUSDT").cloned(), before);
        prop_assert_eq!(pf.open_count(), 1);
    }

    #[test]
    fn round_trip_at_entry_price_is_flat(
        side in side(),
        price in price(),
        value in 1.0..2000.0f64,
    ) {
        let mut pf = Portfolio::new(10000.0, RiskLimits::default());
        let now = Utc::now();

        pf.open("ETHUSDT", side, price, value / price, now).unwrap();
        let trade = pf.close("ETHUSDT", price, now, ExitReason::Manual).unwrap();

        prop_assert_eq!(trade.pnl, 0.0);
        prop_assert!((pf.cash() - 10000.0).abs() < 1e-9);
        prop_assert_eq!(pf.open_count(), 0);
    }
}
