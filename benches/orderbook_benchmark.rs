//! Benchmarks for order book aggregation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ome_book::margin::{MarginMath, TracerMargin};
use ome_book::orderbook::{normalize_side, parse_orders, BestPrices};
use ome_book::parser::{FixedPoint, OmeBook, PriceBucket, PriceBuckets, RawOrder};
use rust_decimal::Decimal;
use std::str::FromStr;

const ONE: u128 = 1_000_000_000_000_000_000;

fn create_side(levels: u128, orders_per_level: u128, start: u128, step_down: bool) -> PriceBuckets {
    (0..levels)
        .map(|i| {
            let price = if step_down { start - i } else { start + i };
            PriceBucket {
                key: (price * ONE).to_string(),
                orders: (0..orders_per_level)
                    .map(|_| RawOrder {
                        price: FixedPoint(price * ONE),
                        amount_left: FixedPoint(ONE + ONE / 2),
                    })
                    .collect(),
            }
        })
        .collect()
}

fn create_book(levels: u128) -> OmeBook {
    OmeBook {
        asks: Some(create_side(levels, 4, 50_001, false)),
        // Listed ascending so the sort has work to do
        bids: Some(create_side(levels, 4, 50_000 - levels, false)),
        ltp: Some(FixedPoint(50_000 * ONE)),
    }
}

fn benchmark_normalize(c: &mut Criterion) {
    let side = create_side(100, 4, 50_000, true);

    c.bench_function("normalize_side_100_levels", |b| {
        b.iter(|| normalize_side(black_box(&side)))
    });
}

fn benchmark_parse_orders(c: &mut Criterion) {
    let book = create_book(100);

    c.bench_function("parse_orders_100_levels", |b| {
        b.iter(|| {
            let orders = parse_orders(black_box(&book)).unwrap();
            black_box(BestPrices::from_orders(&orders));
        })
    });
}

fn benchmark_margin(c: &mut Criterion) {
    let math = TracerMargin::new(Decimal::from(10));
    let quote = Decimal::from_str("-40000").unwrap();
    let base = Decimal::from_str("1.25").unwrap();
    let price = Decimal::from(50_000);
    let leverage = Decimal::from(10);

    c.bench_function("available_margin_percent", |b| {
        b.iter(|| black_box(math.available_margin_percent(quote, base, price, leverage)))
    });

    c.bench_function("liquidation_price", |b| {
        b.iter(|| black_box(math.liquidation_price(quote, base, price, leverage)))
    });
}

criterion_group!(benches, benchmark_normalize, benchmark_parse_orders, benchmark_margin);
criterion_main!(benches);
