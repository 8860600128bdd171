//! Candle sources: live exchange REST, local CSV datasets, and a seeded
//! generator.

mod binance_klines;
mod csv_source;
mod source;
mod synthetic;

pub use binance_klines::{BinanceKlineClient, BINANCE_API_URL, KLINE_MAX_LIMIT};
pub use csv_source::{load_candles, save_candles, CsvCandleSource};
pub use source::{check_market_token, CandleSource, SourceRegistry};
pub use synthetic::{
    generate_sample_data, SyntheticCandleSource, SyntheticSpec, DEFAULT_BASE_PRICE, DEFAULT_SEED,
};

#[cfg(test)]
pub use source::MockCandleSource;
