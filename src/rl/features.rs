//! Feature Construction
//!
//! Turns an ordered candle series into normalized feature rows and fixed-size
//! observation windows.
//!
//! Row layout: `open_norm, high_norm, low_norm, close_norm, volume_norm, returns`.
//! Prices are z-scored against the statistics of `close` so the four price
//! columns share one scale; volume is z-scored on `ln(1 + volume)`.

use serde::Serialize;
use tracing::warn;

use super::config::{FeatureConfig, FEATURE_COUNT};
use crate::domain::{validate_series, Candle};
use crate::error::{Result, TraderError};

/// Added to every standard deviation used as a divisor
pub const STD_EPSILON: f64 = 1e-8;

pub type FeatureRow = [f32; FEATURE_COUNT];

/// Fixed `[lookback, FEATURE_COUNT]` observation handed to the policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationWindow {
    rows: Vec<FeatureRow>,
}

impl ObservationWindow {
    /// Shape-correct a realized window.
    ///
    /// More rows than `lookback` keeps the most recent ones; fewer rows are
    /// left-padded by repeating row 0. An empty input yields an all-zero window.
    pub fn from_rows(mut rows: Vec<FeatureRow>, lookback: usize) -> Self {
        if rows.len() > lookback {
            rows.drain(..rows.len() - lookback);
        } else if rows.len() < lookback {
            if !rows.is_empty() {
                warn!(
                    expected = lookback,
                    actual = rows.len(),
                    "observation window short, padding with earliest row"
                );
            }
            let first = rows.first().copied().unwrap_or([0.0; FEATURE_COUNT]);
            let mut padded = vec![first; lookback - rows.len()];
            padded.append(&mut rows);
            rows = padded;
        }
        Self { rows }
    }

    pub fn lookback(&self) -> usize {
        self.rows.len()
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// `[1, lookback, FEATURE_COUNT]`, the batched input shape
    pub fn batched_shape(&self) -> [usize; 3] {
        [1, self.rows.len(), FEATURE_COUNT]
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&FeatureRow> {
        self.rows.get(idx)
    }

    /// Row-major flattening
    pub fn to_flat(&self) -> Vec<f32> {
        self.rows.iter().flat_map(|r| r.iter().copied()).collect()
    }
}

/// How the price/volume columns were normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Trailing rolling statistics of the given width
    Rolling { window: usize },
    /// One mean/std over the whole series
    Global,
}

/// Feature rows for a whole candle series, aligned with their raw closes
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    rows: Vec<FeatureRow>,
    closes: Vec<f64>,
    timestamps: Vec<i64>,
    /// Candle index of frame row 0 (warm-up rows are dropped)
    offset: usize,
    mode: NormalizationMode,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn close(&self, idx: usize) -> Option<f64> {
        self.closes.get(idx).copied()
    }

    pub fn timestamp(&self, idx: usize) -> Option<i64> {
        self.timestamps.get(idx).copied()
    }

    /// Window of `lookback` rows ending at `index` (inclusive).
    ///
    /// Indices past the end are clamped to the last row.
    pub fn window_ending_at(&self, index: usize, lookback: usize) -> ObservationWindow {
        if self.rows.is_empty() {
            return ObservationWindow::from_rows(Vec::new(), lookback);
        }
        let end = index.min(self.rows.len() - 1) + 1;
        let start = end.saturating_sub(lookback);
        ObservationWindow::from_rows(self.rows[start..end].to_vec(), lookback)
    }

    /// Window ending at the most recent row
    pub fn latest_window(&self, lookback: usize) -> ObservationWindow {
        self.window_ending_at(self.rows.len().saturating_sub(1), lookback)
    }
}

/// Builds normalized features from raw candles. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Normalization chosen for a series of `n` candles
    pub fn mode_for_len(&self, n: usize) -> NormalizationMode {
        let window = self.config.max_rolling_window.min(n / 4);
        if window >= self.config.min_rolling_window {
            NormalizationMode::Rolling { window }
        } else {
            NormalizationMode::Global
        }
    }

    /// Compute feature rows for the whole series
    pub fn compute(&self, candles: &[Candle]) -> Result<FeatureFrame> {
        validate_series(candles)?;

        let n = candles.len();
        let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volume_log: Vec<f64> = candles.iter().map(|c| c.volume.ln_1p()).collect();
        let returns = clipped_returns(&closes, self.config.return_clip);

        let mode = self.mode_for_len(n);
        let mut rows = Vec::with_capacity(n);
        let offset;

        match mode {
            NormalizationMode::Rolling { window } => {
                let min_periods = self.config.min_periods;
                let price_stats = rolling_stats(&closes, window, min_periods);
                let volume_stats = rolling_stats(&volume_log, window, min_periods);
                offset = min_periods.saturating_sub(1).min(n);

                for i in offset..n {
                    let (Some(price), Some(volume)) = (price_stats[i], volume_stats[i]) else {
                        return Err(TraderError::Internal(format!(
                            "rolling statistics undefined at row {i} after warm-up"
                        )));
                    };
                    rows.push([
                        price.z(opens[i]),
                        price.z(highs[i]),
                        price.z(lows[i]),
                        price.z(closes[i]),
                        volume.z(volume_log[i]),
                        returns[i] as f32,
                    ]);
                }
            }
            NormalizationMode::Global => {
                offset = 0;
                let open_stats = Stats::of(&opens);
                let high_stats = Stats::of(&highs);
                let low_stats = Stats::of(&lows);
                let close_stats = Stats::of(&closes);
                let volume_stats = Stats::of(&volume_log);

                for i in 0..n {
                    rows.push([
                        open_stats.z(opens[i]),
                        high_stats.z(highs[i]),
                        low_stats.z(lows[i]),
                        close_stats.z(closes[i]),
                        volume_stats.z(volume_log[i]),
                        returns[i] as f32,
                    ]);
                }
            }
        }

        Ok(FeatureFrame {
            rows,
            closes: closes[offset..].to_vec(),
            timestamps: candles[offset..].iter().map(|c| c.timestamp).collect(),
            offset,
            mode,
        })
    }

    /// Observation window ending at the most recent candle
    pub fn build(&self, candles: &[Candle], lookback: usize) -> Result<ObservationWindow> {
        if lookback == 0 {
            return Err(TraderError::Validation("lookback must be > 0".to_string()));
        }
        let frame = self.compute(candles)?;
        Ok(frame.latest_window(lookback))
    }
}

/// Mean and sample standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stats {
    mean: f64,
    std: f64,
}

impl Stats {
    fn of(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self { mean: 0.0, std: 0.0 };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self { mean, std }
    }

    fn z(&self, value: f64) -> f32 {
        ((value - self.mean) / (self.std + STD_EPSILON)) as f32
    }
}

/// Trailing-window statistics; `None` until `min_periods` observations exist.
fn rolling_stats(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<Stats>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            (slice.len() >= min_periods).then(|| Stats::of(slice))
        })
        .collect()
}

/// Per-candle close-to-close returns, first element 0, clipped to `±clip`.
fn clipped_returns(closes: &[f64], clip: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let r = if i == 0 || closes[i - 1] == 0.0 {
            0.0
        } else {
            closes[i] / closes[i - 1] - 1.0
        };
        out.push(r.clamp(-clip, clip));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.05;
                Candle::new(
                    60_000 * i as i64,
                    close - 0.2,
                    close + 0.5,
                    close - 0.6,
                    close,
                    100.0 + (i % 7) as f64 * 10.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_input_is_data_error() {
        let builder = FeatureBuilder::default();
        assert!(matches!(
            builder.build(&[], 10),
            Err(TraderError::Data(_))
        ));
    }

    #[test]
    fn test_window_shape_is_always_lookback() {
        let builder = FeatureBuilder::default();
        for n in [1, 3, 5, 60, 200, 500] {
            for lookback in [1, 10, 60] {
                let obs = builder.build(&series(n), lookback).unwrap();
                assert_eq!(obs.lookback(), lookback, "n={n} lookback={lookback}");
                assert_eq!(obs.to_flat().len(), lookback * FEATURE_COUNT);
            }
        }
    }

    #[test]
    fn test_padding_repeats_first_candle() {
        let builder = FeatureBuilder::default();
        let candles = series(5);
        let frame = builder.compute(&candles).unwrap();
        assert_eq!(frame.mode(), NormalizationMode::Global);

        let obs = builder.build(&candles, 10).unwrap();
        let first = frame.rows()[0];
        for i in 0..6 {
            assert_eq!(obs.rows()[i], first, "row {i}");
        }
        assert_eq!(obs.rows()[9], frame.rows()[4]);
    }

    #[test]
    fn test_mode_selection() {
        let builder = FeatureBuilder::default();
        assert_eq!(builder.mode_for_len(79), NormalizationMode::Global);
        assert_eq!(
            builder.mode_for_len(80),
            NormalizationMode::Rolling { window: 20 }
        );
        assert_eq!(
            builder.mode_for_len(10_000),
            NormalizationMode::Rolling { window: 100 }
        );
    }

    #[test]
    fn test_rolling_mode_drops_warmup_rows() {
        let builder = FeatureBuilder::default();
        let candles = series(200);
        let frame = builder.compute(&candles).unwrap();
        assert_eq!(frame.offset(), 9);
        assert_eq!(frame.len(), 191);
        assert_eq!(frame.close(0), Some(candles[9].close));
        assert_eq!(frame.timestamp(0), Some(candles[9].timestamp));
    }

    #[test]
    fn test_returns_clipped_and_first_is_zero() {
        let mut candles = series(5);
        candles[3].close = candles[2].close * 2.0;
        let frame = FeatureBuilder::default().compute(&candles).unwrap();
        assert_eq!(frame.rows()[0][5], 0.0);
        assert!((frame.rows()[3][5] - 0.1).abs() < 1e-6);
        assert!((frame.rows()[4][5] + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_constant_series_does_not_divide_by_zero() {
        let candles: Vec<Candle> = (0..150)
            .map(|i| Candle::new(i * 60_000, 50.0, 50.0, 50.0, 50.0, 0.0))
            .collect();
        let frame = FeatureBuilder::default().compute(&candles).unwrap();
        assert!(frame
            .rows()
            .iter()
            .all(|row| row.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_single_candle() {
        let obs = FeatureBuilder::default()
            .build(&series(1), 4)
            .unwrap();
        assert_eq!(obs.lookback(), 4);
        assert!(obs.rows().iter().all(|r| *r == obs.rows()[0]));
    }

    #[test]
    fn test_from_rows_truncates_to_most_recent() {
        let rows: Vec<FeatureRow> = (0..5).map(|i| [i as f32; FEATURE_COUNT]).collect();
        let obs = ObservationWindow::from_rows(rows, 3);
        assert_eq!(obs.rows()[0][0], 2.0);
        assert_eq!(obs.rows()[2][0], 4.0);
    }

    #[test]
    fn test_deterministic() {
        let builder = FeatureBuilder::default();
        let candles = series(300);
        assert_eq!(
            builder.build(&candles, 60).unwrap(),
            builder.build(&candles, 60).unwrap()
        );
    }
}
