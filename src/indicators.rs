//! Numeric transforms over an ordered price series.
//!
//! Every function here is pure: same input, same output, no shared state.
//! Closes are passed as plain slices so the same routines can smooth derived
//! series (the MACD signal line is an EMA of the MACD line).

use crate::error::{AnalysisError, Result};
use crate::models::PriceBar;
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::ExponentialMovingAverage;

/// Fraction of the bar range subtracted from the high by [`trailing_stop_approx`].
pub const TRAILING_STOP_FRACTION: f64 = 0.02;

// --- Output Types ---

#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdOutput {
    pub fn latest_histogram(&self) -> Option<f64> {
        self.histogram.last().copied()
    }
}

/// Bollinger envelope, aligned index-for-index with the SMA of the same period.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub mid: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Latest values of the three bands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BandSnapshot {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn latest(&self) -> Option<BandSnapshot> {
        Some(BandSnapshot {
            upper: *self.upper.last()?,
            mid: *self.mid.last()?,
            lower: *self.lower.last()?,
        })
    }
}

/// Retracement levels between the lowest low and the highest high of a series.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FibonacciLevels {
    pub level_0: f64,
    pub level_38_2: f64,
    pub level_50: f64,
    pub level_61_8: f64,
    pub level_100: f64,
}

impl FibonacciLevels {
    /// Price at an arbitrary fraction of the low..high range.
    pub fn level_at(&self, ratio: f64) -> f64 {
        self.level_0 + (self.level_100 - self.level_0) * ratio
    }
}

/// Naive linear projections of the last close.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    pub day1: f64,
    pub day3: f64,
    pub day7: f64,
}

// --- Moving Averages ---

/// Simple moving average. Output has `values.len() - period + 1` entries.
pub fn sma(period: usize, values: &[f64]) -> Result<Vec<f64>> {
    if period == 0 {
        return Err(AnalysisError::invalid_parameter("SMA period must be positive"));
    }
    if values.len() < period {
        return Err(AnalysisError::insufficient("SMA", period, values.len()));
    }
    Ok(values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect())
}

/// Exponential moving average seeded with the first input; same length as the input.
///
/// `k = 2 / (period + 1)`, each step `k * x + (1 - k) * prev`. Algebraically the
/// same as `prev + (x - prev) * k`, but the two can differ in the last bits.
pub fn ema(period: usize, values: &[f64]) -> Result<Vec<f64>> {
    let mut indicator = ExponentialMovingAverage::new(period)
        .map_err(|_| AnalysisError::invalid_parameter("EMA period must be positive"))?;
    Ok(values.iter().map(|&v| indicator.next(v)).collect())
}

// --- Oscillators ---

/// Relative strength index over the last `period` gains and the last `period` losses.
///
/// Gains and losses are collected into separate lists over the whole series and
/// each list's trailing `period` entries are summed and divided by `period`.
/// This is not Wilder's smoothed average. A flat delta counts as a zero loss.
///
/// Saturates at 100 when there are gains and no losses, and returns 50 when
/// both averages are zero.
pub fn rsi(period: usize, closes: &[f64]) -> Result<f64> {
    if period == 0 {
        return Err(AnalysisError::invalid_parameter("RSI period must be positive"));
    }
    if closes.len() <= period {
        return Err(AnalysisError::insufficient(
            "RSI",
            period.saturating_add(1),
            closes.len(),
        ));
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains.push(change);
        } else {
            losses.push(change.abs());
        }
    }

    let trailing_avg = |xs: &[f64]| {
        xs[xs.len().saturating_sub(period)..].iter().sum::<f64>() / period as f64
    };
    let avg_gain = trailing_avg(&gains);
    let avg_loss = trailing_avg(&losses);

    if avg_loss == 0.0 {
        return Ok(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram, all aligned with `closes`.
pub fn macd(short: usize, long: usize, signal: usize, closes: &[f64]) -> Result<MacdOutput> {
    if short >= long {
        return Err(AnalysisError::invalid_parameter(format!(
            "MACD short period ({short}) must be below long period ({long})"
        )));
    }
    if closes.is_empty() {
        return Err(AnalysisError::insufficient("MACD", 1, 0));
    }

    let short_ema = ema(short, closes)?;
    let long_ema = ema(long, closes)?;
    let macd_line: Vec<f64> = short_ema
        .iter()
        .zip(&long_ema)
        .map(|(s, l)| s - l)
        .collect();
    let signal_line = ema(signal, &macd_line)?;
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    Ok(MacdOutput {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}

// --- Volatility & Levels ---

/// SMA envelope sized by the population standard deviation of each window.
pub fn bollinger(period: usize, multiplier: f64, closes: &[f64]) -> Result<BollingerBands> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(AnalysisError::invalid_parameter(format!(
            "Bollinger multiplier must be a non-negative number, got {multiplier}"
        )));
    }
    let mid = sma(period, closes)?;

    let mut upper = Vec::with_capacity(mid.len());
    let mut lower = Vec::with_capacity(mid.len());
    for (window, &mean) in closes.windows(period).zip(&mid) {
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();
        upper.push(mean + multiplier * std_dev);
        lower.push(mean - multiplier * std_dev);
    }

    Ok(BollingerBands { upper, mid, lower })
}

/// Retracement levels from the series' highest high and lowest low.
pub fn fibonacci(bars: &[PriceBar]) -> Result<FibonacciLevels> {
    if bars.is_empty() {
        return Err(AnalysisError::insufficient("Fibonacci", 1, 0));
    }
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let range = high - low;

    Ok(FibonacciLevels {
        level_0: low,
        level_38_2: low + range * 0.382,
        level_50: (high + low) / 2.0,
        level_61_8: low + range * 0.618,
        level_100: high,
    })
}

/// Fixed-percentage stop below each bar's high.
///
/// An approximation only: it ignores trend direction and acceleration, so it
/// is not a substitute for an adaptive trailing stop such as Parabolic SAR.
pub fn trailing_stop_approx(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter()
        .map(|b| b.high - (b.high - b.low) * TRAILING_STOP_FRACTION)
        .collect()
}

// --- Extrapolation ---

/// `last + avg_change * horizon` with `avg_change = (last - first) / len`.
pub fn linear_forecast(closes: &[f64]) -> Result<Forecast> {
    if closes.len() < 2 {
        return Err(AnalysisError::insufficient("forecast", 2, closes.len()));
    }
    let first = closes[0];
    let last = closes[closes.len() - 1];
    let avg_change = (last - first) / closes.len() as f64;

    Ok(Forecast {
        day1: last + avg_change,
        day3: last + avg_change * 3.0,
        day7: last + avg_change * 7.0,
    })
}

pub fn average_price(closes: &[f64]) -> Result<f64> {
    if closes.is_empty() {
        return Err(AnalysisError::insufficient("average price", 1, 0));
    }
    Ok(closes.iter().sum::<f64>() / closes.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(i: i64, high: f64, low: f64) -> PriceBar {
        let close = (high + low) / 2.0;
        PriceBar {
            timestamp: i,
            open: close,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    fn wavy(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let result = sma(3, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(result, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sma_output_length() {
        let values = wavy(40);
        for period in 1..=40 {
            assert_eq!(sma(period, &values).unwrap().len(), 40 - period + 1);
        }
    }

    #[test]
    fn test_sma_insufficient_data() {
        let err = sma(5, &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, AnalysisError::insufficient("SMA", 5, 2));
    }

    #[test]
    fn test_sma_zero_period() {
        assert!(matches!(
            sma(0, &[1.0]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_ema_seeds_with_first_value() {
        let result = ema(3, &[10.0, 20.0, 30.0]).unwrap();
        // k = 0.5
        assert!((result[0] - 10.0).abs() < 1e-12);
        assert!((result[1] - 15.0).abs() < 1e-12);
        assert!((result[2] - 22.5).abs() < 1e-12);
    }

    #[test]
    fn test_ema_output_length_matches_input() {
        for len in [0, 1, 2, 17, 60] {
            assert_eq!(ema(9, &wavy(len)).unwrap().len(), len);
        }
    }

    #[test]
    fn test_ema_tracks_incremental_recurrence() {
        let values = wavy(200);
        let out = ema(9, &values).unwrap();
        let k = 2.0 / 10.0;
        let mut prev = values[0];
        for (i, &x) in values.iter().enumerate().skip(1) {
            prev += (x - prev) * k;
            assert!((out[i] - prev).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn test_ema_constant_input() {
        let result = ema(12, &[7.0; 30]).unwrap();
        assert!(result.iter().all(|v| (v - 7.0).abs() < 1e-12));
    }

    #[test]
    fn test_rsi_all_gains_is_exactly_100() {
        let closes: Vec<f64> = (10..=25).map(f64::from).collect();
        assert_eq!(rsi(14, &closes).unwrap(), 100.0);
    }

    #[test]
    fn test_rsi_all_losses_is_zero() {
        let closes: Vec<f64> = (10..=25).rev().map(f64::from).collect();
        assert_eq!(rsi(14, &closes).unwrap(), 0.0);
    }

    #[test]
    fn test_rsi_flat_series_is_neutral() {
        assert_eq!(rsi(14, &[5.0; 20]).unwrap(), 50.0);
    }

    #[test]
    fn test_rsi_mixed_uses_trailing_slices() {
        // Deltas: +2, -1, +2, -1 with period 2.
        // gains = [2, 2] -> avg 2, losses = [1, 1] -> avg 1, RS = 2.
        let closes = [10.0, 12.0, 11.0, 13.0, 12.0];
        let value = rsi(2, &closes).unwrap();
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_divides_by_period_even_with_fewer_entries() {
        // Deltas: +4, -2, +4 with period 2 -> gains [4, 4] avg 4, losses [2] avg 1.
        let closes = [10.0, 14.0, 12.0, 16.0];
        let value = rsi(2, &closes).unwrap();
        assert!((value - 80.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let closes: Vec<f64> = (0..14).map(f64::from).collect();
        assert_eq!(
            rsi(14, &closes).unwrap_err(),
            AnalysisError::insufficient("RSI", 15, 14)
        );
    }

    #[test]
    fn test_rsi_huge_period_is_insufficient_not_overflow() {
        assert_eq!(
            rsi(usize::MAX, &[1.0, 2.0]).unwrap_err(),
            AnalysisError::insufficient("RSI", usize::MAX, 2)
        );
    }

    #[test]
    fn test_macd_alignment() {
        let closes = wavy(50);
        let out = macd(12, 26, 9, &closes).unwrap();
        assert_eq!(out.macd.len(), 50);
        assert_eq!(out.signal.len(), 50);
        assert_eq!(out.histogram.len(), 50);
        for i in 0..50 {
            assert!((out.histogram[i] - (out.macd[i] - out.signal[i])).abs() < 1e-12);
        }
        assert_eq!(out.latest_histogram(), out.histogram.last().copied());
    }

    #[test]
    fn test_macd_constant_input_is_zero() {
        let out = macd(12, 26, 9, &[3.0; 40]).unwrap();
        assert!(out.histogram.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        assert!(matches!(
            macd(26, 12, 9, &[1.0; 30]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_bollinger_basic() {
        let bands = bollinger(3, 2.0, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let expected_std = (2.0_f64 / 3.0).sqrt();
        assert_eq!(bands.mid, vec![2.0, 3.0, 4.0]);
        assert!((bands.upper[0] - (2.0 + 2.0 * expected_std)).abs() < 1e-10);
        assert!((bands.lower[2] - (4.0 - 2.0 * expected_std)).abs() < 1e-10);
    }

    #[test]
    fn test_bollinger_band_ordering() {
        let closes = wavy(60);
        for period in [1, 5, 20] {
            for multiplier in [0.0, 1.0, 2.0, 3.5] {
                let bands = bollinger(period, multiplier, &closes).unwrap();
                assert_eq!(bands.upper.len(), bands.mid.len());
                assert_eq!(bands.lower.len(), bands.mid.len());
                for i in 0..bands.mid.len() {
                    assert!(bands.upper[i] >= bands.mid[i]);
                    assert!(bands.mid[i] >= bands.lower[i]);
                }
            }
        }
    }

    #[test]
    fn test_bollinger_constant_input_collapses() {
        let bands = bollinger(20, 2.0, &[5.0; 25]).unwrap();
        let latest = bands.latest().unwrap();
        assert_eq!(latest.upper, 5.0);
        assert_eq!(latest.mid, 5.0);
        assert_eq!(latest.lower, 5.0);
    }

    #[test]
    fn test_bollinger_rejects_negative_multiplier() {
        assert!(matches!(
            bollinger(3, -1.0, &[1.0, 2.0, 3.0]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_fibonacci_levels() {
        let bars = vec![make_bar(0, 110.0, 100.0), make_bar(1, 200.0, 150.0)];
        let levels = fibonacci(&bars).unwrap();
        assert_eq!(levels.level_0, 100.0);
        assert_eq!(levels.level_100, 200.0);
        assert!((levels.level_38_2 - 138.2).abs() < 1e-9);
        assert!((levels.level_50 - 150.0).abs() < 1e-9);
        assert!((levels.level_61_8 - 161.8).abs() < 1e-9);
        assert!((levels.level_at(0.382) - levels.level_38_2).abs() < 1e-9);
    }

    #[test]
    fn test_fibonacci_levels_non_decreasing() {
        let bars: Vec<PriceBar> = (0..30)
            .map(|i| {
                let base = 50.0 + (i as f64 * 1.3).cos() * 20.0;
                make_bar(i, base + 3.0, base - 2.0)
            })
            .collect();
        let l = fibonacci(&bars).unwrap();
        let levels = [l.level_0, l.level_38_2, l.level_50, l.level_61_8, l.level_100];
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_trailing_stop_approx() {
        let bars = vec![make_bar(0, 110.0, 100.0)];
        assert_eq!(trailing_stop_approx(&bars), vec![110.0 - 10.0 * 0.02]);
    }

    #[test]
    fn test_linear_forecast_golden() {
        // avg_change = (110 - 100) / 2 = 5
        let forecast = linear_forecast(&[100.0, 110.0]).unwrap();
        assert_eq!(forecast.day1, 115.0);
        assert_eq!(forecast.day3, 125.0);
        assert_eq!(forecast.day7, 145.0);
    }

    #[test]
    fn test_linear_forecast_needs_two_closes() {
        assert_eq!(
            linear_forecast(&[100.0]).unwrap_err(),
            AnalysisError::insufficient("forecast", 2, 1)
        );
    }

    #[test]
    fn test_average_price() {
        assert_eq!(average_price(&[1.0, 2.0, 3.0, 6.0]).unwrap(), 3.0);
        assert!(average_price(&[]).is_err());
    }
}
