//! Rule tables that turn indicator values into categorical signals.
//!
//! Thresholds come from an explicit [`InterpretationPolicy`] so they can be
//! changed and tested without touching the math. Each rule set is ordered and
//! non-overlapping; the inclusive/exclusive edges are part of the contract.

use crate::error::{AnalysisError, Result};
use crate::indicators::{BandSnapshot, FibonacciLevels};
use crate::models::MarketSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const POLICY_VERSION: &str = "v1";

// --- Policy ---

/// `< oversold_below` oversold, `..= neutral_max` neutral, `..= hold_max` hold, above overbought.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RsiThresholds {
    pub oversold_below: f64,
    pub neutral_max: f64,
    pub hold_max: f64,
}

impl Default for RsiThresholds {
    fn default() -> Self {
        Self {
            oversold_below: 25.0,
            neutral_max: 50.0,
            hold_max: 75.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MacdThresholds {
    /// Histogram values strictly above this are bullish.
    pub bullish_above: f64,
}

impl Default for MacdThresholds {
    fn default() -> Self {
        Self { bullish_above: 0.0 }
    }
}

/// Retracement ratios bounding the neutral zone (inclusive on both ends).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FibonacciThresholds {
    pub buy_below_ratio: f64,
    pub sell_above_ratio: f64,
}

impl Default for FibonacciThresholds {
    fn default() -> Self {
        Self {
            buy_below_ratio: 0.382,
            sell_above_ratio: 0.618,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SnapshotThresholds {
    pub severe_decline_below_pct: f64,
    pub high_volatility_above_pct: f64,
    pub strong_volume_above: f64,
}

impl Default for SnapshotThresholds {
    fn default() -> Self {
        Self {
            severe_decline_below_pct: -10.0,
            high_volatility_above_pct: 10.0,
            strong_volume_above: 10_000.0,
        }
    }
}

/// Versioned threshold table for every rule set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InterpretationPolicy {
    pub version: String,
    pub rsi: RsiThresholds,
    pub macd: MacdThresholds,
    pub fibonacci: FibonacciThresholds,
    pub snapshot: SnapshotThresholds,
}

impl Default for InterpretationPolicy {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            rsi: RsiThresholds::default(),
            macd: MacdThresholds::default(),
            fibonacci: FibonacciThresholds::default(),
            snapshot: SnapshotThresholds::default(),
        }
    }
}

impl InterpretationPolicy {
    /// Rejects tables whose ranges overlap or are out of order.
    pub fn validate(&self) -> Result<()> {
        let rsi = &self.rsi;
        if !(rsi.oversold_below <= rsi.neutral_max && rsi.neutral_max <= rsi.hold_max) {
            return Err(AnalysisError::invalid_parameter(format!(
                "RSI thresholds out of order: {} / {} / {}",
                rsi.oversold_below, rsi.neutral_max, rsi.hold_max
            )));
        }
        let fib = &self.fibonacci;
        if !(fib.buy_below_ratio <= fib.sell_above_ratio) {
            return Err(AnalysisError::invalid_parameter(format!(
                "Fibonacci ratios out of order: {} / {}",
                fib.buy_below_ratio, fib.sell_above_ratio
            )));
        }
        let snap = &self.snapshot;
        if !(snap.severe_decline_below_pct <= snap.high_volatility_above_pct) {
            return Err(AnalysisError::invalid_parameter(format!(
                "price change thresholds out of order: {} / {}",
                snap.severe_decline_below_pct, snap.high_volatility_above_pct
            )));
        }
        if !self.macd.bullish_above.is_finite() || !snap.strong_volume_above.is_finite() {
            return Err(AnalysisError::invalid_parameter("thresholds must be finite"));
        }
        Ok(())
    }
}

// --- Signals ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RsiSignal {
    Oversold,
    Neutral,
    Hold,
    Overbought,
}

impl RsiSignal {
    pub fn comment(&self) -> &'static str {
        match self {
            RsiSignal::Oversold => "RSI low, oversold. Possible buying opportunity.",
            RsiSignal::Neutral => "RSI neutral. Keep watching.",
            RsiSignal::Hold => "RSI elevated. Hold the current position.",
            RsiSignal::Overbought => "RSI very high, overbought. Consider selling.",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MacdSignal {
    Bullish,
    Bearish,
}

impl MacdSignal {
    pub fn comment(&self) -> &'static str {
        match self {
            MacdSignal::Bullish => "MACD positive, upward momentum. Possible buying opportunity.",
            MacdSignal::Bearish => "MACD negative, downward momentum. Consider selling.",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FibonacciZone {
    BuyZone,
    Neutral,
    SellZone,
}

impl FibonacciZone {
    pub fn comment(&self) -> &'static str {
        match self {
            FibonacciZone::BuyZone => "Price at low levels, buying opportunity.",
            FibonacciZone::Neutral => "Price in the neutral zone, keep watching.",
            FibonacciZone::SellZone => "Price at high levels, consider selling.",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BollingerSignal {
    BelowLower,
    Inside,
    AboveUpper,
}

impl BollingerSignal {
    pub fn comment(&self) -> &'static str {
        match self {
            BollingerSignal::BelowLower => {
                "Price below the lower Bollinger band, possible buying opportunity."
            }
            BollingerSignal::Inside => "Price inside the Bollinger bands, neutral.",
            BollingerSignal::AboveUpper => "Price above the upper Bollinger band, consider selling.",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PriceChangeSignal {
    SevereDecline,
    HighVolatility,
    Normal,
}

impl PriceChangeSignal {
    pub fn comment(&self) -> &'static str {
        match self {
            PriceChangeSignal::SevereDecline => "Price under selling pressure. High risk of loss.",
            PriceChangeSignal::HighVolatility => "Price rising sharply. High volatility.",
            PriceChangeSignal::Normal => "Price change normal.",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSignal {
    Strong,
    WeakLiquidity,
}

impl VolumeSignal {
    pub fn comment(&self) -> &'static str {
        match self {
            VolumeSignal::Strong => "High volume, market strong.",
            VolumeSignal::WeakLiquidity => "Low volume, weak liquidity.",
        }
    }
}

macro_rules! display_as_comment {
    ($($signal:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $signal {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.comment())
                }
            }
        )+
    };
}

display_as_comment!(
    RsiSignal,
    MacdSignal,
    FibonacciZone,
    BollingerSignal,
    PriceChangeSignal,
    VolumeSignal,
);

/// Interpreted view of a [`MarketSnapshot`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotAnalysis {
    pub price_change_percent: f64,
    pub price_change_signal: PriceChangeSignal,
    pub volume: f64,
    pub volume_signal: VolumeSignal,
    pub high_price: f64,
    pub low_price: f64,
    pub weighted_avg_price: f64,
    pub last_price: f64,
    pub avg_volume: Option<f64>,
    /// `high_price - low_price`.
    pub volatility: f64,
    /// Volatility relative to the weighted average price; absent when that price is zero.
    pub volatility_percent: Option<f64>,
}

// --- Interpreter ---

#[derive(Debug, Clone)]
pub struct SignalInterpreter {
    policy: InterpretationPolicy,
}

impl SignalInterpreter {
    pub fn new(policy: InterpretationPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &InterpretationPolicy {
        &self.policy
    }

    pub fn rsi(&self, value: f64) -> RsiSignal {
        let t = &self.policy.rsi;
        if value < t.oversold_below {
            RsiSignal::Oversold
        } else if value <= t.neutral_max {
            RsiSignal::Neutral
        } else if value <= t.hold_max {
            RsiSignal::Hold
        } else {
            RsiSignal::Overbought
        }
    }

    /// Judged on the latest histogram value.
    pub fn macd(&self, histogram: f64) -> MacdSignal {
        if histogram > self.policy.macd.bullish_above {
            MacdSignal::Bullish
        } else {
            MacdSignal::Bearish
        }
    }

    pub fn fibonacci(&self, levels: &FibonacciLevels, close: f64) -> FibonacciZone {
        let buy_below = levels.level_at(self.policy.fibonacci.buy_below_ratio);
        let sell_above = levels.level_at(self.policy.fibonacci.sell_above_ratio);
        if close < buy_below {
            FibonacciZone::BuyZone
        } else if close <= sell_above {
            FibonacciZone::Neutral
        } else {
            FibonacciZone::SellZone
        }
    }

    pub fn bollinger(&self, bands: &BandSnapshot, close: f64) -> BollingerSignal {
        if close < bands.lower {
            BollingerSignal::BelowLower
        } else if close > bands.upper {
            BollingerSignal::AboveUpper
        } else {
            BollingerSignal::Inside
        }
    }

    pub fn snapshot(&self, snapshot: &MarketSnapshot) -> SnapshotAnalysis {
        let t = &self.policy.snapshot;
        let price_change_signal = if snapshot.price_change_percent < t.severe_decline_below_pct {
            PriceChangeSignal::SevereDecline
        } else if snapshot.price_change_percent > t.high_volatility_above_pct {
            PriceChangeSignal::HighVolatility
        } else {
            PriceChangeSignal::Normal
        };
        let volume_signal = if snapshot.volume > t.strong_volume_above {
            VolumeSignal::Strong
        } else {
            VolumeSignal::WeakLiquidity
        };

        let volatility = snapshot.high_price - snapshot.low_price;
        let volatility_percent = if snapshot.weighted_avg_price == 0.0 {
            None
        } else {
            Some(volatility / snapshot.weighted_avg_price * 100.0)
        };

        SnapshotAnalysis {
            price_change_percent: snapshot.price_change_percent,
            price_change_signal,
            volume: snapshot.volume,
            volume_signal,
            high_price: snapshot.high_price,
            low_price: snapshot.low_price,
            weighted_avg_price: snapshot.weighted_avg_price,
            last_price: snapshot.last_price,
            avg_volume: snapshot.avg_volume,
            volatility,
            volatility_percent,
        }
    }
}
