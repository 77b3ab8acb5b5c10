//! Per-symbol analysis: runs every indicator over one series, classifies the
//! trend and interprets each result into a single [`AnalysisResult`].

use crate::error::{AnalysisError, Result};
use crate::indicators::{self, BandSnapshot, FibonacciLevels, Forecast};
use crate::interpret::{
    BollingerSignal, FibonacciZone, InterpretationPolicy, MacdSignal, RsiSignal, SignalInterpreter,
    SnapshotAnalysis,
};
use crate::models::{MarketSnapshot, Series, SymbolInput};
use crate::trend::{self, Trend};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

// --- Configuration ---

/// Indicator periods used by [`SymbolAnalyzer`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub rsi_period: usize,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
        }
    }
}

impl AnalyzerConfig {
    /// Shortest series every configured indicator accepts.
    pub fn required_bars(&self) -> usize {
        self.rsi_period
            .saturating_add(1)
            .max(self.bollinger_period)
            .max(self.macd_long)
            .max(2)
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_short", self.macd_short),
            ("macd_long", self.macd_long),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(AnalysisError::invalid_parameter(format!("{name} must be positive")));
        }
        if self.rsi_period.checked_add(1).is_none() {
            return Err(AnalysisError::invalid_parameter("rsi_period is too large"));
        }
        if self.macd_short >= self.macd_long {
            return Err(AnalysisError::invalid_parameter(
                "macd_short must be below macd_long",
            ));
        }
        if !self.bollinger_multiplier.is_finite() || self.bollinger_multiplier < 0.0 {
            return Err(AnalysisError::invalid_parameter(
                "bollinger_multiplier must be a non-negative number",
            ));
        }
        Ok(())
    }
}

// --- Result Record ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndicatorReading<S> {
    pub value: f64,
    pub signal: S,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FibonacciReading {
    pub levels: FibonacciLevels,
    pub signal: FibonacciZone,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BollingerReading {
    #[serde(flatten)]
    pub bands: BandSnapshot,
    pub signal: BollingerSignal,
}

/// Everything computed for one symbol in one run. Never mutated after construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub symbol: String,
    /// Open time of the newest bar, in epoch milliseconds.
    pub as_of: i64,
    pub average_price: f64,
    pub last_close: f64,
    pub trend: Trend,
    pub rsi: IndicatorReading<RsiSignal>,
    /// Latest MACD histogram value.
    pub macd: IndicatorReading<MacdSignal>,
    pub fibonacci: FibonacciReading,
    pub bollinger: BollingerReading,
    pub trailing_stop: f64,
    pub snapshot_analysis: Option<SnapshotAnalysis>,
    pub forecasts: Forecast,
}

impl AnalysisResult {
    fn ensure_finite(&self) -> Result<()> {
        let mut fields = vec![
            ("average_price", self.average_price),
            ("last_close", self.last_close),
            ("rsi", self.rsi.value),
            ("macd", self.macd.value),
            ("fibonacci.level_0", self.fibonacci.levels.level_0),
            ("fibonacci.level_38_2", self.fibonacci.levels.level_38_2),
            ("fibonacci.level_50", self.fibonacci.levels.level_50),
            ("fibonacci.level_61_8", self.fibonacci.levels.level_61_8),
            ("fibonacci.level_100", self.fibonacci.levels.level_100),
            ("bollinger.upper", self.bollinger.bands.upper),
            ("bollinger.mid", self.bollinger.bands.mid),
            ("bollinger.lower", self.bollinger.bands.lower),
            ("trailing_stop", self.trailing_stop),
            ("forecasts.day1", self.forecasts.day1),
            ("forecasts.day3", self.forecasts.day3),
            ("forecasts.day7", self.forecasts.day7),
        ];
        if let Some(s) = &self.snapshot_analysis {
            fields.extend([
                ("snapshot.price_change_percent", s.price_change_percent),
                ("snapshot.volume", s.volume),
                ("snapshot.high_price", s.high_price),
                ("snapshot.low_price", s.low_price),
                ("snapshot.weighted_avg_price", s.weighted_avg_price),
                ("snapshot.last_price", s.last_price),
                ("snapshot.volatility", s.volatility),
            ]);
            fields.extend(s.avg_volume.map(|v| ("snapshot.avg_volume", v)));
            fields.extend(s.volatility_percent.map(|v| ("snapshot.volatility_percent", v)));
        }

        match fields.into_iter().find(|(_, v)| !v.is_finite()) {
            Some((field, _)) => Err(AnalysisError::NonFiniteValue { field }),
            None => Ok(()),
        }
    }
}

/// A symbol that could not be analyzed, kept so the report can list it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SymbolFailure {
    pub symbol: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: AnalysisError,
}

fn serialize_display<S: Serializer>(error: &AnalysisError, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<SymbolFailure>,
}

// --- Analyzer ---

/// Runs the indicator pipeline for one symbol. The market snapshot is optional;
/// without it the result simply has no `snapshot_analysis`.
#[derive(Debug, Clone)]
pub struct SymbolAnalyzer {
    config: AnalyzerConfig,
    interpreter: SignalInterpreter,
}

impl SymbolAnalyzer {
    pub fn new(config: AnalyzerConfig, policy: InterpretationPolicy) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            interpreter: SignalInterpreter::new(policy)?,
        })
    }

    pub fn policy(&self) -> &InterpretationPolicy {
        self.interpreter.policy()
    }

    pub fn analyze(
        &self,
        symbol: &str,
        series: &Series,
        snapshot: Option<&MarketSnapshot>,
    ) -> Result<AnalysisResult> {
        let required = self.config.required_bars();
        if series.len() < required {
            return Err(AnalysisError::insufficient("analysis", required, series.len()));
        }

        let cfg = &self.config;
        let closes = series.closes();
        let bars = series.bars();
        let last_close = closes[closes.len() - 1];

        // 1. Numeric transforms
        let average_price = indicators::average_price(&closes)?;
        let rsi = indicators::rsi(cfg.rsi_period, &closes)?;
        let macd = indicators::macd(cfg.macd_short, cfg.macd_long, cfg.macd_signal, &closes)?
            .latest_histogram()
            .ok_or_else(|| AnalysisError::insufficient("MACD", 1, 0))?;
        let levels = indicators::fibonacci(bars)?;
        let bands = indicators::bollinger(cfg.bollinger_period, cfg.bollinger_multiplier, &closes)?
            .latest()
            .ok_or_else(|| AnalysisError::insufficient("Bollinger", cfg.bollinger_period, 0))?;
        let trailing_stop = indicators::trailing_stop_approx(&bars[bars.len() - 1..])[0];
        let forecasts = indicators::linear_forecast(&closes)?;
        let trend = trend::classify(&closes)?;

        // 2. Interpretation
        let interpreter = &self.interpreter;
        let result = AnalysisResult {
            symbol: symbol.to_string(),
            as_of: bars[bars.len() - 1].timestamp,
            average_price,
            last_close,
            trend,
            rsi: IndicatorReading {
                value: rsi,
                signal: interpreter.rsi(rsi),
            },
            macd: IndicatorReading {
                value: macd,
                signal: interpreter.macd(macd),
            },
            fibonacci: FibonacciReading {
                levels,
                signal: interpreter.fibonacci(&levels, last_close),
            },
            bollinger: BollingerReading {
                bands,
                signal: interpreter.bollinger(&bands, last_close),
            },
            trailing_stop,
            snapshot_analysis: snapshot.map(|s| interpreter.snapshot(s)),
            forecasts,
        };

        // 3. Nothing non-finite leaves the engine
        result.ensure_finite()?;

        debug!(
            symbol,
            trend = %result.trend,
            rsi = result.rsi.value,
            macd = result.macd.value,
            "Analyzed symbol"
        );
        Ok(result)
    }

    /// Validates and analyzes one raw input.
    pub fn analyze_input(&self, input: SymbolInput) -> Result<AnalysisResult> {
        let series = Series::new(input.bars)?;
        self.analyze(&input.symbol, &series, input.snapshot.as_ref())
    }

    /// Analyzes every input to completion. A failing symbol is recorded and
    /// skipped; it never aborts the rest of the batch.
    pub fn analyze_batch<I>(&self, inputs: I) -> BatchOutcome
    where
        I: IntoIterator<Item = SymbolInput>,
    {
        let mut outcome = BatchOutcome::default();

        for input in inputs {
            let symbol = input.symbol.clone();
            match self.analyze_input(input) {
                Ok(result) => outcome.results.push(result),
                Err(error) => {
                    warn!(symbol = %symbol, error = %error, "Skipping symbol");
                    outcome.failures.push(SymbolFailure { symbol, error });
                }
            }
        }

        info!(
            analyzed = outcome.results.len(),
            failed = outcome.failures.len(),
            "Batch analysis complete"
        );
        outcome
    }
}
