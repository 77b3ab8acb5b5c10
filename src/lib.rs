//! Indicator and interpretation engine for a crypto screener.
//!
//! Price series and market snapshots go in; per-symbol analyses with trend,
//! RSI, MACD, Bollinger, Fibonacci and forecast readings come out, and are then
//! ranked across the batch into top and worst candidates.

pub mod analysis;
pub mod error;
pub mod filter_utils;
pub mod indicators;
pub mod interpret;
pub mod models;
pub mod ranking;
pub mod report;
pub mod storage_utils;
pub mod trend;

pub use analysis::{AnalysisResult, AnalyzerConfig, BatchOutcome, SymbolAnalyzer, SymbolFailure};
pub use error::AnalysisError;
pub use filter_utils::UniverseFilter;
pub use interpret::{InterpretationPolicy, SignalInterpreter};
pub use models::{MarketSnapshot, PriceBar, Series, SymbolInput};
pub use ranking::{MissingAvgVolume, PortfolioRanker, Ranking, RankingPolicy};
pub use trend::Trend;
