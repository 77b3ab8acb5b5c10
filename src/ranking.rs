//! Cross-symbol ordering and top/worst selection.

use crate::analysis::AnalysisResult;
use crate::interpret::SnapshotAnalysis;
use crate::trend::Trend;
use serde::{Deserialize, Serialize};
use tracing::info;

// --- Policy ---

/// What to do when a snapshot has no average volume to compare against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingAvgVolume {
    /// The symbol is not eligible for top/worst.
    #[default]
    Exclude,
    /// The volume rule is ignored; the other rules still apply.
    SkipVolumeRule,
}

/// `Uptrend`, RSI in `(rsi_above, rsi_max]`, price change above
/// `price_change_above`, volume above `volume_ratio_above × avg_volume`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TopRule {
    pub rsi_above: f64,
    pub rsi_max: f64,
    pub price_change_above: f64,
    pub volume_ratio_above: f64,
}

impl Default for TopRule {
    fn default() -> Self {
        Self {
            rsi_above: 50.0,
            rsi_max: 70.0,
            price_change_above: 1.0,
            volume_ratio_above: 1.2,
        }
    }
}

/// `Downtrend`, RSI in `[rsi_min, rsi_below)`, price change below
/// `price_change_below`, volume below `volume_ratio_below × avg_volume`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorstRule {
    pub rsi_min: f64,
    pub rsi_below: f64,
    pub price_change_below: f64,
    pub volume_ratio_below: f64,
}

impl Default for WorstRule {
    fn default() -> Self {
        Self {
            rsi_min: 30.0,
            rsi_below: 50.0,
            price_change_below: -1.0,
            volume_ratio_below: 0.8,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RankingPolicy {
    /// Maximum entries in each of the top and worst lists.
    pub limit: usize,
    pub top: TopRule,
    pub worst: WorstRule,
    pub missing_avg_volume: MissingAvgVolume,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            top: TopRule::default(),
            worst: WorstRule::default(),
            missing_avg_volume: MissingAvgVolume::default(),
        }
    }
}

// --- Ranking ---

#[derive(Serialize, Debug, Clone)]
pub struct Ranking<'a> {
    /// Every result, by symbol ascending.
    pub all: Vec<&'a AnalysisResult>,
    /// Strongest candidates, MACD descending.
    pub top: Vec<&'a AnalysisResult>,
    /// Weakest candidates, MACD ascending.
    pub worst: Vec<&'a AnalysisResult>,
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioRanker {
    policy: RankingPolicy,
}

impl PortfolioRanker {
    pub fn new(policy: RankingPolicy) -> Self {
        Self { policy }
    }

    /// Input order is irrelevant. All sorts are stable, so MACD ties keep
    /// symbol order.
    pub fn rank<'a>(&self, results: &'a [AnalysisResult]) -> Ranking<'a> {
        let mut all: Vec<&AnalysisResult> = results.iter().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut top: Vec<&AnalysisResult> =
            all.iter().copied().filter(|r| self.is_top(r)).collect();
        top.sort_by(|a, b| b.macd.value.total_cmp(&a.macd.value));
        top.truncate(self.policy.limit);

        let mut worst: Vec<&AnalysisResult> =
            all.iter().copied().filter(|r| self.is_worst(r)).collect();
        worst.sort_by(|a, b| a.macd.value.total_cmp(&b.macd.value));
        worst.truncate(self.policy.limit);

        info!(
            total = all.len(),
            top = top.len(),
            worst = worst.len(),
            "Ranked batch"
        );
        Ranking { all, top, worst }
    }

    fn is_top(&self, result: &AnalysisResult) -> bool {
        let rule = &self.policy.top;
        let Some(snapshot) = &result.snapshot_analysis else {
            return false;
        };
        result.trend == Trend::Uptrend
            && result.rsi.value > rule.rsi_above
            && result.rsi.value <= rule.rsi_max
            && snapshot.price_change_percent > rule.price_change_above
            && self.volume_rule(snapshot, |avg| snapshot.volume > rule.volume_ratio_above * avg)
    }

    fn is_worst(&self, result: &AnalysisResult) -> bool {
        let rule = &self.policy.worst;
        let Some(snapshot) = &result.snapshot_analysis else {
            return false;
        };
        result.trend == Trend::Downtrend
            && result.rsi.value >= rule.rsi_min
            && result.rsi.value < rule.rsi_below
            && snapshot.price_change_percent < rule.price_change_below
            && self.volume_rule(snapshot, |avg| snapshot.volume < rule.volume_ratio_below * avg)
    }

    fn volume_rule(&self, snapshot: &SnapshotAnalysis, passes: impl Fn(f64) -> bool) -> bool {
        match snapshot.avg_volume {
            Some(avg) => passes(avg),
            None => self.policy.missing_avg_volume == MissingAvgVolume::SkipVolumeRule,
        }
    }
}
