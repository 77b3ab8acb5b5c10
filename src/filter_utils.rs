use crate::models::{MarketSnapshot, SymbolInput};
use serde::{Deserialize, Serialize};

/// Decides which symbols are worth analyzing at all.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UniverseFilter {
    pub enabled: bool,
    pub quote_asset: String,
    /// Leveraged-token suffixes that are never analyzed.
    pub excluded_suffixes: Vec<String>,
    pub min_volume: f64,
    pub min_quote_volume: f64,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            quote_asset: "USDT".to_string(),
            excluded_suffixes: ["DOWNUSDT", "BULLUSDT", "BEARUSDT", "UPUSDT"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_volume: 10_000_000.0,
            min_quote_volume: 10_000_000.0,
        }
    }
}

impl UniverseFilter {
    pub fn matches(&self, symbol: &str, snapshot: Option<&MarketSnapshot>) -> bool {
        if !self.enabled {
            return true;
        }

        // 1. Name rules
        if !symbol.ends_with(&self.quote_asset) {
            return false;
        }
        if self.excluded_suffixes.iter().any(|s| symbol.ends_with(s.as_str())) {
            return false;
        }

        // 2. Liquidity rules; a zero threshold switches the rule off
        let volume = snapshot.map(|s| s.volume);
        let quote_volume = snapshot.and_then(|s| s.quote_volume);
        meets_minimum(volume, self.min_volume) && meets_minimum(quote_volume, self.min_quote_volume)
    }

    /// Keeps the inputs that pass, preserving their order.
    pub fn apply(&self, inputs: Vec<SymbolInput>) -> Vec<SymbolInput> {
        inputs
            .into_iter()
            .filter(|input| self.matches(&input.symbol, input.snapshot.as_ref()))
            .collect()
    }
}

fn meets_minimum(value: Option<f64>, minimum: f64) -> bool {
    if minimum <= 0.0 {
        return true;
    }
    match value {
        Some(v) => v >= minimum,
        None => false,
    }
}
