use crate::error::{AnalysisError, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// --- Data Structures ---

/// One OHLCV bar. Decodes from a keyed object or a raw exchange kline array.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "RawBar")]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Checks the OHLC ordering invariant. `index` only feeds the error message.
    pub fn validate(&self, index: usize) -> Result<()> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::invalid_bar(index, format!("{name} is not finite")));
        }
        if self.volume < 0.0 {
            return Err(AnalysisError::invalid_bar(index, "negative volume"));
        }
        if self.high < self.low {
            return Err(AnalysisError::invalid_bar(index, "high below low"));
        }
        if self.high < self.open.max(self.close) {
            return Err(AnalysisError::invalid_bar(index, "high below open/close"));
        }
        if self.low > self.open.min(self.close) {
            return Err(AnalysisError::invalid_bar(index, "low above open/close"));
        }
        Ok(())
    }
}

/// Validated, time-ascending sequence of bars, oldest first.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Series {
    bars: Vec<PriceBar>,
}

impl Series {
    /// Rejects any bar that breaks the OHLC invariant and any timestamp that
    /// does not strictly follow its predecessor.
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        for (index, bar) in bars.iter().enumerate() {
            bar.validate(index)?;
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(AnalysisError::UnorderedSeries { index });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// 24h market summary for a symbol, as published by the exchange ticker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub volume: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub high_price: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub low_price: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub weighted_avg_price: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    pub last_price: f64,
    #[serde(
        default,
        deserialize_with = "deserialize_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub avg_volume: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub quote_volume: Option<f64>,
}

/// Everything the acquisition side hands over for one symbol.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SymbolInput {
    pub symbol: String,
    #[serde(alias = "klines", default)]
    pub bars: Vec<PriceBar>,
    #[serde(alias = "ticker", default)]
    pub snapshot: Option<MarketSnapshot>,
}

// --- Wire Decoding ---

const KLINE_FIELDS: &[&str] = &["openTime", "open", "high", "low", "close", "volume"];

#[derive(Deserialize)]
struct KeyedBar {
    #[serde(alias = "openTime")]
    timestamp: i64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    open: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    high: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    low: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    close: f64,
    #[serde(deserialize_with = "deserialize_f64_required")]
    volume: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBar {
    Keyed(KeyedBar),
    Kline(Vec<Value>),
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl TryFrom<RawBar> for PriceBar {
    type Error = String;

    fn try_from(raw: RawBar) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawBar::Keyed(k) => Ok(PriceBar {
                timestamp: k.timestamp,
                open: k.open,
                high: k.high,
                low: k.low,
                close: k.close,
                volume: k.volume,
            }),
            RawBar::Kline(values) => {
                if values.len() < KLINE_FIELDS.len() {
                    return Err(format!(
                        "kline needs at least {} fields, got {}",
                        KLINE_FIELDS.len(),
                        values.len()
                    ));
                }
                let timestamp = values[0]
                    .as_i64()
                    .ok_or_else(|| "kline field openTime is not an integer".to_string())?;
                let mut prices = [0.0; 5];
                for (slot, (value, name)) in prices
                    .iter_mut()
                    .zip(values[1..].iter().zip(&KLINE_FIELDS[1..]))
                {
                    *slot = value_as_f64(value)
                        .ok_or_else(|| format!("kline field {name} is not numeric"))?;
                }
                let [open, high, low, close, volume] = prices;
                Ok(PriceBar {
                    timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume,
                })
            }
        }
    }
}

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }
}

fn deserialize_f64_lenient<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

fn deserialize_f64_required<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_f64_lenient(deserializer)?
        .ok_or_else(|| de::Error::custom("expected a number, found an empty value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_bar_decodes_from_string_fields() {
        let json = r#"{"timestamp": 1, "open": "1.5", "high": "2", "low": 1, "close": "1.75", "volume": "100"}"#;
        let decoded: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.open, 1.5);
        assert_eq!(decoded.high, 2.0);
        assert_eq!(decoded.close, 1.75);
        assert_eq!(decoded.volume, 100.0);
    }

    #[test]
    fn test_bar_decodes_from_kline_array() {
        let json = r#"[1700000000000, "10.0", "12.0", "9.5", "11.0", "2500.5", 1700000059999, "0", 10, "0", "0", "0"]"#;
        let decoded: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.timestamp, 1_700_000_000_000);
        assert_eq!(decoded.low, 9.5);
        assert_eq!(decoded.close, 11.0);
        assert_eq!(decoded.volume, 2500.5);
    }

    #[test]
    fn test_short_kline_array_is_rejected() {
        let json = r#"[1700000000000, "10.0", "12.0"]"#;
        assert!(serde_json::from_str::<PriceBar>(json).is_err());
    }

    #[test]
    fn test_snapshot_decodes_ticker_payload() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "priceChangePercent": "-2.5",
            "volume": "12000",
            "quoteVolume": "800000000",
            "highPrice": "70000",
            "lowPrice": "65000",
            "weightedAvgPrice": "67500",
            "lastPrice": "66000",
            "count": 1234
        }"#;
        let snapshot: MarketSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.price_change_percent, -2.5);
        assert_eq!(snapshot.quote_volume, Some(800_000_000.0));
        assert_eq!(snapshot.avg_volume, None);
    }

    #[test]
    fn test_series_rejects_inverted_bar() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 10.5), bar(2, 10.0, 9.0, 11.0, 10.0)];
        let err = Series::new(bars).unwrap_err();
        assert_eq!(err, AnalysisError::invalid_bar(1, "high below low"));
    }

    #[test]
    fn test_series_rejects_close_above_high() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 12.0)];
        assert!(matches!(
            Series::new(bars),
            Err(AnalysisError::InvalidBar { index: 0, .. })
        ));
    }

    #[test]
    fn test_series_rejects_nan() {
        let bars = vec![bar(1, 10.0, 11.0, 9.0, f64::NAN)];
        assert!(matches!(
            Series::new(bars),
            Err(AnalysisError::InvalidBar { index: 0, .. })
        ));
    }

    #[test]
    fn test_series_rejects_out_of_order_timestamps() {
        let bars = vec![bar(2, 10.0, 11.0, 9.0, 10.0), bar(1, 10.0, 11.0, 9.0, 10.0)];
        assert_eq!(
            Series::new(bars).unwrap_err(),
            AnalysisError::UnorderedSeries { index: 1 }
        );
    }

    #[test]
    fn test_series_rejects_low_above_open() {
        let bars = vec![bar(1, 10.0, 12.0, 10.5, 11.0)];
        assert_eq!(
            Series::new(bars).unwrap_err(),
            AnalysisError::invalid_bar(0, "low above open/close")
        );
    }

    #[test]
    fn test_series_rejects_negative_volume() {
        let mut negative = bar(2, 10.0, 11.0, 9.0, 10.0);
        negative.volume = -1.0;
        let bars = vec![bar(1, 10.0, 11.0, 9.0, 10.0), negative];
        assert_eq!(
            Series::new(bars).unwrap_err(),
            AnalysisError::invalid_bar(1, "negative volume")
        );
    }

    #[test]
    fn test_series_rejects_equal_timestamps() {
        let bars = vec![bar(5, 10.0, 11.0, 9.0, 10.0), bar(5, 10.0, 11.0, 9.0, 10.5)];
        assert_eq!(
            Series::new(bars).unwrap_err(),
            AnalysisError::UnorderedSeries { index: 1 }
        );
    }

    #[test]
    fn test_series_closes() {
        let series = Series::new(vec![
            bar(1, 10.0, 11.0, 9.0, 10.0),
            bar(2, 10.0, 12.0, 9.0, 11.0),
        ])
        .unwrap();
        assert_eq!(series.closes(), vec![10.0, 11.0]);
        assert_eq!(series.last_close(), Some(11.0));
    }
}
