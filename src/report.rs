use crate::analysis::{AnalysisResult, SymbolFailure};
use crate::ranking::Ranking;
use crate::trend::Trend;
use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Include the RSI/MACD/Fibonacci/Bollinger commentary columns in the full table.
    pub show_comments: bool,
    /// Row cap for the full table; 0 shows every symbol.
    pub max_rows: usize,
    /// Wrap cells to the terminal width.
    pub wrap: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            show_comments: true,
            max_rows: 0,
            wrap: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shade {
    Top,
    Worst,
}

// --- Formatting Helpers ---

/// 1.5B / 2.3M / 4.0K style volumes.
pub fn format_large_number(num: f64) -> String {
    let abs = num.abs();
    if abs >= 1.0e9 {
        format!("{:.1}B", num / 1.0e9)
    } else if abs >= 1.0e6 {
        format!("{:.1}M", num / 1.0e6)
    } else if abs >= 1.0e3 {
        format!("{:.1}K", num / 1.0e3)
    } else {
        num.to_string()
    }
}

fn format_timestamp(ts_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ts_ms) {
        Some(dt) => dt.format("%d-%m-%Y %H:%M:%S").to_string(),
        None => "Unknown Time".to_string(),
    }
}

fn get_visibility_ratio(current: f64, leader: f64) -> f64 {
    let leader = if leader == 0.0 { 1.0 } else { leader };
    (0.4 + 0.6 * (current / leader)).clamp(0.4, 1.0)
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::Uptrend => Color::Green,
        Trend::Downtrend => Color::Red,
        Trend::Flat => Color::DarkGrey,
    }
}

fn new_table(headers: &[&str], config: &ReportConfig) -> Table {
    let arrangement = if config.wrap {
        ContentArrangement::Dynamic
    } else {
        ContentArrangement::Disabled
    };
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(arrangement)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn number(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{:.*}", decimals, value)).set_alignment(CellAlignment::Right)
}

fn snapshot_cells(result: &AnalysisResult) -> Vec<Cell> {
    match &result.snapshot_analysis {
        Some(s) => vec![
            number(s.price_change_percent, 2),
            Cell::new(format_large_number(s.volume)).set_alignment(CellAlignment::Right),
            number(s.volatility, 2),
        ],
        None => (0..3).map(|_| Cell::new("N/A").fg(Color::DarkGrey)).collect(),
    }
}

fn forecast_cells(result: &AnalysisResult) -> Vec<Cell> {
    vec![
        number(result.forecasts.day1, 4),
        number(result.forecasts.day3, 4),
        number(result.forecasts.day7, 4),
    ]
}

// --- Tables ---

fn all_symbols_table(results: &[&AnalysisResult], config: &ReportConfig) -> Table {
    let mut headers = vec!["Coin", "Avg Price", "Trend", "RSI"];
    if config.show_comments {
        headers.extend(["RSI Comment", "MACD", "MACD Comment", "Fibonacci", "Bollinger"]);
    } else {
        headers.push("MACD");
    }
    headers.extend(["Change (%)", "Volume", "Volatility", "1 Day", "3 Days", "7 Days"]);
    let mut table = new_table(&headers, config);

    let limit = if config.max_rows == 0 {
        results.len()
    } else {
        config.max_rows
    };

    for result in results.iter().take(limit) {
        let mut row = vec![
            Cell::new(&result.symbol).add_attribute(Attribute::Bold),
            number(result.average_price, 4),
            Cell::new(result.trend).fg(trend_color(result.trend)),
            number(result.rsi.value, 2),
        ];
        if config.show_comments {
            row.extend([
                Cell::new(result.rsi.signal),
                number(result.macd.value, 2),
                Cell::new(result.macd.signal),
                Cell::new(result.fibonacci.signal),
                Cell::new(result.bollinger.signal),
            ]);
        } else {
            row.push(number(result.macd.value, 2));
        }
        row.extend(snapshot_cells(result));
        row.extend(forecast_cells(result));
        table.add_row(row);
    }
    table
}

fn candidates_table(results: &[&AnalysisResult], shade: Shade, config: &ReportConfig) -> Table {
    let mut table = new_table(
        &[
            "Rank",
            "Coin",
            "Avg Price",
            "Trend",
            "RSI",
            "MACD",
            "Change (%)",
            "Volume",
            "Volatility",
            "1 Day",
            "3 Days",
            "7 Days",
        ],
        config,
    );

    let leader = results.first().map_or(1.0, |r| r.macd.value);

    for (i, result) in results.iter().enumerate() {
        let ratio = get_visibility_ratio(result.macd.value, leader);
        let bright = (255.0 * ratio) as u8;
        let symbol_color = match shade {
            Shade::Top => Color::Rgb {
                r: 0,
                g: bright,
                b: bright,
            },
            Shade::Worst => Color::Rgb {
                r: bright,
                g: 0,
                b: 0,
            },
        };

        let mut row = vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&result.symbol).fg(symbol_color),
            number(result.average_price, 4),
            Cell::new(result.trend).fg(trend_color(result.trend)),
            number(result.rsi.value, 2),
            number(result.macd.value, 4),
        ];
        row.extend(snapshot_cells(result));
        row.extend(forecast_cells(result));
        table.add_row(row);
    }
    table
}

fn failures_table(failures: &[SymbolFailure], config: &ReportConfig) -> Table {
    let mut table = new_table(&["Coin", "Reason"], config);
    for failure in failures {
        table.add_row(vec![
            Cell::new(&failure.symbol),
            Cell::new(&failure.error).fg(Color::Yellow),
        ]);
    }
    table
}

/// Renders the full report as printable text. The title carries the newest
/// bar time across the batch.
pub fn render_report(
    ranking: &Ranking<'_>,
    failures: &[SymbolFailure],
    config: &ReportConfig,
) -> String {
    let mut out = match ranking.all.iter().map(|r| r.as_of).max() {
        Some(ts) => format!("(Data taken at {} UTC)\n", format_timestamp(ts)),
        None => "(No data analyzed)\n".to_string(),
    };

    out.push_str("\nAll Symbols\n");
    out.push_str(&all_symbols_table(&ranking.all, config).to_string());
    out.push('\n');

    out.push_str("\nTop Candidates\n");
    if ranking.top.is_empty() {
        out.push_str("No symbol met the top criteria.\n");
    } else {
        out.push_str(&candidates_table(&ranking.top, Shade::Top, config).to_string());
        out.push('\n');
    }

    out.push_str("\nWorst Candidates\n");
    if ranking.worst.is_empty() {
        out.push_str("No symbol met the worst criteria.\n");
    } else {
        out.push_str(&candidates_table(&ranking.worst, Shade::Worst, config).to_string());
        out.push('\n');
    }

    if !failures.is_empty() {
        out.push_str("\nSkipped Symbols\n");
        out.push_str(&failures_table(failures, config).to_string());
        out.push('\n');
    }

    out
}
