//! Reporting and export: JSON and CSV artifacts for backtest reports.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: the trade tape for external analysis tools
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::backtest::{BacktestReport, BacktestTrade, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestReport` to pretty JSON.
pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BacktestReport to JSON")
}

/// Deserialize a `BacktestReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize BacktestReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: side, entry_time, exit_time, entry_price, exit_price, units,
/// reason, pnl, balance_after
pub fn export_trades_csv(trades: &[BacktestTrade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_time",
        "exit_time",
        "entry_price",
        "exit_price",
        "units",
        "reason",
        "pnl",
        "balance_after",
    ])?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side).to_uppercase(),
            &t.entry_time.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.2}", t.entry_price),
            &format!("{:.2}", t.exit_price),
            &format!("{:.6}", t.units),
            &format!("{:?}", t.reason),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.balance_after),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one report.
///
/// Creates `{symbol}_{timestamp}/` under `output_dir` containing
/// `report.json` and `trades.csv`. Returns the created directory.
pub fn save_report(report: &BacktestReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        report.symbol.replace('/', "_"),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&report.trades)?)?;

    Ok(run_dir)
}

/// Load a `BacktestReport` from an artifact directory's report.json.
pub fn load_report(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sniper_core::position::ExitReason;
    use sniper_core::TradeState;

    fn sample_report() -> BacktestReport {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        BacktestReport {
            schema_version: SCHEMA_VERSION,
            symbol: "BTC".into(),
            bar_count: 200,
            warmup: 35,
            trades: vec![BacktestTrade {
                side: TradeState::Long,
                entry_time: Some(t0),
                exit_time: t0 + chrono::Duration::minutes(50),
                entry_price: 100.0,
                exit_price: 106.0,
                units: 100.0,
                reason: ExitReason::TakeProfit,
                pnl: 600.0,
                balance_after: 10_600.0,
            }],
            trade_count: 1,
            wins: 1,
            win_rate: 100.0,
            initial_balance: 10_000.0,
            final_equity: 10_600.0,
            total_return_pct: 6.0,
            open_position: None,
            config_hash: "abc".into(),
            dataset_hash: "def".into(),
        }
    }

    #[test]
    fn json_round_trip() {
        let report = sample_report();
        let json = export_json(&report).unwrap();
        assert_eq!(import_json(&json).unwrap(), report);
    }

    #[test]
    fn future_schema_is_rejected() {
        let mut report = sample_report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn trades_csv_has_header_and_rows() {
        let csv = export_trades_csv(&sample_report().trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("side,entry_time,exit_time"));
        assert!(lines[1].starts_with("LONG,2024-01-02T14:30:00+00:00"));
        assert!(lines[1].contains("TakeProfit"));
    }

    #[test]
    fn save_and_load_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();
        let run_dir = save_report(&report, dir.path()).unwrap();
        assert!(run_dir.join("trades.csv").exists());
        assert_eq!(load_report(&run_dir).unwrap(), report);
    }
}
