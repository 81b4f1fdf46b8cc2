//! # WattWatch Chart
//! Renders a day of balance readings into a self-contained SVG artifact:
//! balance trend on top, per-interval usage bars below, stats in the corner.
//! SVG is emitted directly; the daily rollup has no GUI to lean on.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use wattwatch_core::error::{Result, WattError};
use wattwatch_core::types::ReadingRecord;
use wattwatch_core::ChartRenderer;
use wattwatch_store::DailySummary;

const WIDTH: f64 = 900.0;
const PANEL_HEIGHT: f64 = 210.0;
const MARGIN: f64 = 50.0;

pub struct SvgChart {
    out_dir: PathBuf,
}

impl SvgChart {
    pub fn new(out_dir: &Path) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
        }
    }

    fn panel_points(values: &[(f64, f64)], y_offset: f64) -> String {
        // values are (x_fraction, y_fraction), both already in 0..=1.
        values
            .iter()
            .map(|(fx, fy)| {
                let x = MARGIN + fx * (WIDTH - 2.0 * MARGIN);
                let y = y_offset + (1.0 - fy) * PANEL_HEIGHT;
                format!("{x:.1},{y:.1}")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ChartRenderer for SvgChart {
    fn render(&self, date: NaiveDate, records: &[ReadingRecord]) -> Result<PathBuf> {
        let summary = DailySummary::from_records(date, records)
            .ok_or_else(|| WattError::Chart("not enough readings to chart".into()))?;

        let balances: Vec<f64> = records.iter().map(|r| r.balance).collect();
        let min_bal = balances.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_bal = balances.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let bal_span = (max_bal - min_bal).max(1e-9);

        let n = records.len();
        let balance_pts: Vec<(f64, f64)> = balances
            .iter()
            .enumerate()
            .map(|(i, b)| (i as f64 / (n - 1) as f64, (b - min_bal) / bal_span))
            .collect();

        let max_usage = summary
            .intervals
            .iter()
            .map(|iv| iv.usage)
            .fold(0.0f64, f64::max)
            .max(1e-9);

        let mut svg = String::with_capacity(4096);
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{total}" viewBox="0 0 {WIDTH} {total}" font-family="sans-serif">"#,
            total = PANEL_HEIGHT * 2.0 + MARGIN * 3.0,
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="30" font-size="18" font-weight="bold">Daily usage report {}</text>"#,
            MARGIN, summary.date
        ));

        // Top panel: balance trend.
        let top = MARGIN;
        svg.push_str(&format!(
            r##"<polyline fill="none" stroke="#c0392b" stroke-width="2" points="{}"/>"##,
            Self::panel_points(&balance_pts, top)
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{:.1}" font-size="12">balance {:.2} to {:.2}</text>"#,
            MARGIN,
            top + PANEL_HEIGHT + 16.0,
            summary.start_balance,
            summary.end_balance,
        ));

        // Bottom panel: usage bars.
        let bottom = MARGIN * 2.0 + PANEL_HEIGHT;
        let bar_w = (WIDTH - 2.0 * MARGIN) / summary.intervals.len() as f64;
        for (i, iv) in summary.intervals.iter().enumerate() {
            let h = iv.usage / max_usage * PANEL_HEIGHT;
            let x = MARGIN + i as f64 * bar_w;
            let y = bottom + PANEL_HEIGHT - h;
            svg.push_str(&format!(
                r##"<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{h:.1}" fill="#2980b9"/>"##,
                w = (bar_w - 2.0).max(1.0),
            ));
        }
        svg.push_str(&format!(
            r#"<text x="{}" y="{:.1}" font-size="12">total usage {:.2} over {} intervals</text>"#,
            MARGIN,
            bottom + PANEL_HEIGHT + 16.0,
            summary.total_usage,
            summary.intervals.len(),
        ));
        svg.push_str("</svg>");

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("daily_usage_{}.svg", summary.date));
        std::fs::write(&path, svg)?;
        tracing::info!("📊 Chart rendered: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(balance: f64, hour: u32) -> ReadingRecord {
        ReadingRecord {
            id: None,
            balance,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap(),
            run_id: "run-t".into(),
        }
    }

    #[test]
    fn test_render_writes_svg() {
        let dir = std::env::temp_dir().join("wattwatch-test-chart");
        let chart = SvgChart::new(&dir);
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let records = vec![reading(500.0, 0), reading(498.0, 1), reading(493.5, 2)];

        let path = chart.render(date, &records).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("polyline"));
        assert!(content.contains("2026-03-10"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_render_rejects_single_reading() {
        let dir = std::env::temp_dir().join("wattwatch-test-chart-empty");
        let chart = SvgChart::new(&dir);
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(chart.render(date, &[reading(500.0, 0)]).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
