// =============================================================================
// Indicator Chart — three stacked panels in the terminal
// =============================================================================
//
// Renders the stored rows as a full-screen chart: close + SMA with
// above/below markers on top, RSI with its 70/30 guide lines in the middle,
// MACD + signal + histogram at the bottom. All panels share the same time
// axis (epoch seconds).
//
// `ChartData::prepare` is a pure projection from rows to plot points and is
// where missing values get skipped; `show` owns the terminal for as long as
// the chart is on screen and returns when the user dismisses it with q, Esc,
// or Ctrl-C.
// =============================================================================

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType};
use ratatui::{Frame, Terminal};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::types::{ChartRow, Coin};

/// Plot-ready projection of the stored rows.
///
/// Every vector holds (epoch seconds, value) points with missing values
/// already filtered out, so the render pass never sees an undefined position.
pub struct ChartData {
    price_title: String,
    rsi_title: String,
    macd_title: String,
    sma_label: String,

    close: Vec<(f64, f64)>,
    sma: Vec<(f64, f64)>,
    above_sma: Vec<(f64, f64)>,
    below_sma: Vec<(f64, f64)>,

    rsi: Vec<(f64, f64)>,
    rsi_upper: Vec<(f64, f64)>,
    rsi_lower: Vec<(f64, f64)>,

    macd: Vec<(f64, f64)>,
    signal: Vec<(f64, f64)>,
    hist_pos: Vec<(f64, f64)>,
    hist_neg: Vec<(f64, f64)>,

    x_bounds: [f64; 2],
    x_labels: [String; 3],
    price_bounds: [f64; 2],
    macd_bounds: [f64; 2],
}

impl ChartData {
    // -------------------------------------------------------------------------
    // Data preparation (pure)
    // -------------------------------------------------------------------------

    /// Project `rows` into plot points for the three panels.
    ///
    /// Rows where an indicator is NULL simply contribute no point to that
    /// indicator's dataset; the close line always covers every row.
    pub fn prepare(rows: &[ChartRow], coin: Coin, config: &PipelineConfig) -> Self {
        let xs: Vec<f64> = rows.iter().map(|r| r.timestamp.timestamp() as f64).collect();

        let close: Vec<(f64, f64)> = xs.iter().zip(rows).map(|(&x, r)| (x, r.close)).collect();

        let mut sma = Vec::new();
        let mut above_sma = Vec::new();
        let mut below_sma = Vec::new();
        for (&x, row) in xs.iter().zip(rows) {
            if let Some(s) = row.sma {
                sma.push((x, s));
                // Equality is neither trend: no marker.
                if row.close > s {
                    above_sma.push((x, row.close));
                } else if row.close < s {
                    below_sma.push((x, row.close));
                }
            }
        }

        let rsi: Vec<(f64, f64)> = xs
            .iter()
            .zip(rows)
            .filter_map(|(&x, r)| r.rsi.map(|v| (x, v)))
            .collect();

        let mut macd = Vec::new();
        let mut signal = Vec::new();
        let mut hist_pos = Vec::new();
        let mut hist_neg = Vec::new();
        for (&x, row) in xs.iter().zip(rows) {
            if let Some(m) = row.macd {
                macd.push((x, m));
            }
            if let Some(s) = row.macd_signal {
                signal.push((x, s));
            }
            if let (Some(m), Some(s)) = (row.macd, row.macd_signal) {
                let h = m - s;
                if h >= 0.0 {
                    hist_pos.push((x, h));
                } else {
                    hist_neg.push((x, h));
                }
            }
        }

        let x_bounds = match (xs.first(), xs.last()) {
            (Some(&first), Some(&last)) if last > first => [first, last],
            (Some(&first), _) => [first - 1.0, first + 1.0],
            _ => [0.0, 1.0],
        };

        let date = |row: Option<&ChartRow>| {
            row.map(|r| r.timestamp.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        let x_labels = [
            date(rows.first()),
            date(rows.get(rows.len() / 2)),
            date(rows.last()),
        ];

        let price_bounds = padded_bounds(close.iter().chain(&sma).map(|&(_, y)| y));
        // The histogram draws bars from zero, so zero must be inside the
        // bounds even when every value has the same sign.
        let macd_bounds = padded_bounds(
            macd.iter()
                .chain(&signal)
                .chain(&hist_pos)
                .chain(&hist_neg)
                .map(|&(_, y)| y)
                .chain([0.0]),
        );

        debug!(
            rows = rows.len(),
            sma_points = sma.len(),
            rsi_points = rsi.len(),
            macd_points = macd.len(),
            "chart data prepared"
        );

        Self {
            price_title: format!(
                " {coin} ({}) close / SMA({}) ",
                coin.ticker(),
                config.sma_window
            ),
            rsi_title: format!(" RSI({}) ", config.rsi_window),
            macd_title: format!(
                " MACD({}, {}, {}) ",
                config.macd_fast, config.macd_slow, config.macd_signal
            ),
            sma_label: format!("SMA({})", config.sma_window),
            close,
            sma,
            above_sma,
            below_sma,
            rsi,
            rsi_upper: vec![(x_bounds[0], 70.0), (x_bounds[1], 70.0)],
            rsi_lower: vec![(x_bounds[0], 30.0), (x_bounds[1], 30.0)],
            macd,
            signal,
            hist_pos,
            hist_neg,
            x_bounds,
            x_labels,
            price_bounds,
            macd_bounds,
        }
    }

    // -------------------------------------------------------------------------
    // Terminal lifecycle
    // -------------------------------------------------------------------------

    /// Take over the terminal and display the chart until dismissed.
    pub fn show(&self) -> Result<()> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to initialise terminal")?;

        let result = self.run_loop(&mut terminal);

        // Restore the terminal even when the loop errored.
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
        terminal.show_cursor().context("failed to restore cursor")?;

        result
    }

    fn run_loop<B: Backend>(&self, terminal: &mut Terminal<B>) -> Result<()> {
        let tick_rate = Duration::from_millis(100);

        loop {
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    if should_dismiss(key) {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Percentage(30),
                Constraint::Percentage(30),
            ])
            .split(frame.area());

        frame.render_widget(self.price_chart(), chunks[0]);
        frame.render_widget(self.rsi_chart(), chunks[1]);
        frame.render_widget(self.macd_chart(), chunks[2]);
    }

    fn price_chart(&self) -> Chart<'_> {
        let datasets = vec![
            Dataset::default()
                .name("Close")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Cyan))
                .data(&self.close),
            Dataset::default()
                .name(self.sma_label.as_str())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&self.sma),
            Dataset::default()
                .name("above")
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Green))
                .data(&self.above_sma),
            Dataset::default()
                .name("below")
                .marker(Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&self.below_sma),
        ];

        Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.price_title.as_str()),
            )
            .x_axis(self.time_axis())
            .y_axis(value_axis("Price", self.price_bounds))
    }

    fn rsi_chart(&self) -> Chart<'_> {
        let datasets = vec![
            Dataset::default()
                .name("RSI")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Magenta))
                .data(&self.rsi),
            // Guide lines stay out of the legend by carrying no name.
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&self.rsi_upper),
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Green))
                .data(&self.rsi_lower),
        ];

        Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.rsi_title.as_str()),
            )
            .x_axis(self.time_axis())
            .y_axis(value_axis("RSI", [0.0, 100.0]))
    }

    fn macd_chart(&self) -> Chart<'_> {
        let datasets = vec![
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Bar)
                .style(Style::default().fg(Color::Green))
                .data(&self.hist_pos),
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Bar)
                .style(Style::default().fg(Color::Red))
                .data(&self.hist_neg),
            Dataset::default()
                .name("MACD")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Blue))
                .data(&self.macd),
            Dataset::default()
                .name("Signal")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&self.signal),
        ];

        Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.macd_title.as_str()),
            )
            .x_axis(self.time_axis())
            .y_axis(value_axis("MACD", self.macd_bounds))
    }

    fn time_axis(&self) -> Axis<'_> {
        Axis::default()
            .title("Date")
            .style(Style::default().fg(Color::Gray))
            .bounds(self.x_bounds)
            .labels(vec![
                Span::raw(self.x_labels[0].as_str()),
                Span::raw(self.x_labels[1].as_str()),
                Span::raw(self.x_labels[2].as_str()),
            ])
    }
}

fn value_axis(title: &str, bounds: [f64; 2]) -> Axis<'_> {
    Axis::default()
        .title(title)
        .style(Style::default().fg(Color::Gray))
        .bounds(bounds)
        .labels(vec![
            Span::raw(format!("{:.1}", bounds[0])),
            Span::raw(format!("{:.1}", (bounds[0] + bounds[1]) / 2.0)),
            Span::raw(format!("{:.1}", bounds[1])),
        ])
}

fn should_dismiss(key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

/// Min/max of `values` with a 5 % pad on each side; a flat series gets a unit
/// pad so the bounds stay a proper interval, and an empty series falls back
/// to [0, 1].
fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return [0.0, 1.0];
    }

    let span = max - min;
    let pad = if span == 0.0 { 1.0 } else { span * 0.05 };
    [min - pad, max + pad]
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn rows_from(values: &[(f64, Option<f64>, Option<f64>, Option<f64>, Option<f64>)]) -> Vec<ChartRow> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &(close, sma, rsi, macd, macd_signal))| ChartRow {
                id: i as i64 + 1,
                timestamp: start + ChronoDuration::days(i as i64),
                close,
                sma,
                rsi,
                macd,
                macd_signal,
            })
            .collect()
    }

    fn prepare(rows: &[ChartRow]) -> ChartData {
        ChartData::prepare(rows, Coin::Bitcoin, &PipelineConfig::default())
    }

    #[test]
    fn close_covers_all_rows_but_indicators_skip_missing() {
        let rows = rows_from(&[
            (10.0, None, None, None, None),
            (11.0, Some(10.5), None, None, None),
            (12.0, Some(11.0), Some(60.0), Some(0.2), None),
            (13.0, Some(11.5), Some(65.0), Some(0.3), Some(0.25)),
        ]);
        let data = prepare(&rows);

        assert_eq!(data.close.len(), 4);
        assert_eq!(data.sma.len(), 3);
        assert_eq!(data.rsi.len(), 2);
        assert_eq!(data.macd.len(), 2);
        assert_eq!(data.signal.len(), 1);
        // Histogram needs both macd and signal.
        assert_eq!(data.hist_pos.len() + data.hist_neg.len(), 1);
    }

    #[test]
    fn markers_split_on_close_versus_sma() {
        let rows = rows_from(&[
            (12.0, Some(10.0), None, None, None), // above
            (8.0, Some(10.0), None, None, None),  // below
            (10.0, Some(10.0), None, None, None), // equal, no marker
            (9.0, None, None, None, None),        // no sma, no marker
        ]);
        let data = prepare(&rows);

        assert_eq!(data.above_sma.len(), 1);
        assert_eq!(data.below_sma.len(), 1);
        assert_eq!(data.above_sma[0].1, 12.0);
        assert_eq!(data.below_sma[0].1, 8.0);
    }

    #[test]
    fn flat_series_gets_no_trend_markers() {
        // Past warm-up on a constant-price series (a stablecoin), the SMA
        // equals the close exactly at every point.
        let rows = rows_from(&[(1.0, Some(1.0), None, None, None); 5]);
        let data = prepare(&rows);

        assert_eq!(data.sma.len(), 5);
        assert!(data.above_sma.is_empty());
        assert!(data.below_sma.is_empty());
    }

    #[test]
    fn histogram_splits_by_sign() {
        let rows = rows_from(&[
            (1.0, None, None, Some(0.5), Some(0.2)),  // +0.3
            (1.0, None, None, Some(0.1), Some(0.4)),  // -0.3
            (1.0, None, None, Some(0.2), Some(0.2)),  // 0 lands in pos
        ]);
        let data = prepare(&rows);

        assert_eq!(data.hist_pos.len(), 2);
        assert_eq!(data.hist_neg.len(), 1);
        assert!(data.hist_neg[0].1 < 0.0);
    }

    #[test]
    fn macd_bounds_always_include_zero() {
        let rows = rows_from(&[
            (1.0, None, None, Some(2.0), Some(1.5)),
            (1.0, None, None, Some(3.0), Some(2.5)),
        ]);
        let data = prepare(&rows);

        assert!(data.macd_bounds[0] <= 0.0);
        assert!(data.macd_bounds[1] >= 3.0);
    }

    #[test]
    fn x_axis_spans_first_to_last_timestamp() {
        let rows = rows_from(&[
            (1.0, None, None, None, None),
            (2.0, None, None, None, None),
            (3.0, None, None, None, None),
        ]);
        let data = prepare(&rows);

        assert_eq!(data.x_bounds[0], rows[0].timestamp.timestamp() as f64);
        assert_eq!(data.x_bounds[1], rows[2].timestamp.timestamp() as f64);
        assert_eq!(data.x_labels[0], "2024-03-01");
        assert_eq!(data.x_labels[1], "2024-03-02");
        assert_eq!(data.x_labels[2], "2024-03-03");
    }

    #[test]
    fn single_row_still_gets_a_proper_interval() {
        let rows = rows_from(&[(5.0, None, None, None, None)]);
        let data = prepare(&rows);
        assert!(data.x_bounds[0] < data.x_bounds[1]);
        assert!(data.price_bounds[0] < data.price_bounds[1]);
    }

    #[test]
    fn empty_rows_fall_back_to_unit_bounds() {
        let data = prepare(&[]);
        assert!(data.close.is_empty());
        assert_eq!(data.x_bounds, [0.0, 1.0]);
        assert_eq!(data.price_bounds, [0.0, 1.0]);
    }

    #[test]
    fn padded_bounds_pads_five_percent() {
        let bounds = padded_bounds([10.0, 20.0].into_iter());
        assert!((bounds[0] - 9.5).abs() < 1e-12);
        assert!((bounds[1] - 20.5).abs() < 1e-12);
    }

    #[test]
    fn padded_bounds_handles_flat_and_negative_values() {
        assert_eq!(padded_bounds([7.0, 7.0].into_iter()), [6.0, 8.0]);
        let bounds = padded_bounds([-20.0, -10.0].into_iter());
        assert!((bounds[0] - -20.5).abs() < 1e-12);
        assert!((bounds[1] - -9.5).abs() < 1e-12);
    }

    #[test]
    fn rsi_guides_sit_at_70_and_30() {
        let rows = rows_from(&[(1.0, None, Some(50.0), None, None)]);
        let data = prepare(&rows);
        assert!(data.rsi_upper.iter().all(|&(_, y)| y == 70.0));
        assert!(data.rsi_lower.iter().all(|&(_, y)| y == 30.0));
    }
}
