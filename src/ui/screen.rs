use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

use super::{bold, dim, frame_rows, italic};
use crate::{App, AppState, Mode, Stimulus};
use nback::{result::SummaryStats, Phase};

/// A UI screen boundary: one per app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

pub struct WaitingScreen;

impl Screen for WaitingScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (header, body, legend) = frame_rows(area, 6);
        let cfg = &app.config;
        let mode = if cfg.timed { Mode::Timed } else { Mode::SelfPaced };

        Paragraph::new(Span::styled(format!("subject: {}", cfg.subject), dim()))
            .alignment(Alignment::Right)
            .render(header, buf);

        let next_hint = if cfg.timed {
            format!("each number shows for {} ms", cfg.tick_interval_ms)
        } else {
            "→ / tab = next number".to_string()
        };

        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{}-back", cfg.n),
                bold().fg(Color::Cyan),
            )),
            Line::from(Span::styled(
                format!(
                    "{} numbers from {} to {} · {}",
                    cfg.sequence_length, cfg.min_number, cfg.max_number, mode
                ),
                dim(),
            )),
            Line::from(""),
            Line::from("enter = target   space = not target"),
            Line::from(Span::styled(next_hint, dim())),
            Line::from(Span::styled(
                "press space to begin",
                bold().add_modifier(Modifier::SLOW_BLINK),
            )),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(body, buf);

        Paragraph::new(Span::styled("(esc)ape", italic())).render(legend, buf);
    }
}

pub struct RunningScreen;

impl Screen for RunningScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (header, body, legend) = frame_rows(area, 3);
        let engine = &app.engine;

        let position = engine.current_index().map_or(0, |i| i + 1);
        let answered =
            if engine.has_result_for_this_tick() && engine.phase() == Phase::AwaitingResponse {
                "  ✓"
            } else {
                ""
            };
        Paragraph::new(Span::styled(
            format!("{}/{}{}", position, engine.sequence().len(), answered),
            dim(),
        ))
        .alignment(Alignment::Right)
        .render(header, buf);

        let stimulus = match app.stimulus {
            Stimulus::Number(n) => Span::styled(n.to_string(), bold().fg(Color::Yellow)),
            Stimulus::Focus => Span::styled("+", bold().fg(Color::Gray)),
            Stimulus::Blank => Span::raw(""),
        };
        Paragraph::new(vec![Line::from(""), Line::from(stimulus)])
            .alignment(Alignment::Center)
            .render(body, buf);

        let keys = if engine.config().pacing.is_timed() {
            "(enter) target / (space) not target / (esc)ape"
        } else {
            "(enter) target / (space) not target / (→) next / (esc)ape"
        };
        Paragraph::new(Span::styled(keys, italic())).render(legend, buf);
    }
}

pub struct ConfirmSaveScreen;

impl Screen for ConfirmSaveScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (_, body, legend) = frame_rows(area, 2);

        Paragraph::new(vec![
            Line::from(Span::styled(
                format!(
                    "stopped after {} of {} numbers",
                    app.engine.results().len(),
                    app.engine.sequence().len()
                ),
                bold(),
            )),
            Line::from("save results so far?"),
        ])
        .alignment(Alignment::Center)
        .render(body, buf);

        Paragraph::new(Span::styled("(y)es / (n)o / (c)ontinue", italic())).render(legend, buf);
    }
}

pub struct CompleteScreen;

impl Screen for CompleteScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let (header, body, legend) = frame_rows(area, 8);
        let stats = app.engine.results().summary_stats();

        Paragraph::new(Span::styled(format!("subject: {}", app.config.subject), dim()))
            .alignment(Alignment::Right)
            .render(header, buf);

        let saved = match (&app.saved_to, &app.save_error) {
            (Some(path), _) => Span::styled(
                format!("saved to {}", path.display()),
                Style::default().fg(Color::Green),
            ),
            (None, Some(err)) => Span::styled(
                format!("not saved: {err}"),
                Style::default().fg(Color::Red),
            ),
            (None, None) => Span::styled("results not saved", dim()),
        };

        let history = app
            .history
            .iter()
            .map(|s| {
                format!(
                    "{} {}",
                    s.started_at.format("%m-%d %H:%M"),
                    format_pct(s.accuracy_pct)
                )
            })
            .join("   ");

        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{}-back complete", app.config.n),
                bold().fg(Color::Cyan),
            )),
            Line::from(""),
            Line::from(Span::styled(summary_line(&stats), bold())),
            Line::from(Span::styled(detection_line(&stats), dim())),
            Line::from(""),
            Line::from(saved),
            Line::from(""),
            Line::from(Span::styled(
                if history.is_empty() {
                    String::new()
                } else {
                    format!("recent: {history}")
                },
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            )),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(body, buf);

        Paragraph::new(Span::styled("(r)estart / (esc)ape", italic())).render(legend, buf);
    }
}

fn format_pct(pct: Option<f64>) -> String {
    pct.map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"))
}

fn summary_line(stats: &SummaryStats) -> String {
    let latency = stats
        .mean_latency_ms
        .map_or_else(|| "-".to_string(), |ms| format!("{ms:.0} ms"));
    format!(
        "{}/{} correct   {} acc   {} mean response",
        stats.correct,
        stats.total,
        format_pct(stats.accuracy_pct),
        latency
    )
}

fn detection_line(stats: &SummaryStats) -> String {
    format!(
        "{} hits · {} misses · {} false alarms · {} correct rejections · {} unanswered",
        stats.hits, stats.misses, stats.false_alarms, stats.correct_rejections, stats.forced
    )
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Waiting => Box::new(WaitingScreen),
        AppState::Running => Box::new(RunningScreen),
        AppState::ConfirmSave => Box::new(ConfirmSaveScreen),
        AppState::Complete => Box::new(CompleteScreen),
    }
}
