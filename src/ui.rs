pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(&self.state).render(self, area, buf);
    }
}

/// Split `area` into a header row, a vertically centred body of
/// `body_height` rows, and a legend row at the bottom.
fn frame_rows(area: Rect, body_height: u16) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(body_height),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);
    (chunks[0], chunks[2], chunks[4])
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppEvent, AppState, Stimulus};
    use nback::config::Config;
    use nback::store::SessionRecord;
    use std::sync::mpsc;

    fn app(state: AppState, stimulus: Stimulus) -> App {
        let (tx, _rx) = mpsc::channel::<AppEvent>();
        let mut app = App::new(
            Config {
                n: 2,
                sequence_length: 6,
                ..Config::default()
            },
            tx,
        )
        .unwrap();
        app.state = state;
        app.stimulus = stimulus;
        app
    }

    fn rendered(app: &App, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_waiting_screen_explains_task() {
        let text = rendered(&app(AppState::Waiting, Stimulus::Blank), 80, 24);
        assert!(text.contains("2-back"));
        assert!(text.contains("press space to begin"));
    }

    #[test]
    fn test_running_screen_shows_number() {
        let text = rendered(&app(AppState::Running, Stimulus::Number(7)), 80, 24);
        assert!(text.contains('7'));
    }

    #[test]
    fn test_running_screen_shows_focus_marker() {
        let text = rendered(&app(AppState::Running, Stimulus::Focus), 80, 24);
        assert!(text.contains('+'));
    }

    #[test]
    fn test_confirm_screen_offers_choices() {
        let text = rendered(&app(AppState::ConfirmSave, Stimulus::Blank), 80, 24);
        assert!(text.contains("(y)es"));
        assert!(text.contains("(c)ontinue"));
    }

    #[test]
    fn test_complete_screen_shows_summary_and_history() {
        let mut app = app(AppState::Complete, Stimulus::Blank);
        app.history = vec![SessionRecord {
            subject: "anonymous".into(),
            started_at: chrono::Local::now(),
            n: 2,
            sequence_length: 6,
            pacing: "self-paced".into(),
            completed: true,
            total: 6,
            correct: 5,
            hits: 3,
            false_alarms: 0,
            mean_latency_ms: Some(512.0),
            accuracy_pct: Some(83.3),
        }];

        let text = rendered(&app, 100, 30);
        assert!(text.contains("complete"));
        assert!(text.contains("83.3%"));
    }

    #[test]
    fn test_small_area_does_not_panic() {
        for state in [
            AppState::Waiting,
            AppState::Running,
            AppState::ConfirmSave,
            AppState::Complete,
        ] {
            rendered(&app(state, Stimulus::Number(3)), 12, 4);
            rendered(&app(state, Stimulus::Focus), 1, 1);
        }
    }
}
