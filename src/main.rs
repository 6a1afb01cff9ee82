pub mod ui;

use chrono::{DateTime, Local};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use nback::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    store::{Archive, SessionRecord},
    NBackError, TaskEngine, TaskEvent,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::{mpsc::Sender, Mutex},
    time::Duration,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 20;
const HISTORY_LIMIT: usize = 5;

/// n-back working memory task in the terminal
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "Shows numbers one at a time. Press Enter when the current number matches the one shown n steps earlier, Space when it does not. Results are scored and saved per subject."
)]
pub struct Cli {
    /// how many steps back a number must match to be a target
    #[clap(short = 'n', long)]
    n: Option<usize>,

    /// number of numbers shown in one run
    #[clap(short = 'l', long)]
    length: Option<usize>,

    /// smallest number drawn
    #[clap(long)]
    min: Option<u32>,

    /// largest number drawn
    #[clap(long)]
    max: Option<u32>,

    /// advance on your own "next" key, or automatically on a timer
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// milliseconds each number stays on screen in timed mode
    #[clap(short = 'i', long)]
    interval_ms: Option<u64>,

    /// milliseconds the focus marker shows between numbers in timed mode (0 disables it)
    #[clap(short = 'f', long)]
    focus_ms: Option<u64>,

    /// chance that an eligible position is a target
    #[clap(short = 'p', long)]
    target_probability: Option<f64>,

    /// score an unanswered timed tick as "target" instead of "not target"
    #[clap(long)]
    timeout_is_target: bool,

    /// subject identifier used to label saved results
    #[clap(short = 's', long)]
    subject: Option<String>,

    /// read and write settings at this path instead of the default config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// persist the effective settings as the new defaults
    #[clap(long)]
    save_config: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum, strum_macros::Display)]
pub enum Mode {
    #[strum(serialize = "self-paced")]
    SelfPaced,
    #[strum(serialize = "timed")]
    Timed,
}

impl Cli {
    /// Overlay the command line on stored settings
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(n) = self.n {
            cfg.n = n;
        }
        if let Some(length) = self.length {
            cfg.sequence_length = length;
        }
        if let Some(min) = self.min {
            cfg.min_number = min;
        }
        if let Some(max) = self.max {
            cfg.max_number = max;
        }
        if let Some(mode) = self.mode {
            cfg.timed = mode == Mode::Timed;
        }
        if let Some(ms) = self.interval_ms {
            cfg.tick_interval_ms = ms;
        }
        if let Some(ms) = self.focus_ms {
            cfg.focus_duration_ms = ms;
        }
        if let Some(p) = self.target_probability {
            cfg.target_probability = p;
        }
        if self.timeout_is_target {
            cfg.timeout_response = true;
        }
        if let Some(subject) = &self.subject {
            cfg.subject = subject.clone();
        }
        cfg
    }

    fn config_store(&self) -> FileConfigStore {
        self.config
            .as_ref()
            .map(FileConfigStore::with_path)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Waiting,
    Running,
    ConfirmSave,
    Complete,
}

/// What the stimulus area currently shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stimulus {
    Blank,
    Number(u32),
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    Continue,
    Restart,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub engine: TaskEngine,
    pub state: AppState,
    pub stimulus: Stimulus,
    pub started_at: Option<DateTime<Local>>,
    pub saved_to: Option<PathBuf>,
    pub save_error: Option<String>,
    pub history: Vec<SessionRecord>,
    archive: Option<Archive>,
    events: Sender<AppEvent>,
}

impl App {
    pub fn new(config: Config, events: Sender<AppEvent>) -> Result<Self, NBackError> {
        let engine = Self::build_engine(&config, &events)?;
        Ok(Self {
            config,
            engine,
            state: AppState::Waiting,
            stimulus: Stimulus::Blank,
            started_at: None,
            saved_to: None,
            save_error: None,
            history: Vec::new(),
            archive: None,
            events,
        })
    }

    pub fn with_archive(mut self, archive: Option<Archive>) -> Self {
        self.archive = archive;
        self
    }

    fn build_engine(config: &Config, events: &Sender<AppEvent>) -> Result<TaskEngine, NBackError> {
        let mut engine = TaskEngine::new(config.task_config()?)?;
        let tx = events.clone();
        engine.add_event_listener(move |e: &TaskEvent| {
            let _ = tx.send(AppEvent::Task(*e));
        });
        Ok(engine)
    }

    /// Fresh run with the same settings and a newly drawn sequence
    pub fn reset(&mut self) -> Result<(), NBackError> {
        self.engine = Self::build_engine(&self.config, &self.events)?;
        self.state = AppState::Waiting;
        self.stimulus = Stimulus::Blank;
        self.started_at = None;
        self.saved_to = None;
        self.save_error = None;
        Ok(())
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.engine.stop();
            return Flow::Quit;
        }

        match self.state {
            AppState::Waiting => match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => {
                    self.begin();
                    Flow::Continue
                }
                KeyCode::Esc => Flow::Quit,
                _ => Flow::Continue,
            },
            AppState::Running => {
                let outcome = match key.code {
                    KeyCode::Enter => self.engine.respond(true),
                    KeyCode::Char(' ') => self.engine.respond(false),
                    KeyCode::Right | KeyCode::Tab if !self.engine.config().pacing.is_timed() => {
                        self.engine.force_advance()
                    }
                    KeyCode::Esc => return self.abort(),
                    _ => Ok(()),
                };
                match outcome {
                    Err(e) if e.is_recoverable() => debug!("input ignored: {}", e),
                    Err(e) => warn!("engine error: {}", e),
                    Ok(()) => {}
                }
                Flow::Continue
            }
            AppState::ConfirmSave => match key.code {
                KeyCode::Char('y') => {
                    self.save_results();
                    Flow::Quit
                }
                KeyCode::Char('n') => Flow::Quit,
                KeyCode::Char('c') | KeyCode::Esc => {
                    self.resume();
                    Flow::Continue
                }
                _ => Flow::Continue,
            },
            AppState::Complete => match key.code {
                KeyCode::Char('r') => Flow::Restart,
                KeyCode::Esc | KeyCode::Char('q') => Flow::Quit,
                _ => Flow::Continue,
            },
        }
    }

    pub fn on_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Tick { number, .. } => self.stimulus = Stimulus::Number(number),
            TaskEvent::Focus { .. } => self.stimulus = Stimulus::Focus,
            TaskEvent::Complete { .. } => {
                self.stimulus = Stimulus::Blank;
                self.state = AppState::Complete;
                self.save_results();
            }
        }
    }

    /// Drive timed transitions; called on every loop iteration
    pub fn on_tick(&mut self) {
        if self.state == AppState::Running {
            if let Err(e) = self.engine.poll() {
                warn!("timed advance failed: {}", e);
            }
        }
    }

    fn begin(&mut self) {
        match self.engine.start() {
            Ok(()) => {
                self.started_at = Some(Local::now());
                self.state = AppState::Running;
            }
            Err(e) => warn!("could not start task: {}", e),
        }
    }

    fn resume(&mut self) {
        if let Err(e) = self.engine.start() {
            warn!("could not resume task: {}", e);
        }
        self.state = AppState::Running;
    }

    fn abort(&mut self) -> Flow {
        self.engine.stop();
        if self.engine.results().is_empty() {
            Flow::Quit
        } else {
            self.state = AppState::ConfirmSave;
            Flow::Continue
        }
    }

    fn save_results(&mut self) {
        let Some(archive) = &self.archive else {
            return;
        };
        let started_at = self.started_at.unwrap_or_else(Local::now);
        match archive.save_run(&self.config.subject, started_at, &self.engine) {
            Ok(path) => self.saved_to = Some(path),
            Err(e) => {
                warn!("failed to save results: {}", e);
                self.save_error = Some(e.to_string());
            }
        }
        self.history = archive.recent_sessions(&self.config.subject, HISTORY_LIMIT);
    }
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nback=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let store = cli.config_store();
    let config = cli.apply(store.load());
    if let Err(e) = config.task_config() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e).exit();
    }
    if cli.save_config {
        store.save(&config)?;
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging();

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let archive = Archive::open_default()
        .map_err(|e| warn!("results will not be saved: {}", e))
        .ok();
    let mut app = App::new(config, runner.sender())?.with_archive(archive);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = run_app(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn run_app<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let flow = match runner.step() {
            AppEvent::Key(key) => app.on_key(key),
            AppEvent::Task(event) => {
                app.on_task_event(event);
                Flow::Continue
            }
            AppEvent::Resize | AppEvent::Tick => Flow::Continue,
        };
        app.on_tick();

        match flow {
            Flow::Continue => {}
            Flow::Restart => app.reset()?,
            Flow::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nback::store::{CsvResultsWriter, SessionDb};
    use std::sync::mpsc::{self, Receiver};
    use tempfile::tempdir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(config: Config) -> (App, Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        (App::new(config, tx).unwrap(), rx)
    }

    /// Feed queued engine events back into the app, as the event loop would
    fn pump(app: &mut App, rx: &Receiver<AppEvent>) {
        while let Ok(AppEvent::Task(e)) = rx.try_recv() {
            app.on_task_event(e);
        }
    }

    fn short_config() -> Config {
        Config {
            n: 1,
            sequence_length: 3,
            ..Config::default()
        }
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["nback"]);
        assert_eq!(cli.apply(Config::default()), Config::default());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "nback", "-n", "3", "-l", "30", "--min", "2", "--max", "5", "-m", "timed", "-i",
            "1500", "-f", "0", "-p", "0.5", "--timeout-is-target", "-s", "p07",
        ]);
        let cfg = cli.apply(Config::default());

        assert_eq!(cfg.n, 3);
        assert_eq!(cfg.sequence_length, 30);
        assert_eq!((cfg.min_number, cfg.max_number), (2, 5));
        assert!(cfg.timed);
        assert_eq!(cfg.tick_interval_ms, 1500);
        assert_eq!(cfg.focus_duration_ms, 0);
        assert_eq!(cfg.target_probability, 0.5);
        assert!(cfg.timeout_response);
        assert_eq!(cfg.subject, "p07");
    }

    #[test]
    fn test_cli_self_paced_mode_clears_timed() {
        let cli = Cli::parse_from(["nback", "--mode", "self-paced"]);
        let stored = Config {
            timed: true,
            ..Config::default()
        };
        assert!(!cli.apply(stored).timed);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::SelfPaced.to_string(), "self-paced");
        assert_eq!(Mode::Timed.to_string(), "timed");
    }

    #[test]
    fn test_app_rejects_invalid_config() {
        let (tx, _rx) = mpsc::channel();
        let cfg = Config {
            n: 0,
            ..Config::default()
        };
        assert!(matches!(
            App::new(cfg, tx),
            Err(NBackError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_space_begins_and_shows_first_number() {
        let (mut app, rx) = test_app(short_config());
        assert_eq!(app.state, AppState::Waiting);

        assert_eq!(app.on_key(key(KeyCode::Char(' '))), Flow::Continue);
        pump(&mut app, &rx);

        assert_eq!(app.state, AppState::Running);
        assert_eq!(
            app.stimulus,
            Stimulus::Number(app.engine.current_number().unwrap())
        );
        assert!(app.started_at.is_some());
        assert!(app.engine.results().is_empty());
    }

    #[test]
    fn test_self_paced_session_completes() {
        let (mut app, rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));

        for _ in 0..3 {
            app.on_key(key(KeyCode::Char(' ')));
            app.on_key(key(KeyCode::Right));
            pump(&mut app, &rx);
        }

        assert_eq!(app.state, AppState::Complete);
        assert_eq!(app.engine.results().len(), 3);
        assert!(app.engine.all_results().iter().all(|r| !r.was_forced));
        assert_eq!(app.on_key(key(KeyCode::Char('r'))), Flow::Restart);
    }

    #[test]
    fn test_next_key_ignored_in_timed_mode() {
        let cfg = Config {
            timed: true,
            ..short_config()
        };
        let (mut app, rx) = test_app(cfg);
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Right));
        pump(&mut app, &rx);

        assert_eq!(app.engine.current_index(), Some(0));
        assert!(app.engine.results().is_empty());
    }

    #[test]
    fn test_duplicate_answer_is_ignored() {
        let (mut app, _rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));

        assert_eq!(app.on_key(key(KeyCode::Char(' '))), Flow::Continue);
        assert_eq!(app.state, AppState::Running);
        assert_eq!(app.engine.results().len(), 1);
        assert!(app.engine.all_results()[0].claimed_target());
    }

    #[test]
    fn test_escape_before_any_result_quits() {
        let (mut app, _rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));
        assert_eq!(app.on_key(key(KeyCode::Esc)), Flow::Quit);
    }

    #[test]
    fn test_escape_mid_run_asks_to_save_then_resumes() {
        let (mut app, _rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Char(' ')));

        assert_eq!(app.on_key(key(KeyCode::Esc)), Flow::Continue);
        assert_eq!(app.state, AppState::ConfirmSave);
        assert!(!app.engine.has_started());

        app.on_key(key(KeyCode::Char('c')));
        assert_eq!(app.state, AppState::Running);
        assert!(app.engine.has_started());
        assert_eq!(app.engine.results().len(), 1);
    }

    #[test]
    fn test_confirmed_abort_saves_partial_results() {
        let dir = tempdir().unwrap();
        let archive = Archive {
            writer: CsvResultsWriter::with_dir(dir.path()),
            db: Some(SessionDb::open_in_memory().unwrap()),
        };
        let (tx, _rx) = mpsc::channel();
        let mut app = App::new(short_config(), tx)
            .unwrap()
            .with_archive(Some(archive));

        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Esc));
        assert_eq!(app.on_key(key(KeyCode::Char('y'))), Flow::Quit);

        let path = app.saved_to.clone().expect("results saved");
        assert_eq!(CsvResultsWriter::read(path).unwrap().len(), 1);
        assert_eq!(app.history.len(), 1);
        assert!(!app.history[0].completed);
    }

    #[test]
    fn test_reset_draws_new_run() {
        let (mut app, rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));
        app.on_key(key(KeyCode::Right));
        pump(&mut app, &rx);

        app.reset().unwrap();
        assert_eq!(app.state, AppState::Waiting);
        assert_eq!(app.stimulus, Stimulus::Blank);
        assert!(!app.engine.has_started());
        assert!(app.engine.results().is_empty());
    }

    #[test]
    fn test_ctrl_c_quits_from_any_state() {
        let (mut app, _rx) = test_app(short_config());
        app.on_key(key(KeyCode::Enter));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(ctrl_c), Flow::Quit);
        assert!(!app.engine.has_started());
    }

    #[test]
    fn test_focus_event_shows_marker() {
        let (mut app, _rx) = test_app(short_config());
        app.on_task_event(TaskEvent::Focus { after_index: 0 });
        assert_eq!(app.stimulus, Stimulus::Focus);
        app.on_task_event(TaskEvent::Tick {
            index: 1,
            number: 8,
        });
        assert_eq!(app.stimulus, Stimulus::Number(8));
    }

    #[test]
    fn test_tick_rate_constant() {
        assert!(TICK_RATE_MS > 0 && TICK_RATE_MS < 100);
    }
}
