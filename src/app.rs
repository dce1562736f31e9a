//! Application state and core logic.
//!
//! Two states only: idle (waiting for a submission) and processing (one
//! four-call chain in flight on a worker thread). The event loop polls the
//! worker channel every frame, mirroring the chain's progress into state the
//! view renders.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use ratatui::style::Color;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigLoadStatus, LoadedConfig};
use crate::gemini::TextGenerator;
use crate::history::{Interaction, SessionHistory, append_to_log};
use crate::prompts::{ChainOutcome, Step, run_chain};

/// Application status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    Processing,
}

impl AppStatus {
    pub fn color(&self) -> Color {
        match self {
            AppStatus::Idle => Color::Cyan,
            AppStatus::Processing => Color::Green,
        }
    }
}

/// Panels that can be selected/focused for scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectedPanel {
    /// Results pane (default).
    #[default]
    Results,
    /// History sidebar.
    History,
}

impl SelectedPanel {
    pub fn toggle(self) -> Self {
        match self {
            Self::Results => Self::History,
            Self::History => Self::Results,
        }
    }
}

/// Messages sent back from the worker thread running the chain.
enum WorkerMessage {
    StepStarted(Step),
    Finished(Box<ChainOutcome>),
}

/// Main application state.
pub struct App {
    pub status: AppStatus,
    /// Prompt text being edited. Locked while a submission is in flight.
    pub input: String,
    pub show_empty_prompt_warning: bool,
    /// Which chain step is currently running, for the status bar.
    pub current_step: Option<Step>,
    /// The most recently completed record, rendered in the results pane.
    pub latest: Option<Interaction>,
    /// User-visible errors from the last submission's steps.
    pub step_errors: Vec<String>,
    /// In-memory record sequence for the sidebar.
    pub history: SessionHistory,
    /// Where the durable CSV log lives.
    pub history_path: PathBuf,
    /// Error from the last history file append, if any.
    pub log_write_error: Option<String>,
    pub results_scroll: u16,
    pub history_scroll: u16,
    /// Visual line counts and pane sizes, updated by the view each frame.
    pub results_line_count: u16,
    pub history_line_count: u16,
    pub results_pane_height: u16,
    pub history_pane_height: u16,
    pub selected_panel: SelectedPanel,
    /// Session ID for this invocation.
    pub session_id: Option<String>,
    /// Directory where logs are written.
    pub log_directory: Option<PathBuf>,
    /// Error that occurred during logging initialization.
    pub logging_error: Option<String>,
    /// Loaded configuration.
    pub config: Config,
    /// Path to the configuration file.
    #[allow(dead_code)] // Surfaced in logs; kept for a future status panel
    pub config_path: PathBuf,
    /// Status of config loading.
    #[allow(dead_code)]
    pub config_load_status: ConfigLoadStatus,
    /// When the in-flight submission started, for elapsed time display.
    pub run_start_time: Option<Instant>,
    /// Frame counter for animations (incremented each render cycle).
    pub frame_count: u64,
    /// Submissions completed or started this session, for logging.
    pub submission_count: u64,
    generator: Arc<dyn TextGenerator>,
    worker_rx: Option<Receiver<WorkerMessage>>,
    /// Original prompt of the in-flight chain.
    pending_prompt: Option<String>,
}

impl App {
    pub fn new(
        session_id: Option<String>,
        log_directory: Option<PathBuf>,
        logging_error: Option<String>,
        loaded_config: LoadedConfig,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let history_path = loaded_config.config.history_path();
        Self {
            status: AppStatus::Idle,
            input: String::new(),
            show_empty_prompt_warning: false,
            current_step: None,
            latest: None,
            step_errors: Vec::new(),
            history: SessionHistory::new(),
            history_path,
            log_write_error: None,
            results_scroll: 0,
            history_scroll: 0,
            results_line_count: 0,
            history_line_count: 0,
            results_pane_height: 0,
            history_pane_height: 0,
            selected_panel: SelectedPanel::default(),
            session_id,
            log_directory,
            logging_error,
            config: loaded_config.config,
            config_path: loaded_config.config_path,
            config_load_status: loaded_config.status,
            run_start_time: None,
            frame_count: 0,
            submission_count: 0,
            generator,
            worker_rx: None,
            pending_prompt: None,
        }
    }

    /// Submit the current input.
    ///
    /// Empty or whitespace-only input raises the warning popup and issues no
    /// calls. Otherwise the four-call chain starts on a worker thread and the
    /// app transitions to processing; further submits are ignored until it
    /// completes.
    pub fn submit(&mut self) {
        if self.status == AppStatus::Processing {
            return;
        }

        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            warn!("empty_prompt_submitted");
            self.show_empty_prompt_warning = true;
            return;
        }

        self.submission_count += 1;
        info!(
            submission = self.submission_count,
            prompt_chars = prompt.chars().count(),
            "submission_start"
        );

        let (tx, rx) = mpsc::channel();
        let generator = Arc::clone(&self.generator);
        let chain_prompt = prompt.clone();
        thread::spawn(move || {
            let outcome = run_chain(generator.as_ref(), &chain_prompt, |step| {
                let _ = tx.send(WorkerMessage::StepStarted(step));
            });
            let _ = tx.send(WorkerMessage::Finished(Box::new(outcome)));
        });

        self.pending_prompt = Some(prompt);
        self.worker_rx = Some(rx);
        self.status = AppStatus::Processing;
        self.current_step = None;
        self.run_start_time = Some(Instant::now());
    }

    /// Drain pending worker messages; called once per frame.
    pub fn poll_worker(&mut self) {
        let Some(rx) = &self.worker_rx else {
            return;
        };

        let mut finished: Option<Box<ChainOutcome>> = None;
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(WorkerMessage::StepStarted(step)) => {
                    debug!(step = ?step, "step_started");
                    self.current_step = Some(step);
                }
                Ok(WorkerMessage::Finished(outcome)) => {
                    finished = Some(outcome);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if let Some(outcome) = finished {
            self.complete_submission(*outcome);
        } else if disconnected {
            // Worker died without a final message; return to idle.
            warn!("worker_disconnected");
            self.reset_to_idle();
        }
    }

    fn complete_submission(&mut self, outcome: ChainOutcome) {
        let prompt = self.pending_prompt.take().unwrap_or_default();

        let mut errors = Vec::new();
        for result in [
            &outcome.evaluation,
            &outcome.optimized_prompt,
            &outcome.original_response,
            &outcome.optimized_response,
        ] {
            if let Some(error) = &result.error {
                errors.push(format!("Error: {}", error));
            }
        }

        let record = Interaction::from_outcome(prompt, &outcome);
        match append_to_log(&self.history_path, &record) {
            Ok(()) => self.log_write_error = None,
            Err(e) => {
                warn!(error = %e, "history_append_failed");
                self.log_write_error = Some(format!("Could not write history log: {:#}", e));
            }
        }

        self.history.push(record.clone());
        self.latest = Some(record);
        self.step_errors = errors;
        self.results_scroll = 0;
        self.history_scroll = 0;
        info!(
            records = self.history.len(),
            errors = self.step_errors.len(),
            "submission_complete"
        );

        self.reset_to_idle();
    }

    fn reset_to_idle(&mut self) {
        self.worker_rx = None;
        self.pending_prompt = None;
        self.status = AppStatus::Idle;
        self.current_step = None;
        self.run_start_time = None;
    }

    // Input editing; locked while a chain is in flight.

    pub fn insert_char(&mut self, c: char) {
        if self.status == AppStatus::Idle {
            self.input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.status == AppStatus::Idle {
            self.input.pop();
        }
    }

    pub fn clear_input(&mut self) {
        if self.status == AppStatus::Idle {
            self.input.clear();
        }
    }

    // Scrolling for the selected panel.

    fn max_results_scroll(&self) -> u16 {
        self.results_line_count
            .saturating_sub(self.results_pane_height)
    }

    fn max_history_scroll(&self) -> u16 {
        self.history_line_count
            .saturating_sub(self.history_pane_height)
    }

    pub fn scroll_selected_up(&mut self, amount: u16) {
        match self.selected_panel {
            SelectedPanel::Results => {
                self.results_scroll = self.results_scroll.saturating_sub(amount);
            }
            SelectedPanel::History => {
                self.history_scroll = self.history_scroll.saturating_sub(amount);
            }
        }
    }

    pub fn scroll_selected_down(&mut self, amount: u16) {
        match self.selected_panel {
            SelectedPanel::Results => {
                self.results_scroll =
                    (self.results_scroll + amount).min(self.max_results_scroll());
            }
            SelectedPanel::History => {
                self.history_scroll =
                    (self.history_scroll + amount).min(self.max_history_scroll());
            }
        }
    }

    /// Half-page scroll, used by PageUp/PageDown.
    pub fn selected_pane_half_page(&self) -> u16 {
        let height = match self.selected_panel {
            SelectedPanel::Results => self.results_pane_height,
            SelectedPanel::History => self.history_pane_height,
        };
        (height / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::StepResult;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedGenerator {
        calls: Mutex<Vec<String>>,
        replies: Mutex<Vec<StepResult>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<StepResult>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn generate(&self, prompt: &str) -> StepResult {
            self.calls.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| StepResult::ok("unscripted".to_string()))
        }
    }

    fn ok(text: &str) -> StepResult {
        StepResult::ok(text.to_string())
    }

    fn test_app(generator: Arc<ScriptedGenerator>, history_path: PathBuf) -> App {
        let loaded = LoadedConfig {
            config: Config::default(),
            config_path: PathBuf::from("config.toml"),
            status: ConfigLoadStatus::Created,
        };
        let mut app = App::new(None, None, None, loaded, generator);
        app.history_path = history_path;
        app
    }

    /// Pump the worker channel until the submission completes.
    fn wait_for_idle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.status == AppStatus::Processing {
            assert!(Instant::now() < deadline, "submission did not complete");
            app.poll_worker();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn whitespace_only_submit_issues_no_calls() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(Arc::clone(&generator), dir.path().join("h.csv"));

        app.input = "   \t ".to_string();
        app.submit();

        assert_eq!(app.status, AppStatus::Idle);
        assert!(app.show_empty_prompt_warning);
        assert_eq!(generator.call_count(), 0);
        assert!(app.history.is_empty());
        assert!(!app.history_path.exists());
    }

    #[test]
    fn successful_submission_records_and_logs_one_interaction() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            ok("SCORE: 9/9/9/9"),
            ok("write a short poem about the sea"),
            ok("poem about things"),
            ok("poem about the sea"),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        let mut app = test_app(Arc::clone(&generator), path.clone());

        app.input = "write a poem".to_string();
        app.submit();
        assert_eq!(app.status, AppStatus::Processing);

        wait_for_idle(&mut app);

        assert_eq!(generator.call_count(), 4);
        assert_eq!(app.history.len(), 1);
        assert!(app.step_errors.is_empty());

        let record = app.latest.as_ref().unwrap();
        assert_eq!(record.original_prompt, "write a poem");
        assert_eq!(record.optimized_prompt, "write a short poem about the sea");
        assert_eq!(record.evaluation, "SCORE: 9/9/9/9");
        assert_eq!(record.original_response, "poem about things");
        assert_eq!(record.optimized_response, "poem about the sea");

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 6);
    }

    #[test]
    fn failed_steps_surface_errors_but_still_complete() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            StepResult::failed(
                "API request failed with status code 500".to_string(),
                "API request failed with status code 500: boom".to_string(),
            ),
            ok("rewritten"),
            ok("answer a"),
            ok("answer b"),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(Arc::clone(&generator), dir.path().join("h.csv"));

        app.input = "explain traits".to_string();
        app.submit();
        wait_for_idle(&mut app);

        assert_eq!(generator.call_count(), 4);
        assert_eq!(app.step_errors.len(), 1);
        assert!(app.step_errors[0].contains("500"));
        // The sentinel lands in the record like any output.
        assert_eq!(
            app.latest.as_ref().unwrap().evaluation,
            "API request failed with status code 500"
        );
        assert_eq!(app.history.len(), 1);
    }

    #[test]
    fn repeated_submissions_append_in_order() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            ok("s1"),
            ok("o1"),
            ok("r1"),
            ok("r1b"),
            ok("s2"),
            ok("o2"),
            ok("r2"),
            ok("r2b"),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.csv");
        let mut app = test_app(Arc::clone(&generator), path.clone());

        for prompt in ["first prompt", "second prompt"] {
            app.input = prompt.to_string();
            app.submit();
            wait_for_idle(&mut app);
        }

        assert_eq!(generator.call_count(), 8);
        assert_eq!(app.history.len(), 2);

        // Sidebar order is newest first; file order is append order.
        let newest: Vec<&str> = app
            .history
            .iter_newest_first()
            .map(|r| r.original_prompt.as_str())
            .collect();
        assert_eq!(newest, vec!["second prompt", "first prompt"]);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "first prompt");
        assert_eq!(&rows[1][1], "second prompt");
    }

    #[test]
    fn input_editing_is_locked_while_processing() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(generator, dir.path().join("h.csv"));

        app.insert_char('h');
        app.insert_char('i');
        assert_eq!(app.input, "hi");

        app.status = AppStatus::Processing;
        app.insert_char('x');
        app.backspace();
        app.clear_input();
        assert_eq!(app.input, "hi");

        app.status = AppStatus::Idle;
        app.backspace();
        assert_eq!(app.input, "h");
    }
}
