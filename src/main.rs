mod app;
mod config;
mod gemini;
mod history;
mod logging;
mod prompts;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::{DefaultTerminal, Terminal};
use tracing::{debug, info};

use crate::app::App;
use crate::gemini::{GeminiClient, TextGenerator};

fn main() -> Result<()> {
    let start_time = Instant::now();

    // Config first so its log level can seed the subscriber.
    let loaded_config = config::load_config();

    // The API key is the one fatal startup condition: bail out before any
    // terminal setup happens.
    let api_key = match config::load_api_key() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let (session_id, log_directory, logging_error, _guard) =
        match logging::init(&loaded_config.config.logging.level) {
            Ok(ctx) => (
                Some(ctx.session_id),
                Some(ctx.log_directory),
                None,
                Some(ctx._guard),
            ),
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                (None, None, Some(e.message), None)
            }
        };

    if let Some(log_dir) = &log_directory {
        logging::cleanup_old_logs(log_dir);
    }

    debug!(
        config_path = %loaded_config.config_path.display(),
        status = ?loaded_config.status,
        model = %loaded_config.config.gemini.model,
        "config_loaded"
    );

    let generator: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(
        &loaded_config.config.gemini.api_base,
        &loaded_config.config.gemini.model,
        &api_key,
    ));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let terminal = Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

    let app = App::new(
        session_id.clone(),
        log_directory,
        logging_error,
        loaded_config,
        generator,
    );
    let result = run_app(terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;

    // Log session end
    if let Some(sid) = session_id {
        let duration = start_time.elapsed();
        info!(
            session_id = %sid,
            duration_secs = duration.as_secs_f64(),
            "session_end"
        );
    }

    result
}

fn run_app(mut terminal: DefaultTerminal, mut app: App) -> Result<()> {
    loop {
        // Mirror the worker thread's progress into app state
        app.poll_worker();

        // Draw UI
        terminal.draw(|f| ui::draw(f, &mut app))?;

        // Poll for events with a short timeout so worker polling stays live
        if crossterm::event::poll(Duration::from_millis(50))? {
            let event = crossterm::event::read()?;

            // Handle popup dismissal first
            if app.show_empty_prompt_warning {
                if let Event::Key(key) = event
                    && (key.code == KeyCode::Enter || key.code == KeyCode::Esc)
                {
                    app.show_empty_prompt_warning = false;
                }
                continue;
            }

            match event {
                Event::Key(key) => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(());
                    }
                    KeyCode::Esc => {
                        return Ok(());
                    }
                    KeyCode::Enter => {
                        app.submit();
                    }
                    KeyCode::Tab => {
                        app.selected_panel = app.selected_panel.toggle();
                    }
                    KeyCode::Backspace => {
                        app.backspace();
                    }
                    KeyCode::Up => {
                        app.scroll_selected_up(1);
                    }
                    KeyCode::Down => {
                        app.scroll_selected_down(1);
                    }
                    KeyCode::PageUp => {
                        let half_page = app.selected_pane_half_page();
                        app.scroll_selected_up(half_page);
                    }
                    KeyCode::PageDown => {
                        let half_page = app.selected_pane_half_page();
                        app.scroll_selected_down(half_page);
                    }
                    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.clear_input();
                    }
                    KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.insert_char(c);
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => {
                        app.scroll_selected_up(3);
                    }
                    MouseEventKind::ScrollDown => {
                        app.scroll_selected_down(3);
                    }
                    _ => {}
                },
                Event::Resize(_, _) => {
                    // Terminal resized, handled on next draw
                }
                _ => {}
            }
        }
    }
}
