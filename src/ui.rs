//! UI rendering functions.
//!
//! One `draw` call per frame renders the whole view from `App` state: prompt
//! input and results on the left, the session history sidebar on the right,
//! and a command/status bar at the bottom.

use std::time::Duration;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    Wrap,
};

use crate::app::{App, AppStatus, SelectedPanel};
use crate::history::{Interaction, SessionHistory};

/// Formats a duration as M:SS (under 1 hour) or H:MM:SS (1+ hours).
pub fn format_elapsed(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Calculate a centered rectangle within the given area.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn section_header(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("── {} {}", title, "─".repeat(24_usize.saturating_sub(title.len()))),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))
}

fn push_text_block(lines: &mut Vec<Line<'static>>, text: &str) {
    for line in text.lines() {
        lines.push(Line::raw(line.to_string()));
    }
    if text.is_empty() {
        lines.push(Line::raw(String::new()));
    }
}

/// Builds the results pane content: step errors first, then the four outputs
/// of the latest completed submission.
pub fn results_lines(latest: Option<&Interaction>, step_errors: &[String]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for error in step_errors {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    if !step_errors.is_empty() {
        lines.push(Line::raw(String::new()));
    }

    let Some(record) = latest else {
        lines.push(Line::from(Span::styled(
            "Submit a prompt to see its evaluation, an optimized rewrite, and both responses."
                .to_string(),
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    };

    lines.push(section_header("Evaluation"));
    push_text_block(&mut lines, &record.evaluation);
    lines.push(Line::raw(String::new()));

    lines.push(section_header("Optimized Prompt"));
    push_text_block(&mut lines, &record.optimized_prompt);
    lines.push(Line::raw(String::new()));

    lines.push(section_header("Original Response"));
    push_text_block(&mut lines, &record.original_response);
    lines.push(Line::raw(String::new()));

    lines.push(section_header("Optimized Response"));
    push_text_block(&mut lines, &record.optimized_response);

    lines
}

/// Builds the sidebar content: all session records, newest first, each with
/// its six fields and a separator.
pub fn history_lines(history: &SessionHistory) -> Vec<Line<'static>> {
    if history.is_empty() {
        return vec![Line::from(Span::styled(
            "No conversation history yet.".to_string(),
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let label_style = Style::default().fg(Color::Cyan);
    let mut lines = Vec::new();

    for record in history.iter_newest_first() {
        lines.push(Line::from(Span::styled(
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));

        let fields: [(&str, &str); 5] = [
            ("Original Prompt", &record.original_prompt),
            ("Optimized Prompt", &record.optimized_prompt),
            ("Evaluation", &record.evaluation),
            ("Original Response", &record.original_response),
            ("Optimized Response", &record.optimized_response),
        ];

        for (label, value) in fields {
            let mut parts = value.lines();
            let first = parts.next().unwrap_or("");
            lines.push(Line::from(vec![
                Span::styled(format!("{}: ", label), label_style),
                Span::raw(first.to_string()),
            ]));
            for continuation in parts {
                lines.push(Line::raw(continuation.to_string()));
            }
        }

        lines.push(Line::from(Span::styled(
            "─".repeat(30),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

/// Draw the main UI.
pub fn draw(f: &mut Frame, app: &mut App) {
    // Increment frame counter for animations
    app.frame_count = app.frame_count.wrapping_add(1);

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Main area (flexible)
            Constraint::Length(3), // Command panel (border + 1 content row + border)
        ])
        .split(f.area());

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(outer[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Prompt input (border + 3 rows + border)
            Constraint::Min(0),    // Results pane
        ])
        .split(main[0]);

    draw_input_panel(f, app, left[0]);
    draw_results_panel(f, app, left[1]);
    draw_history_panel(f, app, main[1]);
    draw_command_bar(f, app, outer[1]);

    // Popup dialog if needed
    if app.show_empty_prompt_warning {
        let popup_area = centered_rect(44, 5, f.area());
        f.render_widget(Clear, popup_area);
        let popup = Paragraph::new("Please enter a prompt to analyze.")
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Notice")
                    .style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(popup, popup_area);
    }
}

fn draw_input_panel(f: &mut Frame, app: &App, area: Rect) {
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(app.status.color()))
        .title(" Prompt ");

    if let Some(session_id) = &app.session_id {
        block = block.title(Line::from(format!(" {} ", session_id)).right_aligned());
    }

    // Trailing block cursor while the input is editable.
    let mut text = app.input.clone();
    if app.status == AppStatus::Idle {
        text.push('█');
    }

    let input_panel = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    f.render_widget(input_panel, area);
}

fn draw_results_panel(f: &mut Frame, app: &mut App, area: Rect) {
    app.results_pane_height = area.height.saturating_sub(2); // Account for borders

    let mut content = results_lines(app.latest.as_ref(), &app.step_errors);
    if let Some(error) = &app.log_write_error {
        content.insert(
            0,
            Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )),
        );
    }

    let border_style = if app.selected_panel == SelectedPanel::Results {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let paragraph = Paragraph::new(content)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(" Results "),
        )
        .wrap(Wrap { trim: false });

    // Visual line count drives scroll clamping in App.
    app.results_line_count = paragraph.line_count(area.width) as u16;
    let paragraph = paragraph.scroll((app.results_scroll, 0));
    f.render_widget(paragraph, area);

    draw_scrollbar(
        f,
        area,
        app.results_line_count,
        app.results_pane_height,
        app.results_scroll,
    );
}

fn draw_history_panel(f: &mut Frame, app: &mut App, area: Rect) {
    app.history_pane_height = area.height.saturating_sub(2);

    let border_style = if app.selected_panel == SelectedPanel::History {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let title = format!(" History ({}) ", app.history.len());
    let paragraph = Paragraph::new(history_lines(&app.history))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .wrap(Wrap { trim: false });

    app.history_line_count = paragraph.line_count(area.width) as u16;
    let paragraph = paragraph.scroll((app.history_scroll, 0));
    f.render_widget(paragraph, area);

    draw_scrollbar(
        f,
        area,
        app.history_line_count,
        app.history_pane_height,
        app.history_scroll,
    );
}

/// Scrollbar, only visible when content exceeds the viewport.
fn draw_scrollbar(f: &mut Frame, area: Rect, line_count: u16, pane_height: u16, offset: u16) {
    if line_count <= pane_height {
        return;
    }

    let scrollbar = Scrollbar::default()
        .orientation(ScrollbarOrientation::VerticalRight)
        .begin_symbol(Some("▲"))
        .end_symbol(Some("▼"));

    let mut scrollbar_state = ScrollbarState::default()
        .content_length(line_count as usize)
        .position(offset as usize)
        .viewport_content_length(pane_height as usize);

    f.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
}

fn draw_command_bar(f: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.status {
        AppStatus::Idle => "[Enter] Analyze  [Tab] Panel  [↑/↓] Scroll  [Esc] Quit",
        AppStatus::Processing => "[Tab] Panel  [↑/↓] Scroll  [Esc] Quit",
    };

    // Status indicator: colored dot + state text (current step and elapsed
    // time while a submission is in flight).
    let status_dot = "● ";
    let status_text = match app.status {
        AppStatus::Idle => {
            if let Some(error) = &app.logging_error {
                format!("IDLE  ⚠ {}", error)
            } else {
                "IDLE".to_string()
            }
        }
        AppStatus::Processing => {
            let label = app
                .current_step
                .map(|step| step.label())
                .unwrap_or("Working");
            match app.run_start_time {
                Some(start) => format!("{}… {}", label, format_elapsed(start.elapsed())),
                None => format!("{}…", label),
            }
        }
    };
    // Blink the dot at ~1Hz while a submission is in flight.
    let dot_color = match app.status {
        AppStatus::Processing if !(app.frame_count / 10).is_multiple_of(2) => Color::DarkGray,
        _ => app.status.color(),
    };
    let status_color = app.status.color();

    // Right-align the status indicator.
    let inner_width = area.width.saturating_sub(2) as usize;
    let status_len = status_dot.chars().count() + status_text.chars().count();
    let shortcuts_len = shortcuts.chars().count();
    let spacing = inner_width.saturating_sub(shortcuts_len + status_len);

    let command_line = Line::from(vec![
        Span::styled(shortcuts, Style::default().fg(Color::DarkGray)),
        Span::raw(" ".repeat(spacing)),
        Span::styled(status_dot, Style::default().fg(dot_color)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ]);

    let command_panel = Paragraph::new(command_line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(status_color)),
    );

    f.render_widget(command_panel, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn record(prompt: &str) -> Interaction {
        Interaction {
            timestamp: Local::now(),
            original_prompt: prompt.to_string(),
            optimized_prompt: format!("better {}", prompt),
            evaluation: "Clarity: 8".to_string(),
            original_response: "answer".to_string(),
            optimized_response: "better answer".to_string(),
        }
    }

    // format_elapsed tests

    #[test]
    fn test_format_elapsed_zero() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00");
    }

    #[test]
    fn test_format_elapsed_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(5)), "0:05");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "1:05");
        assert_eq!(format_elapsed(Duration::from_secs(3599)), "59:59");
    }

    #[test]
    fn test_format_elapsed_hours() {
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(7325)), "2:02:05");
    }

    // results pane tests

    #[test]
    fn results_placeholder_when_nothing_submitted() {
        let lines = results_lines(None, &[]);
        assert_eq!(lines.len(), 1);
        assert!(line_text(&lines[0]).contains("Submit a prompt"));
    }

    #[test]
    fn results_sections_appear_in_render_order() {
        let record = record("write a poem");
        let lines = results_lines(Some(&record), &[]);
        let text: Vec<String> = lines.iter().map(line_text).collect();

        let index_of = |needle: &str| {
            text.iter()
                .position(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("missing section {}", needle))
        };

        let evaluation = index_of("Evaluation");
        let optimized = index_of("Optimized Prompt");
        let original_response = index_of("Original Response");
        let optimized_response = index_of("Optimized Response");
        assert!(evaluation < optimized);
        assert!(optimized < original_response);
        assert!(original_response < optimized_response);
    }

    #[test]
    fn step_errors_render_before_sections() {
        let record = record("p");
        let errors = vec!["Error: API request failed with status code 500: boom".to_string()];
        let lines = results_lines(Some(&record), &errors);

        assert!(line_text(&lines[0]).contains("status code 500"));
        assert_eq!(lines[0].spans[0].style.fg, Some(Color::Red));
    }

    // history sidebar tests

    #[test]
    fn history_placeholder_when_empty() {
        let history = SessionHistory::new();
        let lines = history_lines(&history);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "No conversation history yet.");
    }

    #[test]
    fn history_renders_newest_record_first_with_all_fields() {
        let mut history = SessionHistory::new();
        history.push(record("older"));
        history.push(record("newer"));

        let lines = history_lines(&history);
        let text: Vec<String> = lines.iter().map(line_text).collect();

        let newer = text
            .iter()
            .position(|l| l.contains("Original Prompt: newer"))
            .unwrap();
        let older = text
            .iter()
            .position(|l| l.contains("Original Prompt: older"))
            .unwrap();
        assert!(newer < older);

        // Each record block carries all five labeled fields plus a separator.
        for label in [
            "Original Prompt:",
            "Optimized Prompt:",
            "Evaluation:",
            "Original Response:",
            "Optimized Response:",
        ] {
            assert_eq!(text.iter().filter(|l| l.contains(label)).count(), 2);
        }
        assert_eq!(text.iter().filter(|l| l.starts_with("──────")).count(), 2);
    }

    #[test]
    fn multiline_history_values_keep_their_lines() {
        let mut history = SessionHistory::new();
        let mut r = record("p");
        r.evaluation = "Clarity: 8\nConciseness: 7".to_string();
        history.push(r);

        let lines = history_lines(&history);
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert!(text.iter().any(|l| l == "Conciseness: 7"));
    }
}
