//! Terminal user interface for the converter.
//!
//! Shows the selected file, the preview scrub bar, the export range, the output
//! target and export progress. Input handling maps keys and mouse clicks to
//! [`ConverterCommand`]s; the command loop in `commands::convert` applies them
//! to the session.

use super::notice::{Notice, NoticeAction, NoticeKind};
use crate::playback::PlaybackState;
use crate::session::ConverterSession;
use crate::timecode;
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Gauge, LineGauge, Padding, Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const DIM_FG: Color = Color::Rgb(100, 100, 100);
const ACCENT: Color = Color::Rgb(185, 207, 212);
const WARN: Color = Color::Rgb(230, 180, 60);
const ERROR: Color = Color::Rgb(255, 0, 0);

/// Seek step for the arrow keys.
const SEEK_STEP_MS: i64 = 5_000;
/// Seek step for `,` and `.`.
const FINE_SEEK_STEP_MS: i64 = 100;

/// User input command for the converter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterCommand {
    /// Nothing to do (no key pressed or key ignored)
    Continue,
    Quit,
    SelectInput,
    SelectOutput,
    TogglePlay,
    SeekBy(i64),
    /// Click on the scrub bar, relative to its left edge
    ScrubClick { x: u16, width: u16 },
    EditStart,
    EditEnd,
    MarkStart,
    MarkEnd,
    EditName,
    Export,
    DismissNotice,
    OpenCodecHelp,
}

/// Maps a key press on the main screen to a command.
pub fn command_for_key(key: KeyEvent) -> ConverterCommand {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => ConverterCommand::Quit,
        KeyCode::Char('q') | KeyCode::Esc => ConverterCommand::Quit,
        KeyCode::Char('f') => ConverterCommand::SelectInput,
        KeyCode::Char('o') => ConverterCommand::SelectOutput,
        KeyCode::Char(' ') => ConverterCommand::TogglePlay,
        KeyCode::Left => ConverterCommand::SeekBy(-SEEK_STEP_MS),
        KeyCode::Right => ConverterCommand::SeekBy(SEEK_STEP_MS),
        KeyCode::Char(',') => ConverterCommand::SeekBy(-FINE_SEEK_STEP_MS),
        KeyCode::Char('.') => ConverterCommand::SeekBy(FINE_SEEK_STEP_MS),
        KeyCode::Char('s') => ConverterCommand::EditStart,
        KeyCode::Char('e') => ConverterCommand::EditEnd,
        KeyCode::Char('[') => ConverterCommand::MarkStart,
        KeyCode::Char(']') => ConverterCommand::MarkEnd,
        KeyCode::Char('n') => ConverterCommand::EditName,
        KeyCode::Char('x') | KeyCode::Enter => ConverterCommand::Export,
        _ => ConverterCommand::Continue,
    }
}

/// Maps a key press while a notice is open.
fn notice_command_for_key(key: KeyEvent, notice: &Notice) -> ConverterCommand {
    match key.code {
        KeyCode::Char('d') if notice.action == Some(NoticeAction::OpenCodecHelp) => {
            ConverterCommand::OpenCodecHelp
        }
        KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') | KeyCode::Char('q') => {
            ConverterCommand::DismissNotice
        }
        _ => ConverterCommand::Continue,
    }
}

/// Terminal UI for the converter screen.
pub struct ConverterTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    notice: Option<Notice>,
    /// Where the scrub bar was drawn last frame, for mouse hit testing
    scrub_area: Option<Rect>,
    cleaned_up: bool,
}

impl ConverterTui {
    /// Creates the UI and enters alternate screen mode with mouse capture.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            notice: None,
            scrub_area: None,
            cleaned_up: false,
        })
    }

    /// Shows `notice` on top of the screen, replacing any previous one.
    pub fn show_notice(&mut self, notice: Notice) {
        tracing::debug!("Notice: {} - {}", notice.title, notice.message);
        self.notice = Some(notice);
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Polls for input for up to 50ms and returns the resulting command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<ConverterCommand> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(ConverterCommand::Continue);
        }

        let command = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match &self.notice {
                Some(notice) => notice_command_for_key(key, notice),
                None => command_for_key(key),
            },
            Event::Mouse(mouse) if self.notice.is_none() => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => self
                    .scrub_area
                    .filter(|area| area.contains(Position::new(mouse.column, mouse.row)))
                    .map_or(ConverterCommand::Continue, |area| ConverterCommand::ScrubClick {
                        x: mouse.column - area.x,
                        width: area.width,
                    }),
                _ => ConverterCommand::Continue,
            },
            _ => ConverterCommand::Continue,
        };

        if command != ConverterCommand::Continue {
            tracing::debug!("Command: {:?}", command);
        }
        Ok(command)
    }

    /// Renders the converter screen for the current session state.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self, session: &ConverterSession) -> Result<()> {
        let notice = self.notice.clone();
        let mut scrub_area = None;

        self.terminal.draw(|frame| {
            let area = frame.area();
            let outer = Block::default()
                .padding(Padding::horizontal(1))
                .style(Style::default().fg(FG).bg(BG));
            let inner = outer.inner(area);
            frame.render_widget(outer, area);

            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1), // title
                    Constraint::Length(4), // input
                    Constraint::Length(4), // preview
                    Constraint::Length(3), // range
                    Constraint::Length(4), // output
                    Constraint::Length(3), // progress
                    Constraint::Min(0),
                    Constraint::Length(1), // help
                ])
                .split(inner);

            let title = Paragraph::new(Line::from(vec![
                Span::styled("clipmp3", Style::default().fg(ACCENT).bold()),
                Span::styled("  video to mp3", Style::default().fg(DIM_FG)),
            ]));
            frame.render_widget(title, rows[0]);

            render_input(frame, rows[1], session);
            scrub_area = render_preview(frame, rows[2], session);
            render_range(frame, rows[3], session);
            render_output(frame, rows[4], session);
            render_progress(frame, rows[5], session);

            let help = Paragraph::new(
                "f file  o folder  space play  ←→ seek  s/e edit  [/] mark  n name  x export  q quit",
            )
            .alignment(Alignment::Center)
            .style(Style::default().fg(DIM_FG));
            frame.render_widget(help, rows[7]);

            if let Some(notice) = &notice {
                render_notice(frame, area, notice);
            }
        })?;

        self.scrub_area = scrub_area;
        Ok(())
    }

    /// Asks for a line of text in a full-screen prompt.
    ///
    /// `validate` runs on Enter; an error message keeps the prompt open and is
    /// shown under the input. `status` is polled every redraw (at least every
    /// 50ms) and its line, if any, is shown in the prompt footer, so work
    /// running in the background stays visible. Returns `None` if the user
    /// presses Escape.
    ///
    /// # Errors
    /// - If terminal rendering or event reading fails
    pub fn prompt_line(
        &mut self,
        title: &str,
        hint: &str,
        initial: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
        status: &mut dyn FnMut() -> Option<String>,
    ) -> Result<Option<String>> {
        let mut input = Input::new(initial.to_string());
        let mut error: Option<String> = None;

        loop {
            let value = input.value().to_string();
            let cursor = input.visual_cursor();
            let scroll = input.visual_scroll(self.terminal.size()?.width.saturating_sub(6) as usize);
            let error_text = error.clone();
            let status_text = status();

            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(Block::default().style(Style::default().bg(BG)), area);

                let popup = centered_rect(area, 80, 7);
                frame.render_widget(Clear, popup);
                let block = Block::default()
                    .title(format!(" {title} "))
                    .borders(Borders::ALL)
                    .style(Style::default().fg(FG).bg(BG));
                let inner = block.inner(popup);
                frame.render_widget(block, popup);

                let lines = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Min(0),
                    ])
                    .split(inner);

                frame.render_widget(
                    Paragraph::new(hint).style(Style::default().fg(DIM_FG)),
                    lines[0],
                );
                frame.render_widget(
                    Paragraph::new(value.as_str()).scroll((0, scroll as u16)),
                    lines[2],
                );
                if let Some(err) = &error_text {
                    frame.render_widget(
                        Paragraph::new(err.as_str()).style(Style::default().fg(ERROR)),
                        lines[3],
                    );
                }
                if let Some(text) = &status_text {
                    frame.render_widget(
                        Paragraph::new(text.as_str()).style(Style::default().fg(ACCENT)),
                        lines[4],
                    );
                }
                frame.render_widget(
                    Paragraph::new("enter confirm  esc cancel")
                        .alignment(Alignment::Right)
                        .style(Style::default().fg(DIM_FG)),
                    lines[4],
                );

                let cursor_x = lines[2].x + cursor.saturating_sub(scroll) as u16;
                frame.set_cursor_position(Position::new(cursor_x, lines[2].y));
            })?;

            if !event::poll(Duration::from_millis(50))? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => match validate(input.value()) {
                    Ok(()) => return Ok(Some(input.value().trim().to_string())),
                    Err(message) => error = Some(message),
                },
                KeyCode::Esc => return Ok(None),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None)
                }
                _ => {
                    input.handle_event(&Event::Key(key));
                    error = None;
                }
            }
        }
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ConverterTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn section(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DIM_FG))
}

fn render_input(frame: &mut Frame, area: Rect, session: &ConverterSession) {
    let job = session.job();
    let file_line = match &job.input_path {
        Some(path) => Line::from(vec![
            Span::raw("File  "),
            Span::styled(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                Style::default().fg(FG).bold(),
            ),
        ]),
        None => Line::from(Span::styled("No file selected (f)", Style::default().fg(DIM_FG))),
    };
    let info_line = Line::from(Span::styled(
        session
            .info_text()
            .unwrap_or_else(|| "Video info: none".to_string()),
        Style::default().fg(DIM_FG),
    ));

    frame.render_widget(
        Paragraph::new(vec![file_line, info_line]).block(section("Video")),
        area,
    );
}

/// Draws the preview section and returns the scrub bar area.
fn render_preview(frame: &mut Frame, area: Rect, session: &ConverterSession) -> Option<Rect> {
    let block = section("Preview");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let preview = session.preview();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let (symbol, label) = match preview.state {
        PlaybackState::Playing => ("⏸ ", "Pause"),
        PlaybackState::Paused | PlaybackState::Stopped => ("▶ ", "Play"),
    };
    let status = if preview.available {
        Line::from(vec![
            Span::styled(symbol, Style::default().fg(ACCENT)),
            Span::raw(format!("{label}   ")),
            Span::raw(session.position_label()),
        ])
    } else {
        Line::from(Span::styled(
            format!("Preview unavailable   {}", session.position_label()),
            Style::default().fg(DIM_FG),
        ))
    };
    frame.render_widget(Paragraph::new(status), rows[0]);

    let ratio = if preview.duration_ms > 0 {
        (preview.position_ms as f64 / preview.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let scrub = LineGauge::default()
        .filled_style(Style::default().fg(ACCENT))
        .unfilled_style(Style::default().fg(DIM_FG))
        .label("")
        .ratio(ratio);
    frame.render_widget(scrub, rows[1]);

    preview.available.then_some(rows[1])
}

fn render_range(frame: &mut Frame, area: Rect, session: &ConverterSession) {
    let job = session.job();
    let valid = job.range_start < job.range_end && job.range_end <= job.duration_secs;
    let length_style = if valid {
        Style::default().fg(FG)
    } else {
        Style::default().fg(WARN)
    };

    let line = Line::from(vec![
        Span::raw("Start "),
        Span::styled(timecode::format_secs(job.range_start), Style::default().bold()),
        Span::raw("   End "),
        Span::styled(timecode::format_secs(job.range_end), Style::default().bold()),
        Span::raw("   Length "),
        Span::styled(
            timecode::format_secs((job.range_end - job.range_start).max(0.0)),
            length_style,
        ),
    ]);
    frame.render_widget(Paragraph::new(line).block(section("Range")), area);
}

fn render_output(frame: &mut Frame, area: Rect, session: &ConverterSession) {
    let job = session.job();
    let name_line = Line::from(vec![
        Span::raw("Name    "),
        Span::styled(job.file_name.clone(), Style::default().bold()),
    ]);
    let folder_line = match &job.output_dir {
        Some(dir) => Line::from(vec![Span::raw("Folder  "), Span::raw(dir.display().to_string())]),
        None => Line::from(Span::styled(
            "No output folder selected (o)",
            Style::default().fg(DIM_FG),
        )),
    };
    frame.render_widget(
        Paragraph::new(vec![name_line, folder_line]).block(section("Output")),
        area,
    );
}

fn render_progress(frame: &mut Frame, area: Rect, session: &ConverterSession) {
    let progress = session.job().progress;
    let (title, style) = if session.is_exporting() {
        ("Exporting...", Style::default().fg(ACCENT))
    } else if session.export_enabled() {
        ("Export (x)", Style::default().fg(ACCENT))
    } else {
        ("Export unavailable", Style::default().fg(DIM_FG))
    };

    let gauge = Gauge::default()
        .block(section(title))
        .gauge_style(style.bg(BG))
        .percent(u16::from(progress.min(100)))
        .label(format!("{progress}%"));
    frame.render_widget(gauge, area);
}

fn render_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
    let color = match notice.kind {
        NoticeKind::Info => ACCENT,
        NoticeKind::Warning => WARN,
        NoticeKind::Error => ERROR,
    };
    let help = match notice.action {
        Some(NoticeAction::OpenCodecHelp) => "d download codecs  enter close",
        None => "enter close",
    };

    let text_width = percent_of(area.width, 70).max(20);
    let per_line = usize::from(text_width.saturating_sub(4).max(1));
    let message_lines: usize = notice
        .message
        .lines()
        .map(|l| l.chars().count() / per_line + 1)
        .sum();
    let height = u16::try_from(message_lines).unwrap_or(u16::MAX).saturating_add(4);
    let popup = centered_rect(area, 70, height);

    frame.render_widget(Clear, popup);
    let block = Block::default()
        .title(format!(" {} ", notice.title))
        .title_bottom(Line::from(format!(" {help} ")).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .padding(Padding::horizontal(1))
        .style(Style::default().fg(FG).bg(BG));
    let paragraph = Paragraph::new(notice.message.as_str())
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, popup);
}

/// `percent` of `length`, computed without overflowing `u16`.
fn percent_of(length: u16, percent: u16) -> u16 {
    let scaled = u32::from(length) * u32::from(percent.min(100)) / 100;
    u16::try_from(scaled).unwrap_or(length)
}

/// Rectangle `percent_x` wide and `height` tall centered in `area`.
fn centered_rect(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = percent_of(area.width, percent_x).max(20).min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_main_key_bindings() {
        assert_eq!(command_for_key(key(KeyCode::Char('f'))), ConverterCommand::SelectInput);
        assert_eq!(command_for_key(key(KeyCode::Char(' '))), ConverterCommand::TogglePlay);
        assert_eq!(command_for_key(key(KeyCode::Left)), ConverterCommand::SeekBy(-5_000));
        assert_eq!(command_for_key(key(KeyCode::Char('x'))), ConverterCommand::Export);
        assert_eq!(command_for_key(key(KeyCode::Char('z'))), ConverterCommand::Continue);
        assert_eq!(
            command_for_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            ConverterCommand::Quit
        );
    }

    #[test]
    fn test_notice_keys() {
        let plain = Notice::info("Done", "ok");
        assert_eq!(notice_command_for_key(key(KeyCode::Enter), &plain), ConverterCommand::DismissNotice);
        assert_eq!(notice_command_for_key(key(KeyCode::Char('d')), &plain), ConverterCommand::Continue);

        let playback = Notice::playback("no codec");
        assert_eq!(
            notice_command_for_key(key(KeyCode::Char('d')), &playback),
            ConverterCommand::OpenCodecHelp
        );
        // export trigger is not reachable while a notice is open
        assert_eq!(notice_command_for_key(key(KeyCode::Char('x')), &playback), ConverterCommand::Continue);
    }

    #[test]
    fn test_centered_rect_fits_area() {
        let area = Rect::new(0, 0, 100, 30);
        let r = centered_rect(area, 70, 10);
        assert_eq!(r, Rect::new(15, 10, 70, 10));

        let wide = Rect::new(0, 0, u16::MAX, 50);
        let r = centered_rect(wide, 70, 10);
        assert_eq!(r.width, 45_874);
        assert!(r.x + r.width <= u16::MAX);

        let tiny = Rect::new(0, 0, 10, 3);
        let r = centered_rect(tiny, 70, 10);
        assert!(r.width <= 10 && r.height <= 3);
    }
}
