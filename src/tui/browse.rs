//! Directory browser: lists the children of one directory, largest first.

use std::time::SystemTime;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    prelude::*,
    widgets::{Clear, Paragraph},
};

use crate::config::Theme;
use crate::scanner::{format_size, DirEntry, Exclusion};

use super::app::{ModeOps, Session, Signal, Surface, Transition};
use super::ui::{crop_str, draw_box, put, style, Role};

/// Position in the tree, kept across mode switches.
#[derive(Debug, Clone, Default)]
pub struct BrowseState {
    /// Child indices from the root to the directory being shown.
    pub path: Vec<usize>,
    pub selected: usize,
    /// One-shot status line.
    pub message: Option<String>,
}

impl BrowseState {
    /// Indices of the selected entry.
    pub fn selection(&self) -> Vec<usize> {
        let mut indices = self.path.clone();
        indices.push(self.selected);
        indices
    }

    fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let target = self.selected as isize + delta;
        self.selected = target.clamp(0, len as isize - 1) as usize;
    }

    /// Keep the selection inside a list of `len` entries.
    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

/// Browsing mode. The quit prompt lives here so it can fall back to the list.
#[derive(Debug, Default)]
pub struct BrowseView {
    confirm_quit: bool,
    /// First visible row.
    offset: usize,
}

const PAGE: isize = 10;

impl BrowseView {
    pub fn new() -> Self {
        Self::default()
    }

    fn children_len(session: &Session) -> usize {
        session.current_dir().map(|dir| dir.children.len()).unwrap_or(0)
    }

    fn descend(&mut self, session: &mut Session) {
        let enterable = session
            .selected_entry()
            .map(|entry| entry.is_dir)
            .unwrap_or(false);
        if enterable {
            let browse = &mut session.browse;
            browse.path.push(browse.selected);
            browse.selected = 0;
            self.offset = 0;
        }
    }

    fn ascend(&mut self, session: &mut Session) {
        if let Some(idx) = session.browse.path.pop() {
            session.browse.selected = idx;
            self.offset = 0;
        }
    }

    fn request_quit(&mut self, session: &mut Session) {
        if session.config.confirm_quit {
            self.confirm_quit = true;
        } else {
            session.request(Transition::Quit);
        }
    }
}

/// One-character marker in front of the name.
fn flag(entry: &DirEntry) -> char {
    match entry.excluded {
        Some(Exclusion::Pattern) | Some(Exclusion::Cache) => '<',
        Some(Exclusion::OtherFs) => '>',
        Some(Exclusion::KernFs) => '^',
        None if entry.error.is_some() => '!',
        None if entry.has_errors() => '.',
        None if entry.is_dir && entry.children.is_empty() => 'e',
        None => ' ',
    }
}

fn bar(size: u64, max: u64, width: usize) -> String {
    let filled = if max == 0 {
        0
    } else {
        ((size as f64 / max as f64) * width as f64).round() as usize
    };
    let filled = filled.min(width);
    format!("{}{}", "#".repeat(filled), " ".repeat(width - filled))
}

fn format_mtime(mtime: Option<SystemTime>) -> String {
    let Some(secs) = mtime
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
    else {
        return " ".repeat(16);
    };
    match chrono::DateTime::from_timestamp(secs as i64, 0) {
        Some(time) => time
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => " ".repeat(16),
    }
}

fn entry_line(entry: &DirEntry, max: u64, session: &Session, width: usize) -> String {
    let size = format_size(entry.disk_usage, session.config.si);
    let mut line = format!("{} {:>10} [{}] ", flag(entry), size, bar(entry.disk_usage, max, 10));
    if session.config.extended {
        line.push_str(&format_mtime(entry.mtime));
        line.push(' ');
    }
    let used = line.chars().count();
    let name = if entry.is_dir {
        format!("/{}", entry.name)
    } else {
        format!(" {}", entry.name)
    };
    line.push_str(&crop_str(&name, width.saturating_sub(used)));
    line
}

fn draw_list(session: &Session, offset: &mut usize, frame: &mut Frame) {
    let theme = session.config.theme;
    let area = frame.area();
    let normal = style(theme, Role::Default);
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new("").style(normal), area);

    let header = format!(
        "{} {} ~ Use the arrow keys to navigate, press ? for help",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    let header_style = style(theme, Role::Header);
    put(frame, area, 0, 0, &format!("{:<width$}", header, width = usize::from(area.width)), header_style);

    let rows = usize::from(area.height.saturating_sub(3));
    let width = usize::from(area.width);
    let Some(dir) = session.current_dir() else {
        put(frame, area, 1, 0, "--- (no data) ---", normal);
        return;
    };

    let title = format!("--- {} ", dir.path.display());
    put(frame, area, 1, 0, &crop_str(&title, width), normal);

    let total = format!(
        " Total disk usage: {}  Apparent size: {}  Items: {}",
        format_size(dir.disk_usage, session.config.si),
        format_size(dir.size, session.config.si),
        dir.file_count + dir.dir_count
    );
    let max = dir.children.iter().map(|c| c.disk_usage).max().unwrap_or(0);
    let lines: Vec<(String, bool, bool)> = dir
        .children
        .iter()
        .map(|entry| (entry_line(entry, max, session, width), entry.is_dir, entry.error.is_some()))
        .collect();

    let browse = &session.browse;
    if browse.selected < *offset {
        *offset = browse.selected;
    } else if rows > 0 && browse.selected >= *offset + rows {
        *offset = browse.selected + 1 - rows;
    }

    if lines.is_empty() {
        put(frame, area, 2, 1, "(empty directory)", normal);
    }
    for (row, (idx, (text, is_dir, failed))) in lines
        .iter()
        .enumerate()
        .skip(*offset)
        .take(rows)
        .enumerate()
    {
        let line_style = if idx == browse.selected {
            style(theme, Role::Selected)
        } else if *failed {
            style(theme, Role::Flag)
        } else if *is_dir {
            style(theme, Role::Directory)
        } else {
            normal
        };
        let padded = format!("{:<width$}", text, width = width);
        put(frame, area, 2 + row as u16, 0, &padded, line_style);
    }

    let footer = browse.message.clone().unwrap_or(total);
    put(
        frame,
        area,
        area.height.saturating_sub(1),
        0,
        &format!("{:<width$}", footer, width = width),
        header_style,
    );
}

fn draw_confirm_quit(theme: Theme, frame: &mut Frame) {
    let area = draw_box(frame, theme, 5, 36, "Confirm quit");
    put(frame, area, 2, 2, "Really quit? (y/N)", style(theme, Role::Default));
}

impl ModeOps for BrowseView {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>) {
        let Surface::Frame(frame) = surface else {
            return;
        };
        draw_list(session, &mut self.offset, frame);
        if self.confirm_quit {
            draw_confirm_quit(session.config.theme, frame);
        }
    }

    fn handle_key(&mut self, session: &mut Session, key: KeyEvent) -> Signal {
        if self.confirm_quit {
            self.confirm_quit = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                session.request(Transition::Quit);
            }
            return Signal::Continue;
        }

        session.browse.message = None;
        let len = Self::children_len(session);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => session.request(Transition::Quit),
            KeyCode::Up | KeyCode::Char('k') => session.browse.move_by(-1, len),
            KeyCode::Down | KeyCode::Char('j') => session.browse.move_by(1, len),
            KeyCode::PageUp => session.browse.move_by(-PAGE, len),
            KeyCode::PageDown => session.browse.move_by(PAGE, len),
            KeyCode::Home => session.browse.selected = 0,
            KeyCode::End => session.browse.selected = len.saturating_sub(1),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => self.descend(session),
            KeyCode::Left | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Char('<') => {
                self.ascend(session)
            }
            KeyCode::Char('d') => {
                if !session.config.deletion_allowed() {
                    session.browse.message =
                        Some(" File deletion disabled in read-only mode.".into());
                } else if session.selected_entry().is_some() {
                    session.request(Transition::Delete);
                }
            }
            KeyCode::Char('b') => {
                if session.config.shell_allowed() {
                    session.request(Transition::ShellEscape);
                } else {
                    session.browse.message =
                        Some(" Shell feature disabled in read-only mode.".into());
                }
            }
            KeyCode::Char('?') => session.request(Transition::Help),
            KeyCode::Char('q') => self.request_quit(session),
            _ => {}
        }
        Signal::Continue
    }
}
