//! Modes layered over the browser: help, deletion, shell escape and quit.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;

use crate::scanner::format_size;

use super::app::{ModeOps, Session, Signal, Surface, Transition};
use super::ui::{crop_str, draw_box, put, style, Role};

const HELP_KEYS: &[(&str, &str)] = &[
    ("up, k", "Move cursor up"),
    ("down, j", "Move cursor down"),
    ("right, l, enter", "Open selected directory"),
    ("left, h, <", "Open parent directory"),
    ("home, end", "Jump to first / last entry"),
    ("d", "Delete selected file or directory"),
    ("b", "Spawn shell in current directory"),
    ("?", "Show this help"),
    ("q", "Quit"),
];

const HELP_FLAGS: &[(char, &str)] = &[
    ('!', "An error occurred while reading this directory"),
    ('.', "An error occurred while reading a subdirectory"),
    ('<', "Excluded by pattern or cache tag"),
    ('>', "Excluded, on another filesystem"),
    ('^', "Excluded, Linux pseudo filesystem"),
    ('e', "Empty directory"),
];

/// Key overview. Any key goes back to the browser.
#[derive(Debug, Default)]
pub struct HelpView;

impl ModeOps for HelpView {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>) {
        let Surface::Frame(frame) = surface else {
            return;
        };
        let theme = session.config.theme;
        let height = (HELP_KEYS.len() + HELP_FLAGS.len() + 6) as u16;
        let area = draw_box(frame, theme, height, 64, "dustpan help");
        let text = style(theme, Role::Default);
        let key_style = style(theme, Role::Number);

        for (row, (keys, action)) in HELP_KEYS.iter().enumerate() {
            let row = 2 + row as u16;
            put(frame, area, row, 2, &format!("{keys:>16}"), key_style);
            put(frame, area, row, 20, action, text);
        }
        let base = 3 + HELP_KEYS.len() as u16;
        for (row, (flag, meaning)) in HELP_FLAGS.iter().enumerate() {
            let row = base + row as u16;
            put(frame, area, row, 17, &flag.to_string(), key_style);
            put(frame, area, row, 20, meaning, text);
        }
    }

    fn handle_key(&mut self, session: &mut Session, _key: KeyEvent) -> Signal {
        session.request(Transition::Browse);
        Signal::Continue
    }
}

/// Confirmation dialog for deleting the selected entry.
#[derive(Debug)]
pub struct DeleteView {
    target: Vec<usize>,
    path: PathBuf,
    is_dir: bool,
    size: u64,
    error: Option<String>,
}

impl DeleteView {
    /// Dialog for the entry under the cursor, if there is one.
    pub fn for_selection(session: &Session) -> Option<Self> {
        let target = session.browse.selection();
        let entry = session.tree.as_ref()?.descend(&target)?;
        Some(Self {
            path: entry.path.clone(),
            is_dir: entry.is_dir,
            size: entry.disk_usage,
            target,
            error: None,
        })
    }

    fn delete(&mut self, session: &mut Session) {
        let result = if self.is_dir {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Deleted");
                if let Some(tree) = session.tree.as_mut() {
                    tree.remove_at(&self.target);
                }
                let len = session
                    .current_dir()
                    .map(|dir| dir.children.len())
                    .unwrap_or(0);
                session.browse.clamp(len);
                session.request(Transition::Browse);
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Delete failed");
                self.error = Some(err.to_string());
            }
        }
    }

    fn draw_dialog(&self, session: &Session, frame: &mut Frame) {
        let theme = session.config.theme;
        let area = draw_box(frame, theme, 7, 60, "Confirm delete");
        let text = style(theme, Role::Default);
        let path = crop_str(&self.path.to_string_lossy(), 40);

        match &self.error {
            Some(error) => {
                put(frame, area, 2, 2, &format!("Error deleting {path}:"), style(theme, Role::Error));
                put(frame, area, 3, 4, &crop_str(error, 52), text);
                put(frame, area, 5, 30, "press any key to continue...", text);
            }
            None => {
                let what = if self.is_dir { "directory" } else { "file" };
                put(frame, area, 2, 2, &format!("Are you sure you want to delete {what}"), text);
                put(
                    frame,
                    area,
                    3,
                    2,
                    &format!("\"{path}\" ({})?", format_size(self.size, session.config.si)),
                    text,
                );
                put(frame, area, 5, 2, "y = yes, any other key = no", style(theme, Role::Number));
            }
        }
    }
}

impl ModeOps for DeleteView {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>) {
        if let Surface::Frame(frame) = surface {
            self.draw_dialog(session, frame);
        }
    }

    fn handle_key(&mut self, session: &mut Session, key: KeyEvent) -> Signal {
        if self.error.is_none() && matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            self.delete(session);
        } else {
            session.request(Transition::Browse);
        }
        Signal::Continue
    }
}

/// Environment variable holding the shell nesting depth.
pub const LEVEL_ENV: &str = "DUSTPAN_LEVEL";

/// Shown for the instant before the terminal is handed to the shell.
#[derive(Debug, Default)]
pub struct ShellView;

impl ShellView {
    /// Run an interactive shell in the browsed directory and wait for it.
    pub fn spawn(&self, session: &Session) -> io::Result<ExitStatus> {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string());
        let level = std::env::var(LEVEL_ENV)
            .ok()
            .and_then(|l| l.parse::<u32>().ok())
            .unwrap_or(0);
        let dir = session
            .current_dir()
            .map(|dir| dir.path.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::info!(%shell, dir = %dir.display(), "Spawning shell");
        Command::new(&shell)
            .current_dir(&dir)
            .env(LEVEL_ENV, (level + 1).to_string())
            .status()
    }
}

impl ModeOps for ShellView {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>) {
        if let Surface::Frame(frame) = surface {
            let theme = session.config.theme;
            let area = draw_box(frame, theme, 5, 40, "Shell");
            put(frame, area, 2, 2, "Starting shell...", style(theme, Role::Default));
        }
    }

    fn handle_key(&mut self, _session: &mut Session, _key: KeyEvent) -> Signal {
        Signal::Continue
    }
}

/// Terminal mode. Nothing is drawn and every key ends the loop.
#[derive(Debug, Default)]
pub struct QuitView;

impl ModeOps for QuitView {
    fn draw(&mut self, _session: &Session, _surface: Surface<'_, '_>) {}

    fn handle_key(&mut self, _session: &mut Session, _key: KeyEvent) -> Signal {
        Signal::Terminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, UiLevel};
    use crate::scanner::scan_directory;
    use crate::scanner::ScanOptions;
    use crate::tui::testing::render_to_string;
    use crossterm::event::KeyModifiers;
    use tempfile::TempDir;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn scanned_session(dir: &TempDir) -> Session {
        let mut session = Session::new(Config::default(), UiLevel::Full);
        session.tree = Some(scan_directory(dir.path(), &ScanOptions::default()).unwrap());
        session
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("big")).unwrap();
        fs::write(dir.path().join("big/blob"), vec![0u8; 64 * 1024]).unwrap();
        fs::write(dir.path().join("small"), b"x").unwrap();
        dir
    }

    #[test]
    fn help_returns_to_browser() {
        let mut session = Session::new(Config::default(), UiLevel::Full);
        let mut view = HelpView;
        let screen = render_to_string(80, 24, |frame| view.draw(&session, Surface::Frame(frame)));
        assert!(screen.contains("Open parent directory"));
        assert!(screen.contains("Empty directory"));
        assert_eq!(view.handle_key(&mut session, key('x')), Signal::Continue);
        assert_eq!(session.pending(), Some(Transition::Browse));
    }

    #[test]
    fn delete_confirmed_removes_file_and_node() {
        let dir = fixture();
        let mut session = scanned_session(&dir);
        let before = session.tree.as_ref().unwrap().disk_usage;
        assert_eq!(session.selected_entry().unwrap().name, "big");

        let mut view = DeleteView::for_selection(&session).unwrap();
        let screen = render_to_string(80, 24, |frame| view.draw(&session, Surface::Frame(frame)));
        assert!(screen.contains("delete directory"));

        view.handle_key(&mut session, key('y'));
        assert!(!dir.path().join("big").exists());
        let tree = session.tree.as_ref().unwrap();
        assert_eq!(tree.children.len(), 1);
        assert!(tree.disk_usage < before);
        assert_eq!(session.pending(), Some(Transition::Browse));
        assert_eq!(session.selected_entry().unwrap().name, "small");
    }

    #[test]
    fn delete_cancelled_by_other_key() {
        let dir = fixture();
        let mut session = scanned_session(&dir);
        let mut view = DeleteView::for_selection(&session).unwrap();
        view.handle_key(&mut session, key('n'));
        assert!(dir.path().join("big").exists());
        assert_eq!(session.tree.as_ref().unwrap().children.len(), 2);
        assert_eq!(session.pending(), Some(Transition::Browse));
    }

    #[test]
    fn delete_failure_is_shown() {
        let dir = fixture();
        let mut session = scanned_session(&dir);
        fs::remove_dir_all(dir.path().join("big")).unwrap();

        let mut view = DeleteView::for_selection(&session).unwrap();
        view.handle_key(&mut session, key('y'));
        assert_eq!(session.pending(), None);
        let screen = render_to_string(80, 24, |frame| view.draw(&session, Surface::Frame(frame)));
        assert!(screen.contains("Error deleting"));

        // Next key just closes the dialog.
        view.handle_key(&mut session, key('y'));
        assert_eq!(session.pending(), Some(Transition::Browse));
        assert_eq!(session.tree.as_ref().unwrap().children.len(), 2);
    }

    #[test]
    fn no_delete_dialog_without_selection() {
        let session = Session::new(Config::default(), UiLevel::Full);
        assert!(DeleteView::for_selection(&session).is_none());
    }

    #[test]
    fn quit_view_always_terminates() {
        let mut session = Session::new(Config::default(), UiLevel::Full);
        assert_eq!(QuitView.handle_key(&mut session, key('n')), Signal::Terminate);
    }
}
