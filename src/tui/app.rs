//! Application state: the active mode and everything modes share.

use std::io::Write;

use crossterm::event::KeyEvent;
use ratatui::Frame;

use crate::config::{Config, UiLevel};
use crate::error::{DustpanError, Result};
use crate::scanner::{write_export, DirEntry};
use crate::tracker::PathTracker;

use super::browse::{BrowseState, BrowseView};
use super::dialogs::{DeleteView, HelpView, QuitView, ShellView};
use super::scan::{ScanOutcome, ScanView};
use super::scheduler::BlockPolicy;

/// Result of handing a mode work or a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Terminate,
}

/// Mode switch requested by a handler, applied by the scheduler after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Browse,
    Help,
    ShellEscape,
    Delete,
    Quit,
}

/// Where a mode draws to. Before the terminal exists (or when the UI level
/// never wants one) modes get `Headless`.
pub enum Surface<'a, 'b> {
    Frame(&'a mut Frame<'b>),
    Headless,
}

/// Operations every mode provides.
pub trait ModeOps {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>);
    fn handle_key(&mut self, session: &mut Session, key: KeyEvent) -> Signal;
}

/// State shared by all modes.
pub struct Session {
    pub config: Config,
    pub ui: UiLevel,
    pub tracker: PathTracker,
    pub tree: Option<DirEntry>,
    pub browse: BrowseState,
    /// Where a completed scan is written to, if anywhere.
    pub export: Option<Box<dyn Write>>,
    /// Set when the run ends because of a fatal scan error.
    pub exit_error: Option<String>,
    pending: Option<Transition>,
}

impl Session {
    pub fn new(config: Config, ui: UiLevel) -> Self {
        Self {
            config,
            ui,
            tracker: PathTracker::new(),
            tree: None,
            browse: BrowseState::default(),
            export: None,
            exit_error: None,
            pending: None,
        }
    }

    /// Ask for a mode switch. A later request replaces an earlier one.
    pub fn request(&mut self, transition: Transition) {
        self.pending = Some(transition);
    }

    pub fn pending(&self) -> Option<Transition> {
        self.pending
    }

    pub fn take_pending(&mut self) -> Option<Transition> {
        self.pending.take()
    }

    /// Directory currently shown by the browser.
    pub fn current_dir(&self) -> Option<&DirEntry> {
        self.tree.as_ref()?.descend(&self.browse.path)
    }

    pub fn selected_entry(&self) -> Option<&DirEntry> {
        self.current_dir()?.children.get(self.browse.selected)
    }
}

/// The active mode together with its own state.
pub enum Mode {
    Scanning(ScanView),
    Browsing(BrowseView),
    Help(HelpView),
    ShellEscape(ShellView),
    Deleting(DeleteView),
    Quitting(QuitView),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Scanning(_) => "scanning",
            Mode::Browsing(_) => "browsing",
            Mode::Help(_) => "help",
            Mode::ShellEscape(_) => "shell",
            Mode::Deleting(_) => "deleting",
            Mode::Quitting(_) => "quitting",
        }
    }

    fn ops(&mut self) -> &mut dyn ModeOps {
        match self {
            Mode::Scanning(view) => view,
            Mode::Browsing(view) => view,
            Mode::Help(view) => view,
            Mode::ShellEscape(view) => view,
            Mode::Deleting(view) => view,
            Mode::Quitting(view) => view,
        }
    }
}

pub struct App {
    pub mode: Mode,
    pub session: Session,
}

impl App {
    /// A new application, starting with a scan.
    pub fn new(session: Session, scan: ScanView) -> Self {
        Self {
            mode: Mode::Scanning(scan),
            session,
        }
    }

    pub fn draw(&mut self, surface: Surface<'_, '_>) {
        self.mode.ops().draw(&self.session, surface);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Signal {
        self.mode.ops().handle_key(&mut self.session, key)
    }

    /// One unit of scan work. Outside of scanning there is nothing to do.
    pub fn advance(&mut self) -> Signal {
        match &mut self.mode {
            Mode::Scanning(view) => view.advance(&mut self.session),
            _ => Signal::Continue,
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.mode, Mode::Scanning(_))
    }

    pub fn is_quitting(&self) -> bool {
        matches!(self.mode, Mode::Quitting(_))
    }

    /// Whether the current mode draws to the terminal.
    pub fn needs_terminal(&self) -> bool {
        match self.mode {
            Mode::Scanning(_) => self.session.ui == UiLevel::Full,
            Mode::Quitting(_) => false,
            _ => true,
        }
    }

    /// How the scheduler should wait for input in the current state.
    pub fn policy(&self) -> BlockPolicy {
        match &self.mode {
            Mode::Scanning(view) => match self.session.ui {
                UiLevel::None => BlockPolicy::AlwaysPollNonBlocking,
                UiLevel::Line => BlockPolicy::PollThrottled,
                UiLevel::Full if view.awaiting_ack(&self.session) => BlockPolicy::BlockUntilInput,
                UiLevel::Full => BlockPolicy::PollThrottled,
            },
            _ => BlockPolicy::BlockUntilInput,
        }
    }

    /// Switch modes if a handler asked for it.
    pub fn apply_pending(&mut self) {
        let Some(transition) = self.session.take_pending() else {
            return;
        };
        let next = match transition {
            Transition::Browse => Mode::Browsing(BrowseView::new()),
            Transition::Help => Mode::Help(HelpView),
            Transition::ShellEscape => Mode::ShellEscape(ShellView),
            Transition::Delete => match DeleteView::for_selection(&self.session) {
                Some(view) => Mode::Deleting(view),
                None => Mode::Browsing(BrowseView::new()),
            },
            Transition::Quit => Mode::Quitting(QuitView),
        };
        tracing::debug!(from = self.mode.name(), to = next.name(), "Mode transition");
        self.mode = next;
    }

    /// End the scanning mode and pick what comes next.
    ///
    /// A completed scan is either exported (and the run ends) or browsed.
    pub fn finish_scan(&mut self) -> Result<()> {
        let Mode::Scanning(view) = &mut self.mode else {
            return Ok(());
        };
        let (outcome, tree) = view.finish(&self.session);
        tracing::info!(?outcome, items = view.items(), "Scan finished");

        match outcome {
            ScanOutcome::Completed => match self.session.export.as_mut() {
                Some(out) => {
                    if let Some(root) = &tree {
                        write_export(&mut *out, root).map_err(DustpanError::Export)?;
                        out.flush().map_err(DustpanError::Export)?;
                    }
                    self.session.request(Transition::Quit);
                }
                None => {
                    self.session.tree = tree;
                    self.session.browse = BrowseState::default();
                    self.session.request(Transition::Browse);
                }
            },
            ScanOutcome::Cancelled => self.session.request(Transition::Quit),
            ScanOutcome::Failed(message) => {
                self.session.exit_error = Some(message);
                self.session.request(Transition::Quit);
            }
        }
        self.apply_pending();
        Ok(())
    }
}
