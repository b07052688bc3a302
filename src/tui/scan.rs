//! The scanning mode: drives a [`ScanSource`] and shows its progress.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use indicatif::{ProgressBar, ProgressStyle};
use ratatui::Frame;

use crate::config::UiLevel;
use crate::scanner::{format_size, DirEntry, ScanSource, Step, TreeBuilder};

use super::app::{ModeOps, Session, Signal, Surface};
use super::ui::{crop_str, draw_box, put, style, Role};

/// Entries processed per `advance` call.
pub const SCAN_BATCH: usize = 32;

/// Intervals above this get a static label instead of the animation.
const ANIMATION_MAX_DELAY_MS: u64 = 1000;

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

pub struct ScanView {
    source: Box<dyn ScanSource>,
    builder: TreeBuilder,
    label: &'static str,
    anpos: usize,
    progress: Option<ProgressBar>,
    cancelled: bool,
    done: bool,
}

impl ScanView {
    pub fn new(source: Box<dyn ScanSource>, importing: bool) -> Self {
        Self {
            source,
            builder: TreeBuilder::new(),
            label: if importing { "Loading..." } else { "Scanning..." },
            anpos: 0,
            progress: None,
            cancelled: false,
            done: false,
        }
    }

    /// Run one bounded unit of traversal work.
    pub fn advance(&mut self, session: &mut Session) -> Signal {
        if self.cancelled || self.done {
            return Signal::Terminate;
        }
        if session.tracker.fatal().is_some() {
            return self.after_fatal(session);
        }

        match self
            .source
            .step(&mut self.builder, &mut session.tracker, SCAN_BATCH)
        {
            Ok(Step::More) => Signal::Continue,
            Ok(Step::Done) => {
                self.done = true;
                Signal::Terminate
            }
            Err(err) => {
                tracing::debug!(error = %err, "Fatal scan error");
                session.tracker.set_fatal(Some(err.to_string()));
                self.after_fatal(session)
            }
        }
    }

    /// The dashboard waits for an acknowledgement, everything else stops right away.
    fn after_fatal(&self, session: &Session) -> Signal {
        if session.ui == UiLevel::Full {
            Signal::Continue
        } else {
            Signal::Terminate
        }
    }

    /// Whether a fatal error is on screen and nothing can happen until a key is pressed.
    pub fn awaiting_ack(&self, session: &Session) -> bool {
        session.ui == UiLevel::Full && session.tracker.fatal().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn items(&self) -> u64 {
        self.builder.items()
    }

    /// Stop feedback output and hand out the tree built so far.
    pub fn finish(&mut self, session: &Session) -> (ScanOutcome, Option<DirEntry>) {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
        let outcome = match session.tracker.fatal() {
            Some(message) => ScanOutcome::Failed(message.to_string()),
            None if self.done => ScanOutcome::Completed,
            None => ScanOutcome::Cancelled,
        };
        (outcome, self.builder.finish())
    }

    fn draw_line(&mut self, session: &Session) {
        let bar = self.progress.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        });
        bar.set_message(format!(
            "{} items, {}: {}",
            self.builder.items(),
            format_size(self.builder.total_size(), session.config.si),
            crop_str(session.tracker.current(), 50),
        ));
        bar.tick();
    }

    fn draw_progress(&mut self, session: &Session, frame: &mut Frame) {
        let theme = session.config.theme;
        let width = frame.area().width.min(60).max(40);
        let area = draw_box(frame, theme, 10, width, self.label);
        let text = style(theme, Role::Default);
        let number = style(theme, Role::Number);

        put(frame, area, 2, 2, "Total items: ", text);
        put(frame, area, 2, 15, &format!("{:<8}", self.builder.items()), number);
        put(frame, area, 2, 23, "size: ", text);
        put(
            frame,
            area,
            2,
            29,
            &format_size(self.builder.total_size(), session.config.si),
            number,
        );
        put(frame, area, 3, 2, "Current item: ", text);
        put(
            frame,
            area,
            3,
            16,
            &crop_str(session.tracker.current(), usize::from(width.saturating_sub(18))),
            text,
        );
        put(frame, area, 8, width.saturating_sub(18), "Press ", text);
        put(frame, area, 8, width.saturating_sub(12), "q", number);
        put(frame, area, 8, width.saturating_sub(11), " to abort", text);

        if let Some(path) = session.tracker.last_error() {
            put(frame, area, 5, 2, "Warning:", style(theme, Role::Error));
            put(
                frame,
                area,
                5,
                11,
                &format!(
                    "error scanning {}",
                    crop_str(path, usize::from(width.saturating_sub(28)))
                ),
                text,
            );
            put(frame, area, 6, 3, "some directory sizes may not be correct", text);
        }

        let label = if session.config.update_delay <= ANIMATION_MAX_DELAY_MS {
            self.anpos = (self.anpos + 1) % (self.label.len() * 2);
            marquee_frame(self.label, self.anpos)
        } else {
            self.label.to_string()
        };
        put(frame, area, 8, 3, &label, text);
    }

    fn draw_error(&self, session: &Session, message: &str, frame: &mut Frame) {
        let theme = session.config.theme;
        let width = frame.area().width.min(60).max(40);
        let area = draw_box(frame, theme, 7, width, "Error!");
        let text = style(theme, Role::Default);

        put(frame, area, 2, 2, "Error:", style(theme, Role::Error));
        put(
            frame,
            area,
            2,
            9,
            &format!(
                "could not open {}",
                crop_str(session.tracker.current(), usize::from(width.saturating_sub(26)))
            ),
            text,
        );
        put(frame, area, 3, 4, &crop_str(message, usize::from(width.saturating_sub(8))), text);
        put(
            frame,
            area,
            5,
            width.saturating_sub(30),
            "press any key to continue...",
            text,
        );
    }
}

impl ModeOps for ScanView {
    fn draw(&mut self, session: &Session, surface: Surface<'_, '_>) {
        match surface {
            Surface::Frame(frame) => match session.tracker.fatal() {
                Some(message) => self.draw_error(session, message, frame),
                None => self.draw_progress(session, frame),
            },
            Surface::Headless if session.ui == UiLevel::Line => self.draw_line(session),
            Surface::Headless => {}
        }
    }

    fn handle_key(&mut self, session: &mut Session, key: KeyEvent) -> Signal {
        // Any key dismisses a fatal error and ends the scan.
        if session.tracker.fatal().is_some() {
            return Signal::Terminate;
        }
        let ctrl_c =
            key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code == KeyCode::Char('q') || ctrl_c {
            tracing::info!("Scan cancelled");
            self.cancelled = true;
            return Signal::Terminate;
        }
        Signal::Continue
    }
}

/// Frame `pos` of the label animation, for `pos` in `0..2 * label.len()`.
///
/// The first half reveals the label letter by letter, the second half hides it
/// again from the left.
pub fn marquee_frame(label: &str, pos: usize) -> String {
    let len = label.len();
    label
        .char_indices()
        .map(|(i, c)| {
            let visible = if pos < len { i <= pos } else { i > pos - len };
            if visible {
                c
            } else {
                ' '
            }
        })
        .collect()
}
