//! Decides when to redraw and how long to wait for input.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use crossterm::event::{Event, KeyEventKind};
use nix::errno::Errno;
use ratatui::Frame;

use crate::error::{DustpanError, Result};

use super::app::{App, Mode, Signal, Surface, Transition};
use super::screen::{Negotiation, Screen};

/// Smallest terminal the dashboard is laid out for.
pub const MIN_ROWS: u16 = 17;
pub const MIN_COLS: u16 = 60;

/// Buckets are computed from the wall clock modulo this many milliseconds.
const BUCKET_WRAP_MS: u64 = 1_000_000;

/// How a tick waits for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Draw every tick and never wait.
    AlwaysPollNonBlocking,
    /// Draw, then sleep until an event arrives.
    BlockUntilInput,
    /// Draw at most once per refresh interval and never wait.
    PollThrottled,
}

pub trait Clock {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Minimum size constraint. Switched off for good once the operator ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinSize {
    Enforced { rows: u16, cols: u16 },
    Disabled,
}

pub struct Scheduler<S: Screen, C: Clock> {
    screen: S,
    clock: C,
    min_size: MinSize,
    last_bucket: Option<u64>,
    redraws: u64,
}

/// Errors meaning the input side of the terminal is gone.
fn input_closed(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof
    ) {
        return true;
    }
    matches!(
        err.raw_os_error().map(Errno::from_raw),
        Some(Errno::EPIPE | Errno::EBADF | Errno::EIO)
    )
}

impl<S: Screen, C: Clock> Scheduler<S, C> {
    pub fn new(screen: S, clock: C) -> Self {
        Self {
            screen,
            clock,
            min_size: MinSize::Enforced {
                rows: MIN_ROWS,
                cols: MIN_COLS,
            },
            last_bucket: None,
            redraws: 0,
        }
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    pub fn min_size(&self) -> MinSize {
        self.min_size
    }

    pub fn screen(&self) -> &S {
        &self.screen
    }

    /// Restore the terminal if it was ever set up.
    pub fn teardown(&mut self) -> Result<()> {
        if self.screen.is_active() {
            self.screen.teardown().map_err(DustpanError::Terminal)?;
            tracing::debug!("Terminal restored");
        }
        Ok(())
    }

    /// Run one iteration of the main loop.
    pub fn tick(&mut self, app: &mut App, policy: BlockPolicy) -> Result<Signal> {
        if app.needs_terminal() && !self.screen.is_active() {
            self.screen.init().map_err(DustpanError::Terminal)?;
            tracing::debug!("Terminal initialized");
            if self.negotiate() == Signal::Terminate {
                return Ok(Signal::Terminate);
            }
        }

        let draw = match policy {
            BlockPolicy::PollThrottled => self.bucket_advanced(app.session.config.update_delay),
            _ => true,
        };
        if draw {
            self.redraw(app)?;
        }

        let mut scan_key = None;
        if self.screen.is_active() {
            let mut block = policy == BlockPolicy::BlockUntilInput;
            loop {
                let event = match self.screen.read_event(block) {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(err) if input_closed(&err) => {
                        tracing::info!(error = %err, "Input closed");
                        return Ok(Signal::Terminate);
                    }
                    Err(err) => return Err(DustpanError::Terminal(err)),
                };
                block = false;

                match event {
                    Event::Resize(..) => {
                        if self.negotiate() == Signal::Terminate {
                            return Ok(Signal::Terminate);
                        }
                        self.redraw(app)?;
                    }
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        let signal = app.handle_key(key);
                        if app.is_scanning() {
                            scan_key = Some(signal);
                        } else if signal == Signal::Terminate {
                            return Ok(Signal::Terminate);
                        }
                        break;
                    }
                    _ => {}
                }
            }
        }

        if app.is_scanning() {
            let done = match policy {
                BlockPolicy::BlockUntilInput => scan_key == Some(Signal::Terminate),
                _ => app.advance() == Signal::Terminate,
            };
            if done {
                app.finish_scan()?;
            }
        }

        app.apply_pending();
        if matches!(app.mode, Mode::ShellEscape(_)) {
            self.escape_to_shell(app)?;
        }
        if app.is_quitting() {
            return Ok(Signal::Terminate);
        }
        Ok(Signal::Continue)
    }

    fn redraw(&mut self, app: &mut App) -> Result<()> {
        if self.screen.is_active() && app.needs_terminal() {
            self.screen
                .draw(&mut |frame: &mut Frame| app.draw(Surface::Frame(frame)))
                .map_err(DustpanError::Terminal)?;
        } else {
            app.draw(Surface::Headless);
        }
        self.redraws += 1;
        Ok(())
    }

    /// Whether the refresh bucket moved forward. A bucket at or behind the
    /// previous one becomes the new baseline without a redraw.
    fn bucket_advanced(&mut self, update_delay: u64) -> bool {
        let bucket = (self.clock.now_millis() % BUCKET_WRAP_MS) / update_delay.max(1);
        match self.last_bucket.replace(bucket) {
            Some(previous) => bucket > previous,
            None => true,
        }
    }

    fn negotiate(&mut self) -> Signal {
        let MinSize::Enforced { rows, cols } = self.min_size else {
            return Signal::Continue;
        };
        match self.screen.negotiate(rows, cols) {
            Ok(Negotiation::Fits) => Signal::Continue,
            Ok(Negotiation::Quit) => Signal::Terminate,
            Ok(Negotiation::Ignored) => {
                tracing::warn!("Terminal too small, size check disabled");
                self.min_size = MinSize::Disabled;
                Signal::Continue
            }
            Err(err) => {
                tracing::warn!(error = %err, "Size negotiation failed, size check disabled");
                self.min_size = MinSize::Disabled;
                Signal::Continue
            }
        }
    }

    fn escape_to_shell(&mut self, app: &mut App) -> Result<()> {
        self.redraw(app)?;
        let Mode::ShellEscape(view) = &app.mode else {
            return Ok(());
        };
        self.screen.suspend().map_err(DustpanError::Terminal)?;
        let result = view.spawn(&app.session);
        self.screen.resume().map_err(DustpanError::Terminal)?;

        match result {
            Ok(status) if !status.success() => {
                tracing::debug!(%status, "Shell exited");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to spawn shell");
                app.session.browse.message = Some(format!(" Error spawning shell: {err}"));
            }
        }
        app.session.request(Transition::Browse);
        app.apply_pending();
        Ok(())
    }
}
