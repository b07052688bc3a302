//! The terminal behind the dashboard.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::Paragraph};

/// Result of checking the terminal against a minimum size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    Fits,
    /// Too small, and the operator chose to carry on anyway.
    Ignored,
    /// Too small, and the operator chose to quit.
    Quit,
}

/// Everything the scheduler needs from a terminal.
pub trait Screen {
    fn is_active(&self) -> bool;

    /// Enter raw mode and the alternate screen. Calling it again is a no-op.
    fn init(&mut self) -> io::Result<()>;

    /// Wait until the terminal is at least `min_rows` x `min_cols`, or the
    /// operator decides otherwise.
    fn negotiate(&mut self, min_rows: u16, min_cols: u16) -> io::Result<Negotiation>;

    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> io::Result<()>;

    /// Next input event. Without `block`, `Ok(None)` means nothing is queued.
    fn read_event(&mut self, block: bool) -> io::Result<Option<Event>>;

    /// Hand the terminal to another program.
    fn suspend(&mut self) -> io::Result<()>;

    fn resume(&mut self) -> io::Result<()>;

    fn teardown(&mut self) -> io::Result<()>;
}

type Backend = CrosstermBackend<Box<dyn Write>>;

/// A real terminal, on stdout or on `/dev/tty` when stdout carries an export.
pub struct TerminalScreen {
    use_dev_tty: bool,
    terminal: Option<Terminal<Backend>>,
}

impl TerminalScreen {
    pub fn new(use_dev_tty: bool) -> Self {
        Self {
            use_dev_tty,
            terminal: None,
        }
    }

    fn open_writer(&self) -> io::Result<Box<dyn Write>> {
        if self.use_dev_tty {
            let tty = File::options().read(true).write(true).open("/dev/tty")?;
            Ok(Box::new(BufWriter::new(tty)))
        } else {
            Ok(Box::new(io::stdout()))
        }
    }

    fn terminal(&mut self) -> io::Result<&mut Terminal<Backend>> {
        self.terminal
            .as_mut()
            .ok_or_else(|| io::Error::other("terminal not initialized"))
    }
}

fn too_small_warning(frame: &mut Frame) {
    let text = "Warning: terminal too small,\n please either resize your terminal,\n press i to ignore, or press q to quit.";
    frame.render_widget(Paragraph::new(text), frame.area());
}

impl Screen for TerminalScreen {
    fn is_active(&self) -> bool {
        self.terminal.is_some()
    }

    fn init(&mut self) -> io::Result<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        let mut writer = self.open_writer()?;
        enable_raw_mode()?;
        execute!(writer, EnterAlternateScreen, Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(writer))?;
        terminal.clear()?;
        self.terminal = Some(terminal);
        Ok(())
    }

    fn negotiate(&mut self, min_rows: u16, min_cols: u16) -> io::Result<Negotiation> {
        loop {
            let size = self.terminal()?.size()?;
            if size.height >= min_rows && size.width >= min_cols {
                return Ok(Negotiation::Fits);
            }
            self.terminal()?.draw(too_small_warning)?;

            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('i') => return Ok(Negotiation::Ignored),
                    KeyCode::Char('q') => return Ok(Negotiation::Quit),
                    _ => {}
                },
                Event::Resize(..) => self.terminal()?.autoresize()?,
                _ => {}
            }
        }
    }

    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> io::Result<()> {
        self.terminal()?.draw(|frame| render(frame))?;
        Ok(())
    }

    fn read_event(&mut self, block: bool) -> io::Result<Option<Event>> {
        if block || event::poll(Duration::ZERO)? {
            event::read().map(Some)
        } else {
            Ok(None)
        }
    }

    fn suspend(&mut self) -> io::Result<()> {
        let terminal = self.terminal()?;
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        Ok(())
    }

    fn resume(&mut self) -> io::Result<()> {
        let terminal = self.terminal()?;
        enable_raw_mode()?;
        execute!(terminal.backend_mut(), EnterAlternateScreen, Hide)?;
        terminal.clear()
    }

    fn teardown(&mut self) -> io::Result<()> {
        if self.terminal.is_none() {
            return Ok(());
        }
        let result = self.suspend();
        self.terminal = None;
        result
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            tracing::error!(error = %err, "Failed to restore terminal");
        }
    }
}
