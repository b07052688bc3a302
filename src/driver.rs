//! Startup and the main loop.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::PathBuf;

use crate::cli::Invocation;
use crate::config::UiLevel;
use crate::error::{DustpanError, Result};
use crate::scanner::{ImportScan, LiveScan, ScanSource};
use crate::tui::{App, Clock, Scheduler, Screen, ScanView, Session, Signal, SystemClock, TerminalScreen};

fn open_export(target: &str) -> Result<Box<dyn Write>> {
    if target == "-" {
        return Ok(Box::new(io::stdout()));
    }
    let file = File::create(target).map_err(|source| DustpanError::Io {
        path: PathBuf::from(target),
        source,
    })?;
    Ok(Box::new(BufWriter::new(file)))
}

fn open_import(source: &str) -> Result<Box<dyn Read>> {
    if source == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(source).map_err(|err| DustpanError::Io {
        path: PathBuf::from(source),
        source: err,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Run a whole session: scan (or import), then export or browse.
pub fn run(invocation: Invocation) -> Result<()> {
    let ui = invocation.ui_level();
    let use_dev_tty = invocation.uses_dev_tty();

    // Keys typed into a pipe could confirm a deletion; insist on a real terminal.
    let wants_terminal = ui == UiLevel::Full || invocation.export.is_none();
    if wants_terminal && !use_dev_tty && !io::stdin().is_terminal() {
        return Err(DustpanError::NotATty);
    }

    let export = invocation.export.as_deref().map(open_export).transpose()?;
    let (source, importing): (Box<dyn ScanSource>, bool) = match invocation.import.as_deref() {
        Some(name) => (Box::new(ImportScan::new(open_import(name)?)), true),
        None => (
            Box::new(LiveScan::new(
                invocation.scan_root(),
                invocation.config.scan_options(),
            )),
            false,
        ),
    };
    tracing::info!(
        root = invocation.scan_root(),
        import = ?invocation.import,
        export = ?invocation.export,
        ?ui,
        "Starting session"
    );

    let mut session = Session::new(invocation.config, ui);
    session.export = export;
    let mut app = App::new(session, ScanView::new(source, importing));
    let mut scheduler = Scheduler::new(TerminalScreen::new(use_dev_tty), SystemClock);

    let result = run_loop(&mut scheduler, &mut app);
    let restored = scheduler.teardown();
    app.session.config.excludes.clear();
    result?;
    restored?;

    // Input can close while a fatal error is still waiting to be acknowledged.
    let fatal = app
        .session
        .exit_error
        .take()
        .or_else(|| app.session.tracker.fatal().map(str::to_owned));
    if let Some(message) = fatal {
        return Err(DustpanError::ScanAborted(message));
    }
    tracing::info!("Session finished");
    Ok(())
}

/// Tick until a mode asks to stop.
pub fn run_loop<S: Screen, C: Clock>(scheduler: &mut Scheduler<S, C>, app: &mut App) -> Result<()> {
    loop {
        let policy = app.policy();
        if scheduler.tick(app, policy)? == Signal::Terminate {
            return Ok(());
        }
    }
}
