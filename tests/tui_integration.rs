//! Integration tests for the interactive front end.
//!
//! These drive the real scheduler and modes through a scripted screen backed
//! by an in-memory terminal, so no actual terminal is required.

use std::collections::VecDeque;
use std::fs;
use std::io;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use dustpan::config::{Config, UiLevel};
use dustpan::driver::run_loop;
use dustpan::scanner::{LiveScan, ScanOptions};
use dustpan::tui::{App, BlockPolicy, Negotiation, ScanView, Scheduler, Screen, Session, Signal, SystemClock};
use ratatui::{backend::TestBackend, Frame, Terminal};
use tempfile::{tempdir, TempDir};

struct FakeScreen {
    terminal: Terminal<TestBackend>,
    active: bool,
    keys: VecDeque<Event>,
}

impl FakeScreen {
    fn new(keys: &[KeyCode]) -> Self {
        Self {
            terminal: Terminal::new(TestBackend::new(80, 24)).unwrap(),
            active: false,
            keys: keys
                .iter()
                .map(|&code| Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
                .collect(),
        }
    }

    fn contents(&self) -> String {
        let buffer = self.terminal.backend().buffer();
        buffer
            .content
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Screen for FakeScreen {
    fn is_active(&self) -> bool {
        self.active
    }

    fn init(&mut self) -> io::Result<()> {
        self.active = true;
        Ok(())
    }

    fn negotiate(&mut self, _min_rows: u16, _min_cols: u16) -> io::Result<Negotiation> {
        Ok(Negotiation::Fits)
    }

    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> io::Result<()> {
        self.terminal.draw(|frame| render(frame))?;
        Ok(())
    }

    /// Keys are handed out only once the scan has had time to finish; the
    /// scripted list ends with end-of-input.
    fn read_event(&mut self, block: bool) -> io::Result<Option<Event>> {
        if !block {
            return Ok(None);
        }
        self.keys
            .pop_front()
            .map(Some)
            .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }

    fn suspend(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn resume(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.active = false;
        Ok(())
    }
}

fn create_tree() -> TempDir {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("big")).unwrap();
    fs::write(temp.path().join("big/blob.bin"), vec![0u8; 256 * 1024]).unwrap();
    fs::create_dir(temp.path().join("small")).unwrap();
    fs::write(temp.path().join("small/note.txt"), vec![b'n'; 10_000]).unwrap();
    fs::write(temp.path().join("file1.txt"), "content").unwrap();
    temp
}

fn app_for(temp: &TempDir, config: Config) -> App {
    let source = LiveScan::new(temp.path(), ScanOptions::default());
    App::new(
        Session::new(config, UiLevel::Full),
        ScanView::new(Box::new(source), false),
    )
}

#[test]
fn test_scan_then_browse_then_quit() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    let mut scheduler = Scheduler::new(FakeScreen::new(&[KeyCode::Char('q')]), SystemClock);

    run_loop(&mut scheduler, &mut app).unwrap();

    assert!(app.is_quitting());
    let tree = app.session.tree.as_ref().unwrap();
    assert_eq!(tree.children.len(), 3);
    assert_eq!(tree.children[0].name, "big");
    assert_eq!(tree.file_count, 3);
}

#[test]
fn test_listing_is_rendered() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    let mut scheduler = Scheduler::new(FakeScreen::new(&[]), SystemClock);

    // Ends on end-of-input while browsing.
    run_loop(&mut scheduler, &mut app).unwrap();
    assert_eq!(app.mode.name(), "browsing");

    let screen = scheduler.screen().contents();
    assert!(screen.contains("/big"));
    assert!(screen.contains("/small"));
    assert!(screen.contains(" file1.txt"));
    assert!(screen.contains("Total disk usage:"));
}

#[test]
fn test_navigate_into_directory() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    let mut scheduler = Scheduler::new(
        FakeScreen::new(&[KeyCode::Down, KeyCode::Enter]),
        SystemClock,
    );

    run_loop(&mut scheduler, &mut app).unwrap();

    assert_eq!(app.session.browse.path, vec![1]);
    assert_eq!(app.session.current_dir().unwrap().name, "small");
    assert_eq!(app.session.selected_entry().unwrap().name, "note.txt");
}

#[test]
fn test_delete_flow() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    let mut scheduler = Scheduler::new(
        FakeScreen::new(&[KeyCode::Char('d'), KeyCode::Char('y')]),
        SystemClock,
    );

    run_loop(&mut scheduler, &mut app).unwrap();

    assert!(!temp.path().join("big").exists());
    let tree = app.session.tree.as_ref().unwrap();
    assert_eq!(tree.children.len(), 2);
    assert!(tree.children.iter().all(|c| c.name != "big"));
    assert_eq!(app.mode.name(), "browsing");
}

#[test]
fn test_delete_disabled_in_read_only_mode() {
    let temp = create_tree();
    let mut config = Config::default();
    config.read_only = 1;
    let mut app = app_for(&temp, config);
    let mut scheduler = Scheduler::new(
        FakeScreen::new(&[KeyCode::Char('d'), KeyCode::Char('y')]),
        SystemClock,
    );

    run_loop(&mut scheduler, &mut app).unwrap();

    assert!(temp.path().join("big").exists());
    assert_eq!(app.session.tree.as_ref().unwrap().children.len(), 3);
}

#[test]
fn test_help_round_trip() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    let mut scheduler = Scheduler::new(FakeScreen::new(&[KeyCode::Char('?')]), SystemClock);

    run_loop(&mut scheduler, &mut app).unwrap();
    assert_eq!(app.mode.name(), "help");
    assert!(scheduler.screen().contents().contains("dustpan help"));
}

#[test]
fn test_confirm_quit() {
    let temp = create_tree();
    let mut config = Config::default();
    config.confirm_quit = true;
    let mut app = app_for(&temp, config);
    let mut scheduler = Scheduler::new(
        FakeScreen::new(&[KeyCode::Char('q'), KeyCode::Char('n')]),
        SystemClock,
    );

    run_loop(&mut scheduler, &mut app).unwrap();
    assert_eq!(app.mode.name(), "browsing");

    let mut scheduler = Scheduler::new(
        FakeScreen::new(&[KeyCode::Char('q'), KeyCode::Char('y')]),
        SystemClock,
    );
    run_loop(&mut scheduler, &mut app).unwrap();
    assert!(app.is_quitting());
}

#[test]
fn test_single_tick_policies() {
    let temp = create_tree();
    let mut app = app_for(&temp, Config::default());
    assert_eq!(app.policy(), BlockPolicy::PollThrottled);

    let mut scheduler = Scheduler::new(FakeScreen::new(&[]), SystemClock);
    let policy = app.policy();
    let signal = scheduler.tick(&mut app, policy).unwrap();
    assert_eq!(signal, Signal::Continue);
    assert!(scheduler.screen().is_active());
}
