//! Interactive front end: modes, the terminal and the main loop scheduler.

pub mod app;
pub mod browse;
pub mod dialogs;
pub mod scan;
pub mod scheduler;
pub mod screen;
pub mod ui;

pub use app::{App, Mode, ModeOps, Session, Signal, Surface, Transition};
pub use scan::ScanView;
pub use scheduler::{BlockPolicy, Clock, MinSize, Scheduler, SystemClock};
pub use screen::{Negotiation, Screen, TerminalScreen};
