//! Shared plumbing for the mediaprobe test suites.
//!
//! This crate carries everything the functional suites need besides the
//! media-server client itself: the layered [`config::Properties`] store,
//! browser [`scenario`] definitions, the [`latch::EventLatch`] used to wait
//! for media events, media file locations, and logging setup.

pub mod config;
pub mod error;
pub mod latch;
pub mod logging;
pub mod media;
pub mod scenario;

pub use config::{Properties, Protocol, keys};
pub use error::{HarnessError, HarnessResult};
pub use latch::{EventLatch, LatchWait};
pub use logging::{LoggingConfig, init_test_logging, setup_logging};
pub use media::{default_output_file, media_url};
pub use scenario::{BrowserKind, BrowserScope, BrowserSpec, DEFAULT_BROWSER_ID, TestScenario};
