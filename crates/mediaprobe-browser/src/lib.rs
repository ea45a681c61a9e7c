//! Browser automation for media pipeline tests.
//!
//! Talks the WebDriver wire protocol to a hub (a local chromedriver /
//! geckodriver or a grid), loads the WebRTC test page, and exposes the page
//! through [`WebRtcTestPage`]: event waits, WebRTC negotiation against a
//! [`mediaprobe_client::WebRtcEndpoint`], color sampling and playback clock
//! checks.
//!
//! The page itself sits behind the [`PageDriver`] trait so suites that do
//! not need a real browser can drive a scripted page instead.

pub mod error;
pub mod page;
pub mod webdriver;

pub use error::{BrowserError, BrowserResult};
pub use page::{
    Color, PageDriver, WebDriverPageDriver, WebRtcChannel, WebRtcMode, WebRtcTestPage,
};
pub use webdriver::{WebDriverConfig, WebDriverSession, capabilities_for};
