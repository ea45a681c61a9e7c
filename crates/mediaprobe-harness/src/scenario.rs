//! Browser scenarios: which browsers a test runs with and where they live.
//!
//! Tests declare a compiled-in default scenario list, and the config file can
//! replace it through its executions section without touching the test code.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::config::Properties;
use crate::error::{HarnessError, HarnessResult};

/// Default id for a single-browser scenario.
pub const DEFAULT_BROWSER_ID: &str = "browser";

/// Browser engine driven through WebDriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserKind::Chrome => f.write_str("chrome"),
            BrowserKind::Firefox => f.write_str("firefox"),
        }
    }
}

impl FromStr for BrowserKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(HarnessError::UnknownScenario { value: other.to_string() }),
        }
    }
}

/// Where a browser instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserScope {
    /// Driver started on the machine running the tests.
    #[default]
    Local,
    /// Session requested from a remote WebDriver hub.
    Remote,
    /// Session inside a container managed by the harness.
    Docker,
}

impl fmt::Display for BrowserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserScope::Local => f.write_str("local"),
            BrowserScope::Remote => f.write_str("remote"),
            BrowserScope::Docker => f.write_str("docker"),
        }
    }
}

impl FromStr for BrowserScope {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BrowserScope::Local),
            "remote" => Ok(BrowserScope::Remote),
            "docker" => Ok(BrowserScope::Docker),
            other => Err(HarnessError::UnknownScenario { value: other.to_string() }),
        }
    }
}

/// One browser slot in a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrowserSpec {
    pub id: String,
    pub kind: BrowserKind,
    #[serde(default)]
    pub scope: BrowserScope,
}

impl BrowserSpec {
    pub fn new(id: impl Into<String>, kind: BrowserKind, scope: BrowserScope) -> Self {
        Self { id: id.into(), kind, scope }
    }
}

/// A set of browsers a test is executed with. A test annotated with several
/// scenarios runs once per scenario.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestScenario {
    browsers: Vec<BrowserSpec>,
}

#[derive(Debug, Deserialize)]
struct ExecutionEntry {
    #[serde(default)]
    browsers: Vec<BrowserSpec>,
}

impl TestScenario {
    pub fn new(browsers: Vec<BrowserSpec>) -> Self {
        Self { browsers }
    }

    /// Single local Chrome, the default for most functional tests.
    pub fn local_chrome() -> Self {
        Self::new(vec![BrowserSpec::new(
            DEFAULT_BROWSER_ID,
            BrowserKind::Chrome,
            BrowserScope::Local,
        )])
    }

    /// Single local Firefox.
    pub fn local_firefox() -> Self {
        Self::new(vec![BrowserSpec::new(
            DEFAULT_BROWSER_ID,
            BrowserKind::Firefox,
            BrowserScope::Local,
        )])
    }

    /// One local Chrome and one local Firefox, for cross-browser tests.
    pub fn local_chrome_and_firefox() -> Self {
        Self::new(vec![
            BrowserSpec::new("chrome", BrowserKind::Chrome, BrowserScope::Local),
            BrowserSpec::new("firefox", BrowserKind::Firefox, BrowserScope::Local),
        ])
    }

    pub fn browsers(&self) -> &[BrowserSpec] {
        &self.browsers
    }

    /// Scenario list from the config file's executions section, replacing
    /// whatever the test compiled in. `None` when the section is absent.
    pub fn from_executions(props: &Properties) -> HarnessResult<Option<Vec<TestScenario>>> {
        let Some(raw) = props.executions() else {
            return Ok(None);
        };
        let entries: Vec<ExecutionEntry> = serde_json::from_value(raw.clone())
            .map_err(|e| HarnessError::config(format!("malformed executions section: {e}")))?;
        let scenarios: Vec<TestScenario> = entries
            .into_iter()
            .map(|entry| TestScenario::new(entry.browsers))
            .collect();
        debug!(count = scenarios.len(), "scenarios loaded from config file");
        Ok(Some(scenarios))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn kinds_and_scopes_parse_case_insensitively() {
        assert_eq!("Chrome".parse::<BrowserKind>().unwrap(), BrowserKind::Chrome);
        assert_eq!("FIREFOX".parse::<BrowserKind>().unwrap(), BrowserKind::Firefox);
        assert_eq!("docker".parse::<BrowserScope>().unwrap(), BrowserScope::Docker);
        assert!("edge".parse::<BrowserKind>().is_err());
        assert!("cloud".parse::<BrowserScope>().is_err());
    }

    #[test]
    fn compiled_scenarios_have_expected_shape() {
        let chrome = TestScenario::local_chrome();
        assert_eq!(chrome.browsers().len(), 1);
        assert_eq!(chrome.browsers()[0].id, DEFAULT_BROWSER_ID);
        assert_eq!(chrome.browsers()[0].scope, BrowserScope::Local);

        let both = TestScenario::local_chrome_and_firefox();
        assert_eq!(both.browsers().len(), 2);
        assert_eq!(both.browsers()[1].kind, BrowserKind::Firefox);
    }

    #[test]
    fn executions_replace_compiled_scenarios() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "executions": [
                    {"browsers": [{"id": "a", "kind": "firefox", "scope": "remote"}]},
                    {"browsers": [{"id": "b", "kind": "chrome"}]}
                ]
            }"#,
        )
        .unwrap();

        let props = Properties::from_file(file.path()).unwrap();
        let scenarios = TestScenario::from_executions(&props).unwrap().unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].browsers()[0].kind, BrowserKind::Firefox);
        assert_eq!(scenarios[0].browsers()[0].scope, BrowserScope::Remote);
        // Scope defaults to local when the entry omits it.
        assert_eq!(scenarios[1].browsers()[0].scope, BrowserScope::Local);
    }

    #[test]
    fn absent_executions_section_yields_none() {
        let props = Properties::empty();
        assert!(TestScenario::from_executions(&props).unwrap().is_none());
    }

    #[test]
    fn malformed_executions_are_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"executions": [{"browsers": [{"id": "a", "kind": "netscape"}]}]}"#)
            .unwrap();
        let props = Properties::from_file(file.path()).unwrap();
        assert!(TestScenario::from_executions(&props).is_err());
    }
}
