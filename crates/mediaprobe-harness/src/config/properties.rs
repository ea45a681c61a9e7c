//! Layered property store backing all test configuration.
//!
//! Lookup order for every key is always the same: explicit value (environment
//! variable, or a programmatic override set by the test itself) first, then
//! the JSON config file, then the compiled default. The environment variable
//! name for a key is the key uppercased with separators turned into
//! underscores, so `test.url.timeout` is overridden by `TEST_URL_TIMEOUT`.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::keys;
use super::Protocol;
use crate::error::{HarnessError, HarnessResult};

/// Layered view over explicit overrides, an optional JSON config file and
/// compiled defaults.
///
/// Cloning is cheap enough for test fixtures; the store is immutable after
/// construction apart from [`Properties::set`].
#[derive(Debug, Clone, Default)]
pub struct Properties {
    overrides: HashMap<String, String>,
    file_values: HashMap<String, Value>,
    executions: Option<Value>,
}

impl Properties {
    /// Store with no file layer. Defaults and the environment still apply.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the config file named by `test.config.file` (default
    /// `test.conf.json`) from the current directory. A missing file is not
    /// an error; the file layer is simply absent.
    pub fn load() -> HarnessResult<Self> {
        let file = env::var(env_key(keys::TEST_CONFIG_FILE_PROP))
            .unwrap_or_else(|_| keys::TEST_CONFIG_FILE_DEFAULT.to_string());
        Self::from_file(file)
    }

    /// Loads properties from an explicit JSON config file path.
    ///
    /// A missing file yields an empty file layer. A file that exists but
    /// does not parse is a hard error, so a typo in CI config surfaces
    /// immediately instead of silently running with defaults.
    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let root: Value = serde_json::from_str(&raw).map_err(|source| HarnessError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;

        let mut file_values = HashMap::new();
        if let Some(props) = root.get("properties").and_then(Value::as_object) {
            for (key, value) in props {
                file_values.insert(key.clone(), value.clone());
            }
        }

        // The name of the executions section is itself configurable, but only
        // through the environment since the file is what we are reading.
        let executions_key = env::var(env_key(keys::TEST_CONFIG_EXECUTIONS_PROP))
            .unwrap_or_else(|_| keys::TEST_CONFIG_EXECUTIONS_DEFAULT.to_string());
        let executions = root.get(&executions_key).cloned();

        debug!(
            path = %path.display(),
            properties = file_values.len(),
            has_executions = executions.is_some(),
            "loaded config file"
        );
        Ok(Self {
            overrides: HashMap::new(),
            file_values,
            executions,
        })
    }

    /// Sets an explicit override, above the file layer and below the
    /// environment.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Builder form of [`Properties::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Raw executions section of the config file, if present.
    pub fn executions(&self) -> Option<&Value> {
        self.executions.as_ref()
    }

    /// Resolved string value for a key, or `None` when no layer defines it.
    pub fn get_str(&self, key: &str) -> Option<String> {
        if let Ok(value) = env::var(env_key(key)) {
            return Some(value);
        }
        if let Some(value) = self.overrides.get(key) {
            return Some(value.clone());
        }
        self.file_values.get(key).map(value_to_string)
    }

    /// Resolved string value, falling back to `default`.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or_else(|| default.to_string())
    }

    /// Resolved integer value, falling back to `default`. A value that is
    /// present but not an integer is an error naming the offending key.
    pub fn get_u64_or(&self, key: &str, default: u64) -> HarnessResult<u64> {
        match self.get_str(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                HarnessError::invalid_property(key, format!("expected an integer, got '{raw}'"))
            }),
            None => Ok(default),
        }
    }

    /// Resolved port value, falling back to `default`.
    pub fn get_u16_or(&self, key: &str, default: u16) -> HarnessResult<u16> {
        match self.get_str(key) {
            Some(raw) => raw.trim().parse().map_err(|_| {
                HarnessError::invalid_property(key, format!("expected a port number, got '{raw}'"))
            }),
            None => Ok(default),
        }
    }

    /// Resolved boolean value, falling back to `default`. Accepts `true` and
    /// `false` in any case.
    pub fn get_bool_or(&self, key: &str, default: bool) -> HarnessResult<bool> {
        match self.get_str(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(HarnessError::invalid_property(
                    key,
                    format!("expected true or false, got '{raw}'"),
                )),
            },
            None => Ok(default),
        }
    }
}

/// Semantic accessors for the well-known keys in [`keys`].
impl Properties {
    /// URL of the application under test, composed from protocol, host, port
    /// and path keys.
    pub fn app_url(&self) -> HarnessResult<String> {
        let protocol = self.protocol()?;
        let host = self
            .get_str(keys::TEST_HOST_PROP)
            .or_else(|| self.get_str(keys::TEST_PUBLIC_IP_PROP))
            .unwrap_or_else(|| keys::TEST_PUBLIC_IP_DEFAULT.to_string());
        let port = self.get_u16_or(keys::APP_HTTP_PORT_PROP, keys::APP_HTTP_PORT_DEFAULT)?;
        let path = self.get_str_or(keys::TEST_PATH_PROP, keys::TEST_PATH_DEFAULT);
        Ok(format!("{protocol}://{host}:{port}{path}"))
    }

    /// Protocol used to reach the application under test.
    pub fn protocol(&self) -> HarnessResult<Protocol> {
        let raw = self.get_str_or(keys::TEST_PROTOCOL_PROP, keys::TEST_PROTOCOL_DEFAULT);
        raw.parse()
            .map_err(|_| HarnessError::invalid_property(keys::TEST_PROTOCOL_PROP, format!("unknown protocol '{raw}'")))
    }

    /// Timeout in seconds for page loads and bounded event waits.
    pub fn url_timeout_secs(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::TEST_URL_TIMEOUT_PROP, keys::TEST_URL_TIMEOUT_DEFAULT)
    }

    /// Address of the WebDriver hub.
    pub fn hub_address(&self) -> String {
        self.get_str_or(keys::WEBDRIVER_HUB_ADDRESS_PROP, keys::WEBDRIVER_HUB_ADDRESS_DEFAULT)
    }

    /// Port of the WebDriver hub.
    pub fn hub_port(&self) -> HarnessResult<u16> {
        self.get_u16_or(keys::WEBDRIVER_HUB_PORT_PROP, keys::WEBDRIVER_HUB_PORT_DEFAULT)
    }

    /// Full hub URL. An explicit `webdriver.remote.hub.url` wins over the
    /// address/port pair.
    pub fn hub_url(&self) -> HarnessResult<String> {
        if let Some(url) = self.get_str(keys::WEBDRIVER_REMOTE_HUB_URL_PROP) {
            return Ok(url);
        }
        Ok(format!("http://{}:{}/wd/hub", self.hub_address(), self.hub_port()?))
    }

    /// Timeout in seconds for remote driver instantiation.
    pub fn remote_driver_timeout_secs(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::WEBDRIVER_REMOTE_TIMEOUT_PROP, keys::WEBDRIVER_REMOTE_TIMEOUT_DEFAULT)
    }

    /// Whether browser sessions should be recorded.
    pub fn record_sessions(&self) -> HarnessResult<bool> {
        self.get_bool_or(keys::TEST_BROWSER_RECORD_PROP, keys::TEST_BROWSER_RECORD_DEFAULT)
    }

    /// WebSocket URI of the media server control endpoint. The `.url` export
    /// alias is honored when the primary key is unset.
    pub fn media_server_ws_uri(&self) -> String {
        self.get_str(keys::MEDIA_SERVER_WS_URI_PROP)
            .or_else(|| self.get_str(keys::MEDIA_SERVER_WS_URI_PROP_EXPORT))
            .unwrap_or_else(|| keys::MEDIA_SERVER_WS_URI_DEFAULT.to_string())
    }

    /// WebSocket URI of the fake media server, with the same alias handling
    /// as [`Properties::media_server_ws_uri`].
    pub fn fake_media_server_ws_uri(&self) -> String {
        self.get_str(keys::FAKE_MEDIA_SERVER_WS_URI_PROP)
            .or_else(|| self.get_str(keys::FAKE_MEDIA_SERVER_WS_URI_PROP_EXPORT))
            .unwrap_or_else(|| keys::FAKE_MEDIA_SERVER_WS_URI_DEFAULT.to_string())
    }

    /// HTTP port of the media server management interface.
    pub fn media_server_http_port(&self) -> HarnessResult<u16> {
        self.get_u16_or(keys::MEDIA_SERVER_HTTP_PORT_PROP, keys::MEDIA_SERVER_HTTP_PORT_DEFAULT)
    }

    /// Autostart policy for the media server (`false`, `test`, `testclass`
    /// or `testsuite`).
    pub fn media_server_autostart(&self) -> String {
        self.get_str_or(keys::MEDIA_SERVER_AUTOSTART_PROP, keys::MEDIA_SERVER_AUTOSTART_DEFAULT)
    }

    /// Where the media server runs: `local` or `docker`.
    pub fn media_server_scope(&self) -> String {
        self.get_str_or(keys::MEDIA_SERVER_SCOPE_PROP, keys::MEDIA_SERVER_SCOPE_DEFAULT)
    }

    /// Root directory for media files served from local disk. The legacy
    /// un-suffixed key is honored when the `.disk` form is unset.
    pub fn files_disk_path(&self) -> String {
        self.get_str(keys::TEST_FILES_DISK_PROP)
            .or_else(|| self.get_str(keys::TEST_FILES_DISK_PROP_OLD))
            .unwrap_or_else(|| keys::TEST_FILES_DISK_DEFAULT.to_string())
    }

    /// Bucket root for media files stored in S3, with legacy alias handling.
    pub fn files_s3_path(&self) -> String {
        self.get_str(keys::TEST_FILES_S3_PROP)
            .or_else(|| self.get_str(keys::TEST_FILES_S3_PROP_OLD))
            .unwrap_or_else(|| keys::TEST_FILES_S3_DEFAULT.to_string())
    }

    /// Host root for media files served over HTTP.
    pub fn files_http_path(&self) -> String {
        self.get_str_or(keys::TEST_FILES_HTTP_PROP, keys::TEST_FILES_HTTP_DEFAULT)
    }

    /// Host root for media files stored in MongoDB.
    pub fn files_mongo_path(&self) -> String {
        self.get_str_or(keys::TEST_FILES_MONGO_PROP, keys::TEST_FILES_MONGO_DEFAULT)
    }

    /// Scratch directory for files the tests create.
    pub fn workspace(&self) -> String {
        self.get_str_or(keys::TEST_WORKSPACE_PROP, keys::TEST_WORKSPACE_DEFAULT)
    }

    /// Scratch directory as seen from the docker host.
    pub fn workspace_host(&self) -> String {
        self.get_str_or(keys::TEST_WORKSPACE_HOST_PROP, keys::TEST_WORKSPACE_HOST_DEFAULT)
    }

    /// Directory test reports are written to.
    pub fn project_path(&self) -> String {
        self.get_str_or(keys::TEST_PROJECT_PATH_PROP, keys::TEST_PROJECT_PATH_DEFAULT)
    }

    /// How many times a failed test is retried.
    pub fn num_retries(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::TEST_NUM_RETRIES_PROP, keys::TEST_NUM_RETRIES_DEFAULT)
    }

    /// Sampling period of the system monitor, in milliseconds.
    pub fn monitor_rate_ms(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::MONITOR_RATE_PROP, keys::MONITOR_RATE_DEFAULT)
    }

    /// Ramp-up delay between parallel browser launches, in milliseconds.
    pub fn client_rate_ms(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::CLIENT_RATE_PROP, keys::CLIENT_RATE_DEFAULT)
    }

    /// How long parallel browsers stay open after the last one launches, in
    /// milliseconds.
    pub fn hold_time_ms(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::HOLD_TIME_PROP, keys::HOLD_TIME_DEFAULT)
    }

    /// Window title offered when a browser asks which screen to share.
    pub fn screen_share_title(&self) -> String {
        let default = if cfg!(windows) {
            keys::TEST_SCREEN_SHARE_TITLE_DEFAULT_WIN
        } else {
            keys::TEST_SCREEN_SHARE_TITLE_DEFAULT
        };
        self.get_str_or(keys::TEST_SCREEN_SHARE_TITLE_PROP, default)
    }

    /// Repetitions for seek stress tests.
    pub fn seek_repetitions(&self) -> HarnessResult<u64> {
        self.get_u64_or(keys::TEST_SEEK_REPETITIONS_PROP, keys::TEST_SEEK_REPETITIONS_DEFAULT)
    }

    /// S3 bucket for recorder output, when configured.
    pub fn s3_bucket_name(&self) -> Option<String> {
        self.get_str(keys::S3_BUCKET_NAME_PROP)
    }

    /// S3 endpoint host, when configured.
    pub fn s3_hostname(&self) -> Option<String> {
        let hostname = self.get_str(keys::S3_HOSTNAME_PROP);
        if hostname.is_none() && self.s3_bucket_name().is_some() {
            warn!("s3 bucket configured without an s3 hostname");
        }
        hostname
    }
}

fn env_key(key: &str) -> String {
    key.replace(['.', '-'], "_").to_ascii_uppercase()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn props_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let props = Properties::empty();
        assert_eq!(props.url_timeout_secs().unwrap(), 30);
        assert_eq!(props.hub_port().unwrap(), 4444);
        assert_eq!(props.app_url().unwrap(), "https://127.0.0.1:8443/");
        assert_eq!(props.media_server_ws_uri(), "ws://localhost:8888/mediaserver");
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let file = props_file(
            r#"{"properties": {"test.url.timeout": 5, "test.protocol": "http", "test.host": "app.local"}}"#,
        );
        let props = Properties::from_file(file.path()).unwrap();
        assert_eq!(props.url_timeout_secs().unwrap(), 5);
        assert_eq!(props.app_url().unwrap(), "http://app.local:8443/");
    }

    #[test]
    fn explicit_override_beats_file() {
        let file = props_file(r#"{"properties": {"test.url.timeout": 5}}"#);
        let props = Properties::from_file(file.path())
            .unwrap()
            .with(keys::TEST_URL_TIMEOUT_PROP, "7");
        assert_eq!(props.url_timeout_secs().unwrap(), 7);
    }

    #[test]
    #[serial_test::serial]
    fn environment_beats_explicit_override() {
        let props = Properties::empty().with(keys::TEST_URL_TIMEOUT_PROP, "7");
        unsafe { env::set_var("TEST_URL_TIMEOUT", "9") };
        let timeout = props.url_timeout_secs();
        unsafe { env::remove_var("TEST_URL_TIMEOUT") };
        assert_eq!(timeout.unwrap(), 9);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let props = Properties::from_file("/nonexistent/test.conf.json").unwrap();
        assert_eq!(props.hub_address(), "127.0.0.1");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = props_file("{not json");
        let err = Properties::from_file(file.path()).unwrap_err();
        assert!(matches!(err, HarnessError::ConfigFile { .. }));
    }

    #[test]
    fn non_integer_value_names_the_key() {
        let props = Properties::empty().with(keys::TEST_URL_TIMEOUT_PROP, "soon");
        let err = props.url_timeout_secs().unwrap_err();
        assert!(err.to_string().contains(keys::TEST_URL_TIMEOUT_PROP));
    }

    #[test]
    fn legacy_alias_is_honored() {
        let props = Properties::empty().with(keys::TEST_FILES_DISK_PROP_OLD, "/srv/media");
        assert_eq!(props.files_disk_path(), "/srv/media");

        let props = props.with(keys::TEST_FILES_DISK_PROP, "/srv/other");
        assert_eq!(props.files_disk_path(), "/srv/other");
    }

    #[test]
    fn executions_section_is_exposed() {
        let file = props_file(
            r#"{"properties": {}, "executions": [{"browsers": [{"id": "browser", "kind": "chrome"}]}]}"#,
        );
        let props = Properties::from_file(file.path()).unwrap();
        let executions = props.executions().unwrap();
        assert!(executions.is_array());
    }

    #[test]
    fn ws_uri_export_alias_is_honored() {
        let props = Properties::empty().with(keys::MEDIA_SERVER_WS_URI_PROP_EXPORT, "ws://10.0.0.5:8888/mediaserver");
        assert_eq!(props.media_server_ws_uri(), "ws://10.0.0.5:8888/mediaserver");
    }
}
