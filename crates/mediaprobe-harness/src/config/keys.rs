//! Test property keys and their compiled defaults.
//!
//! Every key the harness reads is declared here next to its default, so the
//! whole configuration surface of a test run can be audited in one place.
//! Values come from the explicit layer (environment variable or programmatic
//! override), then the JSON config file, then these defaults.

// Host (address, port, protocol, path) of the application under test
pub const TEST_HOST_PROP: &str = "test.host";
pub const TEST_PUBLIC_IP_PROP: &str = "test.public.ip";
pub const TEST_PUBLIC_IP_DEFAULT: &str = "127.0.0.1";

pub const TEST_PORT_PROP: &str = "test.port";
pub const TEST_PUBLIC_PORT_PROP: &str = "test.public.port";
pub const APP_HTTP_PORT_PROP: &str = "server.port";
pub const APP_HTTP_PORT_DEFAULT: u16 = 8443;

pub const TEST_PATH_PROP: &str = "test.path";
pub const TEST_PATH_DEFAULT: &str = "/";

pub const TEST_PROTOCOL_PROP: &str = "test.protocol";
pub const TEST_PROTOCOL_DEFAULT: &str = "https";

pub const TEST_URL_TIMEOUT_PROP: &str = "test.url.timeout";
pub const TEST_URL_TIMEOUT_DEFAULT: u64 = 30; // seconds

pub const TEST_CONFIG_FILE_PROP: &str = "test.config.file";
pub const TEST_CONFIG_FILE_DEFAULT: &str = "test.conf.json";
pub const TEST_CONFIG_EXECUTIONS_PROP: &str = "test.config.executions";
pub const TEST_CONFIG_EXECUTIONS_DEFAULT: &str = "executions";

// Cloud browser grid
pub const CLOUD_GRID_USER_PROP: &str = "cloudgrid.user";
pub const CLOUD_GRID_KEY_PROP: &str = "cloudgrid.key";
pub const CLOUD_GRID_IDLE_TIMEOUT_PROP: &str = "cloudgrid.idle.timeout";
pub const CLOUD_GRID_IDLE_TIMEOUT_DEFAULT: u64 = 120; // seconds
pub const CLOUD_GRID_COMMAND_TIMEOUT_PROP: &str = "cloudgrid.command.timeout";
pub const CLOUD_GRID_COMMAND_TIMEOUT_DEFAULT: u64 = 300; // seconds
pub const CLOUD_GRID_COMMAND_TIMEOUT_MAX: u64 = 600; // seconds
pub const CLOUD_GRID_MAX_DURATION_PROP: &str = "cloudgrid.max.duration";
pub const CLOUD_GRID_MAX_DURATION_DEFAULT: u64 = 1800; // seconds

// WebDriver hub
pub const WEBDRIVER_VERSION_PROP: &str = "webdriver.version";
pub const WEBDRIVER_HUB_ADDRESS_PROP: &str = "webdriver.hub.address";
pub const WEBDRIVER_HUB_ADDRESS_DEFAULT: &str = "127.0.0.1";

pub const WEBDRIVER_HUB_PORT_PROP: &str = "webdriver.hub.port";
pub const WEBDRIVER_HUB_PORT_DEFAULT: u16 = 4444;

pub const WEBDRIVER_REMOTE_TIMEOUT_PROP: &str = "webdriver.remote.timeout";
pub const WEBDRIVER_REMOTE_TIMEOUT_DEFAULT: u64 = 120; // seconds

pub const TEST_NODES_LIST_PROP: &str = "test.nodes.list";
pub const TEST_NODES_LIST_DEFAULT: &str = "node-list.txt";
pub const TEST_NODES_FILE_LIST_PROP: &str = "test.nodes.file.list";
pub const TEST_NODES_URL_LIST_PROP: &str = "test.nodes.url.list";

pub const TEST_NODE_LOGIN_PROP: &str = "test.node.login";
pub const TEST_NODE_PASSWD_PROP: &str = "test.node.passwd";
pub const TEST_NODE_PEM_PROP: &str = "test.node.pem";

pub const TEST_SCREEN_SHARE_TITLE_PROP: &str = "test.screenshare.title";
pub const TEST_SCREEN_SHARE_TITLE_DEFAULT: &str = "Entire screen";
pub const TEST_SCREEN_SHARE_TITLE_DEFAULT_WIN: &str = "Screen 1";

pub const WEBDRIVER_MAX_DRIVER_ERROR_PROP: &str = "webdriver.max.driver.error";
pub const WEBDRIVER_MAX_DRIVER_ERROR_DEFAULT: u64 = 10;

pub const WEBDRIVER_REMOTE_HUB_URL_PROP: &str = "webdriver.remote.hub.url";

pub const TEST_BROWSER_SCOPE_PROP: &str = "test.browser.scope";

pub const TEST_BROWSER_RECORD_PROP: &str = "test.browser.record";
pub const TEST_BROWSER_RECORD_DEFAULT: bool = true;

// Docker images and container names
pub const DOCKER_HUB_IMAGE_PROP: &str = "docker.hub.image";
pub const DOCKER_HUB_IMAGE_DEFAULT: &str = "selenium/hub:2.48.2";

pub const DOCKER_VNCRECORDER_IMAGE_PROP: &str = "docker.vncrecorder.image";
pub const DOCKER_VNCRECORDER_IMAGE_DEFAULT: &str = "softsam/vncrecorder";

pub const DOCKER_NODE_CHROME_IMAGE_PROP: &str = "docker.node.chrome.image";
pub const DOCKER_NODE_CHROME_IMAGE_DEFAULT: &str = "selenium/node-chrome:2.48.2";

pub const DOCKER_NODE_FIREFOX_IMAGE_PROP: &str = "docker.node.firefox.image";
pub const DOCKER_NODE_FIREFOX_IMAGE_DEFAULT: &str = "selenium/node-firefox:2.48.2";

pub const DOCKER_NODE_CHROME_DEBUG_IMAGE_PROP: &str = "docker.node.chrome-debug.image";
pub const DOCKER_NODE_CHROME_DEBUG_IMAGE_DEFAULT: &str = "selenium/node-chrome-debug:2.48.1";

pub const DOCKER_NODE_FIREFOX_DEBUG_IMAGE_PROP: &str = "docker.node.firefox-debug.image";
pub const DOCKER_NODE_FIREFOX_DEBUG_IMAGE_DEFAULT: &str = "selenium/node-firefox-debug:2.48.2";

pub const DOCKER_HUB_CONTAINER_NAME_PROP: &str = "docker.hub.container.name";
pub const DOCKER_HUB_CONTAINER_NAME_DEFAULT: &str = "hub";

pub const DOCKER_VNCRECORDER_CONTAINER_NAME_PROP: &str = "docker.vncrecorder.container.name";
pub const DOCKER_VNCRECORDER_CONTAINER_NAME_DEFAULT: &str = "vncrecorder";

// Parallel browsers
pub const CLIENT_RATE_PROP: &str = "parallel.browsers.rate";
pub const CLIENT_RATE_DEFAULT: u64 = 5000; // milliseconds

pub const HOLD_TIME_PROP: &str = "parallel.browsers.holdtime";
pub const HOLD_TIME_DEFAULT: u64 = 10000; // milliseconds

// Monitor
pub const MONITOR_RATE_PROP: &str = "test.monitor.rate";
pub const MONITOR_RATE_DEFAULT: u64 = 1000; // milliseconds

// Media server
pub const MEDIA_SERVER_WS_URI_PROP: &str = "mediaserver.ws.uri";
pub const MEDIA_SERVER_WS_URI_PROP_EXPORT: &str = "mediaserver.url";
pub const MEDIA_SERVER_WS_URI_DEFAULT: &str = "ws://localhost:8888/mediaserver";

pub const MEDIA_SERVER_LOG_PATH_PROP: &str = "mediaserver.log.path";
pub const MEDIA_SERVER_LOG_PATH_DEFAULT: &str = "/var/log/media-server/";

pub const MEDIA_SERVER_GST_PLUGINS_PROP: &str = "mediaserver.gst.plugins";
pub const MEDIA_SERVER_GST_PLUGINS_DEFAULT: &str = "";

pub const MEDIA_SERVER_COMMAND_PROP: &str = "mediaserver.command";
pub const MEDIA_SERVER_COMMAND_DEFAULT: &str = "/usr/bin/media-server";

pub const MEDIA_SERVER_DEBUG_PROP: &str = "mediaserver.debug";
pub const MEDIA_SERVER_DEBUG_DEFAULT: &str = "2,*media_server*:5,*rtc*:4";

pub const MEDIA_SERVER_LOGIN_PROP: &str = "mediaserver.login";
pub const MEDIA_SERVER_PASSWD_PROP: &str = "mediaserver.passwd";
pub const MEDIA_SERVER_PEM_PROP: &str = "mediaserver.pem";

pub const MEDIA_SERVER_DOCKER_IMAGE_PROP: &str = "test.mediaserver.docker.image.name";
pub const MEDIA_SERVER_DOCKER_IMAGE_DEFAULT: &str = "mediaprobe/media-server-dev:latest";

pub const MEDIA_SERVER_DOCKER_FORCE_PULL_PROP: &str = "test.mediaserver.docker.image.forcepulling";
pub const MEDIA_SERVER_DOCKER_FORCE_PULL_DEFAULT: bool = true;

pub const MEDIA_SERVER_HTTP_PORT_PROP: &str = "mediaserver.http.port";
pub const MEDIA_SERVER_HTTP_PORT_DEFAULT: u16 = 9091;

// S3 storage
pub const S3_BUCKET_NAME_PROP: &str = "s3.bucket.name";
pub const S3_ACCESS_KEY_ID_PROP: &str = "s3.access.key.id";
pub const S3_SECRET_ACCESS_KEY_PROP: &str = "s3.secret.access.key";
pub const S3_HOSTNAME_PROP: &str = "s3.hostname";

// Autostart policy values
pub const AUTOSTART_FALSE_VALUE: &str = "false";
pub const AUTOSTART_TEST_VALUE: &str = "test";
pub const AUTOSTART_TESTCLASS_VALUE: &str = "testclass";
pub const AUTOSTART_TESTSUITE_VALUE: &str = "testsuite";

pub const MEDIA_SERVER_AUTOSTART_PROP: &str = "test.mediaserver.autostart";
pub const MEDIA_SERVER_AUTOSTART_DEFAULT: &str = AUTOSTART_TEST_VALUE;

pub const TEST_APP_AUTOSTART_PROP: &str = "test.app.autostart";
pub const TEST_APP_AUTOSTART_DEFAULT: &str = AUTOSTART_TESTSUITE_VALUE;

pub const MEDIA_SERVER_SCOPE_PROP: &str = "test.mediaserver.scope";
pub const MEDIA_SERVER_SCOPE_LOCAL: &str = "local";
pub const MEDIA_SERVER_SCOPE_DOCKER: &str = "docker";
pub const MEDIA_SERVER_SCOPE_DEFAULT: &str = MEDIA_SERVER_SCOPE_LOCAL;

// Fake media server (signaling-only stand-in)
pub const FAKE_MEDIA_SERVER_WS_URI_PROP: &str = "fake.mediaserver.ws.uri";
pub const FAKE_MEDIA_SERVER_WS_URI_DEFAULT: &str = MEDIA_SERVER_WS_URI_DEFAULT;
pub const FAKE_MEDIA_SERVER_WS_URI_PROP_EXPORT: &str = "fake.mediaserver.url";
pub const FAKE_MEDIA_SERVER_LOGIN_PROP: &str = "fake.mediaserver.login";
pub const FAKE_MEDIA_SERVER_PASSWD_PROP: &str = "fake.mediaserver.passwd";
pub const FAKE_MEDIA_SERVER_PEM_PROP: &str = "fake.mediaserver.pem";
pub const FAKE_MEDIA_SERVER_AUTOSTART_PROP: &str = "fake.mediaserver.autostart";
pub const FAKE_MEDIA_SERVER_AUTOSTART_DEFAULT: &str = AUTOSTART_FALSE_VALUE;
pub const FAKE_MEDIA_SERVER_SCOPE_PROP: &str = "fake.mediaserver.scope";
pub const FAKE_MEDIA_SERVER_SCOPE_DEFAULT: &str = MEDIA_SERVER_SCOPE_LOCAL;

// Web-app client tags
pub const WEBAPP_CLIENT_TAG_PROP: &str = "webapp.client.tag";
pub const WEBAPP_CLIENT_TAG_DEFAULT: &str = "";
pub const WEBAPP_UTILS_TAG_PROP: &str = "webapp.utils.tag";
pub const WEBAPP_UTILS_TAG_DEFAULT: &str = "";

// Test services
pub const TEST_NUM_RETRIES_PROP: &str = "test.num.retries";
pub const TEST_NUM_RETRIES_DEFAULT: u64 = 1;

pub const TEST_REPORT_PROP: &str = "test.report";
pub const TEST_REPORT_DEFAULT: &str = "target/report.html";

pub const TEST_PRINT_LOG_PROP: &str = "test.print.log";
pub const TEST_PRINT_LOG_DEFAULT: bool = true;

// Media file roots. The un-suffixed disk/s3 keys are legacy aliases still
// honored by CI; the .disk/.s3 forms take precedence when both are set.
pub const TEST_FILES_DISK_PROP_OLD: &str = "test.files";
pub const TEST_FILES_DISK_PROP: &str = "test.files.disk";
pub const TEST_FILES_DISK_DEFAULT: &str = "/var/lib/test-files";

pub const TEST_FILES_S3_PROP_OLD: &str = "test.s3";
pub const TEST_FILES_S3_PROP: &str = "test.files.s3";
pub const TEST_FILES_S3_DEFAULT: &str = "mediaprobe-s3-test";

pub const TEST_FILES_HTTP_PROP: &str = "test.files.http";
pub const TEST_FILES_HTTP_DEFAULT: &str = "files.mediaprobe.org";

pub const TEST_FILES_MONGO_PROP: &str = "test.files.mongo";
pub const TEST_FILES_MONGO_DEFAULT: &str = "files.mediaprobe.org:27017";

pub const TEST_PROJECT_PATH_PROP: &str = "test.project.path";
pub const TEST_PROJECT_PATH_DEFAULT: &str = "target/test-reports/";

pub const TEST_WORKSPACE_PROP: &str = "test.workspace";
pub const TEST_WORKSPACE_DEFAULT: &str = "/tmp";

pub const TEST_WORKSPACE_HOST_PROP: &str = "test.workspace.host";
pub const TEST_WORKSPACE_HOST_DEFAULT: &str = "/tmp";

// Other keys
pub const TEST_SEEK_REPETITIONS_PROP: &str = "test.seek.repetitions";
pub const TEST_SEEK_REPETITIONS_DEFAULT: u64 = 100;
