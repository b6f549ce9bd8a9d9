/// Application name
pub const APP_NAME: &str = "dconnect";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Domain appended to every service id handed to applications
pub const DEFAULT_DOMAIN: &str = "localhost.deviceconnect.org";

/// Metadata key a component must carry to be treated as a device plugin
pub const PLUGIN_METADATA_KEY: &str = "org.deviceconnect.android.deviceplugin";

/// Connect attempts made before a plugin is left suspended
pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 5;

/// Records kept in each communication history bucket
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Recent latency samples kept per plugin
pub const DEFAULT_BAUD_RATE_CAPACITY: usize = 10;

/// Bound of the per-manager and per-connection event queues
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;

/// Unanswered requests tracked by the plugin manager before the oldest is dropped
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 256;

/// Configuration directory name
pub const CONFIG_DIR_NAME: &str = ".dconnect";

/// Directory, under the configuration directory, holding per-plugin settings
pub const SETTINGS_DIR_NAME: &str = "plugins";

/// Configuration file looked up by the binary
pub const CONFIG_FILE_NAME: &str = "config.toml";
