//! Crate-wide constants.

/// Archives smaller than this many bytes are embedded in the package record.
pub const LITERAL_SIZE_LIMIT: u64 = 256 * 1024;

/// URL scheme used for archives recorded as declarative upload specs.
pub const ARCHIVE_URL_PREFIX: &str = "archive://";

/// Path of the storage proxy on the control-plane front door.
pub const STORAGE_PROXY_PATH: &str = "/proxy/storage";

/// Archive endpoint of the storage service.
pub const STORAGE_ARCHIVE_PATH: &str = "/v1/archive";

/// Label selector of the storage service, used to discover its address.
pub const STORAGE_SERVICE_SELECTOR: &str = "application=fission-storage";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8888";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_SPEC_DIR: &str = "specs";

/// Length of the random suffix appended to generated names.
pub const NAME_SUFFIX_LEN: usize = 4;

/// Length of a fully random archive name when there is no hint.
pub const RANDOM_NAME_LEN: usize = 8;

/// Maximum length of a normalized object name.
pub const MAX_NAME_LEN: usize = 63;
