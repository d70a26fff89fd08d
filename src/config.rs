use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "PneumAI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Analysis service host used when `API_BASE_URL` is unset.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Storage API host used when `STORAGE_API_URL` is unset.
pub const DEFAULT_STORAGE_API_URL: &str = "http://localhost:5000";

/// Bucket name sent with presign requests when `S3_BUCKET` is unset.
pub const DEFAULT_BUCKET: &str = "pneumai-scans";

/// Connect timeout for all HTTP clients. Requests themselves have no
/// deadline; callers race them against their own timer.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "pneumai=info,pneumai_lib=info"
}

/// Endpoints and output locations for the scan pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Analysis service base, no trailing slash.
    pub api_base_url: String,
    /// Storage API base (presign, duplicate check), no trailing slash.
    pub storage_api_url: String,
    pub bucket: String,
    /// Where report artifacts are "downloaded" to.
    pub export_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_api_url: DEFAULT_STORAGE_API_URL.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            export_dir: default_export_dir(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            api_base_url: get("API_BASE_URL")
                .map(|v| trim_base(&v))
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            storage_api_url: get("STORAGE_API_URL")
                .map(|v| trim_base(&v))
                .unwrap_or_else(|| DEFAULT_STORAGE_API_URL.to_string()),
            bucket: get("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            export_dir: get("PNEUMAI_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_export_dir),
        }
    }
}

/// Strip trailing slashes so endpoint paths can be appended verbatim.
pub fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// The user's download directory, `~/Downloads` when the platform has no
/// registered one, or the working directory as a last resort.
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}
