use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USERS_API: &str = "https://users.roblox.com";
pub const DEFAULT_THUMBNAILS_API: &str = "https://thumbnails.roblox.com";
pub const FALLBACK_AVATAR: &str = "https://tr.rbxcdn.com/30DAY-AvatarHeadshot-Default.png";
pub const DEFAULT_WAGE_BUDGET: u64 = 2_000_000;

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarConfig {
    pub users_api: String,
    pub thumbnails_api: String,
    pub fallback_url: String,
    pub request_timeout: Duration,
    pub concurrency: usize,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            users_api: DEFAULT_USERS_API.to_string(),
            thumbnails_api: DEFAULT_THUMBNAILS_API.to_string(),
            fallback_url: FALLBACK_AVATAR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub avatar: AvatarConfig,
    pub wage_budget: u64,
    pub roster_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            avatar: AvatarConfig::default(),
            wage_budget: DEFAULT_WAGE_BUDGET,
            roster_path: None,
            log_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let users_api = get("ROBLOX_USERS_API")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_USERS_API.to_string());
        let thumbnails_api = get("ROBLOX_THUMBNAILS_API")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_THUMBNAILS_API.to_string());
        let fallback_url =
            get("AVATAR_FALLBACK_URL").unwrap_or_else(|| FALLBACK_AVATAR.to_string());
        let timeout_secs = get("AVATAR_TIMEOUT_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 60);
        let concurrency = get("AVATAR_CONCURRENCY")
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CONCURRENCY)
            .clamp(1, 32);
        let wage_budget = get("WAGE_BUDGET")
            .and_then(|val| val.replace(['_', ','], "").parse::<u64>().ok())
            .unwrap_or(DEFAULT_WAGE_BUDGET);

        Self {
            avatar: AvatarConfig {
                users_api,
                thumbnails_api,
                fallback_url,
                request_timeout: Duration::from_secs(timeout_secs),
                concurrency,
            },
            wage_budget,
            roster_path: get("ROSTER_PATH").map(PathBuf::from),
            log_path: get("AVATAR_LOG").map(PathBuf::from),
        }
    }
}

/// Loads `.env.local` then `.env`; missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}
