use crate::DataSource;

/// All configuration loaded from environment variables at startup.
/// Invalid or missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Market data
    pub data_source: DataSource,
    /// Fixture directory, only set for `DataSource::Replay`.
    pub replay_dir: Option<String>,

    // Dashboard
    pub dashboard_port: u16,

    // Screen config file path (universe + engine tuning)
    pub screen_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let data_source = match optional_env("DATA_SOURCE")
            .unwrap_or_else(|| "yahoo".to_string())
            .to_lowercase()
            .as_str()
        {
            "yahoo" => DataSource::Yahoo,
            "replay" => DataSource::Replay,
            other => panic!("ERROR: DATA_SOURCE must be 'yahoo' or 'replay', got: '{other}'"),
        };

        let replay_dir = match data_source {
            DataSource::Replay => Some(required_env("REPLAY_DIR")),
            DataSource::Yahoo => None,
        };

        Config {
            data_source,
            replay_dir,
            dashboard_port: parse_port(optional_env("DASHBOARD_PORT")),
            screen_config_path: optional_env("SCREEN_CONFIG_PATH")
                .unwrap_or_else(|| "config/screen.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// `DASHBOARD_PORT`, default 8050. A value that is set but not a port panics.
fn parse_port(raw: Option<String>) -> u16 {
    match raw {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            panic!("ERROR: DASHBOARD_PORT must be a port number (0-65535), got: '{v}'")
        }),
        None => 8050,
    }
}
