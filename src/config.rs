use std::path::PathBuf;

/// Engine tunables, resolvable from the environment.
///
/// Recognized variables (a `.env` file is honored via `dotenvy`):
/// - `HUDDLE_DATA_DIR` — where `JsonFileStore` keeps its documents
/// - `HUDDLE_HISTORY_WINDOW` — default prompt history length per bot
/// - `HUDDLE_MAX_TOKENS` — completion cap per generation call
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub history_window: usize,
    pub max_tokens: u32,
}

impl EngineConfig {
    pub const DEFAULT_DATA_DIR: &'static str = "_data";
    pub const DEFAULT_HISTORY_WINDOW: usize = 50;
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;

    /// Resolve configuration from the process environment, falling back to
    /// the defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            data_dir: std::env::var("HUDDLE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_DATA_DIR)),
            history_window: std::env::var("HUDDLE_HISTORY_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Self::DEFAULT_HISTORY_WINDOW),
            max_tokens: std::env::var("HUDDLE_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Self::DEFAULT_MAX_TOKENS),
        }
    }

    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            history_window: Self::DEFAULT_HISTORY_WINDOW,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}
