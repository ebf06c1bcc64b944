use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // LLM backend
    pub openai_api_key: String,
    pub model: String,

    // Database (Postgres)
    pub database_url: String,

    // Batch processing
    pub max_concurrency: usize,
    pub backend_timeout_secs: u64,

    // Valid-symbol cache file (optional)
    pub symbol_cache_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: required_env("OPENAI_API_KEY"),
            model: env::var("HYPEFLOW_MODEL").unwrap_or_else(|_| "gpt-5-nano".to_string()),
            database_url: required_env("DATABASE_URL"),
            max_concurrency: env::var("HYPEFLOW_MAX_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .expect("HYPEFLOW_MAX_CONCURRENCY must be a number"),
            backend_timeout_secs: env::var("HYPEFLOW_BACKEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("HYPEFLOW_BACKEND_TIMEOUT_SECS must be a number"),
            symbol_cache_path: env::var("HYPEFLOW_SYMBOL_CACHE").ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
