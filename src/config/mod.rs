use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub streaming: StreamingConfig,
    pub logging: LoggingConfig,
}

/// External analyzer process configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Interpreter used to run every analyzer script.
    pub interpreter: PathBuf,
    /// Executables the gateway is permitted to spawn.
    pub allowed_executables: Vec<PathBuf>,
    pub scripts: ScriptConfig,
    pub timeout_ms: u64,
}

/// Analyzer script per analytical surface
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    pub segmentation: PathBuf,
    pub performance: PathBuf,
    pub content: PathBuf,
    pub chat: PathBuf,
}

/// Chat streaming configuration
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Delay between simulated tokens on the fallback path.
    pub fallback_pacing_ms: u64,
    /// Capacity of the bounded channels between reader, dispatcher and caller.
    pub channel_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = AnalyzerConfig::default();

        let interpreter = env::var("ANALYZER_INTERPRETER")
            .map(PathBuf::from)
            .unwrap_or(defaults.interpreter);

        let allowed_executables = match env::var("ANALYZER_ALLOWED_EXECUTABLES") {
            Ok(list) => parse_path_list(&list),
            Err(_) => defaults.allowed_executables,
        };
        if allowed_executables.is_empty() {
            return Err(AppError::Config {
                message: "ANALYZER_ALLOWED_EXECUTABLES must name at least one executable"
                    .to_string(),
            });
        }

        let scripts = ScriptConfig {
            segmentation: env::var("ANALYZER_SEGMENTATION_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts.segmentation),
            performance: env::var("ANALYZER_PERFORMANCE_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts.performance),
            content: env::var("ANALYZER_CONTENT_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts.content),
            chat: env::var("ANALYZER_CHAT_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts.chat),
        };

        let analyzer = AnalyzerConfig {
            interpreter,
            allowed_executables,
            scripts,
            timeout_ms: env::var("ANALYZER_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
        };

        let streaming_defaults = StreamingConfig::default();
        let streaming = StreamingConfig {
            fallback_pacing_ms: env::var("CHAT_FALLBACK_PACING_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(streaming_defaults.fallback_pacing_ms),
            channel_capacity: env::var("CHAT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(streaming_defaults.channel_capacity),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            analyzer,
            streaming,
            logging,
        })
    }
}

fn parse_path_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl AnalyzerConfig {
    /// Whether the configured interpreter appears in the allow-list.
    pub fn interpreter_allowed(&self) -> bool {
        self.allowed_executables
            .iter()
            .any(|allowed| allowed == &self.interpreter)
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            allowed_executables: vec![PathBuf::from("python3"), PathBuf::from("python")],
            scripts: ScriptConfig::default(),
            timeout_ms: 30000,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            segmentation: PathBuf::from("ml/segment_customers.py"),
            performance: PathBuf::from("ml/score_performance.py"),
            content: PathBuf::from("ml/recommend_content.py"),
            chat: PathBuf::from("backend/ml_chatbot.py"),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            fallback_pacing_ms: 50,
            channel_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
