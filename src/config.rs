use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::CopilotError;

/// Filesystem layout for runtime artifacts. Derived once at startup and
/// handed to whatever needs a path; components never probe the environment
/// themselves.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub index_db_path: PathBuf,
    pub alarm_data_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = env::var("COPILOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        Self::with_data_dir(data_dir)
    }

    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let index_db_path = data_dir.join("vector_index.db");
        let alarm_data_path = data_dir.join("samples").join("alarms.csv");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            index_db_path,
            alarm_data_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chars: usize,
    /// Overlap margin between consecutive chunks of the same page.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 600,
            overlap_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider family identifier; combined with the dimension it forms the
    /// model id stored in index provenance.
    pub model_id: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "hash-bow-v1".to_string(),
            dimension: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve per query.
    pub top_k: usize,
    /// Minimum cosine similarity for evidence to pass the confidence gate.
    /// A score exactly at the threshold passes.
    pub score_threshold: f32,
    /// Per-request budget for embedding plus similarity search.
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.35,
            timeout_ms: 5_000,
        }
    }
}

/// Immutable application configuration. Loaded once by the binary and passed
/// by value into each component's constructor so tests can vary thresholds
/// without process-wide side effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    /// Read the YAML config file, falling back to defaults when none exists.
    /// `COPILOT_CONFIG_PATH` overrides the default location.
    pub fn load(paths: &AppPaths) -> Result<Self, CopilotError> {
        let path = match env::var("COPILOT_CONFIG_PATH") {
            Ok(overridden) => PathBuf::from(overridden),
            Err(_) => paths.data_dir.join("config.yml"),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        serde_yaml::from_str(&contents).map_err(|err| {
            CopilotError::InvalidInput(format!("config {}: {err}", path.display()))
        })
    }
}
