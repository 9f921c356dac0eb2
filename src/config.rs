//! Layered configuration.
//!
//! Settings come from `mindshift.toml`, with `MINDSHIFT_*` environment
//! variables overriding the operationally relevant keys and CLI flags
//! taking the final word (applied by the commands themselves).
//!
//! # Configuration File Format
//!
//! ```toml
//! [engine]
//! max_history = 0            # undo snapshots kept per session, 0 = unbounded
//! idle_timeout_secs = 3600   # evict sessions idle this long (omit to disable)
//! # data_dir = "/var/lib/mindshift"
//!
//! [engine.cycle_caps]
//! problem_shifting = 15
//!
//! [assist]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "MINDSHIFT_API_KEY"
//! timeout_secs = 8
//!
//! [store]
//! backend = "sqlite"         # memory | sqlite | none
//! # db_path = "/var/lib/mindshift/sessions.db"
//! save_timeout_ms = 5000
//!
//! [server]
//! bind = "127.0.0.1"
//! port = 8787
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::assist::client::{AssistClient, HttpAssistClient};
use crate::catalog::{Catalog, Modality};
use crate::engine::EngineOptions;
use crate::store::sqlite::SqliteStore;
use crate::store::{MemoryStore, NullStore, SessionStore};

pub const DEFAULT_CONFIG_FILE: &str = "mindshift.toml";

/// Which persistence adapter backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
    /// No persistence at all; sessions live only in the registry.
    #[serde(rename = "none")]
    Disabled,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Disabled => write!(f, "none"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "none" => Ok(StoreBackend::Disabled),
            other => anyhow::bail!("Unknown store backend: {other} (memory, sqlite, none)"),
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Undo snapshots kept per session; zero means unbounded.
    pub max_history: usize,
    /// Sessions idle for longer than this get evicted from the registry.
    pub idle_timeout_secs: Option<u64>,
    /// Root for transcripts, logs and the default sqlite path.
    pub data_dir: Option<PathBuf>,
    /// Per-modality cycle-cap overrides, keyed by modality name.
    pub cycle_caps: HashMap<String, u32>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_history: 0,
            idle_timeout_secs: None,
            data_dir: None,
            cycle_caps: HashMap::new(),
        }
    }
}

/// `[assist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistSection {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AssistSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "MINDSHIFT_API_KEY".to_string(),
            timeout_secs: 8,
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub db_path: Option<PathBuf>,
    pub save_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            db_path: None,
            save_timeout_ms: 5000,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// The whole `mindshift.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindshiftToml {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub assist: AssistSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub server: ServerSection,
}

impl MindshiftToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse mindshift.toml")
    }

    /// Load the explicit path if given, else `./mindshift.toml` if present,
    /// else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    // ── Env-overridable accessors ────────────────────────────────────

    pub fn bind(&self) -> String {
        std::env::var("MINDSHIFT_BIND")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.server.bind.clone())
    }

    pub fn port(&self) -> Result<u16> {
        match std::env::var("MINDSHIFT_PORT") {
            Ok(raw) if !raw.is_empty() => raw
                .parse::<u16>()
                .with_context(|| format!("Invalid MINDSHIFT_PORT: {raw}")),
            _ => Ok(self.server.port),
        }
    }

    pub fn store_backend(&self) -> Result<StoreBackend> {
        match std::env::var("MINDSHIFT_STORE") {
            Ok(raw) if !raw.is_empty() => raw.parse(),
            _ => Ok(self.store.backend),
        }
    }

    /// Root directory for transcripts, logs and the default database.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.engine.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("mindshift"))
            .unwrap_or_else(|| PathBuf::from(".mindshift"))
    }

    pub fn db_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var("MINDSHIFT_DB_PATH") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        self.store
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("sessions.db"))
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir().join("transcripts")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn assist_base_url(&self) -> String {
        std::env::var("MINDSHIFT_ASSIST_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.assist.base_url.clone())
    }

    pub fn assist_model(&self) -> String {
        std::env::var("MINDSHIFT_ASSIST_MODEL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.assist.model.clone())
    }

    /// The API key itself, read from the configured env var. `.env` files
    /// are honoured because `dotenvy` runs before any command.
    pub fn assist_api_key(&self) -> Option<String> {
        std::env::var(&self.assist.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }

    pub fn assist_timeout(&self) -> Duration {
        Duration::from_secs(self.assist.timeout_secs)
    }

    // ── Component builders ───────────────────────────────────────────

    /// The script catalog with any configured cycle-cap overrides applied.
    pub fn catalog(&self) -> Result<Catalog> {
        let mut catalog = Catalog::standard();
        for (name, cap) in &self.engine.cycle_caps {
            let modality = Modality::from_str(name)
                .with_context(|| format!("Invalid modality in [engine.cycle_caps]: {name}"))?;
            catalog.set_cycle_cap(modality, *cap);
        }
        Ok(catalog)
    }

    pub fn engine_options(&self) -> EngineOptions {
        let mut options = EngineOptions::default()
            .with_max_history(self.engine.max_history)
            .with_save_timeout(Duration::from_millis(self.store.save_timeout_ms));
        if let Some(secs) = self.engine.idle_timeout_secs {
            options = options.with_idle_after(chrono::Duration::seconds(secs as i64));
        }
        options
    }

    pub fn build_store(&self) -> Result<Arc<dyn SessionStore>> {
        match self.store_backend()? {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Disabled => Ok(Arc::new(NullStore)),
            StoreBackend::Sqlite => {
                let path = self.db_path();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create data directory: {}", parent.display())
                    })?;
                }
                Ok(Arc::new(SqliteStore::open(&path)?))
            }
        }
    }

    /// An HTTP assist client, if an API key is available. Without one the
    /// engine keeps its script-strict fallback for assisted sessions.
    pub fn assist_client(&self) -> Result<Option<Arc<dyn AssistClient>>> {
        let Some(api_key) = self.assist_api_key() else {
            return Ok(None);
        };
        let client =
            HttpAssistClient::new(&self.assist_base_url(), &self.assist_model(), &api_key)?;
        Ok(Some(Arc::new(client)))
    }

    /// Non-fatal configuration problems, one message per finding.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (name, cap) in &self.engine.cycle_caps {
            if Modality::from_str(name).is_err() {
                warnings.push(format!("[engine.cycle_caps] unknown modality: {name}"));
            }
            if *cap == 0 {
                warnings.push(format!("[engine.cycle_caps] {name} is zero"));
            }
        }
        if self.store.save_timeout_ms == 0 {
            warnings.push("[store] save_timeout_ms is zero; every save will degrade".to_string());
        }
        if self.assist.timeout_secs == 0 {
            warnings.push("[assist] timeout_secs is zero; assist calls cannot succeed".to_string());
        }
        if self.server.port == 0 {
            warnings.push("[server] port is zero; the OS will pick one".to_string());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================
    // Parsing and defaults
    // =========================================

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MindshiftToml::parse("").expect("parse");
        assert_eq!(config.engine.max_history, 0);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.save_timeout_ms, 5000);
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.assist.timeout_secs, 8);
    }

    #[test]
    fn test_full_config_parses() {
        let content = r#"
            [engine]
            max_history = 40
            idle_timeout_secs = 1800

            [engine.cycle_caps]
            problem_shifting = 6

            [assist]
            base_url = "http://localhost:9000/v1"
            model = "local-model"
            api_key_env = "LOCAL_KEY"
            timeout_secs = 3

            [store]
            backend = "sqlite"
            db_path = "/tmp/mindshift-test.db"
            save_timeout_ms = 250

            [server]
            bind = "0.0.0.0"
            port = 9099
        "#;
        let config = MindshiftToml::parse(content).expect("parse");
        assert_eq!(config.engine.max_history, 40);
        assert_eq!(config.engine.idle_timeout_secs, Some(1800));
        assert_eq!(config.engine.cycle_caps.get("problem_shifting"), Some(&6));
        assert_eq!(config.assist.model, "local-model");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.server.port, 9099);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(MindshiftToml::parse("[store]\nbackend = \"postgres\"\n").is_err());
    }

    #[test]
    fn test_backend_from_str_round_trips() {
        for backend in [
            StoreBackend::Memory,
            StoreBackend::Sqlite,
            StoreBackend::Disabled,
        ] {
            let parsed: StoreBackend = backend.to_string().parse().expect("parse");
            assert_eq!(parsed, backend);
        }
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    // =========================================
    // Derived components
    // =========================================

    #[test]
    fn test_cycle_cap_overrides_reach_the_catalog() {
        let config =
            MindshiftToml::parse("[engine.cycle_caps]\nproblem_shifting = 4\n").expect("parse");
        let catalog = config.catalog().expect("catalog");
        let script = catalog.script(Modality::ProblemShifting).expect("script");
        assert_eq!(script.cycle_cap, 4);
    }

    #[test]
    fn test_unknown_cycle_cap_modality_fails_catalog_build() {
        let config =
            MindshiftToml::parse("[engine.cycle_caps]\nmood_shifting = 4\n").expect("parse");
        assert!(config.catalog().is_err());
    }

    #[test]
    fn test_engine_options_reflect_the_file() {
        let content =
            "[engine]\nmax_history = 12\nidle_timeout_secs = 60\n\n[store]\nsave_timeout_ms = 750\n";
        let config = MindshiftToml::parse(content).expect("parse");
        let options = config.engine_options();
        assert_eq!(options.max_history, 12);
        assert_eq!(options.save_timeout, Duration::from_millis(750));
        assert_eq!(options.idle_after, Some(chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_db_path_falls_back_to_the_data_dir() {
        let config =
            MindshiftToml::parse("[engine]\ndata_dir = \"/tmp/ms-data\"\n").expect("parse");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/ms-data/sessions.db"));
        assert_eq!(
            config.transcripts_dir(),
            PathBuf::from("/tmp/ms-data/transcripts")
        );
    }

    // =========================================
    // Validation warnings
    // =========================================

    #[test]
    fn test_validate_flags_bad_caps_and_timeouts() {
        let content =
            "[engine.cycle_caps]\nmood_shifting = 4\nproblem_shifting = 0\n\n[store]\nsave_timeout_ms = 0\n";
        let config = MindshiftToml::parse(content).expect("parse");
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("unknown modality")));
        assert!(
            warnings
                .iter()
                .any(|w| w.contains("problem_shifting is zero"))
        );
        assert!(warnings.iter().any(|w| w.contains("save_timeout_ms")));
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        assert!(MindshiftToml::default().validate().is_empty());
    }
}
