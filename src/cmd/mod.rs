//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module   | Commands handled                                |
//! |----------|-------------------------------------------------|
//! | `serve`  | `serve` — the HTTP API server                   |
//! | `run`    | `run` — an interactive session in the terminal  |
//! | `script` | `script list`, `script show`, `script lint`     |

pub mod run;
pub mod script;
pub mod serve;

pub use run::cmd_run;
pub use script::cmd_script;
pub use serve::cmd_serve;

use anyhow::Result;
use mindshift::config::MindshiftToml;
use mindshift::engine::TreatmentEngine;

/// Assemble an engine from configuration: catalog with cap overrides,
/// the configured store, and an assist client when a key is available.
pub fn build_engine(config: &MindshiftToml) -> Result<TreatmentEngine> {
    let catalog = config.catalog()?;
    let store = config.build_store()?;
    let mut engine = TreatmentEngine::new(catalog, store, config.engine_options())?;
    if let Some(client) = config.assist_client()? {
        engine = engine.with_assist_client(client, config.assist_timeout());
    }
    Ok(engine)
}
