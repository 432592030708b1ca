use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sample_core::sample::InitializationMethod;
use sample_core::{ClassLabels, SampleOptions};
use serde::{Deserialize, Serialize};

/// Attack configuration file: per-sample options plus the classifier's label pair.
///
/// Accepted as YAML (`.yaml`/`.yml`) or JSON (`.json`); every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub options: SampleOptions,
    pub labels: ClassLabels,
}

/// Command-line overrides applied on top of a config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub max_iterations: Option<u32>,
    pub payload_size: Option<usize>,
    pub initialization_method: Option<InitializationMethod>,
    pub epsilon: Option<f64>,
    pub benign: bool,
    pub force: bool,
}

/// Load an attack config, choosing the parser by file extension.
pub fn load_attack_config(path: &Path) -> Result<AttackConfig> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read attack config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        "yaml" | "yml" => serde_yaml::from_str(&body)
            .with_context(|| format!("Failed to parse YAML config {}", path.display())),
        "json" => serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse JSON config {}", path.display())),
        other => Err(anyhow!(
            "Unsupported config format '{}' for {}. Allowed: yaml, yml, json",
            other,
            path.display()
        )),
    }
}

/// Resolve the effective config: file (or defaults), then flag overrides.
pub fn resolve_attack_config(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<AttackConfig> {
    let mut config = match config_path {
        Some(path) => load_attack_config(path)?,
        None => AttackConfig::default(),
    };

    let opts = &mut config.options;
    if let Some(dir) = &overrides.output_dir {
        opts.output_dir = dir.clone();
    }
    if let Some(n) = overrides.max_iterations {
        opts.max_iterations = n;
    }
    if let Some(n) = overrides.payload_size {
        opts.payload_size = n;
    }
    if let Some(method) = overrides.initialization_method {
        opts.initialization_method = method;
    }
    if let Some(eps) = overrides.epsilon {
        opts.epsilon = eps;
    }
    if overrides.benign {
        opts.benign = true;
    }
    if overrides.force {
        opts.allow_overwrite = true;
    }

    Ok(config)
}
