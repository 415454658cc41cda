use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::cell::MORPHOLOGY_FILE;
use crate::compartments::Discretization;
use crate::error::{CellError, CellResult};
use crate::parameters::ParameterTable;

pub const MORPHOLOGY_ENV: &str = "ALLEN_CELL_MORPHOLOGY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub morphology: PathBuf,
    pub discretization: Discretization,
    pub parameters: ParameterTable,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            morphology: PathBuf::from(MORPHOLOGY_FILE),
            discretization: Discretization::default(),
            parameters: ParameterTable::allen_472304539(),
        }
    }
}

impl ModelConfig {
    pub fn from_toml_str(content: &str) -> CellResult<ModelConfig> {
        Ok(toml::from_str(content)?)
    }
}

/// Read, apply environment overrides, validate
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or fails validation
pub fn load_config(config_path: &Path) -> CellResult<ModelConfig> {
    let content = fs::read_to_string(config_path).map_err(|source| CellError::ConfigIo {
        path: config_path.to_path_buf(),
        source,
    })?;
    let mut config = ModelConfig::from_toml_str(&content)?;
    apply_environment_overrides(&mut config);
    validate_config(&config)?;
    info!("Loaded model config from {}", config_path.display());
    Ok(config)
}

pub fn apply_environment_overrides(config: &mut ModelConfig) {
    if let Ok(value) = env::var(MORPHOLOGY_ENV) {
        if !value.is_empty() {
            config.morphology = PathBuf::from(value);
        }
    }
}

pub fn validate_config(config: &ModelConfig) -> CellResult<()> {
    if config.morphology.as_os_str().is_empty() {
        return Err(CellError::InvalidConfig("morphology path is empty".to_owned()));
    }
    config
        .discretization
        .validate()
        .map_err(CellError::InvalidConfig)?;
    config.parameters.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::RegionSelector;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_is_valid() {
        let config = ModelConfig::default();
        validate_config(&config).unwrap();
        assert_eq!(config.morphology, PathBuf::from(MORPHOLOGY_FILE));
        assert_eq!(config.discretization, Discretization::FixedLength { max_length: 40.0 });
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ModelConfig::from_toml_str(
            r#"
            morphology = "morphologies/other.swc"

            [discretization]
            rule = "d_lambda"
            frequency = 100.0
            d_lambda = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.morphology, PathBuf::from("morphologies/other.swc"));
        assert_eq!(
            config.discretization,
            Discretization::DLambda {
                frequency: 100.0,
                d_lambda: 0.1
            }
        );
        assert_eq!(config.parameters, ParameterTable::allen_472304539());
    }

    #[test]
    fn test_load_config_from_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        fs::write(
            &path,
            "[parameters.all]\nRa = 100.0\n\n[parameters.soma]\ncm = 2.0\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.parameters.get(RegionSelector::All, "Ra"), Some(100.0));
        assert_eq!(config.parameters.get(RegionSelector::Soma, "cm"), Some(2.0));
        assert!(config.parameters.dend.is_empty());
    }

    #[test]
    fn test_load_config_errors() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let err = load_config(Path::new("data/missing.toml")).unwrap_err();
        assert!(matches!(err, CellError::ConfigIo { .. }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[discretization]\nrule = \"fixed_length\"\nmax_length = -1.0\n").unwrap();
        assert!(matches!(load_config(&path), Err(CellError::InvalidConfig(_))));

        fs::write(&path, "morphology = [").unwrap();
        assert!(matches!(load_config(&path), Err(CellError::Toml(_))));
    }

    #[test]
    fn test_environment_override_of_morphology() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut config = ModelConfig::default();

        // SAFETY: every test reading this variable holds ENV_LOCK
        unsafe { env::set_var(MORPHOLOGY_ENV, "morphologies/override.swc") };
        apply_environment_overrides(&mut config);
        assert_eq!(config.morphology, PathBuf::from("morphologies/override.swc"));

        unsafe { env::set_var(MORPHOLOGY_ENV, "") };
        apply_environment_overrides(&mut config);
        assert_eq!(config.morphology, PathBuf::from("morphologies/override.swc"));

        unsafe { env::remove_var(MORPHOLOGY_ENV) };
        let mut config = ModelConfig::default();
        apply_environment_overrides(&mut config);
        assert_eq!(config.morphology, PathBuf::from(MORPHOLOGY_FILE));
    }
}
