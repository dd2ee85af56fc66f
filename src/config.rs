use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    api: ApiConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    generation: GenerationConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiConfig {
    key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageConfig {
    data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

/// Tuning values forwarded verbatim to the generation endpoint.
///
/// Ranges mirror what the API documents: temperature and top_p in 0.0..=1.0,
/// top_k in 0..=100, max_output_tokens in 1..=8192.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            bail!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            );
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            bail!("top_p must be within 0.0..=1.0, got {}", self.top_p);
        }
        if self.top_k > 100 {
            bail!("top_k must be within 0..=100, got {}", self.top_k);
        }
        if !(1..=8192).contains(&self.max_output_tokens) {
            bail!(
                "max_output_tokens must be within 1..=8192, got {}",
                self.max_output_tokens
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub data_dir: PathBuf,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let config_file = if std::path::Path::new(path).exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            ConfigFile::default()
        };

        Self::from_parts(config_file, std::env::var("GOOGLE_API_KEY").ok())
    }

    fn from_parts(config_file: ConfigFile, env_key: Option<String>) -> Result<Self> {
        let api_key = env_key
            .filter(|k| !k.is_empty())
            .or(config_file.api.key)
            .context("No API key found: set GOOGLE_API_KEY or api.key in config.toml")?;

        Ok(Self {
            api_key,
            model: config_file
                .api
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config_file.api.base_url,
            data_dir: config_file.storage.data_dir.into(),
            generation: config_file.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_defaults_match_sliders() {
        let generation = GenerationConfig::default();
        assert_eq!(generation.temperature, 1.0);
        assert_eq!(generation.top_p, 0.95);
        assert_eq!(generation.top_k, 64);
        assert_eq!(generation.max_output_tokens, 8192);
        assert!(generation.validate().is_ok());
    }

    #[test]
    fn generation_boundaries_are_accepted() {
        for (temperature, top_p, top_k, max_output_tokens) in
            [(0.0, 0.0, 0, 1), (1.0, 1.0, 100, 8192)]
        {
            let generation = GenerationConfig {
                temperature,
                top_p,
                top_k,
                max_output_tokens,
            };
            assert!(generation.validate().is_ok(), "{:?}", generation);
        }
    }

    #[test]
    fn generation_out_of_range_is_rejected() {
        let out_of_range = [
            GenerationConfig {
                temperature: 1.5,
                ..Default::default()
            },
            GenerationConfig {
                top_p: -0.1,
                ..Default::default()
            },
            GenerationConfig {
                top_k: 101,
                ..Default::default()
            },
            GenerationConfig {
                max_output_tokens: 0,
                ..Default::default()
            },
        ];
        for generation in out_of_range {
            assert!(generation.validate().is_err(), "{:?}", generation);
        }
    }

    #[test]
    fn parses_nested_config_file() {
        let content = r#"
            [api]
            key = "k-123"
            model = "gemini-1.5-pro"

            [storage]
            data_dir = "/tmp/er2bq"

            [generation]
            temperature = 0.2
            top_k = 10
        "#;
        let config_file: ConfigFile = toml::from_str(content).unwrap();
        let config = Config::from_parts(config_file, None).unwrap();

        assert_eq!(config.api_key, "k-123");
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/er2bq"));
        assert_eq!(config.generation.temperature, 0.2);
        assert_eq!(config.generation.top_k, 10);
        // unspecified values keep their defaults
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.generation.max_output_tokens, 8192);
    }

    #[test]
    fn env_key_takes_precedence() {
        let config_file: ConfigFile = toml::from_str("[api]\nkey = \"from-file\"").unwrap();
        let config = Config::from_parts(config_file, Some("from-env".to_string())).unwrap();
        assert_eq!(config.api_key, "from-env");
    }

    #[test]
    fn missing_key_is_an_error() {
        let config_file: ConfigFile = toml::from_str("").unwrap();
        assert!(Config::from_parts(config_file, None).is_err());
    }
}
