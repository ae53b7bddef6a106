use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use anyhow::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub system_config: SystemConfig,
    #[serde(default)]
    pub language_config: LanguageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_processed_dir() -> String {
    "processed".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_allowed_extensions() -> Vec<String> {
    ["txt", "srt", "csv", "pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_chunk_chars() -> usize {
    4000
}

/// Supported target languages and the font used for each when re-rendering
/// PDF text. Languages without a font entry fall back to `default_font`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub fonts: HashMap<String, String>,
    #[serde(default = "default_font")]
    pub default_font: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

fn default_languages() -> Vec<Language> {
    [
        ("ko", "Korean"),
        ("en", "English"),
        ("ja", "Japanese"),
        ("zh-CN", "Chinese (Simplified)"),
        ("es", "Spanish"),
        ("fr", "French"),
        ("de", "German"),
    ]
    .iter()
    .map(|(code, name)| Language {
        code: code.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_font() -> String {
    "fonts/NanumGothic.ttf".to_string()
}

impl LanguageConfig {
    pub fn is_supported(&self, code: &str) -> bool {
        self.languages.iter().any(|l| l.code == code)
    }

    pub fn font_path(&self, code: &str) -> &str {
        self.fonts
            .get(code)
            .map(String::as_str)
            .unwrap_or(&self.default_font)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        // Determine file type by extension
        let path_lower = path.to_lowercase();
        let mut config: Config = if path_lower.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables override the file, matching the original
    /// deployment convention (`.env` loaded at startup).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(exts) = std::env::var("ALLOWED_EXTENSIONS") {
            self.system_config.allowed_extensions = exts
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(max) = std::env::var("MAX_CHARS") {
            if let Ok(max) = max.parse() {
                self.system_config.max_chunk_chars = max;
            }
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            self.system_config.upload_dir = dir;
        }
        if let Ok(dir) = std::env::var("PROCESSED_DIR") {
            self.system_config.processed_dir = dir;
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            processed_dir: default_processed_dir(),
            static_dir: default_static_dir(),
            allowed_extensions: default_allowed_extensions(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            fonts: HashMap::new(),
            default_font: default_font(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert_eq!(config.system_config.max_chunk_chars, 4000);
        assert!(config
            .system_config
            .allowed_extensions
            .iter()
            .any(|e| e == "txt"));
        assert!(config.language_config.is_supported("ko"));
        assert!(!config.language_config.is_supported("tlh"));
    }

    #[test]
    fn font_lookup_falls_back_to_default() {
        let mut config = LanguageConfig::default();
        config
            .fonts
            .insert("ja".to_string(), "fonts/NotoSansJP.ttf".to_string());
        assert_eq!(config.font_path("ja"), "fonts/NotoSansJP.ttf");
        assert_eq!(config.font_path("de"), config.default_font);
    }

    #[test]
    fn yaml_fills_unset_fields_with_defaults() {
        let yaml = "
system_config:
  port: 9000
  allowed_extensions: [txt, csv]
language_config:
  languages:
    - code: ko
      name: Korean
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.system_config.port, 9000);
        assert_eq!(config.system_config.allowed_extensions.len(), 2);
        assert_eq!(config.system_config.max_chunk_chars, 4000);
        assert_eq!(config.language_config.languages.len(), 1);
    }
}
