//! Configuração do callsla carregada a partir de `callsla.toml`.
//!
//! A struct [`CallSlaConfig`] agrupa as seções `[anthropic]`, `[sheets]`,
//! `[slack]`, `[pipeline]` e `[logging]`. Valores ausentes usam defaults.
//! Credenciais e identificadores podem vir de variáveis de ambiente, que têm
//! precedência sobre o arquivo quando não estão vazias.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Nome do arquivo procurado no diretório atual quando `--config` não é usado.
pub const DEFAULT_CONFIG_FILE: &str = "callsla.toml";

/// Configuração de nível superior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallSlaConfig {
    pub anthropic: AnthropicConfig,
    pub sheets: SheetsConfig,
    pub slack: SlackConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Seção `[anthropic]`: modelo usado na síntese do relatório.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// URL completa do endpoint de mensagens.
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 1024,
            base_url: crate::anthropic::client::API_URL.to_string(),
        }
    }
}

/// Seção `[sheets]`: acesso à planilha com os contadores por hora.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Token OAuth; tem preferência sobre `api_key` quando ambos existem.
    pub access_token: String,
    pub api_key: String,
    pub base_url: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub value_render_option: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_key: String::new(),
            base_url: crate::sheets::client::API_URL.to_string(),
            spreadsheet_id: None,
            sheet_name: None,
            value_render_option: "FORMATTED_VALUE".to_string(),
        }
    }
}

/// Seção `[slack]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub bot_token: String,
    pub base_url: String,
    pub boss_user_id: String,
    pub source_channel_id: String,
    pub target_channel_id: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            base_url: crate::notify::API_URL.to_string(),
            boss_user_id: String::new(),
            source_channel_id: String::new(),
            target_channel_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Executa VALIDATE_OUTPUT antes de END.
    pub validate_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validate_output: true,
        }
    }
}

/// Seção `[logging]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl CallSlaConfig {
    /// Carrega a configuração de `path`, ou de `callsla.toml` no diretório atual.
    ///
    /// Sem `path`, um arquivo ausente resulta nos defaults. Um `path` explícito
    /// que não existe é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<CallSlaConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else if explicit {
            bail!("config file {} does not exist", path.display());
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Sobrescreve campos com as variáveis de ambiente não vazias devolvidas por `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = key;
        }
        if let Some(token) = var("GOOGLE_SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = token;
        }
        if let Some(key) = var("GOOGLE_SHEETS_API_KEY") {
            self.sheets.api_key = key;
        }
        if let Some(id) = var("GOOGLE_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(token) = var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = token;
        }
        if let Some(user) = var("TARGET_BOSS_ID") {
            self.slack.boss_user_id = user;
        }
        if let Some(channel) = var("SOURCE_CHANNEL_ID") {
            self.slack.source_channel_id = channel;
        }
        if let Some(channel) = var("TARGET_CHANNEL_ID") {
            self.slack.target_channel_id = channel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = CallSlaConfig::default();
        assert_eq!(config.anthropic.max_tokens, 1024);
        assert!(config.anthropic.api_key.is_empty());
        assert_eq!(config.sheets.value_render_option, "FORMATTED_VALUE");
        assert!(config.sheets.spreadsheet_id.is_none());
        assert!(config.pipeline.validate_output);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.anthropic.base_url, crate::anthropic::client::API_URL);
        assert_eq!(config.sheets.base_url, crate::sheets::client::API_URL);
        assert_eq!(config.slack.base_url, crate::notify::API_URL);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [anthropic]
            model = "claude-haiku-4-5"

            [sheets]
            spreadsheet_id = "1AbC"

            [pipeline]
            validate_output = false

            [logging]
            format = "json"
        "#;
        let config: CallSlaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.anthropic.model, "claude-haiku-4-5");
        assert_eq!(config.anthropic.max_tokens, 1024);
        assert_eq!(config.sheets.spreadsheet_id.as_deref(), Some("1AbC"));
        assert_eq!(config.sheets.base_url, "https://sheets.googleapis.com");
        assert!(!config.pipeline.validate_output);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let result = toml::from_str::<CallSlaConfig>("[logging]\nformat = \"xml\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values_when_non_empty() {
        let mut config: CallSlaConfig = toml::from_str(
            r#"
            [anthropic]
            api_key = "from-file"

            [slack]
            bot_token = "xoxb-file"
            target_channel_id = "C-file"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("ANTHROPIC_API_KEY", "from-env"),
            ("SLACK_BOT_TOKEN", ""),
            ("GOOGLE_SPREADSHEET_ID", "1Env"),
            ("TARGET_BOSS_ID", "U-boss"),
        ]);
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.anthropic.api_key, "from-env");
        assert_eq!(config.slack.bot_token, "xoxb-file");
        assert_eq!(config.slack.target_channel_id, "C-file");
        assert_eq!(config.sheets.spreadsheet_id.as_deref(), Some("1Env"));
        assert_eq!(config.slack.boss_user_id, "U-boss");
    }

    #[test]
    fn load_reads_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sheets]\nsheet_name = \"202501\"").unwrap();

        let config = CallSlaConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.sheets.sheet_name.as_deref(), Some("202501"));
    }

    #[test]
    fn load_rejects_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = CallSlaConfig::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn load_reports_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nvalidate_output = \"maybe\"").unwrap();
        assert!(CallSlaConfig::load(Some(file.path())).is_err());
    }
}
