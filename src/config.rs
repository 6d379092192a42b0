//! Configuração do trellis carregada a partir de `trellis.toml`.
//!
//! A struct [`TrellisConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `TRELLIS_DATA_DIR` tem precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Configuração de nível superior carregada de `trellis.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrellisConfig {
    /// Diretório onde as coleções serializadas são gravadas.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Usuário padrão quando `--user` não é informado na CLI.
    #[serde(default)]
    pub default_actor: Option<String>,
}

// Valor padrão para o diretório de dados: ".trellis".
fn default_data_dir() -> String {
    ".trellis".to_string()
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_actor: None,
        }
    }
}

impl TrellisConfig {
    /// Carrega a configuração de `trellis.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let path = Path::new("trellis.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TrellisConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração.
        if let Ok(dir) = std::env::var("TRELLIS_DATA_DIR")
            && !dir.is_empty()
        {
            config.data_dir = dir;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = TrellisConfig::default();
        assert_eq!(config.data_dir, ".trellis");
        assert!(config.default_actor.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            data_dir = "state/boards"
        "#;
        let config: TrellisConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, "state/boards");
        assert!(config.default_actor.is_none());
    }

    #[test]
    fn deserialize_full_toml() {
        let toml_str = r#"
            data_dir = "/var/lib/trellis"
            default_actor = "user-ana"
        "#;
        let config: TrellisConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, "/var/lib/trellis");
        assert_eq!(config.default_actor.as_deref(), Some("user-ana"));
    }
}
