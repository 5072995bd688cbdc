use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::domain::client::{normalize_currency, DEFAULT_CURRENCY};
use crate::query::{QueryError, SortField, SortOrder};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Settings read from the optional TOML file. Every key is optional and a
/// missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub default_currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    #[serde(default)]
    log: RawLogSection,
    #[serde(default)]
    query: RawQuerySection,
    #[serde(default)]
    clients: RawClientsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLogSection {
    level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuerySection {
    sort_by: Option<String>,
    sort_order: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientsSection {
    default_currency: Option<String>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file: RawConfigFile = toml::from_str(raw)?;
        let mut config = Self::default();
        if let Some(level) = file.log.level.filter(|level| !level.trim().is_empty()) {
            config.log_level = Some(level.trim().to_string());
        }
        if let Some(sort_by) = file.query.sort_by.as_deref() {
            config.sort_by = SortField::from_str(sort_by)?;
        }
        if let Some(sort_order) = file.query.sort_order.as_deref() {
            config.sort_order = SortOrder::from_str(sort_order)?;
        }
        config.default_currency = normalize_currency(file.clients.default_currency.as_deref());
        Ok(config)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    Invalid(QueryError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {}", err),
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(err) => write!(f, "invalid config value: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}

impl From<QueryError> for ConfigError {
    fn from(value: QueryError) -> Self {
        ConfigError::Invalid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};
    use crate::query::{SortField, SortOrder};
    use std::path::Path;
    use uuid::Uuid;

    #[test]
    fn missing_file_and_empty_toml_give_defaults() {
        let missing = std::env::temp_dir().join(format!("leadtrack-cfg-{}.toml", Uuid::now_v7()));
        assert_eq!(Config::load(Some(&missing)).unwrap(), Config::default());
        assert_eq!(Config::load(None).unwrap(), Config::default());
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
        assert_eq!(Config::default().log_level(), "warn");
    }

    #[test]
    fn reads_all_sections() {
        let config = Config::from_toml(
            r#"
[log]
level = "debug"

[query]
sort_by = "company_name"
sort_order = "asc"

[clients]
default_currency = "eur"
"#,
        )
        .expect("config should parse");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.sort_by, SortField::CompanyName);
        assert_eq!(config.sort_order, SortOrder::Asc);
        assert_eq!(config.default_currency, "EUR");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            Config::from_toml("[query]\nsort_by = \"mood\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_toml("[board]\ncolumns = 5\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(Config::load(Some(Path::new("/"))).is_err());
    }
}
