use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "./config.toml";

const SSL_MODES: &[&str] = &[
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub sslmode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(), // pragma: allowlist secret
            host: "localhost".to_string(),
            port: 5432,
            sslmode: "disable".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn with_env_overrides(&self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    pub fn with_overrides<F>(&self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("DB_PORT") {
            Some(raw) => parse_port("DB_PORT", &raw)?,
            None => self.port,
        };

        let config = Self {
            name: lookup("DB_NAME").unwrap_or_else(|| self.name.clone()),
            user: lookup("DB_USER").unwrap_or_else(|| self.user.clone()),
            password: lookup("DB_PASSWORD").unwrap_or_else(|| self.password.clone()),
            host: lookup("DB_HOST").unwrap_or_else(|| self.host.clone()),
            port,
            sslmode: lookup("DB_SSLMODE").unwrap_or_else(|| self.sslmode.clone()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !SSL_MODES.contains(&self.sslmode.as_str()) {
            return Err(anyhow!(
                "Unknown ssl mode '{}', expected one of {}",
                self.sslmode,
                SSL_MODES.join(", ")
            ));
        }
        Ok(())
    }

    /// Connection target without credentials, safe to log.
    pub fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{} (sslmode={})",
            self.user, self.host, self.port, self.name, self.sslmode
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn with_overrides<F>(&self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("SERVER_PORT") {
            Some(raw) => parse_port("SERVER_PORT", &raw)?,
            None => self.port,
        };
        Ok(Self {
            host: lookup("SERVER_HOST").unwrap_or_else(|| self.host.clone()),
            port,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One optional CSV file feeding embeddings for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSource {
    pub path: PathBuf,
    pub doc_id: i32,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, doc_id: i32) -> Self {
        Self {
            path: path.into(),
            doc_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub data_dir: PathBuf,
    pub csv: Vec<CsvSource>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            csv: vec![
                CsvSource::new("climate_report.csv", 1),
                CsvSource::new("ai_ethics.csv", 2),
                CsvSource::new("deepseek_architecture.csv", 3),
            ],
        }
    }
}

impl SeedConfig {
    pub fn with_overrides<F>(&self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            data_dir: lookup("SEED_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| self.data_dir.clone()),
            csv: self.csv.clone(),
        }
    }

    /// CSV sources with relative paths resolved against `data_dir`.
    pub fn resolved_sources(&self) -> Vec<CsvSource> {
        self.csv
            .iter()
            .map(|source| CsvSource::new(self.data_dir.join(&source.path), source.doc_id))
            .collect()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads `.env`, then the TOML file (if any), then applies environment overrides.
    pub fn load_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with(|key| env::var(key).ok())
    }

    pub fn load_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup("CONFIG_PATH") {
            Some(path) => Self::load(Path::new(&path))?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        base.with_overrides(lookup)
    }

    pub fn with_overrides<F>(&self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: self.database.with_overrides(&lookup)?,
            server: self.server.with_overrides(&lookup)?,
            seed: self.seed.with_overrides(&lookup),
        })
    }

    pub fn default_config_path() -> String {
        DEFAULT_CONFIG_PATH.to_string()
    }
}

fn parse_port(key: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse::<u16>()
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_use_local_demo_defaults() {
        let config = Config::default();

        assert_eq!(config.database.name, "postgres");
        assert_eq!(config.database.user, "postgres");
        assert_eq!(config.database.password, "postgres");
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.sslmode, "disable");
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.seed.csv.len(), 3);
    }

    #[test]
    fn should_deserialize_partial_config_from_toml() {
        let toml_content = r#"
[database]
host = "db.internal"
port = 6543
sslmode = "require"

[[seed.csv]]
path = "extra.csv"
doc_id = 2
"#;

        let config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.sslmode, "require");
        assert_eq!(config.database.name, "postgres");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.seed.csv, vec![CsvSource::new("extra.csv", 2)]);
    }

    #[test]
    fn should_load_config_from_file() {
        let toml_content = r#"
[database]
name = "demo"

[server]
port = 8080
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.database.name, "demo");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn should_load_config_path_from_lookup_and_apply_overrides() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[database]\nname = \"from_file\"\nhost = \"file-host\"\n")
            .unwrap();
        let temp_path = temp_file.path().to_string_lossy().to_string();

        let config = Config::load_with(lookup_from(&[
            ("CONFIG_PATH", temp_path.as_str()),
            ("DB_HOST", "env-host"),
            ("DB_PORT", "15432"),
            ("SERVER_PORT", "9000"),
            ("SEED_DATA_DIR", "/data/seed"),
        ]))
        .unwrap();

        assert_eq!(config.database.name, "from_file");
        assert_eq!(config.database.host, "env-host");
        assert_eq!(config.database.port, 15432);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.seed.data_dir, PathBuf::from("/data/seed"));
    }

    #[test]
    fn should_fall_back_to_defaults_without_config_file() {
        let config = Config::load_with(lookup_from(&[("DB_NAME", "vectors")])).unwrap();

        assert_eq!(config.database.name, "vectors");
        assert_eq!(config.database.user, "postgres");
    }

    #[test]
    fn should_reject_invalid_port_override() {
        let result = DatabaseConfig::default().with_overrides(lookup_from(&[("DB_PORT", "abc")]));

        let error = result.unwrap_err().to_string();
        assert!(error.contains("DB_PORT"), "unexpected error: {error}");
    }

    #[test]
    fn should_reject_unknown_ssl_mode() {
        let result =
            DatabaseConfig::default().with_overrides(lookup_from(&[("DB_SSLMODE", "sometimes")]));

        assert!(result.is_err());
    }

    #[test]
    fn should_return_error_for_missing_explicit_config_file() {
        let result = Config::load_with(lookup_from(&[("CONFIG_PATH", "/non/existent/path.toml")]));
        assert!(result.is_err());
    }

    #[test]
    fn should_return_error_for_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"invalid toml content [[[").unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn should_resolve_csv_sources_against_data_dir() {
        let seed = SeedConfig {
            data_dir: PathBuf::from("/srv/data"),
            ..SeedConfig::default()
        };

        let sources = seed.resolved_sources();

        assert_eq!(
            sources[0],
            CsvSource::new("/srv/data/climate_report.csv", 1)
        );
        assert_eq!(sources[2].doc_id, 3);
    }

    #[test]
    fn should_describe_connection_without_password() {
        let description = DatabaseConfig::default().describe();

        assert_eq!(
            description,
            "postgres://postgres@localhost:5432/postgres (sslmode=disable)"
        );
    }

    #[test]
    fn should_use_default_config_path() {
        assert_eq!(Config::default_config_path(), "./config.toml");
    }
}
