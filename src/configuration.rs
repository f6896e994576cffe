use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::SandboxKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    pub models: ModelSettings,
    pub project: ProjectDefaults,
    pub timing: TimingSettings,
    pub sandbox: SandboxSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub agent_model: String,
    pub analysis_model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    pub initializer: String,
    pub coding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDefaults {
    pub default_generations_dir: String,
    /// `0` means "unlimited", matching `ProjectSettings::normalized`.
    pub max_iterations: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingSettings {
    pub auto_continue_delay_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    #[serde(rename = "type")]
    pub kind: SandboxKind,
    pub image: String,
    pub network: String,
    pub memory_limit: String,
    pub cpu_limit: String,
    pub ports: Vec<u16>,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use `local` or `production`."
            )),
        }
    }
}

/// Assembles `Settings` from `configuration/base.yaml`, an environment-
/// specific overlay, then `APP`-prefixed environment variables, in that
/// order — the same layering this crate's neighbors in the example pack use
/// the `config` crate for, generalized from the teacher's flat env-var-only
/// `AppConfig::default()`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("failed to determine current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("failed to parse APP_ENVIRONMENT");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
