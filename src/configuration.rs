use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use anyhow::Context;
use secrecy::SecretString;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::{
    domain::EmailAddress,
    email_client::{ApiEmailClient, EmailSender, SmtpEmailClient},
};

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub email_client: EmailClientSettings,
    pub dispatch: DispatchSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_upload_bytes: usize,
}

#[derive(serde::Deserialize, Clone)]
pub struct DispatchSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub concurrency_limit: usize,
}

impl DispatchSettings {
    pub fn concurrency_limit(&self) -> Result<NonZeroUsize, String> {
        NonZeroUsize::new(self.concurrency_limit)
            .ok_or_else(|| "dispatch.concurrency_limit must be greater than zero".to_string())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub sender_email: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
    pub transport: TransportSettings,
}

#[derive(serde::Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportSettings {
    Smtp {
        host: String,
        #[serde(deserialize_with = "deserialize_number_from_string")]
        port: u16,
        tls: SmtpTls,
        username: String,
        password: SecretString,
    },
    Api {
        base_url: String,
        authorization_token: SecretString,
    },
}

/// `wrapper` is implicit TLS (port 465), `starttls` upgrades a plain
/// connection (port 587), `none` is for local relays only.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    Wrapper,
    Starttls,
    None,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<EmailAddress, String> {
        EmailAddress::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn client(self) -> anyhow::Result<Arc<dyn EmailSender>> {
        let sender = self
            .sender()
            .map_err(anyhow::Error::msg)
            .context("Invalid sender email address.")?;
        let timeout = self.timeout();
        let client: Arc<dyn EmailSender> = match self.transport {
            TransportSettings::Smtp {
                host,
                port,
                tls,
                username,
                password,
            } => Arc::new(
                SmtpEmailClient::new(&host, port, tls, username, &password, sender, timeout)
                    .context("Failed to build the SMTP transport.")?,
            ),
            TransportSettings::Api {
                base_url,
                authorization_token,
            } => Arc::new(
                ApiEmailClient::new(base_url, sender, authorization_token, timeout)
                    .context("Failed to build the email API client.")?,
            ),
        };
        Ok(client)
    }
}

#[derive(Debug)]
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
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

/// Layers `configuration/base.yaml`, `configuration/<APP_ENVIRONMENT>.yaml`
/// and `APP_*` environment variables, e.g.
/// `APP_EMAIL_CLIENT__TRANSPORT__PASSWORD=...`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
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
