//! Configuration management for alertline.
//!
//! This module defines the `Config` struct and its sub-structs for the two
//! delivery channels. It uses the `figment` crate to layer defaults, an
//! `alertline.toml` file, environment variables, and command-line arguments.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the DingTalk robot webhook.
    pub dingtalk: DingTalkConfig,
    /// Configuration for SMTP delivery.
    pub email: EmailConfig,
}

/// Configuration for the DingTalk robot webhook.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DingTalkConfig {
    /// The robot send endpoint, up to and including `access_token=`.
    pub robot_url: String,
    /// The robot's access token, appended verbatim to the URL.
    pub robot_token: String,
}

/// Configuration for SMTP delivery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub mail_host: String,
    pub mail_port: u16,
    /// Local part of the sender address; also the SMTP login user.
    pub mail_user: String,
    pub mail_password: String,
    /// Domain part of the sender address.
    pub mail_suffix: String,
}

impl EmailConfig {
    /// The sender address derived from user and suffix.
    pub fn sender_address(&self) -> String {
        format!("{}@{}", self.mail_user, self.mail_suffix)
    }
}

impl Config {
    /// Loads the configuration by layering sources: defaults, the TOML file,
    /// `ALERTLINE_*` environment variables, and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = cli
            .config
            .clone()
            .unwrap_or_else(|| "alertline.toml".into());
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("ALERTLINE_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Defaults keep tests and first runs working without a config file; the
// credential fields are deliberately empty.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dingtalk: DingTalkConfig {
                robot_url: "https://oapi.dingtalk.com/robot/send?access_token=".to_string(),
                robot_token: String::new(),
            },
            email: EmailConfig {
                mail_host: "localhost".to_string(),
                mail_port: 465,
                mail_user: "alert".to_string(),
                mail_password: String::new(),
                mail_suffix: "localhost".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_address_joins_user_and_suffix() {
        let email = EmailConfig {
            mail_host: "smtp.example.com".to_string(),
            mail_port: 465,
            mail_user: "ops".to_string(),
            mail_password: "secret".to_string(),
            mail_suffix: "example.com".to_string(),
        };
        assert_eq!(email.sender_address(), "ops@example.com");
    }

    #[test]
    fn defaults_leave_credentials_empty() {
        let config = Config::default();
        assert!(config.dingtalk.robot_token.is_empty());
        assert!(config.email.mail_password.is_empty());
        assert_eq!(config.log_level, "info");
    }
}
