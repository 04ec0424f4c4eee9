//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using
//! the `clap` crate. These arguments are parsed at startup and then merged
//! with the configuration from the `alertline.toml` file and environment
//! variables.

use clap::{Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Sends one alert notification to a DingTalk robot or over email.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (overrides the configured one).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send a message to the configured DingTalk robot.
    Dingtalk {
        /// Message kind: text, link, markdown, single_actionCard,
        /// multiple_actionCard, or feedCard.
        #[arg(long)]
        kind: String,

        /// Message fields as a JSON object, e.g. '{"content": "disk full"}'.
        #[arg(long)]
        fields: String,
    },
    /// Send an email through the configured SMTP server.
    Email {
        /// Recipient address; repeat for multiple recipients.
        #[arg(long, required = true)]
        to: Vec<String>,

        /// Carbon-copy address; repeatable.
        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        subject: String,

        /// Body text, or HTML markup with --html.
        #[arg(long)]
        content: String,

        /// Treat the content as HTML.
        #[arg(long)]
        html: bool,

        /// Display name for the sender address.
        #[arg(long)]
        sender_name: Option<String>,

        /// File to attach; repeatable.
        #[arg(long, value_name = "FILE")]
        attach: Vec<PathBuf>,
    },
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
