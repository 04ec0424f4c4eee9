//! alertline - one-shot alert notification dispatch.
//!
//! Loads the layered configuration, initializes logging, and delivers a
//! single notification over the channel named on the command line.

use alertline::{
    cli::{Cli, Command},
    config::Config,
    mail::{parse_mailboxes, EmailEnvelope, MailBody},
    message::{MessageFields, MessageKind},
    Notification, Notifier,
};
use anyhow::{Context, Result};
use clap::Parser;
use lettre::message::Mailbox;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli).context("failed to load configuration")?;

    // An unrecognized level is an error, not something to paper over.
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid log level `{}`", config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        robot_url = %config.dingtalk.robot_url,
        mail_host = %config.email.mail_host,
        mail_port = config.email.mail_port,
        "alertline starting"
    );

    let notifier = Notifier::from_config(&config);

    match &cli.command {
        Command::Dingtalk { kind, fields } => {
            let kind: MessageKind = kind.parse()?;
            let raw = serde_json::from_str(fields).context("--fields must be valid JSON")?;
            let fields = MessageFields::from_value(raw)?;
            notifier.notify(Notification::DingTalk { kind, fields }).await?;
            info!("robot message delivered");
        }
        Command::Email {
            to,
            cc,
            subject,
            content,
            html,
            sender_name,
            attach,
        } => {
            let sender = Mailbox::new(
                sender_name.clone(),
                config.email.sender_address().parse()?,
            );
            let recipients = parse_mailboxes(to).context("invalid recipient address")?;
            let body = if *html {
                MailBody::Html(content.clone())
            } else {
                MailBody::Plain(content.clone())
            };
            let mut envelope = EmailEnvelope::new(sender, recipients, subject.clone(), body)?
                .with_cc(parse_mailboxes(cc).context("invalid cc address")?);
            for path in attach {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("bad attachment path {}", path.display()))?
                    .to_string();
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read attachment {}", path.display()))?;
                envelope = envelope.with_attachment(name, bytes);
            }
            notifier.notify(Notification::Email(envelope)).await?;
            info!("email delivered");
        }
    }

    notifier.shutdown().await;
    Ok(())
}
