//! Email delivery: envelope model, MIME composition, and the SMTP session.
//!
//! An [`EmailEnvelope`] carries everything needed to compose one message.
//! [`mime::compose`] turns it into a MIME document without touching the
//! network; [`session::MailSession`] owns the connect/authenticate/send/close
//! lifecycle against the SMTP server.

pub mod mime;
pub mod session;

pub use mime::compose;
pub use session::{MailSession, MailTransport, SessionState, SmtpMailTransport};

use lettre::message::Mailbox;
use std::collections::BTreeMap;
use thiserror::Error;

/// A failure anywhere on the email path.
#[derive(Error, Debug)]
pub enum MailError {
    /// Connecting or authenticating to the SMTP server failed.
    #[error("mail server connection failed: {0}")]
    Connection(String),

    /// The SMTP transaction for a composed document failed.
    #[error("mail delivery failed: {0}")]
    Delivery(String),

    /// The session was used out of lifecycle order. A programmer error, not
    /// a transient condition.
    #[error("mail session is not ready (state: {0:?})")]
    InvalidState(SessionState),

    /// An envelope was built with no recipients.
    #[error("envelope has no recipients")]
    NoRecipients,

    /// An address could not be parsed.
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME document could not be assembled.
    #[error("failed to compose MIME document: {0}")]
    Compose(#[from] lettre::error::Error),
}

/// Parses a list of address strings into mailboxes, stopping at the first
/// bad address.
pub fn parse_mailboxes(raw: &[String]) -> Result<Vec<Mailbox>, MailError> {
    raw.iter().map(|a| Ok(a.parse()?)).collect()
}

/// The single text part of an email body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailBody {
    Plain(String),
    Html(String),
}

impl MailBody {
    pub fn is_html(&self) -> bool {
        matches!(self, MailBody::Html(_))
    }
}

/// Everything needed to compose one deliverable email.
///
/// Built per send and discarded after transmission. Inline images are keyed
/// by a content-id filename (`graph.png` yields `Content-ID: <graph>`) and
/// only take effect for HTML bodies; attachments are keyed by filename.
#[derive(Debug, Clone)]
pub struct EmailEnvelope {
    pub(crate) sender: Mailbox,
    pub(crate) recipients: Vec<Mailbox>,
    pub(crate) cc: Vec<Mailbox>,
    pub(crate) subject: String,
    pub(crate) body: MailBody,
    pub(crate) inline_images: BTreeMap<String, Vec<u8>>,
    pub(crate) attachments: BTreeMap<String, Vec<u8>>,
}

impl EmailEnvelope {
    /// Creates an envelope; at least one recipient is required.
    pub fn new(
        sender: Mailbox,
        recipients: Vec<Mailbox>,
        subject: impl Into<String>,
        body: MailBody,
    ) -> Result<Self, MailError> {
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        Ok(Self {
            sender,
            recipients,
            cc: Vec::new(),
            subject: subject.into(),
            body,
            inline_images: BTreeMap::new(),
            attachments: BTreeMap::new(),
        })
    }

    pub fn with_cc(mut self, cc: Vec<Mailbox>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_inline_image(mut self, content_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.inline_images.insert(content_id.into(), bytes);
        self
    }

    pub fn with_attachment(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachments.insert(filename.into(), bytes);
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_requires_recipients() {
        let sender: Mailbox = "alert@example.com".parse().unwrap();
        let err = EmailEnvelope::new(sender, vec![], "Alert", MailBody::Plain("down".into()))
            .expect_err("empty recipient list must be rejected");
        assert!(matches!(err, MailError::NoRecipients));
    }

    #[test]
    fn mailbox_list_parses_or_reports_the_address_error() {
        let parsed =
            parse_mailboxes(&["a@x.com".to_string(), "Ops <b@x.com>".to_string()]).unwrap();
        assert_eq!(parsed.len(), 2);

        let err = parse_mailboxes(&["not an address".to_string()]).unwrap_err();
        assert!(matches!(err, MailError::Address(_)));
    }

    #[test]
    fn envelope_builder_accumulates_parts() {
        let sender: Mailbox = "alert@example.com".parse().unwrap();
        let envelope = EmailEnvelope::new(
            sender,
            vec!["a@x.com".parse().unwrap()],
            "Alert",
            MailBody::Html("<b>down</b>".into()),
        )
        .unwrap()
        .with_cc(vec!["b@x.com".parse().unwrap()])
        .with_inline_image("graph.png", vec![1, 2, 3])
        .with_attachment("report.pdf", vec![4, 5, 6]);

        assert_eq!(envelope.cc.len(), 1);
        assert!(envelope.inline_images.contains_key("graph.png"));
        assert!(envelope.attachments.contains_key("report.pdf"));
    }
}
