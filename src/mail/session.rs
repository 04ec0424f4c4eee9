//! The SMTP session state machine.
//!
//! A session is a single-owner resource walking
//! `Disconnected -> Connecting -> Ready -> Closed`. There is no path back to
//! `Connecting`; reconnecting means constructing a fresh session. The actual
//! wire protocol sits behind [`MailTransport`] so tests can run the full
//! lifecycle without an SMTP server.

use crate::config::EmailConfig;
use crate::mail::MailError;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

/// Lifecycle state of a [`MailSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
}

/// The wire side of a mail session.
///
/// Production uses [`SmtpMailTransport`]; tests substitute a recording mock.
#[async_trait]
pub trait MailTransport: Send {
    /// Establishes the TLS connection and authenticates.
    async fn connect(&mut self) -> Result<(), MailError>;

    /// Runs the SMTP transaction for one composed document.
    async fn send(&mut self, message: &Message) -> Result<(), MailError>;

    /// Releases the underlying connection.
    async fn close(&mut self);
}

/// `lettre`-backed transport: implicit TLS plus login credentials.
pub struct SmtpMailTransport {
    host: String,
    port: u16,
    credentials: Credentials,
    inner: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailTransport {
    pub fn from_config(config: &EmailConfig) -> Self {
        Self {
            host: config.mail_host.clone(),
            port: config.mail_port,
            credentials: Credentials::new(config.mail_user.clone(), config.mail_password.clone()),
            inner: None,
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn connect(&mut self) -> Result<(), MailError> {
        let tls = TlsParameters::new(self.host.clone())
            .map_err(|e| MailError::Connection(e.to_string()))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .tls(Tls::Wrapper(tls))
            .credentials(self.credentials.clone())
            .build();
        match transport.test_connection().await {
            Ok(true) => {
                self.inner = Some(transport);
                Ok(())
            }
            Ok(false) => Err(MailError::Connection(
                "server did not accept the handshake".to_string(),
            )),
            Err(e) => Err(MailError::Connection(e.to_string())),
        }
    }

    async fn send(&mut self, message: &Message) -> Result<(), MailError> {
        let transport = self
            .inner
            .as_ref()
            .ok_or_else(|| MailError::Connection("transport is not connected".to_string()))?;
        transport
            .send(message.clone())
            .await
            .map(|_| ())
            .map_err(|e| MailError::Delivery(e.to_string()))
    }

    async fn close(&mut self) {
        // Dropping the transport closes its pooled connections.
        self.inner = None;
    }
}

/// Owns one SMTP connection lifecycle: open, send any number of documents,
/// close. Concurrent sends on one session are undefined; the caller
/// serializes access (the facade holds the session behind a mutex).
pub struct MailSession {
    transport: Box<dyn MailTransport>,
    state: SessionState,
}

impl MailSession {
    pub fn new(transport: Box<dyn MailTransport>) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
        }
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        Self::new(Box::new(SmtpMailTransport::from_config(config)))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects and authenticates. Valid only while `Disconnected`; failure
    /// leaves the session `Disconnected`.
    pub async fn open(&mut self) -> Result<(), MailError> {
        if self.state != SessionState::Disconnected {
            return Err(MailError::InvalidState(self.state));
        }
        self.state = SessionState::Connecting;
        match self.transport.connect().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                info!("mail server connection established");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                error!(error = %e, "mail server connection failed");
                Err(e)
            }
        }
    }

    /// Sends one composed document. Valid only while `Ready`; an
    /// out-of-order call performs no network I/O. Delivery failures are
    /// logged and surfaced, not retried, and leave the session `Ready`.
    pub async fn send(&mut self, document: &Message) -> Result<(), MailError> {
        if self.state != SessionState::Ready {
            return Err(MailError::InvalidState(self.state));
        }
        self.transport.send(document).await.map_err(|e| {
            error!(error = %e, "mail delivery failed");
            e
        })
    }

    /// Releases the connection. A no-op unless the session is `Ready`.
    pub async fn close(&mut self) {
        if self.state == SessionState::Ready {
            self.transport.close().await;
            self.state = SessionState::Closed;
            info!("mail server connection closed");
        }
    }
}
