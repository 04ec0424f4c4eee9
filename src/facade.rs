//! The single entry point callers use to deliver an alert.
//!
//! A [`Notifier`] owns one webhook client and one mail session; callers hand
//! it a [`Notification`] and get back a typed result. Nothing below this
//! boundary propagates as a panic: validation, delivery, and session errors
//! all come back as [`NotificationError`] values.

use crate::config::Config;
use crate::mail::{compose, EmailEnvelope, MailError, MailSession, SessionState};
use crate::message::{AlertMessage, MessageFields, MessageKind, ValidationError};
use crate::webhook::{DeliveryError, DingTalkClient};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

/// A failure reported to the caller of [`Notifier::notify`].
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// One alert, addressed to a channel.
#[derive(Debug)]
pub enum Notification {
    /// A robot webhook message, built from a kind and a field bag.
    DingTalk {
        kind: MessageKind,
        fields: MessageFields,
    },
    /// An email, fully described by its envelope.
    Email(EmailEnvelope),
}

/// Dispatches notifications over both channels.
///
/// The mail session is opened lazily on the first email and closed by
/// [`Notifier::shutdown`]; it sits behind a mutex because a session must not
/// see concurrent sends.
pub struct Notifier {
    webhook: DingTalkClient,
    mail: Arc<Mutex<MailSession>>,
}

impl Notifier {
    pub fn new(webhook: DingTalkClient, mail: MailSession) -> Self {
        Self {
            webhook,
            mail: Arc::new(Mutex::new(mail)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DingTalkClient::new(&config.dingtalk.robot_url, &config.dingtalk.robot_token),
            MailSession::from_config(&config.email),
        )
    }

    /// Builds and delivers one notification.
    ///
    /// For the webhook channel a failed build short-circuits before any
    /// network attempt. For email the session is opened on first use and
    /// kept open for subsequent sends.
    pub async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        match notification {
            Notification::DingTalk { kind, fields } => {
                let message = AlertMessage::from_fields(kind, fields)?;
                self.webhook.dispatch(&message).await?;
                Ok(())
            }
            Notification::Email(envelope) => deliver_email(&self.mail, &envelope).await,
        }
    }

    /// Schedules an email send without waiting for it.
    ///
    /// A failed detached send is logged; the caller only observes it by
    /// awaiting the returned handle.
    pub fn notify_email_detached(
        &self,
        envelope: EmailEnvelope,
    ) -> JoinHandle<Result<(), NotificationError>> {
        let mail = self.mail.clone();
        tokio::spawn(async move {
            let result = deliver_email(&mail, &envelope).await;
            if let Err(e) = &result {
                error!(subject = envelope.subject(), error = %e, "detached email send failed");
            }
            result
        })
    }

    /// Closes the mail session. Call once when the notifier is retired.
    pub async fn shutdown(&self) {
        self.mail.lock().await.close().await;
    }
}

async fn deliver_email(
    mail: &Mutex<MailSession>,
    envelope: &EmailEnvelope,
) -> Result<(), NotificationError> {
    let document = compose(envelope)?;
    let mut session = mail.lock().await;
    if session.state() == SessionState::Disconnected {
        session.open().await?;
    }
    session.send(&document).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{MailBody, MailTransport};
    use async_trait::async_trait;
    use lettre::Message;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TransportStats {
        connects: AtomicUsize,
        sends: AtomicUsize,
        fail_send: AtomicBool,
    }

    struct RecordingTransport {
        stats: Arc<TransportStats>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn connect(&mut self) -> Result<(), MailError> {
            self.stats.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&mut self, _message: &Message) -> Result<(), MailError> {
            self.stats.sends.fetch_add(1, Ordering::SeqCst);
            if self.stats.fail_send.load(Ordering::SeqCst) {
                return Err(MailError::Delivery("451 try again later".to_string()));
            }
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn notifier_with_mail() -> (Notifier, Arc<TransportStats>) {
        let stats = Arc::new(TransportStats::default());
        let session = MailSession::new(Box::new(RecordingTransport {
            stats: stats.clone(),
        }));
        // The webhook side points nowhere; these tests never dispatch to it.
        let notifier = Notifier::new(DingTalkClient::new("http://127.0.0.1:9/", ""), session);
        (notifier, stats)
    }

    fn envelope() -> EmailEnvelope {
        EmailEnvelope::new(
            "alert@example.com".parse().unwrap(),
            vec!["a@x.com".parse().unwrap()],
            "Alert",
            MailBody::Plain("down".into()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn email_opens_the_session_once_and_reuses_it() {
        let (notifier, stats) = notifier_with_mail();
        notifier.notify(Notification::Email(envelope())).await.unwrap();
        notifier.notify(Notification::Email(envelope())).await.unwrap();

        assert_eq!(stats.connects.load(Ordering::SeqCst), 1);
        assert_eq!(stats.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn email_after_shutdown_is_an_invalid_state() {
        let (notifier, stats) = notifier_with_mail();
        notifier.notify(Notification::Email(envelope())).await.unwrap();
        notifier.shutdown().await;

        let err = notifier
            .notify(Notification::Email(envelope()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Mail(MailError::InvalidState(SessionState::Closed))
        ));
        assert_eq!(stats.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detached_send_resolves_through_the_handle() {
        let (notifier, stats) = notifier_with_mail();
        let handle = notifier.notify_email_detached(envelope());
        handle.await.expect("task join").expect("send result");
        assert_eq!(stats.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn detached_failure_is_only_visible_when_awaited() {
        let (notifier, stats) = notifier_with_mail();
        stats.fail_send.store(true, Ordering::SeqCst);

        let handle = notifier.notify_email_detached(envelope());
        let result = handle.await.expect("task join");
        assert!(matches!(
            result,
            Err(NotificationError::Mail(MailError::Delivery(_)))
        ));
    }

    #[tokio::test]
    async fn webhook_validation_failure_short_circuits() {
        let (notifier, _stats) = notifier_with_mail();
        // Blank content: must fail validation before any network attempt.
        // The client points at a dead port, so reaching the network would
        // surface as a Transport error instead.
        let err = notifier
            .notify(Notification::DingTalk {
                kind: MessageKind::Text,
                fields: MessageFields {
                    content: Some("   ".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NotificationError::Validation(ValidationError::MissingField("content"))
        ));
    }
}
