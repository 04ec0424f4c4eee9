//! A client for delivering alert messages to a DingTalk robot webhook.

use crate::message::AlertMessage;
use crate::rate_limit::RateLimiter;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Delivery to the webhook endpoint failed.
///
/// Known provider `errcode` values: `300001` parameter error, `101002`
/// content too long, `130101` sending too fast, `300004` content not
/// permitted, `1001` provider-side error.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The provider accepted the request but rejected the message.
    #[error("provider rejected message: errcode={errcode} errmsg={errmsg}")]
    ProviderRejected { errcode: i64, errmsg: String },

    /// The request never produced a parseable provider response.
    #[error("webhook transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The provider's response envelope; `errcode == 0` means accepted.
#[derive(Debug, Deserialize)]
struct WebhookReply {
    errcode: i64,
    errmsg: String,
}

/// Sends validated messages to one robot's webhook URL.
///
/// Each dispatch makes exactly one HTTP attempt, preceded by a rate-limiter
/// admission. The limiter sits behind a tokio mutex, so concurrent dispatch
/// flows are admitted in FIFO order and a throttled flow suspends without
/// stalling the others.
pub struct DingTalkClient {
    endpoint: String,
    http: reqwest::Client,
    limiter: Mutex<RateLimiter>,
}

impl DingTalkClient {
    /// Creates a client for `robot_url` + `robot_token`.
    pub fn new(robot_url: &str, robot_token: &str) -> Self {
        Self {
            endpoint: format!("{robot_url}{robot_token}"),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            limiter: Mutex::new(RateLimiter::dingtalk()),
        }
    }

    /// Delivers one message, waiting on the rate limiter if necessary.
    ///
    /// A non-zero provider `errcode` and any transport failure are both
    /// logged and surfaced as an `Err`; neither is retried here.
    #[instrument(skip(self, message))]
    pub async fn dispatch(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
        self.limiter.lock().await.admit().await;

        let payload = message.to_payload();
        let reply: WebhookReply = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json;charset=utf-8")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "webhook request failed");
                e
            })?
            .json()
            .await
            .map_err(|e| {
                error!(error = %e, "webhook response was not a provider envelope");
                e
            })?;

        if reply.errcode == 0 {
            debug!("message accepted by provider");
            Ok(())
        } else {
            error!(
                errcode = reply.errcode,
                errmsg = %reply.errmsg,
                "provider rejected message"
            );
            Err(DeliveryError::ProviderRejected {
                errcode: reply.errcode,
                errmsg: reply.errmsg,
            })
        }
    }
}
