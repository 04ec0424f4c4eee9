//! Validated construction of DingTalk robot messages.
//!
//! Each message kind the robot API accepts is a variant of [`AlertMessage`].
//! Callers supply an open bag of fields ([`MessageFields`]); construction
//! checks required fields in the order the API documents them and fills in
//! defaults for the optional ones. Construction never performs I/O.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::error;

/// A field failed validation while building a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent, or present but blank after trimming.
    #[error("required field `{0}` is missing or blank")]
    MissingField(&'static str),

    /// A field was present but carried a value of the wrong shape.
    #[error("field `{0}` has the wrong type")]
    TypeMismatch(&'static str),

    /// The message kind is not one the robot API supports.
    #[error("unsupported message kind `{0}`")]
    UnsupportedKind(String),

    /// The field bag itself could not be decoded.
    #[error("malformed message fields: {0}")]
    Malformed(String),
}

/// The message kinds the DingTalk robot API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Link,
    Markdown,
    SingleActionCard,
    MultiActionCard,
    FeedCard,
}

impl FromStr for MessageKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "link" => Ok(MessageKind::Link),
            "markdown" => Ok(MessageKind::Markdown),
            "single_actionCard" => Ok(MessageKind::SingleActionCard),
            "multiple_actionCard" => Ok(MessageKind::MultiActionCard),
            "feedCard" => Ok(MessageKind::FeedCard),
            other => Err(ValidationError::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::Link => "link",
            MessageKind::Markdown => "markdown",
            MessageKind::SingleActionCard => "single_actionCard",
            MessageKind::MultiActionCard => "multiple_actionCard",
            MessageKind::FeedCard => "feedCard",
        };
        f.write_str(s)
    }
}

/// Whether the robot's avatar is shown next to a card message.
///
/// The wire format is the string `"0"` (show) or `"1"` (hide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarDisplay {
    #[default]
    Show,
    Hide,
}

impl AvatarDisplay {
    fn as_str(self) -> &'static str {
        match self {
            AvatarDisplay::Show => "0",
            AvatarDisplay::Hide => "1",
        }
    }
}

/// How a card's buttons are laid out: `"0"` vertical, `"1"` horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonLayout {
    #[default]
    Vertical,
    Horizontal,
}

impl ButtonLayout {
    fn as_str(self) -> &'static str {
        match self {
            ButtonLayout::Vertical => "0",
            ButtonLayout::Horizontal => "1",
        }
    }
}

/// One button on an independent-jump action card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub title: String,
    #[serde(rename = "actionURL")]
    pub action_url: String,
}

/// One entry on a feed card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLink {
    pub title: String,
    #[serde(rename = "messageURL")]
    pub message_url: String,
    #[serde(rename = "picURL")]
    pub pic_url: String,
}

/// The open bag of fields a caller supplies for any message kind.
///
/// Which fields are required depends on the [`MessageKind`] passed to
/// [`AlertMessage::from_fields`]; everything here is optional at the type
/// level so one bag serves all six kinds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageFields {
    pub content: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub message_url: Option<String>,
    pub pic_url: Option<String>,
    pub at_mobiles: Option<Vec<String>>,
    pub is_at_all: Option<bool>,
    pub single_title: Option<String>,
    pub single_url: Option<String>,
    /// `0` shows the robot's avatar, `1` hides it.
    pub hide_avatar: Option<u8>,
    /// `0` lays buttons out vertically, `1` horizontally.
    pub btn_orientation: Option<u8>,
    pub btns: Option<Vec<ActionButton>>,
    pub links: Option<Vec<FeedLink>>,
}

impl MessageFields {
    /// Decodes a field bag from loose JSON, e.g. from the command line.
    ///
    /// The list-typed fields (`btns`, `links`) are checked explicitly so a
    /// scalar where a list belongs reports which field was mistyped instead
    /// of a generic decode error.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let map = value
            .as_object()
            .ok_or_else(|| ValidationError::Malformed("fields must be a JSON object".into()))?;
        for name in ["btns", "links"] {
            if let Some(v) = map.get(name) {
                if !v.is_array() && !v.is_null() {
                    return Err(ValidationError::TypeMismatch(name));
                }
            }
        }
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

/// A fully validated robot message, ready for dispatch.
///
/// Values are immutable once constructed; [`AlertMessage::to_payload`]
/// renders the exact JSON envelope the robot endpoint expects.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertMessage {
    Text {
        content: String,
        at_mobiles: Vec<String>,
        at_all: bool,
    },
    Link {
        title: String,
        text: String,
        message_url: String,
        pic_url: Option<String>,
    },
    Markdown {
        title: String,
        text: String,
        at_mobiles: Vec<String>,
        at_all: bool,
    },
    SingleActionCard {
        title: String,
        text: String,
        single_title: String,
        single_url: String,
        hide_avatar: AvatarDisplay,
        btn_orientation: ButtonLayout,
    },
    MultiActionCard {
        title: String,
        text: String,
        btns: Vec<ActionButton>,
        hide_avatar: AvatarDisplay,
        btn_orientation: ButtonLayout,
    },
    FeedCard {
        links: Vec<FeedLink>,
    },
}

/// Returns the trimmed value of a required string field, or names it in a
/// `MissingField` error when absent or blank.
fn require(field: &'static str, value: &Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn avatar_display(raw: Option<u8>) -> Result<AvatarDisplay, ValidationError> {
    match raw {
        None | Some(0) => Ok(AvatarDisplay::Show),
        Some(1) => Ok(AvatarDisplay::Hide),
        Some(_) => Err(ValidationError::TypeMismatch("hide_avatar")),
    }
}

fn button_layout(raw: Option<u8>) -> Result<ButtonLayout, ValidationError> {
    match raw {
        None | Some(0) => Ok(ButtonLayout::Vertical),
        Some(1) => Ok(ButtonLayout::Horizontal),
        Some(_) => Err(ValidationError::TypeMismatch("btn_orientation")),
    }
}

impl AlertMessage {
    /// Builds a message of the given kind from a field bag.
    ///
    /// Required fields are checked in the order the robot API documents them;
    /// the first missing or blank one fails the build. Validation failures
    /// are also logged, since builds usually run deep inside a dispatch flow.
    pub fn from_fields(
        kind: MessageKind,
        fields: MessageFields,
    ) -> Result<AlertMessage, ValidationError> {
        let result = Self::build(kind, fields);
        if let Err(e) = &result {
            error!(kind = %kind, error = %e, "rejected invalid message");
        }
        result
    }

    fn build(kind: MessageKind, fields: MessageFields) -> Result<AlertMessage, ValidationError> {
        match kind {
            MessageKind::Text => Ok(AlertMessage::Text {
                content: require("content", &fields.content)?,
                at_mobiles: fields.at_mobiles.unwrap_or_default(),
                at_all: fields.is_at_all.unwrap_or(false),
            }),
            MessageKind::Link => Ok(AlertMessage::Link {
                title: require("title", &fields.title)?,
                text: require("text", &fields.text)?,
                message_url: require("message_url", &fields.message_url)?,
                pic_url: fields.pic_url,
            }),
            MessageKind::Markdown => Ok(AlertMessage::Markdown {
                title: require("title", &fields.title)?,
                text: require("text", &fields.text)?,
                at_mobiles: fields.at_mobiles.unwrap_or_default(),
                at_all: fields.is_at_all.unwrap_or(false),
            }),
            MessageKind::SingleActionCard => Ok(AlertMessage::SingleActionCard {
                title: require("title", &fields.title)?,
                text: require("text", &fields.text)?,
                single_title: require("single_title", &fields.single_title)?,
                single_url: require("single_url", &fields.single_url)?,
                hide_avatar: avatar_display(fields.hide_avatar)?,
                btn_orientation: button_layout(fields.btn_orientation)?,
            }),
            MessageKind::MultiActionCard => Ok(AlertMessage::MultiActionCard {
                title: require("title", &fields.title)?,
                text: require("text", &fields.text)?,
                btns: fields
                    .btns
                    .ok_or(ValidationError::MissingField("btns"))?,
                hide_avatar: avatar_display(fields.hide_avatar)?,
                btn_orientation: button_layout(fields.btn_orientation)?,
            }),
            MessageKind::FeedCard => Ok(AlertMessage::FeedCard {
                links: fields
                    .links
                    .ok_or(ValidationError::MissingField("links"))?,
            }),
        }
    }

    /// Renders the JSON envelope the robot endpoint expects.
    ///
    /// The top-level `msgtype` tag selects the nested object; text and
    /// markdown messages additionally carry an `at` block for mentions.
    pub fn to_payload(&self) -> Value {
        match self {
            AlertMessage::Text {
                content,
                at_mobiles,
                at_all,
            } => json!({
                "msgtype": "text",
                "text": { "content": content },
                "at": { "atMobiles": at_mobiles, "isAtAll": at_all },
            }),
            AlertMessage::Link {
                title,
                text,
                message_url,
                pic_url,
            } => json!({
                "msgtype": "link",
                "link": {
                    "title": title,
                    "text": text,
                    "messageUrl": message_url,
                    "picUrl": pic_url.as_deref().unwrap_or(""),
                },
            }),
            AlertMessage::Markdown {
                title,
                text,
                at_mobiles,
                at_all,
            } => json!({
                "msgtype": "markdown",
                "markdown": { "title": title, "text": text },
                "at": { "atMobiles": at_mobiles, "isAtAll": at_all },
            }),
            AlertMessage::SingleActionCard {
                title,
                text,
                single_title,
                single_url,
                hide_avatar,
                btn_orientation,
            } => json!({
                "msgtype": "actionCard",
                "actionCard": {
                    "title": title,
                    "text": text,
                    "hideAvatar": hide_avatar.as_str(),
                    "btnOrientation": btn_orientation.as_str(),
                    "singleTitle": single_title,
                    "singleURL": single_url,
                },
            }),
            AlertMessage::MultiActionCard {
                title,
                text,
                btns,
                hide_avatar,
                btn_orientation,
            } => json!({
                "msgtype": "actionCard",
                "actionCard": {
                    "title": title,
                    "text": text,
                    "hideAvatar": hide_avatar.as_str(),
                    "btnOrientation": btn_orientation.as_str(),
                    "btns": btns,
                },
            }),
            AlertMessage::FeedCard { links } => json!({
                "msgtype": "feedCard",
                "feedCard": { "links": links },
            }),
        }
    }
}
