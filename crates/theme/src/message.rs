// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire schema of the theme discovery protocol.
//!
//! Every payload is a JSON object with a protocol version `"v"` and a
//! `"type"` discriminator:
//!
//! ```json
//! {"v":1,"type":"theme_api_available","handle":"theme-provider/…","theme":"Ocean","mode":"day"}
//! ```
//!
//! Decoding fails closed. Bad JSON, an unknown type, a missing field, a
//! different version or a message on the wrong topic are all errors.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use tracing::{debug, warn};

use crate::{
    bus::MessageBus,
    color::ThemeMode,
    metrics::{MESSAGES_DISCARDED, MESSAGES_SENT},
    service::ServiceKey,
};

pub const PROTOCOL_VERSION: u32 = 1;

/// Consumers ask for the provider's handle.
pub const TOPIC_API_REQUEST: &str = "theme.api.request";
/// Provider announces its handle and current theme.
pub const TOPIC_API_AVAILABLE: &str = "theme.api.available";
/// Provider reports a theme or mode change.
pub const TOPIC_THEME_CHANGED: &str = "theme.changed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThemeMessage {
    RequestThemeApi {
        sender_id: String,
    },
    ThemeApiAvailable {
        handle: ServiceKey,
        theme:  String,
        mode:   ThemeMode,
    },
    ThemeChanged {
        theme: String,
        mode:  ThemeMode,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MessageError {
    #[snafu(display("Malformed theme message"))]
    Malformed { source: serde_json::Error },

    #[snafu(display("Unsupported protocol version {found:?}, expected {PROTOCOL_VERSION}"))]
    UnsupportedVersion { found: Option<u64> },

    #[snafu(display("Message {kind} does not belong on topic {topic}"))]
    WrongTopic { topic: String, kind: &'static str },
}

#[derive(Deserialize)]
struct VersionProbe {
    v: Option<u64>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    v:       u32,
    #[serde(flatten)]
    message: &'a ThemeMessage,
}

impl ThemeMessage {
    /// The only topic this message may travel on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::RequestThemeApi { .. } => TOPIC_API_REQUEST,
            Self::ThemeApiAvailable { .. } => TOPIC_API_AVAILABLE,
            Self::ThemeChanged { .. } => TOPIC_THEME_CHANGED,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RequestThemeApi { .. } => "request_theme_api",
            Self::ThemeApiAvailable { .. } => "theme_api_available",
            Self::ThemeChanged { .. } => "theme_changed",
        }
    }

    pub fn encode(&self) -> Result<Bytes, MessageError> {
        let envelope = Envelope {
            v:       PROTOCOL_VERSION,
            message: self,
        };
        serde_json::to_vec(&envelope)
            .map(Bytes::from)
            .context(MalformedSnafu)
    }

    /// Decode `payload` received on `topic`.
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, MessageError> {
        let probe: VersionProbe = serde_json::from_slice(payload).context(MalformedSnafu)?;
        if probe.v != Some(u64::from(PROTOCOL_VERSION)) {
            return UnsupportedVersionSnafu { found: probe.v }.fail();
        }
        let message: Self = serde_json::from_slice(payload).context(MalformedSnafu)?;
        if message.topic() != topic {
            return WrongTopicSnafu {
                topic,
                kind: message.kind(),
            }
            .fail();
        }
        Ok(message)
    }
}

/// Encode `message` and send it on its topic. Encoding failures are logged
/// and the message is dropped.
pub(crate) fn send(bus: &dyn MessageBus, message: &ThemeMessage) {
    match message.encode() {
        Ok(payload) => {
            debug!(topic = message.topic(), kind = message.kind(), "sending theme message");
            MESSAGES_SENT.with_label_values(&[message.topic()]).inc();
            bus.send(message.topic(), payload);
        }
        Err(error) => warn!(kind = message.kind(), %error, "failed to encode theme message"),
    }
}

pub(crate) fn discard(topic: &str, error: &MessageError) {
    MESSAGES_DISCARDED.with_label_values(&[topic]).inc();
    warn!(topic, %error, "discarding theme message");
}
