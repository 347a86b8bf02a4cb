//! Wire messages exchanged with the watch server.
//!
//! All messages are JSON text frames:
//!
//! ```json
//! // Client -> Server
//! {"action": "watch", "filepath": "/repo/src/lib.rs", "prevRevision": "main"}
//! {"action": "unwatch", "filepath": "/repo/src/lib.rs", "prevRevision": "main"}
//!
//! // Server -> Client
//! {"type": "fileUpdate", "absolutePath": "/repo/src/lib.rs", "content": "...", "diff": "..."}
//! {"type": "fileRemoved", "absolutePath": "/repo/src/lib.rs"}
//! ```

use serde::{Deserialize, Serialize};

/// Close code for an intentional, clean shutdown. Any other code reconnects.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the stream ended without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Client-to-server request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientRequest {
    Watch(WatchTarget),
    Unwatch(WatchTarget),
}

/// Addressing fields shared by watch and unwatch requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchTarget {
    pub filepath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curr_revision: Option<String>,
}

/// Server-to-client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "fileUpdate")]
    FileUpdate(FileUpdate),
    #[serde(rename = "fileRemoved")]
    FileRemoved {
        #[serde(rename = "absolutePath")]
        absolute_path: String,
    },
}

impl ServerMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Path the message is addressed to
    pub fn absolute_path(&self) -> &str {
        match self {
            ServerMessage::FileUpdate(update) => &update.absolute_path,
            ServerMessage::FileRemoved { absolute_path } => absolute_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub absolute_path: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Unified diff between the revision pair (or working copy vs HEAD)
    #[serde(default)]
    pub diff: Option<String>,
    #[serde(default)]
    pub original_content: Option<String>,
    #[serde(default)]
    pub modified_content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Payload of an update, detached from its address
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdatePayload {
    pub content: Option<String>,
    pub diff: Option<String>,
    pub original_content: Option<String>,
    pub modified_content: Option<String>,
    pub error: Option<String>,
}

impl From<&FileUpdate> for UpdatePayload {
    fn from(update: &FileUpdate) -> Self {
        Self {
            content: update.content.clone(),
            diff: update.diff.clone(),
            original_content: update.original_content.clone(),
            modified_content: update.modified_content.clone(),
            error: update.error.clone(),
        }
    }
}
