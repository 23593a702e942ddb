// ABOUTME: Wire events delivered by the generation stream and the chat socket
// ABOUTME: Progress ticks, document update deltas, chat messages and outbound requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::patch::PatchOperation;
use crate::types::DocumentMetadata;

/// One tick of the progressive generation channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProgressEvent {
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub crs_document_id: Option<i64>,
    /// Partial or complete content snapshot
    #[serde(default)]
    pub crs_template: Option<Value>,
    #[serde(default)]
    pub summary_points: Option<Vec<String>>,
    #[serde(default)]
    pub overall_summary: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StreamProgressEvent {
    pub fn progress(step: impl Into<String>, progress_percent: f64) -> Self {
        Self {
            step: step.into(),
            message: String::new(),
            progress_percent,
            is_complete: false,
            crs_document_id: None,
            crs_template: None,
            summary_points: None,
            overall_summary: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.crs_template = Some(template);
        self
    }

    pub fn completed(mut self, crs_document_id: Option<i64>) -> Self {
        self.is_complete = true;
        self.progress_percent = 100.0;
        self.crs_document_id = crs_document_id;
        self
    }

    /// Completion events with a persisted id trigger an authoritative reload
    pub fn reload_target(&self) -> Option<i64> {
        if self.is_complete {
            self.crs_document_id.filter(|id| *id > 0)
        } else {
            None
        }
    }
}

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A chat message carried over the session socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Document delta pushed over the socket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentUpdate {
    /// Operations the client cannot decode are kept as unsupported so the
    /// update still arrives and falls back to `full_content`
    #[serde(deserialize_with = "lenient_patch_ops")]
    pub patch_ops: Option<Vec<PatchOperation>>,
    pub full_content: Option<String>,
    pub metadata: DocumentMetadata,
}

fn lenient_patch_ops<'de, D>(deserializer: D) -> Result<Option<Vec<PatchOperation>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(PatchOperation::from_value_lenient)
                .collect(),
        ),
        Some(other) => Some(vec![PatchOperation::Unsupported { raw: other }]),
    })
}

/// Inbound events on the bidirectional session channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketEvent {
    ChatMessage {
        message: ChatMessage,
    },
    CrsUpdate(DocumentUpdate),
    GenerationComplete {
        #[serde(default)]
        crs_document_id: Option<i64>,
        #[serde(default)]
        project_id: Option<i64>,
    },
    Typing {
        is_typing: bool,
    },
    Error {
        message: String,
    },
}

/// Outbound requests on the session channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    SendMessage { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_progress_event_tolerates_sparse_payload() {
        let event: StreamProgressEvent = serde_json::from_value(json!({
            "step": "drafting",
            "progress_percent": 40.0,
            "crs_template": {"project_description": "Build"}
        }))
        .unwrap();

        assert!(!event.is_complete);
        assert_eq!(event.crs_template, Some(json!({"project_description": "Build"})));
        assert_eq!(event.reload_target(), None);
    }

    #[test]
    fn test_reload_target_requires_completion_and_persisted_id() {
        let pending = StreamProgressEvent::progress("draft", 50.0);
        assert_eq!(pending.reload_target(), None);

        let unsaved = StreamProgressEvent::progress("done", 100.0).completed(Some(0));
        assert_eq!(unsaved.reload_target(), None);

        let saved = StreamProgressEvent::progress("done", 100.0).completed(Some(42));
        assert_eq!(saved.reload_target(), Some(42));
    }

    #[test]
    fn test_socket_crs_update_parses() {
        let event: SocketEvent = serde_json::from_value(json!({
            "type": "crs_update",
            "patch_ops": [{"op": "replace", "path": "/a", "value": 2}],
            "metadata": {"id": 9, "version": 1}
        }))
        .unwrap();

        match event {
            SocketEvent::CrsUpdate(update) => {
                assert_eq!(update.patch_ops.map(|ops| ops.len()), Some(1));
                assert!(update.full_content.is_none());
                assert_eq!(update.metadata.id, Some(9));
                assert_eq!(update.metadata.structural_version, Some(1));
            }
            other => panic!("Expected CrsUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_crs_update_with_unknown_operation_still_parses() {
        let event: SocketEvent = serde_json::from_value(json!({
            "type": "crs_update",
            "patch_ops": [
                {"op": "replace", "path": "/a", "value": 2},
                {"op": "move", "from": "/a", "path": "/b"}
            ],
            "full_content": "{\"b\":1}",
            "metadata": {"id": 9}
        }))
        .unwrap();

        let SocketEvent::CrsUpdate(update) = event else {
            panic!("Expected CrsUpdate");
        };
        let ops = update.patch_ops.unwrap();
        assert_eq!(ops[0], PatchOperation::replace("/a", json!(2)));
        assert_eq!(ops[1].kind(), "unsupported");
        assert_eq!(update.full_content.as_deref(), Some("{\"b\":1}"));
        assert_eq!(update.metadata.id, Some(9));
    }

    #[test]
    fn test_crs_update_with_non_list_operations_still_parses() {
        let event: SocketEvent = serde_json::from_value(json!({
            "type": "crs_update",
            "patch_ops": {"op": "replace"},
            "full_content": "{}"
        }))
        .unwrap();

        let SocketEvent::CrsUpdate(update) = event else {
            panic!("Expected CrsUpdate");
        };
        assert_eq!(update.patch_ops.map(|ops| ops[0].kind()), Some("unsupported"));
    }

    #[test]
    fn test_socket_chat_and_completion_parse() {
        let chat: SocketEvent = serde_json::from_value(json!({
            "type": "chat_message",
            "message": {"role": "assistant", "content": "Who are the users?"}
        }))
        .unwrap();
        assert!(matches!(chat, SocketEvent::ChatMessage { .. }));

        let done: SocketEvent = serde_json::from_value(json!({
            "type": "generation_complete",
            "crs_document_id": 12
        }))
        .unwrap();
        assert_eq!(
            done,
            SocketEvent::GenerationComplete {
                crs_document_id: Some(12),
                project_id: None
            }
        );
    }

    #[test]
    fn test_outbound_message_shape() {
        let msg = OutboundMessage::SendMessage {
            content: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "send_message", "content": "hello"})
        );
    }
}
