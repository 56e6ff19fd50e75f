//! Inbound update payloads from the Bot API webhook.
//!
//! Only the fields the gateway reads are modeled; everything else in the
//! envelope is ignored during deserialization.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media_group_id: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
    pub voice: Option<Voice>,
    pub audio: Option<Audio>,
}

impl Message {
    /// Telegram orders photo sizes smallest first; the last entry is the
    /// original-resolution rendition.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }

    pub fn sender_name(&self) -> &str {
        self.from
            .as_ref()
            .and_then(|user| user.username.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Update;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Update {
        serde_json::from_value(value).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_text_update_parses() {
        let update = parse(json!({
            "update_id": 900_001,
            "message": {
                "message_id": 42,
                "chat": { "id": 123, "type": "private" },
                "from": { "id": 123, "username": "alice", "is_bot": false },
                "text": "hello",
                "date": 1_700_000_000
            }
        }));
        assert_eq!(update.update_id, 900_001);
        let Some(message) = update.message else {
            panic!("message missing");
        };
        assert_eq!(message.chat.id, 123);
        assert_eq!(message.chat.kind, "private");
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert_eq!(message.sender_name(), "alice");
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_photo_update_largest_size_is_last() {
        let update = parse(json!({
            "update_id": 900_002,
            "message": {
                "message_id": 43,
                "chat": { "id": 123, "type": "private" },
                "caption": "what is this?",
                "media_group_id": "13086",
                "photo": [
                    { "file_id": "small", "width": 90, "height": 90 },
                    { "file_id": "medium", "width": 320, "height": 320 },
                    { "file_id": "large", "width": 1280, "height": 1280 }
                ]
            }
        }));
        let Some(message) = update.message else {
            panic!("message missing");
        };
        let Some(size) = message.largest_photo() else {
            panic!("photo missing");
        };
        assert_eq!(size.file_id, "large");
        assert_eq!(message.media_group_id.as_deref(), Some("13086"));
        assert_eq!(message.sender_name(), "unknown");
    }

    #[test]
    fn test_callback_update_parses() {
        let update = parse(json!({
            "update_id": 900_003,
            "callback_query": {
                "id": "cbq-1",
                "from": { "id": 123, "username": "alice" },
                "message": {
                    "message_id": 50,
                    "chat": { "id": 123, "type": "private" }
                },
                "data": "grok-2-vision-latest"
            }
        }));
        let Some(callback) = update.callback_query else {
            panic!("callback missing");
        };
        assert_eq!(callback.from.id, 123);
        assert_eq!(callback.data.as_deref(), Some("grok-2-vision-latest"));
        let Some(message) = callback.message else {
            panic!("callback message missing");
        };
        assert_eq!(message.message_id, 50);
    }

    #[test]
    fn test_document_and_voice_fields() {
        let update = parse(json!({
            "update_id": 900_004,
            "message": {
                "message_id": 44,
                "chat": { "id": 456, "type": "private" },
                "document": { "file_id": "doc-1", "file_name": "report.pdf" },
                "caption": "summarize"
            }
        }));
        let Some(message) = update.message else {
            panic!("message missing");
        };
        let Some(document) = message.document else {
            panic!("document missing");
        };
        assert_eq!(document.file_id, "doc-1");
        assert_eq!(document.file_name.as_deref(), Some("report.pdf"));
    }
}
