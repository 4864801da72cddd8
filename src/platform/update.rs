use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct RawUpdate {
    message: Option<RawMessage>,
    edited_message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    chat: Option<RawChat>,
    from: Option<RawUser>,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawChat {
    id: Option<i64>,
    username: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    id: Option<i64>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCallbackQuery {
    #[serde(default)]
    id: String,
    from: Option<RawUser>,
    message: Option<RawMessage>,
    data: Option<String>,
}

/// One inbound webhook event, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingUpdate {
    /// Text starting with `/`. `command` is lower-cased, without `@botname`.
    Command {
        chat_id: i64,
        sender: String,
        command: String,
        text: String,
    },
    Text {
        chat_id: i64,
        sender: String,
        text: String,
    },
    /// Inline button press.
    Callback {
        query_id: String,
        chat_id: i64,
        sender: String,
        data: String,
    },
    Unrecognized,
}

impl IncomingUpdate {
    /// Classify a raw webhook body. Errors only on malformed JSON.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: RawUpdate = serde_json::from_slice(body).context("Malformed update JSON")?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawUpdate) -> Self {
        if let Some(query) = raw.callback_query {
            return Self::from_callback(query);
        }

        match raw.message.or(raw.edited_message) {
            Some(message) => Self::from_message(message),
            None => Self::Unrecognized,
        }
    }

    fn from_callback(query: RawCallbackQuery) -> Self {
        let chat_id = query
            .message
            .as_ref()
            .and_then(|m| m.chat.as_ref())
            .and_then(|c| c.id)
            .or_else(|| query.from.as_ref().and_then(|u| u.id));

        // A press without data still needs an answer to clear the client spinner.
        match chat_id {
            Some(chat_id) => Self::Callback {
                sender: sender_label(query.from.as_ref(), None),
                query_id: query.id,
                chat_id,
                data: query.data.unwrap_or_default(),
            },
            None => Self::Unrecognized,
        }
    }

    fn from_message(message: RawMessage) -> Self {
        let Some(chat_id) = message.chat.as_ref().and_then(|c| c.id) else {
            return Self::Unrecognized;
        };
        let sender = sender_label(message.from.as_ref(), message.chat.as_ref());

        let text = message
            .text
            .or(message.caption)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Self::Unrecognized;
        }

        match parse_command(&text) {
            Some(command) => Self::Command {
                chat_id,
                sender,
                command,
                text,
            },
            None => Self::Text {
                chat_id,
                sender,
                text,
            },
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Command { chat_id, .. }
            | Self::Text { chat_id, .. }
            | Self::Callback { chat_id, .. } => Some(*chat_id),
            Self::Unrecognized => None,
        }
    }
}

/// `/Start@zakon_bot args` → `/start`
fn parse_command(text: &str) -> Option<String> {
    if !text.starts_with('/') {
        return None;
    }
    let first = text.split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first);
    if name.len() < 2 {
        return None;
    }
    Some(name.to_lowercase())
}

fn sender_label(user: Option<&RawUser>, chat: Option<&RawChat>) -> String {
    if let Some(user) = user {
        if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }
        let full_name = [user.first_name.as_deref(), user.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            return full_name;
        }
        if let Some(id) = user.id {
            return format!("id:{}", id);
        }
    }

    if let Some(chat) = chat {
        if let Some(username) = chat.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }
        if let Some(title) = chat.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> IncomingUpdate {
        IncomingUpdate::from_json(body.as_bytes()).unwrap()
    }

    #[test]
    fn test_minimal_start_command() {
        let update = parse(r#"{"message": {"chat": {"id": 42}, "text": "/start"}}"#);
        assert_eq!(
            update,
            IncomingUpdate::Command {
                chat_id: 42,
                sender: "unknown".to_string(),
                command: "/start".to_string(),
                text: "/start".to_string(),
            }
        );
    }

    #[test]
    fn test_command_with_bot_suffix() {
        let update = parse(r#"{"message": {"chat": {"id": 1}, "text": "/Help@zakon_bot please"}}"#);
        match update {
            IncomingUpdate::Command { command, .. } => assert_eq!(command, "/help"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_text_message_with_sender() {
        let update = parse(
            r#"{"message": {"chat": {"id": 7}, "from": {"id": 7, "username": "ivan"}, "text": " 1052810-8 "}}"#,
        );
        assert_eq!(
            update,
            IncomingUpdate::Text {
                chat_id: 7,
                sender: "@ivan".to_string(),
                text: "1052810-8".to_string(),
            }
        );
    }

    #[test]
    fn test_sender_full_name_fallback() {
        let update = parse(
            r#"{"message": {"chat": {"id": 7}, "from": {"id": 7, "first_name": "Иван", "last_name": "Петров"}, "text": "пенсии"}}"#,
        );
        match update {
            IncomingUpdate::Text { sender, .. } => assert_eq!(sender, "Иван Петров"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_edited_message() {
        let update = parse(r#"{"edited_message": {"chat": {"id": 5}, "text": "налоги"}}"#);
        assert_eq!(update.chat_id(), Some(5));
    }

    #[test]
    fn test_callback_query() {
        let update = parse(
            r#"{"callback_query": {"id": "cb-1", "from": {"id": 9, "first_name": "Анна"},
                "message": {"chat": {"id": 99}}, "data": "bill:1052810-8"}}"#,
        );
        assert_eq!(
            update,
            IncomingUpdate::Callback {
                query_id: "cb-1".to_string(),
                chat_id: 99,
                sender: "Анна".to_string(),
                data: "bill:1052810-8".to_string(),
            }
        );
    }

    #[test]
    fn test_callback_without_message_uses_sender_chat() {
        let update = parse(r#"{"callback_query": {"id": "cb", "from": {"id": 9}, "data": "bill:1-1"}}"#);
        assert_eq!(update.chat_id(), Some(9));
    }

    #[test]
    fn test_callback_without_data_is_still_a_callback() {
        let update = parse(r#"{"callback_query": {"id": "cb-7", "from": {"id": 9}}}"#);
        assert_eq!(
            update,
            IncomingUpdate::Callback {
                query_id: "cb-7".to_string(),
                chat_id: 9,
                sender: "id:9".to_string(),
                data: String::new(),
            }
        );
    }

    #[test]
    fn test_unrecognized_updates() {
        assert_eq!(parse("{}"), IncomingUpdate::Unrecognized);
        assert_eq!(
            parse(r#"{"message": {"chat": {"id": 1}}}"#),
            IncomingUpdate::Unrecognized
        );
        assert_eq!(
            parse(r#"{"message": {"text": "без чата"}}"#),
            IncomingUpdate::Unrecognized
        );
        assert_eq!(parse(r#"{"poll": {"id": "1"}}"#), IncomingUpdate::Unrecognized);
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(IncomingUpdate::from_json(b"not json").is_err());
    }

    #[test]
    fn test_lone_slash_is_text() {
        let update = parse(r#"{"message": {"chat": {"id": 1}, "text": "/"}}"#);
        assert!(matches!(update, IncomingUpdate::Text { .. }));
    }
}
