use super::types::Update;

/// The deploy trigger phrase. Anything else typed at the bot is
/// acknowledged and ignored.
const DEPLOY_COMMAND: &str = "/deploy";

/// Classified inbound chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedUpdate {
    Command {
        name: String,
        chat_id: i64,
        user_id: Option<i64>,
    },
    Callback {
        token: String,
        chat_id: i64,
        user_id: i64,
    },
    Unrecognized,
}

/// Classify a raw update.
///
/// Only the exact `/deploy` text is a command. A callback without data or
/// without its originating message cannot be routed and is treated as
/// unrecognized.
pub fn parse_update(update: &Update) -> ParsedUpdate {
    if let Some(message) = &update.message {
        if message.text.as_deref() == Some(DEPLOY_COMMAND) {
            return ParsedUpdate::Command {
                name: "deploy".to_string(),
                chat_id: message.chat.id,
                user_id: message.from.as_ref().map(|u| u.id),
            };
        }
        return ParsedUpdate::Unrecognized;
    }

    if let Some(callback) = &update.callback_query {
        if let (Some(data), Some(message)) = (&callback.data, &callback.message) {
            return ParsedUpdate::Callback {
                token: data.clone(),
                chat_id: message.chat.id,
                user_id: callback.from.id,
            };
        }
    }

    ParsedUpdate::Unrecognized
}
