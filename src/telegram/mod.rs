pub mod client;
pub mod types;
pub mod update;

pub use client::{ChatOps, Delivery, TelegramClient};
pub use types::{InlineKeyboardButton, InlineKeyboardMarkup, Update};
pub use update::{parse_update, ParsedUpdate};
