//! Telegram channel
//!
//! Renders outbound activities through teloxide and maps inbound Telegram
//! messages onto activities.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, KeyboardButton, KeyboardMarkup, User};
use tracing::debug;

use crate::models::{Activity, ActivityType, ChannelAccount, ConversationReference};
use crate::utils::errors::{AgentBuddyError, Result};
use super::ChannelAdapter;

/// Channel id used in conversation references
pub const CHANNEL_ID: &str = "telegram";

#[derive(Debug, Clone)]
pub struct TelegramAdapter {
    bot: Bot,
}

impl TelegramAdapter {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn chat_id(reference: &ConversationReference) -> Result<ChatId> {
        reference
            .conversation_id
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| AgentBuddyError::Channel(format!("not a Telegram chat id: {}", reference.conversation_id)))
    }

    fn keyboard(actions: &[String]) -> KeyboardMarkup {
        KeyboardMarkup::new(vec![actions.iter().map(KeyboardButton::new).collect::<Vec<_>>()])
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    async fn send_activity(&self, reference: &ConversationReference, activity: &Activity) -> Result<()> {
        let chat_id = Self::chat_id(reference)?;
        debug!(chat_id = ?chat_id, activity_type = %activity.activity_type, "Sending activity to Telegram");

        match activity.activity_type {
            ActivityType::Typing => {
                self.bot.send_chat_action(chat_id, ChatAction::Typing).await?;
                return Ok(());
            }
            ActivityType::Message => {}
            ref other => {
                return Err(AgentBuddyError::Channel(format!("cannot send {} activities to Telegram", other)));
            }
        }

        let images: Vec<_> = activity.attachments.iter().filter(|a| a.is_image()).collect();
        if images.is_empty() {
            let mut request = self.bot.send_message(chat_id, activity.text.clone());
            if !activity.suggested_actions.is_empty() {
                request = request.reply_markup(Self::keyboard(&activity.suggested_actions));
            }
            request.await?;
            return Ok(());
        }

        for (index, image) in images.into_iter().enumerate() {
            let url = url::Url::parse(&image.content_url)?;
            let mut request = self.bot.send_photo(chat_id, InputFile::url(url));
            // the text rides along as the caption of the first image
            if index == 0 && !activity.text.is_empty() {
                request = request.caption(activity.text.clone());
            }
            request.await?;
        }
        Ok(())
    }
}

/// Identity of a Telegram user as a channel account
pub fn account_from_user(user: &User) -> ChannelAccount {
    ChannelAccount::new(user.id.0.to_string(), Some(user.full_name()))
}

/// Map an inbound Telegram message onto an activity addressed to `bot_account`.
///
/// New chat members and `/start` become conversation updates; everything
/// with text becomes a message. Returns `None` for anything else.
pub fn activity_from_message(msg: &Message, bot_account: &ChannelAccount) -> Option<Activity> {
    let from = msg.from.as_ref().map(account_from_user)?;
    let conversation_id = msg.chat.id.0.to_string();

    if let Some(members) = msg.new_chat_members() {
        let members = members.iter().map(account_from_user).collect();
        return Some(
            Activity::inbound(ActivityType::ConversationUpdate, CHANNEL_ID, conversation_id, from, bot_account.clone())
                .with_members_added(members),
        );
    }

    let text = msg.text()?;
    if text.trim() == "/start" {
        return Some(
            Activity::inbound(ActivityType::ConversationUpdate, CHANNEL_ID, conversation_id, from, bot_account.clone())
                .with_members_added(vec![bot_account.clone()]),
        );
    }

    Some(
        Activity::inbound(ActivityType::Message, CHANNEL_ID, conversation_id, from, bot_account.clone())
            .with_text(text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(conversation_id: &str) -> ConversationReference {
        ConversationReference {
            channel_id: CHANNEL_ID.to_string(),
            conversation_id: conversation_id.to_string(),
            user: ChannelAccount::new("7", None),
            bot: ChannelAccount::new("1", None),
        }
    }

    #[test]
    fn test_chat_id_parsing() {
        assert_eq!(TelegramAdapter::chat_id(&reference("-100123")).unwrap(), ChatId(-100123));
        assert!(matches!(
            TelegramAdapter::chat_id(&reference("abc")),
            Err(AgentBuddyError::Channel(_))
        ));
    }

    #[test]
    fn test_keyboard_has_one_row_of_actions() {
        let keyboard = TelegramAdapter::keyboard(&["Yes".to_string(), "No".to_string()]);
        assert_eq!(keyboard.keyboard.len(), 1);
        assert_eq!(keyboard.keyboard[0].len(), 2);
        assert_eq!(keyboard.keyboard[0][0].text, "Yes");
    }
}
