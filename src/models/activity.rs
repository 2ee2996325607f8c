//! Activity model
//!
//! Inbound and outbound units exchanged with a channel, plus the durable
//! reference used to re-enter a conversation outside a turn.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    Typing,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Message => "message",
            ActivityType::ConversationUpdate => "conversationUpdate",
            ActivityType::Typing => "typing",
            ActivityType::Other(name) => name,
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identity on a channel (user or bot)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self { id: id.into(), name }
    }
}

/// Media attached to an outbound activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content_url: String,
}

impl Attachment {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            content_type: "image/png".to_string(),
            content_url: url.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Durable handle for re-entering a conversation without an inbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    pub channel_id: String,
    pub conversation_id: String,
    pub user: ChannelAccount,
    pub bot: ChannelAccount,
}

impl ConversationReference {
    /// Storage key for conversation-scoped state
    pub fn conversation_key(&self) -> String {
        format!("{}/{}", self.channel_id, self.conversation_id)
    }

    /// Storage key for user-scoped state
    pub fn user_key(&self) -> String {
        format!("{}/{}", self.channel_id, self.user.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: ChannelAccount,
    #[serde(default)]
    pub recipient: ChannelAccount,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Activity {
    fn blank(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            text: String::new(),
            from: ChannelAccount::default(),
            recipient: ChannelAccount::default(),
            channel_id: String::new(),
            conversation_id: String::new(),
            members_added: Vec::new(),
            suggested_actions: Vec::new(),
            attachments: Vec::new(),
        }
    }

    /// Outbound text message
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::blank(ActivityType::Message)
        }
    }

    /// Outbound typing indicator
    pub fn typing() -> Self {
        Self::blank(ActivityType::Typing)
    }

    pub fn with_suggested_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Inbound activity addressed from `from` to `recipient` in a conversation
    pub fn inbound(
        activity_type: ActivityType,
        channel_id: impl Into<String>,
        conversation_id: impl Into<String>,
        from: ChannelAccount,
        recipient: ChannelAccount,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
            from,
            recipient,
            ..Self::blank(activity_type)
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_members_added(mut self, members: Vec<ChannelAccount>) -> Self {
        self.members_added = members;
        self
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == ActivityType::Message
    }

    /// Capture a reference to the conversation this activity arrived on
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            channel_id: self.channel_id.clone(),
            conversation_id: self.conversation_id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
        }
    }

    /// Synthetic inbound event used when resuming a conversation out of band
    pub fn continuation(reference: &ConversationReference) -> Self {
        Self::inbound(
            ActivityType::Other("event".to_string()),
            reference.channel_id.clone(),
            reference.conversation_id.clone(),
            reference.user.clone(),
            reference.bot.clone(),
        )
    }
}
