use super::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One persisted transcript entry. Items are replayed in insertion order.
pub struct ConversationItem {
    pub role: ItemRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ConversationItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ItemRole::User,
            content: Some(content.into()),
            tool_call_id: None,
            tool_name: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ItemRole::Assistant,
            ..Self::user(content)
        }
    }

    /// System messages are configuration, not history, and map to `None`.
    pub fn from_message(message: &Message) -> Option<Self> {
        let role = match message.role {
            MessageRole::System => return None,
            MessageRole::User => ItemRole::User,
            MessageRole::Assistant => ItemRole::Assistant,
            MessageRole::Tool => ItemRole::Tool,
        };
        let text = message.text_content();
        let tool_calls = message.tool_calls();
        let content = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(text)
        };

        Some(Self {
            role,
            content,
            tool_call_id: message.tool_call_id.clone(),
            tool_name: message.tool_name.clone(),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        })
    }

    pub fn to_message(&self) -> Message {
        let role = match self.role {
            ItemRole::User => MessageRole::User,
            ItemRole::Assistant => MessageRole::Assistant,
            ItemRole::Tool => MessageRole::Tool,
        };
        let mut content = Vec::new();
        if let Some(text) = self.content.as_ref() {
            content.push(ContentBlock::Text { text: text.clone() });
        }
        content.extend(
            self.tool_calls
                .iter()
                .flatten()
                .cloned()
                .map(ContentBlock::from),
        );

        Message {
            role,
            content,
            tool_call_id: self.tool_call_id.clone(),
            tool_name: self.tool_name.clone(),
            is_error: false,
        }
    }
}

pub fn items_from_messages(messages: &[Message]) -> Vec<ConversationItem> {
    messages
        .iter()
        .filter_map(ConversationItem::from_message)
        .collect()
}

pub fn messages_from_items(items: &[ConversationItem]) -> Vec<Message> {
    items.iter().map(ConversationItem::to_message).collect()
}
