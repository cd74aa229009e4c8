use serde::Deserialize;

/// Non-streaming response payload returned by the Messages API.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicMessageResponse {
    #[serde(default)]
    pub(crate) model: Option<String>,
    /// Ordered content blocks; only `text` blocks carry output text.
    #[serde(default)]
    pub(crate) content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
    #[serde(default)]
    pub(crate) usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub(crate) input_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<u64>,
}

/// Server-sent event payload, tagged by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicStreamEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: Option<AnthropicMessageDelta>,
    },
    MessageStop,
    Error {
        error: AnthropicErrorBody,
    },
    /// `message_start`, `content_block_start`, `content_block_stop`, `ping`, and
    /// anything introduced later.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicMessageDelta {
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicErrorBody {
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

impl AnthropicErrorBody {
    pub(crate) fn describe(&self) -> String {
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        match &self.kind {
            Some(kind) => format!("{message} ({kind})"),
            None => message,
        }
    }
}
