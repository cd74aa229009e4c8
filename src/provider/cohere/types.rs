use serde::Deserialize;

/// Non-streaming `/v1/chat` response.
#[derive(Debug, Deserialize)]
pub(crate) struct CohereChatResponse {
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
    #[serde(default)]
    pub(crate) meta: Option<CohereMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereMeta {
    #[serde(default)]
    pub(crate) billed_units: Option<CohereBilledUnits>,
}

/// Billed units are JSON numbers and may be fractional, e.g. `4.0`.
#[derive(Debug, Deserialize)]
pub(crate) struct CohereBilledUnits {
    #[serde(default)]
    pub(crate) input_tokens: Option<f64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<f64>,
}

/// One line of a streamed chat, tagged by `event_type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub(crate) enum CohereStreamEvent {
    TextGeneration {
        #[serde(default)]
        text: String,
    },
    StreamEnd {
        #[serde(default)]
        finish_reason: Option<String>,
    },
    /// `stream-start`, search and citation events, and anything introduced later.
    #[serde(other)]
    Other,
}

/// Error payload, e.g. `{"message": "invalid api token"}`.
#[derive(Debug, Deserialize)]
pub(crate) struct CohereErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
}
