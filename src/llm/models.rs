use serde::{Deserialize, Serialize};

/// Body of an upstream `/api/generate` call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub stream: bool,
}

/// One line of the upstream NDJSON stream: either
/// `{"response": "...", "done": false}` or `{"error": "..."}`.
///
/// Neither shape carries a tag, so the variant is picked by its fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UpstreamRecord {
    Fragment {
        response: String,
        #[serde(default)]
        done: bool,
    },
    Failure {
        error: String,
    },
}
