//! Conversation turns and request/response records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ChatError;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default maximum number of tokens to generate.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default nucleus sampling parameter.
pub const DEFAULT_TOP_P: f32 = 1.0;

/// The role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human user.
    User,
    /// The model.
    Assistant,
    /// System-level instructions.
    System,
}

impl Role {
    /// The lowercase wire name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("user") {
            Ok(Self::User)
        } else if s.eq_ignore_ascii_case("assistant") {
            Ok(Self::Assistant)
        } else if s.eq_ignore_ascii_case("system") {
            Ok(Self::System)
        } else {
            Err(ChatError::InvalidRequest(format!("unknown role: {s:?}")))
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the message.
    pub role: Role,
    /// The message text. `null` on the wire decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

impl Turn {
    /// Create a turn with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// An empty assistant turn, announced while a streamed reply is in progress.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::assistant(String::new())
    }

    /// Whether this turn was written by the user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.role, self.content)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A chat completion request body.
///
/// Built fresh for every send from a snapshot of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier.
    pub model: String,
    /// The conversation so far, oldest first.
    pub messages: Vec<Turn>,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f32,
    /// Maximum tokens to generate, at least 1.
    pub max_tokens: u32,
    /// Nucleus sampling parameter in `[0, 1]`.
    pub top_p: f32,
    /// Whether the response is delivered as an event stream.
    pub stream: bool,
    /// Whether the provider should prepend its safety prompt.
    pub safe_prompt: bool,
}

impl CompletionRequest {
    /// Start building a request with default sampling parameters.
    #[must_use]
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// Return a copy of this request with the streaming flag set.
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Check the request is sendable: a model and at least one message.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.model.trim().is_empty() {
            return Err(ChatError::InvalidRequest("model is empty".into()));
        }
        if self.messages.is_empty() {
            return Err(ChatError::InvalidRequest("request has no messages".into()));
        }
        Ok(())
    }
}

/// Builder for [`CompletionRequest`]. Out-of-range sampling values are clamped.
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    model: String,
    messages: Vec<Turn>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    safe_prompt: bool,
}

impl Default for CompletionRequestBuilder {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            stream: false,
            safe_prompt: false,
        }
    }
}

impl CompletionRequestBuilder {
    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the conversation messages.
    #[must_use]
    pub fn messages(mut self, messages: impl Into<Vec<Turn>>) -> Self {
        self.messages = messages.into();
        self
    }

    /// Set the temperature, clamped into `[0, 2]`. NaN falls back to the default.
    #[must_use]
    pub fn temperature(mut self, value: f32) -> Self {
        self.temperature = clamp_or_default(value, 0.0, 2.0, DEFAULT_TEMPERATURE);
        self
    }

    /// Set the token limit, raised to at least 1.
    #[must_use]
    pub fn max_tokens(mut self, value: u32) -> Self {
        self.max_tokens = value.max(1);
        self
    }

    /// Set `top_p`, clamped into `[0, 1]`. NaN falls back to the default.
    #[must_use]
    pub fn top_p(mut self, value: f32) -> Self {
        self.top_p = clamp_or_default(value, 0.0, 1.0, DEFAULT_TOP_P);
        self
    }

    /// Enable or disable streaming.
    #[must_use]
    pub fn stream(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Enable or disable the provider safety prompt.
    #[must_use]
    pub fn safe_prompt(mut self, enabled: bool) -> Self {
        self.safe_prompt = enabled;
        self
    }

    /// Finish the request.
    #[must_use]
    pub fn build(self) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            stream: self.stream,
            safe_prompt: self.safe_prompt,
        }
    }
}

fn clamp_or_default(value: f32, min: f32, max: f32, default: f32) -> f32 {
    if value.is_nan() {
        default
    } else {
        value.clamp(min, max)
    }
}

/// A buffered (non-streaming) completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Provider-assigned response id.
    #[serde(default)]
    pub id: String,
    /// Object type tag, normally `"chat.completion"`.
    #[serde(default)]
    pub object: String,
    /// Unix timestamp of creation.
    #[serde(default)]
    pub created: i64,
    /// The model that produced the response.
    #[serde(default)]
    pub model: String,
    /// Candidate replies.
    pub choices: Vec<Choice>,
    /// Token accounting, when reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// The first choice's message, if any.
    #[must_use]
    pub fn first_message(&self) -> Option<&Turn> {
        self.choices.first().map(|c| &c.message)
    }
}

/// One candidate reply in a [`CompletionResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,
    /// The reply.
    pub message: Turn,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics for a completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u32,
}

/// The JSON payload of one `data:` frame in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChunk {
    /// Incremental choices; only the first is consumed.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Content of the first choice's delta, if present and non-empty.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// One incremental choice inside a [`StreamChunk`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChoice {
    /// Position of this choice.
    #[serde(default)]
    pub index: u32,
    /// The content added by this frame.
    #[serde(default)]
    pub delta: Delta,
    /// Set on the final frame of a choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Delta {
    /// Role, sent on the first frame only.
    #[serde(default)]
    pub role: Option<String>,
    /// Text added by this frame.
    #[serde(default)]
    pub content: Option<String>,
}
