//! Known model identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A chat model served by the completion endpoint.
///
/// Serialises as the wire identifier (`"mistral-small-latest"`, ...).
/// Identifiers not in the catalogue round-trip through [`Model::Custom`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Model {
    /// `mistral-large-latest`
    MistralLarge,
    /// `mistral-medium-latest`
    MistralMedium,
    /// `mistral-small-latest`
    #[default]
    MistralSmall,
    /// `codestral-latest`
    Codestral,
    /// `ministral-8b-latest`
    Ministral8B,
    /// `ministral-3b-latest`
    Ministral3B,
    /// `open-mistral-nemo`
    OpenMistralNemo,
    /// `pixtral-large-latest`
    PixtralLarge,
    /// Any other model identifier, passed through verbatim.
    Custom(String),
}

impl Model {
    /// Every catalogued model, in declaration order.
    pub const KNOWN: [Model; 8] = [
        Model::MistralLarge,
        Model::MistralMedium,
        Model::MistralSmall,
        Model::Codestral,
        Model::Ministral8B,
        Model::Ministral3B,
        Model::OpenMistralNemo,
        Model::PixtralLarge,
    ];

    /// The wire identifier for this model.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MistralLarge => "mistral-large-latest",
            Self::MistralMedium => "mistral-medium-latest",
            Self::MistralSmall => "mistral-small-latest",
            Self::Codestral => "codestral-latest",
            Self::Ministral8B => "ministral-8b-latest",
            Self::Ministral3B => "ministral-3b-latest",
            Self::OpenMistralNemo => "open-mistral-nemo",
            Self::PixtralLarge => "pixtral-large-latest",
            Self::Custom(id) => id,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Model {
    fn from(id: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|m| m.as_str() == id)
            .cloned()
            .unwrap_or_else(|| Self::Custom(id.to_string()))
    }
}

impl From<String> for Model {
    fn from(id: String) -> Self {
        Model::from(id.as_str())
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        match model {
            Model::Custom(id) => id,
            known => known.as_str().to_string(),
        }
    }
}
