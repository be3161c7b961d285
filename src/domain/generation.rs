use super::account::AccountId;
use super::capability::Capability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// Paid through a bundle, waiting for the buyer to supply a prompt.
    Pending,
    Processing,
    Completed,
    Failed,
}

/// What the buyer asked the upstream engine to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub capability: Capability,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl GenerationRequest {
    pub fn new(capability: Capability, prompt: impl Into<String>) -> Self {
        Self {
            capability,
            prompt: prompt.into(),
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// String parameter lookup, empty when absent.
    pub fn param(&self, key: &str) -> &str {
        self.parameters
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }
}

/// Successful upstream response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamOutput {
    pub asset_url: String,
    pub metadata: serde_json::Value,
    /// Conversion score, only produced by AI scoring.
    pub score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub account: AccountId,
    pub capability: Capability,
    /// Credits charged; zero for bundle placeholders.
    pub cost: u64,
    pub prompt: String,
    pub parameters: serde_json::Value,
    pub result_url: Option<String>,
    pub ai_score: Option<u8>,
    pub metadata: serde_json::Value,
    pub status: GenerationStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Generation {
    pub fn complete(&mut self, output: UpstreamOutput) {
        self.result_url = Some(output.asset_url);
        self.ai_score = output.score;
        self.metadata = output.metadata;
        self.status = GenerationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = GenerationStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGeneration {
    pub account: AccountId,
    pub capability: Capability,
    pub cost: u64,
    pub prompt: String,
    pub parameters: serde_json::Value,
    pub status: GenerationStatus,
}

impl NewGeneration {
    pub fn into_generation(self, id: GenerationId) -> Generation {
        Generation {
            id,
            account: self.account,
            capability: self.capability,
            cost: self.cost,
            prompt: self.prompt,
            parameters: self.parameters,
            result_url: None,
            ai_score: None,
            metadata: serde_json::Value::Null,
            status: self.status,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_param_lookup() {
        let request = GenerationRequest::new(Capability::VideoMorph, "")
            .with_parameters(json!({"start_image": "a.png", "frames": 12}));
        assert_eq!(request.param("start_image"), "a.png");
        assert_eq!(request.param("frames"), "");
        assert_eq!(request.param("missing"), "");
    }

    #[test]
    fn test_complete_records_output() {
        let mut generation = NewGeneration {
            account: AccountId(1),
            capability: Capability::AiScoring,
            cost: 20,
            prompt: String::new(),
            parameters: serde_json::Value::Null,
            status: GenerationStatus::Processing,
        }
        .into_generation(GenerationId(1));

        generation.complete(UpstreamOutput {
            asset_url: "https://assets.example/x".into(),
            metadata: json!({"format": "json"}),
            score: Some(88),
        });
        assert_eq!(generation.status, GenerationStatus::Completed);
        assert_eq!(generation.ai_score, Some(88));
        assert!(generation.completed_at.is_some());
    }
}
