use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

/// Static description of a model an upstream provider serves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub context_window: u32,
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
    pub capabilities: &'static [&'static str],
}

const CHAT: &[&str] = &["chat", "tools"];
const CHAT_VISION: &[&str] = &["chat", "tools", "vision"];

const MODELS: &[(&str, ModelInfo)] = &[
    (
        "openai",
        ModelInfo {
            id: "gpt-4o",
            name: "GPT-4o",
            context_window: 128_000,
            input_price_per_million: 2.5,
            output_price_per_million: 10.0,
            capabilities: CHAT_VISION,
        },
    ),
    (
        "openai",
        ModelInfo {
            id: "gpt-4o-mini",
            name: "GPT-4o mini",
            context_window: 128_000,
            input_price_per_million: 0.15,
            output_price_per_million: 0.6,
            capabilities: CHAT_VISION,
        },
    ),
    (
        "openai",
        ModelInfo {
            id: "gpt-4",
            name: "GPT-4",
            context_window: 8_192,
            input_price_per_million: 30.0,
            output_price_per_million: 60.0,
            capabilities: CHAT,
        },
    ),
    (
        "anthropic",
        ModelInfo {
            id: "claude-3-5-sonnet-20241022",
            name: "Claude 3.5 Sonnet",
            context_window: 200_000,
            input_price_per_million: 3.0,
            output_price_per_million: 15.0,
            capabilities: CHAT_VISION,
        },
    ),
    (
        "anthropic",
        ModelInfo {
            id: "claude-3-5-haiku-20241022",
            name: "Claude 3.5 Haiku",
            context_window: 200_000,
            input_price_per_million: 0.8,
            output_price_per_million: 4.0,
            capabilities: CHAT,
        },
    ),
    (
        "gemini",
        ModelInfo {
            id: "gemini-1.5-pro",
            name: "Gemini 1.5 Pro",
            context_window: 2_000_000,
            input_price_per_million: 1.25,
            output_price_per_million: 5.0,
            capabilities: CHAT_VISION,
        },
    ),
    (
        "gemini",
        ModelInfo {
            id: "gemini-1.5-flash",
            name: "Gemini 1.5 Flash",
            context_window: 1_000_000,
            input_price_per_million: 0.075,
            output_price_per_million: 0.3,
            capabilities: CHAT_VISION,
        },
    ),
    (
        "xai",
        ModelInfo {
            id: "grok-beta",
            name: "Grok Beta",
            context_window: 131_072,
            input_price_per_million: 5.0,
            output_price_per_million: 15.0,
            capabilities: CHAT,
        },
    ),
    (
        "google",
        ModelInfo {
            id: "text-embedding-004",
            name: "Text Embedding 004",
            context_window: 2_048,
            input_price_per_million: 0.0,
            output_price_per_million: 0.0,
            capabilities: &["embeddings"],
        },
    ),
];

#[derive(Debug, Clone, Serialize)]
pub struct ModelCatalog {
    pub models: BTreeMap<&'static str, Vec<ModelInfo>>,
    pub total: usize,
    pub timestamp: String,
}

impl ModelCatalog {
    pub fn snapshot() -> Self {
        let mut models: BTreeMap<&'static str, Vec<ModelInfo>> = BTreeMap::new();
        for (provider, model) in MODELS {
            models.entry(*provider).or_default().push(model.clone());
        }

        Self {
            models,
            total: MODELS.len(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_groups_by_provider() {
        let catalog = ModelCatalog::snapshot();

        assert_eq!(catalog.total, catalog.models.values().map(Vec::len).sum::<usize>());
        assert!(catalog.models["openai"].iter().any(|m| m.id == "gpt-4"));

        let json = serde_json::to_value(&catalog).unwrap();
        assert!(json["models"]["anthropic"][0]["contextWindow"].is_number());
    }
}
