//! Request cost estimation (spec §4.E): a token-count approximation plus a
//! pricing table keyed by a normalised model name. Normalisation strips
//! dated version suffixes and maps a handful of deprecated aliases onto
//! their current-generation replacement — a pricing-policy choice, not a
//! wire-format one (spec §9 open question).

use omnigate_core::ChatRequest;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
}

/// Used by callers when no pricing entry can be found and the endpoint has
/// no prior EWMA cost sample either (spec §4.E: "ultimate default 0.001").
pub const ULTIMATE_DEFAULT_COST: f64 = 0.001;

pub struct PricingTable {
    entries: HashMap<String, ModelPricing>,
    aliases: HashMap<String, String>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PricingTable {
    /// A representative table for the providers this fabric fronts.
    /// Real deployments would load this from config; the core only needs
    /// the lookup/normalisation behaviour to be correct and testable.
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        entries.insert("gpt-4o".into(), ModelPricing { input_price_per_million: 5.0, output_price_per_million: 15.0 });
        entries.insert("gpt-4o-mini".into(), ModelPricing { input_price_per_million: 0.15, output_price_per_million: 0.6 });
        entries.insert("gpt-3.5-turbo".into(), ModelPricing { input_price_per_million: 0.5, output_price_per_million: 1.5 });
        entries.insert("claude-3-opus".into(), ModelPricing { input_price_per_million: 15.0, output_price_per_million: 75.0 });
        entries.insert("claude-3-5-sonnet".into(), ModelPricing { input_price_per_million: 3.0, output_price_per_million: 15.0 });
        entries.insert("gemini-1.5-pro".into(), ModelPricing { input_price_per_million: 3.5, output_price_per_million: 10.5 });
        entries.insert("gemini-1.5-flash".into(), ModelPricing { input_price_per_million: 0.075, output_price_per_million: 0.3 });
        entries.insert("mistral-large".into(), ModelPricing { input_price_per_million: 2.0, output_price_per_million: 6.0 });
        entries.insert("grok-2".into(), ModelPricing { input_price_per_million: 2.0, output_price_per_million: 10.0 });

        let mut aliases = HashMap::new();
        aliases.insert("gpt-4-turbo".into(), "gpt-4o".into());
        aliases.insert("gpt-4".into(), "gpt-4o".into());
        aliases.insert("claude-3-sonnet".into(), "claude-3-5-sonnet".into());
        aliases.insert("claude-2".into(), "claude-3-opus".into());

        Self { entries, aliases }
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.entries.insert(model.into(), pricing);
    }

    /// `None` means the estimator has no opinion for this model — the
    /// caller falls back to the endpoint's own EWMA cost, or the ultimate
    /// default (spec §4.E).
    pub fn price_for(&self, model: &str) -> Option<ModelPricing> {
        let normalized = normalize_model_name(model);
        let resolved = self.aliases.get(&normalized).cloned().unwrap_or(normalized);
        self.entries.get(&resolved).copied()
    }
}

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(\d{4}-\d{2}-\d{2}|\d{3,8})$").unwrap())
}

/// Strips a trailing dated or numeric version suffix, e.g.
/// `gpt-4o-2024-08-06` → `gpt-4o`, `claude-3-opus-20240229` → `claude-3-opus`.
pub fn normalize_model_name(model: &str) -> String {
    version_suffix().replace(model, "").into_owned()
}

/// `(input_tokens, output_tokens)` per spec §4.E: input ≈ text bytes / 4,
/// +100 per image part; output = `max_tokens` if set, else 100.
pub fn estimate_tokens(request: &ChatRequest) -> (u64, u64) {
    let mut text_bytes = 0u64;
    let mut image_count = 0u64;
    for message in &request.messages {
        text_bytes += message.content.text_byte_len() as u64;
        image_count += message.content.image_count() as u64;
    }
    let input_tokens = text_bytes / 4 + image_count * 100;
    let output_tokens = request.max_tokens.map(|t| t as u64).unwrap_or(100);
    (input_tokens, output_tokens)
}

/// `None` if the model has no pricing entry — see [`PricingTable::price_for`].
pub fn estimate_request_cost(table: &PricingTable, request: &ChatRequest) -> Option<f64> {
    let pricing = table.price_for(&request.model)?;
    let (input_tokens, output_tokens) = estimate_tokens(request);
    Some(
        (input_tokens as f64 * pricing.input_price_per_million
            + output_tokens as f64 * pricing.output_price_per_million)
            / 1_000_000.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnigate_core::{ChatMessage, MessageContent};

    fn request(model: &str, text: &str, max_tokens: Option<u32>) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage { role: "user".into(), content: MessageContent::Text(text.into()) }],
            max_tokens,
            ..Default::default()
        }
    }

    #[test]
    fn normalize_strips_dated_suffix() {
        assert_eq!(normalize_model_name("gpt-4o-2024-08-06"), "gpt-4o");
        assert_eq!(normalize_model_name("claude-3-opus-20240229"), "claude-3-opus");
        assert_eq!(normalize_model_name("gemini-1.5-pro"), "gemini-1.5-pro");
    }

    #[test]
    fn price_for_resolves_deprecated_alias() {
        let table = PricingTable::with_defaults();
        let direct = table.price_for("gpt-4o").unwrap();
        let aliased = table.price_for("gpt-4-turbo").unwrap();
        assert_eq!(direct.input_price_per_million, aliased.input_price_per_million);
    }

    #[test]
    fn price_for_unknown_model_is_none() {
        let table = PricingTable::with_defaults();
        assert!(table.price_for("some-unreleased-model").is_none());
    }

    #[test]
    fn estimate_tokens_counts_bytes_over_four_plus_image_flat_rate() {
        let req = request("gpt-4o", "abcdefgh", Some(50));
        let (input, output) = estimate_tokens(&req);
        assert_eq!(input, 2);
        assert_eq!(output, 50);
    }

    #[test]
    fn estimate_tokens_defaults_output_to_one_hundred() {
        let req = request("gpt-4o", "abcd", None);
        let (_, output) = estimate_tokens(&req);
        assert_eq!(output, 100);
    }

    #[test]
    fn estimate_request_cost_is_none_for_unpriced_model() {
        let table = PricingTable::with_defaults();
        let req = request("unreleased-v99", "hello", None);
        assert!(estimate_request_cost(&table, &req).is_none());
    }
}
