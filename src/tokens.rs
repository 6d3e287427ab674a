//! Token usage statistics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentUsage {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelUsage {
    pub tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotalUsage {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub models: BTreeMap<String, ModelUsage>,
}

/// Reply of `GET /api/tokens/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStats {
    pub current: CurrentUsage,
    pub total: TotalUsage,
}

impl TokenStats {
    /// Lines for the tokens panel; per-model rows sorted by name
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Model: {}", self.current.model),
            format!("Input tokens: {}", self.current.input_tokens),
            format!("Output tokens: {}", self.current.output_tokens),
            format!("Cost: ${:.6}", self.current.cost),
            String::new(),
            format!("Total tokens: {}", self.total.total_tokens),
            format!("Total cost: ${:.6}", self.total.total_cost),
        ];

        for (name, usage) in &self.total.models {
            lines.push(format!(
                "  {}: {} tokens, ${:.6}",
                name, usage.tokens, usage.cost
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let stats: TokenStats = serde_json::from_str(r#"{"current":{"model":"gpt-4o"}}"#).unwrap();
        assert_eq!(stats.current.input_tokens, 0);
        assert!(stats.total.models.is_empty());
    }

    #[test]
    fn test_render_costs_and_sorted_models() {
        let stats: TokenStats = serde_json::from_str(
            r#"{
                "current": {"model": "gpt-4o-mini", "input_tokens": 120, "output_tokens": 30, "cost": 0.000042},
                "total": {"total_tokens": 900, "total_cost": 0.0021,
                          "models": {"zeta": {"tokens": 100, "cost": 0.001}, "alpha": {"tokens": 800, "cost": 0.0011}}}
            }"#,
        )
        .unwrap();

        let lines = stats.render();
        assert!(lines.contains(&"Cost: $0.000042".to_string()));
        assert!(lines.contains(&"Total cost: $0.002100".to_string()));

        let alpha = lines.iter().position(|l| l.contains("alpha")).unwrap();
        let zeta = lines.iter().position(|l| l.contains("zeta")).unwrap();
        assert!(alpha < zeta);
        assert_eq!(lines[alpha], "  alpha: 800 tokens, $0.001100");
    }
}
