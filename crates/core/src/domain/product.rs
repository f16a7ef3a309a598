use serde::{Deserialize, Serialize};

/// Catalog entry a recommendation is generated for. Only `name` is required;
/// the other fields enrich the prompt when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Product {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn health_probe() -> Self {
        Self::named("Wireless Headphones")
            .with_description("Bluetooth over-ear headphones with noise cancellation")
            .with_price(199.99)
            .with_category("Electronics")
    }

    pub fn trimmed_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trimmed_name_rejects_blank_names() {
        assert_eq!(Product::named("").trimmed_name(), None);
        assert_eq!(Product::named(" \t\n").trimmed_name(), None);
        assert_eq!(Product::named("  iPad Air ").trimmed_name(), Some("iPad Air"));
    }

    #[test]
    fn deserializes_with_only_a_name() {
        let product: Product = serde_json::from_value(json!({"name": "MacBook Air"})).unwrap();
        assert_eq!(product, Product::named("MacBook Air"));
    }
}
