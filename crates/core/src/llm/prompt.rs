use crate::domain::Product;

pub fn system_prompt() -> String {
    // Strict and provider-agnostic: JSON only, no prose.
    [
        "You are a shopping assistant for an electronics storefront.",
        "Recommend complementary products a customer would buy together with the given product.",
        "Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.",
        "Output schema:",
        "{",
        "  \"recommendations\": [",
        "    {\"name\": \"Product name\", \"reason\": \"One sentence on why it fits\"}",
        "  ]",
        "}",
        "Rules:",
        "- recommendations must have 3 to 4 entries",
        "- name and reason must be non-empty strings",
        "- do not recommend the given product itself",
    ]
    .join("\n")
}

pub fn user_prompt(product: &Product) -> String {
    let mut lines = vec![format!("Product name: {}", product.name.trim())];
    let description = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(description) = description {
        lines.push(format!("Description: {description}"));
    }
    if let Some(price) = product.price {
        lines.push(format!("Price: ${price:.2}"));
    }
    if let Some(category) = product.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        lines.push(format!("Category: {category}"));
    }
    lines.push(String::new());
    lines.push("Respond with the JSON object described in the instructions.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_includes_only_present_fields() {
        let prompt = user_prompt(&Product::named(" MacBook Air ").with_price(1099.0));
        assert!(prompt.starts_with("Product name: MacBook Air\n"));
        assert!(prompt.contains("Price: $1099.00"));
        assert!(!prompt.contains("Description:"));
        assert!(!prompt.contains("Category:"));
    }

    #[test]
    fn user_prompt_lists_every_field() {
        let product = Product::named("iPhone 15")
            .with_description("6.1-inch smartphone")
            .with_category("Phones");
        let prompt = user_prompt(&product);
        assert!(prompt.contains("Description: 6.1-inch smartphone"));
        assert!(prompt.contains("Category: Phones"));
    }
}
