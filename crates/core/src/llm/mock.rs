use crate::domain::{Product, Recommendation, RecommendationResponse};
use crate::llm::status::AdapterStatus;
use crate::llm::{AdapterError, AdapterInfo, Provider, ProviderAdapter, ProviderConfig};

const MODEL: &str = "mock-curated";

/// Curated picks for the storefront's demo products, keyed by exact name.
const CURATED: &[(&str, &[(&str, &str)])] = &[
    (
        "MacBook Air",
        &[
            ("MacBook Pro", "More performance and a larger display for demanding workloads"),
            ("Magic Mouse", "Wireless multi-touch mouse that pairs instantly with macOS"),
            ("USB-C Multiport Adapter", "Adds HDMI, USB-A and charging to the limited ports"),
            ("AppleCare+ for Mac", "Extends coverage and protects against accidental damage"),
        ],
    ),
    (
        "MacBook Pro",
        &[
            ("Studio Display", "5K external display that matches the Pro's color accuracy"),
            ("Magic Keyboard with Touch ID", "Secure login and full-size typing at the desk"),
            ("Thunderbolt 4 Dock", "Single-cable desk setup with fast storage and displays"),
        ],
    ),
    (
        "iPhone 15",
        &[
            ("AirPods Pro", "Active noise cancellation with seamless iPhone switching"),
            ("MagSafe Charger", "Snaps into place for fast wireless charging"),
            ("Clear Case with MagSafe", "Protects the finish while keeping MagSafe support"),
        ],
    ),
    (
        "iPad Air",
        &[
            ("Apple Pencil Pro", "Precise input for notes and sketching"),
            ("Magic Keyboard for iPad Air", "Turns the iPad into a laptop-style workstation"),
            ("USB-C to Lightning Adapter", "Keeps older accessories working with the iPad"),
        ],
    ),
    (
        "Sony WH-1000XM5",
        &[
            ("Headphone Stand", "Keeps the headband in shape and the desk tidy"),
            ("USB-C Charger", "Fast charging for long listening sessions"),
            ("Travel Case", "Protects the headphones on the go"),
        ],
    ),
];

#[derive(Debug)]
pub struct MockAdapter {
    status: AdapterStatus,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            status: AdapterStatus::available(),
        }
    }

    pub fn recommend(&self, product: &Product) -> RecommendationResponse {
        let name = product.name.trim();
        let recommendations = match CURATED.iter().find(|(known, _)| *known == name) {
            Some((_, picks)) => picks
                .iter()
                .map(|(pick, reason)| Recommendation::new(*pick, *reason))
                .collect(),
            None => generic(name),
        };
        RecommendationResponse { recommendations }
    }
}

fn generic(name: &str) -> Vec<Recommendation> {
    let subject = if name.is_empty() { "your device" } else { name };
    vec![
        Recommendation::new(
            "Laptop Stand",
            format!("Raises the screen to eye level when working with {subject}"),
        ),
        Recommendation::new(
            "Wireless Mouse",
            format!("Comfortable everyday pointer to pair with {subject}"),
        ),
        Recommendation::new(
            "External Monitor",
            format!("Extra screen space for multitasking alongside {subject}"),
        ),
        Recommendation::new(
            "USB-C Charger",
            format!("Spare fast charger so {subject} stays powered anywhere"),
        ),
    ]
}

#[async_trait::async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn initialize(&mut self, _config: ProviderConfig) -> Result<(), AdapterError> {
        self.status.mark_available();
        tracing::info!(provider = "mock", "adapter initialized");
        Ok(())
    }

    async fn generate_recommendations(
        &self,
        product: &Product,
    ) -> Result<RecommendationResponse, AdapterError> {
        Ok(self.recommend(product))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn mark_unavailable(&self, err: &AdapterError) {
        // The backstop never leaves rotation; keep the error for diagnostics.
        self.status.record_error(err);
    }

    fn info(&self) -> AdapterInfo {
        let status = self.status.snapshot();
        AdapterInfo {
            provider: Provider::Mock,
            model: MODEL.to_string(),
            is_available: true,
            last_error: status.last_error,
            last_error_at: status.last_error_at,
            supports_json_mode: true,
            supports_streaming: false,
        }
    }
}
