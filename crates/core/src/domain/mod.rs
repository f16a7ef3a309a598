pub mod product;
pub mod recommendation;

pub use product::Product;
pub use recommendation::{Recommendation, RecommendationResponse};
