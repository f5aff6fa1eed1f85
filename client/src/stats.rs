//! Aggregates shown on an owner's profile.

use market_types::{Product, Timestamp};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OwnerStats {
    pub product_count: usize,
    /// Sum of rating counts over the owner's products.
    pub total_feedback: u64,
    /// Mean of per-product averages; unrated products count as 0.
    pub average_rating: f64,
    /// Creation time of the owner's oldest product.
    pub joined_at: Option<Timestamp>,
}

impl OwnerStats {
    pub fn from_products(products: &[Product]) -> Self {
        if products.is_empty() {
            return Self::default();
        }
        let total_feedback = products.iter().map(|p| p.rating_count).sum();
        let average_rating =
            products.iter().map(Product::average_rating).sum::<f64>() / products.len() as f64;
        Self {
            product_count: products.len(),
            total_feedback,
            average_rating,
            joined_at: products.iter().map(|p| p.created_at).min(),
        }
    }
}
