//! Cost estimation for outbound model calls.
//!
//! Rough provider-list-price figures, good enough for the per-report
//! `cost_usd` provenance field and dashboard aggregation. Not billing data.

/// Estimated cost per attached image for the vision model.
pub const VISION_COST_PER_IMAGE_USD: f64 = 0.01;

/// Estimated text-processing overhead per vision request.
pub const VISION_COST_TEXT_USD: f64 = 0.005;

/// Estimated flat cost per diagnosis synthesis request.
pub const DIAGNOSIS_COST_PER_REQUEST_USD: f64 = 0.002;

/// Estimate the cost of one photo analysis call.
pub fn estimate_photo_cost(image_count: usize) -> f64 {
    image_count as f64 * VISION_COST_PER_IMAGE_USD + VISION_COST_TEXT_USD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_cost_scales_with_image_count() {
        assert!((estimate_photo_cost(1) - 0.015).abs() < 1e-9);
        assert!((estimate_photo_cost(5) - 0.055).abs() < 1e-9);
    }
}
