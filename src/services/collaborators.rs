//! External collaborators consumed by the pipeline.
//!
//! Each trait is object safe so the pipeline can hold `Arc<dyn ...>` and
//! tests can substitute fakes.

use async_trait::async_trait;

use crate::models::enrichment::{
    FoodEnrichmentRequest, FoodEnrichmentResponse, WineEnrichmentRequest, WineEnrichmentResponse,
};
use crate::models::extraction::MenuExtraction;

/// Turns menu photos into structured menu data.
#[async_trait]
pub trait MenuExtractor: Send + Sync {
    async fn extract(&self, photo_urls: &[String]) -> Result<MenuExtraction, ExtractionError>;
}

/// Adds descriptions, tags and standardized names to food items.
///
/// Every response entry must carry the `ref_id` of the request item it
/// describes.
#[async_trait]
pub trait FoodEnricher: Send + Sync {
    async fn enrich_food(
        &self,
        items: &[FoodEnrichmentRequest],
    ) -> Result<Vec<FoodEnrichmentResponse>, EnrichmentError>;
}

/// Adds varietal, origin and tasting notes to wine items.
#[async_trait]
pub trait WineEnricher: Send + Sync {
    async fn enrich_wine(
        &self,
        items: &[WineEnrichmentRequest],
    ) -> Result<Vec<WineEnrichmentResponse>, EnrichmentError>;
}

/// Generates a photo for a standardized dish name, stores it and returns
/// its public URL.
#[async_trait]
pub trait PhotoGenerator: Send + Sync {
    async fn generate_photo(&self, standardized_name: &str) -> Result<String, SynthesisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Menu extraction failed: {0}")]
    Request(String),

    #[error("Menu extraction returned invalid data: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Food enrichment failed: {0}")]
    Food(String),

    #[error("Wine enrichment failed: {0}")]
    Wine(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Image generation failed: {0}")]
    Generation(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Failed to save photo record: {0}")]
    Record(String),
}
