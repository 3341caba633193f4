use async_trait::async_trait;
use chrono::Utc;
use image::ImageFormat;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::Instrument;

use super::collaborators::{PhotoGenerator, SynthesisError};
use super::openai::OpenAiClient;
use super::prompts;
use super::storage::ObjectStore;
use crate::db::MenuStore;

const PHOTO_PREFIX: &str = "food_photos";

/// Generates dish photos with the image model and uploads them to object
/// storage.
pub struct StoredPhotoGenerator {
    openai: Arc<OpenAiClient>,
    storage: Arc<dyn ObjectStore>,
}

impl StoredPhotoGenerator {
    pub fn new(openai: Arc<OpenAiClient>, storage: Arc<dyn ObjectStore>) -> Self {
        Self { openai, storage }
    }
}

#[async_trait]
impl PhotoGenerator for StoredPhotoGenerator {
    async fn generate_photo(&self, standardized_name: &str) -> Result<String, SynthesisError> {
        let prompt = prompts::dish_photo_prompt(standardized_name);
        let data = self
            .openai
            .generate_image(&prompt)
            .await
            .map_err(|e| SynthesisError::Generation(e.to_string()))?;

        let format = detect_format(&data)?;
        let extension = format.extensions_str().first().copied().unwrap_or("png");
        let key = photo_key(standardized_name, extension, Utc::now().timestamp());

        self.storage
            .put(&key, &data, format.to_mime_type())
            .await
            .map_err(|e| SynthesisError::Upload(e.to_string()))
    }
}

fn detect_format(data: &[u8]) -> Result<ImageFormat, SynthesisError> {
    image::guess_format(data).map_err(|_| {
        SynthesisError::Generation("generated data is not a recognized image".to_string())
    })
}

/// Lower-case the name and collapse every run of other characters into a
/// single `_`.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
        } else if !sanitized.ends_with('_') {
            sanitized.push('_');
        }
    }
    sanitized.trim_matches('_').to_string()
}

pub fn photo_key(standardized_name: &str, extension: &str, timestamp: i64) -> String {
    format!(
        "{}/{}_{}.{}",
        PHOTO_PREFIX,
        sanitize_name(standardized_name),
        timestamp,
        extension
    )
}

/// Outcome of one synthesis batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub created: usize,
    /// Names that already had a photo (or repeated within the batch).
    pub skipped: usize,
    pub failed: usize,
}

/// Generates missing dish photos in the background, one at a time.
#[derive(Clone)]
pub struct PhotoSynthesisBatcher {
    store: Arc<dyn MenuStore>,
    generator: Arc<dyn PhotoGenerator>,
}

impl PhotoSynthesisBatcher {
    pub fn new(store: Arc<dyn MenuStore>, generator: Arc<dyn PhotoGenerator>) -> Self {
        Self { store, generator }
    }

    /// Start a batch for `names`. Returns `None` when there is nothing to do.
    ///
    /// The batch runs in its own task under the caller's span and
    /// subscriber; failures are logged and counted, never returned.
    pub fn submit(&self, names: Vec<String>) -> Option<JoinHandle<SynthesisReport>> {
        if names.is_empty() {
            return None;
        }

        let batcher = self.clone();
        let task = async move { batcher.run(names).await };

        Some(tokio::spawn(
            task.in_current_span().with_current_subscriber(),
        ))
    }

    async fn run(&self, names: Vec<String>) -> SynthesisReport {
        let requested = names.len();
        let mut report = SynthesisReport::default();

        let missing = match self.store.missing_photos(&names).await {
            Ok(missing) => missing,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up existing photos, skipping batch");
                report.failed = requested;
                return report;
            }
        };
        report.skipped = requested - missing.len();

        for name in &missing {
            match self.synthesize(name).await {
                Ok(url) => {
                    report.created += 1;
                    metrics::counter!("menu_photos_synthesized_total").increment(1);
                    tracing::debug!(standardized_name = %name, photo_url = %url, "Photo created");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("menu_photos_failed_total").increment(1);
                    tracing::warn!(standardized_name = %name, error = %e, "Photo synthesis failed");
                }
            }
        }

        tracing::info!(
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "Photo synthesis batch finished"
        );

        report
    }

    async fn synthesize(&self, name: &str) -> Result<String, SynthesisError> {
        let url = self.generator.generate_photo(name).await?;
        let photo = self
            .store
            .create_photo(name, &url)
            .await
            .map_err(|e| SynthesisError::Record(e.to_string()))?;
        Ok(photo.photo_url)
    }
}
