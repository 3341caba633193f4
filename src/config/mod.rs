use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// OpenAI API key
    pub openai_api_key: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Vision model used to read menu photos
    #[serde(default = "default_chat_model")]
    pub extraction_model: String,

    #[serde(default = "default_chat_model")]
    pub enrichment_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Bucket for generated dish photos
    pub s3_bucket: String,

    /// S3-compatible endpoint URL
    pub s3_endpoint: String,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    pub s3_access_key: String,

    pub s3_secret_key: String,

    /// Public URL prefix the bucket is served from
    pub s3_public_url: String,

    /// Pipelines allowed to run at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Admitted jobs allowed to wait for a free slot
    #[serde(default = "default_job_queue_capacity")]
    pub job_queue_capacity: usize,

    /// Timeout for each OpenAI request, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_s3_region() -> String {
    "auto".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_job_queue_capacity() -> usize {
    32
}

fn default_http_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            job_queue_capacity: self.job_queue_capacity,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Limits of the background job runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_concurrent_jobs: usize,
    pub job_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_queue_capacity: default_job_queue_capacity(),
        }
    }
}
