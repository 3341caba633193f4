use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::extraction::MenuExtraction;
use crate::models::job::{Job, NewJob, Transition, TransitionError};
use crate::models::menu::{FoodEnrichment, FoodMenuItem, MenuRefs, Photo, WineEnrichment, WineMenuItem};
use crate::models::session::{NewSession, Session};

pub mod memory;
pub mod queries;

pub use memory::InMemoryStore;
pub use queries::PgMenuStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Persistence contract of the menu pipeline.
///
/// Every method that touches more than one row is atomic: either all of its
/// writes are visible afterwards or none are. Implementations never hold a
/// connection across calls, so collaborators are always invoked outside a
/// transaction.
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError>;

    async fn get_session(&self, session_id: i64) -> Result<Option<Session>, StoreError>;

    async fn get_session_by_uuid(&self, uuid: Uuid) -> Result<Option<Session>, StoreError>;

    async fn update_session_location(
        &self,
        session_id: i64,
        lat: f64,
        lng: f64,
    ) -> Result<(), StoreError>;

    async fn create_job(&self, new: NewJob) -> Result<Job, StoreError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Apply a state transition under a lock on the job row and return the
    /// updated job.
    async fn advance_job(&self, job_id: Uuid, transition: &Transition) -> Result<Job, StoreError>;

    /// Create the extracted menus and link them to the session and job in
    /// one transaction. Restaurant name and address are only filled in
    /// where the session has none.
    async fn save_extraction(
        &self,
        job_id: Uuid,
        session_id: i64,
        extraction: &MenuExtraction,
    ) -> Result<MenuRefs, StoreError>;

    /// Items of a food menu in menu order.
    async fn food_items(&self, menu_id: i64) -> Result<Vec<FoodMenuItem>, StoreError>;

    /// Items of a wine menu in menu order.
    async fn wine_items(&self, menu_id: i64) -> Result<Vec<WineMenuItem>, StoreError>;

    /// Insert enrichment records and set standardized names in one transaction.
    async fn save_food_enrichments(&self, enrichments: &[FoodEnrichment]) -> Result<(), StoreError>;

    async fn save_wine_enrichments(&self, enrichments: &[WineEnrichment]) -> Result<(), StoreError>;

    async fn get_photo(&self, standardized_name: &str) -> Result<Option<Photo>, StoreError>;

    /// The subset of `names` without a photo, in input order, without duplicates.
    async fn missing_photos(&self, names: &[String]) -> Result<Vec<String>, StoreError>;

    /// Create a photo unless one already exists for the name; returns the
    /// stored record either way.
    async fn create_photo(&self, standardized_name: &str, photo_url: &str) -> Result<Photo, StoreError>;

    /// Connectivity check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Dedupe `names` in first-seen order, keeping those `has_photo` rejects.
pub(crate) fn without_photos<F>(names: &[String], has_photo: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut missing: Vec<String> = Vec::new();
    for name in names {
        if !has_photo(name) && !missing.contains(name) {
            missing.push(name.clone());
        }
    }
    missing
}
