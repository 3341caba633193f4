//! Fake collaborators and an observing store for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::Dispatch;
use uuid::Uuid;

use menu_pipeline::config::PipelineConfig;
use menu_pipeline::db::{InMemoryStore, MenuStore, StoreError};
use menu_pipeline::models::enrichment::{
    FoodEnrichmentRequest, FoodEnrichmentResponse, WineEnrichmentRequest, WineEnrichmentResponse,
};
use menu_pipeline::models::extraction::{ExtractedFoodItem, ExtractedWineItem, MenuExtraction};
use menu_pipeline::models::job::{Job, NewJob, Transition};
use menu_pipeline::models::menu::{
    FoodCategory, FoodEnrichment, FoodMenuItem, MenuRefs, Photo, WineCategory, WineEnrichment,
    WineFlavor, WineMenuItem,
};
use menu_pipeline::models::session::{NewSession, Session};
use menu_pipeline::services::collaborators::{
    EnrichmentError, ExtractionError, FoodEnricher, MenuExtractor, PhotoGenerator, SynthesisError,
    WineEnricher,
};
use menu_pipeline::services::dispatcher::Dispatcher;
use menu_pipeline::services::enrichment::MenuEnricher;
use menu_pipeline::services::menu_jobs::MenuJobService;
use menu_pipeline::services::photos::PhotoSynthesisBatcher;
use menu_pipeline::services::pipeline::PipelineExecutor;

pub fn test_log() -> Dispatch {
    Dispatch::new(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .finish(),
    )
}

pub fn food_item(name: &str, price: f64, category: FoodCategory) -> ExtractedFoodItem {
    ExtractedFoodItem {
        name: name.to_string(),
        price: Some(price),
        category,
        ingredients: vec![],
        spice: None,
        richness: None,
    }
}

pub fn wine_item(name: &str, category: WineCategory) -> ExtractedWineItem {
    ExtractedWineItem {
        name: name.to_string(),
        price_glass: Some(12.0),
        price_bottle: Some(48.0),
        category,
    }
}

pub fn extraction(food: Vec<ExtractedFoodItem>, wine: Vec<ExtractedWineItem>) -> MenuExtraction {
    MenuExtraction {
        restaurant_name: Some("Thai Orchid".to_string()),
        restaurant_address: Some("12 Market St".to_string()),
        food_items: food,
        wine_items: wine,
    }
}

/// Extractor returning a fixed result.
pub struct FakeExtractor {
    result: Result<MenuExtraction, String>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn returning(extraction: MenuExtraction) -> Self {
        Self {
            result: Ok(extraction),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MenuExtractor for FakeExtractor {
    async fn extract(&self, _photo_urls: &[String]) -> Result<MenuExtraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(ExtractionError::Request)
    }
}

/// Extractor that blocks until released, tracking how many calls overlap.
pub struct GatedExtractor {
    extraction: MenuExtraction,
    gate: Semaphore,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl GatedExtractor {
    pub fn new(extraction: MenuExtraction) -> Self {
        Self {
            extraction,
            gate: Semaphore::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let `n` blocked or future calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MenuExtractor for GatedExtractor {
    async fn extract(&self, _photo_urls: &[String]) -> Result<MenuExtraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        permit.forget();

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.extraction.clone())
    }
}

/// How the fake food enricher reports item ids back.
#[derive(Clone, Copy, PartialEq)]
pub enum IdEcho {
    Exact,
    /// Numbered 1..=N within the batch, as models often do.
    Renumbered,
    Missing,
}

/// Food enricher echoing each request. Standardized names default to the
/// item name and can be overridden per item name.
pub struct FakeFoodEnricher {
    fail: Option<String>,
    standardized: HashMap<String, String>,
    reverse: bool,
    echo: IdEcho,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<FoodEnrichmentRequest>>,
}

impl FakeFoodEnricher {
    pub fn new() -> Self {
        Self {
            fail: None,
            standardized: HashMap::new(),
            reverse: false,
            echo: IdEcho::Exact,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn standardize(mut self, name: &str, standardized: &str) -> Self {
        self.standardized
            .insert(name.to_string(), standardized.to_string());
        self
    }

    /// Answer in reverse request order.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn renumbered(mut self) -> Self {
        self.echo = IdEcho::Renumbered;
        self
    }

    pub fn without_ids(mut self) -> Self {
        self.echo = IdEcho::Missing;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FoodEnricher for FakeFoodEnricher {
    async fn enrich_food(
        &self,
        items: &[FoodEnrichmentRequest],
    ) -> Result<Vec<FoodEnrichmentResponse>, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().extend_from_slice(items);

        if let Some(message) = &self.fail {
            return Err(EnrichmentError::Food(message.clone()));
        }

        let mut responses: Vec<FoodEnrichmentResponse> = items
            .iter()
            .enumerate()
            .map(|(position, item)| FoodEnrichmentResponse {
                ref_id: match self.echo {
                    IdEcho::Exact => Some(item.ref_id),
                    IdEcho::Renumbered => Some(position as i64 + 1),
                    IdEcho::Missing => None,
                },
                standardized_name: Some(
                    self.standardized
                        .get(&item.name)
                        .cloned()
                        .unwrap_or_else(|| item.name.clone()),
                ),
                description: Some(format!("About {}", item.name)),
                tags: vec!["CROWD_PLEASER".to_string()],
            })
            .collect();
        if self.reverse {
            responses.reverse();
        }
        Ok(responses)
    }
}

pub struct FakeWineEnricher {
    fail: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeWineEnricher {
    pub fn new() -> Self {
        Self {
            fail: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WineEnricher for FakeWineEnricher {
    async fn enrich_wine(
        &self,
        items: &[WineEnrichmentRequest],
    ) -> Result<Vec<WineEnrichmentResponse>, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail {
            return Err(EnrichmentError::Wine(message.clone()));
        }

        Ok(items
            .iter()
            .map(|item| WineEnrichmentResponse {
                ref_id: Some(item.ref_id),
                grape_varietal: Some("Riesling".to_string()),
                country: Some("Germany".to_string()),
                region: Some("Mosel".to_string()),
                description: Some(format!("About {}", item.name)),
                flavor: Some(WineFlavor::Fruity),
            })
            .collect())
    }
}

/// Photo generator recording every name it was asked for.
pub struct FakePhotoGenerator {
    failing: HashSet<String>,
    pub requested: Mutex<Vec<String>>,
}

impl FakePhotoGenerator {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(name: &str) -> Self {
        Self {
            failing: HashSet::from([name.to_string()]),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhotoGenerator for FakePhotoGenerator {
    async fn generate_photo(&self, standardized_name: &str) -> Result<String, SynthesisError> {
        self.requested
            .lock()
            .unwrap()
            .push(standardized_name.to_string());

        if self.failing.contains(standardized_name) {
            return Err(SynthesisError::Generation("content policy".to_string()));
        }
        Ok(format!("https://cdn.test/{}.png", standardized_name.replace(' ', "_")))
    }
}

/// Photo generator that sleeps per call and tracks how many calls overlap.
pub struct SlowPhotoGenerator {
    delay: std::time::Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl SlowPhotoGenerator {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoGenerator for SlowPhotoGenerator {
    async fn generate_photo(&self, standardized_name: &str) -> Result<String, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("https://cdn.test/{}.png", standardized_name.replace(' ', "_")))
    }
}

/// In-memory store that records every job state written through
/// `advance_job` and can be told to fail extraction persistence.
pub struct ObservedStore {
    pub inner: InMemoryStore,
    transitions: Mutex<Vec<Job>>,
    fail_save_extraction: AtomicBool,
}

impl ObservedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            transitions: Mutex::new(Vec::new()),
            fail_save_extraction: AtomicBool::new(false),
        }
    }

    pub fn fail_save_extraction(&self) {
        self.fail_save_extraction.store(true, Ordering::SeqCst);
    }

    /// Snapshots of `job_id` after each successful transition.
    pub fn transitions(&self, job_id: Uuid) -> Vec<Job> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.uuid == job_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MenuStore for ObservedStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        self.inner.create_session(new).await
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<Session>, StoreError> {
        self.inner.get_session(session_id).await
    }

    async fn get_session_by_uuid(&self, uuid: Uuid) -> Result<Option<Session>, StoreError> {
        self.inner.get_session_by_uuid(uuid).await
    }

    async fn update_session_location(
        &self,
        session_id: i64,
        lat: f64,
        lng: f64,
    ) -> Result<(), StoreError> {
        self.inner.update_session_location(session_id, lat, lng).await
    }

    async fn create_job(&self, new: NewJob) -> Result<Job, StoreError> {
        self.inner.create_job(new).await
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        self.inner.get_job(job_id).await
    }

    async fn advance_job(&self, job_id: Uuid, transition: &Transition) -> Result<Job, StoreError> {
        let job = self.inner.advance_job(job_id, transition).await?;
        self.transitions.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn save_extraction(
        &self,
        job_id: Uuid,
        session_id: i64,
        extraction: &MenuExtraction,
    ) -> Result<MenuRefs, StoreError> {
        if self.fail_save_extraction.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("connection reset during commit".to_string()));
        }
        self.inner.save_extraction(job_id, session_id, extraction).await
    }

    async fn food_items(&self, menu_id: i64) -> Result<Vec<FoodMenuItem>, StoreError> {
        self.inner.food_items(menu_id).await
    }

    async fn wine_items(&self, menu_id: i64) -> Result<Vec<WineMenuItem>, StoreError> {
        self.inner.wine_items(menu_id).await
    }

    async fn save_food_enrichments(&self, enrichments: &[FoodEnrichment]) -> Result<(), StoreError> {
        self.inner.save_food_enrichments(enrichments).await
    }

    async fn save_wine_enrichments(&self, enrichments: &[WineEnrichment]) -> Result<(), StoreError> {
        self.inner.save_wine_enrichments(enrichments).await
    }

    async fn get_photo(&self, standardized_name: &str) -> Result<Option<Photo>, StoreError> {
        self.inner.get_photo(standardized_name).await
    }

    async fn missing_photos(&self, names: &[String]) -> Result<Vec<String>, StoreError> {
        self.inner.missing_photos(names).await
    }

    async fn create_photo(&self, standardized_name: &str, photo_url: &str) -> Result<Photo, StoreError> {
        self.inner.create_photo(standardized_name, photo_url).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// A fully wired pipeline over fakes.
pub struct Harness {
    pub store: Arc<ObservedStore>,
    pub food: Arc<FakeFoodEnricher>,
    pub wine: Arc<FakeWineEnricher>,
    pub photos: Arc<FakePhotoGenerator>,
    pub executor: Arc<PipelineExecutor>,
    pub dispatcher: Arc<Dispatcher>,
    pub service: MenuJobService,
}

pub struct HarnessBuilder {
    store: Arc<ObservedStore>,
    extractor: Arc<dyn MenuExtractor>,
    food: FakeFoodEnricher,
    wine: FakeWineEnricher,
    photos: FakePhotoGenerator,
    config: PipelineConfig,
}

impl HarnessBuilder {
    pub fn new(extractor: Arc<dyn MenuExtractor>) -> Self {
        Self {
            store: Arc::new(ObservedStore::new()),
            extractor,
            food: FakeFoodEnricher::new(),
            wine: FakeWineEnricher::new(),
            photos: FakePhotoGenerator::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn food(mut self, food: FakeFoodEnricher) -> Self {
        self.food = food;
        self
    }

    pub fn wine(mut self, wine: FakeWineEnricher) -> Self {
        self.wine = wine;
        self
    }

    pub fn photos(mut self, photos: FakePhotoGenerator) -> Self {
        self.photos = photos;
        self
    }

    pub fn limits(mut self, max_concurrent_jobs: usize, job_queue_capacity: usize) -> Self {
        self.config = PipelineConfig {
            max_concurrent_jobs,
            job_queue_capacity,
        };
        self
    }

    pub fn build(self) -> Harness {
        let log = test_log();
        let store = self.store;
        let food = Arc::new(self.food);
        let wine = Arc::new(self.wine);
        let photos = Arc::new(self.photos);

        let batcher = PhotoSynthesisBatcher::new(store.clone(), photos.clone());
        let enricher = MenuEnricher::new(store.clone(), food.clone(), wine.clone(), batcher);
        let executor = Arc::new(PipelineExecutor::new(
            store.clone(),
            self.extractor,
            enricher,
            log.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            executor.clone(),
            store.clone(),
            &self.config,
            log,
        ));
        let service = MenuJobService::new(store.clone(), dispatcher.clone());

        Harness {
            store,
            food,
            wine,
            photos,
            executor,
            dispatcher,
            service,
        }
    }
}

impl Harness {
    /// Create a session with `photos` uploaded photos.
    pub async fn session(&self, photos: usize) -> Session {
        let photo_urls = (0..photos)
            .map(|i| format!("https://uploads.test/menu_{}.jpg", i))
            .collect();
        self.store
            .create_session(NewSession {
                photo_urls,
                ..Default::default()
            })
            .await
            .expect("Failed to create session")
    }

    /// Create a session and a job for it.
    pub async fn job(&self, photos: usize) -> Job {
        let session = self.session(photos).await;
        self.service
            .create_job(session.uuid, None, None)
            .await
            .expect("Failed to create job")
    }

    pub async fn reload(&self, job: &Job) -> Job {
        self.store
            .get_job(job.uuid)
            .await
            .expect("Failed to load job")
            .expect("Job not found")
    }
}
