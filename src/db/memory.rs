//! In-process store used by tests and local runs without PostgreSQL.
//!
//! All state sits behind one mutex, so every trait method is atomic. The
//! lock is never held across an await point.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{without_photos, MenuStore, StoreError};
use crate::models::extraction::MenuExtraction;
use crate::models::job::{Job, JobStatus, NewJob, Transition};
use crate::models::menu::{
    FoodEnrichment, FoodMenuItem, MenuRefs, Photo, WineEnrichment, WineMenuItem,
};
use crate::models::session::{NewSession, Session};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    sessions: HashMap<i64, Session>,
    jobs: HashMap<Uuid, Job>,
    food_menus: HashMap<i64, Vec<FoodMenuItem>>,
    wine_menus: HashMap<i64, Vec<WineMenuItem>>,
    food_enrichments: HashMap<i64, FoodEnrichment>,
    wine_enrichments: HashMap<i64, WineEnrichment>,
    photos: HashMap<String, Photo>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All food enrichment records, ordered by item id.
    pub fn food_enrichments(&self) -> Vec<FoodEnrichment> {
        let mut records: Vec<_> = self.state().food_enrichments.values().cloned().collect();
        records.sort_by_key(|r| r.food_menu_item_id);
        records
    }

    /// All wine enrichment records, ordered by item id.
    pub fn wine_enrichments(&self) -> Vec<WineEnrichment> {
        let mut records: Vec<_> = self.state().wine_enrichments.values().cloned().collect();
        records.sort_by_key(|r| r.wine_menu_item_id);
        records
    }

    pub fn photos(&self) -> Vec<Photo> {
        let mut photos: Vec<_> = self.state().photos.values().cloned().collect();
        photos.sort_by_key(|p| p.id);
        photos
    }

    /// Number of food and wine menus created so far.
    pub fn menu_counts(&self) -> (usize, usize) {
        let state = self.state();
        (state.food_menus.len(), state.wine_menus.len())
    }
}

#[async_trait]
impl MenuStore for InMemoryStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut state = self.state();
        let session = Session {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            photo_urls: new.photo_urls,
            lat: new.lat,
            lng: new.lng,
            potential_restaurant_name: new.potential_restaurant_name,
            potential_address: new.potential_address,
            food_menu_id: None,
            wine_menu_id: None,
            created_at: Utc::now(),
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<Session>, StoreError> {
        Ok(self.state().sessions.get(&session_id).cloned())
    }

    async fn get_session_by_uuid(&self, uuid: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self
            .state()
            .sessions
            .values()
            .find(|s| s.uuid == uuid)
            .cloned())
    }

    async fn update_session_location(
        &self,
        session_id: i64,
        lat: f64,
        lng: f64,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;
        session.lat = Some(lat);
        session.lng = Some(lng);
        Ok(())
    }

    async fn create_job(&self, new: NewJob) -> Result<Job, StoreError> {
        let mut state = self.state();
        if !state.sessions.contains_key(&new.session_id) {
            return Err(StoreError::NotFound(format!("session {}", new.session_id)));
        }

        let now = Utc::now();
        let job = Job {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            session_id: new.session_id,
            status: JobStatus::Created,
            progress: 0.0,
            error_message: None,
            lat: new.lat,
            lng: new.lng,
            food_menu_id: None,
            wine_menu_id: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.uuid, job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.state().jobs.get(&job_id).cloned())
    }

    async fn advance_job(&self, job_id: Uuid, transition: &Transition) -> Result<Job, StoreError> {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {}", job_id)))?;

        // Work on a copy so a rejected transition leaves the record untouched.
        let mut updated = job.clone();
        updated.advance(transition, Utc::now())?;
        *job = updated.clone();
        Ok(updated)
    }

    async fn save_extraction(
        &self,
        job_id: Uuid,
        session_id: i64,
        extraction: &MenuExtraction,
    ) -> Result<MenuRefs, StoreError> {
        let mut state = self.state();

        if !state.sessions.contains_key(&session_id) {
            return Err(StoreError::NotFound(format!("session {}", session_id)));
        }
        if !state.jobs.contains_key(&job_id) {
            return Err(StoreError::NotFound(format!("job {}", job_id)));
        }

        let mut refs = MenuRefs::default();

        if !extraction.food_items.is_empty() {
            let menu_id = state.next_id();
            let mut items = Vec::with_capacity(extraction.food_items.len());
            for (position, item) in extraction.food_items.iter().enumerate() {
                items.push(FoodMenuItem {
                    id: state.next_id(),
                    menu_id,
                    position: position as i32,
                    name: item.name.clone(),
                    price: item.price,
                    category: item.category,
                    spice: item.spice,
                    richness: item.richness,
                    ingredients: item.ingredients.clone(),
                    standardized_name: None,
                });
            }
            state.food_menus.insert(menu_id, items);
            refs.food_menu_id = Some(menu_id);
        }

        if !extraction.wine_items.is_empty() {
            let menu_id = state.next_id();
            let mut items = Vec::with_capacity(extraction.wine_items.len());
            for (position, item) in extraction.wine_items.iter().enumerate() {
                items.push(WineMenuItem {
                    id: state.next_id(),
                    menu_id,
                    position: position as i32,
                    name: item.name.clone(),
                    price_glass: item.price_glass,
                    price_bottle: item.price_bottle,
                    category: item.category,
                });
            }
            state.wine_menus.insert(menu_id, items);
            refs.wine_menu_id = Some(menu_id);
        }

        if let Some(session) = state.sessions.get_mut(&session_id) {
            if session.potential_restaurant_name.is_none() {
                session.potential_restaurant_name = extraction.restaurant_name.clone();
            }
            if session.potential_address.is_none() {
                session.potential_address = extraction.restaurant_address.clone();
            }
            session.food_menu_id = refs.food_menu_id;
            session.wine_menu_id = refs.wine_menu_id;
        }

        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.food_menu_id = refs.food_menu_id;
            job.wine_menu_id = refs.wine_menu_id;
            job.updated_at = Utc::now();
        }

        Ok(refs)
    }

    async fn food_items(&self, menu_id: i64) -> Result<Vec<FoodMenuItem>, StoreError> {
        Ok(self
            .state()
            .food_menus
            .get(&menu_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn wine_items(&self, menu_id: i64) -> Result<Vec<WineMenuItem>, StoreError> {
        Ok(self
            .state()
            .wine_menus
            .get(&menu_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_food_enrichments(&self, enrichments: &[FoodEnrichment]) -> Result<(), StoreError> {
        let mut state = self.state();

        for enrichment in enrichments {
            let id = enrichment.food_menu_item_id;
            let known = state.food_menus.values().flatten().any(|item| item.id == id);
            if !known {
                return Err(StoreError::NotFound(format!("food menu item {}", id)));
            }
            if state.food_enrichments.contains_key(&id) {
                return Err(StoreError::Corrupt(format!("food menu item {} already enriched", id)));
            }
        }

        for enrichment in enrichments {
            if let Some(name) = &enrichment.standardized_name {
                for item in state.food_menus.values_mut().flatten() {
                    if item.id == enrichment.food_menu_item_id {
                        item.standardized_name = Some(name.clone());
                    }
                }
            }
            state
                .food_enrichments
                .insert(enrichment.food_menu_item_id, enrichment.clone());
        }

        Ok(())
    }

    async fn save_wine_enrichments(&self, enrichments: &[WineEnrichment]) -> Result<(), StoreError> {
        let mut state = self.state();

        for enrichment in enrichments {
            let id = enrichment.wine_menu_item_id;
            let known = state.wine_menus.values().flatten().any(|item| item.id == id);
            if !known {
                return Err(StoreError::NotFound(format!("wine menu item {}", id)));
            }
            if state.wine_enrichments.contains_key(&id) {
                return Err(StoreError::Corrupt(format!("wine menu item {} already enriched", id)));
            }
        }

        for enrichment in enrichments {
            state
                .wine_enrichments
                .insert(enrichment.wine_menu_item_id, enrichment.clone());
        }

        Ok(())
    }

    async fn get_photo(&self, standardized_name: &str) -> Result<Option<Photo>, StoreError> {
        Ok(self.state().photos.get(standardized_name).cloned())
    }

    async fn missing_photos(&self, names: &[String]) -> Result<Vec<String>, StoreError> {
        let state = self.state();
        Ok(without_photos(names, |name| state.photos.contains_key(name)))
    }

    async fn create_photo(&self, standardized_name: &str, photo_url: &str) -> Result<Photo, StoreError> {
        let mut state = self.state();
        if let Some(existing) = state.photos.get(standardized_name) {
            return Ok(existing.clone());
        }

        let photo = Photo {
            id: state.next_id(),
            standardized_name: standardized_name.to_string(),
            photo_url: photo_url.to_string(),
            created_at: Utc::now(),
        };
        state
            .photos
            .insert(standardized_name.to_string(), photo.clone());
        Ok(photo)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
