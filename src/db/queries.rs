use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

use super::{without_photos, MenuStore, StoreError};
use crate::models::extraction::{ExtractedFoodItem, ExtractedWineItem, MenuExtraction};
use crate::models::job::{Job, JobStatus, NewJob, Transition};
use crate::models::menu::{
    FoodCategory, FoodEnrichment, FoodIngredient, FoodMenuItem, MenuRefs, Photo, WineCategory,
    WineEnrichment, WineMenuItem,
};
use crate::models::session::{NewSession, Session};

const JOB_COLUMNS: &str = r#"
    id, uuid, session_id, status, progress, error_message, lat, lng,
    food_menu_id, wine_menu_id, started_at, completed_at, created_at, updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    id, uuid, lat, lng, potential_restaurant_name, potential_address,
    food_menu_id, wine_menu_id, created_at
"#;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgMenuStore {
    pool: PgPool,
}

impl PgMenuStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_session(&self, row: Option<PgRow>) -> Result<Option<Session>, StoreError> {
        let Some(r) = row else {
            return Ok(None);
        };
        let id: i64 = r.try_get("id")?;

        let photo_urls: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT url FROM session_photos
            WHERE session_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Session {
            id,
            uuid: r.try_get("uuid")?,
            photo_urls,
            lat: r.try_get("lat")?,
            lng: r.try_get("lng")?,
            potential_restaurant_name: r.try_get("potential_restaurant_name")?,
            potential_address: r.try_get("potential_address")?,
            food_menu_id: r.try_get("food_menu_id")?,
            wine_menu_id: r.try_get("wine_menu_id")?,
            created_at: r.try_get("created_at")?,
        }))
    }
}

/// Parse a text column holding an enum value. Unknown values mean the row
/// was written by something other than this store.
fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown {} '{}'", column, value)))
}

fn job_from_row(r: &PgRow) -> Result<Job, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status = parse_column::<JobStatus>("job status", &status_str)?;

    Ok(Job {
        id: r.try_get("id")?,
        uuid: r.try_get("uuid")?,
        session_id: r.try_get("session_id")?,
        status,
        progress: r.try_get("progress")?,
        error_message: r.try_get("error_message")?,
        lat: r.try_get("lat")?,
        lng: r.try_get("lng")?,
        food_menu_id: r.try_get("food_menu_id")?,
        wine_menu_id: r.try_get("wine_menu_id")?,
        started_at: r.try_get("started_at")?,
        completed_at: r.try_get("completed_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn photo_from_row(r: &PgRow) -> Result<Photo, StoreError> {
    Ok(Photo {
        id: r.try_get("id")?,
        standardized_name: r.try_get("standardized_name")?,
        photo_url: r.try_get("photo_url")?,
        created_at: r.try_get("created_at")?,
    })
}

async fn insert_food_menu(
    tx: &mut Transaction<'_, Postgres>,
    items: &[ExtractedFoodItem],
) -> Result<i64, StoreError> {
    let menu_id: i64 = sqlx::query_scalar("INSERT INTO food_menus DEFAULT VALUES RETURNING id")
        .fetch_one(&mut **tx)
        .await?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO food_menu_items
                (menu_id, position, name, price, category, spice, richness, ingredients)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(menu_id)
        .bind(position as i32)
        .bind(&item.name)
        .bind(item.price)
        .bind(item.category.as_ref())
        .bind(item.spice)
        .bind(item.richness)
        .bind(Json(&item.ingredients))
        .execute(&mut **tx)
        .await?;
    }

    Ok(menu_id)
}

async fn insert_wine_menu(
    tx: &mut Transaction<'_, Postgres>,
    items: &[ExtractedWineItem],
) -> Result<i64, StoreError> {
    let menu_id: i64 = sqlx::query_scalar("INSERT INTO wine_menus DEFAULT VALUES RETURNING id")
        .fetch_one(&mut **tx)
        .await?;

    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO wine_menu_items
                (menu_id, position, name, price_glass, price_bottle, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(menu_id)
        .bind(position as i32)
        .bind(&item.name)
        .bind(item.price_glass)
        .bind(item.price_bottle)
        .bind(item.category.as_ref())
        .execute(&mut **tx)
        .await?;
    }

    Ok(menu_id)
}

#[async_trait]
impl MenuStore for PgMenuStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut tx = self.pool.begin().await?;

        let session_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sessions (uuid, lat, lng, potential_restaurant_name, potential_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.lat)
        .bind(new.lng)
        .bind(&new.potential_restaurant_name)
        .bind(&new.potential_address)
        .fetch_one(&mut *tx)
        .await?;

        for (position, url) in new.photo_urls.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO session_photos (session_id, url, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(session_id)
            .bind(url)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_session(session_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM sessions WHERE id = $1", SESSION_COLUMNS))
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        self.load_session(row).await
    }

    async fn get_session_by_uuid(&self, uuid: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM sessions WHERE uuid = $1", SESSION_COLUMNS))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        self.load_session(row).await
    }

    async fn update_session_location(
        &self,
        session_id: i64,
        lat: f64,
        lng: f64,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET lat = $1, lng = $2 WHERE id = $3")
            .bind(lat)
            .bind(lng)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_job(&self, new: NewJob) -> Result<Job, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO jobs (uuid, session_id, status, progress, lat, lng)
            VALUES ($1, $2, 'created', 0.0, $3, $4)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.session_id)
        .bind(new.lat)
        .bind(new.lng)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(&row)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE uuid = $1", JOB_COLUMNS))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn advance_job(&self, job_id: Uuid, transition: &Transition) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM jobs WHERE uuid = $1 FOR UPDATE",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("job {}", job_id)))?;

        let mut job = job_from_row(&row)?;
        job.advance(transition, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                progress = $2,
                error_message = $3,
                started_at = $4,
                completed_at = $5,
                updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(job.status.as_ref())
        .bind(job.progress)
        .bind(&job.error_message)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .bind(job.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(job)
    }

    async fn save_extraction(
        &self,
        job_id: Uuid,
        session_id: i64,
        extraction: &MenuExtraction,
    ) -> Result<MenuRefs, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut refs = MenuRefs::default();
        if !extraction.food_items.is_empty() {
            refs.food_menu_id = Some(insert_food_menu(&mut tx, &extraction.food_items).await?);
        }
        if !extraction.wine_items.is_empty() {
            refs.wine_menu_id = Some(insert_wine_menu(&mut tx, &extraction.wine_items).await?);
        }

        let updated = sqlx::query(
            r#"
            UPDATE sessions
            SET potential_restaurant_name = COALESCE(potential_restaurant_name, $1),
                potential_address = COALESCE(potential_address, $2),
                food_menu_id = $3,
                wine_menu_id = $4
            WHERE id = $5
            "#,
        )
        .bind(&extraction.restaurant_name)
        .bind(&extraction.restaurant_address)
        .bind(refs.food_menu_id)
        .bind(refs.wine_menu_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("session {}", session_id)));
        }

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET food_menu_id = $1, wine_menu_id = $2, updated_at = NOW()
            WHERE uuid = $3
            "#,
        )
        .bind(refs.food_menu_id)
        .bind(refs.wine_menu_id)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("job {}", job_id)));
        }

        tx.commit().await?;
        Ok(refs)
    }

    async fn food_items(&self, menu_id: i64) -> Result<Vec<FoodMenuItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, menu_id, position, name, price, category, spice, richness,
                   ingredients, standardized_name
            FROM food_menu_items
            WHERE menu_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(menu_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<FoodMenuItem, StoreError> {
                let category: String = r.try_get("category")?;
                let ingredients: Json<Vec<FoodIngredient>> = r.try_get("ingredients")?;
                Ok(FoodMenuItem {
                    id: r.try_get("id")?,
                    menu_id: r.try_get("menu_id")?,
                    position: r.try_get("position")?,
                    name: r.try_get("name")?,
                    price: r.try_get("price")?,
                    category: parse_column::<FoodCategory>("food category", &category)?,
                    spice: r.try_get("spice")?,
                    richness: r.try_get("richness")?,
                    ingredients: ingredients.0,
                    standardized_name: r.try_get("standardized_name")?,
                })
            })
            .collect()
    }

    async fn wine_items(&self, menu_id: i64) -> Result<Vec<WineMenuItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, menu_id, position, name, price_glass, price_bottle, category
            FROM wine_menu_items
            WHERE menu_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(menu_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<WineMenuItem, StoreError> {
                let category: String = r.try_get("category")?;
                Ok(WineMenuItem {
                    id: r.try_get("id")?,
                    menu_id: r.try_get("menu_id")?,
                    position: r.try_get("position")?,
                    name: r.try_get("name")?,
                    price_glass: r.try_get("price_glass")?,
                    price_bottle: r.try_get("price_bottle")?,
                    category: parse_column::<WineCategory>("wine category", &category)?,
                })
            })
            .collect()
    }

    async fn save_food_enrichments(&self, enrichments: &[FoodEnrichment]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for enrichment in enrichments {
            sqlx::query(
                r#"
                UPDATE food_menu_items
                SET standardized_name = COALESCE($1, standardized_name),
                    updated_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(&enrichment.standardized_name)
            .bind(enrichment.food_menu_item_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO enriched_food_menu_items (food_menu_item_id, description, tags)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(enrichment.food_menu_item_id)
            .bind(&enrichment.description)
            .bind(Json(&enrichment.tags))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_wine_enrichments(&self, enrichments: &[WineEnrichment]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for enrichment in enrichments {
            sqlx::query(
                r#"
                INSERT INTO enriched_wine_menu_items
                    (wine_menu_item_id, grape_varietal, description, country, region, flavor)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(enrichment.wine_menu_item_id)
            .bind(&enrichment.grape_varietal)
            .bind(&enrichment.description)
            .bind(&enrichment.country)
            .bind(&enrichment.region)
            .bind(enrichment.flavor.map(|f| f.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_photo(&self, standardized_name: &str) -> Result<Option<Photo>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, standardized_name, photo_url, created_at
            FROM food_photos
            WHERE standardized_name = $1
            "#,
        )
        .bind(standardized_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(photo_from_row).transpose()
    }

    async fn missing_photos(&self, names: &[String]) -> Result<Vec<String>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT standardized_name FROM food_photos WHERE standardized_name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        let existing: HashSet<String> = existing.into_iter().collect();
        Ok(without_photos(names, |name| existing.contains(name)))
    }

    async fn create_photo(&self, standardized_name: &str, photo_url: &str) -> Result<Photo, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO food_photos (standardized_name, photo_url)
            VALUES ($1, $2)
            ON CONFLICT (standardized_name) DO NOTHING
            RETURNING id, standardized_name, photo_url, created_at
            "#,
        )
        .bind(standardized_name)
        .bind(photo_url)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => photo_from_row(&row),
            None => self
                .get_photo(standardized_name)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("photo '{}'", standardized_name))),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
