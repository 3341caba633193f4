use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A photo upload session. Owns the photos a job turns into menus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: i64,
    pub uuid: Uuid,
    /// Photo URLs in upload order.
    pub photo_urls: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub potential_restaurant_name: Option<String>,
    pub potential_address: Option<String>,
    pub food_menu_id: Option<i64>,
    pub wine_menu_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub photo_urls: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub potential_restaurant_name: Option<String>,
    pub potential_address: Option<String>,
}
