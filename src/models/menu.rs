use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Food menu categories.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FoodCategory {
    Appetizer,
    Soup,
    Entree,
    Seafood,
    Dessert,
    #[default]
    Other,
}

/// Wine list categories.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WineCategory {
    Sparkling,
    White,
    Rose,
    Red,
    Sweet,
    #[default]
    Other,
}

/// Main ingredient groups used for filtering dishes.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum FoodIngredient {
    Beef,
    Pork,
    Chicken,
    Seafood,
    Noodle,
    Rice,
    #[default]
    Other,
}

/// Highlight tags attached to enriched dishes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FoodTag {
    CommunityFavorite,
    ChefSignature,
    CrowdPleaser,
    GreatValue,
}

impl FoodTag {
    pub const ALL: [FoodTag; 4] = [
        FoodTag::CommunityFavorite,
        FoodTag::ChefSignature,
        FoodTag::CrowdPleaser,
        FoodTag::GreatValue,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FoodTag::CommunityFavorite => "Community Favorite",
            FoodTag::ChefSignature => "Chef's Signature",
            FoodTag::CrowdPleaser => "Crowd Pleaser",
            FoodTag::GreatValue => "Great Value",
        }
    }
}

/// A tag as stored on an enrichment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagLabel {
    pub code: String,
    pub label: String,
}

impl TagLabel {
    /// Unknown codes are kept, labelled with the code itself.
    pub fn from_code(code: &str) -> Self {
        let label = code
            .parse::<FoodTag>()
            .map(|tag| tag.label().to_string())
            .unwrap_or_else(|_| code.to_string());
        Self {
            code: code.to_string(),
            label,
        }
    }
}

/// Wine flavor profiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum WineFlavor {
    Elegant,
    Fruity,
    #[serde(rename = "Full-Body")]
    #[strum(to_string = "Full-Body", serialize = "Full Body")]
    FullBody,
    Sweet,
    Acidic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodMenuItem {
    pub id: i64,
    pub menu_id: i64,
    pub position: i32,
    pub name: String,
    pub price: Option<f64>,
    pub category: FoodCategory,
    pub spice: Option<i32>,
    pub richness: Option<i32>,
    pub ingredients: Vec<FoodIngredient>,
    pub standardized_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WineMenuItem {
    pub id: i64,
    pub menu_id: i64,
    pub position: i32,
    pub name: String,
    pub price_glass: Option<f64>,
    pub price_bottle: Option<f64>,
    pub category: WineCategory,
}

/// Enrichment of one food item. Persisting it also sets the item's
/// standardized name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodEnrichment {
    pub food_menu_item_id: i64,
    pub standardized_name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<TagLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WineEnrichment {
    pub wine_menu_item_id: i64,
    pub grape_varietal: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub flavor: Option<WineFlavor>,
}

/// Representative photo for a standardized dish name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub id: i64,
    pub standardized_name: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
}

/// Menus created for one job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuRefs {
    pub food_menu_id: Option<i64>,
    pub wine_menu_id: Option<i64>,
}
