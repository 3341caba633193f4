use garde::Validate;
use serde::{Deserialize, Serialize};

use super::lenient;
use super::menu::{FoodCategory, FoodIngredient, WineCategory, WineFlavor};

/// One food item sent for enrichment. `ref_id` is the menu item id and must
/// be echoed back by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodEnrichmentRequest {
    pub ref_id: i64,
    pub name: String,
    pub price: Option<f64>,
    pub category: FoodCategory,
    pub ingredients: Vec<FoodIngredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct FoodEnrichmentResponse {
    /// Echoed item id. Models sometimes quote it or leave it out.
    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::identifier")]
    pub ref_id: Option<i64>,

    #[garde(length(min = 1, max = 200))]
    #[serde(default, deserialize_with = "lenient::text")]
    pub standardized_name: Option<String>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WineEnrichmentRequest {
    pub ref_id: i64,
    pub name: String,
    pub category: WineCategory,
    pub price_glass: Option<f64>,
    pub price_bottle: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct WineEnrichmentResponse {
    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::identifier")]
    pub ref_id: Option<i64>,

    #[garde(length(max = 200))]
    #[serde(default, deserialize_with = "lenient::text")]
    pub grape_varietal: Option<String>,

    #[garde(length(max = 100))]
    #[serde(default, deserialize_with = "lenient::text")]
    pub country: Option<String>,

    #[garde(length(max = 200))]
    #[serde(default, deserialize_with = "lenient::text")]
    pub region: Option<String>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: Option<String>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::optional")]
    pub flavor: Option<WineFlavor>,
}
