use garde::Validate;
use serde::{Deserialize, Serialize};

use super::lenient;
use super::menu::{FoodCategory, FoodIngredient, WineCategory};

/// Structured menu data extracted from photos by the vision model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MenuExtraction {
    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::text")]
    pub restaurant_name: Option<String>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::text")]
    pub restaurant_address: Option<String>,

    #[garde(dive)]
    #[serde(default)]
    pub food_items: Vec<ExtractedFoodItem>,

    #[garde(dive)]
    #[serde(default)]
    pub wine_items: Vec<ExtractedWineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ExtractedFoodItem {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(range(min = 0.0))]
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub category: FoodCategory,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::list")]
    pub ingredients: Vec<FoodIngredient>,

    #[garde(range(min = 1, max = 5))]
    #[serde(default, deserialize_with = "lenient::level")]
    pub spice: Option<i32>,

    #[garde(range(min = 1, max = 5))]
    #[serde(default, deserialize_with = "lenient::level")]
    pub richness: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ExtractedWineItem {
    #[garde(length(min = 1, max = 200))]
    pub name: String,

    #[garde(range(min = 0.0))]
    #[serde(default, deserialize_with = "lenient::number")]
    pub price_glass: Option<f64>,

    #[garde(range(min = 0.0))]
    #[serde(default, deserialize_with = "lenient::number")]
    pub price_bottle: Option<f64>,

    #[garde(skip)]
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub category: WineCategory,
}

impl MenuExtraction {
    pub fn is_empty(&self) -> bool {
        self.food_items.is_empty() && self.wine_items.is_empty()
    }
}
