//! Prompt text for the menu models.

pub const EXTRACTION_SYSTEM: &str =
    "You read restaurant menus from photos and return structured JSON only.";

pub const EXTRACTION_PROMPT: &str = r#"Analyze these menu photos and extract all menu items. For each item, identify:

For FOOD items:
- name: The dish name as written on the menu
- price: The price (number only, no currency symbol)
- category: One of: appetizer, soup, entree, seafood, dessert, other
- ingredients: List of main ingredients from: Beef, Pork, Chicken, Seafood, Noodle, Rice, Other
- spice: Spiciness level 1-5 (1=mild, 5=very spicy). Use your culinary knowledge to estimate.
- richness: Richness level 1-5 (1=light, 5=very rich). Use your culinary knowledge to estimate.

For WINE items:
- name: The wine name as written
- price_glass: Price per glass if available (number only)
- price_bottle: Price per bottle if available (number only)
- category: One of: sparkling, white, rose, red, sweet, other

Also extract if visible:
- restaurant_name: Name of the restaurant if shown
- restaurant_address: Address if shown

Return JSON with this exact structure:
{
  "restaurant_name": "string or null",
  "restaurant_address": "string or null",
  "food_items": [
    {"name": "string", "price": number, "category": "string",
     "ingredients": ["string"], "spice": number, "richness": number}
  ],
  "wine_items": [
    {"name": "string", "price_glass": number or null, "price_bottle": number or null,
     "category": "string"}
  ]
}"#;

pub const FOOD_ENRICHMENT_SYSTEM: &str =
    "You are a culinary expert providing menu item descriptions and standardization.";

pub const FOOD_ENRICHMENT_PROMPT: &str = r#"For each food item, provide enrichment data:

- ref_id: Copy the ref_id of the input item unchanged
- standardized_name: A canonical, standardized name for this dish type that can be used across restaurants
  (e.g., "Pad Thai", "Caesar Salad", "Margherita Pizza"). This should be a well-known dish name.
- description: A 1-2 sentence appetizing description of the dish
- tags: Array of applicable tag codes from: COMMUNITY_FAVORITE, CHEF_SIGNATURE, CROWD_PLEASER, GREAT_VALUE

Guidelines for tags:
- COMMUNITY_FAVORITE: Classic popular dishes that many people love
- CHEF_SIGNATURE: Unique, upscale, or specialty preparations
- CROWD_PLEASER: Broadly appealing comfort foods, safe choices for groups
- GREAT_VALUE: Good portion/quality relative to price

Consider the dish name, price, category, and ingredients when making these determinations.

Return JSON with this exact structure:
{
  "items": [
    {"ref_id": number, "standardized_name": "string", "description": "string", "tags": ["string"]}
  ]
}

Return exactly one entry per input item."#;

pub const WINE_ENRICHMENT_SYSTEM: &str =
    "You are a sommelier providing wine information and recommendations.";

pub const WINE_ENRICHMENT_PROMPT: &str = r#"For each wine item, provide enrichment data based on your wine knowledge:

- ref_id: Copy the ref_id of the input wine unchanged
- grape_varietal: The grape variety (e.g., "Cabernet Sauvignon", "Chardonnay", "Pinot Noir")
- country: Country of origin (e.g., "France", "USA", "Italy")
- region: Wine region (e.g., "Napa Valley", "Bordeaux", "Tuscany")
- description: A 1-2 sentence description of the wine's character and tasting notes
- flavor: One of: Elegant, Fruity, Full-Body, Sweet, Acidic

Use your wine knowledge to infer details from the wine name. If you cannot determine
a value with confidence, use reasonable defaults based on the wine category.

Return JSON with this exact structure:
{
  "wines": [
    {"ref_id": number, "grape_varietal": "string", "country": "string", "region": "string",
     "description": "string", "flavor": "string"}
  ]
}

Return exactly one entry per input wine."#;

/// Image prompt for a standardized dish name.
pub fn dish_photo_prompt(standardized_name: &str) -> String {
    format!(
        "A professional food photography image of {}. \
         The dish is beautifully plated on an elegant white plate, \
         shot from a 45-degree angle with soft natural lighting. \
         Restaurant quality presentation, appetizing and delicious looking. \
         Shallow depth of field, warm color tones. \
         No text, no watermarks, no logos, no people.",
        standardized_name
    )
}
