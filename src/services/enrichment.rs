//! Concurrent enrichment of persisted menus.
//!
//! Requests carry each item's id as `ref_id`; responses are matched back to
//! items by that id, never by position.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::collaborators::{FoodEnricher, WineEnricher};
use super::photos::{PhotoSynthesisBatcher, SynthesisReport};
use super::pipeline::PipelineError;
use crate::db::MenuStore;
use crate::models::enrichment::{
    FoodEnrichmentRequest, FoodEnrichmentResponse, WineEnrichmentRequest, WineEnrichmentResponse,
};
use crate::models::menu::{FoodEnrichment, FoodMenuItem, TagLabel, WineEnrichment, WineMenuItem};

/// Result of enriching one food menu.
#[derive(Debug, Default)]
pub struct FoodEnrichmentOutcome {
    /// Number of items that received an enrichment record.
    pub enriched: usize,
    /// Background photo batch started for names without a photo.
    pub synthesis: Option<JoinHandle<SynthesisReport>>,
}

pub struct MenuEnricher {
    store: Arc<dyn MenuStore>,
    food: Arc<dyn FoodEnricher>,
    wine: Arc<dyn WineEnricher>,
    photos: PhotoSynthesisBatcher,
}

impl MenuEnricher {
    pub fn new(
        store: Arc<dyn MenuStore>,
        food: Arc<dyn FoodEnricher>,
        wine: Arc<dyn WineEnricher>,
        photos: PhotoSynthesisBatcher,
    ) -> Self {
        Self {
            store,
            food,
            wine,
            photos,
        }
    }

    /// Enrich every item of a food menu and persist the results in one
    /// transaction, then hand new standardized names to the photo batcher.
    pub async fn enrich_food_menu(&self, menu_id: i64) -> Result<FoodEnrichmentOutcome, PipelineError> {
        let items = self.store.food_items(menu_id).await?;
        if items.is_empty() {
            return Ok(FoodEnrichmentOutcome::default());
        }

        let requests: Vec<FoodEnrichmentRequest> = items.iter().map(food_request).collect();
        let responses = self.food.enrich_food(&requests).await?;

        let item_ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        let records: Vec<FoodEnrichment> =
            match_responses(&item_ids, responses, |r: &FoodEnrichmentResponse| r.ref_id, "food")
                .into_iter()
                .map(|(item_id, response)| FoodEnrichment {
                    food_menu_item_id: item_id,
                    standardized_name: response.standardized_name,
                    description: response.description,
                    tags: response.tags.iter().map(|code| TagLabel::from_code(code)).collect(),
                })
                .collect();

        self.store.save_food_enrichments(&records).await?;

        let names: Vec<String> = records
            .iter()
            .filter_map(|record| record.standardized_name.clone())
            .collect();

        tracing::info!(
            menu_id,
            items = items.len(),
            enriched = records.len(),
            "Food menu enriched"
        );

        Ok(FoodEnrichmentOutcome {
            enriched: records.len(),
            synthesis: self.photos.submit(names),
        })
    }

    /// Enrich every item of a wine menu and persist the results in one
    /// transaction. Returns the number of enriched items.
    pub async fn enrich_wine_menu(&self, menu_id: i64) -> Result<usize, PipelineError> {
        let items = self.store.wine_items(menu_id).await?;
        if items.is_empty() {
            return Ok(0);
        }

        let requests: Vec<WineEnrichmentRequest> = items.iter().map(wine_request).collect();
        let responses = self.wine.enrich_wine(&requests).await?;

        let item_ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        let records: Vec<WineEnrichment> =
            match_responses(&item_ids, responses, |r: &WineEnrichmentResponse| r.ref_id, "wine")
                .into_iter()
                .map(|(item_id, response)| WineEnrichment {
                    wine_menu_item_id: item_id,
                    grape_varietal: response.grape_varietal,
                    description: response.description,
                    country: response.country,
                    region: response.region,
                    flavor: response.flavor,
                })
                .collect();

        self.store.save_wine_enrichments(&records).await?;

        tracing::info!(
            menu_id,
            items = items.len(),
            enriched = records.len(),
            "Wine menu enriched"
        );

        Ok(records.len())
    }
}

fn food_request(item: &FoodMenuItem) -> FoodEnrichmentRequest {
    FoodEnrichmentRequest {
        ref_id: item.id,
        name: item.name.clone(),
        price: item.price,
        category: item.category,
        ingredients: item.ingredients.clone(),
    }
}

fn wine_request(item: &WineMenuItem) -> WineEnrichmentRequest {
    WineEnrichmentRequest {
        ref_id: item.id,
        name: item.name.clone(),
        category: item.category,
        price_glass: item.price_glass,
        price_bottle: item.price_bottle,
    }
}

/// Pair each item id with the response carrying it, in item order.
///
/// Responses without an id, with an unknown id, or repeating an id already
/// matched are dropped. Items without a response are left out. When no
/// response carries a known id but the counts agree, the model renumbered
/// the batch and responses are paired by position instead.
pub(crate) fn match_responses<R, F>(
    item_ids: &[i64],
    responses: Vec<R>,
    ref_id: F,
    kind: &str,
) -> Vec<(i64, R)>
where
    F: Fn(&R) -> Option<i64>,
{
    let known: HashSet<i64> = item_ids.iter().copied().collect();
    let known_hits = responses
        .iter()
        .filter(|r| ref_id(*r).is_some_and(|id| known.contains(&id)))
        .count();

    if known_hits == 0 && !responses.is_empty() && responses.len() == item_ids.len() {
        tracing::warn!(
            kind,
            count = responses.len(),
            "Enrichment ids do not match any item, pairing by position"
        );
        return item_ids.iter().copied().zip(responses).collect();
    }

    let mut by_id: HashMap<i64, R> = HashMap::with_capacity(responses.len());
    for response in responses {
        let Some(id) = ref_id(&response) else {
            tracing::warn!(kind, "Ignoring enrichment without item id");
            continue;
        };
        if !known.contains(&id) {
            tracing::warn!(kind, ref_id = id, "Ignoring enrichment for unknown item");
            continue;
        }
        if by_id.contains_key(&id) {
            tracing::warn!(kind, ref_id = id, "Ignoring duplicate enrichment");
            continue;
        }
        by_id.insert(id, response);
    }

    let mut matched = Vec::with_capacity(by_id.len());
    for id in item_ids {
        match by_id.remove(id) {
            Some(response) => matched.push((*id, response)),
            None => tracing::warn!(kind, item_id = *id, "No enrichment returned for item"),
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(pairs: &[(i64, (i64, &'static str))]) -> Vec<(i64, &'static str)> {
        pairs.iter().map(|(id, (_, tag))| (*id, *tag)).collect()
    }

    #[test]
    fn test_pairs_in_item_order_regardless_of_response_order() {
        let responses = vec![(30, "c"), (10, "a"), (20, "b")];
        let matched = match_responses(&[10, 20, 30], responses, |r| Some(r.0), "food");
        assert_eq!(ids(&matched), vec![(10, "a"), (20, "b"), (30, "c")]);
    }

    #[test]
    fn test_missing_unknown_and_duplicate_ids() {
        let responses = vec![(10, "first"), (99, "stray"), (10, "second"), (30, "c")];
        let matched = match_responses(&[10, 20, 30], responses, |r| Some(r.0), "wine");
        assert_eq!(ids(&matched), vec![(10, "first"), (30, "c")]);
    }

    #[test]
    fn test_no_responses() {
        let matched =
            match_responses::<(i64, &str), _>(&[1, 2], Vec::new(), |r| Some(r.0), "food");
        assert!(matched.is_empty());
    }

    #[test]
    fn test_renumbered_batch_pairs_by_position() {
        let responses = vec![(1, "a"), (2, "b"), (3, "c")];
        let matched = match_responses(&[41, 42, 43], responses, |r| Some(r.0), "food");
        assert_eq!(ids(&matched), vec![(41, "a"), (42, "b"), (43, "c")]);
    }

    #[test]
    fn test_batch_without_ids_pairs_by_position() {
        let responses = vec![(0, "a"), (0, "b")];
        let matched = match_responses(&[7, 8], responses, |_| None, "wine");
        assert_eq!(ids(&matched), vec![(7, "a"), (8, "b")]);
    }

    #[test]
    fn test_unmatched_batch_of_different_size_is_dropped() {
        let responses = vec![(1, "a"), (2, "b")];
        let matched = match_responses(&[41, 42, 43], responses, |r| Some(r.0), "food");
        assert!(matched.is_empty());
    }

    #[test]
    fn test_partial_ids_keep_matching_by_id() {
        let responses = vec![(0, "anonymous"), (20, "b")];
        let matched = match_responses(
            &[10, 20],
            responses,
            |r| (r.0 != 0).then_some(r.0),
            "food",
        );
        assert_eq!(ids(&matched), vec![(20, "b")]);
    }
}
