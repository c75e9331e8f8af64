//! Category cache
//!
//! Filled from the first successful `/categories` listing and kept for the
//! life of the process. A failed or empty listing leaves the cache unfilled so
//! the next caller tries again.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::models::Category;

#[derive(Debug, Default)]
pub struct CategoryCache {
    categories: RwLock<Option<HashMap<String, Category>>>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a non-empty listing has been cached
    pub fn is_loaded(&self) -> bool {
        self.read(|categories| categories.map(|c| !c.is_empty()).unwrap_or(false))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read(|categories| categories.map(|c| c.contains_key(name)).unwrap_or(false))
    }

    pub fn get(&self, name: &str) -> Option<Category> {
        self.read(|categories| categories.and_then(|c| c.get(name).cloned()))
    }

    pub fn len(&self) -> usize {
        self.read(|categories| categories.map(HashMap::len).unwrap_or(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache the named categories from a listing.
    ///
    /// Returns the number of entries in the listing, or None when the listing
    /// is not a non-empty array. Entries without a name are skipped.
    pub fn fill(&self, listing: &Value) -> Option<usize> {
        let entries = listing.as_array().filter(|entries| !entries.is_empty())?;

        let mut categories = HashMap::new();
        for entry in entries {
            match serde_json::from_value::<Category>(entry.clone()) {
                Ok(category) => match category.name.clone() {
                    Some(name) => {
                        categories.insert(name, category);
                    }
                    None => tracing::warn!("received unknown category \"{}\"", entry),
                },
                Err(_) => tracing::warn!("received unknown category \"{}\"", entry),
            }
        }

        let mut cached = self.categories.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(categories);
        Some(entries.len())
    }

    fn read<T>(&self, f: impl FnOnce(Option<&HashMap<String, Category>>) -> T) -> T {
        let categories = self.categories.read().unwrap_or_else(|e| e.into_inner());
        f(categories.as_ref())
    }
}
