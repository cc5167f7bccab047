use hashbrown::{HashMap, HashSet};
use randotrack_game::ItemCount;
use serde::{Deserialize, Serialize};

/// A snapshot of tracker progress: items currently held and locations
/// already checked. Immutable as far as the evaluator is concerned; the
/// `with_*` builders produce the next snapshot, and a new `Evaluator` is
/// constructed for it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(default)]
    pub items: HashMap<String, ItemCount>,
    // General location name -> detailed locations checked there:
    #[serde(default)]
    pub checked_locations: HashMap<String, HashSet<String>>,
}

impl TrackerState {
    pub fn new() -> Self {
        TrackerState::default()
    }

    pub fn get_item_value(&self, item_name: &str) -> ItemCount {
        self.items.get(item_name).copied().unwrap_or(0)
    }

    pub fn is_location_checked(&self, general: &str, detailed: &str) -> bool {
        self.checked_locations
            .get(general)
            .is_some_and(|checked| checked.contains(detailed))
    }

    #[must_use]
    pub fn with_item_count(mut self, item_name: &str, count: ItemCount) -> Self {
        self.items.insert(item_name.to_string(), count);
        self
    }

    #[must_use]
    pub fn with_location_checked(mut self, general: &str, detailed: &str) -> Self {
        self.checked_locations
            .entry(general.to_string())
            .or_default()
            .insert(detailed.to_string());
        self
    }
}
