use std::cell::{Cell, RefCell};
use std::cmp::max;
use std::hash::Hash;

use hashbrown::HashMap;
use serde::Serialize;

use randotrack_game::{Dungeon, Folded, GameData, ItemCount, LocationFilter, Requirement};

use crate::readable::{self, LocationColor, RequirementToken};
use crate::settings::TrackerSettings;
use crate::state::TrackerState;

/// Answers reachability queries for one immutable tracker snapshot: which
/// locations and entrances are available, how many more items are needed to
/// reach a spot, and the aggregate counts shown on the map. Construct a new
/// evaluator whenever held items or checked locations change.
pub struct Evaluator<'a> {
    game_data: &'a GameData,
    settings: &'a TrackerSettings,
    state: &'a TrackerState,
    // Item name -> guaranteed minimum count, for small/big keys. Only ever
    // raises the snapshot's raw count, never lowers it.
    guaranteed_keys: HashMap<String, ItemCount>,
    cache: EvalCache,
}

// Two-phase lifecycle: the caches stay disabled while the constructor runs
// guaranteed-key inference, so no result computed before the key table
// exists can be served afterwards. Queries only start filling the maps once
// construction has finished.
#[derive(Default)]
struct EvalCache {
    enabled: Cell<bool>,
    location_available: RefCell<HashMap<(String, String), bool>>,
    location_remaining: RefCell<HashMap<(String, String), ItemCount>>,
    entrance_available: RefCell<HashMap<String, bool>>,
    formatted_location: RefCell<HashMap<(String, String), Vec<Vec<RequirementToken>>>>,
    formatted_entrance: RefCell<HashMap<String, Vec<Vec<RequirementToken>>>>,
    totals_checked: RefCell<HashMap<bool, usize>>,
    totals_available: RefCell<HashMap<bool, usize>>,
    totals_remaining: RefCell<HashMap<bool, usize>>,
    items_needed: Cell<Option<ItemCount>>,
    estimated_left: Cell<Option<usize>>,
}

impl EvalCache {
    fn get_or_insert_with<K, V>(
        map: &RefCell<HashMap<K, V>>,
        enabled: bool,
        key: K,
        compute: impl FnOnce() -> V,
    ) -> V
    where
        K: Eq + Hash,
        V: Clone,
    {
        if !enabled {
            return compute();
        }
        if let Some(value) = map.borrow().get(&key) {
            return value.clone();
        }
        let value = compute();
        map.borrow_mut().insert(key, value.clone());
        value
    }
}

/// Summary of one general location's unchecked/available checks, with the
/// color class the map shows for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocationCounts {
    pub color: LocationColor,
    pub num_available: usize,
    pub num_remaining: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        game_data: &'a GameData,
        settings: &'a TrackerSettings,
        state: &'a TrackerState,
    ) -> Self {
        let mut evaluator = Evaluator {
            game_data,
            settings,
            state,
            guaranteed_keys: HashMap::new(),
            cache: EvalCache::default(),
        };
        evaluator.set_guaranteed_keys();
        evaluator.cache.enabled.set(true);
        evaluator
    }

    pub fn is_location_available(&self, general: &str, detailed: &str) -> bool {
        EvalCache::get_or_insert_with(
            &self.cache.location_available,
            self.cache.enabled.get(),
            (general.to_string(), detailed.to_string()),
            || self.location_available_uncached(general, detailed),
        )
    }

    pub fn is_entrance_available(&self, name: &str) -> bool {
        EvalCache::get_or_insert_with(
            &self.cache.entrance_available,
            self.cache.enabled.get(),
            name.to_string(),
            || self.are_requirements_met(self.game_data.requirements_for_entrance(name)),
        )
    }

    /// How many more item units are needed before this location's
    /// requirement is satisfied; 0 if it is satisfied now or already checked.
    pub fn items_remaining_for_location(&self, general: &str, detailed: &str) -> ItemCount {
        EvalCache::get_or_insert_with(
            &self.cache.location_remaining,
            self.cache.enabled.get(),
            (general.to_string(), detailed.to_string()),
            || self.location_remaining_uncached(general, detailed),
        )
    }

    pub fn items_needed_to_finish_game(&self) -> ItemCount {
        if let Some(needed) = self.cache.items_needed.get() {
            return needed;
        }
        let needed = self.items_remaining_for_location(
            &self.game_data.final_general_location,
            &self.game_data.final_detailed_location,
        );
        if self.cache.enabled.get() {
            self.cache.items_needed.set(Some(needed));
        }
        needed
    }

    pub fn formatted_requirements_for_location(
        &self,
        general: &str,
        detailed: &str,
    ) -> Vec<Vec<RequirementToken>> {
        EvalCache::get_or_insert_with(
            &self.cache.formatted_location,
            self.cache.enabled.get(),
            (general.to_string(), detailed.to_string()),
            || {
                readable::format_requirements(
                    self,
                    self.game_data.requirements_for_location(general, detailed),
                )
            },
        )
    }

    pub fn formatted_requirements_for_entrance(&self, name: &str) -> Vec<Vec<RequirementToken>> {
        EvalCache::get_or_insert_with(
            &self.cache.formatted_entrance,
            self.cache.enabled.get(),
            name.to_string(),
            || readable::format_requirements(self, self.game_data.requirements_for_entrance(name)),
        )
    }

    pub fn location_counts(
        &self,
        general: &str,
        filter: &LocationFilter,
        disable_logic: bool,
    ) -> LocationCounts {
        let mut any_progress = false;
        let mut num_available = 0;
        let mut num_remaining = 0;
        for loc in self.game_data.filter_detailed_locations(general, filter) {
            if self.state.is_location_checked(general, &loc.name) {
                continue;
            }
            if disable_logic || self.is_location_available(general, &loc.name) {
                num_available += 1;
                if loc.is_progress {
                    any_progress = true;
                }
            }
            num_remaining += 1;
        }
        LocationCounts {
            color: location_counts_color(num_available, num_remaining, any_progress),
            num_available,
            num_remaining,
        }
    }

    pub fn total_locations_checked(&self, only_progress: bool) -> usize {
        EvalCache::get_or_insert_with(
            &self.cache.totals_checked,
            self.cache.enabled.get(),
            only_progress,
            || {
                self.count_locations_by(only_progress, |general, detailed| {
                    self.state.is_location_checked(general, detailed)
                })
            },
        )
    }

    pub fn total_locations_available(&self, only_progress: bool) -> usize {
        EvalCache::get_or_insert_with(
            &self.cache.totals_available,
            self.cache.enabled.get(),
            only_progress,
            || {
                self.count_locations_by(only_progress, |general, detailed| {
                    !self.state.is_location_checked(general, detailed)
                        && self.is_location_available(general, detailed)
                })
            },
        )
    }

    pub fn total_locations_remaining(&self, only_progress: bool) -> usize {
        EvalCache::get_or_insert_with(
            &self.cache.totals_remaining,
            self.cache.enabled.get(),
            only_progress,
            || {
                self.count_locations_by(only_progress, |general, detailed| {
                    !self.state.is_location_checked(general, detailed)
                })
            },
        )
    }

    /// Expected number of checks left before the last required item is
    /// found, assuming the remaining items are uniformly distributed over
    /// the remaining progress checks. A progress indicator, not a logic
    /// guarantee.
    pub fn estimated_locations_left_to_check(&self) -> usize {
        if let Some(estimated) = self.cache.estimated_left.get() {
            return estimated;
        }
        let locations_remaining = self.total_locations_remaining(true) as f64;
        // There can't be more items remaining than locations remaining
        // unless the tracker is used incorrectly, so we apply a maximum to
        // make sure the formula always works.
        let items_remaining = f64::min(
            self.items_needed_to_finish_game() as f64,
            locations_remaining,
        );
        // Expected value for draws without replacement:
        let estimated =
            (items_remaining * (locations_remaining + 1.0) / (items_remaining + 1.0)).round()
                as usize;
        if self.cache.enabled.get() {
            self.cache.estimated_left.set(Some(estimated));
        }
        estimated
    }

    /// The snapshot's count for an item, after the guaranteed-key override.
    pub fn current_item_value(&self, item_name: &str) -> ItemCount {
        if let Some(&guaranteed) = self.guaranteed_keys.get(item_name) {
            return guaranteed;
        }
        self.state.get_item_value(item_name)
    }

    /// Satisfaction for an atomic requirement: no more item units needed.
    pub fn is_requirement_met(&self, requirement: &Requirement) -> bool {
        self.items_remaining_for_atom(requirement) == 0
    }

    pub fn items_remaining_for_requirement(&self, requirement: &Requirement) -> ItemCount {
        requirement.reduce(
            0,
            &|acc, folded| {
                acc + match folded {
                    Folded::Reduced(value) => value,
                    Folded::Atom(atom) => self.items_remaining_for_atom(atom),
                }
            },
            0,
            &|acc, folded| {
                max(
                    acc,
                    match folded {
                        Folded::Reduced(value) => value,
                        Folded::Atom(atom) => self.items_remaining_for_atom(atom),
                    },
                )
            },
        )
    }

    fn items_remaining_for_atom(&self, atom: &Requirement) -> ItemCount {
        match atom {
            Requirement::Impossible => 1,
            Requirement::Nothing => 0,
            Requirement::ItemCount { name, count } => {
                max(count - self.current_item_value(name), 0)
            }
            Requirement::Item(name) => {
                if self.current_item_value(name) > 0 {
                    0
                } else {
                    1
                }
            }
            Requirement::HasAccessedLocation { general, detailed } => {
                self.items_remaining_for_location(general, detailed)
            }
            Requirement::And(_) | Requirement::Or(_) => {
                self.items_remaining_for_requirement(atom)
            }
        }
    }

    fn are_requirements_met(&self, requirement: &Requirement) -> bool {
        requirement.evaluate(&|atom| self.is_requirement_met(atom))
    }

    fn location_available_uncached(&self, general: &str, detailed: &str) -> bool {
        if self.state.is_location_checked(general, detailed) {
            return true;
        }
        self.are_requirements_met(self.game_data.requirements_for_location(general, detailed))
    }

    fn location_remaining_uncached(&self, general: &str, detailed: &str) -> ItemCount {
        if self.state.is_location_checked(general, detailed) {
            return 0;
        }
        self.items_remaining_for_requirement(
            self.game_data.requirements_for_location(general, detailed),
        )
    }

    fn count_locations_by(&self, only_progress: bool, counted: impl Fn(&str, &str) -> bool) -> usize {
        let filter = LocationFilter {
            is_dungeon: None,
            only_progress,
        };
        let mut total = 0;
        for general in self.game_data.general_locations() {
            for loc in self.game_data.filter_detailed_locations(&general.name, &filter) {
                // The final check is tracked separately, via
                // items_needed_to_finish_game:
                if general.name == self.game_data.final_general_location
                    && loc.name == self.game_data.final_detailed_location
                {
                    continue;
                }
                if counted(&general.name, &loc.name) {
                    total += 1;
                }
            }
        }
        total
    }

    fn set_guaranteed_keys(&mut self) {
        let game_data = self.game_data;
        for key_name in game_data.key_names() {
            let raw = self.state.get_item_value(key_name);
            self.guaranteed_keys.insert(key_name.to_string(), raw);
        }
        if self.settings.key_lunacy {
            return;
        }
        for dungeon in &game_data.dungeons {
            if !dungeon.is_main_dungeon {
                continue;
            }
            let (guaranteed_small_keys, guaranteed_big_keys) =
                self.guaranteed_keys_for_dungeon(dungeon);
            if guaranteed_small_keys > self.guaranteed_keys[dungeon.small_key_name.as_str()] {
                self.guaranteed_keys
                    .insert(dungeon.small_key_name.clone(), guaranteed_small_keys);
            }
            if guaranteed_big_keys > self.guaranteed_keys[dungeon.big_key_name.as_str()] {
                self.guaranteed_keys
                    .insert(dungeon.big_key_name.clone(), guaranteed_big_keys);
            }
        }
    }

    // A single conservative pass, not a fixed point: the hardest-to-reach
    // key-gated spot still reachable only through keys bounds how many keys
    // the player is assured to have collected in this dungeon.
    fn guaranteed_keys_for_dungeon(&self, dungeon: &Dungeon) -> (ItemCount, ItemCount) {
        let mut guaranteed_small_keys = dungeon.max_small_keys;
        let mut guaranteed_big_keys = 1;
        for loc in self.game_data.detailed_locations(&dungeon.name) {
            if dungeon.is_potential_key_location(&loc.name)
                && !self.non_key_requirements_met(dungeon, &loc.name)
            {
                let small_keys_required = dungeon.small_keys_required(&loc.name);
                if small_keys_required < guaranteed_small_keys {
                    guaranteed_small_keys = small_keys_required;
                }
                guaranteed_big_keys = 0;
            }
        }
        (guaranteed_small_keys, guaranteed_big_keys)
    }

    fn non_key_requirements_met(&self, dungeon: &Dungeon, detailed: &str) -> bool {
        if self.location_available_uncached(&dungeon.name, detailed) {
            return true;
        }
        let requirement = self.game_data.requirements_for_location(&dungeon.name, detailed);
        requirement.evaluate(&|atom| {
            if atom_references_item(atom, &dungeon.small_key_name) {
                return true; // assume we have all small keys
            }
            self.is_requirement_met(atom)
        })
    }
}

fn atom_references_item(atom: &Requirement, item_name: &str) -> bool {
    match atom {
        Requirement::Item(name) => name == item_name,
        Requirement::ItemCount { name, .. } => name == item_name,
        _ => false,
    }
}

fn location_counts_color(
    num_available: usize,
    num_remaining: usize,
    any_progress: bool,
) -> LocationColor {
    if num_remaining == 0 {
        LocationColor::CheckedLocation
    } else if num_available == 0 {
        LocationColor::UnavailableLocation
    } else if any_progress {
        LocationColor::AvailableLocation
    } else {
        LocationColor::NonProgressLocation
    }
}
