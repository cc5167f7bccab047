use serde::{Deserialize, Serialize};

/// Tracker options. `key_lunacy` is consulted exactly once, when an
/// `Evaluator` is constructed; the other flags only shape how callers query
/// the aggregate counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Keys may be placed anywhere, including outside their own dungeon;
    /// disables the guaranteed-key assumption.
    #[serde(default)]
    pub key_lunacy: bool,
    /// Only count locations whose contents can affect overall reachability.
    #[serde(default)]
    pub only_progress_locations: bool,
    /// Treat every unchecked location as available.
    #[serde(default)]
    pub disable_logic: bool,
}
