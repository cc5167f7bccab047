use anyhow::Result;
use randotrack::evaluate::Evaluator;
use randotrack::readable::ItemColor;
use randotrack::settings::TrackerSettings;
use randotrack::state::TrackerState;
use randotrack_game::{GameData, LocationFilter};

// A small world: one open-air island, one key-gated dungeon, one location
// gated on having reached another, and a final boss check.
const FIXTURE: &str = r#"{
    "items": {
        "Progressive Sword": 4,
        "Empty Bottle": 4,
        "Hookshot": 1,
        "Grappling Hook": 1,
        "Deku Leaf": 1,
        "Wind Waker": 1,
        "DRC Small Key": 4,
        "DRC Big Key": 1
    },
    "locations": [
        {
            "name": "Windfall Island",
            "locations": [
                { "name": "Jail", "need": "Wind Waker", "progress": true },
                { "name": "Bottle Merchant", "need": "Empty Bottle x1", "progress": true },
                {
                    "name": "Lighthouse",
                    "need": { "or": ["Hookshot", "Grappling Hook"] },
                    "progress": true
                },
                {
                    "name": "Sword Training",
                    "need": { "and": ["Progressive Sword", "Empty Bottle x1"] },
                    "progress": true
                },
                { "name": "Postbox", "need": "Nothing", "progress": false }
            ]
        },
        {
            "name": "Dragon Roost Cavern",
            "locations": [
                {
                    "name": "First Chest",
                    "need": "Grappling Hook",
                    "progress": true,
                    "dungeon": true
                },
                {
                    "name": "Gated Chest",
                    "need": { "and": ["Grappling Hook", "DRC Small Key x1"] },
                    "progress": true,
                    "dungeon": true
                },
                {
                    "name": "Big Key Chest",
                    "need": { "and": ["Grappling Hook", "DRC Small Key x2"] },
                    "progress": true,
                    "dungeon": true
                },
                {
                    "name": "Deep Chest",
                    "need": { "and": ["Grappling Hook", "Deku Leaf", "DRC Small Key x3"] },
                    "progress": true,
                    "dungeon": true
                },
                {
                    "name": "Gohma Heart Container",
                    "need": { "and": ["Grappling Hook", "DRC Big Key"] },
                    "progress": true,
                    "dungeon": true
                }
            ]
        },
        {
            "name": "Forsaken Fortress",
            "locations": [
                {
                    "name": "Guarded Chest",
                    "need": "Has Accessed Other Location \"Windfall Island/Bottle Merchant\"",
                    "progress": true
                }
            ]
        },
        {
            "name": "Ganon's Tower",
            "locations": [
                {
                    "name": "Defeat Ganondorf",
                    "need": { "and": ["Progressive Sword x4", "Hookshot"] },
                    "progress": true
                }
            ]
        }
    ],
    "entrances": [
        { "name": "Dragon Roost Cavern", "need": "Grappling Hook" }
    ],
    "dungeons": [
        {
            "name": "Dragon Roost Cavern",
            "maxSmallKeys": 4,
            "smallKey": "DRC Small Key",
            "bigKey": "DRC Big Key",
            "mainDungeon": true,
            "keyLocations": {
                "First Chest": 0,
                "Gated Chest": 1,
                "Big Key Chest": 2,
                "Deep Chest": 3
            }
        }
    ],
    "finalLocation": "Ganon's Tower/Defeat Ganondorf"
}"#;

fn fixture_game_data() -> Result<GameData> {
    Ok(GameData::from_json(&json::parse(FIXTURE)?)?)
}

#[test]
fn test_item_count_requirement() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();

    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(!evaluator.is_location_available("Windfall Island", "Bottle Merchant"));
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Bottle Merchant"),
        1
    );

    let state = TrackerState::new().with_item_count("Empty Bottle", 2);
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(evaluator.is_location_available("Windfall Island", "Bottle Merchant"));
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Bottle Merchant"),
        0
    );
    Ok(())
}

#[test]
fn test_and_distance_is_sum_of_children() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // Sword Training needs a sword and a bottle; holding neither costs 2.
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Sword Training"),
        2
    );
    Ok(())
}

#[test]
fn test_or_distance_is_max_of_children() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();

    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Lighthouse"),
        1
    );

    // One alternative in hand satisfies the OR even though the distance
    // metric still reports the other branch.
    let state = TrackerState::new().with_item_count("Hookshot", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(evaluator.is_location_available("Windfall Island", "Lighthouse"));
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Lighthouse"),
        1
    );
    Ok(())
}

#[test]
fn test_checked_location_is_trivially_satisfied() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new().with_location_checked("Windfall Island", "Sword Training");
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    assert!(evaluator.is_location_available("Windfall Island", "Sword Training"));
    assert_eq!(
        evaluator.items_remaining_for_location("Windfall Island", "Sword Training"),
        0
    );
    Ok(())
}

#[test]
fn test_cross_location_requirement() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();

    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(!evaluator.is_location_available("Forsaken Fortress", "Guarded Chest"));
    assert_eq!(
        evaluator.items_remaining_for_location("Forsaken Fortress", "Guarded Chest"),
        1
    );

    let state = TrackerState::new().with_item_count("Empty Bottle", 2);
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(evaluator.is_location_available("Forsaken Fortress", "Guarded Chest"));

    // Checking the referenced location satisfies the reference outright.
    let state = TrackerState::new().with_location_checked("Windfall Island", "Bottle Merchant");
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(evaluator.is_location_available("Forsaken Fortress", "Guarded Chest"));
    assert_eq!(
        evaluator.items_remaining_for_location("Forsaken Fortress", "Guarded Chest"),
        0
    );
    Ok(())
}

#[test]
fn test_items_needed_to_finish_game_monotonic() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();

    let states = [
        TrackerState::new(),
        TrackerState::new().with_item_count("Progressive Sword", 2),
        TrackerState::new().with_item_count("Progressive Sword", 4),
        TrackerState::new()
            .with_item_count("Progressive Sword", 4)
            .with_item_count("Hookshot", 1),
    ];
    let needed: Vec<i32> = states
        .iter()
        .map(|state| Evaluator::new(&game_data, &settings, state).items_needed_to_finish_game())
        .collect();
    assert_eq!(needed, vec![5, 3, 1, 0]);
    Ok(())
}

#[test]
fn test_guaranteed_keys_without_any_access() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // First Chest is keyless but unreachable, so nothing is guaranteed.
    assert_eq!(evaluator.current_item_value("DRC Small Key"), 0);
    assert_eq!(evaluator.current_item_value("DRC Big Key"), 0);
    assert!(!evaluator.is_location_available("Dragon Roost Cavern", "Gated Chest"));
    Ok(())
}

#[test]
fn test_guaranteed_keys_with_constraining_location() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    // Deep Chest still needs the Deku Leaf, so only 3 small keys are
    // guaranteed and the big key guarantee is lost.
    let state = TrackerState::new().with_item_count("Grappling Hook", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    assert_eq!(evaluator.current_item_value("DRC Small Key"), 3);
    assert_eq!(evaluator.current_item_value("DRC Big Key"), 0);
    assert!(evaluator.is_location_available("Dragon Roost Cavern", "Gated Chest"));
    assert!(evaluator.is_location_available("Dragon Roost Cavern", "Big Key Chest"));
    assert!(!evaluator.is_location_available("Dragon Roost Cavern", "Deep Chest"));
    assert!(!evaluator.is_location_available("Dragon Roost Cavern", "Gohma Heart Container"));
    Ok(())
}

#[test]
fn test_guaranteed_keys_with_all_key_locations_reachable() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new()
        .with_item_count("Grappling Hook", 1)
        .with_item_count("Deku Leaf", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // Every potential key location is reachable once keys are assumed, so
    // the full key complement is guaranteed, big key included.
    assert_eq!(evaluator.current_item_value("DRC Small Key"), 4);
    assert_eq!(evaluator.current_item_value("DRC Big Key"), 1);
    assert!(evaluator.is_location_available("Dragon Roost Cavern", "Deep Chest"));
    assert!(evaluator.is_location_available("Dragon Roost Cavern", "Gohma Heart Container"));
    Ok(())
}

#[test]
fn test_key_lunacy_disables_guaranteed_keys() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings {
        key_lunacy: true,
        ..TrackerSettings::default()
    };
    let state = TrackerState::new()
        .with_item_count("Grappling Hook", 1)
        .with_item_count("Deku Leaf", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    assert_eq!(evaluator.current_item_value("DRC Small Key"), 0);
    assert!(!evaluator.is_location_available("Dragon Roost Cavern", "Gated Chest"));
    Ok(())
}

#[test]
fn test_guaranteed_keys_never_lower_held_counts() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new()
        .with_item_count("Grappling Hook", 1)
        .with_item_count("DRC Small Key", 4);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // The inference would only guarantee 3, but 4 are already held.
    assert!(evaluator.current_item_value("DRC Small Key") >= state.get_item_value("DRC Small Key"));
    assert_eq!(evaluator.current_item_value("DRC Small Key"), 4);
    Ok(())
}

#[test]
fn test_entrance_availability() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();

    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(!evaluator.is_entrance_available("Dragon Roost Cavern"));

    let state = TrackerState::new().with_item_count("Grappling Hook", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    assert!(evaluator.is_entrance_available("Dragon Roost Cavern"));
    Ok(())
}

#[test]
fn test_location_counts() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    let filter = LocationFilter::default();

    // Only the Postbox is available, and it isn't a progress location.
    let counts = evaluator.location_counts("Windfall Island", &filter, false);
    assert_eq!(counts.num_available, 1);
    assert_eq!(counts.num_remaining, 5);
    assert_eq!(counts.color.to_string(), "non-progress-location");

    let counts = evaluator.location_counts("Forsaken Fortress", &filter, false);
    assert_eq!(counts.num_available, 0);
    assert_eq!(counts.color.to_string(), "unavailable-location");

    // Disabling logic makes every unchecked location count as available.
    let counts = evaluator.location_counts("Windfall Island", &filter, true);
    assert_eq!(counts.num_available, 5);
    assert_eq!(counts.color.to_string(), "available-location");

    let progress_filter = LocationFilter {
        is_dungeon: None,
        only_progress: true,
    };
    let counts = evaluator.location_counts("Windfall Island", &progress_filter, false);
    assert_eq!(counts.num_remaining, 4);
    assert_eq!(counts.num_available, 0);

    let state = TrackerState::new().with_location_checked("Forsaken Fortress", "Guarded Chest");
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    let counts = evaluator.location_counts("Forsaken Fortress", &filter, false);
    assert_eq!(counts.num_remaining, 0);
    assert_eq!(counts.color.to_string(), "checked-location");
    Ok(())
}

#[test]
fn test_totals_exclude_final_location() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // 12 detailed locations in the fixture, minus the final check.
    assert_eq!(evaluator.total_locations_remaining(false), 11);
    assert_eq!(evaluator.total_locations_remaining(true), 10);
    assert_eq!(evaluator.total_locations_checked(false), 0);

    let state = TrackerState::new()
        .with_location_checked("Windfall Island", "Postbox")
        .with_location_checked("Ganon's Tower", "Defeat Ganondorf");
    let evaluator = Evaluator::new(&game_data, &settings, &state);
    // Checking the final location changes no totals; only the Postbox counts.
    assert_eq!(evaluator.total_locations_checked(false), 1);
    assert_eq!(evaluator.total_locations_checked(true), 0);
    assert_eq!(evaluator.total_locations_remaining(false), 10);
    Ok(())
}

#[test]
fn test_estimated_locations_left_to_check() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    // 10 progress locations remain and 2 items are still needed to finish
    // (one more sword, plus the Hookshot).
    let state = TrackerState::new().with_item_count("Progressive Sword", 3);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    assert_eq!(evaluator.total_locations_remaining(true), 10);
    assert_eq!(evaluator.items_needed_to_finish_game(), 2);
    // round(2 * 11 / 3) = 7
    assert_eq!(evaluator.estimated_locations_left_to_check(), 7);
    Ok(())
}

#[test]
fn test_formatted_requirements_for_and() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new();
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // A top-level AND renders as one clause per child.
    let clauses = evaluator.formatted_requirements_for_location("Windfall Island", "Sword Training");
    assert_eq!(clauses.len(), 2);
    for clause in &clauses {
        assert_eq!(clause.len(), 1);
        assert_eq!(clause[0].color, ItemColor::UnavailableItem);
    }
    let texts: Vec<&str> = clauses.iter().map(|c| c[0].text.as_str()).collect();
    assert_eq!(texts, vec!["Progressive Sword", "Empty Bottle x1"]);
    Ok(())
}

#[test]
fn test_formatted_requirements_for_or() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new().with_item_count("Hookshot", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    let clauses = evaluator.formatted_requirements_for_location("Windfall Island", "Lighthouse");
    assert_eq!(clauses.len(), 1);
    let clause = &clauses[0];
    // The held alternative sorts first; the other can no longer matter.
    assert_eq!(clause[0].text, "Hookshot");
    assert_eq!(clause[0].color, ItemColor::AvailableItem);
    assert_eq!(clause[1].text, "or");
    assert_eq!(clause[1].color, ItemColor::PlainText);
    assert_eq!(clause[2].text, "Grappling Hook");
    assert_eq!(clause[2].color, ItemColor::InconsequentialItem);
    Ok(())
}

#[test]
fn test_formatted_requirements_all_satisfied() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new()
        .with_item_count("Hookshot", 1)
        .with_item_count("Grappling Hook", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    let clauses = evaluator.formatted_requirements_for_location("Windfall Island", "Lighthouse");
    for clause in &clauses {
        for token in clause {
            assert_ne!(token.color, ItemColor::UnavailableItem);
            assert_ne!(token.color, ItemColor::InconsequentialItem);
        }
    }
    Ok(())
}

#[test]
fn test_repeated_queries_are_consistent() -> Result<()> {
    let game_data = fixture_game_data()?;
    let settings = TrackerSettings::default();
    let state = TrackerState::new().with_item_count("Grappling Hook", 1);
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    // Second query comes from the cache and must agree with the first,
    // including the guaranteed-key override applied at construction.
    for _ in 0..2 {
        assert!(evaluator.is_location_available("Dragon Roost Cavern", "Gated Chest"));
        assert_eq!(
            evaluator.items_remaining_for_location("Dragon Roost Cavern", "Deep Chest"),
            1
        );
    }
    Ok(())
}
