use anyhow::{Context, Result};
use clap::Parser;
use randotrack::evaluate::Evaluator;
use randotrack::settings::TrackerSettings;
use randotrack::state::TrackerState;
use randotrack_game::{split_location_name, GameData, LocationFilter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
struct Args {
    #[arg(long)]
    logic: PathBuf,

    #[arg(long)]
    state: Option<PathBuf>,

    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the requirement explanation for one location, given as
    /// "General Location/Detailed Location".
    #[arg(long)]
    location: Option<String>,
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json_str = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    serde_json::from_str(&json_str).with_context(|| format!("unable to parse {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let game_data = GameData::load(&args.logic)?;
    let state = match &args.state {
        Some(path) => read_json_file(path)?,
        None => TrackerState::new(),
    };
    let settings = match &args.settings {
        Some(path) => read_json_file(path)?,
        None => TrackerSettings::default(),
    };
    let evaluator = Evaluator::new(&game_data, &settings, &state);

    let filter = LocationFilter {
        is_dungeon: None,
        only_progress: settings.only_progress_locations,
    };
    for general in game_data.general_locations() {
        let counts = evaluator.location_counts(&general.name, &filter, settings.disable_logic);
        println!(
            "{:40} {:>3}/{:<3} [{}]",
            general.name, counts.num_available, counts.num_remaining, counts.color
        );
    }
    println!();
    println!(
        "Locations checked:   {}",
        evaluator.total_locations_checked(settings.only_progress_locations)
    );
    println!(
        "Locations available: {}",
        evaluator.total_locations_available(settings.only_progress_locations)
    );
    println!(
        "Locations remaining: {}",
        evaluator.total_locations_remaining(settings.only_progress_locations)
    );
    println!(
        "Items needed to finish:  {}",
        evaluator.items_needed_to_finish_game()
    );
    println!(
        "Estimated checks left:   {}",
        evaluator.estimated_locations_left_to_check()
    );

    if let Some(full_name) = &args.location {
        let (general, detailed) = split_location_name(full_name)?;
        println!();
        println!("{general} - {detailed}:");
        for clause in evaluator.formatted_requirements_for_location(&general, &detailed) {
            let rendered: Vec<String> = clause
                .iter()
                .map(|token| format!("{} <{}>", token.text, token.color))
                .collect();
            println!("  {}", rendered.join(" "));
        }
    }

    Ok(())
}
