use clap::Subcommand;
use queston_core::{Config, Database};

use super::common::print_json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        StatsAction::Today => print_json(&db.stats_today(config.user_id)?)?,
        StatsAction::All => print_json(&db.stats_all(config.user_id)?)?,
    }
    Ok(())
}
