use std::sync::Arc;

use queston_core::{
    Config, ConfigSettings, Database, PomodoroService, SystemClock,
};

/// Open the service on the on-disk database for the configured user.
///
/// Rehydration runs here, so an interrupted session may already be
/// finalized by the time the command sees the timer.
pub fn open_service(
) -> Result<PomodoroService<Database, ConfigSettings>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    tracing::debug!(user_id = config.user_id, "opening service");
    let service = PomodoroService::new(db, ConfigSettings, Arc::new(SystemClock), config.user_id)?;
    Ok(service)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
