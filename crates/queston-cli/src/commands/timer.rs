use std::time::Duration;

use clap::Subcommand;
use queston_core::timer::{format_mm_ss, project};
use queston_core::{
    ConfigSettings, Database, PomodoroService, Rehydration, SessionPhaseType, TimerState,
};

use super::common::{open_service, print_json};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a phase and return; time accrues by wall clock
    Start {
        /// Task to charge the session against
        #[arg(long)]
        task: Option<i64>,
        /// Phase to start: focus, short_break or long_break
        #[arg(long)]
        phase: Option<String>,
    },
    /// Start (or continue) a phase and tick until it completes
    Run {
        /// Task to charge the session against
        #[arg(long)]
        task: Option<i64>,
        /// Phase to start: focus, short_break or long_break
        #[arg(long)]
        phase: Option<String>,
    },
    /// Advance the timer once, finalizing the phase if its time is up
    Tick,
    /// Abandon the current phase and move to the next one
    Skip,
    /// End the session, resetting the cycle
    Stop,
    /// Print current timer state as JSON
    Status,
}

fn parse_phase(value: Option<String>) -> Result<Option<SessionPhaseType>, Box<dyn std::error::Error>> {
    match value {
        None => Ok(None),
        Some(s) => SessionPhaseType::parse(&s)
            .map(Some)
            .ok_or_else(|| format!("unknown phase: {s}").into()),
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut service = open_service()?;

    if let Rehydration::CompletedWhileAway(record) = service.rehydration() {
        eprintln!(
            "previous {} session finished while away ({})",
            record.phase.label().to_lowercase(),
            format_mm_ss(record.actual_secs),
        );
    }

    match action {
        TimerAction::Start { task, phase } => {
            let snapshot = service.start(task, parse_phase(phase)?)?;
            print_json(&snapshot)?;
        }
        TimerAction::Run { task, phase } => {
            match service.snapshot().state {
                TimerState::Idle => {
                    service.start(task, parse_phase(phase)?)?;
                }
                TimerState::Paused => {
                    service.resume()?;
                }
                TimerState::Running => {}
            }
            tick_until_idle(&mut service)?;
        }
        TimerAction::Tick => {
            match service.tick()? {
                Some(record) => print_json(&record)?,
                None => print_json(&service.snapshot())?,
            }
        }
        TimerAction::Skip => {
            let record = service.skip()?;
            print_json(&record)?;
        }
        TimerAction::Stop => {
            let record = service.stop()?;
            print_json(&record)?;
        }
        TimerAction::Status => {
            print_json(&service.snapshot())?;
        }
    }
    Ok(())
}

/// Drive the timer at one tick per second until it goes idle or the user
/// interrupts. An interrupted run leaves the session row open; the next
/// invocation rehydrates it.
fn tick_until_idle(
    service: &mut PomodoroService<Database, ConfigSettings>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(record) = service.tick()? {
                        eprintln!();
                        print_json(&record)?;
                    }
                    let snapshot = service.snapshot();
                    if snapshot.state == TimerState::Idle {
                        break;
                    }
                    if let Some(notification) = project(&snapshot) {
                        eprint!("\r{}   ", notification.text);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\nsession left open; `timer run` continues it");
                    break;
                }
            }
        }
        Ok(())
    })
}
