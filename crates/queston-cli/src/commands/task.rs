use chrono::{DateTime, Utc};
use clap::Subcommand;
use queston_core::timer::plan_cycle;
use queston_core::{Config, Database, SessionStore, TaskAugmentation};
use serde_json::json;

use super::common::print_json;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a task
    Add {
        /// Task title
        title: String,
        /// Size estimate in minutes
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// List tasks for the configured user
    List,
    /// Print a task with its augmentations and sessions
    Show {
        /// Task ID
        id: i64,
    },
    /// Attach productivity-approach params to a task
    Augment {
        /// Task ID
        id: i64,
        #[command(subcommand)]
        approach: AugmentAction,
    },
    /// Slice a task's estimate into focus and break phases
    Plan {
        /// Task ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum AugmentAction {
    /// Put the task on the calendar
    Calendar {
        /// Scheduled start, RFC 3339
        #[arg(long)]
        at: String,
        /// Slot length in minutes
        #[arg(long)]
        duration: u32,
    },
    /// GTD context and next action
    Gtd {
        #[arg(long)]
        context: String,
        #[arg(long)]
        next_action: String,
    },
    /// Eisenhower matrix quadrant
    Eisenhower {
        #[arg(long)]
        urgent: bool,
        #[arg(long)]
        important: bool,
    },
    /// Eat-the-frog ranking
    Frog {
        /// Perceived difficulty, 1-5
        #[arg(long)]
        difficulty: u8,
        /// Mark as the day's frog
        #[arg(long)]
        frog: bool,
    },
}

impl AugmentAction {
    fn into_augmentation(self) -> Result<TaskAugmentation, Box<dyn std::error::Error>> {
        Ok(match self {
            Self::Calendar { at, duration } => TaskAugmentation::Calendar {
                scheduled_at: DateTime::parse_from_rfc3339(&at)?.with_timezone(&Utc),
                duration_min: duration,
            },
            Self::Gtd {
                context,
                next_action,
            } => TaskAugmentation::Gtd {
                context,
                next_action,
            },
            Self::Eisenhower { urgent, important } => {
                TaskAugmentation::Eisenhower { urgent, important }
            }
            Self::Frog { difficulty, frog } => TaskAugmentation::Frog {
                difficulty,
                is_frog: frog,
            },
        })
    }
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;

    match action {
        TaskAction::Add { title, estimate } => {
            let id = db.insert_task(config.user_id, &title, estimate, Utc::now())?;
            let task = db
                .find_task(id)?
                .ok_or("task vanished right after insert")?;
            print_json(&task)?;
        }
        TaskAction::List => {
            print_json(&db.list_tasks(config.user_id)?)?;
        }
        TaskAction::Show { id } => {
            let task = db.find_task(id)?.ok_or_else(|| format!("no task {id}"))?;
            let augmentations = db.augmentations_for_task(id)?;
            let sessions = db.sessions_for_task(config.user_id, id)?;
            print_json(&json!({
                "task": task,
                "augmentations": augmentations,
                "sessions": sessions,
            }))?;
        }
        TaskAction::Augment { id, approach } => {
            db.find_task(id)?.ok_or_else(|| format!("no task {id}"))?;
            let augmentation = approach.into_augmentation()?;
            db.upsert_augmentation(id, &augmentation)?;
            print_json(&augmentation)?;
        }
        TaskAction::Plan { id } => {
            let task = db.find_task(id)?.ok_or_else(|| format!("no task {id}"))?;
            let estimate = task
                .estimate_min
                .ok_or("task has no estimate; set one with `task add --estimate`")?;
            let settings = config.pomodoro_settings();
            print_json(&plan_cycle(&settings, estimate))?;
        }
    }
    Ok(())
}
