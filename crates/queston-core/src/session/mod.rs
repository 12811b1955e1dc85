//! Session recording and startup rehydration.

mod recorder;
mod rehydrate;

pub use recorder::{RecordHandle, SessionRecorder};
pub use rehydrate::{rehydrate, Rehydration};
