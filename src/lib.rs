// Library surface: the task engine and everything the binary and the
// integration tests share. Rendering and the app state machine stay in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod result;
pub mod runtime;
pub mod sequence;
pub mod store;
pub mod util;

pub use config::{Pacing, TaskConfig};
pub use engine::{Phase, RunState, TaskEngine};
pub use error::NBackError;
pub use events::{ListenerId, TaskEvent, TaskListener};
pub use result::{ResultLog, SummaryStats, TickResult};
pub use sequence::Sequence;
