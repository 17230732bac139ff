pub mod scheduler;

pub use scheduler::{RevealScheduler, RevealSchedulerConfig, SchedulerHealth, TickReport};
