pub mod command_handler;
pub mod query_handler;

pub use command_handler::DisclosureCommandHandler;
pub use query_handler::DisclosureQueryHandler;
