pub mod access_rules;
pub mod memory;
pub mod postgres;

pub use access_rules::StorageAccessRules;
pub use memory::InMemoryMessageStore;
pub use postgres::PostgresMessageStore;
