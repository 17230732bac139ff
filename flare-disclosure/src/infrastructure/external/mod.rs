pub mod connection_oracle;

pub use connection_oracle::{InMemoryConnectionOracle, PostgresConnectionOracle};
