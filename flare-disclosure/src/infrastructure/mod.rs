pub mod clock;
pub mod external;
pub mod persistence;
