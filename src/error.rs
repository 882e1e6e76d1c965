use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set to a production Postgres instance")]
    MissingDatabaseUrl,

    #[error("Invalid {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("Invalid hourly rate: {0}. Must be a finite, non-negative number")]
    InvalidRate(f64),

    #[error("Invalid max connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
}
