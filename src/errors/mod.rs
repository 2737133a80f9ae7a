mod types;

pub use types::GatecheckError;
