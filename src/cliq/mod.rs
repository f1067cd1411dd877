pub mod client;
pub mod flow;
pub mod token;

/// Integration name used as the credential-store key for Cliq
pub const INTEGRATION: &str = "cliq";
