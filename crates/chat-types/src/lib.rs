pub mod message;
pub mod envelope;
pub mod session;
pub mod config;
pub mod i18n;
pub mod error;

#[cfg(test)]
mod tests;

pub use error::ChatError;
pub type Result<T> = std::result::Result<T, ChatError>;
