//! Token aggregate (driver authorisation credentials owned by an eMSP)

pub mod model;

pub use model::{Token, TokenType};
