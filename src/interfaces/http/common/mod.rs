//! Shared HTTP building blocks

mod envelope;
mod validated_json;

pub use envelope::{ApiError, ApiResult, OcpiResponse, Paged};
pub use validated_json::{ValidatedJson, ValidatedJsonRejection};
