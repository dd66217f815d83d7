pub mod errors;
pub mod ocpi_status;
pub mod pagination;
pub mod shutdown;
pub mod token;
pub mod validations;

pub use errors::*;
pub use ocpi_status::*;
pub use pagination::*;
pub use shutdown::*;
pub use validations::*;
