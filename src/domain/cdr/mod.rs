pub mod model;

pub use model::Cdr;
