pub mod model;

pub use model::{Authorization, Transaction};
