pub mod api;

pub use api::{BlogApi, ImageSource};
