//! Terminal presentation helpers.

pub mod progress;

pub use progress::{create_progress_bar, create_spinner, file_progress, with_spinner};
