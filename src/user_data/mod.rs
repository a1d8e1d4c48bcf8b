mod generator;

pub use generator::{generate_user_data, COMPLETION_MARKER};
