//! Application services and the view composition engine.

pub mod compose;
pub mod error;
pub mod repos;
pub mod stream;
pub mod todos;
