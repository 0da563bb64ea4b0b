//! Domain model types.

pub mod note;
