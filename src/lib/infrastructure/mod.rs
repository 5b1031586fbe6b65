//! External boundaries: hosted model clients.

pub mod model;
