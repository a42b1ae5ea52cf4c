//! egui views for the rocket result browser

mod tables;

pub use tables::{RocketTableView, ViewConfig};
