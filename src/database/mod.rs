// Database module for meeting-insights
// Provides SQLite persistence for meetings and their derived action items

pub mod action_items_repo;
pub mod manager;
pub mod meetings_repo;
pub mod migrations;
pub mod models;

pub use manager::DatabaseManager;
pub use models::*;
