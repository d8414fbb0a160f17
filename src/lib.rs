pub mod api_connection;
pub mod cli;
pub mod config;
pub mod error;
pub mod food_recognizer;
pub mod nutritional_matcher;
pub mod plate;
pub mod plate_aggregator;
pub mod reference;
pub mod session;
