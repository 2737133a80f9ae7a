pub mod alerts;
pub mod api;
pub mod cli;
pub mod config;
pub mod detection;
pub mod errors;
pub mod history;
pub mod http;
pub mod registry;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod site;
pub mod users;
