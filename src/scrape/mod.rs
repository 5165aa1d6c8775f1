pub mod fetcher;
pub mod forms;
pub mod items;
pub mod models;
pub mod parser;
mod service;

pub use service::ScrapeService;
