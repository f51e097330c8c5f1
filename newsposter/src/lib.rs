// Library interface for newsposter modules
// This allows tests and the binaries to import modules

pub mod error;
pub mod fetcher;
pub mod images;
pub mod linkedin;
pub mod llm;
pub mod pipeline;
pub mod scheduler;
pub mod scraping;
pub mod selection;
pub mod server;
