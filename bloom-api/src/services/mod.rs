//! Business logic behind the HTTP handlers

pub mod analytics;
pub mod brand_categorizer;
pub mod brand_handler;
pub mod file_reader;
pub mod file_upload;
pub mod filter_manager;
pub mod metadata_manager;
pub mod python_client;
pub mod state_store;

pub use brand_handler::BrandHandler;
pub use metadata_manager::MetadataManager;
pub use python_client::PythonClient;
pub use state_store::{ConcatenationStates, NonMmmStates};
