//! In-memory laptop catalog used behind the gated LaptopService.

pub mod image_store;
pub mod laptop_store;
pub mod rating_store;

use std::sync::Arc;

use thiserror::Error;
use tonic::Status;

pub use image_store::{ImageStore, StoredImage};
pub use laptop_store::LaptopStore;
pub use rating_store::{Rating, RatingStore};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("laptop {0} already exists")]
    AlreadyExists(String),
    #[error("laptop {0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
}

impl From<CatalogError> for Status {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::AlreadyExists(_) => Status::already_exists(err.to_string()),
            CatalogError::NotFound(_) => Status::not_found(err.to_string()),
            CatalogError::InvalidArgument(message) => Status::invalid_argument(message),
        }
    }
}

#[derive(Clone, Default)]
pub struct CatalogServices {
    pub laptops: Arc<LaptopStore>,
    pub images: Arc<ImageStore>,
    pub ratings: Arc<RatingStore>,
}

impl CatalogServices {
    pub fn new() -> Self {
        Self::default()
    }
}
