//! gRPC services: credentials exchange and the gated laptop catalog.

pub mod auth_service;
pub mod laptop_service;

pub mod proto {
    tonic::include_proto!("pcbook.v1");
}

pub use auth_service::AuthServiceImpl;
pub use laptop_service::LaptopServiceImpl;

use crate::auth::AccessPolicy;

/// Fully-qualified method paths, as seen by the interceptor.
pub mod methods {
    pub const LOGIN: &str = "/pcbook.v1.AuthService/Login";
    pub const REGISTER: &str = "/pcbook.v1.AuthService/Register";

    pub const CREATE_LAPTOP: &str = "/pcbook.v1.LaptopService/CreateLaptop";
    pub const SEARCH_LAPTOP: &str = "/pcbook.v1.LaptopService/SearchLaptop";
    pub const UPLOAD_IMAGE: &str = "/pcbook.v1.LaptopService/UploadImage";
    pub const RATE_LAPTOP: &str = "/pcbook.v1.LaptopService/RateLaptop";

    /// Methods with a streaming request or response.
    pub const STREAMING: &[&str] = &[SEARCH_LAPTOP, UPLOAD_IMAGE, RATE_LAPTOP];
}

/// Built-in table. Login and SearchLaptop are not listed, so they are public.
pub fn default_access_policy() -> AccessPolicy {
    AccessPolicy::new([
        (methods::CREATE_LAPTOP, vec!["admin"]),
        (methods::UPLOAD_IMAGE, vec!["admin"]),
        (methods::RATE_LAPTOP, vec!["admin", "user"]),
        (methods::REGISTER, vec!["admin"]),
    ])
}
