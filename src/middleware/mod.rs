//! Call middleware.

pub mod auth;

pub use auth::{
    AuthInterceptor, AuthLayer, AuthMiddleware, CallKind, ClaimsExt, AUTHORIZATION_METADATA_KEY,
};
