//! Credentials, session tokens and the access policy table.

pub mod jwt;
pub mod password;
pub mod policy;
pub mod user;

pub use jwt::{Claims, TokenManager};
pub use password::{PasswordHasher, PasswordPolicy};
pub use policy::{Access, AccessPolicy, PolicyError};
pub use user::{InMemoryUserStore, User, UserStore};
