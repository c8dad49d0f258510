//! Authentication and authorization errors, and their RPC status mapping.

use thiserror::Error;
use tonic::Status;
use tracing::error;

use crate::auth::PolicyError;

/// Message returned for both unknown users and wrong passwords.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid username or password";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user {0} already exists")]
    DuplicateUser(String),

    #[error("user not found")]
    NotFound,

    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("authorization token is not provided")]
    MissingToken,

    /// Malformed, tampered and expired tokens all end up here.
    #[error("access token is invalid")]
    InvalidToken,

    #[error("no permission to access this RPC")]
    PermissionDenied,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("cannot hash password: {0}")]
    HashingFailure(String),

    #[error("cannot sign access token: {0}")]
    TokenSigning(String),

    #[error("token secret must be at least {0} bytes")]
    WeakSecret(usize),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures that stop the process from starting or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

impl AuthError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::HashingFailure(_) | Self::TokenSigning(_) | Self::WeakSecret(_)
        )
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        if err.is_internal() {
            error!(error = %err, "Internal authentication failure");
            return Status::internal("internal error");
        }

        match err {
            AuthError::DuplicateUser(_) => Status::already_exists(err.to_string()),
            AuthError::NotFound => Status::not_found(err.to_string()),
            AuthError::InvalidCredentials => Status::unauthenticated(INVALID_CREDENTIALS_MESSAGE),
            AuthError::MissingToken | AuthError::InvalidToken => {
                Status::unauthenticated(err.to_string())
            }
            AuthError::PermissionDenied => Status::permission_denied(err.to_string()),
            AuthError::InvalidArgument(message) => Status::invalid_argument(message),
            AuthError::HashingFailure(_)
            | AuthError::TokenSigning(_)
            | AuthError::WeakSecret(_) => Status::internal("internal error"),
        }
    }
}
