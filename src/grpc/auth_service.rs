//! gRPC AuthService implementation.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{info, instrument, warn};

use crate::auth::password::run_blocking;
use crate::auth::{PasswordHasher, PasswordPolicy, TokenManager, User, UserStore};
use crate::error::{AuthError, AuthResult};
use crate::telemetry::{record_auth_attempt, AuthOutcome};

use super::proto::auth_service_server::AuthService;
use super::proto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

pub struct AuthServiceImpl {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
    hasher: PasswordHasher,
    password_policy: PasswordPolicy,
    /// Verified against when the user is unknown, so both failure paths
    /// pay for one hash verification.
    dummy_hash: Arc<str>,
}

impl AuthServiceImpl {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenManager>,
        hasher: PasswordHasher,
        password_policy: PasswordPolicy,
    ) -> AuthResult<Self> {
        let dummy_hash = hasher.hash("pcbook-dummy-password")?;
        Ok(Self {
            users,
            tokens,
            hasher,
            password_policy,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    async fn handle_login(&self, req: LoginRequest) -> Result<Response<LoginResponse>, Status> {
        let user = self.users.find(&req.username).await.ok();
        let dummy_hash = self.dummy_hash.clone();
        let password = req.password;

        let (user, is_valid) = run_blocking(move || {
            let is_valid = match &user {
                Some(user) => user.is_correct_password(&password)?,
                None => PasswordHasher::verify(&password, &dummy_hash).map(|_| false)?,
            };
            Ok((user, is_valid))
        })
        .await
        .inspect_err(|_| record_auth_attempt("login", AuthOutcome::InternalError))?;

        let user = match user {
            Some(user) if is_valid => user,
            _ => {
                warn!(username = %req.username, "Failed login attempt");
                record_auth_attempt("login", AuthOutcome::InvalidCredentials);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let access_token = self.tokens.issue(user.username(), user.role())?;

        record_auth_attempt("login", AuthOutcome::Success);
        info!(username = %user.username(), role = %user.role(), "User logged in");

        Ok(Response::new(LoginResponse { access_token }))
    }

    async fn handle_register(
        &self,
        req: RegisterRequest,
    ) -> Result<Response<RegisterResponse>, Status> {
        let result = self.register_user(req).await;

        match &result {
            Ok(user) => {
                record_auth_attempt("register", AuthOutcome::Success);
                info!(username = %user.username(), role = %user.role(), "User registered");
            }
            Err(AuthError::DuplicateUser(username)) => {
                record_auth_attempt("register", AuthOutcome::DuplicateUser);
                warn!(username = %username, "Registration for existing user");
            }
            Err(AuthError::InvalidArgument(_)) => {
                record_auth_attempt("register", AuthOutcome::InvalidArgument);
            }
            Err(_) => record_auth_attempt("register", AuthOutcome::InternalError),
        }

        let user = result?;
        Ok(Response::new(RegisterResponse {
            username: user.username().to_string(),
            role: user.role().to_string(),
        }))
    }

    async fn register_user(&self, req: RegisterRequest) -> AuthResult<User> {
        let username = req.username.trim().to_string();
        let role = req.role.trim().to_string();

        if username.is_empty() {
            return Err(AuthError::invalid_argument("username is required"));
        }
        if role.is_empty() {
            return Err(AuthError::invalid_argument("role is required"));
        }
        self.password_policy.validate(&req.password)?;

        let hasher = self.hasher;
        let password = req.password;
        let user = run_blocking(move || User::new(username, &password, role, &hasher)).await?;

        self.users.save(user.clone()).await?;
        Ok(user)
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    #[instrument(skip(self, request), fields(username = %request.get_ref().username))]
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        self.handle_login(request.into_inner()).await
    }

    #[instrument(skip(self, request), fields(username = %request.get_ref().username))]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        self.handle_register(request.into_inner()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryUserStore;
    use std::time::Duration;
    use tonic::Code;

    async fn service() -> AuthServiceImpl {
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let hasher = PasswordHasher::new(4);
        users
            .save(User::new("admin1", "secret", "admin", &hasher).unwrap())
            .await
            .unwrap();
        users
            .save(User::new("user1", "secret", "user", &hasher).unwrap())
            .await
            .unwrap();

        let tokens = Arc::new(
            TokenManager::new(b"auth-service-secret", Duration::from_secs(900)).unwrap(),
        );
        AuthServiceImpl::new(users, tokens, hasher, PasswordPolicy::default()).unwrap()
    }

    fn login_request(username: &str, password: &str) -> Request<LoginRequest> {
        Request::new(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn register_request(username: &str, role: &str) -> Request<RegisterRequest> {
        Request::new(RegisterRequest {
            username: username.to_string(),
            password: "secret".to_string(),
            role: role.to_string(),
        })
    }

    #[tokio::test]
    async fn test_login_issues_token_with_role() {
        let service = service().await;
        let token = service
            .login(login_request("user1", "secret"))
            .await
            .unwrap()
            .into_inner()
            .access_token;

        let claims = service.tokens.verify(&token).unwrap();
        assert_eq!(claims.username, "user1");
        assert_eq!(claims.role, "user");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service().await;

        let wrong_password = service
            .login(login_request("user1", "not-the-password"))
            .await
            .unwrap_err();
        let unknown_user = service
            .login(login_request("nobody", "secret"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.code(), Code::Unauthenticated);
        assert_eq!(wrong_password.code(), unknown_user.code());
        assert_eq!(wrong_password.message(), unknown_user.message());
    }

    #[tokio::test]
    async fn test_register_creates_user_that_can_log_in() {
        let service = service().await;

        let created = service
            .register(register_request("carol", "user"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(created.username, "carol");
        assert_eq!(created.role, "user");

        assert!(service.login(login_request("carol", "secret")).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicate_is_already_exists() {
        let service = service().await;

        let status = service
            .register(register_request("user1", "admin"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::AlreadyExists);

        // The original record still logs in with its original role.
        let token = service
            .login(login_request("user1", "secret"))
            .await
            .unwrap()
            .into_inner()
            .access_token;
        assert_eq!(service.tokens.verify(&token).unwrap().role, "user");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = service().await;

        for (username, role) in [("", "user"), ("dave", " ")] {
            let status = service
                .register(register_request(username, role))
                .await
                .unwrap_err();
            assert_eq!(status.code(), Code::InvalidArgument);
        }

        let mut short = register_request("erin", "user");
        short.get_mut().password = "abc".to_string();
        let status = service.register(short).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
