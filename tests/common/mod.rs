//! Common test utilities and helpers for integration tests.
//!
//! Each [`TestApp`] owns a gRPC server on an ephemeral port, seeded with the
//! demo accounts, plus generated clients pointed at it.

#![allow(dead_code)]

use tokio::net::TcpListener;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Request, Status};

use pcbook::grpc::proto::auth_service_client::AuthServiceClient;
use pcbook::grpc::proto::laptop_service_client::LaptopServiceClient;
use pcbook::grpc::proto::{CreateLaptopRequest, Laptop, LoginRequest};
use pcbook::{seed_demo_users, serve_grpc, AppState, Config};

pub const ADMIN: (&str, &str) = ("admin1", "secret");
pub const USER: (&str, &str) = ("user1", "secret");

pub struct TestApp {
    pub state: AppState,
    pub auth: AuthServiceClient<Channel>,
    pub laptops: LaptopServiceClient<Channel>,
    pub address: String,
}

impl TestApp {
    /// Spawns a server with the default test configuration.
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::default_for_testing()).await
    }

    pub async fn spawn_with(config: Config) -> Self {
        let state = AppState::new(&config).expect("Failed to build app state");
        Self::spawn_with_state(state).await
    }

    pub async fn spawn_with_state(state: AppState) -> Self {
        seed_demo_users(&state)
            .await
            .expect("Failed to seed demo users");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let address = format!("http://{}", listener.local_addr().unwrap());

        let server_state = state.clone();
        tokio::spawn(async move {
            serve_grpc(&server_state, listener, std::future::pending())
                .await
                .expect("gRPC server failed");
        });

        let channel = Channel::from_shared(address.clone())
            .expect("Invalid server address")
            .connect()
            .await
            .expect("Failed to connect to test server");

        Self {
            state,
            auth: AuthServiceClient::new(channel.clone()),
            laptops: LaptopServiceClient::new(channel),
            address,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String, Status> {
        let response = self
            .auth
            .clone()
            .login(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        Ok(response.into_inner().access_token)
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN.0, ADMIN.1)
            .await
            .expect("Admin login failed")
    }

    pub async fn user_token(&self) -> String {
        self.login(USER.0, USER.1).await.expect("User login failed")
    }

    /// Creates a laptop as admin and returns its id.
    pub async fn create_laptop(&self, laptop: Laptop) -> String {
        let token = self.admin_token().await;
        self.laptops
            .clone()
            .create_laptop(with_token(
                CreateLaptopRequest {
                    laptop: Some(laptop),
                },
                Some(&token),
            ))
            .await
            .expect("Failed to create laptop")
            .into_inner()
            .id
    }
}

/// Wraps `message` in a request carrying `Bearer <token>` when a token is given.
pub fn with_token<T>(message: T, token: Option<&str>) -> Request<T> {
    let mut request = Request::new(message);
    if let Some(token) = token {
        with_raw_authorization(&mut request, &format!("Bearer {}", token));
    }
    request
}

pub fn with_raw_authorization<T>(request: &mut Request<T>, value: &str) {
    let value: MetadataValue<_> = value.parse().expect("Invalid metadata value");
    request.metadata_mut().insert("authorization", value);
}

pub fn sample_laptop(brand: &str, price_usd: f64) -> Laptop {
    Laptop {
        id: String::new(),
        brand: brand.to_string(),
        name: format!("{} Test Book", brand),
        cpu_cores: 8,
        ram_gb: 16,
        price_usd,
        release_year: 2023,
    }
}

/// Asserts that a call failed with the given gRPC code.
#[macro_export]
macro_rules! assert_code {
    ($result:expr, $code:expr) => {
        match $result {
            Ok(_) => panic!("Expected {:?}, got success", $code),
            Err(status) => assert_eq!(
                status.code(),
                $code,
                "Expected {:?}, got {:?}: {}",
                $code,
                status.code(),
                status.message()
            ),
        }
    };
}
