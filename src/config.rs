//! Configuration management.

use std::env;

use crate::auth::jwt::MIN_SECRET_LEN;

const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub grpc: GrpcConfig,
    pub token: TokenConfig,
    pub security: SecurityConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrpcConfig {
    pub port: u16,
}

#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret. A random one is generated at startup when absent.
    pub secret: Option<String>,
    pub ttl_secs: u64,
    pub issuer: Option<String>,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl_secs", &self.ttl_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub password_hash_cost: u32,
    pub min_password_length: usize,
    pub access_policy_file: Option<String>,
    pub seed_demo_users: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub max_image_size: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_enabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                http_port: env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("HTTP_PORT must be a valid number"),
                environment: environment.clone(),
            },
            grpc: GrpcConfig {
                port: env::var("GRPC_PORT")
                    .unwrap_or_else(|_| "50051".to_string())
                    .parse()
                    .expect("GRPC_PORT must be a valid number"),
            },
            token: Self::parse_token_config(),
            security: Self::parse_security_config(&environment),
            catalog: CatalogConfig {
                max_image_size: env::var("MAX_IMAGE_SIZE")
                    .unwrap_or_else(|_| "1048576".to_string())
                    .parse()
                    .expect("MAX_IMAGE_SIZE must be a valid number"),
            },
            logging: Self::parse_logging_config(&environment),
            telemetry: Self::parse_telemetry_config(),
        }
    }

    fn parse_environment() -> Environment {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    fn parse_token_config() -> TokenConfig {
        TokenConfig {
            secret: env::var("TOKEN_SECRET").ok().filter(|s| !s.is_empty()),
            ttl_secs: env::var("TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .expect("TOKEN_TTL_SECS must be a valid number"),
            issuer: env::var("TOKEN_ISSUER").ok(),
        }
    }

    fn parse_security_config(environment: &Environment) -> SecurityConfig {
        let is_dev = environment.is_development();

        SecurityConfig {
            password_hash_cost: env::var("PASSWORD_HASH_COST")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .expect("PASSWORD_HASH_COST must be a valid number"),
            min_password_length: env::var("MIN_PASSWORD_LENGTH")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .expect("MIN_PASSWORD_LENGTH must be a valid number"),
            access_policy_file: env::var("ACCESS_POLICY_FILE").ok(),
            seed_demo_users: env::var("SEED_DEMO_USERS")
                .map(|v| v.parse().unwrap_or(is_dev))
                .unwrap_or(is_dev),
        }
    }

    fn parse_logging_config(environment: &Environment) -> LoggingConfig {
        let is_dev = environment.is_development();

        LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| {
                if is_dev {
                    "debug".to_string()
                } else {
                    "info".to_string()
                }
            }),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| {
                    if is_dev {
                        "pretty".to_string()
                    } else {
                        "json".to_string()
                    }
                })
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }

    fn parse_telemetry_config() -> TelemetryConfig {
        TelemetryConfig {
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "pcbook".to_string()),
            metrics_enabled: env::var("METRICS_ENABLED")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
        }
    }

    pub fn validate_for_production(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(secret) = &self.token.secret {
            if secret.len() < MIN_SECRET_LEN {
                issues.push(format!(
                    "TOKEN_SECRET must be at least {} bytes; startup will fail",
                    MIN_SECRET_LEN
                ));
            }
        }

        if self.server.environment.is_production() {
            match &self.token.secret {
                None => issues.push(
                    "TOKEN_SECRET is not set; tokens will not survive a restart".to_string(),
                ),
                Some(secret) if secret.len() < RECOMMENDED_SECRET_LEN => issues.push(format!(
                    "TOKEN_SECRET should be at least {} bytes in production",
                    RECOMMENDED_SECRET_LEN
                )),
                Some(_) => {}
            }

            if self.token.ttl_secs > 3600 {
                issues.push("Token TTL should not exceed 1 hour in production".to_string());
            }

            if self.security.seed_demo_users {
                issues.push("Demo users should not be seeded in production".to_string());
            }

            if self.security.password_hash_cost < 12 {
                issues.push("Password hash cost should be at least 12".to_string());
            }
        }

        issues
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.grpc.port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    pub fn default_for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: 0,
                environment: Environment::Development,
            },
            grpc: GrpcConfig { port: 0 },
            token: TokenConfig {
                secret: Some("pcbook-test-secret".to_string()),
                ttl_secs: 900,
                issuer: Some("pcbook-test".to_string()),
            },
            security: SecurityConfig {
                password_hash_cost: 4,
                min_password_length: 6,
                access_policy_file: None,
                seed_demo_users: true,
            },
            catalog: CatalogConfig {
                max_image_size: 1024,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                service_name: "pcbook-test".to_string(),
                metrics_enabled: false,
            },
        }
    }
}
