//! Call interceptor enforcing the access policy on every RPC.
//!
//! [`AuthLayer`] sits on the gRPC server itself and sees every call before it
//! is routed, keyed by the request path. Unary and streaming calls go through
//! different entry points on [`AuthInterceptor`], but both delegate to
//! [`AuthInterceptor::authorize`], so the decision lives in one place.
//!
//! For streaming calls the decision is taken from the opening headers, before
//! any message is read. A token that expires while the stream is open keeps
//! authorizing that stream.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tonic::body::{boxed, BoxBody};
use tonic::codegen::{http, Body, BoxFuture, Bytes, Context, Poll, Service, StdError};
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};
use tower::Layer;
use tracing::{debug, info_span, warn, Instrument};

use crate::auth::{Access, AccessPolicy, Claims, TokenManager};
use crate::error::{AuthError, AuthResult};
use crate::telemetry::{record_authorization, Decision};

pub const AUTHORIZATION_METADATA_KEY: &str = "authorization";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Stream,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Unary => "unary",
            CallKind::Stream => "stream",
        }
    }
}

#[derive(Clone)]
pub struct AuthInterceptor {
    tokens: Arc<TokenManager>,
    policy: Arc<AccessPolicy>,
    exempt: Arc<HashSet<String>>,
}

impl AuthInterceptor {
    pub fn new(tokens: Arc<TokenManager>, policy: Arc<AccessPolicy>) -> Self {
        Self {
            tokens,
            policy,
            exempt: Arc::default(),
        }
    }

    /// Never gates `method`, whatever the policy table says about it.
    pub fn exempt(mut self, method: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.exempt).insert(method.into());
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decides whether a call to `method` carrying `metadata` may proceed.
    ///
    /// Returns `Ok(None)` for exempt and public methods (no token is
    /// inspected) and `Ok(Some(claims))` for restricted methods whose caller
    /// holds an allowed role.
    pub fn authorize(&self, metadata: &MetadataMap, method: &str) -> AuthResult<Option<Claims>> {
        if self.exempt.contains(method) {
            return Ok(None);
        }

        let allowed_roles = match self.policy.roles_for(method) {
            Access::Public => return Ok(None),
            Access::Restricted(roles) => roles,
        };

        let token = bearer_token(metadata)?;
        let claims = self.tokens.verify(token)?;

        if !allowed_roles.contains(&claims.role) {
            return Err(AuthError::PermissionDenied);
        }

        Ok(Some(claims))
    }

    /// Admits a single request/response call.
    pub fn unary<B>(&self, request: http::Request<B>) -> Result<http::Request<B>, Status> {
        self.admit(CallKind::Unary, request)
    }

    /// Admits a streaming call from its opening headers only. The body, and
    /// with it every stream message, is handed on untouched.
    pub fn stream<B>(&self, request: http::Request<B>) -> Result<http::Request<B>, Status> {
        self.admit(CallKind::Stream, request)
    }

    fn admit<B>(
        &self,
        kind: CallKind,
        request: http::Request<B>,
    ) -> Result<http::Request<B>, Status> {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();

        let metadata = MetadataMap::from_headers(std::mem::take(&mut parts.headers));
        let result = self.authorize(&metadata, parts.uri.path());
        parts.headers = metadata.into_headers();

        let decision = match &result {
            Ok(None) => Decision::Public,
            Ok(Some(_)) => Decision::Allowed,
            Err(AuthError::PermissionDenied) => Decision::PermissionDenied,
            Err(_) => Decision::Unauthenticated,
        };
        record_authorization(kind.as_str(), decision, start.elapsed());

        let method = parts.uri.path();
        match result {
            Ok(Some(claims)) => {
                debug!(
                    method,
                    kind = kind.as_str(),
                    username = %claims.username,
                    role = %claims.role,
                    "Call authorized"
                );
                parts.extensions.insert(claims);
            }
            Ok(None) => debug!(method, kind = kind.as_str(), "Public call admitted"),
            Err(e) => {
                warn!(method, kind = kind.as_str(), reason = %e, "Call rejected");
                return Err(e.into());
            }
        }

        Ok(http::Request::from_parts(parts, body))
    }
}

/// Extracts the raw token from `authorization: Bearer <token>`.
fn bearer_token(metadata: &MetadataMap) -> AuthResult<&str> {
    let value = metadata
        .get(AUTHORIZATION_METADATA_KEY)
        .ok_or(AuthError::MissingToken)?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(AuthError::InvalidToken)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Server layer that runs every routed call through an [`AuthInterceptor`].
///
/// Methods named in `streaming_methods` use the stream entry point; every
/// other path is treated as unary. Either way the same policy applies.
#[derive(Clone)]
pub struct AuthLayer {
    interceptor: AuthInterceptor,
    streaming: Arc<HashSet<String>>,
}

impl AuthLayer {
    pub fn new<I>(interceptor: AuthInterceptor, streaming_methods: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            interceptor,
            streaming: Arc::new(streaming_methods.into_iter().map(Into::into).collect()),
        }
    }

    fn call_kind(&self, method: &str) -> CallKind {
        if self.streaming.contains(method) {
            CallKind::Stream
        } else {
            CallKind::Unary
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    layer: AuthLayer,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for AuthMiddleware<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<StdError>,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        let kind = self.layer.call_kind(request.uri().path());
        let span = info_span!("rpc", method = %request.uri().path(), kind = kind.as_str());

        let admitted = match kind {
            CallKind::Unary => self.layer.interceptor.unary(request),
            CallKind::Stream => self.layer.interceptor.stream(request),
        };

        match admitted {
            Ok(request) => {
                let response = self.inner.call(request);
                Box::pin(async move { Ok(response.await?.map(boxed)) }.instrument(span))
            }
            Err(status) => Box::pin(async move { Ok(status.into_http()) }),
        }
    }
}

/// Claims attached by the interceptor, available to handlers of restricted
/// methods.
pub trait ClaimsExt {
    fn claims(&self) -> Option<&Claims>;
}

impl<T> ClaimsExt for Request<T> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
