//! Tally Web Server
//!
//! Axum-based REST API for the Tally statement tracker.
//!
//! Security features:
//! - Bearer authentication: identity-provider JWTs or service API keys
//!   (secure by default, use --no-auth for local dev)
//! - Every query scoped to the authenticated user
//! - Restrictive CORS policy
//! - Input validation (pagination limits, file size limits)
//! - Audit logging for writes
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use tally_core::ai::CategorySuggester;
use tally_core::config::Config;
use tally_core::db::Database;

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for bearer auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Header naming the acting user for service-role (API key) requests
pub const SERVICE_USER_HEADER: &str = "x-tally-user";

/// User id for service-role requests without `x-tally-user`
pub const SERVICE_USER: &str = "service";

/// User id when authentication is disabled
pub const LOCAL_DEV_USER: &str = "local-dev";

/// Audience claim the identity provider puts on user access tokens
pub const JWT_AUDIENCE: &str = "authenticated";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys for service-role access
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
    /// HS256 secret for verifying identity-provider access tokens
    pub jwt_secret: Option<String>,
    /// Currency given to users on first sight
    pub default_currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            jwt_secret: None,
            default_currency: tally_core::config::DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl ServerConfig {
    /// Server settings from resolved configuration
    pub fn from_config(config: &Config, require_auth: bool) -> Self {
        Self {
            require_auth,
            allowed_origins: config.allowed_origins.clone(),
            api_keys: config.api_keys.clone(),
            jwt_secret: config.jwt_secret.clone(),
            default_currency: config.default_currency.clone(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// AI category suggester, when configured
    pub suggester: Option<Arc<dyn CategorySuggester>>,
}

/// The authenticated caller, stored in request extensions
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    /// Service role: may manage global rules, categories and currencies
    pub admin: bool,
    /// How the caller was authenticated
    pub method: &'static str,
}

impl AuthUser {
    /// Reject non-admin callers
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }
}

/// Access-token claims we read
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Authentication middleware - resolves the caller and ensures their profile
///
/// Order of checks:
/// 1. `--no-auth` dev mode: every request is `local-dev` with admin rights
/// 2. `Authorization: Bearer <jwt>` verified with the provider's HS256 secret
/// 3. `Authorization: Bearer <api key>` for the service role, acting as the
///    user named in `x-tally-user`
///
/// This server only verifies tokens; it never issues them.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = if !state.config.require_auth {
        AuthUser {
            id: LOCAL_DEV_USER.to_string(),
            email: None,
            admin: true,
            method: "none",
        }
    } else {
        let Some(token) = request
            .headers()
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            warn!(path = %request.uri().path(), "Unauthorized request - no bearer token");
            return unauthorized("Authentication required");
        };

        match authenticate(&state.config, token, request.headers()) {
            Some(user) => user,
            None => {
                warn!(path = %request.uri().path(), "Unauthorized request - invalid token");
                return unauthorized("Invalid credentials");
            }
        }
    };

    if let Err(e) = state.db.ensure_user(
        &user.id,
        user.email.as_deref(),
        &state.config.default_currency,
    ) {
        error!(user = %user.id, error = %e, "Failed to ensure user profile");
        return AppError::from(e).into_response();
    }

    debug!(user = %user.id, method = user.method, path = %request.uri().path(), "Authenticated");
    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Resolve a bearer token to a user, trying JWT first and then API keys
fn authenticate(
    config: &ServerConfig,
    token: &str,
    headers: &axum::http::HeaderMap,
) -> Option<AuthUser> {
    if let Some(secret) = config.jwt_secret.as_deref() {
        // JWTs have three dot-separated segments; API keys usually don't
        if token.matches('.').count() == 2 {
            match validate_jwt(token, secret) {
                Ok(claims) => {
                    return Some(AuthUser {
                        id: claims.sub,
                        email: claims.email,
                        admin: false,
                        method: "jwt",
                    })
                }
                Err(e) => debug!(error = %e, "JWT validation failed"),
            }
        }
    }

    if validate_api_key(token, &config.api_keys) {
        let id = headers
            .get(SERVICE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(SERVICE_USER)
            .to_string();
        return Some(AuthUser {
            id,
            email: None,
            admin: true,
            method: "api_key",
        });
    }

    None
}

/// Verify an HS256 access token (signature, expiry, audience)
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[JWT_AUDIENCE]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("JWT validation failed: {}", e))?;

    if data.claims.sub.trim().is_empty() {
        return Err("JWT has an empty subject".into());
    }
    Ok(data.claims)
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
        {
            return true;
        }
    }
    false
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    suggester: Option<Arc<dyn CategorySuggester>>,
) -> Router {
    match &suggester {
        Some(s) => info!("AI category suggestions enabled ({})", s.name()),
        None => info!("AI category suggestions not configured (set ANTHROPIC_API_KEY to enable)"),
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        suggester,
    });

    let api_routes = Router::new()
        // Profile
        .route("/me", get(handlers::get_me).patch(handlers::update_me))
        // Currencies
        .route(
            "/currencies",
            get(handlers::list_currencies).post(handlers::create_currency),
        )
        .route("/currencies/:code", delete(handlers::delete_currency))
        // Banks
        .route("/banks", get(handlers::list_banks).post(handlers::create_bank))
        .route(
            "/banks/:id",
            get(handlers::get_bank)
                .patch(handlers::update_bank)
                .delete(handlers::delete_bank),
        )
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category)
                .patch(handlers::update_category)
                .delete(handlers::delete_category),
        )
        // Keywords
        .route(
            "/keywords",
            get(handlers::list_keywords).post(handlers::create_keyword),
        )
        .route("/keywords/:id", delete(handlers::delete_keyword))
        // Rules
        .route("/rules", get(handlers::list_rules).post(handlers::create_rule))
        .route("/rules/test", post(handlers::test_rules))
        .route("/rules/:id", delete(handlers::delete_rule))
        // Transactions
        .route("/transactions", get(handlers::list_transactions))
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).delete(handlers::delete_transaction),
        )
        .route(
            "/transactions/:id/category",
            put(handlers::set_transaction_category),
        )
        // Imports
        .route("/import", post(handlers::import_statement))
        .route("/imports", get(handlers::list_imports))
        .route(
            "/imports/:id",
            get(handlers::get_import).delete(handlers::delete_import),
        )
        // Categorization
        .route("/categorize", post(handlers::recategorize))
        .route("/categorize/suggest", post(handlers::suggest_categories))
        // Reports
        .route("/reports/pivot", get(handlers::report_pivot))
        .route("/reports/by-category", get(handlers::report_by_category))
        .route("/reports/by-bank", get(handlers::report_by_bank))
        .route("/reports/summary", get(handlers::report_summary))
        // Audit
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Security headers
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
    suggester: Option<Arc<dyn CategorySuggester>>,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    } else if config.jwt_secret.is_none() && config.api_keys.is_empty() {
        warn!("No JWT secret or API keys configured - every request will be rejected");
    }

    let app = create_router(db, static_dir, config, suggester);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use tally_core::Error as CoreError;

        let err = err.into();
        // Caller mistakes carry a safe message; everything else is sanitized
        if let Some(core) = err.downcast_ref::<CoreError>() {
            let status = match core {
                CoreError::NotFound(_) => Some(StatusCode::NOT_FOUND),
                CoreError::InvalidData(_)
                | CoreError::Import(_)
                | CoreError::Csv(_)
                | CoreError::Excel(_)
                | CoreError::Pdf(_) => Some(StatusCode::BAD_REQUEST),
                CoreError::Conflict(_) => Some(StatusCode::CONFLICT),
                CoreError::Forbidden(_) => Some(StatusCode::FORBIDDEN),
                _ => None,
            };
            if let Some(status) = status {
                return Self::new(status, &core.to_string());
            }
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
