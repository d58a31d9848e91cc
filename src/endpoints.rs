//! REST endpoint paths exposed by the IRIS backend.

/// Resolve a user name to its user identifier.
pub const AUTH_GET_USER_ID: &str = "/api/auth/get-userId";

/// One-time login challenge (salt + nonce).
pub const AUTH_GET_CHALLENGE: &str = "/api/auth/get-challenge";

/// Credential submission.
pub const AUTH_LOGIN: &str = "/api/auth/login";

/// Access token refresh.
pub const AUTH_REFRESH: &str = "/api/auth/refresh";

/// Session termination. Not an auth endpoint: a 401 here is refreshed like any other call.
pub const AUTH_LOGOUT: &str = "/api/auth/logout";

/// Upload a stock screener CSV for parsing.
pub const SQAS_PARSE_STOCK_SCREENER_CSV: &str = "/api/sqas/parse-stock-screener-csv";

/// Persist a previously parsed CSV.
pub const SQAS_PUT_STOCK_INFO: &str = "/api/sqas/put-stock-info";

/// Endpoints whose 401 responses are final and never trigger a token refresh.
pub const AUTH_ENDPOINTS: [&str; 4] = [AUTH_GET_USER_ID, AUTH_GET_CHALLENGE, AUTH_LOGIN, AUTH_REFRESH];

/// Check whether `path` (optionally carrying a query string) is an auth endpoint.
///
/// The leading `/` is optional, as it is for request paths.
pub fn is_auth_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path).trim_start_matches('/');
    AUTH_ENDPOINTS
        .iter()
        .any(|endpoint| endpoint.trim_start_matches('/') == path)
}
