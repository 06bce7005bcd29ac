//! Fixed business codes and their default messages.

use axum::http::StatusCode;

pub const SUCCESS: i32 = 0;
pub const BAD_REQUEST: i32 = 40000;
pub const NOT_LOGGED_IN: i32 = 40001;
pub const TOKEN_EXPIRED: i32 = 40002;
pub const FORBIDDEN: i32 = 40003;
pub const PARAM_VALIDATION: i32 = 40010;
pub const SYSTEM_ERROR: i32 = 50000;

pub const OK_MSG: &str = "ok";
pub const BAD_REQUEST_MSG: &str = "operation failed";
pub const PARAM_INVALID_MSG: &str = "invalid parameters";
pub const FORBIDDEN_MSG: &str = "permission denied";
pub const NOT_LOGGED_IN_MSG: &str = "not logged in";
pub const TOKEN_EXPIRED_MSG: &str = "token expired";
pub const SERVER_ERROR_MSG: &str = "server error, please contact the administrator";

/// Transport status that goes with a business code.
///
/// Authentication codes map to 401; everything else travels as 200 and is
/// told apart by `err_code`.
pub fn http_status(code: i32) -> StatusCode {
    match code {
        NOT_LOGGED_IN | TOKEN_EXPIRED => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    }
}
