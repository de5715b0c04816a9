use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::attendance_record::AttendanceStatus;

/// Machine-readable failure codes of the public check-in flow. The HTTP
/// status carries the same distinction; the code is for the form UI.
pub const CODE_TOKEN_INVALID: &str = "token_invalid";
pub const CODE_TOKEN_EXPIRED: &str = "token_expired";
pub const CODE_NOT_REGISTERED: &str = "not_registered";

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCheckinReq {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "student_name is required"))]
    pub student_name: String,
    pub student_email: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct SubmitCheckinResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AttendanceStatus>,
    pub already_checked_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl SubmitCheckinResponse {
    pub fn failure(code: &'static str) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }
}
