//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to register a user
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
}

/// Envelope used by the registration and upload endpoints
#[derive(Debug, Serialize)]
pub struct GenericResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

impl GenericResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Health probe body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}
