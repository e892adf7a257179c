use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"));

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address"), length(max = 254))]
    pub email: String,
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1 to 150 characters"),
        regex(path = *USERNAME_RE, message = "Username may contain letters, digits and @/./+/-/_ only")
    )]
    pub username: String,
    #[validate(length(min = 1, max = 150, message = "This field is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150, message = "This field is required"))]
    pub last_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
