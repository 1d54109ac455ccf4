use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::result::ApiResponse;

pub mod retry;

pub use crate::result::error_codes;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

/// 签发令牌。正式令牌由认证服务签发，这里用于联调和测试
pub fn generate_token(
    user_id: &str,
    config: &Config,
    ttl: Duration,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + ttl).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse::error(code, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiWorkoutConfig;

    fn config(secret: &str) -> Config {
        Config {
            database_url: String::new(),
            database_max_connections: 1,
            redis_url: String::new(),
            jwt_secret: secret.into(),
            api_base_uri: "/api".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            ai_workout: AiWorkoutConfig::default(),
        }
    }

    #[test]
    fn token_round_trip() {
        let config = config("secret-a");
        let (token, exp) = generate_token("u1", &config, Duration::hours(1)).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let (token, _) = generate_token("u1", &config("secret-a"), Duration::hours(1)).unwrap();
        assert!(verify_token(&token, &config("secret-b")).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config("secret-a");
        let (token, _) = generate_token("u1", &config, Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }
}
