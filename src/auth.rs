use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

/// Signing material for admin bearer tokens, registered as app data.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret) }
    }

    /// Validate a JWT and return its claims.
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }

    /// Create a JWT valid for `hours`.
    pub fn create_jwt(&self, subject: &str, roles: Vec<Role>, hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let expiration = (chrono::Utc::now() + chrono::Duration::hours(hours)).timestamp().max(0) as usize;
        let claims = Claims { sub: subject.to_string(), exp: expiration, roles };
        encode(&Header::default(), &claims, &self.encoding)
    }
}

/// Extractor yielding validated `Claims`.
#[derive(Debug)]
pub struct Auth(pub Claims);

impl Auth {
    pub fn is_admin(&self) -> bool {
        self.0.roles.iter().any(|r| matches!(r, Role::Admin))
    }
}

fn authenticate(req: &HttpRequest, pl: &mut Payload) -> Result<Auth, ApiError> {
    let Some(keys) = req.app_data::<web::Data<AuthKeys>>() else {
        tracing::error!("AuthKeys missing from app data");
        return Err(ApiError::Internal);
    };
    // Delegate to BearerAuth to parse the header.
    let bearer = BearerAuth::from_request(req, pl).into_inner().map_err(|_| ApiError::Unauthorized)?;
    keys.decode(bearer.token()).map(Auth).map_err(|_| ApiError::Unauthorized)
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        ready(authenticate(req, pl))
    }
}

/// Extractor that only succeeds for tokens carrying the admin role.
#[derive(Debug)]
pub struct AdminAuth(pub Claims);

impl FromRequest for AdminAuth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let auth = match authenticate(req, pl) {
            Ok(a) => a,
            Err(e) => return ready(Err(e)),
        };
        if !auth.is_admin() {
            return ready(Err(ApiError::Forbidden));
        }
        ready(Ok(AdminAuth(auth.0)))
    }
}
