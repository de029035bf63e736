use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::RestError;

type HmacSha256 = Hmac<Sha256>;

const JWT_AUDIENCE: &str = "tableau";
const JWT_LIFETIME_MINUTES: i64 = 5;

/// How the server signs in to Tableau.
#[derive(Clone)]
pub enum Credentials {
    PersonalAccessToken {
        name: String,
        secret: String,
    },
    /// Connected app with direct trust: a short-lived JWT per sign-in.
    DirectTrust {
        username: String,
        client_id: String,
        secret_id: String,
        secret_value: String,
    },
}

impl Credentials {
    pub fn method(&self) -> &'static str {
        match self {
            Credentials::PersonalAccessToken { .. } => "pat",
            Credentials::DirectTrust { .. } => "direct-trust",
        }
    }

    /// The `credentials` object for `POST /auth/signin`.
    pub(crate) fn signin_body(
        &self,
        site_content_url: &str,
        scopes: &[&str],
    ) -> Result<Value, RestError> {
        let site = json!({ "contentUrl": site_content_url });
        match self {
            Credentials::PersonalAccessToken { name, secret } => Ok(json!({
                "credentials": {
                    "personalAccessTokenName": name,
                    "personalAccessTokenSecret": secret,
                    "site": site
                }
            })),
            Credentials::DirectTrust {
                username,
                client_id,
                secret_id,
                secret_value,
            } => {
                let jwt = connected_app_jwt(
                    &ConnectedApp {
                        client_id,
                        secret_id,
                        secret_value,
                    },
                    username,
                    scopes,
                    Utc::now(),
                )?;
                Ok(json!({
                    "credentials": {
                        "jwt": jwt,
                        "site": site
                    }
                }))
            }
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::PersonalAccessToken { name, .. } => f
                .debug_struct("PersonalAccessToken")
                .field("name", name)
                .field("secret", &"<redacted>")
                .finish(),
            Credentials::DirectTrust {
                username,
                client_id,
                secret_id,
                ..
            } => f
                .debug_struct("DirectTrust")
                .field("username", username)
                .field("client_id", client_id)
                .field("secret_id", secret_id)
                .field("secret_value", &"<redacted>")
                .finish(),
        }
    }
}

pub(crate) struct ConnectedApp<'a> {
    pub client_id: &'a str,
    pub secret_id: &'a str,
    pub secret_value: &'a str,
}

/// HS256 token for a connected app's direct-trust sign-in.
pub(crate) fn connected_app_jwt(
    app: &ConnectedApp<'_>,
    username: &str,
    scopes: &[&str],
    now: DateTime<Utc>,
) -> Result<String, RestError> {
    let header = json!({
        "alg": "HS256",
        "typ": "JWT",
        "kid": app.secret_id,
        "iss": app.client_id
    });
    let claims = json!({
        "iss": app.client_id,
        "sub": username,
        "aud": JWT_AUDIENCE,
        "exp": (now + Duration::minutes(JWT_LIFETIME_MINUTES)).timestamp(),
        "jti": Uuid::new_v4().to_string(),
        "scp": scopes
    });

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );

    let mut mac = HmacSha256::new_from_slice(app.secret_value.as_bytes())
        .map_err(|e| RestError::Auth(format!("connected app secret rejected: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}
