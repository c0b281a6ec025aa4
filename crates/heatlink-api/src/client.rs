// MELCloud HTTP client
//
// Wraps `reqwest::Client` with service-specific URL construction, the
// `X-MitsContextKey` auth header, and response triage. Returns decoded
// payloads or a classified `Error` — callers never see raw HTTP.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::models::{
    DeviceTypeCode, ListedBuilding, ListedDevice, LoginRequest, LoginResponse, RawState,
    StateWrite,
};
use crate::transport::CloudTransport;

/// Production base URL of the cloud service.
pub const DEFAULT_BASE_URL: &str = "https://app.melcloud.com/Mitsubishi.Wifi.Client/";

/// Application version reported on login. The service rejects logins
/// from versions it considers too old.
const APP_VERSION: &str = "1.19.1.1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the MELCloud application API.
///
/// Holds the context key obtained from [`login`](Self::login) (or handed
/// in via [`set_token`](Self::set_token)) and applies it to every
/// subsequent request.
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl CloudClient {
    /// Create a client against the production service.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("heatlink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(DEFAULT_BASE_URL)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client` and base URL.
    ///
    /// Used by tests to point at a mock server.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// Install a previously obtained context key.
    pub fn set_token(&self, token: SecretString) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    /// Whether a context key is currently installed.
    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in with account credentials and store the returned context key.
    ///
    /// The key is also returned so callers can persist it for later
    /// sessions.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<SecretString, Error> {
        let url = self.endpoint_url("Login/ClientLogin")?;
        debug!("POST {url}");

        let request = LoginRequest {
            email,
            password: password.expose_secret(),
            language: 0,
            app_version: APP_VERSION,
            persist: true,
        };
        let resp = self.http.post(url).json(&request).send().await?;
        let login: LoginResponse = triage(resp).await?;

        if let Some(error_id) = login.error_id {
            return Err(Error::AuthFailed {
                message: login
                    .error_message
                    .unwrap_or_else(|| format!("login rejected (ErrorId {error_id})")),
            });
        }
        let Some(data) = login.login_data else {
            return Err(Error::AuthFailed {
                message: "login response carried no context key".into(),
            });
        };

        let token = SecretString::from(data.context_key);
        self.set_token(token.clone());
        info!("logged in to cloud service");
        Ok(token)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// Apply the stored context key, or fail if none is installed.
    fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.token.read().expect("token lock poisoned");
        match guard.as_ref() {
            Some(token) => Ok(builder.header("X-MitsContextKey", token.expose_secret())),
            None => Err(Error::AuthFailed {
                message: "no context key installed — log in first".into(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.authed(self.http.get(url))?.send().await?;
        triage(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {url}");
        let resp = self.authed(self.http.post(url).json(body))?.send().await?;
        triage(resp).await
    }
}

#[async_trait]
impl CloudTransport for CloudClient {
    /// List every registered device, flattening the building/area/floor
    /// nesting into one sequence.
    async fn list_devices(&self) -> Result<Vec<ListedDevice>, Error> {
        let url = self.endpoint_url("User/ListDevices")?;
        let buildings: Vec<ListedBuilding> = self.get_json(url).await?;
        Ok(buildings
            .into_iter()
            .flat_map(ListedBuilding::flatten_devices)
            .collect())
    }

    async fn get_state(&self, device_id: u32, building_id: u32) -> Result<RawState, Error> {
        let mut url = self.endpoint_url("Device/Get")?;
        url.query_pairs_mut()
            .append_pair("id", &device_id.to_string())
            .append_pair("buildingID", &building_id.to_string());
        self.get_json(url).await
    }

    async fn set_state(
        &self,
        device_id: u32,
        building_id: u32,
        write: &StateWrite,
    ) -> Result<(), Error> {
        let path = match write.family {
            DeviceTypeCode::AirToAir => "Device/SetAta",
            DeviceTypeCode::AirToWater => "Device/SetAtw",
            DeviceTypeCode::Unknown(_) => {
                return Err(Error::Unsupported("set_state on unknown device family"));
            }
        };
        let url = self.endpoint_url(path)?;

        let mut body = json!({
            "DeviceID": device_id,
            "BuildingID": building_id,
            "EffectiveFlags": write.effective_flags,
            "HasPendingCommand": true,
        });
        body[write.field.as_str()] = write.value.clone();

        // The service echoes the updated state; the confirming value is
        // taken from the next fetch cycle, so the echo is discarded.
        let _echo: serde_json::Value = self.post_json(url, &body).await?;
        Ok(())
    }
}

// ── Response triage ─────────────────────────────────────────────────

/// Classify the HTTP status, then decode the body.
///
/// 401 maps to `AuthFailed`, 429 to `RateLimited` (with any `Retry-After`
/// the service sent), other non-success statuses to `Api`. A body that
/// fails to decode becomes `MalformedResponse` with a preview attached.
async fn triage<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::AuthFailed {
            message: "context key rejected (HTTP 401)".into(),
        });
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);
        return Err(Error::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: body[..body.len().min(200)].to_owned(),
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview = &body[..body.len().min(200)];
        Error::MalformedResponse {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}
