//! Request gateway for the market API.

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::types::{
    CreateListingRequest, LeaderboardEntry, RegisterRequest, RegisteredAccount, STARTING_BALANCE,
    TokenResponse, TradeSide,
};
use crate::error::{Error, Result};
use crate::session::SessionStore;
use crate::state::{Holding, Listing, UserRecord};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// High-level API client.
///
/// Every call reads the credential at dispatch time, so a credential set
/// or cleared on the [`SessionStore`] applies from the very next request.
/// Nothing is retried here.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Dispatch a request and classify the outcome.
    ///
    /// A 401 clears the session before the error is returned, unless the
    /// credential the request carried was already replaced.
    pub async fn call(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let sent_with = self.session.state();
        request.authorization = sent_with.credential.as_ref().map(|c| c.bearer());

        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        debug!(status = response.status, "{} {}", method, path);

        if response.is_success() {
            return Ok(response);
        }

        let message = error_message(&response);
        match response.status {
            401 => {
                if self.session.clear_credential_if(sent_with.epoch) {
                    warn!("{} {} unauthorized, ending session", method, path);
                }
                Err(Error::unauthorized(message))
            }
            status @ 400..=499 => Err(Error::client(status, message)),
            status @ 500..=599 => Err(Error::server(status, message)),
            status => Err(Error::decode(format!(
                "Unexpected HTTP {} from {} {}",
                status, method, path
            ))),
        }
    }

    /// Exchange username and password for a bearer token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request =
            ApiRequest::post("/token").form(&[("username", username), ("password", password)]);
        let token: TokenResponse = decode(self.call(request).await?)?;
        Ok(token.access_token)
    }

    /// Create an account with the standard starting balance.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<RegisteredAccount> {
        let body = RegisterRequest {
            username: username.to_string(),
            password_hash: password.to_string(),
            balance: STARTING_BALANCE,
        };
        let request = ApiRequest::post("/register").json(serde_json::to_value(body)?);
        decode(self.call(request).await?)
    }

    /// Fetch the user behind the current credential.
    pub async fn current_user(&self) -> Result<UserRecord> {
        decode(self.call(ApiRequest::get("/users/me")).await?)
    }

    /// Fetch a user's holdings.
    pub async fn portfolio(&self, user_id: i64) -> Result<Vec<Holding>> {
        decode(self.call(ApiRequest::get(format!("/portfolio/{}", user_id))).await?)
    }

    /// Fetch all listings.
    pub async fn listings(&self) -> Result<Vec<Listing>> {
        decode(self.call(ApiRequest::get("/posts/")).await?)
    }

    /// Create a listing owned by the authenticated user.
    pub async fn create_listing(&self, content: &str) -> Result<Listing> {
        let body = CreateListingRequest {
            content: content.to_string(),
        };
        let request = ApiRequest::post("/posts/").json(serde_json::to_value(body)?);
        decode(self.call(request).await?)
    }

    /// Fetch the net worth ranking.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        decode(self.call(ApiRequest::get("/leaderboard")).await?)
    }

    /// Buy or sell shares. The response body is not interpreted.
    #[instrument(skip(self))]
    pub async fn trade(&self, side: TradeSide, post_id: i64, amount: u32) -> Result<()> {
        let request = ApiRequest::post(side.path())
            .query("post_id", post_id)
            .query("amount", amount);
        self.call(request).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T> {
    serde_json::from_str(&response.body)
        .map_err(|e| Error::decode(format!("Unexpected response body: {}", e)))
}

/// Pull a human-readable message out of an error body.
///
/// The API reports failures as `{"detail": "..."}`, or a list of
/// `{"msg": "..."}` entries for request validation failures.
fn error_message(response: &ApiResponse) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| match body.get("detail")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        });

    match detail {
        Some(detail) => detail,
        None if !response.body.trim().is_empty() => response.body.trim().to_string(),
        None => format!("HTTP {}", response.status),
    }
}
