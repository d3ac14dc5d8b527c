pub mod endpoints;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{GorillasError, Result};
use crate::token::TokenStore;

/// HTTP client wrapper for the Some Gorillas backend.
///
/// Authenticated calls carry `Authorization: Bearer <token>` read from the
/// token store at send time. A 401 on an authenticated call clears the token
/// before [`GorillasError::AuthFailed`] is returned.
#[derive(Debug, Clone)]
pub struct GorillasHttpClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
}

impl GorillasHttpClient {
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GorillasError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET an authenticated JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let req = self.client.get(self.url(path)).query(query);
        self.send_authenticated(req).await
    }

    /// GET a public JSON resource; no token is attached.
    pub async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let req = self.client.get(self.url(path)).query(query);
        self.send(req, false).await
    }

    /// POST without a body to an authenticated endpoint.
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.client.post(self.url(path));
        self.send_authenticated(req).await
    }

    /// POST a JSON body to an authenticated endpoint.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.client.post(self.url(path)).json(body);
        self.send_authenticated(req).await
    }

    /// POST a JSON body to a public endpoint; no token is attached.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.client.post(self.url(path)).json(body);
        self.send(req, false).await
    }

    /// DELETE an authenticated resource.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.client.delete(self.url(path));
        self.send_authenticated(req).await
    }

    async fn send_authenticated<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let req = match self.tokens.get() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        self.send(req, true).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        authenticated: bool,
    ) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED && authenticated {
            warn!("unauthorized response, clearing session token");
            if let Err(e) = self.tokens.clear() {
                warn!(error = %e, "failed to clear session token");
            }
            return Err(GorillasError::AuthFailed);
        }

        if !status.is_success() {
            let status = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            if status == 401 {
                return Err(GorillasError::Http {
                    status,
                    message: body,
                });
            }
            return Err(GorillasError::from_status(status, body));
        }

        let body = resp.bytes().await?;
        if body.is_empty() {
            return decode_empty();
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// A 204 or empty 200 decodes as `null`, or as an empty object for
/// defaulted payload structs.
fn decode_empty<T: DeserializeOwned>() -> Result<T> {
    serde_json::from_value(serde_json::Value::Null)
        .or_else(|_| serde_json::from_str("{}"))
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimResponse, ReferralSubmission};

    #[test]
    fn test_empty_body_decodes_defaulted_structs() {
        let claim: ClaimResponse = decode_empty().unwrap();
        assert_eq!(claim, ClaimResponse::default());
        let submission: ReferralSubmission = decode_empty().unwrap();
        assert_eq!(submission, ReferralSubmission::default());
        let value: serde_json::Value = decode_empty().unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_empty_body_rejected_for_lists() {
        assert!(decode_empty::<Vec<u32>>().is_err());
    }
}
