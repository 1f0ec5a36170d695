//! A [`Facilitator`] implementation backed by a remote x402 facilitator
//! over HTTP.
//!
//! Speaks `POST /verify`, `POST /settle`, and
//! `GET /supported?chainId=&tokenAddress=` as JSON, with an optional
//! `Authorization: Bearer <api key>` header and per-request timeout.
//!
//! Failure semantics follow the pipeline's needs: transport failures on
//! `verify`/`settle` surface as typed errors for the pipeline to map to
//! 402/500, while a transport failure on `supported` degrades to an
//! empty kinds list so requirements construction stays live.

use std::time::Duration;

use http::StatusCode;
use reqwest::Client;
use tracing::warn;
use url::Url;

use g402::facilitator::{Facilitator, SupportedQuery};
use g402_proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

use crate::constants::{
    DEFAULT_FACILITATOR_URL, SUPPORTED_CHAIN_ID_PARAM, SUPPORTED_TOKEN_ADDRESS_PARAM,
};

/// Errors that can occur while talking to a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
}

/// A client for a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator.
    base_url: Url,
    /// Full URL for `POST /verify`.
    verify_url: Url,
    /// Full URL for `POST /settle`.
    settle_url: Url,
    /// Full URL for `GET /supported`.
    supported_url: Url,
    /// Shared reqwest HTTP client.
    client: Client,
    /// Optional bearer token sent as `Authorization`.
    api_key: Option<String>,
    /// Optional per-request timeout.
    timeout: Option<Duration>,
}

impl FacilitatorClient {
    /// Constructs a client against the built-in production facilitator.
    ///
    /// # Panics
    ///
    /// Never panics in practice: the built-in URL is valid.
    #[must_use]
    pub fn production() -> Self {
        Self::try_from(DEFAULT_FACILITATOR_URL).expect("built-in facilitator URL is valid")
    }

    /// Constructs a client from a base URL.
    ///
    /// Endpoint URLs (`./verify`, `./settle`, `./supported`) are
    /// precomputed relative to the base.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError::UrlParse`] if endpoint URL
    /// construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let verify_url = base_url
            .join("./verify")
            .map_err(|e| FacilitatorClientError::UrlParse {
                context: "Failed to construct ./verify URL",
                source: e,
            })?;
        let settle_url = base_url
            .join("./settle")
            .map_err(|e| FacilitatorClientError::UrlParse {
                context: "Failed to construct ./settle URL",
                source: e,
            })?;
        let supported_url =
            base_url
                .join("./supported")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./supported URL",
                    source: e,
                })?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            supported_url,
            client: Client::new(),
            api_key: None,
            timeout: None,
        })
    }

    /// Returns the base URL used by this client.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./verify` URL.
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL.
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the computed `./supported` URL.
    pub const fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    /// Attaches a bearer API key to all future requests.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends a `POST /verify` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP round-trip fails.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .await
    }

    /// Sends a `POST /settle` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP round-trip fails.
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .await
    }

    /// Sends a `GET /supported` request with optional `chainId` and
    /// `tokenAddress` query parameters.
    ///
    /// A transport-level send failure degrades to an empty kinds list
    /// (logged) so that requirements construction stays live when the
    /// facilitator is briefly unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] on a non-200 status or an
    /// undecodable body.
    pub async fn supported(
        &self,
        query: &SupportedQuery,
    ) -> Result<SupportedResponse, FacilitatorClientError> {
        let context = "GET /supported";
        let mut url = self.supported_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(chain_id) = query.chain_id {
                pairs.append_pair(SUPPORTED_CHAIN_ID_PARAM, &chain_id.to_string());
            }
            if let Some(token) = &query.token_address {
                pairs.append_pair(SUPPORTED_TOKEN_ADDRESS_PARAM, token);
            }
        }

        let request = self.apply_options(self.client.get(url));
        let http_response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "facilitator supported() unreachable, returning empty kinds");
                return Ok(SupportedResponse::default());
            }
        };

        if http_response.status() == StatusCode::OK {
            http_response
                .json::<SupportedResponse>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }

    /// Generic POST helper handling JSON serialization, auth, timeout,
    /// and error mapping. `context` names the endpoint in errors.
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let request = self.apply_options(self.client.post(url.clone()).json(payload));
        let http_response = request
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response.text().await.unwrap_or_default();
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }

    fn apply_options(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request
    }
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        Self::verify(self, request).await
    }

    async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        Self::settle(self, request).await
    }

    async fn supported(
        &self,
        query: &SupportedQuery,
    ) -> Result<SupportedResponse, FacilitatorClientError> {
        Self::supported(self, query).await
    }
}

/// Converts a string URL into a [`FacilitatorClient`], normalizing
/// trailing slashes so relative endpoint joins behave.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, FacilitatorClientError> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, FacilitatorClientError> {
        Self::try_from(value.as_str())
    }
}
