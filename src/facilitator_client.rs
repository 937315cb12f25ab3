//! HTTP client for the escrow endpoints of a remote x402 facilitator.
//!
//! Handles `POST /settle` (authorize and gasless actions) and
//! `POST /escrow/state`. Settlement failures come back as JSON bodies with
//! `success: false`, often under a non-200 status, so the body is decoded
//! whatever the status and only an undecodable non-200 body is a transport
//! error.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::types::{
    ActionSettleRequest, AuthorizeSettleRequest, EscrowStateRequest, EscrowStateResponse,
    SettleResponse,
};

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator (e.g. `https://facilitator.ultravioletadao.xyz/`)
    base_url: Url,
    /// Full URL to `POST /settle`
    settle_url: Url,
    /// Full URL to `POST /escrow/state`
    escrow_state_url: Url,
    client: Client,
    settle_timeout: Duration,
    state_timeout: Duration,
}

impl FacilitatorClient {
    /// Settlement waits for the on-chain transaction on the facilitator side.
    pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(120);
    pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Constructs a client from a base URL ending in `/`.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        let escrow_state_url =
            base_url
                .join("./escrow/state")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./escrow/state URL",
                    source: e,
                })?;
        Ok(Self {
            base_url,
            settle_url,
            escrow_state_url,
            client: Client::new(),
            settle_timeout: Self::DEFAULT_SETTLE_TIMEOUT,
            state_timeout: Self::DEFAULT_STATE_TIMEOUT,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn escrow_state_url(&self) -> &Url {
        &self.escrow_state_url
    }

    pub fn with_timeouts(mut self, settle: Duration, state: Duration) -> Self {
        self.settle_timeout = settle;
        self.state_timeout = state;
        self
    }

    /// `POST /settle` with a signed authorization.
    #[instrument(name = "x402.facilitator_client.authorize", skip_all, err)]
    pub async fn settle_authorization(
        &self,
        request: &AuthorizeSettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(
            &self.settle_url,
            "POST /settle",
            self.settle_timeout,
            request,
        )
        .await
    }

    /// `POST /settle` with a gasless escrow action.
    #[instrument(name = "x402.facilitator_client.settle_action", skip_all, err, fields(action = %request.action))]
    pub async fn settle_action(
        &self,
        request: &ActionSettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(
            &self.settle_url,
            "POST /settle",
            self.settle_timeout,
            request,
        )
        .await
    }

    /// `POST /escrow/state`.
    #[instrument(name = "x402.facilitator_client.escrow_state", skip_all, err)]
    pub async fn escrow_state(
        &self,
        request: &EscrowStateRequest,
    ) -> Result<EscrowStateResponse, FacilitatorClientError> {
        self.post_json(
            &self.escrow_state_url,
            "POST /escrow/state",
            self.state_timeout,
            request,
        )
        .await
    }

    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        timeout: Duration,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let http_response = self
            .client
            .post(url.clone())
            .json(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;

        match serde_json::from_str::<R>(&body) {
            Ok(parsed) => {
                if status != StatusCode::OK {
                    tracing::debug!(%status, context, "Facilitator answered with a non-200 JSON body");
                }
                Ok(parsed)
            }
            Err(source) if status == StatusCode::OK => {
                Err(FacilitatorClientError::JsonDeserialization { context, source })
            }
            Err(_) => Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            }),
        }
    }
}

/// Parses a base URL, normalizing it to a single trailing slash.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}
