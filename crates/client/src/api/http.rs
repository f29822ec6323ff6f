//! `reqwest` client for the marketplace REST service.

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use campus_market_core::{ItemId, Order, PaymentSessionId, PendingOrderPayload};

use super::{ApiError, CatalogSource, OrderGateway, PaymentSession};
use crate::catalog::CatalogItem;
use crate::config::ApiConfig;
use crate::session::UserSession;

/// Header carrying the per-attempt idempotency key.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest slice of an unparseable body kept as an error message.
const MAX_RAW_MESSAGE: usize = 200;

/// Client for the marketplace REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct MarketClient {
    inner: Arc<MarketClientInner>,
}

struct MarketClientInner {
    client: reqwest::Client,
    base_url: Url,
    return_url: Option<Url>,
}

/// Body of a payment session request: the order payload plus the page the
/// provider should send the buyer back to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest<'a> {
    #[serde(flatten)]
    payload: &'a PendingOrderPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<&'a Url>,
}

/// Response envelope shared by every endpoint.
///
/// `{ success, order | url | items | item | message }`; older endpoints call
/// the message `errorMessage` or `error`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Envelope {
    success: Option<bool>,
    order: Option<Order>,
    url: Option<Url>,
    #[serde(alias = "id")]
    session_id: Option<PaymentSessionId>,
    items: Option<Vec<CatalogItem>>,
    item: Option<CatalogItem>,
    #[serde(alias = "errorMessage", alias = "error")]
    message: Option<String>,
}

impl MarketClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("campus-market/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(MarketClientInner {
                client,
                base_url: config.base_url.clone(),
                return_url: config.return_url.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::Malformed(format!("invalid endpoint {path}: {e}")))
    }

    fn session_request<'a>(&'a self, payload: &'a PendingOrderPayload) -> SessionRequest<'a> {
        SessionRequest {
            payload,
            return_url: self.inner.return_url.as_ref(),
        }
    }

    /// Send a request and unwrap the response envelope.
    async fn send(&self, request: RequestBuilder) -> Result<Envelope, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        interpret(status, &body)
    }
}

impl OrderGateway for MarketClient {
    #[instrument(skip(self, session, payload), fields(user = %session.user_id, key = %payload.idempotency_key))]
    async fn place_order(
        &self,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("orders")?)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header(IDEMPOTENCY_HEADER, payload.idempotency_key.as_str())
            .json(payload);

        let envelope = self.send(request).await?;
        envelope
            .order
            .ok_or_else(|| ApiError::Malformed("order missing from response".to_string()))
    }

    #[instrument(skip(self, session, payload), fields(user = %session.user_id, key = %payload.idempotency_key))]
    async fn create_payment_session(
        &self,
        session: &UserSession,
        payload: &PendingOrderPayload,
    ) -> Result<PaymentSession, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("payments/session")?)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header(IDEMPOTENCY_HEADER, payload.idempotency_key.as_str())
            .json(&self.session_request(payload));

        let envelope = self.send(request).await?;
        debug!(url = ?envelope.url, "Payment session created");

        Ok(PaymentSession {
            id: envelope.session_id,
            url: envelope.url,
        })
    }

    #[instrument(skip(self, session, payload), fields(user = %session.user_id, session_ref = %session_ref))]
    async fn confirm_payment(
        &self,
        session: &UserSession,
        session_ref: &PaymentSessionId,
        payload: &PendingOrderPayload,
    ) -> Result<Order, ApiError> {
        let body = serde_json::json!({
            "sessionId": session_ref,
            "payload": payload,
        });

        let mut request = self
            .inner
            .client
            .post(self.endpoint("payments/confirm")?)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .json(&body);
        if !payload.idempotency_key.is_empty() {
            request = request.header(IDEMPOTENCY_HEADER, payload.idempotency_key.as_str());
        }

        let envelope = self.send(request).await?;
        envelope
            .order
            .ok_or_else(|| ApiError::Malformed("order missing from response".to_string()))
    }
}

impl CatalogSource for MarketClient {
    #[instrument(skip(self))]
    async fn list_catalog(&self) -> Result<Vec<CatalogItem>, ApiError> {
        let request = self.inner.client.get(self.endpoint("catalog")?);
        let envelope = self.send(request).await?;
        Ok(envelope.items.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn catalog_item(&self, id: &ItemId) -> Result<Option<CatalogItem>, ApiError> {
        let mut url = self.endpoint("catalog/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Malformed("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push(id.as_str());

        match self.send(self.inner.client.get(url)).await {
            Ok(envelope) => Ok(envelope.item),
            Err(ApiError::Rejected { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Turn a status and body into an envelope or an error.
///
/// A response counts as a rejection when the status is not 2xx or the body
/// says `success: false`. The server's message is passed on verbatim; a
/// non-JSON error body is used as the message (truncated).
fn interpret(status: StatusCode, body: &str) -> Result<Envelope, ApiError> {
    let parsed = if body.trim().is_empty() {
        Ok(Envelope::default())
    } else {
        serde_json::from_str::<Envelope>(body)
    };

    match parsed {
        Ok(envelope) if status.is_success() && envelope.success != Some(false) => Ok(envelope),
        Ok(envelope) => Err(ApiError::Rejected {
            status: status.as_u16(),
            message: envelope.message,
        }),
        Err(e) if status.is_success() => {
            warn!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            Err(ApiError::Malformed(e.to_string()))
        }
        Err(_) => {
            let raw: String = body.trim().chars().take(MAX_RAW_MESSAGE).collect();
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message: (!raw.is_empty()).then_some(raw),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use campus_market_core::OrderId;

    use super::*;

    #[test]
    fn test_interpret_success_with_order() {
        let envelope = interpret(
            StatusCode::CREATED,
            r#"{"success":true,"order":{"_id":"o1","status":"placed"}}"#,
        )
        .unwrap();
        assert_eq!(envelope.order.unwrap().id, OrderId::new("o1"));
    }

    #[test]
    fn test_interpret_success_false_is_rejection() {
        let err = interpret(
            StatusCode::OK,
            r#"{"success":false,"message":"Out of stock"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 200,
                message: Some("Out of stock".to_string())
            }
        );
    }

    #[test]
    fn test_interpret_accepts_error_message_aliases() {
        let err = interpret(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"errorMessage":"Address required"}"#,
        )
        .unwrap_err();
        assert_eq!(err.server_message(), Some("Address required"));

        let err = interpret(StatusCode::NOT_FOUND, r#"{"error":"Session not found"}"#).unwrap_err();
        assert_eq!(err.server_message(), Some("Session not found"));
    }

    #[test]
    fn test_interpret_plain_text_error_body() {
        let err = interpret(StatusCode::BAD_GATEWAY, "upstream timed out").unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 502,
                message: Some("upstream timed out".to_string())
            }
        );
    }

    #[test]
    fn test_interpret_empty_error_body_has_no_message() {
        let err = interpret(StatusCode::INTERNAL_SERVER_ERROR, "  ").unwrap_err();
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_interpret_garbage_success_body_is_malformed() {
        let err = interpret(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_interpret_payment_session() {
        let envelope = interpret(
            StatusCode::OK,
            r#"{"success":true,"url":"https://pay.example.com/c/abc","id":"cs_123"}"#,
        )
        .unwrap();
        assert_eq!(envelope.url.unwrap().host_str(), Some("pay.example.com"));
        assert_eq!(envelope.session_id, Some(PaymentSessionId::new("cs_123")));
    }

    fn client(return_url: Option<&str>) -> MarketClient {
        MarketClient::new(&ApiConfig {
            base_url: Url::parse("https://api.example.com/v1/").unwrap(),
            timeout: Duration::from_secs(5),
            return_url: return_url.map(|u| Url::parse(u).unwrap()),
        })
        .unwrap()
    }

    #[test]
    fn test_session_request_carries_return_url() {
        let payload = PendingOrderPayload {
            delivery_address: "Hostel B".to_string(),
            ..PendingOrderPayload::default()
        };

        let with_return = client(Some("https://campus.test/payment/success"));
        let body = serde_json::to_value(with_return.session_request(&payload)).unwrap();
        assert_eq!(body["returnUrl"], "https://campus.test/payment/success");
        assert_eq!(body["deliveryAddress"], "Hostel B");

        let body = serde_json::to_value(client(None).session_request(&payload)).unwrap();
        assert!(body.get("returnUrl").is_none());
        assert_eq!(body["deliveryAddress"], "Hostel B");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = client(None);
        assert_eq!(
            client.endpoint("payments/confirm").unwrap().as_str(),
            "https://api.example.com/v1/payments/confirm"
        );
    }
}
