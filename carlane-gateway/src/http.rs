//! HTTP implementation of the catalog gateway

use std::time::Duration;

use async_trait::async_trait;
use carlane_feed::VehicleRecord;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::{GatewayError, Result};
use crate::payload::{
    CreatedResponse, ListingResponse, PriceUpdatePayload, VehiclePayload,
};
use crate::{CatalogGateway, RemoteId, RemoteListing};

/// Gateway talking to the live platform REST API.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Build a gateway for `base_url` authenticating with a bearer
    /// token. Token acquisition is the caller's concern.
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {api_token}"))
            .map_err(|e| GatewayError::Config(format!("invalid API token: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map transport failures into the transient/permanent taxonomy.
    fn transport_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }

    /// Turn non-2xx responses into classified errors.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
            status if status.is_server_error() => GatewayError::Server {
                status: status.as_u16(),
                message,
            },
            status => GatewayError::Rejected {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl CatalogGateway for HttpGateway {
    async fn create_vehicle(&self, record: &VehicleRecord) -> Result<RemoteId> {
        debug!("Creating vehicle {}", record.external_id);
        let response = self
            .client
            .post(self.url("/vehicles"))
            .json(&VehiclePayload::from(record))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let created: CreatedResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(RemoteId(created.id))
    }

    async fn update_vehicle(&self, remote_id: &RemoteId, record: &VehicleRecord) -> Result<()> {
        debug!("Updating vehicle {} ({})", record.external_id, remote_id);
        let response = self
            .client
            .put(self.url(&format!("/vehicles/{remote_id}")))
            .json(&VehiclePayload::from(record))
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_price(
        &self,
        remote_id: &RemoteId,
        price: Decimal,
        is_decrease: bool,
    ) -> Result<()> {
        debug!(
            "Updating price for {} (price={}, decrease={})",
            remote_id, price, is_decrease
        );
        let response = self
            .client
            .post(self.url(&format!("/vehicles/{remote_id}/price")))
            .json(&PriceUpdatePayload {
                price: price.normalize(),
                notify_discount: is_decrease,
            })
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn close_vehicle(&self, remote_id: &RemoteId) -> Result<()> {
        debug!("Closing vehicle {}", remote_id);
        let response = self
            .client
            .post(self.url(&format!("/vehicles/{remote_id}/close")))
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_active_vehicles(&self) -> Result<Vec<RemoteListing>> {
        let response = self
            .client
            .get(self.url("/vehicles"))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let listings: Vec<ListingResponse> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(listings
            .into_iter()
            .map(|listing| RemoteListing {
                remote_id: RemoteId(listing.id),
                external_id: listing.external_id,
                sales_price: listing.pricing.and_then(|p| p.sales_price),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let gateway =
            HttpGateway::new("https://api.example.test/", "token", Duration::from_secs(10))
                .unwrap();
        assert_eq!(
            gateway.url("/vehicles/R1/close"),
            "https://api.example.test/vehicles/R1/close"
        );
    }

    #[test]
    fn rejects_unprintable_tokens() {
        let result = HttpGateway::new("https://api.example.test", "bad\ntoken", Duration::from_secs(1));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}
