use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::errors::AppError;
use crate::stripe_models::{
    CheckoutSession, LineItem, Product, StripeErrorBody, StripeList, StripeSubscription,
    USER_ID_METADATA_KEY,
};

/// Parameters for a subscription-mode checkout session.
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub price_id: String,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Operations the application needs from the payments provider.
#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    async fn list_line_items(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<LineItem>, AppError>;

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, AppError>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, AppError>;

    /// Schedule cancellation at the end of the current billing period.
    async fn schedule_cancellation(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, AppError>;

    async fn create_checkout_session(
        &self,
        checkout: &NewCheckout,
    ) -> Result<CheckoutSession, AppError>;

    /// Retrieve a checkout session with its subscription expanded.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, AppError>;
}

/// Client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: Url,
    secret_key: String,
    /// Product names rarely change; cache them for an hour.
    product_cache: Cache<String, Product>,
}

impl StripeClient {
    /// Creates a new `StripeClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The Stripe API base URL (normally `https://api.stripe.com`).
    /// * `secret_key` - The secret API key.
    pub fn new(base_url: &str, secret_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Upstream(format!("Failed to create Stripe client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid Stripe base URL: {}", e)))?;

        let product_cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(1_000)
            .build();

        Ok(Self {
            client,
            base_url,
            secret_key,
            product_cache,
        })
    }

    /// Builds `{base}/v1/<segments...>`, percent-encoding each segment so
    /// caller-supplied ids cannot change the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Stripe base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        form: Option<&[(&str, String)]>,
    ) -> Result<T, AppError> {
        tracing::debug!("Stripe request: {} {}", method, url.path());

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.secret_key)
            .query(query);
        if let Some(form) = form {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| "Unknown error".to_string());

            if status == StatusCode::NOT_FOUND {
                return Err(AppError::NotFound(message));
            }
            return Err(AppError::Upstream(format!(
                "Stripe returned {}: {}",
                status, message
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentsProvider for StripeClient {
    async fn list_line_items(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<LineItem>, AppError> {
        let url = self.endpoint(&["checkout", "sessions", session_id, "line_items"])?;
        let list: StripeList<LineItem> = self
            .send(Method::GET, url, &[("limit", limit.to_string())], None)
            .await?;
        Ok(list.data)
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, AppError> {
        if let Some(product) = self.product_cache.get(product_id).await {
            tracing::debug!("Product cache HIT: {}", product_id);
            return Ok(product);
        }

        let url = self.endpoint(&["products", product_id])?;
        let product: Product = self.send(Method::GET, url, &[], None).await?;
        self.product_cache
            .insert(product_id.to_string(), product.clone())
            .await;
        Ok(product)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, AppError> {
        let url = self.endpoint(&["subscriptions", subscription_id])?;
        self.send(Method::GET, url, &[], None).await
    }

    async fn schedule_cancellation(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, AppError> {
        tracing::info!(
            "Scheduling cancellation at period end for {}",
            subscription_id
        );
        let url = self.endpoint(&["subscriptions", subscription_id])?;
        let form = [("cancel_at_period_end", "true".to_string())];
        self.send(Method::POST, url, &[], Some(&form[..])).await
    }

    async fn create_checkout_session(
        &self,
        checkout: &NewCheckout,
    ) -> Result<CheckoutSession, AppError> {
        let url = self.endpoint(&["checkout", "sessions"])?;
        let metadata_key = format!("metadata[{}]", USER_ID_METADATA_KEY);
        let form = [
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", checkout.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", checkout.success_url.clone()),
            ("cancel_url", checkout.cancel_url.clone()),
            (metadata_key.as_str(), checkout.user_id.clone()),
        ];

        let session: CheckoutSession = self.send(Method::POST, url, &[], Some(&form[..])).await?;
        tracing::info!(
            "Created checkout session {} for user {}",
            session.id,
            checkout.user_id
        );
        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, AppError> {
        let url = self.endpoint(&["checkout", "sessions", session_id])?;
        self.send(
            Method::GET,
            url,
            &[("expand[]", "subscription".to_string())],
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = StripeClient::new("https://api.stripe.com", "sk_test".to_string());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_endpoint_encodes_ids() {
        let client = StripeClient::new("https://api.stripe.com", "sk_test".to_string()).unwrap();

        let url = client.endpoint(&["subscriptions", "../customers"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.stripe.com/v1/subscriptions/..%2Fcustomers"
        );
    }

    #[tokio::test]
    async fn test_endpoint_keeps_base_path() {
        let client = StripeClient::new("http://127.0.0.1:9999/stripe", "sk".to_string()).unwrap();

        let url = client.endpoint(&["products", "prod_1"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9999/stripe/v1/products/prod_1");
    }
}
