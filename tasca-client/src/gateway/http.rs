//! HTTP gateway - reqwest implementation of the backend operation set

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::error::ApiError;
use shared::intent::{AddItemInput, FinalizeInput, OpenTableInput, PaymentInput, SetQuantityInput};
use shared::models::{DiningTable, Sale};
use shared::types::Timestamp;

use super::{SaleGateway, TableOpened};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Networked gateway speaking the sale/table endpoints
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            // Prefer the typed error body
            if let Ok(api_err) = serde_json::from_str::<ApiError>(&text) {
                return Err(ClientError::Api(api_err));
            }
            return match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
                    Err(ClientError::Validation(text))
                }
                _ => Err(ClientError::Internal(text)),
            };
        }
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).send().await?;
        self.handle_response(response).await
    }

    async fn patch<T: DeserializeOwned, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.patch(self.url(path)).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.delete(self.url(path)).send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl SaleGateway for HttpGateway {
    async fn fetch_sale(&self, sale_id: &str) -> ClientResult<Sale> {
        self.get(&format!("sale/{sale_id}")).await
    }

    async fn changed_since(&self, since: Timestamp) -> ClientResult<Vec<Sale>> {
        self.get(&format!("sale?status=open&since={since}")).await
    }

    async fn add_item(&self, sale_id: &str, input: &AddItemInput) -> ClientResult<Sale> {
        self.post(&format!("sale/{sale_id}/items"), input).await
    }

    async fn set_item_quantity(
        &self,
        sale_id: &str,
        product_id: &str,
        input: &SetQuantityInput,
    ) -> ClientResult<Sale> {
        self.patch(&format!("sale/{sale_id}/items/{product_id}"), input)
            .await
    }

    async fn remove_item(
        &self,
        sale_id: &str,
        product_id: &str,
        item_id: Option<&str>,
    ) -> ClientResult<Sale> {
        let path = match item_id {
            Some(item_id) => format!("sale/{sale_id}/items/{product_id}?item_id={item_id}"),
            None => format!("sale/{sale_id}/items/{product_id}"),
        };
        self.delete(&path).await
    }

    async fn finalize(&self, sale_id: &str, input: &FinalizeInput) -> ClientResult<Sale> {
        self.post(&format!("sale/{sale_id}/finalize"), input).await
    }

    async fn register_payment(&self, sale_id: &str, input: &PaymentInput) -> ClientResult<Sale> {
        self.post(&format!("sale/{sale_id}/payments"), input).await
    }

    async fn cancel_sale(&self, sale_id: &str, reason: Option<&str>) -> ClientResult<Sale> {
        #[derive(serde::Serialize)]
        struct CancelBody<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<&'a str>,
        }
        self.post(&format!("sale/{sale_id}/cancel"), &CancelBody { reason })
            .await
    }

    async fn fetch_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.get(&format!("table/{table_id}")).await
    }

    async fn open_table(
        &self,
        table_id: &str,
        input: &OpenTableInput,
    ) -> ClientResult<TableOpened> {
        self.post(&format!("table/{table_id}/open"), input).await
    }

    async fn release_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.post_empty(&format!("table/{table_id}/release")).await
    }

    async fn reserve_table(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.post_empty(&format!("table/{table_id}/reserve")).await
    }

    async fn set_maintenance(&self, table_id: &str) -> ClientResult<DiningTable> {
        self.post_empty(&format!("table/{table_id}/maintenance"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_normalizes_slashes() {
        let gateway = HttpGateway::new(&ClientConfig::new("http://localhost:8080/")).unwrap();
        assert_eq!(gateway.url("/sale/1"), "http://localhost:8080/sale/1");
        assert_eq!(gateway.url("sale/1"), "http://localhost:8080/sale/1");
    }
}
