//! OME REST client

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::OmeClient;
use crate::error::Result;
use crate::parser::{OmeBook, UserOrder};

/// `reqwest`-backed OME client
#[derive(Debug, Clone)]
pub struct HttpOmeClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpOmeClient {
    /// Every request is abandoned after `timeout`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn book_url(&self, market: &str) -> String {
        format!("{}/book/{}", self.endpoint, market)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "OME request");
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl OmeClient for HttpOmeClient {
    async fn get_orders(&self, market: &str) -> Result<OmeBook> {
        let body = self.get_text(&self.book_url(market)).await?;
        OmeBook::parse(&body)
    }

    async fn get_users_orders(&self, market: &str, account: &str) -> Result<Vec<UserOrder>> {
        let url = format!("{}/{}", self.book_url(market), account);
        let body = self.get_text(&url).await?;
        UserOrder::parse_list(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_url_strips_trailing_slash() {
        let client =
            HttpOmeClient::new("http://localhost:8989/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.book_url("0xabc"), "http://localhost:8989/book/0xabc");
    }
}
