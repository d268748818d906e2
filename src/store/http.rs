use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Response, Url};
use std::marker::PhantomData;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::model::{EditableRecord, Id};
use crate::store::traits::RecordBackend;

/// Backend collection endpoint reached over HTTP.
///
/// Talks to `{base_url}/{collection}` and `{base_url}/{collection}/{key}`
/// where `collection` comes from the record kind.
#[derive(Debug, Clone)]
pub struct HttpBackend<R> {
    client: Client,
    base_url: Url,
    _kind: PhantomData<fn() -> R>,
}

impl<R: EditableRecord> HttpBackend<R> {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid backend base url '{}'", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Backend base url '{}' cannot be used as a base", config.base_url);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            _kind: PhantomData,
        })
    }

    fn url(&self, key: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Backend base url cannot be used as a base"))?;
            segments.pop_if_empty().push(R::KIND.collection());
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        bail!("{} returned {}: {}", url, status, body)
    }
}

#[async_trait::async_trait]
impl<R: EditableRecord> RecordBackend<R> for HttpBackend<R> {
    async fn get_all(&self) -> Result<Vec<R>> {
        let response = self
            .client
            .get(self.url(None)?)
            .send()
            .await
            .with_context(|| format!("Failed to list {}", R::KIND.collection()))?;
        let records = Self::check(response).await?.json::<Vec<R>>().await?;
        Ok(records)
    }

    async fn get(&self, key: &str) -> Result<R> {
        let response = self
            .client
            .get(self.url(Some(key))?)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} '{}'", R::KIND, key))?;
        let record = Self::check(response).await?.json::<R>().await?;
        Ok(record)
    }

    async fn create(&self, record: R) -> Result<R> {
        let response = self
            .client
            .post(self.url(None)?)
            .json(&record)
            .send()
            .await
            .with_context(|| format!("Failed to create {} '{}'", R::KIND, record.business_key()))?;
        let created = Self::check(response).await?.json::<R>().await?;
        Ok(created)
    }

    async fn update(&self, previous_key: &Id, record: R) -> Result<R> {
        let response = self
            .client
            .put(self.url(Some(previous_key))?)
            .json(&record)
            .send()
            .await
            .with_context(|| format!("Failed to update {} '{}'", R::KIND, previous_key))?;
        let updated = Self::check(response).await?.json::<R>().await?;
        Ok(updated)
    }

    async fn delete(&self, key: &Id) -> Result<()> {
        let response = self
            .client
            .delete(self.url(Some(key))?)
            .send()
            .await
            .with_context(|| format!("Failed to delete {} '{}'", R::KIND, key))?;
        Self::check(response).await?;
        Ok(())
    }
}
