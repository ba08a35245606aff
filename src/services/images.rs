//! Получение иллюстраций по фрагментам истории.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use reqwest::Client;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::services::{display_name, ImageSource};
use crate::text::prompt_url_path;
use crate::utils::fs::remove_quietly;

/// Клиент сервиса генерации картинок: GET по URL с текстом запроса
pub struct PollinationsClient {
    client: Client,
    base_url: String,
}

impl PollinationsClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { client, base_url })
    }

    pub fn image_url(&self, prompt: &str) -> String {
        format!("{}{}", self.base_url, prompt_url_path(prompt))
    }
}

#[async_trait::async_trait]
impl ImageSource for PollinationsClient {
    async fn fetch(&self, prompt: &str) -> AppResult<Option<Vec<u8>>> {
        let url = self.image_url(prompt);
        debug!("Запрос картинки: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Image service returned {} for \"{}\"", status, prompt);
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            warn!("Image service returned an empty body for \"{}\"", prompt);
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }
}

/// Скачивает по картинке на фрагмент и сохраняет их в `images_dir`.
///
/// Порядок путей совпадает с порядком фрагментов; фрагменты без картинки пропускаются.
/// При ошибке сервиса уже сохранённые картинки удаляются.
pub async fn fetch_images(
    source: Arc<dyn ImageSource>,
    fragments: &[String],
    images_dir: &Path,
    concurrency: usize,
) -> AppResult<Vec<PathBuf>> {
    let mut results = stream::iter(fragments.iter().cloned())
        .map(|fragment| {
            let source = Arc::clone(&source);
            async move {
                let image = source.fetch(&fragment).await;
                (fragment, image)
            }
        })
        .buffered(concurrency.max(1));

    let mut saved: Vec<PathBuf> = Vec::new();
    while let Some((fragment, image)) = results.next().await {
        let outcome: AppResult<Option<PathBuf>> = match image {
            Ok(Some(bytes)) => {
                let path = images_dir.join(format!("image_{}.jpg", Uuid::new_v4()));
                tokio::fs::write(&path, &bytes)
                    .await
                    .map(|_| Some(path))
                    .map_err(Into::into)
            }
            Ok(None) => {
                warn!("Пропуск фрагмента без картинки: \"{}\"", fragment);
                Ok(None)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Some(path)) => {
                debug!("Сохранена картинка {}", display_name(&path));
                saved.push(path);
            }
            Ok(None) => {}
            Err(e) => {
                for path in &saved {
                    remove_quietly(path);
                }
                return Err(e);
            }
        }
    }

    info!("Получено {} картинок для {} фрагментов", saved.len(), fragments.len());
    Ok(saved)
}
