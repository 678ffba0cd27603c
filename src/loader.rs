//! Resolving image references into decoded images
//!
//! References come in three shapes: `blob:` URLs from the
//! [`ObjectUrlRegistry`], inline `data:` URLs, and `http(s)` URLs such as
//! the ones returned by the prediction service.

use crate::{
    data_url,
    error::{BgComposeError, Result},
    object_url::{ObjectUrlRegistry, OBJECT_URL_SCHEME},
    services::ImageIOService,
};
use image::DynamicImage;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Upper bound for downloading a remote image
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Loads images by reference
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: Client,
    registry: ObjectUrlRegistry,
}

impl ImageLoader {
    /// Loader with its own HTTP client bounded by [`DOWNLOAD_TIMEOUT`]
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(registry: ObjectUrlRegistry) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| BgComposeError::network_error("Failed to create HTTP client", e))?;
        Ok(Self::with_client(client, registry))
    }

    #[must_use]
    pub fn with_client(client: Client, registry: ObjectUrlRegistry) -> Self {
        Self { client, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    /// Resolve and decode `reference`.
    ///
    /// `which` names the image in error messages ("source", "background", ...).
    ///
    /// # Errors
    /// - `ImageLoad` for revoked blobs, malformed data URLs, failed
    ///   downloads, unsupported schemes and undecodable content
    #[instrument(skip(self, reference), fields(scheme = scheme_of(reference)))]
    pub async fn load(&self, which: &str, reference: &str) -> Result<DynamicImage> {
        let bytes = self
            .fetch_bytes(reference)
            .await
            .map_err(|e| with_context(which, reference, e))?;
        let image = ImageIOService::load_from_bytes(&bytes)
            .map_err(|e| with_context(which, reference, e))?;
        debug!(which, width = image.width(), height = image.height(), "Image loaded");
        Ok(image)
    }

    /// [`load`](Self::load), abandoned as soon as `cancel` fires
    ///
    /// # Errors
    /// - `Cancelled` when `cancel` fires first
    /// - Everything [`load`](Self::load) reports
    pub async fn load_cancellable(
        &self,
        which: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<DynamicImage> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(BgComposeError::cancelled(format!("loading of {} image cancelled", which)))
            }
            loaded = self.load(which, reference) => loaded,
        }
    }

    async fn fetch_bytes(&self, reference: &str) -> Result<Vec<u8>> {
        if reference.starts_with(OBJECT_URL_SCHEME) {
            return self
                .registry
                .resolve(reference)
                .map(|blob| blob.as_ref().clone())
                .ok_or_else(|| BgComposeError::image_load("object URL is not registered"));
        }

        if data_url::is_data_url(reference) {
            return Ok(data_url::decode(reference)?.bytes);
        }

        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self
                .client
                .get(reference)
                .send()
                .await
                .map_err(|e| BgComposeError::image_load(format!("download failed: {}", e)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(BgComposeError::image_load(format!("download failed: HTTP {}", status)));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| BgComposeError::image_load(format!("download failed: {}", e)))?;
            return Ok(bytes.to_vec());
        }

        Err(BgComposeError::image_load("unsupported reference scheme"))
    }
}

fn with_context(which: &str, reference: &str, error: BgComposeError) -> BgComposeError {
    match error {
        BgComposeError::ImageLoad(message) => {
            BgComposeError::image_load_error(which, reference, message)
        },
        other => BgComposeError::image_load_error(which, reference, other),
    }
}

fn scheme_of(reference: &str) -> &str {
    reference.split_once(':').map_or("", |(scheme, _)| scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255])));
        ImageIOService::encode(&image, OutputFormat::Png, 90).unwrap()
    }

    #[tokio::test]
    async fn test_load_blob_reference() {
        let registry = ObjectUrlRegistry::new();
        let loader = ImageLoader::new(registry.clone()).unwrap();
        let guard = registry.create_scoped(png_bytes(3, 2));

        let image = loader.load("source", guard.url()).await.unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[tokio::test]
    async fn test_revoked_blob_fails() {
        let registry = ObjectUrlRegistry::new();
        let loader = ImageLoader::new(registry.clone()).unwrap();
        let url = registry.create(png_bytes(1, 1));
        registry.revoke(&url);

        let err = loader.load("source", &url).await.unwrap_err();
        assert!(matches!(err, BgComposeError::ImageLoad(_)));
        assert!(err.to_string().contains("source image"));
    }

    #[tokio::test]
    async fn test_load_data_url() {
        let loader = ImageLoader::new(ObjectUrlRegistry::new()).unwrap();
        let reference = data_url::encode(&png_bytes(5, 4), "image/png");

        let image = loader.load("foreground", &reference).await.unwrap();
        assert_eq!((image.width(), image.height()), (5, 4));
    }

    #[tokio::test]
    async fn test_undecodable_content() {
        let loader = ImageLoader::new(ObjectUrlRegistry::new()).unwrap();
        let reference = data_url::encode(b"not an image", "image/png");
        let err = loader.load("foreground", &reference).await.unwrap_err();
        assert!(matches!(err, BgComposeError::ImageLoad(_)));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let loader = ImageLoader::new(ObjectUrlRegistry::new()).unwrap();
        let err = loader.load("background", "file:///etc/passwd").await.unwrap_err();
        assert!(err.to_string().contains("unsupported reference scheme"));
    }

    #[tokio::test]
    async fn test_stalled_download_is_cancellable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/stalled.png", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let loader = ImageLoader::new(ObjectUrlRegistry::new()).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            loader.load_cancellable("foreground", &url, &cancel),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, BgComposeError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_load() {
        let registry = ObjectUrlRegistry::new();
        let loader = ImageLoader::new(registry.clone()).unwrap();
        let guard = registry.create_scoped(png_bytes(1, 1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = loader.load_cancellable("source", guard.url(), &cancel).await.unwrap_err();
        assert!(matches!(err, BgComposeError::Cancelled(_)));
    }

    #[test]
    fn test_scheme_of() {
        assert_eq!(scheme_of("blob:abc"), "blob");
        assert_eq!(scheme_of("https://x"), "https");
        assert_eq!(scheme_of("nothing"), "");
    }
}
