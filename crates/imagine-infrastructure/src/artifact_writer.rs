//! Writes generated images to a record directory.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use imagine_core::generation::ImageEncoding;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
});

/// Errors that can occur while saving one image.
#[derive(Debug)]
pub enum ArtifactError {
    /// The payload was not valid base64.
    Decode(base64::DecodeError),
    /// The image URL could not be fetched.
    Fetch(reqwest::Error),
    /// Writing the file failed.
    Io(std::io::Error),
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::Decode(e) => write!(f, "base64 decode error: {}", e),
            ArtifactError::Fetch(e) => write!(f, "image download error: {}", e),
            ArtifactError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ArtifactError {}

impl From<base64::DecodeError> for ArtifactError {
    fn from(e: base64::DecodeError) -> Self {
        ArtifactError::Decode(e)
    }
}

impl From<reqwest::Error> for ArtifactError {
    fn from(e: reqwest::Error) -> Self {
        ArtifactError::Fetch(e)
    }
}

impl From<std::io::Error> for ArtifactError {
    fn from(e: std::io::Error) -> Self {
        ArtifactError::Io(e)
    }
}

/// Outcome of saving one batch of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSaveReport {
    pub saved: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchSaveReport {
    /// True when the batch had images but none of them could be saved.
    pub fn nothing_saved(&self) -> bool {
        self.total > 0 && self.saved == 0
    }
}

/// Decodes or downloads `payload` and writes the bytes to `path`.
pub async fn write_image(
    payload: &str,
    encoding: ImageEncoding,
    path: &Path,
) -> Result<(), ArtifactError> {
    let bytes = match encoding {
        ImageEncoding::Base64 => BASE64_STANDARD.decode(payload.trim())?,
        ImageEncoding::Url => HTTP_CLIENT
            .get(payload)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec(),
    };
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Path of the `index`-th image of a record.
pub fn image_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.png"))
}

/// Saves `images` as `{first_index}.png`, `{first_index + 1}.png`, ...
///
/// Numbering follows the position in `images`, so a failed image leaves a gap
/// instead of shifting later files. Failures are logged and counted; they
/// never abort the batch.
pub async fn write_batch(
    images: &[String],
    encoding: ImageEncoding,
    dir: &Path,
    first_index: usize,
) -> BatchSaveReport {
    let mut report = BatchSaveReport {
        total: images.len(),
        ..Default::default()
    };

    for (offset, payload) in images.iter().enumerate() {
        let index = first_index + offset;
        let path = image_path(dir, index);
        match write_image(payload, encoding, &path).await {
            Ok(()) => report.saved += 1,
            Err(e) => {
                tracing::warn!(image = index, error = %e, "failed to save image");
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn encoded(bytes: &[u8]) -> String {
        BASE64_STANDARD.encode(bytes)
    }

    /// Serves `GET /ok/{name}` with the body `{name}`; any other path is a 404.
    async fn serve_images() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(respond(socket));
            }
        });
        format!("http://{addr}")
    }

    async fn respond(mut socket: TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let request = String::from_utf8_lossy(&request);
        let path = request.split_whitespace().nth(1).unwrap_or("/");
        let response = match path.strip_prefix("/ok/") {
            Some(name) => format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{name}",
                name.len()
            ),
            None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_string(),
        };
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    /// An address nothing listens on.
    async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/ok/gone")
    }

    #[tokio::test]
    async fn test_write_image_decodes_base64() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.png");

        write_image(&encoded(b"\x89PNG data"), ImageEncoding::Base64, &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG data");
    }

    #[tokio::test]
    async fn test_malformed_image_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let images = vec![
            encoded(b"one"),
            encoded(b"two"),
            "%%% not base64 %%%".to_string(),
            encoded(b"four"),
            encoded(b"five"),
        ];

        let report = write_batch(&images, ImageEncoding::Base64, temp_dir.path(), 1).await;

        assert_eq!(
            report,
            BatchSaveReport {
                saved: 4,
                failed: 1,
                total: 5
            }
        );
        assert!(!report.nothing_saved());
        assert!(!temp_dir.path().join("3.png").exists());
        assert_eq!(std::fs::read(temp_dir.path().join("5.png")).unwrap(), b"five");
    }

    #[tokio::test]
    async fn test_numbering_continues_from_first_index() {
        let temp_dir = TempDir::new().unwrap();
        let images = vec![encoded(b"a"), encoded(b"b")];

        write_batch(&images, ImageEncoding::Base64, temp_dir.path(), 4).await;

        assert!(temp_dir.path().join("4.png").exists());
        assert!(temp_dir.path().join("5.png").exists());
    }

    #[tokio::test]
    async fn test_all_failures_reported() {
        let temp_dir = TempDir::new().unwrap();
        let missing_dir = temp_dir.path().join("missing");
        let images = vec![encoded(b"a")];

        let report = write_batch(&images, ImageEncoding::Base64, &missing_dir, 1).await;
        assert!(report.nothing_saved());
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_write_image_downloads_url() {
        let base = serve_images().await;
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.png");

        write_image(&format!("{base}/ok/fox"), ImageEncoding::Url, &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"fox");
    }

    #[tokio::test]
    async fn test_failed_download_is_isolated() {
        let base = serve_images().await;
        let temp_dir = TempDir::new().unwrap();
        let images = vec![
            format!("{base}/ok/one"),
            format!("{base}/missing"),
            refused_url().await,
            format!("{base}/ok/four"),
        ];

        let report = write_batch(&images, ImageEncoding::Url, temp_dir.path(), 1).await;

        assert_eq!(
            report,
            BatchSaveReport {
                saved: 2,
                failed: 2,
                total: 4
            }
        );
        assert_eq!(std::fs::read(temp_dir.path().join("1.png")).unwrap(), b"one");
        assert!(!temp_dir.path().join("2.png").exists());
        assert!(!temp_dir.path().join("3.png").exists());
        assert_eq!(std::fs::read(temp_dir.path().join("4.png")).unwrap(), b"four");
    }
}
