use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;

/// Downloads `url` to `target` through a `.part` file, so an interrupted
/// download never looks like a cached artifact.
#[tracing::instrument(skip(runtime, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    target: &Path,
    http_client: &HttpClient,
) -> Result<()> {
    info!("Downloading {}...", url);

    let partial = target.with_file_name(format!(
        "{}.part",
        target
            .file_name()
            .with_context(|| format!("Invalid download target {:?}", target))?
            .to_string_lossy()
    ));

    let result = http_client
        .download_file(url, || {
            runtime
                .create_file(&partial)
                .with_context(|| format!("Failed to create {:?}", partial))
        })
        .await;

    if let Err(e) = result {
        if runtime.exists(&partial) {
            let _ = runtime.remove_file(&partial);
        }
        return Err(e);
    }

    runtime.rename(&partial, target)?;
    debug!("Saved {} to {:?}", url, target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use reqwest::Client;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_download_file_renames_part_file() {
        // --- Setup Mock Server ---
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/zlib-1.3.tar.gz")
            .with_status(200)
            .with_body("archive bytes")
            .create_async()
            .await;

        // --- Setup Runtime ---
        let mut runtime = MockRuntime::new();
        runtime
            .expect_create_file()
            .with(eq(PathBuf::from("/src/zlib/zlib-1.3.tar.gz.part")))
            .returning(|_| Ok(Box::new(std::io::sink())));
        runtime
            .expect_rename()
            .with(
                eq(PathBuf::from("/src/zlib/zlib-1.3.tar.gz.part")),
                eq(PathBuf::from("/src/zlib/zlib-1.3.tar.gz")),
            )
            .times(1)
            .returning(|_, _| Ok(()));

        // --- Execute ---
        let http_client = HttpClient::new(Client::new());
        download_file(
            &runtime,
            &format!("{}/zlib-1.3.tar.gz", server.url()),
            Path::new("/src/zlib/zlib-1.3.tar.gz"),
            &http_client,
        )
        .await
        .unwrap();

        // --- Verify ---
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_file_not_found_leaves_nothing() {
        // --- Setup Mock Server ---
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/zlib-1.3.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        // --- Setup Runtime ---
        // No create_file/rename expectations: the body is never written
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        // --- Execute ---
        let http_client = HttpClient::new(Client::new());
        let result = download_file(
            &runtime,
            &format!("{}/zlib-1.3.tar.gz", server.url()),
            Path::new("/src/zlib/zlib-1.3.tar.gz"),
            &http_client,
        )
        .await;

        // --- Verify ---
        mock.assert_async().await;
        assert!(result.is_err());
    }
}
