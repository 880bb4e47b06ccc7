//! Service factory for building the lifecycle collaborators.
//!
//! The default collaborators are constructed from configuration values but
//! are not part of the configuration itself.

use anyhow::Result;
use reqwest::Client;

use crate::{
    application::Collaborators,
    hooks::ScriptHooks,
    http::HttpClient,
    pipeline::SourceBuildPipeline,
    runtime::Runtime,
    state::StateStore,
    sync::SourceFetcher,
    verify::Sha256Verifier,
};

use super::config::Config;

/// Build the HTTP client used for source downloads
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(concat!("kiln/", env!("KILN_VERSION")))
        .build()?;
    Ok(HttpClient::new(client))
}

/// Container for the state store and the default collaborators.
pub struct Services<'a, R: Runtime> {
    pub store: StateStore<'a, R>,
    pub pipeline: SourceBuildPipeline<'a, R>,
    pub fetcher: SourceFetcher<'a, R>,
    pub verifier: Sha256Verifier<'a, R>,
    pub hooks: ScriptHooks<'a, R>,
}

impl<'a, R: Runtime> Services<'a, R> {
    pub fn from_config(runtime: &'a R, config: &Config) -> Result<Self> {
        Ok(Self {
            store: StateStore::new(runtime, config.registry_path(), &config.repo),
            pipeline: SourceBuildPipeline::new(runtime, config.build_dir(), config.manifests_dir()),
            fetcher: SourceFetcher::new(runtime, build_http_client()?),
            verifier: Sha256Verifier::new(runtime),
            hooks: ScriptHooks::new(runtime, config.hooks_dir(), &config.repo),
        })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            pipeline: &self.pipeline,
            fetcher: &self.fetcher,
            verifier: &self.verifier,
            hooks: &self.hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_build_http_client_sends_user_agent() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/src.tar.gz")
            .match_header("User-Agent", Matcher::Regex("^kiln/".to_string()))
            .with_body("data")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("src.tar.gz");

        let client = build_http_client().unwrap();
        let written = client
            .download_file(&format!("{}/src.tar.gz", server.url()), || {
                Ok(std::fs::File::create(&target)?)
            })
            .await;

        mock.assert_async().await;
        assert_eq!(written.unwrap(), 4);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "data");
    }
}
