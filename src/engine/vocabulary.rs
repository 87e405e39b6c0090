use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Lists custom vocabularies from the engine's customization API.
///
/// Queried once at process startup; the selected id is read-only shared state
/// for every session afterwards.
pub struct VocabularyClient {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    output: Option<ListOutput>,
}

#[derive(Debug, Deserialize)]
struct ListOutput {
    #[serde(default)]
    vocabulary_list: Vec<VocabularyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct VocabularyEntry {
    pub vocabulary_id: String,
    #[serde(default)]
    pub gmt_create: Option<String>,
}

impl VocabularyClient {
    pub fn new(endpoint: String, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }

    /// List the account's vocabularies
    pub async fn list_vocabularies(&self) -> Result<Vec<VocabularyEntry>> {
        let body = json!({
            "model": "speech-biasing",
            "input": {
                "action": "list_vocabulary",
                "page_index": 0,
                "page_size": 100,
            },
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Vocabulary listing request failed")?
            .error_for_status()
            .context("Vocabulary listing rejected")?;

        let parsed: ListResponse = response
            .json()
            .await
            .context("Failed to parse vocabulary listing")?;

        Ok(parsed.output.map(|o| o.vocabulary_list).unwrap_or_default())
    }

    /// The most recently created vocabulary id, if any exist.
    ///
    /// The listing is ordered oldest-first, so the last entry wins.
    pub async fn latest_vocabulary(&self) -> Result<Option<String>> {
        let vocabularies = self.list_vocabularies().await?;
        info!("Found {} custom vocabularies", vocabularies.len());
        Ok(vocabularies.into_iter().last().map(|v| v.vocabulary_id))
    }
}
