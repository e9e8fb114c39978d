//! Identifier authority client (OSID REST service)
//!
//! The authority hands out permanent identifiers in two steps: a gene-level
//! batch request creating an id-set, and a transcript-level patch on that
//! id-set returning transcript/protein identifiers per gene. Both fail
//! fatally on a non-success HTTP status; there are no retries.

use async_trait::async_trait;
use idalloc_common::{AllocError, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default timeout for authority requests in seconds.
/// Can be overridden via the OSID_TIMEOUT_SECS environment variable.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Result of a gene-level batch allocation
#[derive(Debug, Clone)]
pub struct GeneIdSet {
    /// Batch token correlating the later transcript-patch call
    pub set_id: i64,
    /// Newly generated gene identifiers, in allocation order
    pub gene_ids: Vec<String>,
}

/// One item of a transcript-patch request
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptPatch {
    #[serde(rename = "geneId")]
    pub gene_id: String,
    pub transcripts: usize,
}

/// One gene entry of a transcript-patch response
#[derive(Debug, Clone, Deserialize)]
pub struct AllocatedGene {
    #[serde(rename = "geneId")]
    pub gene_id: String,
    #[serde(default)]
    pub transcripts: Vec<String>,
    #[serde(default)]
    pub proteins: Vec<String>,
}

/// The identifier-issuing authority, seen through its logical operations
#[async_trait]
pub trait IdAuthority: Send + Sync {
    /// Resolve an organism's numeric id from its production name
    async fn organism_id(&self, organism_name: &str) -> Result<i64>;

    /// Create an id-set with `count` freshly generated gene identifiers.
    /// `count` may be zero; the result then carries only the batch token.
    async fn allocate_genes(&self, organism_id: i64, count: usize) -> Result<GeneIdSet>;

    /// Attach transcript counts to an id-set and read back the generated
    /// transcript and protein identifiers per gene.
    async fn allocate_transcripts(
        &self,
        set_id: i64,
        patch: &[TranscriptPatch],
    ) -> Result<Vec<AllocatedGene>>;
}

/// Connection settings for the OSID service
#[derive(Debug, Clone, Deserialize)]
pub struct OsidConfig {
    /// Base URL, e.g. `https://osid.example.org/api/`
    pub base_url: String,
    pub user: String,
    pub password: String,
    /// Identifier collection the organism belongs to
    pub collection_id: i64,
}

#[derive(Debug, Deserialize)]
struct OrganismRecord {
    #[serde(rename = "organismId")]
    organism_id: i64,
}

#[derive(Debug, Serialize)]
struct IdSetRequest {
    #[serde(rename = "collectionId")]
    collection_id: i64,
    #[serde(rename = "organismId")]
    organism_id: i64,
    #[serde(rename = "generateGenes")]
    generate_genes: usize,
}

#[derive(Debug, Deserialize)]
struct IdSetResponse {
    #[serde(rename = "idSetId")]
    id_set_id: i64,
    #[serde(rename = "generatedIds", default)]
    generated_ids: Vec<AllocatedGene>,
}

/// HTTP client for the OSID REST service
pub struct OsidClient {
    client: Client,
    config: OsidConfig,
}

impl OsidClient {
    pub fn new(config: OsidConfig) -> Result<Self> {
        let timeout_secs = std::env::var("OSID_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Surface a non-success status as the single fatal authority error
    async fn check(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(AllocError::authority(operation, status.as_u16(), message))
        }
    }
}

#[async_trait]
impl IdAuthority for OsidClient {
    async fn organism_id(&self, organism_name: &str) -> Result<i64> {
        let response = self
            .client
            .get(self.url("organisms"))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .query(&[("organismName", organism_name)])
            .send()
            .await?;
        let response = Self::check("organisms", response).await?;

        let organisms: Vec<OrganismRecord> = response.json().await?;
        let organism = organisms.first().ok_or_else(|| {
            AllocError::authority(
                "organisms",
                404,
                format!("organism '{organism_name}' is not registered with the authority"),
            )
        })?;

        debug!(organism = %organism_name, organism_id = organism.organism_id, "Resolved organism");
        Ok(organism.organism_id)
    }

    async fn allocate_genes(&self, organism_id: i64, count: usize) -> Result<GeneIdSet> {
        let request = IdSetRequest {
            collection_id: self.config.collection_id,
            organism_id,
            generate_genes: count,
        };

        let response = self
            .client
            .post(self.url("idSets"))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&request)
            .send()
            .await?;
        let response = Self::check("idSets", response).await?;

        let body: IdSetResponse = response.json().await?;
        debug!(
            id_set = body.id_set_id,
            requested = count,
            received = body.generated_ids.len(),
            "Allocated gene id set"
        );

        Ok(GeneIdSet {
            set_id: body.id_set_id,
            gene_ids: body.generated_ids.into_iter().map(|g| g.gene_id).collect(),
        })
    }

    async fn allocate_transcripts(
        &self,
        set_id: i64,
        patch: &[TranscriptPatch],
    ) -> Result<Vec<AllocatedGene>> {
        let url = self.url(&format!("idSets/{set_id}"));

        let response = self
            .client
            .patch(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&patch)
            .send()
            .await?;
        Self::check("idSets patch", response).await?;

        // The patch response does not echo the generated identifiers; a
        // follow-up read on the id-set does.
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .await?;
        let response = Self::check("idSets read-back", response).await?;

        let body: IdSetResponse = response.json().await?;
        Ok(body.generated_ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OsidClient {
        OsidClient::new(OsidConfig {
            base_url: format!("{}/", server.uri()),
            user: "pipeline".to_string(),
            password: "secret".to_string(),
            collection_id: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_organism_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/organisms"))
            .and(query_param("organismName", "anopheles_gambiae"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"organismId": 7, "organismName": "anopheles_gambiae"}
            ])))
            .mount(&server)
            .await;

        let id = client_for(&server)
            .organism_id("anopheles_gambiae")
            .await
            .unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn allocates_gene_id_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idSets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "idSetId": 42,
                "generatedIds": [
                    {"geneId": "ABC00015", "transcripts": [], "proteins": []},
                    {"geneId": "ABC00016", "transcripts": [], "proteins": []}
                ]
            })))
            .mount(&server)
            .await;

        let set = client_for(&server).allocate_genes(7, 2).await.unwrap();
        assert_eq!(set.set_id, 42);
        assert_eq!(set.gene_ids, vec!["ABC00015", "ABC00016"]);
    }

    #[tokio::test]
    async fn patch_then_read_back_transcripts() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/idSets/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"idSetId": 42})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/idSets/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "idSetId": 42,
                "generatedIds": [
                    {"geneId": "ABC00015",
                     "transcripts": ["ABC00015_R001"],
                     "proteins": ["ABC00015_P001"]}
                ]
            })))
            .mount(&server)
            .await;

        let patch = [TranscriptPatch {
            gene_id: "ABC00015".to_string(),
            transcripts: 1,
        }];
        let allocated = client_for(&server)
            .allocate_transcripts(42, &patch)
            .await
            .unwrap();

        assert_eq!(allocated.len(), 1);
        assert_eq!(allocated[0].transcripts, vec!["ABC00015_R001"]);
        assert_eq!(allocated[0].proteins, vec!["ABC00015_P001"]);
    }

    #[tokio::test]
    async fn non_success_status_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idSets"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).allocate_genes(7, 2).await.unwrap_err();
        assert!(matches!(
            err,
            AllocError::Authority { status: 503, .. }
        ));
    }
}
