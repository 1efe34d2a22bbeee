//! REST implementation of [`StorageApi`].

use std::collections::HashSet;

use api_types::ClusterIdentity;
use api_types::ObjectQuery;
use api_types::ObjectType;
use error_stack::Report;
use error_stack::ResultExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::error::ClientResult;
use crate::StorageApi;

/// Upper bound on pages followed for one listing
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<Href>,
}

/// One page of a collection listing
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    records: Vec<serde_json::Value>,
    #[serde(default, rename = "_links")]
    links: Links,
}

/// HTTP client for the array's REST management interface.
pub struct OntapClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    page_size: usize,
    debug: bool,
}

impl OntapClient {
    /// Create a client from config.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Build`] if the base url is invalid or the HTTP client cannot be built
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .change_context(ClientError::Build {
                message: "failed to build HTTP client".to_string(),
            })?;

        let base_url = Url::parse(&config.base_url).change_context(ClientError::Build {
            message: format!("invalid base url: {}", config.base_url),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Report::new(ClientError::Build {
                message: format!("base url cannot have a path: {}", config.base_url),
            }));
        }

        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
            page_size: config.page_size.max(1),
            debug: config.debug,
        })
    }

    fn path_segments(object: &ObjectType) -> Vec<&str> {
        match object {
            ObjectType::Node => vec!["api", "cluster", "nodes"],
            ObjectType::Aggregate => vec!["api", "storage", "aggregates"],
            ObjectType::Svm => vec!["api", "svm", "svms"],
            ObjectType::Volume => vec!["api", "storage", "volumes"],
            ObjectType::Lun => vec!["api", "storage", "luns"],
            ObjectType::Snapshot => vec!["api", "storage", "volumes", "*", "snapshots"],
            ObjectType::Disk => vec!["api", "storage", "disks"],
            ObjectType::PerfRows(table) => {
                vec!["api", "cluster", "counter", "tables", table.as_str(), "rows"]
            }
        }
    }

    fn url_for(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Report::new(ClientError::Build {
                    message: format!("base url cannot have a path: {}", self.base_url),
                })
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> ClientResult<T> {
        if self.debug {
            tracing::debug!(url = %url, "GET");
        }

        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .change_context(ClientError::Request {
                url: url.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Report::new(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
            .attach_printable(body));
        }

        let bytes = response.bytes().await.change_context(ClientError::Request {
            url: url.to_string(),
        })?;
        if self.debug {
            tracing::debug!(url = %url, bytes = bytes.len(), "response received");
        }

        serde_json::from_slice(&bytes).change_context(ClientError::Decode {
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl StorageApi for OntapClient {
    async fn fetch_identity(&self) -> ClientResult<ClusterIdentity> {
        let mut url = self.url_for(&["api", "cluster"])?;
        url.query_pairs_mut()
            .append_pair("fields", "name,uuid,location");
        self.get_json(&url).await
    }

    async fn fetch_objects(
        &self,
        object: &ObjectType,
        query: &ObjectQuery,
    ) -> ClientResult<Vec<serde_json::Value>> {
        let mut url = self.url_for(&Self::path_segments(object))?;
        url.query_pairs_mut()
            .append_pair("fields", &query.to_param())
            .append_pair("max_records", &self.page_size.to_string());

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        loop {
            let page: Page = self.get_json(&url).await?;
            records.extend(page.records);
            visited.insert(url.clone());

            let Some(next) = page.links.next else {
                break;
            };
            let next_url = self
                .base_url
                .join(&next.href)
                .change_context(ClientError::Decode {
                    url: url.to_string(),
                })
                .attach_printable_lazy(|| format!("invalid next link: {}", next.href))?;
            if visited.contains(&next_url) {
                return Err(Report::new(ClientError::Decode {
                    url: url.to_string(),
                })
                .attach_printable(format!("next link loops back to {next_url}")));
            }
            if visited.len() >= MAX_PAGES {
                return Err(Report::new(ClientError::Decode {
                    url: url.to_string(),
                })
                .attach_printable(format!("listing exceeds {MAX_PAGES} pages")));
            }
            url = next_url;
        }

        tracing::debug!(object = %object, records = records.len(), "listing drained");
        Ok(records)
    }
}
