use crate::error::ModerationError;
use crate::moderation::category::Category;
use crate::moderation::config::StoreConfig;
use crate::moderation::record::{Record, Status, StatusCounts};
use crate::moderation::util::truncate_with_ellipsis;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDeletion {
    Deleted,
    /// The key was already gone; treated as success by callers.
    AlreadyGone,
}

/// Operations the pull and reconcile stages need from the record and blob
/// stores.
pub trait RemoteStore {
    /// Pending records of one category, oldest first.
    fn list_pending(&self, category: Category) -> Result<Vec<Record>, ModerationError>;
    fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, ModerationError>;
    /// Re-applying the status a record already has must succeed.
    fn set_status(
        &self,
        category: Category,
        id: &str,
        status: Status,
    ) -> Result<(), ModerationError>;
    fn delete_blob(&self, url: &str) -> Result<BlobDeletion, ModerationError>;
    fn status_counts(&self, category: Category) -> Result<StatusCounts, ModerationError>;
}

/// Storage key of a public blob URL: everything after `/<bucket>/`, without
/// query string.
pub fn blob_key(url: &str, bucket: &str) -> Result<String, ModerationError> {
    let marker = format!("/{bucket}/");
    let Some((_, rest)) = url.split_once(&marker) else {
        return Err(ModerationError::InvalidBlobReference(url.to_string()));
    };
    let key = rest.split(['?', '#']).next().unwrap_or_default();
    if key.trim().is_empty() {
        return Err(ModerationError::InvalidBlobReference(url.to_string()));
    }
    Ok(key.to_string())
}

fn status_filter(target: Status) -> String {
    let allowed: Vec<&str> = [Status::Pending, Status::Approved, Status::Rejected]
        .into_iter()
        .filter(|from| from.can_transition_to(target))
        .map(Status::as_str)
        .collect();
    format!("in.({})", allowed.join(","))
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    status: Status,
}

/// PostgREST + storage API client.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    cfg: StoreConfig,
}

impl HttpStore {
    pub fn new(cfg: StoreConfig) -> Result<Self, ModerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self { client, cfg })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.cfg.service_key)
            .bearer_auth(&self.cfg.service_key)
    }

    fn table_url(&self, category: Category) -> String {
        format!("{}/rest/v1/{}", self.cfg.url, category.table())
    }

    fn ensure_success(response: Response, what: &str) -> Result<Response, ModerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ModerationError::RemoteUnavailable(format!(
            "{what} failed with status {status}: {}",
            truncate_with_ellipsis(&body, 160)
        )))
    }
}

impl RemoteStore for HttpStore {
    fn list_pending(&self, category: Category) -> Result<Vec<Record>, ModerationError> {
        let response = self
            .authed(self.client.get(self.table_url(category)))
            .query(&[
                ("status", "eq.pending"),
                ("select", "*"),
                ("order", "created_at.asc"),
            ])
            .send()?;
        let response = Self::ensure_success(response, &format!("list {}", category.table()))?;
        Ok(response.json::<Vec<Record>>()?)
    }

    fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, ModerationError> {
        let response = self.client.get(url).send()?;
        let response = Self::ensure_success(response, "blob download")?;
        Ok(response.bytes()?.to_vec())
    }

    fn set_status(
        &self,
        category: Category,
        id: &str,
        status: Status,
    ) -> Result<(), ModerationError> {
        let response = self
            .authed(self.client.patch(self.table_url(category)))
            .query(&[
                ("id", format!("eq.{id}")),
                ("status", status_filter(status)),
            ])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "status": status }))
            .send()?;
        let response = Self::ensure_success(response, &format!("update {id}"))?;
        let rows: Vec<StatusRow> = response.json()?;
        match rows.first() {
            Some(row) if row.status == status => Ok(()),
            _ => Err(ModerationError::TransitionRefused {
                id: id.to_string(),
                target: status.to_string(),
            }),
        }
    }

    fn delete_blob(&self, url: &str) -> Result<BlobDeletion, ModerationError> {
        let key = blob_key(url, &self.cfg.bucket)?;
        let endpoint = format!(
            "{}/storage/v1/object/{}/{}",
            self.cfg.url, self.cfg.bucket, key
        );
        let response = self.authed(self.client.delete(endpoint)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BlobDeletion::AlreadyGone);
        }
        Self::ensure_success(response, &format!("delete {key}"))?;
        Ok(BlobDeletion::Deleted)
    }

    fn status_counts(&self, category: Category) -> Result<StatusCounts, ModerationError> {
        let response = self
            .authed(self.client.get(self.table_url(category)))
            .query(&[("select", "status")])
            .send()?;
        let response = Self::ensure_success(response, &format!("count {}", category.table()))?;
        let rows: Vec<StatusRow> = response.json()?;
        let mut counts = StatusCounts::default();
        for row in rows {
            counts.add(row.status);
        }
        Ok(counts)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory store keyed by category, recording every mutating call.

    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        SetStatus(String, Status),
        DeleteBlob(String),
    }

    #[derive(Debug, Default)]
    pub struct FakeStore {
        pub records: RefCell<BTreeMap<Category, Vec<Record>>>,
        pub blobs: RefCell<BTreeMap<String, Vec<u8>>>,
        pub failing_lists: BTreeSet<Category>,
        pub failing_status_ids: BTreeSet<String>,
        pub failing_blob_urls: BTreeSet<String>,
        pub calls: RefCell<Vec<Call>>,
    }

    impl FakeStore {
        pub fn with_record(self, category: Category, record: Record) -> Self {
            self.records
                .borrow_mut()
                .entry(category)
                .or_default()
                .push(record);
            self
        }

        pub fn with_blob(self, url: &str, bytes: &[u8]) -> Self {
            self.blobs.borrow_mut().insert(url.to_string(), bytes.to_vec());
            self
        }

        pub fn status_of(&self, id: &str) -> Option<Status> {
            self.records
                .borrow()
                .values()
                .flatten()
                .find(|r| r.id == id)
                .map(|r| r.status)
        }

        pub fn deleted_blobs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|call| match call {
                    Call::DeleteBlob(url) => Some(url.clone()),
                    Call::SetStatus(..) => None,
                })
                .collect()
        }
    }

    impl RemoteStore for FakeStore {
        fn list_pending(&self, category: Category) -> Result<Vec<Record>, ModerationError> {
            if self.failing_lists.contains(&category) {
                return Err(ModerationError::RemoteUnavailable(format!(
                    "list {} failed with status 503",
                    category.table()
                )));
            }
            let mut out: Vec<Record> = self
                .records
                .borrow()
                .get(&category)
                .into_iter()
                .flatten()
                .filter(|r| r.status == Status::Pending)
                .cloned()
                .collect();
            out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(out)
        }

        fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, ModerationError> {
            self.blobs.borrow().get(url).cloned().ok_or_else(|| {
                ModerationError::RemoteUnavailable(format!("blob download failed: {url}"))
            })
        }

        fn set_status(
            &self,
            category: Category,
            id: &str,
            status: Status,
        ) -> Result<(), ModerationError> {
            self.calls
                .borrow_mut()
                .push(Call::SetStatus(id.to_string(), status));
            if self.failing_status_ids.contains(id) {
                return Err(ModerationError::RemoteUnavailable(format!("update {id}")));
            }
            let mut records = self.records.borrow_mut();
            let record = records
                .get_mut(&category)
                .and_then(|rows| rows.iter_mut().find(|r| r.id == id));
            match record {
                Some(record) if record.status.can_transition_to(status) => {
                    record.status = status;
                    Ok(())
                }
                _ => Err(ModerationError::TransitionRefused {
                    id: id.to_string(),
                    target: status.to_string(),
                }),
            }
        }

        fn delete_blob(&self, url: &str) -> Result<BlobDeletion, ModerationError> {
            self.calls
                .borrow_mut()
                .push(Call::DeleteBlob(url.to_string()));
            if self.failing_blob_urls.contains(url) {
                return Err(ModerationError::RemoteUnavailable(format!("delete {url}")));
            }
            match self.blobs.borrow_mut().remove(url) {
                Some(_) => Ok(BlobDeletion::Deleted),
                None => Ok(BlobDeletion::AlreadyGone),
            }
        }

        fn status_counts(&self, category: Category) -> Result<StatusCounts, ModerationError> {
            let mut counts = StatusCounts::default();
            for record in self.records.borrow().get(&category).into_iter().flatten() {
                counts.add(record.status);
            }
            Ok(counts)
        }
    }
}
