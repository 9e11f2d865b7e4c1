//! Multi-document validation.
//!
//! Documents are independent, so a batch is a bounded worker pool: up to
//! `workers` validations in flight, results kept in input order, one
//! document's failure never touching another. After the pool drains, uploads
//! that are the same file (input digest) or a re-scan of one (raster
//! fingerprint) are marked so the UI can warn about them.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{ValidationRequest, Validator};
use crate::error::EngineError;
use crate::models::{DeclaredFormat, TemplateKey, ValidationReport};
use crate::pipeline::hash::fingerprint_similarity;
use crate::templates::TemplateResolver;

/// Raster fingerprint similarity at which two uploads count as one document.
pub const NEAR_DUPLICATE_SIMILARITY: f64 = 0.97;

#[derive(Debug, Clone)]
pub struct BatchDocument {
    pub name: String,
    pub bytes: Vec<u8>,
    pub format: DeclaredFormat,
    pub template_key: Option<TemplateKey>,
}

/// Engine error flattened for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&EngineError> for BatchFailure {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DuplicateStatus {
    New,
    /// Byte-identical to an earlier document of the batch.
    SameFile { of: usize },
    /// Different bytes, same page (re-scan, re-encode).
    NearDuplicate { of: usize, similarity: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    /// Assigned by the batch, not by the engine.
    pub id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchFailure>,
    pub duplicate: DuplicateStatus,
}

pub struct BatchValidator<'a> {
    validator: &'a dyn Validator,
    resolver: &'a dyn TemplateResolver,
    workers: usize,
    offline_mode: bool,
}

impl<'a> BatchValidator<'a> {
    pub fn new(
        validator: &'a dyn Validator,
        resolver: &'a dyn TemplateResolver,
        workers: usize,
    ) -> Self {
        Self {
            validator,
            resolver,
            workers: workers.max(1),
            offline_mode: false,
        }
    }

    pub fn offline(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    pub async fn run(&self, documents: Vec<BatchDocument>) -> Vec<BatchItem> {
        let total = documents.len();
        info!(documents = total, workers = self.workers, "Batch started");

        let mut items: Vec<BatchItem> = stream::iter(documents)
            .map(|doc| self.validate_one(doc))
            .buffered(self.workers)
            .collect()
            .await;
        mark_duplicates(&mut items);

        let failed = items.iter().filter(|i| i.error.is_some()).count();
        info!(documents = total, failed, "Batch complete");
        items
    }

    async fn validate_one(&self, doc: BatchDocument) -> BatchItem {
        let started_at = Utc::now();
        let mut request = ValidationRequest::new(doc.bytes, doc.format).offline(self.offline_mode);
        request.template_key = doc.template_key;
        let id = request.request_id;

        let (report, error) = match self.validator.validate(request, self.resolver).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!(name = %doc.name, code = e.code(), error = %e, "Document failed validation");
                (None, Some(BatchFailure::from(&e)))
            }
        };
        BatchItem {
            id,
            name: doc.name,
            started_at,
            finished_at: Utc::now(),
            report,
            error,
            duplicate: DuplicateStatus::New,
        }
    }
}

/// Each document points at the earliest earlier document it duplicates.
fn mark_duplicates(items: &mut [BatchItem]) {
    for i in 1..items.len() {
        let Some(current) = items[i].report.as_ref() else {
            continue;
        };
        let mut status = DuplicateStatus::New;
        for (j, earlier) in items[..i].iter().enumerate() {
            let Some(earlier) = earlier.report.as_ref() else {
                continue;
            };
            if earlier.input_digest == current.input_digest {
                status = DuplicateStatus::SameFile { of: j };
                break;
            }
            if let Some(similarity) =
                fingerprint_similarity(&earlier.raster_fingerprint, &current.raster_fingerprint)
            {
                if similarity >= NEAR_DUPLICATE_SIMILARITY {
                    status = DuplicateStatus::NearDuplicate { of: j, similarity };
                    break;
                }
            }
        }
        items[i].duplicate = status;
    }
}
