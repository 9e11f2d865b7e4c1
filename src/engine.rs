//! Validation orchestrator.
//!
//! Pipeline flow for one request:
//! 1. Digest + normalize on the blocking pool, bounded by the decode budget
//! 2. Shape extraction, then the profile invariant check
//! 3. Morph hash and raster fingerprint ‖ template lookup (bounded by the
//!    request deadline)
//! 4. Score, then assemble
//!
//! Cancellation is checked at every stage boundary. Nothing partial ever
//! leaves this module: a request yields a full report or an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError, Stage};
use crate::models::{
    DeclaredFormat, Provenance, Template, TemplateKey, ValidationReport, VerificationContext,
};
use crate::pipeline::assemble::{assemble, ReportParts};
use crate::pipeline::check_profile;
use crate::pipeline::extract::extract;
use crate::pipeline::hash::{input_digest, morph_hash, raster_fingerprint};
use crate::pipeline::normalize::normalize;
use crate::pipeline::score::score;
use crate::templates::TemplateResolver;

// ═══════════════════════════════════════════════════════════
// Request
// ═══════════════════════════════════════════════════════════

/// Cooperative cancellation flag, shared between the caller and the request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRequest {
    /// Log correlation only; never written into the report.
    pub request_id: Uuid,
    pub bytes: Vec<u8>,
    pub format: DeclaredFormat,
    /// Claimed institution and certificate type. `None` skips the lookup.
    pub template_key: Option<TemplateKey>,
    /// Recorded in the report; which resolver to pass is the caller's call.
    pub offline_mode: bool,
    pub cancel: CancelToken,
}

impl ValidationRequest {
    pub fn new(bytes: Vec<u8>, format: DeclaredFormat) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            bytes,
            format,
            template_key: None,
            offline_mode: false,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_template_key(mut self, key: TemplateKey) -> Self {
        self.template_key = Some(key);
        self
    }

    pub fn offline(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// ═══════════════════════════════════════════════════════════
// Validator seam
// ═══════════════════════════════════════════════════════════

/// Anything that turns a request into a report. The UI layer depends on
/// this, so the real and simulated engines are interchangeable.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        request: ValidationRequest,
        resolver: &dyn TemplateResolver,
    ) -> Result<ValidationReport, EngineError>;
}

// ═══════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn validate(
        &self,
        request: ValidationRequest,
        resolver: &dyn TemplateResolver,
    ) -> Result<ValidationReport, EngineError> {
        let started = Instant::now();
        let ValidationRequest {
            request_id,
            bytes,
            format,
            template_key,
            offline_mode,
            cancel,
        } = request;
        let runtime = &self.config.runtime;
        let request_budget = Duration::from_millis(runtime.request_timeout_ms);
        let deadline = tokio::time::Instant::now() + request_budget;

        info!(%request_id, bytes = bytes.len(), format = format.as_str(), "Validation started");
        cancel.check()?;

        // Step 1: digest + normalize
        let decode_ms = runtime.decode_timeout_ms.min(runtime.request_timeout_ms);
        let config = Arc::clone(&self.config);
        let decode = tokio::task::spawn_blocking(move || {
            let digest = input_digest(&bytes);
            normalize(&bytes, format, &config.normalizer).map(|doc| (doc, digest))
        });
        let (doc, digest) =
            match tokio::time::timeout(Duration::from_millis(decode_ms), decode).await {
                Err(_) => {
                    warn!(%request_id, budget_ms = decode_ms, "Decode timed out");
                    return Err(EngineError::Timeout {
                        stage: Stage::Decode,
                        budget_ms: decode_ms,
                    });
                }
                Ok(joined) => joined.map_err(task_failure)??,
            };
        cancel.check()?;

        // Step 2: extract
        let config = Arc::clone(&self.config);
        let (doc, profile) = tokio::task::spawn_blocking(move || {
            let profile = extract(&doc, &config.extractor);
            (doc, profile)
        })
        .await
        .map_err(task_failure)?;
        check_profile(&profile, self.config.extractor.overlap_tolerance)?;
        cancel.check()?;

        // Step 3: hash ‖ template lookup
        let normalization = doc.summary();
        let hashing = tokio::task::spawn_blocking(move || {
            let hash = morph_hash(&profile, &doc);
            let fingerprint = raster_fingerprint(doc.gray());
            (profile, hash, fingerprint)
        });
        let lookup = lookup_template(
            resolver,
            template_key.as_ref(),
            deadline,
            runtime.request_timeout_ms,
        );
        let (hashed, template) = tokio::join!(hashing, lookup);
        let (profile, hash, fingerprint) = hashed.map_err(task_failure)?;
        let template = template?;
        cancel.check()?;

        // Step 4: score + assemble
        let outcome = score(&profile, &hash, template.as_deref(), &self.config.scoring)?;
        let provenance = match template.as_deref() {
            Some(t) => Provenance::Template {
                template_id: t.id(),
                key: t.key.clone(),
                schema_version: t.schema_version,
                engine_version: t.engine_version,
            },
            None => Provenance::NoTemplate,
        };
        let report = assemble(
            ReportParts {
                profile,
                morph_hash: hash,
                score: outcome.score,
                zones: outcome.zones,
                provenance,
                normalization,
                verification: VerificationContext {
                    offline_mode,
                    template_source: resolver.source(),
                },
                input_digest: digest,
                raster_fingerprint: fingerprint,
            },
            &self.config.scoring.status,
        );

        info!(
            %request_id,
            score = report.forgery_score.value,
            status = report.status.as_str(),
            zones = report.suspicious_zones.len(),
            no_template = report.provenance.is_no_template(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Validation complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl Validator for Engine {
    async fn validate(
        &self,
        request: ValidationRequest,
        resolver: &dyn TemplateResolver,
    ) -> Result<ValidationReport, EngineError> {
        Engine::validate(self, request, resolver).await
    }
}

/// Resolver failures mean "no template"; running out the request deadline
/// is a timeout.
pub(crate) async fn lookup_template(
    resolver: &dyn TemplateResolver,
    key: Option<&TemplateKey>,
    deadline: tokio::time::Instant,
    budget_ms: u64,
) -> Result<Option<Arc<Template>>, EngineError> {
    let Some(key) = key else {
        debug!("No template key; scoring without template");
        return Ok(None);
    };
    match tokio::time::timeout_at(deadline, resolver.resolve(key)).await {
        Ok(Ok(found)) => {
            debug!(key = %key, found = found.is_some(), "Template lookup finished");
            Ok(found)
        }
        Ok(Err(e)) => {
            warn!(key = %key, error = %e, "Template lookup failed; scoring without template");
            Ok(None)
        }
        Err(_) => {
            warn!(key = %key, budget_ms, "Template lookup timed out");
            Err(EngineError::Timeout {
                stage: Stage::TemplateLookup,
                budget_ms,
            })
        }
    }
}

fn task_failure(e: JoinError) -> EngineError {
    EngineError::InternalInvariant(format!("pipeline task failed: {e}"))
}
