//! `certimorph` command line: validate, enroll, compare.
//!
//! Every command produces one JSON document on stdout; logs go to stderr.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use thiserror::Error;

use crate::batch::{BatchDocument, BatchValidator};
use crate::config::EngineConfig;
use crate::engine::{Engine, Validator};
use crate::error::{ConfigError, EngineError};
use crate::models::{
    DeclaredFormat, HashParseError, MorphHash, TemplateKey, HASH_BITS, HASH_SCHEME_VERSION,
};
use crate::pipeline::hash::{DISTINCT_DISTANCE, STABLE_DISTANCE};
use crate::simulate::SimulatedEngine;
use crate::templates::{
    enroll_template, CachingResolver, DirectoryTemplateStore, NoTemplateResolver, ResolveError,
    TemplateResolver,
};

#[derive(Parser, Debug)]
#[command(name = "certimorph", version, about = "Certificate shape-morphology validation")]
pub struct Cli {
    #[arg(long, global = true, help = "Engine config JSON (defaults apply when omitted)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Pretty-print JSON output")]
    pub pretty: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one or more certificate files.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, help = "auto, png, jpeg, tiff or pdf (default: from extension)")]
        format: Option<DeclaredFormat>,
        #[arg(long, help = "Directory of enrolled template JSON files")]
        templates: Option<PathBuf>,
        #[arg(long, requires = "certificate_type")]
        institution: Option<String>,
        #[arg(long, requires = "institution")]
        certificate_type: Option<String>,
        #[arg(long, help = "Record the validation as offline")]
        offline: bool,
        #[arg(long, help = "Parallel documents (overrides config)")]
        workers: Option<usize>,
        #[arg(long, help = "Use the simulated engine")]
        simulate: bool,
    },
    /// Build a template from a known-good certificate.
    Enroll {
        file: PathBuf,
        #[arg(long)]
        institution: String,
        #[arg(long)]
        certificate_type: String,
        #[arg(long, help = "Template directory to write into")]
        out: PathBuf,
        #[arg(long)]
        format: Option<DeclaredFormat>,
    },
    /// Hamming distance between two morph hashes.
    Compare {
        a: String,
        b: String,
        #[arg(long, default_value_t = HASH_SCHEME_VERSION)]
        version: u32,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Template(#[from] ResolveError),

    #[error(transparent)]
    Hash(#[from] HashParseError),

    #[error("Cannot render output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Command result: the JSON to print and whether every document succeeded.
#[derive(Debug)]
pub struct Outcome {
    pub output: Value,
    pub success: bool,
}

pub async fn run(cli: Cli) -> Result<Outcome, CliError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Validate {
            files,
            format,
            templates,
            institution,
            certificate_type,
            offline,
            workers,
            simulate,
        } => {
            if let Some(workers) = workers {
                config.runtime.workers = workers;
            }
            config.validate()?;

            let key = institution
                .zip(certificate_type)
                .map(|(i, t)| TemplateKey::new(i, t));
            let mut documents = Vec::with_capacity(files.len());
            for path in &files {
                documents.push(BatchDocument {
                    name: path.display().to_string(),
                    bytes: read(path).await?,
                    format: format.unwrap_or_else(|| format_from_path(path)),
                    template_key: key.clone(),
                });
            }

            let resolver: Box<dyn TemplateResolver> = match templates {
                Some(dir) => Box::new(CachingResolver::new(DirectoryTemplateStore::new(dir))),
                None => Box::new(NoTemplateResolver),
            };
            let workers = config.runtime.workers;
            let validator: Box<dyn Validator> = if simulate {
                Box::new(SimulatedEngine::new(config))
            } else {
                Box::new(Engine::new(config)?)
            };

            let items = BatchValidator::new(validator.as_ref(), resolver.as_ref(), workers)
                .offline(offline)
                .run(documents)
                .await;
            let success = items.iter().all(|i| i.error.is_none());
            let output = serde_json::to_value(&items)?;
            Ok(Outcome { output, success })
        }

        Commands::Enroll {
            file,
            institution,
            certificate_type,
            out,
            format,
        } => {
            config.validate()?;
            let bytes = read(&file).await?;
            let format = format.unwrap_or_else(|| format_from_path(&file));
            let key = TemplateKey::new(institution, certificate_type);
            let template = tokio::task::spawn_blocking(move || {
                enroll_template(&bytes, format, key, &config)
            })
            .await
            .map_err(|e| EngineError::InternalInvariant(format!("enrollment task failed: {e}")))??;

            let path = DirectoryTemplateStore::new(out).save(&template).await?;
            Ok(Outcome {
                output: json!({
                    "template_id": template.id(),
                    "path": path.display().to_string(),
                    "morph_hash": template.reference_hash,
                    "regions": template.reference_profile.regions.len(),
                    "layout_score": template.reference_profile.layout_score,
                }),
                success: true,
            })
        }

        Commands::Compare { a, b, version } => {
            let a = MorphHash::from_hex(&a, version)?;
            let b = MorphHash::from_hex(&b, version)?;
            let distance = a.hamming(&b)?;
            Ok(Outcome {
                output: json!({
                    "distance": distance,
                    "bits": HASH_BITS,
                    "similarity": 1.0 - distance as f64 / HASH_BITS as f64,
                    "within_stable_bound": distance < STABLE_DISTANCE,
                    "beyond_distinct_bound": distance > DISTINCT_DISTANCE,
                }),
                success: true,
            })
        }
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path).await.map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn format_from_path(path: &Path) -> DeclaredFormat {
    path.extension()
        .and_then(|e| e.to_str())
        .map(DeclaredFormat::from_extension)
        .unwrap_or(DeclaredFormat::Auto)
}
