use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ResolveError, TemplateResolver};
use crate::models::{Template, TemplateKey, TemplateSource, TEMPLATE_SCHEMA_VERSION};

// ═══════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════

/// Fixed set of templates, built up front and shared read-only.
#[derive(Debug, Clone)]
pub struct InMemoryTemplateStore {
    templates: HashMap<TemplateKey, Arc<Template>>,
    source: TemplateSource,
}

impl InMemoryTemplateStore {
    pub fn new(source: TemplateSource) -> Self {
        Self {
            templates: HashMap::new(),
            source,
        }
    }

    pub fn insert(&mut self, template: Template) {
        self.templates
            .insert(template.key.clone(), Arc::new(template));
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.insert(template);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for InMemoryTemplateStore {
    fn default() -> Self {
        Self::new(TemplateSource::Fixture)
    }
}

#[async_trait]
impl TemplateResolver for InMemoryTemplateStore {
    async fn resolve(&self, key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError> {
        Ok(self.templates.get(key).cloned())
    }

    fn source(&self) -> TemplateSource {
        self.source
    }
}

// ═══════════════════════════════════════════════════════════
// Directory of JSON files
// ═══════════════════════════════════════════════════════════

/// One `<institution>__<type>.json` file per template.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateStore {
    dir: PathBuf,
    source: TemplateSource,
}

impl DirectoryTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            source: TemplateSource::LocalDatabase,
        }
    }

    pub fn with_source(mut self, source: TemplateSource) -> Self {
        self.source = source;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &TemplateKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Write (or replace) the template's file, creating the directory if needed.
    pub async fn save(&self, template: &Template) -> Result<PathBuf, ResolveError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&template.key);
        let json = serde_json::to_vec_pretty(template).map_err(|source| ResolveError::Parse {
            path: path.clone(),
            source,
        })?;
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), key = %template.key, "Template saved");
        Ok(path)
    }
}

#[async_trait]
impl TemplateResolver for DirectoryTemplateStore {
    async fn resolve(&self, key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "No template file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let template: Template =
            serde_json::from_slice(&bytes).map_err(|source| ResolveError::Parse {
                path: path.clone(),
                source,
            })?;
        if template.schema_version != TEMPLATE_SCHEMA_VERSION {
            return Err(ResolveError::Schema {
                expected: TEMPLATE_SCHEMA_VERSION,
                found: template.schema_version,
            });
        }
        if &template.key != key {
            return Err(ResolveError::KeyMismatch {
                requested: key.clone(),
                found: template.key,
            });
        }
        Ok(Some(Arc::new(template)))
    }

    fn source(&self) -> TemplateSource {
        self.source
    }
}

// ═══════════════════════════════════════════════════════════
// Nothing
// ═══════════════════════════════════════════════════════════

/// Resolver for callers with no template source at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemplateResolver;

#[async_trait]
impl TemplateResolver for NoTemplateResolver {
    async fn resolve(&self, _key: &TemplateKey) -> Result<Option<Arc<Template>>, ResolveError> {
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        LogoIntegrity, MorphHash, SealPosition, ShapeProfile, ShapeSummary, TextAlignment,
        ToleranceSet, HASH_SCHEME_VERSION,
    };

    pub(crate) fn sample_template(institution: &str) -> Template {
        Template {
            key: TemplateKey::new(institution, "Diploma"),
            reference_profile: ShapeProfile {
                page_width: 1169,
                page_height: 826,
                regions: vec![],
                layout_score: 80.0,
                summary: ShapeSummary {
                    seal_position: SealPosition::Absent,
                    text_alignment: TextAlignment::Absent,
                    logo_integrity: LogoIntegrity::Absent,
                },
                diagnostics: vec![],
            },
            reference_hash: MorphHash::from_words([7, 0, 0, 1], HASH_SCHEME_VERSION),
            tolerances: ToleranceSet::default(),
            schema_version: TEMPLATE_SCHEMA_VERSION,
            engine_version: HASH_SCHEME_VERSION,
        }
    }

    #[tokio::test]
    async fn in_memory_lookup() {
        let store = InMemoryTemplateStore::default().with_template(sample_template("Alpha"));
        assert_eq!(store.len(), 1);
        let hit = store.resolve(&TemplateKey::new("Alpha", "Diploma")).await.unwrap();
        assert_eq!(hit.unwrap().key.institution, "Alpha");
        let miss = store.resolve(&TemplateKey::new("Beta", "Diploma")).await.unwrap();
        assert!(miss.is_none());
        assert_eq!(store.source(), TemplateSource::Fixture);
    }

    #[tokio::test]
    async fn directory_save_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path().join("templates"));
        let template = sample_template("Alpha University");
        let path = store.save(&template).await.unwrap();
        assert!(path.ends_with("alpha-university__diploma-2a0bede7.json"));

        let loaded = store.resolve(&template.key).await.unwrap().unwrap();
        assert_eq!(*loaded, template);
        assert_eq!(store.source(), TemplateSource::LocalDatabase);
    }

    #[tokio::test]
    async fn directory_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path());
        let result = store.resolve(&TemplateKey::new("Nobody", "Nothing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn directory_rejects_foreign_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path());
        let mut template = sample_template("Alpha");
        template.schema_version = TEMPLATE_SCHEMA_VERSION + 1;
        store.save(&template).await.unwrap();
        let err = store.resolve(&template.key).await.unwrap_err();
        assert!(matches!(err, ResolveError::Schema { .. }));
    }

    #[tokio::test]
    async fn keys_that_slug_alike_both_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path());
        let dotted = sample_template("Univ. of X");
        let spaced = sample_template("Univ  of X");
        store.save(&dotted).await.unwrap();
        store.save(&spaced).await.unwrap();

        let a = store.resolve(&dotted.key).await.unwrap().unwrap();
        let b = store.resolve(&spaced.key).await.unwrap().unwrap();
        assert_eq!(a.key, dotted.key);
        assert_eq!(b.key, spaced.key);
    }

    #[tokio::test]
    async fn directory_rejects_file_for_another_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path());
        let requested = TemplateKey::new("Beta", "Diploma");
        let json = serde_json::to_vec(&sample_template("Alpha")).unwrap();
        std::fs::write(store.path_for(&requested), json).unwrap();

        let err = store.resolve(&requested).await.unwrap_err();
        match err {
            ResolveError::KeyMismatch { requested: r, found } => {
                assert_eq!(r, requested);
                assert_eq!(found.institution, "Alpha");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn directory_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryTemplateStore::new(dir.path());
        let key = TemplateKey::new("Alpha", "Diploma");
        std::fs::write(store.path_for(&key), b"{ not json").unwrap();
        let err = store.resolve(&key).await.unwrap_err();
        assert!(matches!(err, ResolveError::Parse { .. }));
    }

    #[tokio::test]
    async fn no_template_resolver_always_none() {
        let r = NoTemplateResolver;
        assert!(r.resolve(&TemplateKey::new("A", "B")).await.unwrap().is_none());
        assert_eq!(r.source(), TemplateSource::Unspecified);
    }
}
