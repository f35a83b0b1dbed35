use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BenchError;

/// Handle to the image a question is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    path: PathBuf,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Media type guessed from the file extension.
    pub fn media_type(&self) -> &'static str {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Unprocessed provider output: the visible text and whatever reasoning the
/// provider exposed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    pub reasoning: String,
}

impl RawResponse {
    pub fn new(text: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning: reasoning.into(),
        }
    }
}

/// A remote model able to answer a question about an image.
///
/// Implementations perform a single call; retrying is the caller's concern.
/// Errors should be classified (`RateLimited`, `ServerError`, `HttpError`
/// for transient failures, anything else is treated as terminal).
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn infer(&self, image: &ImageRef, query: &str) -> Result<RawResponse, BenchError>;
}

/// Validated, non-empty provider name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Result<Self, BenchError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(BenchError::ConfigError(
                "Provider id cannot be empty".to_string(),
            ));
        }
        // Ids double as artifact file names.
        if id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(BenchError::ConfigError(format!(
                "Provider id '{id}' must not contain path separators"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed, ordered set of providers taking part in a run.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<(ProviderId, Arc<dyn VisionProvider>)>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider; names must be unique.
    pub fn try_insert(
        &mut self,
        id: impl Into<String>,
        provider: Arc<dyn VisionProvider>,
    ) -> Result<(), BenchError> {
        let id = ProviderId::new(id)?;
        if self.get(id.as_str()).is_some() {
            return Err(BenchError::ConfigError(format!(
                "Provider '{id}' registered twice"
            )));
        }
        self.providers.push((id, provider));
        Ok(())
    }

    /// Chainable variant of [`ProviderRegistry::try_insert`].
    pub fn register(
        mut self,
        id: impl Into<String>,
        provider: Arc<dyn VisionProvider>,
    ) -> Result<Self, BenchError> {
        self.try_insert(id, provider)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn VisionProvider>> {
        self.providers
            .iter()
            .find(|(name, _)| name.as_str() == id)
            .map(|(_, provider)| provider)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderId, &Arc<dyn VisionProvider>)> {
        self.providers.iter().map(|(id, provider)| (id, provider))
    }

    /// Keeps only the named providers, in registry order.
    pub fn select(&self, names: &[String]) -> Result<Self, BenchError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n).is_none()) {
            return Err(BenchError::ConfigError(format!(
                "Unknown provider '{unknown}' (known: {})",
                self.names().join(", ")
            )));
        }
        Ok(Self {
            providers: self
                .providers
                .iter()
                .filter(|(id, _)| names.iter().any(|n| n == id.as_str()))
                .cloned()
                .collect(),
        })
    }
}
