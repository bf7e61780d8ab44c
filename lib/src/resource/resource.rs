use std::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use derive_more::Debug;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};

use crate::config::Settings;
use crate::error::{Chainable, Result};
use crate::media::{MediaType, MediaTypes};
use crate::resource::*;
use crate::util::to_slash_trim_leading;

/// Process-scoped state shared by every resource of one build.
#[derive(Debug)]
pub struct ResourceSpec {
    settings: Settings,
    media_types: MediaTypes,
    cache: TransformCache,
}

impl ResourceSpec {
    pub fn new(settings: Settings) -> Arc<Self> {
        Arc::new(ResourceSpec {
            media_types: settings.media_types(),
            cache: TransformCache::new(),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn media_types(&self) -> &MediaTypes {
        &self.media_types
    }

    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// Creates an in-memory resource at the logical `path`.
    ///
    /// The path is normalized to `/` form without leading separators. The
    /// media type is resolved from the path's suffix.
    pub fn new_resource<C>(self: &Arc<Self>, path: &str, content: C) -> Resource
        where C: Into<Vec<u8>>
    {
        let path: Arc<str> = to_slash_trim_leading(path).into();
        let media_type = self.media_types.lookup(&path)
            .cloned()
            .unwrap_or_else(MediaType::octet_stream);

        Resource::new(self.clone(), path, media_type, content.into().into())
    }
}

/// The SHA-256 digest of a resource's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        ContentDigest(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// An immutable content item: bytes plus a logical path and media type.
///
/// Cloning a resource is cheap. Transforming one never modifies it; a new
/// resource is returned instead.
#[derive(Debug, Clone)]
pub struct Resource {
    #[debug(ignore)]
    spec: Arc<ResourceSpec>,
    path: Arc<str>,
    media_type: MediaType,
    #[debug(ignore)]
    content: Arc<[u8]>,
    #[debug(ignore)]
    digest: Arc<OnceCell<ContentDigest>>,
}

impl Resource {
    pub(crate) fn new(
        spec: Arc<ResourceSpec>,
        path: Arc<str>,
        media_type: MediaType,
        content: Arc<[u8]>,
    ) -> Self {
        Resource { spec, path, media_type, content, digest: Default::default() }
    }

    pub fn spec(&self) -> &Arc<ResourceSpec> {
        &self.spec
    }

    /// The logical, `/`-separated path of this resource.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.content).chain_with(|| error! {
            "resource content is not valid UTF-8",
            "resource path" => &self.path,
        })
    }

    /// The digest of this resource's content, computed on first use.
    pub fn digest(&self) -> ContentDigest {
        *self.digest.get_or_init(|| ContentDigest::of(&self.content))
    }

    /// Applies `transformation` to this resource, returning the result.
    ///
    /// The result is looked up in, and stored into, the build's
    /// [`TransformCache`] unless caching is disabled in the [`Settings`].
    pub fn transform(&self, transformation: &dyn ResourceTransformation) -> Result<Resource> {
        self.transform_chain(&[transformation])
    }

    /// Applies every transformation in `chain`, in order, feeding each one's
    /// output into the next. The whole chain is cached as one unit.
    pub fn transform_chain(&self, chain: &[&dyn ResourceTransformation]) -> Result<Resource> {
        if chain.is_empty() {
            return Ok(self.clone());
        }

        if !self.spec.settings().cache {
            return self.apply_chain(chain);
        }

        let key = CacheKey::new(self, chain);
        tracing::trace!(source = %self.path, digest = %key.digest, chain = ?key.chain, salts = ?key.salts);
        self.spec.cache().get_or_try_insert(key, || self.apply_chain(chain))
    }

    fn apply_chain(&self, chain: &[&dyn ResourceTransformation]) -> Result<Resource> {
        chain.iter().try_fold(self.clone(), |resource, t| resource.apply(*t))
    }

    fn apply(&self, transformation: &dyn ResourceTransformation) -> Result<Resource> {
        let key = transformation.key();
        tracing::debug!(source = %self.path, %key, "running transformation");

        let mut from = &self.content[..];
        let mut output = Vec::new();
        let mut ctx = TransformationCtx::new(&mut from, &mut output, &self.path, &self.media_type);
        transformation.transform(&mut ctx)?;

        let TransformationCtx { out_path, out_media_type, .. } = ctx;
        let out_path: Arc<str> = match to_slash_trim_leading(&out_path) {
            Cow::Borrowed(p) if p.len() == out_path.len() => out_path.clone(),
            normalized => normalized.into(),
        };

        Ok(Resource::new(self.spec.clone(), out_path, out_media_type, output.into()))
    }
}
