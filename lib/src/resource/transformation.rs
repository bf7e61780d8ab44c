use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Chainable, Result};
use crate::media::MediaType;

/// The cache identity of one transformation application.
///
/// Two keys are equal exactly when their names and discriminators are equal.
/// A key never captures the resource's content: content identity is tracked
/// separately by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformationKey {
    name: Cow<'static, str>,
    discriminator: Arc<str>,
}

impl TransformationKey {
    pub fn new<N, D>(name: N, discriminator: D) -> Self
        where N: Into<Cow<'static, str>>, D: Into<Arc<str>>
    {
        TransformationKey { name: name.into(), discriminator: discriminator.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// A string form of the key safe for use as a file name.
    ///
    /// ```rust
    /// use alembic::resource::TransformationKey;
    ///
    /// let a = TransformationKey::new("execute-as-template", "out/a.txt");
    /// let b = TransformationKey::new("execute-as-template", "out/b.txt");
    ///
    /// assert!(a.value().starts_with("execute-as-template_"));
    /// assert!(!a.value().contains('/'));
    /// assert_ne!(a.value(), b.value());
    /// ```
    pub fn value(&self) -> String {
        let digest = Sha256::new()
            .chain_update((self.name.len() as u64).to_le_bytes())
            .chain_update(self.name.as_bytes())
            .chain_update(self.discriminator.as_bytes())
            .finalize();

        format!("{}_{}", self.name, hex::encode(digest))
    }
}

impl fmt::Display for TransformationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name, self.discriminator)
    }
}

/// A unit of work mapping one resource to another.
pub trait ResourceTransformation: fmt::Debug + Send + Sync {
    /// Returns the key identifying this transformation. Must be pure.
    fn key(&self) -> TransformationKey;

    /// Distinguishes cached outputs of transformations with equal keys.
    ///
    /// Implementations whose output depends on state the key leaves out
    /// return a hash of that state. It takes part in cache lookups only, never
    /// in key equality.
    fn cache_salt(&self) -> Option<u64> {
        None
    }

    /// Reads from `ctx.from`, writes to `ctx.to`, and updates the output
    /// fields of `ctx` as needed.
    fn transform(&self, ctx: &mut TransformationCtx<'_>) -> Result<()>;
}

/// The per-invocation surface a [`ResourceTransformation`] works against.
///
/// `out_path` and `out_media_type` start out equal to the input's.
pub struct TransformationCtx<'a> {
    pub from: &'a mut dyn io::Read,
    pub to: &'a mut dyn io::Write,
    pub in_path: &'a str,
    pub in_media_type: &'a MediaType,
    pub out_path: Arc<str>,
    pub out_media_type: MediaType,
}

impl<'a> TransformationCtx<'a> {
    pub fn new(
        from: &'a mut dyn io::Read,
        to: &'a mut dyn io::Write,
        in_path: &'a str,
        in_media_type: &'a MediaType,
    ) -> Self {
        TransformationCtx {
            from,
            to,
            in_path,
            in_media_type,
            out_path: in_path.into(),
            out_media_type: in_media_type.clone(),
        }
    }

    /// Reads the remaining input as UTF-8 text.
    pub fn read_source(&mut self) -> Result<String> {
        let mut bytes = vec![];
        self.from.read_to_end(&mut bytes).chain_with(|| error! {
            "failed to read resource content",
            "resource path" => self.in_path,
        })?;

        String::from_utf8(bytes).chain_with(|| error! {
            "resource content is not valid UTF-8",
            "resource path" => self.in_path,
        })
    }
}

impl fmt::Debug for TransformationCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformationCtx")
            .field("in_path", &self.in_path)
            .field("in_media_type", &self.in_media_type)
            .field("out_path", &self.out_path)
            .field("out_media_type", &self.out_media_type)
            .finish_non_exhaustive()
    }
}
