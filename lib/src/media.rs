use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A `main/sub` media type such as `text/html`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaType {
    main: Arc<str>,
    sub: Arc<str>,
}

impl MediaType {
    pub fn new(main: &str, sub: &str) -> Self {
        MediaType { main: main.into(), sub: sub.into() }
    }

    /// `application/octet-stream`, for content of unknown type.
    pub fn octet_stream() -> Self {
        MediaType::new("application", "octet-stream")
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }
}

impl FromStr for MediaType {
    type Err = Error;

    /// ```rust
    /// use alembic::media::MediaType;
    ///
    /// let html: MediaType = "text/html".parse().unwrap();
    /// assert_eq!(html, MediaType::new("text", "html"));
    /// assert_eq!(html.to_string(), "text/html");
    ///
    /// assert!("text".parse::<MediaType>().is_err());
    /// assert!("text/".parse::<MediaType>().is_err());
    /// assert!("a/b/c".parse::<MediaType>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = |part: &str| !part.is_empty() && !part.contains(['/', ' ']);
        match s.trim().split_once('/') {
            Some((main, sub)) if valid(main) && valid(sub) => Ok(MediaType::new(main, sub)),
            _ => err! {
                "invalid media type",
                "expected" => "main/sub",
                "found" => s,
            },
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let string = <std::borrow::Cow<'de, str>>::deserialize(de)?;
        string.parse().map_err(|e: Error| serde::de::Error::custom(e.message()))
    }
}

const DEFAULTS: &[(&str, &str, &str)] = &[
    ("html", "text", "html"),
    ("htm", "text", "html"),
    ("txt", "text", "plain"),
    ("css", "text", "css"),
    ("csv", "text", "csv"),
    ("md", "text", "markdown"),
    ("js", "text", "javascript"),
    ("json", "application", "json"),
    ("toml", "application", "toml"),
    ("xml", "application", "xml"),
    ("svg", "image", "svg+xml"),
];

/// A registry from file suffix to media type.
#[derive(Debug, Clone)]
pub struct MediaTypes {
    by_suffix: FxHashMap<Box<str>, MediaType>,
}

impl MediaTypes {
    /// An empty registry.
    pub fn empty() -> Self {
        MediaTypes { by_suffix: FxHashMap::default() }
    }

    /// Registers `media_type` for `suffix`, replacing any existing entry.
    pub fn insert(&mut self, suffix: &str, media_type: MediaType) -> Option<MediaType> {
        let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
        self.by_suffix.insert(suffix.into(), media_type)
    }

    pub fn get(&self, suffix: &str) -> Option<&MediaType> {
        self.by_suffix.get(&*suffix.trim_start_matches('.').to_ascii_lowercase())
    }

    /// Resolves the media type of a `/`-separated logical `path` by its
    /// final extension.
    ///
    /// ```rust
    /// use alembic::media::{MediaType, MediaTypes};
    ///
    /// let types = MediaTypes::default();
    /// assert_eq!(types.lookup("out/index.HTML"), Some(&MediaType::new("text", "html")));
    /// assert_eq!(types.lookup("archive.tar.gz"), None);
    /// assert_eq!(types.lookup("Makefile"), None);
    /// assert_eq!(types.lookup(".hidden/readme"), None);
    /// ```
    pub fn lookup(&self, path: &str) -> Option<&MediaType> {
        let file_name = path.rsplit('/').next()?;
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }

        self.get(ext)
    }

    pub fn len(&self) -> usize {
        self.by_suffix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_suffix.is_empty()
    }
}

impl Default for MediaTypes {
    fn default() -> Self {
        let mut types = MediaTypes::empty();
        for &(suffix, main, sub) in DEFAULTS {
            types.insert(suffix, MediaType::new(main, sub));
        }

        types
    }
}

impl<'a> Extend<(&'a str, MediaType)> for MediaTypes {
    fn extend<I: IntoIterator<Item = (&'a str, MediaType)>>(&mut self, iter: I) {
        for (suffix, media_type) in iter {
            self.insert(suffix, media_type);
        }
    }
}
