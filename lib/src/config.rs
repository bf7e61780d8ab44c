use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::{MediaType, MediaTypes};
use crate::value::{Format, Toml, Value};

/// Build-wide settings for resource transformations.
///
/// Settings are usually read from TOML:
///
/// ```toml
/// cache = true
/// strict = true
///
/// [media_types]
/// tmpl = "text/x-template"
///
/// # every other key becomes a template global, available as `G`
/// title = "My Site"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Whether transformation results are cached by key. Defaults to `true`.
    #[serde(default = "enabled")]
    pub cache: bool,
    /// Whether templates fail on undefined values. Defaults to `true`.
    #[serde(default = "enabled")]
    pub strict: bool,
    /// Additional suffix to media type mappings, overriding the defaults.
    #[serde(default)]
    pub media_types: FxHashMap<String, MediaType>,
    #[serde(flatten)]
    pub globals: FxHashMap<String, Value>,
}

fn enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache: true,
            strict: true,
            media_types: FxHashMap::default(),
            globals: FxHashMap::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(string: &str) -> Result<Self> {
        Ok(Toml::from_str(string)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        Toml::read(path)
    }

    /// The default media types extended with the configured overrides.
    pub fn media_types(&self) -> MediaTypes {
        let mut types = MediaTypes::default();
        types.extend(self.media_types.iter().map(|(k, v)| (k.as_str(), v.clone())));
        types
    }
}
