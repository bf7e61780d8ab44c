pub mod minijinja;

use std::io;
use std::fmt::Debug;

use crate::config::Settings;
use crate::error::Result;
use crate::value::Value;

/// Parses template source text into an executable template.
pub trait TemplateParser: Send + Sync + Debug {
    type Template: Send + Sync;

    /// Parses `source` as a template named `name`. The name is used in error
    /// messages and by the engine's template registry.
    fn parse(&self, name: &str, source: &str) -> Result<Self::Template>;
}

/// Executes templates produced by a [`TemplateParser`].
pub trait TemplateExecutor<T>: Send + Sync + Debug {
    /// Renders `template` with `data` as its context, writing into `to`.
    ///
    /// On error, `to` may have received partial output.
    fn execute(&self, template: &T, to: &mut dyn io::Write, data: &Value) -> Result<()>;
}

pub trait EngineInit {
    type Engine: TemplateParser + 'static;

    fn init(settings: &Settings) -> Self::Engine;
}
