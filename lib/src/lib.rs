#![doc = svgbobdoc::transform!(
//! A cacheable resource transformation pipeline.
//!
//! # Overview
//!
//! Alembic turns content into other content. A **resource** is an immutable
//! item: a byte payload with a logical path and a media type. A
//! **transformation** maps one resource to a new one, and is identified by a
//! [`TransformationKey`](resource::TransformationKey) so that its output can be
//! reused by every later request for the same work on the same content.
//!
//! The flagship transformation executes a resource as a template:
//!
//! ```svgbob
//!  +--------+  execute_as_template  +-------------------+
//!  | Client +---------------------->| ExecuteAsTemplate |
//!  +--------+  (path, data)         +---------+---------+
//!                                             |
//!                                             v
//!  +----------+   key + digest    +-----------+----------+
//!  | Resource +------------------>|    TransformCache    |
//!  +----------+                   +-----------+----------+
//!                                      miss   |   hit
//!                          +------------------+---------+
//!                          v                            |
//!           +--------------+--------------+             |
//!           | TemplateParser::parse       |             |
//!           | TemplateExecutor::execute   |             |
//!           +--------------+--------------+             |
//!                          |                            v
//!                          |                    +-------+------+
//!                          +------------------->| new Resource |
//!                                               +--------------+
//! ```
//!
//! In words:
//!
//!   1. A [`ResourceSpec`] holds the state shared by one build: its
//!      [`Settings`](config::Settings), its media types, and its cache.
//!   2. A [`Client`] is built once with a template parser and executor, and
//!      creates [`ExecuteAsTemplate`](transformers::template::ExecuteAsTemplate)
//!      transformations for a target path and some data.
//!   3. [`Resource::transform()`] consults the cache. On a miss, the source is
//!      parsed as a template and executed with the data. The output becomes a
//!      new resource at the target path.
//!
//! Parsing errors name the offending resource. Execution errors are passed
//! through exactly as the engine reports them.
//!
//! # Example
//!
//! ```rust
//! use alembic::{dict, Client, ResourceSpec};
//! use alembic::config::Settings;
//!
//! let spec = ResourceSpec::new(Settings::default());
//! let client: Client = Client::init(spec.clone());
//!
//! let page = spec.new_resource("layouts/page.html", "<h1>{{ title }}</h1>");
//! let out = client.execute_as_template(&page, "/blog/index.html", dict! {
//!     "title" => "Hello",
//! }).unwrap();
//!
//! assert_eq!(out.path(), "blog/index.html");
//! assert_eq!(out.content_str().unwrap(), "<h1>Hello</h1>");
//! assert_eq!(out.media_type().to_string(), "text/html");
//! ```
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod media;
pub mod config;
pub mod resource;
pub mod templating;
pub mod transformers;

pub use resource::{Resource, ResourceSpec, ResourceTransformation, TransformationKey};
pub use transformers::template::Client;

pub use rayon;
