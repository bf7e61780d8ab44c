//! Executes a resource's content as a template.
//!
//! The entry point is [`Client::execute_as_template()`], which renders a
//! resource against caller-supplied data and places the result at a new
//! logical path:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use alembic::dict;
//! use alembic::config::Settings;
//! use alembic::resource::ResourceSpec;
//! use alembic::templating::minijinja::MiniJinjaEngine;
//! use alembic::transformers::template::Client;
//!
//! let settings = Settings::default();
//! let spec = ResourceSpec::new(settings.clone());
//! let client = Client::with_engine(spec.clone(), Arc::new(MiniJinjaEngine::new(&settings)));
//!
//! let resource = spec.new_resource("layouts/greeting.txt", "Hello, {{ Name }}!");
//! let greeting = client.execute_as_template(&resource, "/out/greeting.txt", dict! {
//!     "Name" => "World",
//! }).unwrap();
//!
//! assert_eq!(greeting.path(), "out/greeting.txt");
//! assert_eq!(greeting.content_str().unwrap(), "Hello, World!");
//! ```

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHasher;

use crate::error::{Chainable, Result};
use crate::resource::*;
use crate::templating::{EngineInit, TemplateExecutor, TemplateParser};
use crate::templating::minijinja::MiniJinjaEngine;
use crate::util::to_slash_trim_leading;
use crate::value::Value;

/// The [`TransformationKey`] name of [`ExecuteAsTemplate`].
pub const EXECUTE_AS_TEMPLATE: &str = "execute-as-template";

/// Renders the resource as a template with `data`, moving it to a new path.
///
/// The key's discriminator is the target path alone: two instances with the
/// same target path and different data share a key. The data still separates
/// their cached outputs through [`ResourceTransformation::cache_salt()`].
#[derive(Debug)]
pub struct ExecuteAsTemplate<P, X> {
    spec: Arc<ResourceSpec>,
    parser: Arc<P>,
    executor: Arc<X>,
    target_path: Arc<str>,
    data: Value,
}

impl<P, X> ExecuteAsTemplate<P, X> {
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl<P, X> ResourceTransformation for ExecuteAsTemplate<P, X>
    where P: TemplateParser, X: TemplateExecutor<P::Template>
{
    fn key(&self) -> TransformationKey {
        TransformationKey::new(EXECUTE_AS_TEMPLATE, self.target_path.clone())
    }

    fn cache_salt(&self) -> Option<u64> {
        let mut hasher = FxHasher::default();
        self.data.hash(&mut hasher);
        Some(hasher.finish())
    }

    fn transform(&self, ctx: &mut TransformationCtx<'_>) -> Result<()> {
        let source = ctx.read_source()?;
        let template = self.parser.parse(ctx.in_path, &source).chain_with(|| error! {
            "failed to parse resource as template",
            "resource path" => ctx.in_path,
        })?;

        ctx.out_path = self.target_path.clone();
        if let Some(media_type) = self.spec.media_types().lookup(&self.target_path) {
            ctx.out_media_type = media_type.clone();
        }

        self.executor.execute(&template, ctx.to, &self.data)
    }
}

/// Creates [`ExecuteAsTemplate`] transformations and applies them.
///
/// A client is built once per build and shared by reference. It holds
/// read-only handles only, so it may be used from many threads at once.
#[derive(Debug)]
pub struct Client<P = MiniJinjaEngine, X = MiniJinjaEngine> {
    spec: Arc<ResourceSpec>,
    executor: Arc<X>,
    parser: Arc<P>,
}

impl<P, X> Clone for Client<P, X> {
    fn clone(&self) -> Self {
        Client {
            spec: self.spec.clone(),
            executor: self.executor.clone(),
            parser: self.parser.clone(),
        }
    }
}

/// Assembles a [`Client`]. Every handle is required.
#[derive(Debug)]
pub struct ClientBuilder<P, X> {
    spec: Option<Arc<ResourceSpec>>,
    executor: Option<Arc<X>>,
    parser: Option<Arc<P>>,
}

impl<P, X> Default for ClientBuilder<P, X> {
    fn default() -> Self {
        ClientBuilder { spec: None, executor: None, parser: None }
    }
}

impl<P, X> ClientBuilder<P, X>
    where P: TemplateParser, X: TemplateExecutor<P::Template>
{
    pub fn spec(mut self, spec: Arc<ResourceSpec>) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn executor(mut self, executor: Arc<X>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn parser(mut self, parser: Arc<P>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Builds the client.
    ///
    /// # Panics
    ///
    /// Panics if the resource spec, the template executor, or the template
    /// parser was not provided. A client without any one of them can never
    /// perform a transformation.
    #[track_caller]
    pub fn build(self) -> Client<P, X> {
        let Some(spec) = self.spec else {
            panic!("must provide a resource spec");
        };

        let Some(executor) = self.executor else {
            panic!("must provide a template executor");
        };

        let Some(parser) = self.parser else {
            panic!("must provide a template parser");
        };

        Client { spec, executor, parser }
    }
}

impl<E> Client<E, E>
    where E: TemplateParser + TemplateExecutor<E::Template>
{
    /// Creates a client using `engine` both to parse and to execute.
    #[track_caller]
    pub fn with_engine(spec: Arc<ResourceSpec>, engine: Arc<E>) -> Self {
        Client::new(spec, engine.clone(), engine)
    }

    /// Creates a client with an engine configured from the [`ResourceSpec`]'s settings.
    pub fn init(spec: Arc<ResourceSpec>) -> Self
        where E: EngineInit<Engine = E>
    {
        let engine = E::init(spec.settings());
        Client::with_engine(spec, Arc::new(engine))
    }
}

impl<P, X> Client<P, X>
    where P: TemplateParser, X: TemplateExecutor<P::Template>
{
    #[track_caller]
    pub fn new(spec: Arc<ResourceSpec>, executor: Arc<X>, parser: Arc<P>) -> Self {
        Client::builder()
            .spec(spec)
            .executor(executor)
            .parser(parser)
            .build()
    }

    pub fn builder() -> ClientBuilder<P, X> {
        ClientBuilder::default()
    }

    pub fn spec(&self) -> &Arc<ResourceSpec> {
        &self.spec
    }

    /// Creates the transformation `execute_as_template` applies, for use in
    /// a longer [`Resource::transform_chain()`].
    pub fn transformation<T, D>(&self, target_path: T, data: D) -> ExecuteAsTemplate<P, X>
        where T: AsRef<str>, D: Into<Value>
    {
        ExecuteAsTemplate {
            spec: self.spec.clone(),
            parser: self.parser.clone(),
            executor: self.executor.clone(),
            target_path: to_slash_trim_leading(target_path.as_ref()).into(),
            data: data.into(),
        }
    }

    /// Renders `resource` as a template with `data`, returning a new resource
    /// at `target_path`.
    ///
    /// `target_path` is normalized to `/` form without leading separators.
    /// Parse errors name the resource's path; execution errors are returned
    /// as the engine reports them.
    pub fn execute_as_template<T, D>(&self, resource: &Resource, target_path: T, data: D) -> Result<Resource>
        where T: AsRef<str>, D: Into<Value>
    {
        resource.transform(&self.transformation(target_path, data))
    }

    /// Runs independent `execute_as_template` jobs in parallel.
    ///
    /// Results are returned in the order of `jobs`. One job failing does not
    /// affect the others.
    pub fn par_execute_as_template<T, D>(&self, jobs: Vec<(Resource, T, D)>) -> Vec<Result<Resource>>
        where T: AsRef<str> + Send, D: Into<Value> + Send
    {
        jobs.into_par_iter()
            .map(|(resource, target_path, data)| self.execute_as_template(&resource, target_path, data))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::Settings;
    use crate::dict;
    use crate::media::MediaType;

    fn setup(settings: Settings) -> (Arc<ResourceSpec>, Client) {
        let spec = ResourceSpec::new(settings.clone());
        let client = Client::with_engine(spec.clone(), Arc::new(MiniJinjaEngine::new(&settings)));
        (spec, client)
    }

    #[test]
    fn renders_to_the_normalized_target() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("layouts/greeting.txt", "Hello, {{ Name }}!");
        let out = client.execute_as_template(&resource, "/out/greeting.txt", dict! {
            "Name" => "World",
        }).unwrap();

        assert_eq!(out.path(), "out/greeting.txt");
        assert_eq!(out.content_str().unwrap(), "Hello, World!");
        assert_eq!(resource.path(), "layouts/greeting.txt");
    }

    #[test]
    fn init_configures_the_engine_from_settings() {
        let spec = ResourceSpec::new(Settings::from_toml("title = 'Docs'").unwrap());
        let client = Client::<MiniJinjaEngine>::init(spec.clone());

        let resource = spec.new_resource("t.txt", "{{ G.title }}");
        let out = client.execute_as_template(&resource, "o.txt", Value::Null).unwrap();
        assert_eq!(out.content_str().unwrap(), "Docs");
    }

    #[test]
    fn leading_separators_are_stripped() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("t.txt", "x");

        for target in ["a/b.txt", "/a/b.txt", "///a/b.txt", "\\a\\b.txt"] {
            let out = client.execute_as_template(&resource, target, Value::Null).unwrap();
            assert_eq!(out.path(), "a/b.txt", "target: {target:?}");
        }
    }

    #[test]
    fn target_suffix_decides_the_media_type() {
        let settings = Settings::from_toml("[media_types]\nrss = 'application/rss+xml'").unwrap();
        let (spec, client) = setup(settings);
        let resource = spec.new_resource("layouts/feed.tmpl", "<rss/>");
        assert_eq!(resource.media_type(), &MediaType::octet_stream());

        let feed = client.execute_as_template(&resource, "feed.rss", Value::Null).unwrap();
        assert_eq!(feed.media_type(), &MediaType::new("application", "rss+xml"));

        let html = client.execute_as_template(&resource, "index.html", Value::Null).unwrap();
        assert_eq!(html.media_type(), &MediaType::new("text", "html"));

        let unknown = client.execute_as_template(&resource, "feed.unknown", Value::Null).unwrap();
        assert_eq!(unknown.media_type(), resource.media_type());
    }

    #[test]
    fn parse_errors_name_the_resource() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("layouts/broken.txt", "{% for x in %}");
        let error = client.execute_as_template(&resource, "out.txt", Value::Null).unwrap_err();

        assert_eq!(error.message(), "failed to parse resource as template");
        assert!(error.to_string().contains("layouts/broken.txt"));
        assert!(spec.cache().is_empty());
    }

    #[test]
    fn execution_errors_are_not_wrapped() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("layouts/missing.txt", "{{ Missing }}");
        let error = client.execute_as_template(&resource, "out.txt", dict! {}).unwrap_err();

        assert_eq!(error.iter().count(), 1);
        assert!(!error.to_string().contains("failed to parse"));
        assert!(spec.cache().is_empty());
    }

    #[test]
    fn keys_ignore_data() {
        let (_, client) = setup(Settings::default());
        let a = client.transformation("/out/a.txt", dict! { "n" => 1u8 });
        let b = client.transformation("out/a.txt", dict! { "n" => 2u8 });
        let c = client.transformation("out/c.txt", dict! { "n" => 1u8 });

        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), a.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(a.key().name(), EXECUTE_AS_TEMPLATE);
        assert_eq!(a.key().discriminator(), "out/a.txt");

        assert_ne!(a.cache_salt(), b.cache_salt());
        assert_eq!(a.cache_salt(), c.cache_salt());
    }

    #[test]
    fn repeated_executions_hit_the_cache() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("t.txt", "{{ n }}");

        let first = client.execute_as_template(&resource, "o.txt", dict! { "n" => 1u8 }).unwrap();
        let second = client.execute_as_template(&resource, "o.txt", dict! { "n" => 1u8 }).unwrap();
        assert_eq!(first.content(), second.content());
        assert_eq!(spec.cache().stats().hits, 1);
    }

    #[test]
    fn new_data_renders_anew() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("layouts/greeting.txt", "Hello, {{ Name }}!");

        let alice = client.execute_as_template(&resource, "out.txt", dict! { "Name" => "Alice" });
        let bob = client.execute_as_template(&resource, "out.txt", dict! { "Name" => "Bob" });
        assert_eq!(alice.unwrap().content_str().unwrap(), "Hello, Alice!");
        assert_eq!(bob.unwrap().content_str().unwrap(), "Hello, Bob!");

        let again = client.execute_as_template(&resource, "out.txt", dict! { "Name" => "Alice" });
        assert_eq!(again.unwrap().content_str().unwrap(), "Hello, Alice!");
        assert_eq!(spec.cache().stats().hits, 1);
        assert_eq!(spec.cache().len(), 2);
    }

    #[test]
    fn chains_with_other_transformations() {
        let (spec, client) = setup(Settings::default());
        let resource = spec.new_resource("t.txt", "{{ a }}-{{ b }}");
        let first = client.transformation("stage/one.txt", dict! { "a" => "x", "b" => "{{ c }}" });
        let second = client.transformation("final.txt", dict! { "c" => "y" });

        let out = resource.transform_chain(&[&first, &second]).unwrap();
        assert_eq!(out.path(), "final.txt");
        assert_eq!(out.content_str().unwrap(), "x-y");
    }

    #[test]
    fn concurrent_executions_do_not_interfere() {
        let (spec, client) = setup(Settings::default());
        let jobs: Vec<_> = (0..64u32)
            .map(|i| {
                let resource = spec.new_resource(&format!("in/{i}.txt"), format!("{i}:{{{{ v }}}}"));
                (resource, format!("out/{i}.txt"), Value::from(dict! { "v" => i * 2 }))
            })
            .collect();

        let results = client.par_execute_as_template(jobs);
        for (i, result) in results.into_iter().enumerate() {
            let out = result.unwrap();
            assert_eq!(out.path(), format!("out/{i}.txt"));
            assert_eq!(out.content_str().unwrap(), format!("{i}:{}", i * 2));
        }
    }

    #[test]
    fn batch_failures_are_isolated() {
        let (spec, client) = setup(Settings::default());
        let good = spec.new_resource("good.txt", "ok");
        let bad = spec.new_resource("bad.txt", "{% endfor %}");

        let results = client.par_execute_as_template(vec![
            (good, "a.txt", Value::Null),
            (bad, "b.txt", Value::Null),
        ]);

        assert_eq!(results[0].as_ref().unwrap().content(), b"ok");
        assert!(results[1].as_ref().unwrap_err().to_string().contains("bad.txt"));
    }

    #[derive(Debug, Default)]
    struct Recorder {
        parsed: AtomicUsize,
        executed: AtomicUsize,
    }

    impl TemplateParser for Recorder {
        type Template = String;

        fn parse(&self, name: &str, source: &str) -> Result<String> {
            self.parsed.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{name}:{source}"))
        }
    }

    impl TemplateExecutor<String> for Recorder {
        fn execute(&self, template: &String, to: &mut dyn io::Write, data: &Value) -> Result<()> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            write!(to, "{template}|{}", data.kind())?;
            Ok(())
        }
    }

    #[test]
    fn any_engine_can_back_a_client() {
        let spec = ResourceSpec::new(Settings::default());
        let recorder = Arc::new(Recorder::default());
        let client = Client::with_engine(spec.clone(), recorder.clone());

        let resource = spec.new_resource("in.txt", "body");
        let out = client.execute_as_template(&resource, "out.txt", dict! {}).unwrap();
        assert_eq!(out.content_str().unwrap(), "in.txt:body|dict");

        client.execute_as_template(&resource, "out.txt", dict! {}).unwrap();
        assert_eq!(recorder.parsed.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "must provide a resource spec")]
    fn missing_spec_is_fatal() {
        let engine = Arc::new(MiniJinjaEngine::new(&Settings::default()));
        let _ = Client::builder().executor(engine.clone()).parser(engine).build();
    }

    #[test]
    #[should_panic(expected = "must provide a template parser")]
    fn missing_parser_is_fatal() {
        let spec = ResourceSpec::new(Settings::default());
        let engine = Arc::new(MiniJinjaEngine::new(&Settings::default()));
        let _ = Client::<MiniJinjaEngine>::builder().spec(spec).executor(engine).build();
    }

    #[test]
    #[should_panic(expected = "must provide a template executor")]
    fn missing_executor_is_fatal() {
        let spec = ResourceSpec::new(Settings::default());
        let engine = Arc::new(MiniJinjaEngine::new(&Settings::default()));
        let _ = Client::<_, MiniJinjaEngine>::builder().spec(spec).parser(engine).build();
    }

    static_assertions::assert_impl_all!(Client: Send, Sync, Clone);
    static_assertions::assert_impl_all!(ExecuteAsTemplate<MiniJinjaEngine, MiniJinjaEngine>: ResourceTransformation);
}
