use std::io;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use crate::config::Settings;
use crate::error::Result;
use crate::templating::{EngineInit, TemplateExecutor, TemplateParser};
use crate::value::{Dict, Value};

/// A [MiniJinja](https://docs.rs/minijinja)-backed template engine.
///
/// Templates are rendered as plain text: no auto-escaping is applied and
/// trailing newlines are preserved. With [`Settings::strict`], rendering an
/// undefined value is an error.
#[derive(Debug, Clone)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

/// A parsed template together with the environment it was parsed into.
///
/// Each template owns its environment so that templates with the same name
/// from different resources never observe one another.
#[derive(Debug)]
pub struct CompiledTemplate {
    name: Arc<str>,
    env: Environment<'static>,
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MiniJinjaEngine {
    pub fn new(settings: &Settings) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        if settings.strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        env.add_global("G", minijinja::value::Value::from_serializable(&settings.globals));
        env.add_function("now", ext::now);
        env.add_filter("deslug", ext::deslug);
        env.add_filter("date", ext::date);
        env.add_filter("split", ext::split);
        MiniJinjaEngine { env }
    }
}

impl EngineInit for MiniJinjaEngine {
    type Engine = Self;

    fn init(settings: &Settings) -> Self::Engine {
        MiniJinjaEngine::new(settings)
    }
}

impl TemplateParser for MiniJinjaEngine {
    type Template = CompiledTemplate;

    fn parse(&self, name: &str, source: &str) -> Result<Self::Template> {
        let mut env = self.env.clone();
        env.add_template_owned(name.to_owned(), source.to_owned())?;
        Ok(CompiledTemplate { name: name.into(), env })
    }
}

impl TemplateExecutor<CompiledTemplate> for MiniJinjaEngine {
    fn execute(&self, template: &CompiledTemplate, to: &mut dyn io::Write, data: &Value) -> Result<()> {
        let compiled = template.env.get_template(&template.name)?;
        match data {
            Value::Null => compiled.render_to_write(Dict::<Arc<str>, Value>::new(), to)?,
            data => compiled.render_to_write(data, to)?,
        };

        Ok(())
    }
}

mod ext {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use minijinja::{value::Value, Error, ErrorKind};

    pub fn deslug(value: &str) -> String {
        value.replace('-', " ")
    }

    pub fn date(value: Value, fmt: &str) -> Result<Value, Error> {
        if let Ok(ts) = i64::try_from(value.clone()) {
            let datetime = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| Error::new(
                    ErrorKind::InvalidOperation,
                    "invalid timestamp provided to `date`"
                ))?;

            return Ok(datetime.format(fmt).to_string().into());
        }

        let kind = value.kind();
        let attr = value.get_attr("$__toml_private_datetime");
        let string = attr.as_ref()
            .ok()
            .filter(|v| !v.is_undefined())
            .map_or_else(|| value.as_str(), |v| v.as_str())
            .ok_or_else(|| Error::new(
                ErrorKind::InvalidOperation,
                format!("`date` must be applied to a string or integer, found {kind}")
            ))?;

        let formatted = string.parse::<NaiveDate>().map(|d| d.format(fmt))
            .or_else(|_| string.parse::<NaiveTime>().map(|t| t.format(fmt)))
            .or_else(|_| string.parse::<NaiveDateTime>().map(|dt| dt.format(fmt)))
            .or_else(|_| string.parse::<DateTime<Utc>>().map(|dt| dt.format(fmt)))
            .map_err(|e| Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to parse {string}: {e}")
            ))?;

        Ok(formatted.to_string().into())
    }

    pub fn split(value: &str, pat: &str, n: Option<usize>) -> Result<Value, Error> {
        match n {
            Some(n) => Ok(value.split(pat).nth(n).map(Value::from).unwrap_or(Value::UNDEFINED)),
            None => Ok(value.split(pat).map(Value::from).collect()),
        }
    }

    pub fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

impl_error_detail_with_std_error!(minijinja::Error);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;

    fn render(engine: &MiniJinjaEngine, source: &str, data: impl Into<Value>) -> Result<String> {
        let template = engine.parse("test.txt", source)?;
        let mut out = vec![];
        engine.execute(&template, &mut out, &data.into())?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn renders_nested_data() {
        let engine = MiniJinjaEngine::new(&Settings::default());
        let data = dict! {
            "page" => Value::from(dict! { "title" => "Home" }),
            "tags" => vec!["a", "b"],
        };

        let out = render(&engine, "{{ page.title }}:{% for t in tags %}[{{ t }}]{% endfor %}", data);
        assert_eq!(out.unwrap(), "Home:[a][b]");
    }

    #[test]
    fn output_is_not_escaped_and_keeps_newlines() {
        let engine = MiniJinjaEngine::new(&Settings::default());
        let template = engine.parse("page.html", "<b>{{ x }}</b>\n").unwrap();
        assert_eq!(template.name(), "page.html");

        let mut out = vec![];
        engine.execute(&template, &mut out, &Value::from(dict! { "x" => "<i>" })).unwrap();
        assert_eq!(out, b"<b><i></b>\n");
    }

    #[test]
    fn strictness_follows_settings() {
        let strict = MiniJinjaEngine::new(&Settings::default());
        assert!(render(&strict, "{{ missing }}", Value::Null).is_err());

        let lenient = MiniJinjaEngine::new(&Settings { strict: false, ..Settings::default() });
        assert_eq!(render(&lenient, "[{{ missing }}]", Value::Null).unwrap(), "[]");
    }

    #[test]
    fn syntax_errors_fail_at_parse_time() {
        let engine = MiniJinjaEngine::new(&Settings::default());
        assert!(engine.parse("bad.txt", "{% if %}").is_err());
        assert!(engine.parse("bad.txt", "{{ unclosed").is_err());
    }

    #[test]
    fn globals_and_filters() {
        let settings = Settings::from_toml("title = 'My Site'").unwrap();
        let engine = MiniJinjaEngine::init(&settings);

        assert_eq!(render(&engine, "{{ G.title }}", Value::Null).unwrap(), "My Site");
        assert_eq!(render(&engine, "{{ 'a-b-c' | deslug }}", Value::Null).unwrap(), "a b c");
        assert_eq!(render(&engine, "{{ 'x/y/z' | split('/', 1) }}", Value::Null).unwrap(), "y");
        assert_eq!(render(&engine, "{{ '2024-03-01' | date('%Y') }}", Value::Null).unwrap(), "2024");
        assert_eq!(render(&engine, "{{ 0 | date('%Y') }}", Value::Null).unwrap(), "1970");
    }

    #[test]
    fn same_names_do_not_collide() {
        let engine = MiniJinjaEngine::new(&Settings::default());
        let a = engine.parse("same.txt", "a").unwrap();
        let b = engine.parse("same.txt", "b").unwrap();

        let (mut out_a, mut out_b) = (vec![], vec![]);
        engine.execute(&a, &mut out_a, &Value::Null).unwrap();
        engine.execute(&b, &mut out_b, &Value::Null).unwrap();
        assert_eq!((out_a, out_b), (b"a".to_vec(), b"b".to_vec()));
    }
}
