//! Built-in [`ResourceTransformation`](crate::resource::ResourceTransformation)s.

pub mod template;
