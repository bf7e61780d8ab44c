mod transformation;
mod resource;
mod cache;

pub use transformation::*;
pub use resource::*;
pub use cache::*;
