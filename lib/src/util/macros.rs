/// Builds a [`Dict`](crate::value::Dict) from `key => value` pairs.
///
/// ```rust
/// use alembic::dict;
/// use alembic::value::Value;
///
/// let dict = dict! { "Name" => "World", "count" => 3u8 };
/// assert_eq!(dict.get("Name"), Some(&Value::from("World")));
/// assert_eq!(dict.len(), 2);
/// ```
#[macro_export]
macro_rules! dict {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut dict: $crate::value::Dict = $crate::value::Dict::new();
        $(dict.insert($key.into(), $value.into());)*
        dict
    });
}

pub use dict;
