mod macros;

pub use macros::*;

use std::borrow::Cow;

/// Converts `path` to the `/`-separated logical form used for resource paths
/// and strips every leading separator.
///
/// Normalizing is idempotent. Backslashes are treated as separators on every
/// platform so that a logical path means the same thing everywhere.
///
/// ```
/// use alembic::util::to_slash_trim_leading;
///
/// assert_eq!(to_slash_trim_leading("/out/greeting.txt"), "out/greeting.txt");
/// assert_eq!(to_slash_trim_leading("///a/b"), "a/b");
/// assert_eq!(to_slash_trim_leading("\\a\\b.css"), "a/b.css");
/// assert_eq!(to_slash_trim_leading("a/b/"), "a/b/");
/// assert_eq!(to_slash_trim_leading("/"), "");
/// ```
pub fn to_slash_trim_leading(path: &str) -> Cow<'_, str> {
    let trimmed = path.trim_start_matches(['/', '\\']);
    if trimmed.contains('\\') {
        Cow::Owned(trimmed.replace('\\', "/"))
    } else {
        Cow::Borrowed(trimmed)
    }
}
