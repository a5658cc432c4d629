mod notification;
mod profile;
mod project;
mod task;
mod team_member;
mod user;

pub use notification::*;
pub use profile::*;
pub use project::*;
pub use task::*;
pub use team_member::*;
pub use user::*;

/// Deserializer for `Option<Option<T>>` patch fields: a missing key stays `None`,
/// an explicit `null` becomes `Some(None)`. Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}
