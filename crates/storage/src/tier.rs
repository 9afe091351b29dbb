use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A physical storage root.
///
/// Variants are ordered by how far they sit from the original media: the
/// source tier holds the originals, the cache holds copies of them and the
/// merged tier holds hard links into either.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Slow bulk store holding every quality of every title.
    #[display("source")]
    Source,
    /// Fast, size-bounded copy of a subset of the source tier.
    #[display("cache")]
    Cache,
    /// Export view presenting one best copy per title.
    #[display("merged")]
    Merged,
}
impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Source, Tier::Cache, Tier::Merged];
}
