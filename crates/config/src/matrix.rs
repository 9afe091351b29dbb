/// Default quality name of a merge target when only its prefix is configured.
pub const DEFAULT_MERGE_QUALITY: &str = "merged";

/// Source matrix entry: how one media type is laid out across quality
/// folders, and whether it is exported into the merged view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMatrix {
    pub media_type: String,
    pub prefix: String,
    /// Index 0 is the most preferred quality.
    pub quality_order: Vec<String>,
    pub merge: Option<MergeTarget>,
    /// Prefer a cache-resident copy over the source copy in the merged view.
    pub use_cache: bool,
}
impl MediaMatrix {
    /// Name of the `{prefix}-{quality}` folder for `quality`.
    pub fn folder_name(&self, quality: &str) -> String {
        format!("{}-{}", self.prefix, quality)
    }

    /// Rank of `quality` in [`quality_order`](Self::quality_order); lower is better.
    pub fn rank(&self, quality: &str) -> Option<usize> {
        self.quality_order.iter().position(|q| q == quality)
    }

    /// Whether filenames should be parsed for season and episode numbers.
    pub fn is_episodic(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("tv")
    }

    /// Whether this entry contributes to the merged view.
    pub fn exports(&self) -> bool {
        self.merge.is_some() && !self.quality_order.is_empty()
    }
}

/// Pseudo prefix/quality pair naming a media type's folder in the merged tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTarget {
    pub prefix: String,
    pub quality: String,
}
impl MergeTarget {
    pub fn folder_name(&self) -> String {
        format!("{}-{}", self.prefix, self.quality)
    }
}
