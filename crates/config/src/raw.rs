//! The configuration as written by a human, before validation.

use crate::error::{ErrorKind, Result};
use crate::matrix::{DEFAULT_MERGE_QUALITY, MediaMatrix, MergeTarget};
use crate::{CacheSettings, Config, MediaServerConfig, TierPaths, TransactionSettings};
use mvault_storage::is_single_component;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RawConfig {
    tiers: RawTiers,
    cache: CacheSettings,
    transactions: TransactionSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_server: Option<MediaServerConfig>,
    matrix: Vec<RawMatrix>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct RawTiers {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merged: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<PathBuf>,
}
impl Default for RawTiers {
    fn default() -> Self {
        Self {
            source: None,
            cache: None,
            merged: None,
            state: crate::default_state_dir(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMatrix {
    media_type: String,
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    quality_order: Vec<String>,
    #[serde(default)]
    merge_prefix: Option<String>,
    #[serde(default)]
    merge_quality: Option<String>,
    #[serde(default)]
    use_cache: bool,
}

impl RawConfig {
    pub(crate) fn validate(self) -> Result<Config> {
        let tiers = self.tiers.validate()?;
        if self.matrix.is_empty() {
            exn::bail!(ErrorKind::invalid("matrix must contain at least one media type"));
        }
        let mut media_types = HashSet::new();
        let mut merge_folders = HashSet::new();
        let mut matrix = Vec::with_capacity(self.matrix.len());
        for raw in self.matrix {
            let entry = raw.validate()?;
            if !media_types.insert(entry.media_type.clone()) {
                exn::bail!(ErrorKind::invalid(format!("duplicate media type: {}", entry.media_type)));
            }
            if let Some(merge) = &entry.merge {
                if tiers.merged.is_none() {
                    exn::bail!(ErrorKind::invalid(format!(
                        "media type {} merges but tiers.merged is not set",
                        entry.media_type
                    )));
                }
                if !merge_folders.insert(merge.folder_name()) {
                    exn::bail!(ErrorKind::invalid(format!("merge folder {} is shared", merge.folder_name())));
                }
            }
            matrix.push(entry);
        }
        if let Some(server) = &self.media_server
            && server.url.trim().is_empty()
        {
            exn::bail!(ErrorKind::invalid("media_server.url must not be empty"));
        }
        Ok(Config {
            tiers,
            matrix,
            cache: self.cache,
            transactions: self.transactions,
            media_server: self.media_server,
        })
    }
}

impl RawTiers {
    fn validate(self) -> Result<TierPaths> {
        let source = required_root("tiers.source", self.source)?;
        let cache = required_root("tiers.cache", self.cache)?;
        let state = required_root("tiers.state", self.state)?;
        let merged = self.merged.map(|p| absolute("tiers.merged", p)).transpose()?;
        let mut roots = vec![&source, &cache];
        roots.extend(merged.as_ref());
        for (i, a) in roots.iter().enumerate() {
            for b in &roots[i + 1..] {
                if a.starts_with(b) || b.starts_with(a) {
                    exn::bail!(ErrorKind::invalid(format!(
                        "tier roots must not overlap: {} and {}",
                        a.display(),
                        b.display()
                    )));
                }
            }
        }
        Ok(TierPaths { source, cache, merged, state })
    }
}

fn required_root(key: &str, path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => absolute(key, path),
        None => exn::bail!(ErrorKind::invalid(format!("{key} is required"))),
    }
}

fn absolute(key: &str, path: PathBuf) -> Result<PathBuf> {
    match path.is_absolute() {
        true => Ok(path),
        false => exn::bail!(ErrorKind::invalid(format!("{key} must be absolute: {}", path.display()))),
    }
}

fn name(kind: &str, value: String) -> Result<String> {
    match is_single_component(&value) && !value.contains("..") {
        true => Ok(value),
        false => exn::bail!(ErrorKind::invalid(format!("invalid {kind}: {value:?}"))),
    }
}

impl RawMatrix {
    fn validate(self) -> Result<MediaMatrix> {
        let media_type = name("media type", self.media_type)?;
        let prefix = name("prefix", self.prefix.unwrap_or_else(|| media_type.clone()))?;
        let mut seen = HashSet::new();
        let mut quality_order = Vec::with_capacity(self.quality_order.len());
        for quality in self.quality_order {
            let quality = name("quality", quality)?;
            if !seen.insert(quality.clone()) {
                exn::bail!(ErrorKind::invalid(format!("duplicate quality {quality} for {media_type}")));
            }
            quality_order.push(quality);
        }
        let merge = match (self.merge_prefix, self.merge_quality) {
            (None, None) => None,
            (merge_prefix, merge_quality) => Some(MergeTarget {
                prefix: name("merge prefix", merge_prefix.unwrap_or_else(|| prefix.clone()))?,
                quality: name(
                    "merge quality",
                    merge_quality.unwrap_or_else(|| DEFAULT_MERGE_QUALITY.to_string()),
                )?,
            }),
        };
        if quality_order.is_empty() {
            tracing::warn!(media_type = %media_type, "Media type has no qualities and will never be scanned");
        }
        Ok(MediaMatrix {
            media_type,
            prefix,
            quality_order,
            merge,
            use_cache: self.use_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Format, Toml};
    use rstest::rstest;

    fn validate(toml: &str) -> Result<Config> {
        Config::from_figment(Figment::from(Toml::string(toml)))
    }

    const TIERS: &str = r#"
        [tiers]
        source = "/srv/media"
        cache = "/srv/cache"
        merged = "/srv/merged"
        state = "/var/lib/mvault"
    "#;

    #[test]
    fn test_merge_quality_defaults() {
        let config = validate(&format!(
            "{TIERS}\n[[matrix]]\nmedia_type = \"tv\"\nquality_order = [\"uhd\", \"hd\"]\nmerge_quality = \"best\"\n"
        ))
        .unwrap();
        let merge = config.matrix[0].merge.as_ref().unwrap();
        assert_eq!(merge.prefix, "tv");
        assert_eq!(merge.quality, "best");
        assert!(!config.matrix[0].use_cache);
    }

    #[rstest]
    #[case::no_matrix("")]
    #[case::duplicate_type("[[matrix]]\nmedia_type = \"tv\"\n[[matrix]]\nmedia_type = \"tv\"\n")]
    #[case::duplicate_quality("[[matrix]]\nmedia_type = \"tv\"\nquality_order = [\"hd\", \"hd\"]\n")]
    #[case::slash_in_prefix("[[matrix]]\nmedia_type = \"tv\"\nprefix = \"a/b\"\n")]
    #[case::traversal_in_quality("[[matrix]]\nmedia_type = \"tv\"\nquality_order = [\"..\"]\n")]
    #[case::shared_merge_folder(
        "[[matrix]]\nmedia_type = \"tv\"\nmerge_prefix = \"all\"\n[[matrix]]\nmedia_type = \"movie\"\nmerge_prefix = \"all\"\n"
    )]
    fn test_invalid_matrix(#[case] matrix: &str) {
        let err = validate(&format!("{TIERS}\n{matrix}")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
    }

    #[rstest]
    #[case::relative_source("source = \"media\"\ncache = \"/c\"\nstate = \"/s\"")]
    #[case::missing_cache("source = \"/m\"\nstate = \"/s\"")]
    #[case::nested_roots("source = \"/m\"\ncache = \"/m/cache\"\nstate = \"/s\"")]
    #[case::same_roots("source = \"/m\"\ncache = \"/c\"\nmerged = \"/c\"\nstate = \"/s\"")]
    fn test_invalid_tiers(#[case] tiers: &str) {
        let toml = format!("[tiers]\n{tiers}\n[[matrix]]\nmedia_type = \"tv\"\n");
        let err = validate(&toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
    }

    #[test]
    fn test_merge_requires_merged_tier() {
        let toml = "[tiers]\nsource = \"/m\"\ncache = \"/c\"\nstate = \"/s\"\n[[matrix]]\nmedia_type = \"tv\"\nmerge_prefix = \"tv\"\n";
        let err = validate(toml).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(reason) if reason.contains("tiers.merged")));
    }

    #[test]
    fn test_wrong_type_is_load_error() {
        let err = validate(&format!("{TIERS}\n[cache]\nbudget = \"lots\"\n")).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }
}
