//! Selection vocabulary: FPGA kinds, core types, tags and the user's filters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// FPGA board variant a core image is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    A35t,
    A100t,
    A200t,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::A35t, Kind::A100t, Kind::A200t];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::A35t => "a35t",
            Kind::A100t => "a100t",
            Kind::A200t => "a200t",
        }
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a35t" => Ok(Kind::A35t),
            "a100t" => Ok(Kind::A100t),
            "a200t" => Ok(Kind::A200t),
            _ => Err(Error::invalid_kind(s)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoreType {
    Bit,
    Zx3,
}

impl CoreType {
    pub const ALL: [CoreType; 2] = [CoreType::Bit, CoreType::Zx3];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoreType::Bit => "bit",
            CoreType::Zx3 => "zx3",
        }
    }

    /// Directory name used when grouping by type (`BIT`, `ZX3`)
    pub fn dir_name(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl FromStr for CoreType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bit" => Ok(CoreType::Bit),
            "zx3" => Ok(CoreType::Zx3),
            _ => Err(Error::invalid_core_type(s)),
        }
    }
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category label attached to catalog items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Arcade,
    Console,
    Computer,
    Util,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Arcade, Tag::Console, Tag::Computer, Tag::Util];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Arcade => "arcade",
            Tag::Console => "console",
            Tag::Computer => "computer",
            Tag::Util => "util",
        }
    }

    /// Directory name used when grouping by tag (`ARCADE`, `CONSOLE`, ...)
    pub fn dir_name(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arcade" => Ok(Tag::Arcade),
            "console" => Ok(Tag::Console),
            "computer" => Ok(Tag::Computer),
            "util" => Ok(Tag::Util),
            _ => Err(Error::invalid_tag(s)),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How core images are arranged below their pack directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingMode {
    /// Every core lands directly in its pack directory
    #[default]
    Flat,
    /// `<dir>/<TYPE>/`
    ByType,
    /// `<dir>/<TAG>/`, once per tag
    ByTag,
    /// `<dir>/<TYPE>/<TAG>/`
    ByTypeThenTag,
}

impl GroupingMode {
    pub fn from_flags(group_types: bool, group_tags: bool) -> Self {
        match (group_types, group_tags) {
            (false, false) => GroupingMode::Flat,
            (true, false) => GroupingMode::ByType,
            (false, true) => GroupingMode::ByTag,
            (true, true) => GroupingMode::ByTypeThenTag,
        }
    }

    pub fn groups_by_tag(&self) -> bool {
        matches!(self, GroupingMode::ByTag | GroupingMode::ByTypeThenTag)
    }
}

/// What happens to files already present in the destination tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepPolicy {
    /// Clear every managed directory once, then write
    #[default]
    Replace,
    /// Leave destination files that already have the expected size
    Keep,
    /// Erase the whole destination root before writing
    Clean,
}

impl KeepPolicy {
    /// Clean takes precedence when both flags are given
    pub fn from_flags(clean: bool, keep: bool) -> Self {
        if clean {
            KeepPolicy::Clean
        } else if keep {
            KeepPolicy::Keep
        } else {
            KeepPolicy::Replace
        }
    }
}

/// The user's kind/type/tag filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub kinds: BTreeSet<Kind>,
    pub types: BTreeSet<CoreType>,
    /// Empty means no tag filtering
    pub tags: BTreeSet<Tag>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            kinds: Kind::ALL.into_iter().collect(),
            types: CoreType::ALL.into_iter().collect(),
            tags: Tag::ALL.into_iter().collect(),
        }
    }
}

impl Selection {
    pub fn new(
        kinds: impl IntoIterator<Item = Kind>,
        types: impl IntoIterator<Item = CoreType>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            types: types.into_iter().collect(),
            tags: tags.into_iter().collect(),
        }
    }

    /// Parse comma separated, repeatable CLI values
    ///
    /// Invalid entries are returned alongside the valid ones so the caller can
    /// log them; duplicates collapse.
    pub fn parse_values<T>(values: &[String]) -> (Vec<T>, Vec<String>)
    where
        T: FromStr<Err = Error> + Ord,
    {
        let mut valid = BTreeSet::new();
        let mut invalid = Vec::new();
        for raw in values.iter().flat_map(|v| v.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<T>() {
                Ok(value) => {
                    valid.insert(value);
                }
                Err(_) => invalid.push(raw.to_string()),
            }
        }
        (valid.into_iter().collect(), invalid)
    }

    /// Reject selections that can never match a core
    pub fn validate(&self) -> Result<()> {
        if self.kinds.is_empty() {
            return Err(Error::empty_selection("kinds"));
        }
        if self.types.is_empty() {
            return Err(Error::empty_selection("types"));
        }
        Ok(())
    }

    /// Tags an item should be grouped under: its own tags that were requested
    pub fn grouping_tags<'a>(&'a self, tags: &'a [Tag]) -> impl Iterator<Item = Tag> + 'a {
        tags.iter()
            .copied()
            .filter(move |tag| self.tags.is_empty() || self.tags.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("ZX3".parse::<CoreType>().unwrap(), CoreType::Zx3);
        assert_eq!("Zx3".parse::<CoreType>().unwrap(), CoreType::Zx3);
        assert_eq!("A100T".parse::<Kind>().unwrap(), Kind::A100t);
        assert_eq!(" Arcade ".parse::<Tag>().unwrap(), Tag::Arcade);
        assert!("a50t".parse::<Kind>().is_err());
        assert!("rbf".parse::<CoreType>().is_err());
    }

    #[test]
    fn test_parse_values_splits_and_reports_invalid() {
        let input = vec!["a35t,A200T".to_string(), "a50t".to_string(), "a35t".to_string()];
        let (kinds, invalid) = Selection::parse_values::<Kind>(&input);
        assert_eq!(kinds, vec![Kind::A35t, Kind::A200t]);
        assert_eq!(invalid, vec!["a50t".to_string()]);
    }

    #[test]
    fn test_validate_rejects_empty_kinds() {
        let selection = Selection::new([], [CoreType::Zx3], []);
        assert!(matches!(
            selection.validate(),
            Err(Error::EmptySelection { .. })
        ));
    }

    #[test]
    fn test_clean_wins_over_keep() {
        assert_eq!(KeepPolicy::from_flags(true, true), KeepPolicy::Clean);
        assert_eq!(KeepPolicy::from_flags(false, true), KeepPolicy::Keep);
        assert_eq!(KeepPolicy::from_flags(false, false), KeepPolicy::Replace);
    }

    #[test]
    fn test_grouping_from_flags() {
        assert_eq!(GroupingMode::from_flags(true, true), GroupingMode::ByTypeThenTag);
        assert!(GroupingMode::from_flags(false, true).groups_by_tag());
        assert!(!GroupingMode::from_flags(true, false).groups_by_tag());
    }

    #[test]
    fn test_grouping_tags_respects_request() {
        let selection = Selection::new([Kind::A35t], [CoreType::Zx3], [Tag::Console]);
        let tags = [Tag::Arcade, Tag::Console];
        let grouped: Vec<Tag> = selection.grouping_tags(&tags).collect();
        assert_eq!(grouped, vec![Tag::Console]);

        let open = Selection::new([Kind::A35t], [CoreType::Zx3], []);
        assert_eq!(open.grouping_tags(&tags).count(), 2);
    }
}
