//! Autoboot installation
//!
//! The variants live in `embedded/autoboot/` as readable listings and are
//! compiled into the binary. A file with the same name in `<extras>/autoboot/`
//! replaces the embedded one. Either way the listing is written as a
//! tokenized +3DOS program.

use rust_embed::RustEmbed;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{info, warn};
use zx3dl_core::types::{CoreType, GroupingMode, Selection};

use crate::error::{LayoutError, Result};
use crate::plus3dos;
use crate::tree::AUTOBOOT_OVERRIDES;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/autoboot/"]
struct AutobootVariants;

/// Bootstrap file at the destination root
pub const AUTOBOOT_FILE: &str = "AUTOBOOT.BAS";

const CUSTOM_TEMPLATE: &str = "custom.bas.tera";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// Ungrouped cores directory
    Cores,
    /// One type subdirectory
    Type(CoreType),
    /// A directory named by the user
    Custom(String),
}

impl Variant {
    /// Pick the variant for a grouping mode, or the reason there is none
    pub fn choose(grouping: GroupingMode, selection: &Selection, choice: Option<&str>) -> std::result::Result<Self, String> {
        if grouping.groups_by_tag() {
            return Err("grouping by tag has no autoboot variant".to_string());
        }
        if let Some(dir) = choice {
            let dir = dir.trim().trim_matches('/');
            if dir.is_empty() {
                return Err("empty autoboot directory".to_string());
            }
            return Ok(Variant::Custom(dir.to_string()));
        }
        match grouping {
            GroupingMode::ByType => {
                let core_type = if selection.types.contains(&CoreType::Zx3) {
                    Some(CoreType::Zx3)
                } else {
                    selection.types.iter().next().copied()
                };
                core_type
                    .map(Variant::Type)
                    .ok_or_else(|| "no core type selected".to_string())
            }
            _ => Ok(Variant::Cores),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            Variant::Cores => "cores.bas".to_string(),
            Variant::Type(core_type) => format!("{}.bas", core_type.as_str()),
            Variant::Custom(_) => CUSTOM_TEMPLATE.to_string(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Cores => f.write_str("cores"),
            Variant::Type(core_type) => write!(f, "{}", core_type),
            Variant::Custom(dir) => write!(f, "custom ({})", dir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutobootOutcome {
    Disabled,
    Skipped(String),
    Installed { variant: Variant, path: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct AutobootInstaller {
    overrides: Option<PathBuf>,
}

impl AutobootInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for replacement variants below `<extras>/autoboot/`
    pub fn with_extras(mut self, extras: Option<&Path>) -> Self {
        self.overrides = extras.map(|dir| dir.join(AUTOBOOT_OVERRIDES));
        self
    }

    pub fn install(
        &self,
        root: &Path,
        grouping: GroupingMode,
        selection: &Selection,
        choice: Option<&str>,
        disabled: bool,
    ) -> Result<AutobootOutcome> {
        if disabled {
            return Ok(AutobootOutcome::Disabled);
        }
        let variant = match Variant::choose(grouping, selection, choice) {
            Ok(variant) => variant,
            Err(reason) => {
                warn!("Autoboot not installed: {}", reason);
                return Ok(AutobootOutcome::Skipped(reason));
            }
        };

        let listing = self.render(&variant)?;
        let program = plus3dos::encode_program(&variant.file_name(), &listing)?;
        let path = root.join(AUTOBOOT_FILE);
        fs::write(&path, program).map_err(|e| LayoutError::io(&path, e))?;
        info!("Installed {} autoboot", variant);
        Ok(AutobootOutcome::Installed { variant, path })
    }

    pub fn render(&self, variant: &Variant) -> Result<String> {
        let name = variant.file_name();
        let source = self.source(&name)?;
        match variant {
            Variant::Custom(dir) => {
                let mut tera = Tera::default();
                tera.add_raw_template(&name, &source)
                    .map_err(|e| LayoutError::template(&name, e))?;
                let mut context = Context::new();
                context.insert("dir", dir);
                tera.render(&name, &context)
                    .map_err(|e| LayoutError::template(&name, e))
            }
            _ => Ok(source),
        }
    }

    /// Override file if present, otherwise the embedded variant
    fn source(&self, name: &str) -> Result<String> {
        if let Some(dir) = &self.overrides {
            let path = dir.join(name);
            if path.is_file() {
                return fs::read_to_string(&path).map_err(|e| LayoutError::io(&path, e));
            }
        }
        let file = AutobootVariants::get(name)
            .ok_or_else(|| LayoutError::template(name, "no embedded variant"))?;
        String::from_utf8(file.data.into_owned()).map_err(|e| LayoutError::template(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zx3dl_core::types::{Kind, Tag};

    fn selection(types: &[CoreType]) -> Selection {
        Selection::new([Kind::A35t], types.iter().copied(), [Tag::Arcade])
    }

    #[test]
    fn test_all_variants_are_embedded() {
        for name in ["cores.bas", "bit.bas", "zx3.bas", CUSTOM_TEMPLATE] {
            assert!(AutobootVariants::get(name).is_some(), "{} missing", name);
        }
    }

    #[test]
    fn test_variant_choice() {
        let both = selection(&[CoreType::Bit, CoreType::Zx3]);
        assert_eq!(Variant::choose(GroupingMode::Flat, &both, None), Ok(Variant::Cores));
        assert_eq!(
            Variant::choose(GroupingMode::ByType, &both, None),
            Ok(Variant::Type(CoreType::Zx3))
        );
        assert_eq!(
            Variant::choose(GroupingMode::ByType, &selection(&[CoreType::Bit]), None),
            Ok(Variant::Type(CoreType::Bit))
        );
        assert_eq!(
            Variant::choose(GroupingMode::Flat, &both, Some("/GAMES/")),
            Ok(Variant::Custom("GAMES".to_string()))
        );
        assert!(Variant::choose(GroupingMode::ByTag, &both, Some("GAMES")).is_err());
        assert!(Variant::choose(GroupingMode::ByTypeThenTag, &both, None).is_err());
    }

    #[test]
    fn test_install_overwrites_previous_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(AUTOBOOT_FILE), "old").unwrap();

        let outcome = AutobootInstaller::new()
            .install(root.path(), GroupingMode::ByType, &selection(&[CoreType::Bit]), None, false)
            .unwrap();

        assert!(matches!(outcome, AutobootOutcome::Installed { variant: Variant::Type(CoreType::Bit), .. }));
        let written = fs::read(root.path().join(AUTOBOOT_FILE)).unwrap();
        assert!(written.starts_with(b"PLUS3DOS"));
        assert!(written.windows(12).any(|w| w == b".cd /ZX3/BIT"));
    }

    #[test]
    fn test_every_embedded_variant_encodes() {
        let installer = AutobootInstaller::new();
        let variants = [
            Variant::Cores,
            Variant::Type(CoreType::Bit),
            Variant::Type(CoreType::Zx3),
            Variant::Custom("GAMES".to_string()),
        ];
        for variant in variants {
            let listing = installer.render(&variant).unwrap();
            let program = plus3dos::encode_program(&variant.file_name(), &listing).unwrap();
            assert_eq!(program[127], plus3dos::checksum(&program[..127]));
            assert!(program.len() > plus3dos::HEADER_LEN);
        }
    }

    #[test]
    fn test_malformed_override_is_an_error() {
        let root = TempDir::new().unwrap();
        let extras = TempDir::new().unwrap();
        fs::create_dir_all(extras.path().join(AUTOBOOT_OVERRIDES)).unwrap();
        fs::write(extras.path().join(AUTOBOOT_OVERRIDES).join("cores.bas"), ".cd /ZX3\n").unwrap();

        let result = AutobootInstaller::new()
            .with_extras(Some(extras.path()))
            .install(root.path(), GroupingMode::Flat, &selection(&[CoreType::Zx3]), None, false);

        assert!(matches!(result, Err(LayoutError::Template { .. })));
        assert!(!root.path().join(AUTOBOOT_FILE).exists());
    }

    #[test]
    fn test_custom_variant_is_rendered() {
        let rendered = AutobootInstaller::new()
            .render(&Variant::Custom("MYCORES".to_string()))
            .unwrap();
        assert!(rendered.contains(".cd /MYCORES"));
    }

    #[test]
    fn test_override_replaces_embedded_variant() {
        let extras = TempDir::new().unwrap();
        fs::create_dir_all(extras.path().join(AUTOBOOT_OVERRIDES)).unwrap();
        fs::write(extras.path().join(AUTOBOOT_OVERRIDES).join("cores.bas"), "10 REM mine\n").unwrap();

        let installer = AutobootInstaller::new().with_extras(Some(extras.path()));
        assert_eq!(installer.render(&Variant::Cores).unwrap(), "10 REM mine\n");
        assert!(installer
            .render(&Variant::Type(CoreType::Zx3))
            .unwrap()
            .contains("/ZX3/ZX3"));
    }

    #[test]
    fn test_disabled_and_tag_grouping_write_nothing() {
        let root = TempDir::new().unwrap();
        let installer = AutobootInstaller::new();
        let sel = selection(&[CoreType::Zx3]);

        let disabled = installer.install(root.path(), GroupingMode::Flat, &sel, None, true).unwrap();
        assert_eq!(disabled, AutobootOutcome::Disabled);

        let skipped = installer.install(root.path(), GroupingMode::ByTag, &sel, None, false).unwrap();
        assert!(matches!(skipped, AutobootOutcome::Skipped(_)));
        assert!(!root.path().join(AUTOBOOT_FILE).exists());
    }
}
