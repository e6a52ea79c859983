//! Arcade ARC generation
//!
//! Arcade cores load `.arc` files built from an MRA description and the ROM
//! ZIPs it references. The conversion itself is done by the external `mra`
//! tool; this module plans the runs and drives the tool.
//!
//! A core with a single MRA gets one ARC in `JOTEGO/`. A core with several
//! MRAs gets its default ARC in `JOTEGO/` plus one ARC per MRA in
//! `JOTEGO/<CORE>/`, where `<CORE>` is the core name without its `jt` prefix.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use zx3dl_core::types::ArcadeCore;

use crate::error::{LayoutError, Result};

/// Top-level directory holding arcade ARC files
pub const ARC_DIR: &str = "JOTEGO";

/// One cached MRA and the core it belongs to
#[derive(Debug, Clone)]
pub struct MraInput {
    pub core: ArcadeCore,
    /// MRA file name, e.g. `Street Fighter II (World).mra`
    pub name: String,
    pub path: PathBuf,
}

/// One converter run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcJob {
    pub mra: PathBuf,
    /// Label for logs and failures
    pub label: String,
    pub out_dir: PathBuf,
    /// Forced output name; the tool derives one from the MRA otherwise
    pub arc_name: Option<String>,
}

/// Something that turns an MRA plus ROMs into an ARC file
#[async_trait]
pub trait ArcConverter: Send + Sync {
    async fn convert(&self, job: &ArcJob, roms_dir: &Path) -> Result<()>;
}

/// Plan converter runs for every core, in core name order
pub fn plan_arc_jobs(inputs: &[MraInput], arcade_root: &Path) -> Vec<ArcJob> {
    let mut by_core: BTreeMap<&str, Vec<&MraInput>> = BTreeMap::new();
    for input in inputs {
        by_core.entry(input.core.core.as_str()).or_default().push(input);
    }

    let mut jobs = Vec::new();
    for (core, mras) in by_core {
        let default_arc = default_arc_name(&mras[0].core);

        if let [single] = mras.as_slice() {
            jobs.push(ArcJob {
                mra: single.path.clone(),
                label: single.name.clone(),
                out_dir: arcade_root.to_path_buf(),
                arc_name: Some(default_arc),
            });
            continue;
        }

        let subdir = arcade_root.join(core.replace("jt", "").to_uppercase());
        let default_mra = mras[0].core.default_mra.as_deref();
        let default = default_mra.and_then(|prefix| mras.iter().find(|m| m.name.starts_with(prefix)));
        if let Some(default) = default {
            jobs.push(ArcJob {
                mra: default.path.clone(),
                label: default.name.clone(),
                out_dir: arcade_root.to_path_buf(),
                arc_name: Some(default_arc),
            });
        } else {
            debug!("Core {} has no default MRA among {} files", core, mras.len());
        }

        for mra in mras {
            jobs.push(ArcJob {
                mra: mra.path.clone(),
                label: mra.name.clone(),
                out_dir: subdir.clone(),
                arc_name: None,
            });
        }
    }
    jobs
}

/// `<default_arc>.ARC`, or the core name when none is declared
fn default_arc_name(core: &ArcadeCore) -> String {
    let stem = core.default_arc.as_deref().unwrap_or(&core.core);
    format!("{}.arc", stem).to_uppercase()
}

/// The `mra` command line tool
#[derive(Debug, Clone)]
pub struct MraTool {
    binary: PathBuf,
}

impl MraTool {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for one run: `-A -z <roms> -O <out> [-a NAME] <mra>`
    pub fn args(job: &ArcJob, roms_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-A".to_string(),
            "-z".to_string(),
            roms_dir.display().to_string(),
            "-O".to_string(),
            job.out_dir.display().to_string(),
        ];
        if let Some(name) = &job.arc_name {
            args.push("-a".to_string());
            args.push(name.clone());
        }
        args.push(job.mra.display().to_string());
        args
    }
}

#[async_trait]
impl ArcConverter for MraTool {
    async fn convert(&self, job: &ArcJob, roms_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(&job.out_dir).map_err(|e| LayoutError::io(&job.out_dir, e))?;

        let binary = self.binary.clone();
        let args = Self::args(job, roms_dir);
        debug!("{} {}", binary.display(), args.join(" "));

        let output = tokio::task::spawn_blocking(move || {
            duct::cmd(binary, args)
                .stderr_to_stdout()
                .stdout_capture()
                .unchecked()
                .run()
        })
        .await
        .map_err(|e| LayoutError::conversion(&job.label, e.to_string()))?
        .map_err(|e| LayoutError::conversion(&job.label, e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let text = String::from_utf8_lossy(&output.stdout);
            Err(LayoutError::conversion(
                &job.label,
                format!("{}: {}", output.status, text.trim()),
            ))
        }
    }
}

/// Platform specific name of the `mra` binary
pub fn mra_binary_name() -> &'static str {
    if cfg!(windows) {
        "mra.exe"
    } else if cfg!(all(target_os = "linux", target_arch = "arm")) {
        "mra.armv7l"
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        "mra.aarch64"
    } else {
        "mra"
    }
}

/// Directory of the release tree holding this platform's binary
pub fn mra_platform_dir() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(core: &str, default_mra: Option<&str>, default_arc: Option<&str>, name: &str) -> MraInput {
        MraInput {
            core: ArcadeCore {
                core: core.to_string(),
                default_mra: default_mra.map(str::to_string),
                default_arc: default_arc.map(str::to_string),
            },
            name: name.to_string(),
            path: PathBuf::from("/cache").join(name),
        }
    }

    #[test]
    fn test_single_mra_core_gets_named_arc() {
        let jobs = plan_arc_jobs(&[input("jtkiwi", None, None, "Kiwi.mra")], Path::new("/sd/JOTEGO"));
        assert_eq!(
            jobs,
            vec![ArcJob {
                mra: PathBuf::from("/cache/Kiwi.mra"),
                label: "Kiwi.mra".to_string(),
                out_dir: PathBuf::from("/sd/JOTEGO"),
                arc_name: Some("JTKIWI.ARC".to_string()),
            }]
        );
    }

    #[test]
    fn test_multi_mra_core_gets_default_and_subdirectory() {
        let inputs = [
            input("jtcps1", Some("Street Fighter II"), Some("sf2"), "Final Fight (World).mra"),
            input("jtcps1", Some("Street Fighter II"), Some("sf2"), "Street Fighter II (World).mra"),
        ];
        let jobs = plan_arc_jobs(&inputs, Path::new("/sd/JOTEGO"));

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].label, "Street Fighter II (World).mra");
        assert_eq!(jobs[0].out_dir, PathBuf::from("/sd/JOTEGO"));
        assert_eq!(jobs[0].arc_name.as_deref(), Some("SF2.ARC"));
        assert!(jobs[1..]
            .iter()
            .all(|j| j.out_dir == Path::new("/sd/JOTEGO/CPS1") && j.arc_name.is_none()));
    }

    #[test]
    fn test_tool_arguments() {
        let job = ArcJob {
            mra: PathBuf::from("/cache/Kiwi.mra"),
            label: "Kiwi.mra".to_string(),
            out_dir: PathBuf::from("/sd/JOTEGO"),
            arc_name: Some("JTKIWI.ARC".to_string()),
        };
        assert_eq!(
            MraTool::args(&job, Path::new("/tmp/roms")).join(" "),
            "-A -z /tmp/roms -O /sd/JOTEGO -a JTKIWI.ARC /cache/Kiwi.mra"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_a_conversion_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let job = ArcJob {
            mra: dir.path().join("x.mra"),
            label: "x.mra".to_string(),
            out_dir: dir.path().join("out"),
            arc_name: None,
        };
        let err = MraTool::new("false").convert(&job, dir.path()).await.unwrap_err();
        assert!(matches!(err, LayoutError::Conversion { .. }));
    }
}
