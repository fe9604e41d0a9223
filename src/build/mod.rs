//! Running a packaging plan: lay out the staging directory, then archive it.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveSummary};
use crate::cfg::{self, Config, FileStep, TreeStep};
use crate::copy::{self, EntryInfo};
use crate::filter::PatternFilter;
use crate::pack;
use crate::ui;

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub staging: PathBuf,
    pub archive: PathBuf,
    pub summary: ArchiveSummary,
}

/// Execute every step of `config`, resolving relative paths against `base`.
///
/// An existing staging directory is an error unless `clean` is set, in which
/// case it is removed first.
pub fn run(config: &Config, base: &Path, clean: bool) -> Result<BuildReport> {
    let staging = cfg::resolve(base, &config.dist.staging);
    prepare_staging(&staging, clean)?;

    for step in &config.files {
        copy_files(config, base, &staging, step)?;
    }
    for step in &config.trees {
        copy_tree(config, base, &staging, step)?;
    }

    let archive = cfg::resolve(base, &config.dist.archive);
    if let Some(parent) = archive.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create archive directory {}", parent.display())
            })?;
        }
    }
    let summary = archive::zip_dist(&archive, &config.dist.name, &staging)
        .with_context(|| format!("Failed to build archive {}", archive.display()))?;

    Ok(BuildReport {
        staging,
        archive,
        summary,
    })
}

fn prepare_staging(staging: &Path, clean: bool) -> Result<()> {
    if staging.exists() {
        if !clean {
            anyhow::bail!(
                "Staging directory {} already exists. Use --clean to remove it first.",
                staging.display()
            );
        }
        ui::info(&format!("Removing {}", staging.display()));
        fs::remove_dir_all(staging)
            .with_context(|| format!("Failed to remove {}", staging.display()))?;
    }
    fs::create_dir_all(staging)
        .with_context(|| format!("Failed to create staging directory {}", staging.display()))
}

fn copy_files(config: &Config, base: &Path, staging: &Path, step: &FileStep) -> Result<()> {
    let dest = staging.join(&step.dest);
    fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let sources: Vec<PathBuf> = step
        .sources
        .iter()
        .map(|source| cfg::resolve(base, source))
        .collect();
    copy::copy_to_dir(&dest, &sources, &config.copy_options(step.os_dependent))?;
    Ok(())
}

fn copy_tree(config: &Config, base: &Path, staging: &Path, step: &TreeStep) -> Result<()> {
    let dest = staging.join(&step.dest);
    fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let source = cfg::resolve(base, &step.source);
    let filter = PatternFilter::new(&step.include, &step.exclude, step.skip_hidden)?;
    let matches = |dir: &Path, entry: &EntryInfo| filter.matches(dir, entry);
    let predicate: Option<copy::Filter<'_>> = if filter.is_noop() {
        None
    } else {
        Some(&matches)
    };

    pack::copy_tree(&dest, &source, &config.copy_options(false), predicate)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::DistConfig;
    use crate::copy::OsDepNames;
    use tempfile::TempDir;

    fn project(root: &Path) -> Config {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("assets/css")).unwrap();
        fs::write(root.join("bin/tool"), "binary").unwrap();
        fs::write(root.join("README.md"), "# tool").unwrap();
        fs::write(root.join("assets/css/site.css"), "body {}").unwrap();
        fs::write(root.join("assets/css/site.css.bak"), "old").unwrap();

        Config {
            dist: DistConfig {
                name: "tool-1.0".to_string(),
                archive: PathBuf::from("out/tool-1.0.zip"),
                staging: PathBuf::from("out/stage"),
            },
            copy: Default::default(),
            os_names: OsDepNames::new(),
            files: vec![
                FileStep {
                    dest: PathBuf::from("bin"),
                    sources: vec![PathBuf::from("bin/tool")],
                    os_dependent: true,
                },
                FileStep {
                    dest: PathBuf::from("."),
                    sources: vec![PathBuf::from("README.md")],
                    os_dependent: false,
                },
            ],
            trees: vec![TreeStep {
                source: PathBuf::from("assets"),
                dest: PathBuf::from("share"),
                include: Vec::new(),
                exclude: vec!["*.bak".to_string()],
                skip_hidden: false,
            }],
        }
    }

    #[test]
    fn test_run_lays_out_staging_and_archives_it() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let config = project(temp.path());

        let report = run(&config, temp.path(), false).unwrap();

        let staging = temp.path().join("out/stage");
        assert_eq!(report.staging, staging);
        assert!(staging.join("bin/tool").is_file());
        assert!(staging.join("README.md").is_file());
        assert!(staging.join("share/assets/css/site.css").is_file());
        assert!(!staging.join("share/assets/css/site.css.bak").exists());
        assert_eq!(report.archive, temp.path().join("out/tool-1.0.zip"));
        assert!(report.archive.is_file());
        assert_eq!(report.summary.file_count, 3);
    }

    #[test]
    fn test_run_requires_clean_for_existing_staging() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let config = project(temp.path());

        run(&config, temp.path(), false).unwrap();
        let err = run(&config, temp.path(), false).unwrap_err();
        assert!(err.to_string().contains("--clean"));

        run(&config, temp.path(), true).unwrap();
    }

    #[test]
    fn test_run_fails_on_missing_source() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let mut config = project(temp.path());
        config.files[1].sources.push(PathBuf::from("CHANGELOG.md"));

        let err = run(&config, temp.path(), false).unwrap_err();

        assert!(format!("{err:#}").contains("CHANGELOG.md"));
        assert!(!temp.path().join("out/tool-1.0.zip").exists());
    }

    #[test]
    fn test_run_rejects_tree_containing_staging() {
        ui::set_quiet(true);
        let temp = TempDir::new().unwrap();
        let mut config = project(temp.path());
        config.trees[0].source = PathBuf::from(".");

        let err = run(&config, temp.path(), false).unwrap_err();

        let copy_err = err
            .downcast_ref::<crate::error::CopyError>()
            .expect("copy error");
        assert!(matches!(copy_err, crate::error::CopyError::Nested { .. }));
        assert!(format!("{err:#}").contains("lies inside source"));
        assert_eq!(
            fs::read_dir(temp.path().join("out/stage/share"))
                .unwrap()
                .count(),
            0
        );
        assert!(!temp.path().join("out/tool-1.0.zip").exists());
    }
}
