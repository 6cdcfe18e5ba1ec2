//! Stage the project into a disposable workspace.
//!
//! Candidates are applied to a copy, never the real project. Failures here
//! are fatal to the session: without a staged tree there is nothing to test.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

/// A staged copy of the project plus the target file resolved inside it.
///
/// The [`TempDir`] keeps the workspace alive and removes it on drop.
pub struct Workspace {
    temp: TempDir,
    staged_target: PathBuf,
}

impl Workspace {
    /// Root of the staged project copy; the test command runs here.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Target file inside the staged copy; candidates overwrite this.
    pub fn staged_target(&self) -> &Path {
        &self.staged_target
    }
}

/// Copy the whole project into a fresh temporary directory and resolve the
/// target file's path inside the copy.
pub fn stage_project(project_root: &Path, target_file: &Path) -> Result<Workspace> {
    let rel_target = target_file
        .strip_prefix(project_root)
        .with_context(|| {
            format!("target file {target_file:?} is not inside project root {project_root:?}")
        })?
        .to_path_buf();

    let temp = TempDir::new().context("failed to create temporary workspace")?;

    copy_dir_recursive(project_root, temp.path()).with_context(|| {
        format!(
            "failed to copy project from {:?} to {:?}",
            project_root,
            temp.path()
        )
    })?;

    let staged_target = temp.path().join(&rel_target);
    if !staged_target.is_file() {
        bail!("staged target file {staged_target:?} does not exist");
    }

    Ok(Workspace {
        temp,
        staged_target,
    })
}

/// Recursively copy all files and directories from `src` into `dst`.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create dir {dst:?}"))?;

    for entry in fs::read_dir(src).with_context(|| format!("failed to read dir {src:?}"))? {
        let entry = entry?;
        let path = entry.path();
        let target = dst.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target)
                .with_context(|| format!("failed to copy file {path:?} to {target:?}"))?;
        }
    }

    Ok(())
}
