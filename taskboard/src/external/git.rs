// VcsProvider backed by the git command line

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::services::VcsProvider;
use crate::domain::{DomainError, DomainResult};

#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

/// Run git in `dir` and return trimmed stdout.
fn git(dir: &Path, args: &[&str]) -> DomainResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| DomainError::external(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        return Err(DomainError::external(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl VcsProvider for GitCli {
    fn is_repository(&self, path: &Path) -> bool {
        git(path, &["rev-parse", "--git-dir"]).is_ok()
    }

    fn get_repository_root(&self, path: &Path) -> DomainResult<String> {
        git(path, &["rev-parse", "--show-toplevel"])
    }

    fn get_current_branch(&self, path: &Path) -> DomainResult<String> {
        let branch = git(path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch != "HEAD" {
            return Ok(branch);
        }
        let short = git(path, &["rev-parse", "--short", "HEAD"])?;
        Ok(format!("HEAD (detached at {short})"))
    }

    fn list_branches(&self, path: &Path) -> DomainResult<Vec<String>> {
        let out = git(path, &["branch", "--format=%(refname:short)"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn get_refs_path(&self, path: &Path) -> DomainResult<String> {
        let git_dir = PathBuf::from(git(path, &["rev-parse", "--git-dir"])?);
        let git_dir = if git_dir.is_absolute() { git_dir } else { path.join(git_dir) };
        let refs = git_dir.join("refs").join("heads");
        Ok(if refs.is_dir() {
            refs.to_string_lossy().into_owned()
        } else {
            String::new()
        })
    }

    fn branch_exists(&self, path: &Path, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        git(path, &["rev-parse", "--verify", "--quiet", &reference]).is_ok()
    }

    fn checkout_branch(&self, path: &Path, branch: &str) -> DomainResult<()> {
        git(path, &["checkout", branch]).map(|_| ())
    }

    fn create_and_checkout_branch(&self, path: &Path, branch: &str) -> DomainResult<()> {
        git(path, &["checkout", "-b", branch]).map(|_| ())
    }
}
