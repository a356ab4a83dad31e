//! Package manager queries.
//!
//! Both queries spawn external tools and are slow, so callers go through
//! [`PolicyClassifier`](super::PolicyClassifier), which caches every answer.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

/// Source of package ownership and repository metadata.
pub trait PackageDatabase {
    /// Package owning `path`, or `None` when no package owns it.
    fn owning_package(&self, path: &Path) -> Option<String>;

    /// Repositories `package` is available from; empty when unknown.
    fn source_repositories(&self, package: &str) -> BTreeSet<String>;
}

/// RPM ownership with yum repository metadata.
pub struct RpmDatabase {
    repo_re: Regex,
}

impl Default for RpmDatabase {
    fn default() -> Self {
        Self {
            repo_re: Regex::new(r"^(?:From )?[Rr]epo\s*:\s*(\S*)").expect("static regex"),
        }
    }
}

impl RpmDatabase {
    /// Repository ids mentioned in `yum info` output.
    pub fn parse_repositories(&self, yum_info: &str) -> BTreeSet<String> {
        yum_info
            .lines()
            .filter_map(|line| self.repo_re.captures(line))
            .map(|caps| caps[1].to_string())
            .filter(|repo| !repo.is_empty())
            .collect()
    }
}

/// Package name from the first line of `rpm -qf` output.
pub fn parse_rpm_owner(rpm_output: &str) -> Option<String> {
    let line = rpm_output.lines().next()?.trim();
    if line.is_empty() || line.ends_with("is not owned by any package") {
        None
    } else {
        Some(line.to_string())
    }
}

impl PackageDatabase for RpmDatabase {
    fn owning_package(&self, path: &Path) -> Option<String> {
        if !path.exists() {
            return None;
        }
        let output = match Command::new("rpm")
            .args(["-qf", "--qf", "%{NAME}\n"])
            .arg(path)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("rpm -qf {} failed: {e}", path.display());
                return None;
            }
        };
        // rpm reports unowned files on stdout with a non-zero exit
        parse_rpm_owner(&String::from_utf8_lossy(&output.stdout))
    }

    fn source_repositories(&self, package: &str) -> BTreeSet<String> {
        let output = match Command::new("yum").args(["info", package]).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("yum info {package} failed: {e}");
                return BTreeSet::new();
            }
        };

        let repos = self.parse_repositories(&String::from_utf8_lossy(&output.stdout));
        if repos.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.starts_with("Error") || !output.status.success() {
                tracing::warn!("yum info {package}: {}", stderr.trim());
            }
        }
        repos
    }
}
