use super::package_db::PackageDatabase;
use crate::config::ClassRules;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a path is or is not excluded from a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    ExcludedFile,
    Unowned,
    IncludedPackage,
    ExcludedPackage,
    ExcludedRepository,
    Retained,
}

impl Verdict {
    pub fn is_excluded(self) -> bool {
        matches!(
            self,
            Self::ExcludedFile | Self::ExcludedPackage | Self::ExcludedRepository
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::ExcludedFile => "excluded file",
            Self::Unowned => "no package",
            Self::IncludedPackage => "included package",
            Self::ExcludedPackage => "excluded package",
            Self::ExcludedRepository => "excluded repository",
            Self::Retained => "retained",
        };
        f.write_str(reason)
    }
}

/// Maps command paths to packages and decides class membership.
///
/// Every lookup is memoized for the lifetime of the classifier; nothing
/// persists across runs.
pub struct PolicyClassifier<D: PackageDatabase> {
    db: D,
    packages: HashMap<PathBuf, Option<String>>,
    repositories: HashMap<String, BTreeSet<String>>,
    verdicts: HashMap<(String, PathBuf), Verdict>,
    regular_files: HashMap<PathBuf, bool>,
}

impl<D: PackageDatabase> PolicyClassifier<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            packages: HashMap::new(),
            repositories: HashMap::new(),
            verdicts: HashMap::new(),
            regular_files: HashMap::new(),
        }
    }

    pub fn owning_package(&mut self, path: &Path) -> Option<String> {
        if let Some(package) = self.packages.get(path) {
            return package.clone();
        }
        let package = self.db.owning_package(path);
        self.packages.insert(path.to_path_buf(), package.clone());
        package
    }

    pub fn source_repositories(&mut self, package: &str) -> BTreeSet<String> {
        if let Some(repos) = self.repositories.get(package) {
            return repos.clone();
        }
        let repos = self.db.source_repositories(package);
        self.repositories.insert(package.to_string(), repos.clone());
        repos
    }

    /// Whether `path` is a regular file, or a symlink to one.
    pub fn is_regular_file(&mut self, path: &Path) -> bool {
        *self
            .regular_files
            .entry(path.to_path_buf())
            .or_insert_with(|| path.is_file())
    }

    pub fn is_excluded(&mut self, path: &Path, class: &str, rules: &ClassRules) -> bool {
        self.classify(path, class, rules).is_excluded()
    }

    /// Evaluates the class rules for `path`, first match wins:
    /// excluded file pattern, unowned path, included package, excluded
    /// package, excluded repository.
    pub fn classify(&mut self, path: &Path, class: &str, rules: &ClassRules) -> Verdict {
        let cache_key = (class.to_string(), path.to_path_buf());
        if let Some(verdict) = self.verdicts.get(&cache_key) {
            return *verdict;
        }

        let verdict = if rules.is_empty() {
            Verdict::Retained
        } else {
            self.evaluate(path, rules)
        };
        self.verdicts.insert(cache_key, verdict);
        verdict
    }

    fn evaluate(&mut self, path: &Path, rules: &ClassRules) -> Verdict {
        if rules.exclude_files.matches(&path.to_string_lossy()) {
            return Verdict::ExcludedFile;
        }
        let Some(package) = self.owning_package(path) else {
            return Verdict::Unowned;
        };
        if rules.include_packages.matches(&package) {
            return Verdict::IncludedPackage;
        }
        if rules.exclude_packages.matches(&package) {
            return Verdict::ExcludedPackage;
        }
        if rules.exclude_repos.is_empty() {
            return Verdict::Retained;
        }
        if rules
            .exclude_repos
            .matches_any(&self.source_repositories(&package))
        {
            Verdict::ExcludedRepository
        } else {
            Verdict::Retained
        }
    }
}
