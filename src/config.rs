//! Collator configuration.
//!
//! Loaded from a TOML file, by default the first of
//! `$SNOOPY_LOG_COLLATOR_CONFIG`, `~/.snoopy-log-collator.toml` and
//! `/etc/snoopy-log-collator.toml` that exists.
//!
//! ```toml
//! log-dir = "/var/log/snoopy"
//! collation-dir = "/shared/snoopy/collation"
//!
//! [classes.local]
//! exclude-files = ["/tmp/.*"]
//! include-packages = ["local-tools"]
//! exclude-packages = ["bash", "coreutils"]
//! exclude-repos = ["base", "updates"]
//! ```
//!
//! Every list holds regular expressions which must match the whole path,
//! package name or repository id. The class name `all` is reserved for the
//! implicit class which records everything.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Implicit class matching every command.
pub const ALL_CLASS: &str = "all";

/// Directory name of the cross-host merged tree inside a consolidated class.
pub const CONSOLIDATED_DIR: &str = "ALL";

/// Staging directory inside a class tree.
pub const TEMP_DIR: &str = ".tmp";

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SNOOPY_LOG_COLLATOR_CONFIG";

const DEFAULT_LOG_FILE_PATTERN: &str = r"^snoopy-(\d{4})(\d{2})(\d{2})(\.gz|\.zst)?$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error {}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Configuration error: none of {tried} found")]
    NoCandidate { tried: String },

    #[error("Configuration error {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Configuration error {}: class name '{name}' is reserved", path.display())]
    ReservedClass { path: PathBuf, name: String },

    #[error("Configuration error {}: invalid class name '{name}'", path.display())]
    InvalidClassName { path: PathBuf, name: String },

    #[error("Configuration error {}: bad pattern in {context}: {source}", path.display())]
    InvalidPattern {
        path: PathBuf,
        context: String,
        source: regex::Error,
    },

    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    log_dir: String,
    collation_dir: String,
    consolidation_dir: Option<String>,
    hostname: Option<String>,
    #[serde(default = "default_host_in_output")]
    host_in_output: bool,
    log_file_pattern: Option<String>,
    #[serde(default)]
    classes: BTreeMap<String, RawClass>,
}

fn default_host_in_output() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawClass {
    #[serde(default)]
    exclude_files: Vec<String>,
    #[serde(default)]
    include_packages: Vec<String>,
    #[serde(default)]
    exclude_packages: Vec<String>,
    #[serde(default)]
    exclude_repos: Vec<String>,
}

/// Whole-string regular expressions.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compiles each pattern anchored at both ends.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("^(?:{})$", p.as_ref())))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(candidate))
    }

    pub fn matches_any<'a, I>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        candidates.into_iter().any(|c| self.matches(c))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Exclusion rules of one class.
#[derive(Debug, Clone, Default)]
pub struct ClassRules {
    pub exclude_files: PatternSet,
    pub include_packages: PatternSet,
    pub exclude_packages: PatternSet,
    pub exclude_repos: PatternSet,
}

impl ClassRules {
    /// True when no rule could ever exclude a path.
    pub fn is_empty(&self) -> bool {
        self.exclude_files.is_empty()
            && self.exclude_packages.is_empty()
            && self.exclude_repos.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub log_dir: PathBuf,
    pub collation_dir: PathBuf,
    pub consolidation_dir: PathBuf,
    pub hostname: String,
    pub host_in_output: bool,
    pub log_file_pattern: Regex,
    classes: BTreeMap<String, ClassRules>,
    all_rules: ClassRules,
}

impl Config {
    /// Load config from an explicit path, or from the first default location found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                path.to_path_buf()
            }
            None => {
                let candidates = Self::candidates();
                match candidates.iter().find(|c| c.exists()) {
                    Some(found) => found.clone(),
                    None => {
                        return Err(ConfigError::NoCandidate {
                            tried: candidates
                                .iter()
                                .map(|c| c.display().to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                        })
                    }
                }
            }
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents, &path)
    }

    /// Default locations, in lookup order.
    pub fn candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(env) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(env));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".snoopy-log-collator.toml"));
        }
        candidates.push(PathBuf::from("/etc/snoopy-log-collator.toml"));
        candidates
    }

    /// Parse and validate a configuration document; `path` is used in errors.
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let pattern_error = |context: String| {
            let path = path.to_path_buf();
            move |source| ConfigError::InvalidPattern {
                path,
                context,
                source,
            }
        };

        let mut classes = BTreeMap::new();
        for (name, raw_class) in raw.classes {
            if name == ALL_CLASS || name == CONSOLIDATED_DIR {
                return Err(ConfigError::ReservedClass {
                    path: path.to_path_buf(),
                    name,
                });
            }
            if name.is_empty() || name.starts_with('.') || name.contains('/') {
                return Err(ConfigError::InvalidClassName {
                    path: path.to_path_buf(),
                    name,
                });
            }
            let rules = ClassRules {
                exclude_files: PatternSet::new(&raw_class.exclude_files)
                    .map_err(pattern_error(format!("classes.{name}.exclude-files")))?,
                include_packages: PatternSet::new(&raw_class.include_packages)
                    .map_err(pattern_error(format!("classes.{name}.include-packages")))?,
                exclude_packages: PatternSet::new(&raw_class.exclude_packages)
                    .map_err(pattern_error(format!("classes.{name}.exclude-packages")))?,
                exclude_repos: PatternSet::new(&raw_class.exclude_repos)
                    .map_err(pattern_error(format!("classes.{name}.exclude-repos")))?,
            };
            classes.insert(name, rules);
        }

        let log_file_pattern = Regex::new(
            raw.log_file_pattern
                .as_deref()
                .unwrap_or(DEFAULT_LOG_FILE_PATTERN),
        )
        .map_err(pattern_error("log-file-pattern".to_string()))?;

        let collation_dir = PathBuf::from(expand(&raw.collation_dir));
        let consolidation_dir = match raw.consolidation_dir {
            Some(dir) => PathBuf::from(expand(&dir)),
            None => {
                let mut dir = collation_dir.clone().into_os_string();
                dir.push("-consolidated");
                PathBuf::from(dir)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            log_dir: PathBuf::from(expand(&raw.log_dir)),
            collation_dir,
            consolidation_dir,
            hostname: raw.hostname.unwrap_or_else(local_hostname),
            host_in_output: raw.host_in_output,
            log_file_pattern,
            classes,
            all_rules: ClassRules::default(),
        })
    }

    /// Every class, the implicit `all` first.
    pub fn class_names(&self) -> Vec<String> {
        std::iter::once(ALL_CLASS.to_string())
            .chain(self.classes.keys().cloned())
            .collect()
    }

    /// Resolve a class selection from the command line; empty means every class.
    pub fn select_classes(&self, selection: &[String]) -> Result<Vec<String>, ConfigError> {
        if selection.is_empty() {
            return Ok(self.class_names());
        }
        selection
            .iter()
            .map(|name| {
                if name == ALL_CLASS || self.classes.contains_key(name) {
                    Ok(name.clone())
                } else {
                    Err(ConfigError::UnknownClass { name: name.clone() })
                }
            })
            .collect()
    }

    /// Rules for a class; `all` and unknown classes have none.
    pub fn rules(&self, class: &str) -> &ClassRules {
        self.classes.get(class).unwrap_or(&self.all_rules)
    }

    /// `<collation-dir>/<class>`
    pub fn collation_class_dir(&self, class: &str) -> PathBuf {
        self.collation_dir.join(class)
    }

    /// `<collation-dir>/<class>/<host>`
    pub fn collation_host_dir(&self, class: &str, host: &str) -> PathBuf {
        self.collation_class_dir(class).join(host)
    }

    /// `<collation-dir>/<class>/.tmp`, staging for rewritten host files.
    pub fn collation_temp_dir(&self, class: &str) -> PathBuf {
        self.collation_class_dir(class).join(TEMP_DIR)
    }

    /// `<consolidation-dir>/<class>`
    pub fn consolidation_class_dir(&self, class: &str) -> PathBuf {
        self.consolidation_dir.join(class)
    }

    /// `<consolidation-dir>/<class>/ALL`
    pub fn consolidated_dir(&self, class: &str) -> PathBuf {
        self.consolidation_class_dir(class).join(CONSOLIDATED_DIR)
    }

    /// `<consolidation-dir>/<class>/.tmp`, staging for merge output and the journal.
    ///
    /// Host and class names never start with `.`, so this cannot collide
    /// with a host tree or a command path.
    pub fn consolidation_temp_dir(&self, class: &str) -> PathBuf {
        self.consolidation_class_dir(class).join(TEMP_DIR)
    }

    /// `<consolidation-dir>/<class>/<host>`, where merged sources are archived.
    pub fn archive_dir(&self, class: &str, host: &str) -> PathBuf {
        self.consolidation_class_dir(class).join(host)
    }

    /// Marker recording the date of the last fully collated log file.
    pub fn last_processed_path(&self, host: &str) -> PathBuf {
        self.collation_dir.join(".last-processed").join(host)
    }
}

/// Hostname without domain.
pub fn bare_hostname(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

fn local_hostname() -> String {
    let name = fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "localhost".to_string());
    bare_hostname(&name).to_string()
}

/// Expands a leading `~` and `$VAR` / `${VAR}` references; unset variables are left alone.
fn expand(s: &str) -> String {
    let home_expanded = match (s.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{rest}", home.display())
        }
        _ => s.to_string(),
    };

    let var = Regex::new(r"\$(?:\{(\w+)\}|(\w+))").expect("static regex");
    var.replace_all(&home_expanded, |caps: &regex::Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str) -> Result<Config, ConfigError> {
        Config::from_toml_str(contents, Path::new("test.toml"))
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse(
            r#"
            log-dir = "/var/log/snoopy"
            collation-dir = "/srv/collation"
            hostname = "alpha"
            "#,
        )
        .unwrap();

        assert_eq!(config.consolidation_dir, PathBuf::from("/srv/collation-consolidated"));
        assert!(config.host_in_output);
        assert_eq!(config.class_names(), vec!["all"]);
        assert!(config.rules("all").is_empty());
        assert!(config.log_file_pattern.is_match("snoopy-20230101.gz"));
        assert_eq!(
            config.last_processed_path("alpha"),
            PathBuf::from("/srv/collation/.last-processed/alpha")
        );
    }

    #[test]
    fn test_reserved_class_rejected() {
        let err = parse(
            r#"
            log-dir = "/l"
            collation-dir = "/c"
            [classes.all]
            exclude-repos = ["base"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedClass { ref name, .. } if name == "all"));
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse(
            r#"
            log-dir = "/l"
            collation-dir = "/c"
            [classes.local]
            exclude-rpm = ["bash"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let err = parse(
            r#"
            log-dir = "/l"
            collation-dir = "/c"
            [classes.local]
            exclude-files = ["("]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("classes.local.exclude-files"));
    }

    #[test]
    fn test_patterns_match_whole_string() {
        let set = PatternSet::new(&["bash", "python3.*"]).unwrap();
        assert!(set.matches("bash"));
        assert!(!set.matches("bash-completion"));
        assert!(set.matches("python3-libs"));
    }

    #[test]
    fn test_select_classes() {
        let config = parse(
            r#"
            log-dir = "/l"
            collation-dir = "/c"
            [classes.local]
            [classes.site]
            "#,
        )
        .unwrap();
        assert_eq!(config.select_classes(&[]).unwrap(), vec!["all", "local", "site"]);
        assert_eq!(
            config.select_classes(&["site".to_string()]).unwrap(),
            vec!["site"]
        );
        assert!(matches!(
            config.select_classes(&["nope".to_string()]),
            Err(ConfigError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_expand_variables() {
        std::env::set_var("SNOOPY_TEST_ROOT", "/data");
        assert_eq!(expand("$SNOOPY_TEST_ROOT/logs"), "/data/logs");
        assert_eq!(expand("${SNOOPY_TEST_ROOT}/logs"), "/data/logs");
        assert_eq!(expand("$SNOOPY_UNSET_VARIABLE_X/logs"), "$SNOOPY_UNSET_VARIABLE_X/logs");
    }

    #[test]
    fn test_bare_hostname() {
        assert_eq!(bare_hostname("alpha.example.com"), "alpha");
        assert_eq!(bare_hostname("beta"), "beta");
    }
}
