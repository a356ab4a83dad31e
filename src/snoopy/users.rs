//! Memoized uid to user name lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves numeric uids against a passwd file, caching every answer.
///
/// Unknown uids resolve to the number itself.
pub struct UserDirectory {
    passwd: PathBuf,
    names: Option<HashMap<u32, String>>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new("/etc/passwd")
    }
}

impl UserDirectory {
    pub fn new(passwd: impl AsRef<Path>) -> Self {
        Self {
            passwd: passwd.as_ref().to_path_buf(),
            names: None,
        }
    }

    pub fn username(&mut self, uid: &str) -> String {
        let Ok(id) = uid.trim().parse::<u32>() else {
            return uid.to_string();
        };
        let passwd = &self.passwd;
        let names = self.names.get_or_insert_with(|| load_passwd(passwd));
        names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }
}

fn load_passwd(path: &Path) -> HashMap<u32, String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("cannot read {}: {e}", path.display());
            return HashMap::new();
        }
    };

    let mut names = HashMap::new();
    for line in contents.lines() {
        let mut parts = line.split(':');
        if let (Some(name), Some(_), Some(uid)) = (parts.next(), parts.next(), parts.next()) {
            if let Ok(uid) = uid.parse() {
                names.entry(uid).or_insert_with(|| name.to_string());
            }
        }
    }
    names
}
