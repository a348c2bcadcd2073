use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Variable store and working directory of the interpreter.
///
/// Variables live in two layers:
/// - `base`: a snapshot of the process environment taken once at construction.
///   It is never modified afterwards.
/// - `local`: values assigned with `NAME=value`. They shadow `base` on lookup
///   and are exported to child processes on top of it.
#[derive(Debug, Clone)]
pub struct Environment {
    base: HashMap<String, String>,
    local: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_base(stdenv::vars().collect(), current_dir)
    }

    /// Build an environment from an explicit base layer.
    pub fn with_base(base: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self {
            base,
            local: HashMap::new(),
            current_dir,
        }
    }

    /// Get the value of a variable, local layer first, then base.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.local
            .get(key)
            .or_else(|| self.base.get(key))
            .map(String::as_str)
    }

    /// Like [`Environment::get_var`] but falls back to `default`.
    pub fn get(&self, key: &str, default: &str) -> String {
        self.get_var(key).unwrap_or(default).to_string()
    }

    /// Set or override a variable in the local layer.
    ///
    /// Returns `false` and leaves the store untouched when `key` is not a
    /// valid identifier.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) -> bool {
        let key = key.into();
        if !is_identifier(&key) {
            return false;
        }
        self.local.insert(key, val.into());
        true
    }

    /// Remove a local override, uncovering the base value if there is one.
    pub fn unset_var(&mut self, key: &str) {
        self.local.remove(key);
    }

    /// Environment handed to child processes: base with local on top.
    pub fn merged(&self) -> HashMap<String, String> {
        let mut vars = self.base.clone();
        vars.extend(self.local.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    /// Resolve `path` against the interpreter's working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env() -> Environment {
        Environment::with_base(HashMap::new(), stdenv::current_dir().unwrap())
    }

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = empty_env();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);
        assert_eq!(env.get("SOME_RANDOM_ENV_VAR_12345", "dflt"), "dflt");

        assert!(env.set_var("KEY", "VALUE"));

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_local_layer_shadows_base() {
        let base = HashMap::from([("HOME".to_string(), "/base/home".to_string())]);
        let mut env = Environment::with_base(base, PathBuf::from("/"));

        env.set_var("HOME", "/local/home");
        assert_eq!(env.get("HOME", ""), "/local/home");
        assert_eq!(env.merged().get("HOME").map(String::as_str), Some("/local/home"));

        env.unset_var("HOME");
        assert_eq!(env.get("HOME", ""), "/base/home");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let mut env = empty_env();
        assert!(!env.set_var("1abc", "x"));
        assert!(!env.set_var("a-b", "x"));
        assert!(!env.set_var("", "x"));
        assert!(env.set_var("_a1", "x"));
        assert_eq!(env.get_var("1abc"), None);
    }

    #[test]
    fn test_resolve_relative_to_current_dir() {
        let env = Environment::with_base(HashMap::new(), PathBuf::from("/tmp/work"));
        assert_eq!(env.resolve("a.txt"), PathBuf::from("/tmp/work/a.txt"));
        assert_eq!(env.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
