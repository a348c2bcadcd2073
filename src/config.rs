use std::path::Path;
use std::time::Duration;

/// Placeholder in [`ShellConfig::prompt`] replaced by the current directory.
pub const CWD_PLACEHOLDER: &str = "{cwd}";

/// Tunables of an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Prompt template for the read loop.
    pub prompt: String,
    /// Kill external programs that run longer than this.
    pub external_timeout: Option<Duration>,
    /// How deeply `$( ... )` may nest before parsing fails.
    pub max_substitution_depth: usize,
}

impl ShellConfig {
    pub fn render_prompt(&self, cwd: &Path) -> String {
        self.prompt.replace(CWD_PLACEHOLDER, &cwd.to_string_lossy())
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: format!("{} > ", CWD_PLACEHOLDER),
            external_timeout: None,
            max_substitution_depth: 64,
        }
    }
}
