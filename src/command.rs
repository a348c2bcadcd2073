use crate::builtin::Builtin;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Reserved exit code returned by `exit`.
///
/// It lies outside the 0-255 range of real process statuses and means
/// "stop the interpreter"; callers must never pass it to `std::process::exit`.
pub const EXIT_SENTINEL: ExitCode = 256;

/// What a parsed command does when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `NAME=value`, stored in the local variable layer.
    Assignment,
    /// A command implemented inside the interpreter.
    Builtin(Builtin),
    /// A program looked up on `PATH` and spawned as a child process.
    External,
}

/// A single, fully expanded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// Variable name for assignments, program or builtin name otherwise.
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(kind: CommandKind, name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            args,
        }
    }

    pub fn assignment(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(CommandKind::Assignment, name, vec![value.into()])
    }
}

/// Commands of one line in execution order.
///
/// Stage `i` feeds its captured stdout into stage `i + 1`; the last stage has
/// no successor. A single command is a pipeline of length one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Command>,
}

impl Pipeline {
    /// Returns `None` for an empty stage list.
    pub fn new(stages: Vec<Command>) -> Option<Self> {
        if stages.is_empty() {
            None
        } else {
            Some(Self { stages })
        }
    }

    pub fn single(command: Command) -> Self {
        Self {
            stages: vec![command],
        }
    }

    pub fn head(&self) -> &Command {
        &self.stages[0]
    }

    /// The stage that consumes the output of stage `index`, if any.
    pub fn next_of(&self, index: usize) -> Option<&Command> {
        self.stages.get(index + 1)
    }

    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Output and status collected from a command run in capture mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub code: ExitCode,
}

impl Captured {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}
