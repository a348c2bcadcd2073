use crate::command::{Captured, ExitCode};
use crate::env::Environment;
use log::{debug, warn};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Reasons an external program could not run to completion.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LaunchError {
    /// Shell-style status reported for this failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            LaunchError::NotFound => 127,
            LaunchError::PermissionDenied => 126,
            LaunchError::TimedOut(_) => 124,
            LaunchError::Io(_) => 1,
        }
    }
}

/// Command that is not a builtin.
pub struct ExternalCommand<'a> {
    name: &'a str,
    args: &'a [String],
}

impl<'a> ExternalCommand<'a> {
    pub fn new(name: &'a str, args: &'a [String]) -> Self {
        Self { name, args }
    }

    /// Spawns the program and waits for it, capturing stdout and stderr.
    ///
    /// The child sees the merged variable store as its whole environment and
    /// runs in the interpreter's current directory. `stdin` bytes are written
    /// to its standard input; without them it reads from `/dev/null`.
    pub fn run(
        &self,
        env: &Environment,
        stdin: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<Captured, LaunchError> {
        let vars = env.merged();
        let search_paths = vars.get("PATH").map(String::as_str).unwrap_or_default();
        let executable = find_command_path(OsStr::new(search_paths), Path::new(self.name))
            .ok_or(LaunchError::NotFound)?;
        debug!("spawning {} {:?}", executable.display(), self.args);

        let mut child = std::process::Command::new(&*executable)
            .args(self.args)
            .env_clear()
            .envs(&vars)
            .current_dir(&env.current_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => LaunchError::NotFound,
                ErrorKind::PermissionDenied => LaunchError::PermissionDenied,
                _ => LaunchError::Io(e),
            })?;

        // Feed stdin from a separate thread so a child that fills its stdout
        // pipe before reading all of its input cannot deadlock us.
        let feeder = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(data)) => {
                let data = data.to_vec();
                Some(thread::spawn(move || {
                    // the child may exit without reading everything
                    let _ = pipe.write_all(&data);
                }))
            }
            _ => None,
        };
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    warn!("{} exceeded {:?}, killing it", self.name, limit);
                    // it may have exited right after the deadline
                    let _ = child.kill();
                    child.wait()?;
                    return Err(LaunchError::TimedOut(limit));
                }
            },
            None => child.wait()?,
        };

        if let Some(handle) = feeder {
            handle.join().ok();
        }
        Ok(Captured {
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
            code: status.code().unwrap_or_else(|| terminated_by_signal(status)),
        })
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
