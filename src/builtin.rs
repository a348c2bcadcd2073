use crate::command::{EXIT_SENTINEL, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result, anyhow, bail};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Cat,
    Echo,
    Wc,
    Pwd,
    Exit,
    Grep,
    Cd,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Cat,
        Builtin::Echo,
        Builtin::Wc,
        Builtin::Pwd,
        Builtin::Exit,
        Builtin::Grep,
        Builtin::Cd,
    ];

    /// Exact, case-sensitive lookup by command name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Canonical name of the command, e.g. "echo" or "cd".
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cat => "cat",
            Builtin::Echo => "echo",
            Builtin::Wc => "wc",
            Builtin::Pwd => "pwd",
            Builtin::Exit => "exit",
            Builtin::Grep => "grep",
            Builtin::Cd => "cd",
        }
    }

    /// Runs the builtin in-process.
    ///
    /// Failures never escape: they are printed to `stderr` as `<name>: <reason>`
    /// and turned into exit code 1.
    pub(crate) fn execute(
        self,
        args: &[String],
        stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> ExitCode {
        let result = match self {
            Builtin::Cat => run::<Cat>(args, stdin, stdout, env),
            Builtin::Echo => run::<Echo>(args, stdin, stdout, env),
            Builtin::Wc => run::<WC>(args, stdin, stdout, env),
            Builtin::Pwd => run::<Pwd>(args, stdin, stdout, env),
            Builtin::Exit => run::<Exit>(args, stdin, stdout, env),
            Builtin::Grep => run::<Grep>(args, stdin, stdout, env),
            Builtin::Cd => run::<Cd>(args, stdin, stdout, env),
        };
        match result {
            Ok(code) => code,
            Err(e) => {
                if let Err(io) = writeln!(stderr, "{}: {:#}", self.name(), e) {
                    log::warn!("cannot report {} failure: {}", self.name(), io);
                }
                1
            }
        }
    }
}

/// A builtin is parsed from its expanded arguments, then executed against
/// in-memory streams.
///
/// Return value should follow shell conventions: 0 for success, non-zero for error.
pub(crate) trait BuiltinCommand: Sized {
    fn from_args(args: &[String]) -> Result<Self>;

    /// `stdin` is `None` when the command is not fed by a pipe.
    fn execute(
        self,
        stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

fn run<T: BuiltinCommand>(
    args: &[String],
    stdin: Option<&[u8]>,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode> {
    T::from_args(args)?.execute(stdin, stdout, env)
}

/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn from_args(_args: &[String]) -> Result<Self> {
        Ok(Pwd {})
    }

    fn execute(
        self,
        _stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn from_args(args: &[String]) -> Result<Self> {
        match args {
            [] => Ok(Cd { target: None }),
            [target] => Ok(Cd {
                target: Some(target.clone()),
            }),
            _ => bail!("too many arguments"),
        }
    }

    fn execute(
        self,
        _stdin: Option<&[u8]>,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => bail!("no target and HOME not set"),
            },
        };

        let new_dir = env.resolve(&target);
        let canonical =
            fs::canonicalize(&new_dir).with_context(|| format!("{}", target.display()))?;

        std::env::set_current_dir(&canonical)
            .with_context(|| format!("{}", canonical.display()))?;
        env.set_var("PWD", canonical.to_string_lossy());
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Ask the interpreter to stop.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn from_args(_args: &[String]) -> Result<Self> {
        Ok(Exit {})
    }

    fn execute(
        self,
        _stdin: Option<&[u8]>,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        Ok(EXIT_SENTINEL)
    }
}

/// Write the arguments to standard output, separated by spaces, with a trailing newline.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn from_args(args: &[String]) -> Result<Self> {
        Ok(Echo {
            args: args.to_vec(),
        })
    }

    fn execute(
        self,
        _stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

/// Count lines, words and bytes of a file or of standard input.
pub struct WC {
    pub file: Option<String>,
}

impl WC {
    fn count(data: &[u8]) -> (usize, usize, usize) {
        let lines = data.iter().filter(|&&b| b == b'\n').count();
        let words = data
            .split(|&b| b.is_ascii_whitespace() || b == 0x0B)
            .filter(|w| !w.is_empty())
            .count();
        (lines, words, data.len())
    }
}

impl BuiltinCommand for WC {
    fn from_args(args: &[String]) -> Result<Self> {
        match args {
            [] => Ok(WC { file: None }),
            [file] => Ok(WC {
                file: Some(file.clone()),
            }),
            _ => bail!("too many arguments"),
        }
    }

    fn execute(
        self,
        stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match &self.file {
            Some(fname) => {
                let data =
                    fs::read(env.resolve(fname)).map_err(|e| anyhow!("{}: {}", fname, e))?;
                let (lines, words, bytes) = Self::count(&data);
                writeln!(stdout, "{} {} {} {}", lines, words, bytes, fname)?;
            }
            None => {
                let data = stdin.ok_or_else(|| anyhow!("no input source"))?;
                let (lines, words, bytes) = Self::count(data);
                writeln!(stdout, "{} {} {}", lines, words, bytes)?;
            }
        }
        Ok(0)
    }
}

/// Print a file to stdout.
pub struct Cat {
    pub file: String,
}

impl BuiltinCommand for Cat {
    fn from_args(args: &[String]) -> Result<Self> {
        match args {
            [] => bail!("Missing file argument"),
            [file] => Ok(Cat { file: file.clone() }),
            _ => bail!("too many arguments"),
        }
    }

    fn execute(
        self,
        _stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let data = fs::read(env.resolve(&self.file))
            .map_err(|e| anyhow!("{}: {}", self.file, e))?;
        stdout.write_all(&data)?;
        stdout.write_all(b"\n")?;
        Ok(0)
    }
}

/// Print lines matching a pattern.
#[derive(Debug, PartialEq, Eq)]
pub struct Grep {
    /// the pattern to search for (a regular expression)
    pub pattern: String,
    /// file to search. If none provided, reads from stdin.
    pub file: Option<String>,
    /// match only whole words
    pub word_regexp: bool,
    /// ignore case distinctions
    pub ignore_case: bool,
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn regex(&self) -> Result<Regex> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map_err(|e| anyhow!("invalid regex: {}", e))
    }

    /// Matching lines plus their trailing context, each line at most once.
    fn select<'a>(&self, lines: &[&'a str], re: &Regex) -> Vec<&'a str> {
        let mut selected = Vec::new();
        let mut last_printed_index: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !re.is_match(line) {
                continue;
            }
            let end = (i + self.after_context).min(lines.len() - 1);
            for (j, context_line) in lines.iter().enumerate().take(end + 1).skip(i) {
                if last_printed_index.is_none_or(|last| j > last) {
                    selected.push(*context_line);
                    last_printed_index = Some(j);
                }
            }
        }
        selected
    }
}

impl BuiltinCommand for Grep {
    fn from_args(args: &[String]) -> Result<Self> {
        let mut pattern = None;
        let mut file = None;
        let mut word_regexp = false;
        let mut ignore_case = false;
        let mut after_context = 0;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-i" => ignore_case = true,
                "-w" => word_regexp = true,
                "-A" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("option requires an argument -- 'A'"))?;
                    after_context = value.parse::<usize>().map_err(|_| {
                        anyhow!("invalid number of lines after context: '{}'", value)
                    })?;
                }
                flag if flag.starts_with('-') => bail!("Invalid option: {}", flag),
                _ if pattern.is_none() => pattern = Some(arg.clone()),
                _ if file.is_none() => file = Some(arg.clone()),
                // further positional arguments are ignored
                _ => {}
            }
        }

        Ok(Grep {
            pattern: pattern.ok_or_else(|| anyhow!("missing pattern"))?,
            file,
            word_regexp,
            ignore_case,
            after_context,
        })
    }

    fn execute(
        self,
        stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let text: Cow<'_, str> = match &self.file {
            Some(fname) => fs::read(env.resolve(fname))
                .map(|data| Cow::Owned(String::from_utf8_lossy(&data).into_owned()))
                .map_err(|e| anyhow!("{}: {}", fname, e))?,
            None => String::from_utf8_lossy(stdin.ok_or_else(|| anyhow!("no input source"))?),
        };

        let re = self.regex()?;
        let lines: Vec<&str> = text.lines().collect();
        for line in self.select(&lines, &re) {
            writeln!(stdout, "{}", line)?;
        }
        Ok(0)
    }
}
