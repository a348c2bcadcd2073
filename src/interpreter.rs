use crate::command::{Captured, Command, CommandKind, EXIT_SENTINEL, ExitCode, Pipeline};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::expand::ExpansionContext;
use crate::external::ExternalCommand;
use crate::parser::{self, ParseError};
use log::{debug, info, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns the variable store and runs one line at a time:
/// parsing (which already runs any `$( ... )` substitutions), then executing
/// the resulting pipeline stage by stage.
///
/// Example
/// ```
/// use cli_shell::Interpreter;
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let code = sh.run_line_with_output("echo hello world", &mut out, &mut err).unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(out, b"hello world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    config: ShellConfig,
    /// Nesting level of the command substitution being expanded.
    depth: usize,
    /// Diagnostics of substitutions run while parsing, not yet written out.
    pending_stderr: Vec<u8>,
}

impl Interpreter {
    /// Create an interpreter over a snapshot of the process environment.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_environment(Environment::new(), config)
    }

    pub fn with_environment(env: Environment, config: ShellConfig) -> Self {
        Self {
            env,
            config,
            depth: 0,
            pending_stderr: Vec::new(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Parse a line, running its command substitutions.
    pub fn parse(&mut self, line: &str) -> Result<Option<Pipeline>, ParseError> {
        parser::parse_line(line, self)
    }

    /// Parse and execute one line against the process stdout and stderr.
    ///
    /// Blank lines succeed with 0. A parse error is returned without executing
    /// anything.
    pub fn run_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_line_with_output(line, &mut stdout.lock(), &mut stderr.lock())
    }

    /// [`Interpreter::run_line`] with explicit output sinks.
    pub fn run_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        match self.parse(line) {
            Ok(Some(pipeline)) => Ok(self.execute_with_output(&pipeline, stdout, stderr)?),
            Ok(None) => {
                self.flush_pending(stderr)?;
                Ok(0)
            }
            Err(e) => {
                self.flush_pending(stderr)?;
                Err(e.into())
            }
        }
    }

    /// Execute a parsed line, writing to the process stdout and stderr.
    pub fn execute(&mut self, pipeline: &Pipeline) -> io::Result<ExitCode> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.execute_with_output(pipeline, &mut stdout.lock(), &mut stderr.lock())
    }

    /// Execute a parsed line with explicit output sinks.
    ///
    /// A single command writes straight into the sinks. Longer pipelines are
    /// handed to the pipeline runner.
    pub fn execute_with_output(
        &mut self,
        pipeline: &Pipeline,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> io::Result<ExitCode> {
        self.flush_pending(stderr)?;
        let code = if pipeline.len() > 1 {
            self.run_pipeline(pipeline, stdout, stderr)?
        } else {
            self.dispatch(pipeline.head(), None, stdout, stderr)?
        };
        stdout.flush()?;
        stderr.flush()?;
        Ok(code)
    }

    /// Run one command with its output captured instead of written out.
    ///
    /// `stdin` is the data fed to the command; `None` means it has no input.
    pub fn execute_capture(&mut self, command: &Command, stdin: Option<&[u8]>) -> Captured {
        let mut captured = Captured::default();
        // writes into a Vec cannot fail
        captured.code = self
            .dispatch(command, stdin, &mut captured.stdout, &mut captured.stderr)
            .unwrap_or(1);
        captured
    }

    /// Runs the stages in order, each one reading the previous stage's output.
    ///
    /// Every stage runs even after a failure. The result is the status of the
    /// last stage that failed, or 0.
    fn run_pipeline(
        &mut self,
        pipeline: &Pipeline,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> io::Result<ExitCode> {
        let mut previous: Option<Vec<u8>> = None;
        let mut last_failure = 0;

        for command in pipeline.stages() {
            let captured = self.execute_capture(command, previous.as_deref());
            stderr.write_all(&captured.stderr)?;
            stderr.flush()?;
            if captured.code != 0 {
                debug!("stage {} failed with {}", command.name, captured.code);
                last_failure = captured.code;
            }
            previous = Some(captured.stdout);
        }

        if let Some(out) = previous {
            stdout.write_all(&out)?;
        }
        Ok(last_failure)
    }

    fn dispatch(
        &mut self,
        command: &Command,
        stdin: Option<&[u8]>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> io::Result<ExitCode> {
        debug!("dispatch {:?} {} {:?}", command.kind, command.name, command.args);
        match command.kind {
            CommandKind::Assignment => {
                if self.env.set_var(command.name.as_str(), command.args.join(" ")) {
                    Ok(0)
                } else {
                    writeln!(stderr, "Invalid variable name: {}", command.name)?;
                    Ok(1)
                }
            }
            CommandKind::Builtin(builtin) => {
                Ok(builtin.execute(&command.args, stdin, stdout, stderr, &mut self.env))
            }
            CommandKind::External => {
                let external = ExternalCommand::new(&command.name, &command.args);
                match external.run(&self.env, stdin, self.config.external_timeout) {
                    Ok(captured) => {
                        stdout.write_all(&captured.stdout)?;
                        stderr.write_all(&captured.stderr)?;
                        Ok(captured.code)
                    }
                    Err(e) => {
                        warn!("{} failed to run: {:?}", command.name, e);
                        writeln!(stderr, "{}: {}", command.name, e)?;
                        Ok(e.exit_code())
                    }
                }
            }
        }
    }

    fn flush_pending(&mut self, stderr: &mut dyn Write) -> io::Result<()> {
        if !self.pending_stderr.is_empty() {
            stderr.write_all(&std::mem::take(&mut self.pending_stderr))?;
        }
        Ok(())
    }

    /// Runs a substituted command line and returns its stdout.
    fn capture_line(&mut self, line: &str) -> Result<String, ParseError> {
        let Some(pipeline) = self.parse(line)? else {
            return Ok(String::new());
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        // writes into a Vec cannot fail
        let _ = self.execute_with_output(&pipeline, &mut out, &mut err);
        self.pending_stderr.extend_from_slice(&err);
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Interactive read-eval-print loop.
    ///
    /// Runs until `exit`, end of input or a terminal error. Ctrl-C at the
    /// prompt discards the current line; parse errors are reported and the loop
    /// goes on.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        // Children in the foreground still get SIGINT; the interpreter survives it.
        if let Err(e) = ctrlc::set_handler(|| debug!("interrupt received")) {
            warn!("cannot install interrupt handler: {}", e);
        }

        loop {
            let prompt = self.config.render_prompt(&self.env.current_dir);
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.run_line(&line) {
                        Ok(EXIT_SENTINEL) => {
                            info!("exit requested");
                            break;
                        }
                        Ok(code) => debug!("exit code {}", code),
                        Err(e) => eprintln!("Error: {:#}", e),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

impl ExpansionContext for Interpreter {
    fn lookup(&self, name: &str) -> String {
        self.env.get(name, "")
    }

    fn substitute(&mut self, line: &str) -> Result<String, ParseError> {
        if self.depth >= self.config.max_substitution_depth {
            return Err(ParseError::SubstitutionTooDeep(
                self.config.max_substitution_depth,
            ));
        }
        self.depth += 1;
        let result = self.capture_line(line);
        self.depth -= 1;
        result
    }
}
