use argh::FromArgs;
use cli_shell::Interpreter;
use cli_shell::command::EXIT_SENTINEL;
use cli_shell::config::ShellConfig;
use std::process::ExitCode;
use std::time::Duration;

#[derive(FromArgs)]
/// A small shell-like interpreter with pipes, variables and command substitution.
struct Args {
    #[argh(option, short = 'c')]
    /// run one command line and exit with its status.
    command: Option<String>,

    #[argh(option)]
    /// kill external programs after this many seconds.
    timeout: Option<u64>,

    #[argh(option)]
    /// prompt template; `{cwd}` is replaced by the current directory.
    prompt: Option<String>,

    #[argh(option)]
    /// maximum nesting of `$( ... )`.
    max_depth: Option<usize>,
}

impl Args {
    fn config(&self) -> ShellConfig {
        let mut config = ShellConfig::default();
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        config.external_timeout = self.timeout.map(Duration::from_secs);
        if let Some(depth) = self.max_depth {
            config.max_substitution_depth = depth;
        }
        config
    }
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let args: Args = argh::from_env();
    let mut shell = Interpreter::new(args.config());

    let Some(line) = &args.command else {
        shell.repl()?;
        return Ok(ExitCode::SUCCESS);
    };

    let code = match shell.run_line(line) {
        Ok(EXIT_SENTINEL) => 0,
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };
    Ok(ExitCode::from(code.clamp(0, 255) as u8))
}
