use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// How a decoder call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Exited with status 0
    Ok,
    /// Ran but exited with a non-zero status (e.g. called without arguments)
    Failed,
    /// Could not be started at all
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    pub status: CallStatus,
    /// Captured stdout, when requested and the process started
    pub stdout: Option<Vec<u8>>,
}

/// A decoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CliCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, capture_stdout: bool) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        command
    }
}

/// Decoder options shared by every call of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Decode with loops instead of passing `-i`
    pub looping: bool,
    /// Extra CLI flags
    pub flags: Vec<String>,
}

impl DecodeOptions {
    /// Split a flag string such as `" -l 3.0 -F"` into separate arguments
    pub fn parse_flags(flags: &str) -> Vec<String> {
        flags.split_whitespace().map(str::to_string).collect()
    }

    fn apply(&self, mut command: CliCommand) -> CliCommand {
        if !self.looping {
            command = command.arg("-i");
        }
        for flag in &self.flags {
            command = command.arg(flag);
        }
        command
    }
}

/// `cli -o <out_wav> [-i] [flags] <input>`
pub fn decode_command(cli: &Path, out_wav: &Path, input: &Path, options: &DecodeOptions) -> CliCommand {
    let command = CliCommand::new(cli).arg("-o").arg(out_wav);
    options.apply(command).arg(input)
}

/// `cli -O [-i] [flags] <inputs...>`, decoding without writing output
pub fn performance_command(cli: &Path, inputs: &[PathBuf], options: &DecodeOptions) -> CliCommand {
    let mut command = options.apply(CliCommand::new(cli).arg("-O"));
    for input in inputs {
        command = command.arg(input);
    }
    command
}

/// Runs decoder processes
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run a single command and wait for it, discarding its output
    pub fn run(command: &CliCommand) -> CallStatus {
        match command.command(false).status() {
            Ok(status) if status.success() => CallStatus::Ok,
            Ok(status) => {
                debug!("{} exited with {}", command.program.display(), status);
                CallStatus::Failed
            }
            Err(e) => {
                log_spawn_error(command, &e);
                CallStatus::NotFound
            }
        }
    }

    /// Start every command, then wait for all of them
    ///
    /// With `capture_first` the stdout of the first command is returned.
    pub fn run_parallel(commands: &[CliCommand], capture_first: bool) -> Vec<CallOutput> {
        let children: Vec<Option<Child>> = commands
            .iter()
            .enumerate()
            .map(|(index, command)| {
                let capture = capture_first && index == 0;
                match command.command(capture).spawn() {
                    Ok(child) => Some(child),
                    Err(e) => {
                        log_spawn_error(command, &e);
                        None
                    }
                }
            })
            .collect();

        children
            .into_iter()
            .map(|child| match child {
                Some(child) => wait_child(child),
                None => CallOutput {
                    status: CallStatus::NotFound,
                    stdout: None,
                },
            })
            .collect()
    }

    /// Locate a decoder CLI
    ///
    /// A directory argument is joined with `default_name`, a file argument is
    /// used as is, and no argument means `default_name` from PATH. The result
    /// is probed with a plain call: anything that starts counts as found.
    pub fn find_cli(arg: Option<&Path>, default_name: &str) -> Option<PathBuf> {
        let cli = match arg {
            Some(path) if path.is_dir() => path.join(default_name),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(default_name),
        };

        match Self::run(&CliCommand::new(&cli)) {
            CallStatus::NotFound => None,
            _ => Some(cli),
        }
    }
}

fn wait_child(child: Child) -> CallOutput {
    match child.wait_with_output() {
        Ok(output) => {
            let status = if output.status.success() {
                CallStatus::Ok
            } else {
                CallStatus::Failed
            };
            // uncaptured children always report an empty buffer
            let stdout = Some(output.stdout).filter(|stdout| !stdout.is_empty());
            CallOutput { status, stdout }
        }
        Err(e) => {
            warn!("Failed waiting for decoder: {}", e);
            CallOutput {
                status: CallStatus::Failed,
                stdout: None,
            }
        }
    }
}

fn log_spawn_error(command: &CliCommand, e: &std::io::Error) {
    if e.kind() == ErrorKind::NotFound {
        debug!("{} not found", command.program.display());
    } else {
        warn!("Failed to start {}: {}", command.program.display(), e);
    }
}
