//! Binary entry point for the volsnap CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use serde::Serialize;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use volsnap::{
    BlockDevice, CommandRunner, ConfigError, ContainerRecord, FilesystemUsage, HostParseError,
    NfsExport, OrchestratorError, Privilege, ProcessCommandRunner, RemoteCommandOutput,
    RemoteExecutor, RemoteHost, SnapshotOrchestrator, SshOptions, TeardownReport,
    UnmountOptions, VolsnapConfig,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid --ssh descriptor: {0}")]
    Host(#[from] HostParseError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Operation(#[from] OrchestratorError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("failed to write output: {0}")]
    Output(String),
}

/// What a handler produced, before it is written out.
#[derive(Debug)]
enum Outcome {
    Text(String),
    Flag(bool),
    Record(Record),
    Nothing,
    Relay(RemoteCommandOutput),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Record {
    Block(BlockDevice),
    Usage(FilesystemUsage),
    Container(ContainerRecord),
    Export(NfsExport),
    Teardown(TeardownReport),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let config = VolsnapConfig::load_without_cli_args()?.with_image(cli.image);
    config.validate()?;
    let host = RemoteHost::parse(&cli.ssh, &config.ssh_user)?;
    let remote = RemoteExecutor::new(host, SshOptions::from(&config), ProcessCommandRunner);
    let volsnap = SnapshotOrchestrator::new(remote, config)?;

    let outcome = dispatch(&volsnap, cli.command)?;
    emit(outcome, &mut io::stdout(), &mut io::stderr())
}

fn dispatch<R: CommandRunner>(
    volsnap: &SnapshotOrchestrator<R>,
    command: Command,
) -> Result<Outcome, CliError> {
    if let Command::Ssh(args) = &command {
        validate_command_args(&args.command)?;
    }
    execute(volsnap, command).map_err(CliError::from)
}

fn execute<R: CommandRunner>(
    volsnap: &SnapshotOrchestrator<R>,
    command: Command,
) -> Result<Outcome, OrchestratorError> {
    let outcome = match command {
        Command::Up(args) => Outcome::Text(volsnap.up(
            Utf8Path::new(&args.device),
            &args.name,
            &args.size,
        )?),
        Command::Down(args) => {
            volsnap.down(Utf8Path::new(&args.device), &args.name)?;
            Outcome::Nothing
        }
        Command::Create(args) => Outcome::Text(
            volsnap
                .snapshots()
                .create(Utf8Path::new(&args.device), &args.name, &args.size)?
                .into_string(),
        ),
        Command::Remove(args) => Outcome::Text(
            volsnap
                .snapshots()
                .remove(Utf8Path::new(&args.device))?
                .into_string(),
        ),
        Command::Attributes(args) => {
            Outcome::Text(volsnap.inspector().attributes(Utf8Path::new(&args.device))?)
        }
        Command::Lsblk(args) => Outcome::Record(Record::Block(
            volsnap.inspector().block_info(Utf8Path::new(&args.device))?,
        )),
        Command::Df(args) => Outcome::Record(Record::Usage(
            volsnap.inspector().usage(Utf8Path::new(&args.path))?,
        )),
        Command::Exists(args) => {
            Outcome::Flag(volsnap.inspector().path_exists(Utf8Path::new(&args.path))?)
        }
        Command::IsMountpoint(args) => {
            Outcome::Flag(volsnap.inspector().is_mountpoint(Utf8Path::new(&args.path))?)
        }
        Command::Mkdir(args) => Outcome::Text(
            volsnap
                .mounts()
                .mkdir(Utf8Path::new(&args.path))?
                .into_string(),
        ),
        Command::Mount(args) => Outcome::Text(
            volsnap
                .mounts()
                .mount(Utf8Path::new(&args.device), Utf8Path::new(&args.path))?
                .into_string(),
        ),
        Command::Umount(args) => {
            let options = UnmountOptions {
                force: args.force,
                lazy: args.lazy,
            };
            Outcome::Text(
                volsnap
                    .mounts()
                    .umount(Utf8Path::new(&args.path), options)?
                    .into_string(),
            )
        }
        Command::Inspect(args) => volsnap
            .exporter()
            .inspect(&args.container)?
            .map_or(Outcome::Nothing, |record| {
                Outcome::Record(Record::Container(record))
            }),
        Command::ContainerName(args) => {
            Outcome::Text(volsnap.exporter().container_name(Utf8Path::new(&args.path)))
        }
        Command::Run(args) => Outcome::Text(
            volsnap
                .exporter()
                .run(&args.name, Utf8Path::new(&args.volume_path))?,
        ),
        Command::Stop(args) => {
            Outcome::Record(Record::Teardown(volsnap.exporter().stop(&args.container)?))
        }
        Command::NfsCredentials(args) => Outcome::Record(Record::Export(
            volsnap.exporter().export_credentials(&args.container)?,
        )),
        Command::NfsMountCommand(args) => {
            Outcome::Text(volsnap.exporter().export_mount_command(&args.container)?)
        }
        Command::Transfer(args) => Outcome::Relay(volsnap.remote().transfer(
            Utf8Path::new(&args.local),
            Utf8Path::new(&args.remote),
            args.mkdir,
        )?),
        Command::Ssh(args) => Outcome::Relay(
            volsnap
                .remote()
                .execute(&render_remote_command(&args.command), Privilege::Standard)?,
        ),
    };
    Ok(outcome)
}

fn emit(outcome: Outcome, stdout: &mut impl Write, stderr: &mut impl Write) -> Result<i32, CliError> {
    let output_error = |err: io::Error| CliError::Output(err.to_string());
    match outcome {
        Outcome::Text(text) => writeln!(stdout, "{text}").map_err(output_error)?,
        Outcome::Flag(flag) => writeln!(stdout, "{flag}").map_err(output_error)?,
        Outcome::Record(record) => {
            let rendered = serde_json::to_string_pretty(&record)
                .map_err(|err| CliError::Output(err.to_string()))?;
            writeln!(stdout, "{rendered}").map_err(output_error)?;
        }
        Outcome::Nothing => {}
        Outcome::Relay(output) => {
            stdout
                .write_all(output.stdout.as_bytes())
                .map_err(output_error)?;
            if !output.is_success() {
                stderr
                    .write_all(output.stderr.as_bytes())
                    .map_err(output_error)?;
                return Ok(output.exit_code.unwrap_or(1));
            }
        }
    }
    Ok(0)
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
