// SPDX-License-Identifier: GPL-2.0 OR MIT

//! Command line front end of the ZFS label repair tool.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use std::env::VarError;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info_span;
use tracing_subscriber::EnvFilter;

use rzhack::repair::{repair_device, verify_device};
use rzhack::userspace::BlockDevice;

////////////////////////////////////////////////////////////////////////////////

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human readable lines.
    Human,

    /// One JSON object per line.
    Json,
}

impl LogFormat {
    const ENV_KEY: &'static str = "RZHACK_LOG_FORMAT";

    fn parse(raw: &str) -> Result<LogFormat> {
        <LogFormat as ValueEnum>::from_str(raw.trim(), true).map_err(|_| {
            anyhow::anyhow!(
                "invalid {key}={raw:?}; expected one of: human, json",
                key = LogFormat::ENV_KEY
            )
        })
    }

    fn from_env() -> Result<Option<LogFormat>> {
        match std::env::var(LogFormat::ENV_KEY) {
            Ok(value) => Ok(Some(LogFormat::parse(&value)?)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => {
                bail!("{key} contains non-UTF-8 bytes", key = LogFormat::ENV_KEY)
            }
        }
    }
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/** Installs the global subscriber, writing to stderr.
 *
 * Precedence: `--log-format` > `RZHACK_LOG_FORMAT` > `human`.
 *
 * # Errors
 *
 * Returns an error if the environment variable is invalid, or a subscriber
 * is already installed.
 */
pub fn init_logging(log_format_override: Option<LogFormat>) -> Result<LogFormat> {
    let format = match log_format_override {
        Some(v) => v,
        None => LogFormat::from_env()?.unwrap_or(LogFormat::Human),
    };

    match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(default_env_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to initialize human logger: {err}"))?,
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_env_filter(default_env_filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to initialize JSON logger: {err}"))?,
    }

    Ok(format)
}

////////////////////////////////////////////////////////////////////////////////

/// ZFS debugging hacks.
#[derive(Debug, Parser)]
#[command(name = "rzhack", about = "Rust ZFS label repair tool")]
pub struct Cli {
    /// Log output format (`human` or `json`).
    ///
    /// Precedence: `--log-format` > `RZHACK_LOG_FORMAT` > `human`.
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Command.
    #[command(subcommand)]
    pub command: Command,
}

/// Top level command.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Label operations.
    #[command(subcommand)]
    Label(LabelCommand),
}

/// Label operation.
#[derive(Debug, Subcommand)]
pub enum LabelCommand {
    /// Repair corrupted label checksums.
    Repair {
        /// Device or file.
        device: PathBuf,
    },

    /// Verify label checksums, without writing.
    Verify {
        /// Device or file.
        device: PathBuf,
    },
}

impl LabelCommand {
    fn name(&self) -> &'static str {
        match self {
            LabelCommand::Repair { .. } => "label repair",
            LabelCommand::Verify { .. } => "label verify",
        }
    }

    fn device(&self) -> &Path {
        match self {
            LabelCommand::Repair { device } | LabelCommand::Verify { device } => device,
        }
    }
}

/** Runs a command, writing one status line per label to `out`.
 *
 * Every event logged while running carries the device path.
 *
 * Returns the process exit code.
 *
 * # Errors
 *
 * Returns an error if the device cannot be opened, or its size cannot be
 * determined.
 */
pub fn run(command: &Command, out: &mut dyn Write) -> Result<i32> {
    let Command::Label(label) = command;

    let span = info_span!(
        "command",
        command = label.name(),
        device = %label.device().display()
    );
    let _guard = span.enter();

    match label {
        LabelCommand::Repair { device } => {
            let mut block_device = BlockDevice::open(device)?;
            let report = repair_device(&mut block_device)
                .with_context(|| format!("cannot repair '{}'", device.display()))?;

            for line in report.lines() {
                writeln!(out, "{line}")?;
            }

            Ok(report.exit_code())
        }
        LabelCommand::Verify { device } => {
            let mut block_device = BlockDevice::open_read_only(device)?;
            let report = verify_device(&mut block_device)
                .with_context(|| format!("cannot verify '{}'", device.display()))?;

            for line in report.lines() {
                writeln!(out, "{line}")?;
            }

            Ok(report.exit_code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use clap::Parser;
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::EnvFilter;

    use crate::{run, Cli, Command, LabelCommand, LogFormat};

    #[derive(Clone, Default)]
    struct SharedLogBuffer {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl SharedLogBuffer {
        fn as_string(&self) -> String {
            let bytes = self.bytes.lock().expect("log buffer lock poisoned");
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl Write for SharedLogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes
                .lock()
                .expect("log buffer lock poisoned")
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'writer> MakeWriter<'writer> for SharedLogBuffer {
        type Writer = SharedLogBuffer;

        fn make_writer(&'writer self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn parse_label_repair() {
        let cli = Cli::try_parse_from([
            "rzhack",
            "--log-format",
            "json",
            "label",
            "repair",
            "/dev/sda",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(matches!(
            cli.command,
            Command::Label(LabelCommand::Repair { ref device })
                if device.to_str() == Some("/dev/sda")
        ));

        let cli = Cli::try_parse_from(["rzhack", "label", "verify", "disk.img"]).unwrap();
        assert_eq!(cli.log_format, None);
        assert!(matches!(
            cli.command,
            Command::Label(LabelCommand::Verify { .. })
        ));
    }

    #[test]
    fn parse_errors() {
        assert!(Cli::try_parse_from(["rzhack", "label", "repair"]).is_err());
        assert!(Cli::try_parse_from(["rzhack", "label"]).is_err());
        assert!(
            Cli::try_parse_from(["rzhack", "--log-format", "xml", "label", "repair", "x"]).is_err()
        );
    }

    #[test]
    fn log_format_parse() {
        assert_eq!(LogFormat::parse(" JSON ").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("human").unwrap(), LogFormat::Human);
        assert!(LogFormat::parse("xml").is_err());
    }

    /// A zero filled file has nothing to repair, and every label is reported.
    #[test]
    fn repair_zero_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&vec![0; 4 * 262144 + 100])?;
        file.flush()?;

        let command = Command::Label(LabelCommand::Repair {
            device: file.path().to_path_buf(),
        });

        let mut out = Vec::new();
        assert_eq!(run(&command, &mut out)?, 1);
        assert_eq!(
            String::from_utf8(out)?,
            "label 0: uberblock: skipped checksum: skipped\n\
             label 1: uberblock: skipped checksum: skipped\n\
             label 2: uberblock: skipped checksum: skipped\n\
             label 3: uberblock: skipped checksum: skipped\n"
        );

        let command = Command::Label(LabelCommand::Verify {
            device: file.path().to_path_buf(),
        });

        let mut out = Vec::new();
        assert_eq!(run(&command, &mut out)?, 1);
        assert!(String::from_utf8(out)?.starts_with("label 0: uberblock: bad checksum: bad\n"));

        Ok(())
    }

    /// Per label errors name the device they happened on.
    #[test]
    fn errors_carry_device_path() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&vec![0; 4 * 262144])?;
        file.flush()?;

        let command = Command::Label(LabelCommand::Repair {
            device: file.path().to_path_buf(),
        });

        let buffer = SharedLogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_env_filter(EnvFilter::new("info"))
            .with_writer(buffer.clone())
            .finish();

        let mut out = Vec::new();
        let code = tracing::subscriber::with_default(subscriber, || run(&command, &mut out))?;
        assert_eq!(code, 1);

        let logs = buffer.as_string();
        let device = format!("device={}", file.path().display());
        let errors: Vec<&str> = logs.lines().filter(|line| line.contains("ERROR")).collect();
        assert_eq!(errors.len(), 4, "{logs}");
        for line in errors {
            assert!(line.contains(&device), "{line}");
            assert!(line.contains("cannot unpack nvlist"), "{line}");
        }

        Ok(())
    }

    #[test]
    fn missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let command = Command::Label(LabelCommand::Repair {
            device: dir.path().join("missing"),
        });

        let mut out = Vec::new();
        assert!(run(&command, &mut out).is_err());
        assert!(out.is_empty());
    }
}
