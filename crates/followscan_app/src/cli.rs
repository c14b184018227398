use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use scan_logging::LogDestination;

use crate::config::DEFAULT_CONFIG_FILENAME;

const USAGE: &str = "\
usage: followscan_app <SNAPSHOT_DIR> [options]

Replays the *.html frames in SNAPSHOT_DIR as a list page and scans it.

options:
  -l, --location <URL>   page location to report (default https://x.com/me/following)
  -c, --config <PATH>    RON config file (default ./followscan.ron)
      --state <PATH>     state file, overrides the config
      --upload           upload the result when the scan completes
      --reset            clear the stored state before starting
      --status           print the stored state and exit
      --log <DEST>       file, terminal or both (default file)
  -h, --help             show this help";

pub const DEFAULT_LOCATION: &str = "https://x.com/me/following";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub snapshot_dir: Option<PathBuf>,
    pub location: String,
    pub config_path: PathBuf,
    pub state_path: Option<PathBuf>,
    pub upload: bool,
    pub reset: bool,
    pub status_only: bool,
    pub log: LogDestination,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            location: DEFAULT_LOCATION.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILENAME),
            state_path: None,
            upload: false,
            reset: false,
            status_only: false,
            log: LogDestination::File,
        }
    }
}

pub enum Command {
    Run(Args),
    Help,
}

pub fn usage() -> &'static str {
    USAGE
}

pub fn parse<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-l" | "--location" => parsed.location = value(&mut args, &arg)?,
            "-c" | "--config" => parsed.config_path = PathBuf::from(value(&mut args, &arg)?),
            "--state" => parsed.state_path = Some(PathBuf::from(value(&mut args, &arg)?)),
            "--upload" => parsed.upload = true,
            "--reset" => parsed.reset = true,
            "--status" => parsed.status_only = true,
            "--log" => {
                parsed.log = match value(&mut args, &arg)?.to_ascii_lowercase().as_str() {
                    "file" => LogDestination::File,
                    "terminal" => LogDestination::Terminal,
                    "both" => LogDestination::Both,
                    other => bail!("unknown log destination: {other}"),
                }
            }
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with('-') => bail!("unknown option: {flag}"),
            _ if parsed.snapshot_dir.is_none() => {
                parsed.snapshot_dir = Some(PathBuf::from(&arg));
            }
            _ => bail!("unexpected argument: {arg}"),
        }
    }

    if parsed.snapshot_dir.is_none() && !parsed.status_only {
        bail!("missing SNAPSHOT_DIR");
    }
    Ok(Command::Run(parsed))
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_strs(args: &[&str]) -> Result<Command> {
        parse(args.iter().map(|s| s.to_string()))
    }

    fn run_args(args: &[&str]) -> Args {
        match parse_strs(args).expect("valid args") {
            Command::Run(args) => args,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn snapshot_dir_and_flags() {
        let args = run_args(&[
            "frames",
            "--location",
            "https://twitter.com/bob/followers",
            "--upload",
            "--log",
            "both",
        ]);

        assert_eq!(args.snapshot_dir, Some(PathBuf::from("frames")));
        assert_eq!(args.location, "https://twitter.com/bob/followers");
        assert!(args.upload);
        assert_eq!(args.log, LogDestination::Both);
        assert_eq!(args.config_path, PathBuf::from(DEFAULT_CONFIG_FILENAME));
    }

    #[test]
    fn status_needs_no_snapshot() {
        let args = run_args(&["--status", "--state", "/tmp/s.ron"]);

        assert!(args.status_only);
        assert_eq!(args.snapshot_dir, None);
        assert_eq!(args.state_path, Some(PathBuf::from("/tmp/s.ron")));
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(parse_strs(&[]).is_err());
        assert!(parse_strs(&["frames", "--bogus"]).is_err());
        assert!(parse_strs(&["frames", "--location"]).is_err());
        assert!(parse_strs(&["frames", "more"]).is_err());
        assert!(matches!(parse_strs(&["-h"]), Ok(Command::Help)));
    }
}
