//! Command-line arguments.

use std::path::PathBuf;

use anyhow::{Context, bail};

pub const USAGE: &str = "\
usage: dropchunk-upload <local-file> <remote-path> [options]

options:
  --no-overwrite       fail instead of replacing an existing file
  --parent-rev REV     only replace the file if its revision is REV
  --chunk-size BYTES   bytes per request (overrides config)
  --max-retries N      retries per failed chunk (overrides config)
  -h, --help           print this help
  -V, --version        print the version";

/// What the binary was asked to do.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Upload(Args),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub local_file: PathBuf,
    pub remote_path: String,
    pub overwrite: bool,
    pub parent_rev: Option<String>,
    pub chunk_size: Option<usize>,
    pub max_retries: Option<u32>,
}

impl Args {
    pub fn parse<I>(args: I) -> anyhow::Result<Command>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional = Vec::new();
        let mut overwrite = true;
        let mut parent_rev = None;
        let mut chunk_size = None;
        let mut max_retries = None;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(Command::Help),
                "-V" | "--version" => return Ok(Command::Version),
                "--no-overwrite" => overwrite = false,
                "--parent-rev" => parent_rev = Some(value(&mut iter, "--parent-rev")?),
                "--chunk-size" => {
                    let raw = value(&mut iter, "--chunk-size")?;
                    let size: usize = raw
                        .parse()
                        .with_context(|| format!("invalid --chunk-size: {raw}"))?;
                    if size == 0 {
                        bail!("--chunk-size must be greater than zero");
                    }
                    chunk_size = Some(size);
                }
                "--max-retries" => {
                    let raw = value(&mut iter, "--max-retries")?;
                    max_retries = Some(
                        raw.parse()
                            .with_context(|| format!("invalid --max-retries: {raw}"))?,
                    );
                }
                flag if flag.starts_with("--") => bail!("unknown option: {flag}\n\n{USAGE}"),
                _ => positional.push(arg),
            }
        }

        let [local_file, remote_path]: [String; 2] = positional
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected <local-file> <remote-path>\n\n{USAGE}"))?;

        Ok(Command::Upload(Args {
            local_file: PathBuf::from(local_file),
            remote_path,
            overwrite,
            parent_rev,
            chunk_size,
            max_retries,
        }))
    }
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    iter.next()
        .with_context(|| format!("{flag} requires a value"))
}
