//! dropchunk-upload entry point.

mod app;
mod args;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match args::Args::parse(std::env::args().skip(1))? {
        args::Command::Upload(args) => args,
        args::Command::Help => {
            println!("{}", args::USAGE);
            return Ok(());
        }
        args::Command::Version => {
            println!("dropchunk-upload {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config = config::Config::load()?;
    tracing::debug!(sandbox = config.sandbox, chunk_size = config.chunk_size, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let meta = rt.block_on(app::run(config, args))?;

    println!("{} ({} bytes, rev {})", meta.path, meta.bytes, meta.rev);
    Ok(())
}
