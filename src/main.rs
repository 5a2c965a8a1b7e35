use anyhow::Result;
use clap::Parser;

use lookthrough::{cli, logging};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    logging::init(args.verbose)?;

    match cli::run(args) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("Application error: {}", e);

            // Log error chain if available
            let mut source = e.source();
            while let Some(err) = source {
                tracing::error!("   Caused by: {}", err);
                source = err.source();
            }

            Err(e)
        }
    }
}
