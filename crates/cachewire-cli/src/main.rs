use clap::Parser;

mod args;
mod logging;
mod serve;

use args::{Cli, Command};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            2
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Serve(args) => {
            let config = serve::resolve_config(&args.config)?;
            logging::init(config.log_format);
            let stats = serve::serve(&config).await?;
            tracing::debug!(?stats, "serve finished");
            Ok(())
        }
        Command::CheckConfig(args) => {
            let config = serve::resolve_config(&args)?;
            let origin = config.origin()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            eprintln!("origin: {}", origin);
            Ok(())
        }
    }
}
