// src/main.rs
mod cli;
mod error;
mod kubeconfig;
mod payload;
mod utils;
mod web;

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use cli::Args;
use error::{Error, Result};
use kubeconfig::{ConfigStore, KUBESAIL_PREFIX};
use web::CallbackListener;

async fn run(args: Args) -> Result<String> {
    let store = ConfigStore::new(args.kubeconfig_path());

    // Both checks happen before anything is listening, so a broken setup
    // never sends the operator to the browser.
    let config = store.load()?;
    store.ensure_parent_directory()?;

    let existing = config.contexts_with_prefix(KUBESAIL_PREFIX);
    if !existing.is_empty() {
        info!("You already have a KubeSail context. Attempting to update.");
        debug!(contexts = ?existing, "existing KubeSail contexts");
    }

    let listener = CallbackListener::bind(&args.listen_addr(), store, config).await?;
    let url = cli::build_registration_url(&args.host, listener.local_addr().port())?;

    if args.no_browser {
        info!("Open {} in your browser to finish registration", url);
    } else if let Err(e) = open::that(url.as_str()) {
        warn!("Could not open a browser ({}), visit {} manually", e, url);
    }

    tokio::select! {
        result = listener.run() => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    utils::logging::init(args.debug);

    match run(args).await {
        Ok(context) => {
            info!("Done. Context {} is ready to use with kubectl", context);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}
