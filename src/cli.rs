// src/cli.rs
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

pub const KUBESAIL_WWW_HOST: &str = "https://kubesail.com";

#[derive(Parser, Debug)]
#[command(author, version, about = "Connect kubectl to your KubeSail namespace", long_about = None)]
pub struct Args {
    /// Kubeconfig to update (defaults to ~/.kube/config)
    #[arg(short, long)]
    pub kubeconfig: Option<String>,

    /// Registration site
    #[arg(long, default_value = KUBESAIL_WWW_HOST)]
    pub host: String,

    /// Address the callback listener binds to
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Callback port, 0 picks a free one
    #[arg(short, long, default_value_t = 0)]
    pub port: u16,

    /// Print the registration URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    pub fn kubeconfig_path(&self) -> PathBuf {
        match &self.kubeconfig {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => default_kubeconfig_path(),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

pub fn default_kubeconfig_path() -> PathBuf {
    kubeconfig_path_under(dirs::home_dir())
}

fn kubeconfig_path_under(home: Option<PathBuf>) -> PathBuf {
    home.unwrap_or_else(|| {
        warn!("No home directory found, using ./.kube/config");
        PathBuf::from(".")
    })
    .join(".kube")
    .join("config")
}

/// Page the operator signs in on; it redirects back to our listener on `port`.
pub fn build_registration_url(host: &str, port: u16) -> Result<Url> {
    let mut url = Url::parse(host).map_err(|source| Error::InvalidHost {
        host: host.to_string(),
        source,
    })?;
    url.set_path("/register");
    url.query_pairs_mut()
        .clear()
        .append_pair("listenPort", &port.to_string());
    Ok(url)
}
