#![cfg_attr(docsrs, feature(doc_cfg))]
// Enable as many useful Rust warnings as we can stand.
#![warn(
    missing_copy_implementations,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    trivial_casts,
    unused_qualifications
)]

use crate::cfg::load_config;
use crate::utils::{
    get_config_file_path, get_default_config_dir, get_default_log_dir, parse_key_value,
};
use anyhow::anyhow;
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use vortex::{new_dispatcher, Endpoints, Notification, ProviderType};

mod cfg;
mod logging;
mod utils;

pub const APP_IDENTIFIER: &str = "dev.vortex.vortex-cli";

const LOG_DIR_DESC: &str = "Directory where the log files will be written";
const CONFIG_DIR_DESC: &str = "Directory where the config file is read from";
const CREATE_CONFIG_DESC: &str = "Create a template config file if none exists";
const PROVIDER_DESC: &str = "Provider to send through: gcm, fcm, mpns or email";
const ENDPOINT_DESC: &str = "Device token, channel URI or e-mail address (repeatable)";
const DATA_DESC: &str = "Custom data as key=value (repeatable)";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    #[arg(short='c', long, value_hint = clap::ValueHint::DirPath, help= CONFIG_DIR_DESC)]
    config_dir: Option<PathBuf>,
    #[arg(short='l', long, value_hint = clap::ValueHint::DirPath, help = LOG_DIR_DESC)]
    log_dir: Option<PathBuf>,
    #[arg(long, help=CREATE_CONFIG_DESC)]
    create_config: bool,
    #[arg(short = 'p', long, help = PROVIDER_DESC)]
    provider: ProviderType,
    #[arg(short = 'e', long = "endpoint", required = true, help = ENDPOINT_DESC)]
    endpoints: Vec<String>,
    #[arg(short = 't', long)]
    title: Option<String>,
    #[arg(short = 'b', long, default_value = "")]
    body: String,
    #[arg(short = 'd', long = "data", value_parser = parse_key_value, help = DATA_DESC)]
    data: Vec<(String, String)>,
}

fn main() -> Result<(), anyhow::Error> {
    let options = Options::parse();
    let config_dir = if let Some(cfg_dir) = options.config_dir {
        if !cfg_dir.is_dir() {
            return Err(anyhow!("Supplied config directory is not a directory"));
        }
        cfg_dir.clone()
    } else {
        get_default_config_dir()?
    };

    let log_dir = if let Some(log_dir) = options.log_dir {
        if !log_dir.is_dir() {
            return Err(anyhow!("Supplied log directory is not a directory"));
        }
        log_dir.clone()
    } else {
        get_default_log_dir()?
    };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config dir '{config_dir:?}': {e}"))?;
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow!("Failed to create log dir '{log_dir:?}': {e}"))?;

    let config = load_config(&config_dir, options.create_config)?;
    logging::init_log(&log_dir, config.log_level()?)?;

    debug!("-------------------------------------------------------------------------------------");
    info!("Starting Vortex CLI");
    debug!("Config file = {:?}", get_config_file_path(&config_dir));
    debug!("Providers = {:?}", config.providers);

    let dispatcher = new_dispatcher(options.provider, &config.providers).map_err(|e| {
        error!("{e}");
        e
    })?;

    let mut notification = Notification::new(options.body);
    if let Some(title) = options.title {
        notification = notification.with_title(title);
    }
    for (key, value) in options.data {
        notification = notification.with_data(key, value);
    }

    let endpoints = Endpoints::from(options.endpoints);
    info!(
        "Dispatching through {} to {} endpoint(s)",
        dispatcher.provider(),
        endpoints.len()
    );

    let mut failures = 0;
    for response in dispatcher.dispatch(&endpoints, &notification) {
        for (endpoint, status) in response.statuses() {
            if !status.is_success() {
                failures += 1;
            }
            if let Some(id) = response.canonical_id(endpoint) {
                warn!("{endpoint} should be replaced by canonical id {id}");
            }
            println!("{endpoint}: {status}");
        }
    }

    if failures > 0 {
        return Err(anyhow!("{failures} endpoint(s) were not delivered"));
    }
    Ok(())
}
