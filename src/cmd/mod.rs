use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod probe;
pub use probe::*;
mod notify;
pub use notify::*;

use crate::{
    conf::{self, Conf, ConfigService, ConfigSource, DriftDetector},
    daemon::{InPlace, Lifecycle, ReExec, Restarter},
    get_env_or_default, logging, version_info,
};

#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// Dry notification mode
    #[arg(short = 'd', long, default_value_t = get_env_or_default("PROBE_DRY", "false")=="true")]
    dry_notify: bool,

    /// Configuration file, directory or URL
    #[arg(short = 'f', long, default_value_t = get_env_or_default("PROBE_CONFIG", "config.yaml"))]
    yaml_file: String,

    /// Show the version information
    #[arg(short = 'v', long, default_value_t = false)]
    version: bool,

    /// Show JSON schema
    #[arg(short = 'j', long, default_value_t = false)]
    json_schema: bool,

    /// Reload a modified configuration inside this process instead of
    /// starting a new one
    #[arg(short = 'i', long, default_value_t = get_env_or_default("PROBE_RELOAD_IN_PLACE", "false")=="true")]
    reload_in_place: bool,
}

pub async fn start() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{}", version_info());
        return Ok(());
    }

    if args.json_schema {
        println!("{}", conf::json_schema()?);
        return Ok(());
    }

    let logs = logging::Logs::new();
    logging::init(&logs);
    log::info!("{}", version_info());

    let source = ConfigSource::new(&args.yaml_file);
    let c = match Conf::load(&source).await {
        Ok(c) => c,
        Err(err) => {
            log::error!("Fatal: Cannot load the configuration: {:#}", err);
            return Err(err);
        }
    };

    let restarter: Box<dyn Restarter> = if args.reload_in_place {
        Box::new(InPlace)
    } else {
        Box::new(ReExec::new())
    };

    let lifecycle = Lifecycle::new(
        Arc::new(ConfigService::new(c)),
        Arc::new(DriftDetector::new(source)),
        restarter,
        logs,
        args.dry_notify,
    );
    if let Err(err) = lifecycle.run().await {
        log::error!("Fatal: {:#}", err);
        return Err(err);
    }
    Ok(())
}
