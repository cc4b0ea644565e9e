//! Command-line interface for dashgate
//!
//! `serve` runs the gateway. `check` loads and validates the configuration
//! and tenant table, then prints every mount without binding a socket.

use crate::Result;
use crate::auth::AuthContext;
use crate::config::{Config, load_dashboards};
use clap::{Arg, ArgMatches, Command};

/// Build the CLI definition
pub fn build_cli() -> Command {
    Command::new("dashgate")
        .about("Authenticating reverse proxy for static dashboards")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Start the gateway")
                .arg(
                    Arg::new("listen")
                        .long("listen")
                        .value_name("ADDR")
                        .help("Address to bind, overrides DASHGATE_LISTEN"),
                )
                .arg(
                    Arg::new("config-file")
                        .long("config-file")
                        .value_name("PATH")
                        .help("Tenant table, overrides DASHGATE_CONFIG_FILE"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate configuration and print dashboard mounts")
                .arg(
                    Arg::new("config-file")
                        .long("config-file")
                        .value_name("PATH")
                        .help("Tenant table, overrides DASHGATE_CONFIG_FILE"),
                ),
        )
}

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = Config::from_env()?;

    match matches.subcommand() {
        Some(("serve", sub_matches)) => {
            let config = apply_overrides(config, sub_matches);
            crate::telemetry::init_logging(&config.log_level, config.log_json);
            crate::http::start_server(config).await
        }
        Some(("check", sub_matches)) => {
            let config = apply_overrides(config, sub_matches);
            check(&config)
        }
        _ => Ok(()),
    }
}

/// Apply command-line flags on top of the environment configuration
pub fn apply_overrides(mut config: Config, matches: &ArgMatches) -> Config {
    if let Ok(Some(listen)) = matches.try_get_one::<String>("listen") {
        config.listen = listen.clone();
    }
    if let Ok(Some(path)) = matches.try_get_one::<String>("config-file") {
        config.config_file = path.clone();
    }
    config
}

fn check(config: &Config) -> Result<()> {
    let dashboards = load_dashboards(&config.config_file, config)?;
    if config.oauth.enabled {
        let ctx = AuthContext::from_config(config)?;
        println!("oauth: {} provider, cookie domain {}", ctx.provider.name(), ctx.cookie.domain);
    } else {
        println!("oauth: disabled");
    }

    for dash in &dashboards {
        println!(
            "{}\t{}\tbucket={}\tpublic={}\tspa={}",
            dash.slug,
            dash.canonical_url(&config.base_domain),
            dash.bucket,
            dash.public,
            dash.single_page_app
        );
    }
    println!("{} dashboards OK", dashboards.len());
    Ok(())
}
