//! Resolve encoder options offline and print the resulting parameters.
//!
//! Usage: nvenc-config [OPTIONS] <key=value>...
//!
//! Options:
//!   --reconfigure <key=value,...>   Apply a reconfiguration on top of the resolved session
//!   --compact                       Print JSON on one line
//!
//! Examples:
//!   nvenc-config codec=hevc s=1920x1080 tuning_info=low_latency bitrate=4M
//!   nvenc-config codec=av1 gop=30 bf=3 --reconfigure bitrate=2M,fps=60

use anyhow::{Context, Result};
use nvvc::codec::config::{ConfigResolver, EncoderOptions, OfflineCapabilities};
use std::env;

struct Args {
    options: EncoderOptions,
    reconfigure: Option<EncoderOptions>,
    compact: bool,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();

    let mut pairs = Vec::new();
    let mut reconfigure = None;
    let mut compact = false;
    let mut i = 1;

    while i < args.len() {
        let arg = &args[i];

        if arg == "--reconfigure" {
            if i + 1 < args.len() {
                reconfigure = Some(args[i + 1].replace(',', " "));
                i += 2;
                continue;
            } else {
                eprintln!("Error: --reconfigure requires a key=value list");
                return None;
            }
        }

        if arg == "--compact" {
            compact = true;
            i += 1;
            continue;
        }

        if arg == "--help" || arg == "-h" {
            return None;
        }

        pairs.push(arg.clone());
        i += 1;
    }

    let options = match EncoderOptions::parse_pairs(&pairs.join(" ")) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return None;
        }
    };
    let reconfigure = match reconfigure.map(|r| EncoderOptions::parse_pairs(&r)).transpose() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return None;
        }
    };

    Some(Args {
        options,
        reconfigure,
        compact,
    })
}

fn print_usage() {
    eprintln!("Usage: nvenc-config [OPTIONS] <key=value>...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --reconfigure <key=value,...>   Apply a reconfiguration on top of the resolved session");
    eprintln!("  --compact                       Print JSON on one line");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  nvenc-config codec=hevc s=1920x1080 tuning_info=low_latency bitrate=4M");
    eprintln!("  nvenc-config codec=av1 gop=30 bf=3 --reconfigure bitrate=2M,fps=60");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nvvc_codec=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Some(args) => args,
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    let caps = OfflineCapabilities;
    let mut params = ConfigResolver::new(&args.options)
        .resolve(&caps)
        .context("failed to resolve encoder options")?;

    if let Some(reconfigure) = &args.reconfigure {
        params = ConfigResolver::new(reconfigure)
            .reconfigure(&params, &caps)
            .context("failed to resolve reconfiguration")?;
    }

    let json = if args.compact {
        serde_json::to_string(&params)?
    } else {
        serde_json::to_string_pretty(&params)?
    };
    println!("{}", json);

    Ok(())
}
