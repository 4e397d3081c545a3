use std::io::{self, Read as _};

use anyhow::Context as _;
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use sitefilters::{dispatch_filter, filter_names, Config, Context, IValue};
use tracing_subscriber::EnvFilter;

/// Apply static-site template filters to JSON values.
#[derive(Parser)]
#[command(name = "sitefilters")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// UTC offset to show dates in, e.g., `+08:00`.  Defaults to the local
    /// time zone.
    #[arg(long, global = true, env = "SITEFILTERS_UTC_OFFSET", allow_hyphen_values = true)]
    utc_offset: Option<FixedOffset>,

    /// Seed for `sample`.
    #[arg(long, global = true, env = "SITEFILTERS_SEED")]
    seed: Option<u64>,

    /// Do not memoize `where` results.
    #[arg(long, global = true)]
    no_where_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply one filter to a value.
    Apply {
        /// Filter name.
        filter: String,

        /// Positional arguments, each read as JSON, or as a string if it
        /// is not valid JSON.
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// The piped value as JSON.  Read from stdin if omitted.
        #[arg(short, long)]
        input: Option<String>,

        /// Context variables as NAME=JSON.
        #[arg(short, long = "var")]
        variables: Vec<String>,

        /// Print the text form of the result instead of JSON.
        #[arg(short, long)]
        raw: bool,
    },

    /// List the registered filters.
    List,
}

fn parse_json_or_text(source: &str) -> IValue {
    serde_json::from_str::<serde_json::Value>(source)
        .map_or_else(|_| IValue::from(source), IValue::from)
}

fn apply(
    config: Config,
    filter: &str,
    args: Vec<String>,
    input: Option<String>,
    variables: Vec<String>,
    raw: bool,
) -> anyhow::Result<()> {
    let input = match input {
        Some(input) => input,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("error reading input from stdin")?;
            buf
        }
    };
    let value: serde_json::Value =
        serde_json::from_str(&input).context("error parsing input as JSON")?;

    let mut ctx = Context::with_config(config);
    for var in variables {
        let (name, json) = var
            .split_once('=')
            .with_context(|| format!("expected NAME=JSON, got `{var}`"))?;
        let value: serde_json::Value = serde_json::from_str(json)
            .with_context(|| format!("error parsing variable `{name}` as JSON"))?;
        ctx.set(name, value.into());
    }

    let args = args.iter().map(|a| parse_json_or_text(a)).collect();
    let result = dispatch_filter(filter, value.into(), args, &mut ctx)?;

    if raw {
        println!("{}", result.to_text());
    } else {
        let json = serde_json::to_string_pretty(&result.to_data())
            .context("error serializing result")?;
        println!("{json}");
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config {
        utc_offset: cli.utc_offset,
        seed: cli.seed,
        cache_where: !cli.no_where_cache,
    };

    match cli.command {
        Command::Apply {
            filter,
            args,
            input,
            variables,
            raw,
        } => apply(config, &filter, args, input, variables, raw),
        Command::List => {
            for name in filter_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}
