//! Axon CLI
//!
//! Command-line front end for the Axon client:
//! - Evaluate an expression
//! - Read entities by tag filter
//! - Interactive console
//! - Print a default config file

use anyhow::Context;
use axon_client::{
    generate_default_config, provider_from_config, AxonClient, AxonQuery, ClientError, Config,
    Decoded, FilterValue, LoggingConfig, ResultFormat, ResultShape, TagFilter,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const AXON_REFERENCE: &str = "https://skyfoundry.com/doc/docSkySpark/Axon";

const SAMPLE_QUERY: &str = r#"read(point and siteRef->dis=="Building 77" and equipRef->dis=="AHU-33" and discharge and air and temp and sensor).hisRead(yesterday)"#;

#[derive(Parser)]
#[command(name = "axon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate Axon expressions against a building-data server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL, overrides the config
    #[arg(long, global = true)]
    pub host: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate one expression
    Eval {
        /// Axon expression
        expr: String,
        /// Wire format (json, csv, zinc)
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Result shape for json (meta, ts, both)
        #[arg(short, long, default_value = "meta")]
        shape: String,
    },

    /// Read entities matching a tag filter
    Read {
        /// Marker tags that must be present
        #[arg(short, long)]
        marker: Vec<String>,
        /// Marker tags that must be absent
        #[arg(short = 'x', long = "not")]
        absent: Vec<String>,
        /// Value tags in key=value format
        #[arg(short = 'T', long)]
        tags: Vec<String>,
        /// Read history over this range instead (e.g. yesterday, today)
        #[arg(long)]
        his: Option<String>,
    },

    /// Interactive console
    Console {
        /// Wire format (json, csv, zinc)
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Result shape for json (meta, ts, both)
        #[arg(short, long, default_value = "meta")]
        shape: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config loading logs its own failures, before `[logging]` is known
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        match &cli.config {
            Some(path) => Config::load_with_env(path),
            None => Ok(Config::load_default()),
        }
    })?;
    if let Some(host) = cli.host {
        config.host.address = host;
    }

    init_logging(&config.logging);

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote default config to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let tokens = provider_from_config(&config.auth);
    let mut client = AxonClient::connect(&config, tokens)
        .await
        .context("connecting to the Axon server")?;

    match cli.command {
        Commands::Eval {
            expr,
            format,
            shape,
        } => {
            let format: ResultFormat = format.parse()?;
            let shape: ResultShape = shape.parse()?;
            let decoded = client.request(&AxonQuery::from(expr), format, shape).await?;
            print_decoded(&decoded)?;
        }

        Commands::Read {
            marker,
            absent,
            tags,
            his,
        } => {
            let filter = build_filter(&marker, &absent, &tags)?;
            let query = filter.to_query()?;

            match his {
                Some(range) => match client.his_read(&query.his_read(&range)).await? {
                    Some(series) => series.write_csv(std::io::stdout())?,
                    None => eprintln!("No time series in result"),
                },
                None => client.read_all(&filter).await?.write_csv(std::io::stdout())?,
            }
        }

        Commands::Console { format, shape } => {
            let format: ResultFormat = format.parse()?;
            let shape: ResultShape = shape.parse()?;
            run_console(&mut client, format, shape).await?;
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("axon_client=info,axon=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("axon_client={0},axon={0}", config.level))
    });

    // Logs go to stderr; stdout carries results
    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_filter(marker: &[String], absent: &[String], tags: &[String]) -> anyhow::Result<TagFilter> {
    let mut filter = TagFilter::new();

    for tag in marker {
        filter.push(tag.as_str(), true);
    }
    for tag in absent {
        filter.push(tag.as_str(), false);
    }
    for tag in tags {
        let (key, value) = tag
            .split_once('=')
            .with_context(|| format!("expected key=value, got {:?}", tag))?;
        filter.push(key, FilterValue::Auto(value.to_string()));
    }

    Ok(filter)
}

fn print_decoded(decoded: &Decoded) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    match decoded {
        Decoded::Csv(text) | Decoded::Zinc(text) => write!(stdout, "{}", text)?,
        Decoded::Metadata(table) => table.write_csv(&mut stdout)?,
        Decoded::TimeSeries(Some(series)) => series.write_csv(&mut stdout)?,
        Decoded::Both(Some((columns, series))) => {
            columns.write_csv(&mut stdout)?;
            writeln!(stdout)?;
            series.write_csv(&mut stdout)?;
        }
        Decoded::TimeSeries(None) | Decoded::Both(None) => {
            eprintln!("No time series in result");
        }
    }

    Ok(())
}

async fn run_console(
    client: &mut AxonClient,
    format: ResultFormat,
    shape: ResultShape,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Enter Axon query:\n>");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();

        match query.to_lowercase().as_str() {
            "q" | "quit" => break,
            "help" => {
                println!("\nReference: {}\nExample: {}\nEnter 'q' or 'quit' to exit\n", AXON_REFERENCE, SAMPLE_QUERY);
                continue;
            }
            "" => continue,
            _ => {}
        }

        match client.request(&AxonQuery::from(query), format, shape).await {
            Ok(decoded) => print_decoded(&decoded)?,
            Err(ClientError::EmptyResult) => println!("{}\n", ClientError::EmptyResult),
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_build_filter_from_flags() {
        let filter = build_filter(
            &strings(&["equip"]),
            &strings(&["disabled"]),
            &strings(&["siteRef=p:demo:r:1eeb", "navName=AHU-1", "area=1250"]),
        )
        .unwrap();

        assert_eq!(
            filter.predicate().unwrap(),
            "equip and not disabled and siteRef==@p:demo:r:1eeb and navName==\"AHU-1\" and area==1250"
        );
    }

    #[test]
    fn test_build_filter_keeps_equals_in_value() {
        let filter = build_filter(&[], &[], &strings(&["navName=a=b"])).unwrap();
        assert_eq!(filter.predicate().unwrap(), "navName==\"a=b\"");
    }

    #[test]
    fn test_build_filter_rejects_tag_without_value() {
        let err = build_filter(&[], &[], &strings(&["siteRef"])).unwrap_err();
        assert!(err.to_string().contains("expected key=value"));
    }

    #[test]
    fn test_empty_flags_read_everything() {
        let filter = build_filter(&[], &[], &[]).unwrap();
        assert_eq!(filter.to_query().unwrap().as_str(), "readAll()");
    }
}
