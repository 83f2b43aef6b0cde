//! qail-convert — SQL value conversion from the command line
//!
//! # Usage
//!
//! ```bash
//! # Host value (JSON) to SQL literal
//! qail-convert to-sql '["a","b,c",null]' --type 'text[]'
//!
//! # SQL literal to host value
//! qail-convert from-sql '2020-11-27 13:42:34.901965+00' --type timestamptz --timezone Europe/Paris
//!
//! # Guess a SQL type
//! qail-convert guess '1.5'
//!
//! # Run a query and hydrate the result
//! qail-convert query 'SELECT $1::text AS d' --bind '"P1D"' --types d=interval
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use qail_convert::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qail-convert")]
#[command(author = "QAIL Contributors")]
#[command(version = "0.1.0")]
#[command(about = "🪝 SQL ⇄ value conversion for QAIL", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-convert to-sql '{\"a\":1}' --type jsonb
    qail-convert from-sql '{1,2,NULL}' --type _int4
    qail-convert from-sql '1 year 2 days 00:01:00' --type interval
    qail-convert guess '[true,false]'")]
struct Cli {
    /// Client time zone (IANA name)
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Client encoding
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// Driver quirks to apply (default, mysql, pgsql)
    #[arg(long, global = true)]
    driver: Option<Driver>,

    /// Cast unconvertible values to text instead of failing
    #[arg(long, global = true)]
    string_cast: bool,

    /// Path to qail.toml (defaults to ./qail.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a host value (JSON) to a SQL literal
    ToSql {
        /// The value, as JSON; anything that is not JSON is taken as a string
        value: String,

        /// Target SQL type
        #[arg(short = 't', long = "type", default_value = TYPE_UNKNOWN)]
        sql_type: String,
    },
    /// Convert a SQL literal to a host value
    FromSql {
        /// The SQL literal
        literal: String,

        /// Source SQL type
        #[arg(short = 't', long = "type")]
        sql_type: String,

        /// Treat the literal as SQL NULL
        #[arg(long)]
        null: bool,
    },
    /// Guess the SQL type of a host value (JSON)
    Guess {
        value: String,
    },
    /// Run a SQL query and print hydrated rows
    Query {
        sql: String,

        /// Parameter bindings ($1, $2, etc.), as JSON
        #[arg(short, long)]
        bind: Vec<String>,

        /// Declared column types, as column=type
        #[arg(long = "types", value_parser = parse_column_type)]
        types: Vec<(String, String)>,

        /// Database connection URL
        #[arg(long, env = "QAIL_DATABASE_URL")]
        database_url: Option<String>,
    },
}

fn parse_column_type(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(column, sql_type)| (column.trim().to_string(), sql_type.trim().to_string()))
        .ok_or_else(|| format!("expected column=type, got '{}'", s))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "qail_convert=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ConverterConfig> {
    let base = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::discover()?,
    };

    let mut builder = qail_convert::config::ConverterConfigBuilder::from_config(base);
    if let Some(timezone) = &cli.timezone {
        builder = builder.timezone(timezone);
    }
    if let Some(encoding) = &cli.encoding {
        builder = builder.encoding(encoding);
    }
    if let Some(driver) = cli.driver {
        builder = builder.driver(driver);
    }
    if cli.string_cast {
        builder = builder.fallback(FallbackMode::StringCast);
    }
    Ok(builder.build())
}

/// JSON if it parses, a plain string otherwise.
fn parse_value(input: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(input)
        .map(Value::from_json)
        .unwrap_or_else(|_| Value::String(input.to_string()))
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if cli.verbose {
        println!(
            "{} {} {} {}",
            "Session:".dimmed(),
            config.client_timezone.cyan(),
            config.client_encoding.cyan(),
            format!("{:?}", config.driver).cyan()
        );
    }

    match &cli.command {
        Commands::ToSql { value, sql_type } => {
            let converter = config.build_converter();
            let ctx = ConverterContext::from_config(converter.as_ref(), &config)?;
            let literal = to_sql(converter.as_ref(), &ctx, &parse_value(value), sql_type)?;
            print_literal(literal.as_deref(), cli.format);
        }
        Commands::FromSql {
            literal,
            sql_type,
            null,
        } => {
            let converter = config.build_converter();
            let ctx = ConverterContext::from_config(converter.as_ref(), &config)?;
            let raw = if *null {
                RawValue::Null
            } else {
                RawValue::Text(literal)
            };
            let value = converter.from_sql(sql_type, raw, None, &ctx)?;
            print_value(&value, cli.format);
        }
        Commands::Guess { value } => {
            let converter = config.build_converter();
            let ctx = ConverterContext::from_config(converter.as_ref(), &config)?;
            let guess = converter.guess_type(&parse_value(value), &ctx);
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "type": guess })),
                OutputFormat::Table => println!("{}", guess.green()),
            }
        }
        Commands::Query {
            sql,
            bind,
            types,
            database_url,
        } => {
            let url = database_url
                .clone()
                .or_else(|| config.database_url.clone())
                .context("No database URL. Use --database-url, set QAIL_DATABASE_URL or add [postgres] url to qail.toml")?;
            if cli.verbose {
                println!("{} {}", "Connecting to:".dimmed(), url);
            }

            let runner = Runner::connect(&url, config).await?;
            let mut query = runner.query(sql);
            for binding in bind {
                query = query.bind(parse_value(binding));
            }
            for (column, sql_type) in types {
                query = query.types(column, sql_type);
            }

            let rows = query.fetch_all().await?;
            format_rows(&rows, cli.format);
        }
    }

    Ok(())
}

/// Convert, reading string input as a literal of the target type when the
/// type has no string host form (dates, intervals, arrays).
fn to_sql(
    converter: &dyn Converter,
    ctx: &ConverterContext<'_>,
    value: &Value,
    sql_type: &str,
) -> Result<Option<String>> {
    match (converter.to_sql(value, sql_type, None, ctx), value) {
        (Err(ConvertError::UnsupportedHostType { .. }), Value::String(text)) => {
            let typed = converter.from_sql(sql_type, RawValue::Text(text), None, ctx)?;
            Ok(converter.to_sql(&typed, sql_type, None, ctx)?)
        }
        (result, _) => Ok(result?),
    }
}

fn print_literal(literal: Option<&str>, format: OutputFormat) {
    match (format, literal) {
        (OutputFormat::Json, _) => println!("{}", serde_json::json!(literal)),
        (OutputFormat::Table, Some(text)) => println!("{}", text.white()),
        (OutputFormat::Table, None) => println!("{}", "NULL".dimmed()),
    }
}

fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&value.to_json()).unwrap_or_default());
        }
        OutputFormat::Table => {
            println!("{} {}", format!("({})", value.host_type()).dimmed(), cell(value).white());
        }
    }
}

fn format_rows(rows: &[Record], format: OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    serde_json::Value::Object(
                        row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Table => {
            let mut columns: Vec<&String> = rows[0].keys().collect();
            columns.sort();

            let widths: Vec<usize> = columns
                .iter()
                .map(|c| {
                    rows.iter()
                        .filter_map(|row| row.get(*c))
                        .map(|v| cell(v).chars().count())
                        .fold(c.chars().count(), usize::max)
                })
                .collect();

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in rows {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| {
                        let val = row.get(*c).map(cell).unwrap_or_default();
                        format!("{:width$}", val, width = w)
                    })
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        Value::Date(d) => d.to_string(),
        Value::Time(t) => t.to_string(),
        Value::Interval(i) => i.to_iso8601(),
        other => other.to_string(),
    }
}
