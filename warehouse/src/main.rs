use anyhow::{Context, bail};
use clap::{Arg, ArgMatches, Command};
use common::config::Settings;
use std::process;
use warehouse::convert::batches_to_json;
use warehouse::pipeline::Task;

const DEFAULT_CONFIG: &str = "config/warehouse.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Sets a custom config file")
}

fn cli() -> Command {
    Command::new("Authorization Warehouse")
        .version("1.0")
        .about("Builds and queries the tax authorization star schema")
        .subcommand(
            Command::new("run")
                .about("Load every dimension and the fact table")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("task")
                .about("Run a single load task")
                .arg(
                    Arg::new("name")
                        .required(true)
                        .help("Task name, e.g. cargar_dim_contribuyente, or the table it loads"),
                )
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("query")
                .about("Run SQL over the loaded tables")
                .arg(Arg::new("sql").required(true))
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("tables")
                .about("List loaded tables and their load markers")
                .arg(config_arg()),
        )
}

async fn dispatch(matches: ArgMatches) -> anyhow::Result<()> {
    let Some((command, args)) = matches.subcommand() else {
        bail!("No subcommand specified. Use --help for usage information.");
    };

    let config_path = args
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG);
    let settings = Settings::new(config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    warehouse::init_tracing(&settings.logging);

    let pipeline = warehouse::connect(&settings)
        .await
        .context("connecting to object storage")?;

    let output = match command {
        "run" => serde_json::to_string_pretty(&pipeline.run().await?)?,
        "task" => {
            let name = args.get_one::<String>("name").context("missing task name")?;
            let task: Task = name.parse()?;
            serde_json::to_string_pretty(&pipeline.run_task(task).await?)?
        }
        "query" => {
            let sql = args.get_one::<String>("sql").context("missing SQL")?;
            let batches = pipeline.warehouse().query(sql).await?;
            serde_json::to_string_pretty(&batches_to_json(&batches)?)?
        }
        "tables" => serde_json::to_string_pretty(&pipeline.warehouse().loaded_tables().await?)?,
        other => bail!("unknown subcommand '{}'", other),
    };

    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = dispatch(cli().get_matches()).await {
        eprintln!("warehouse-cli error: {:#}", e);
        process::exit(1);
    }
}
