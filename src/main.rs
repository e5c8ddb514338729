use chrono::Utc;
use clap::Parser;
use loki_client::config::cli::{labels_from_pairs, query_window, Command};
use loki_client::utils::logger;
use loki_client::{CliConfig, Data, Labels, LokiClient, RangeQuery, Result, TomlConfig};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let file = match cli.load_file() {
        Ok(file) => file,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(e.exit_code());
        }
    };

    if cli.json_logs || file.json_logs() {
        let level = if cli.verbose { "debug" } else { file.log_level() };
        logger::init_json_logger(level);
    } else {
        logger::init_cli_logger(cli.verbose || file.log_level() == "debug");
    }

    if let Err(e) = run(&cli, &file).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?})",
            command_name(&cli.command),
            e,
            e.category()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: &CliConfig, file: &TomlConfig) -> Result<()> {
    let config = cli.client_config(file)?;
    let client = LokiClient::new(config)?;

    match &cli.command {
        Command::Push {
            labels,
            timestamp,
            line,
        } => {
            let labels = labels_from_pairs(labels);
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            client.push_log_line(line, timestamp, &labels).await?;
            tracing::info!("Pushed 1 line to {}", format_labels(&labels));
        }
        Command::Query {
            query,
            start,
            end,
            since,
            limit,
        } => {
            let (start, end) = query_window(*start, *end, *since);
            let mut request = RangeQuery::new(query.clone(), start, end);
            if let Some(limit) = limit {
                request = request.with_limit(*limit);
            }
            let result = client.range_query_with(&request).await?;
            print_data(&result.data);
        }
        Command::Kind { query } => {
            let result_type = client.get_expected_result_type(query).await?;
            println!("{}", result_type);
        }
        Command::Flush => {
            client.flush().await?;
            println!("✅ Flushed");
        }
        Command::Ready => {
            client.ready().await?;
            println!("✅ {} is ready", client.base_url());
        }
    }

    Ok(())
}

fn print_data(data: &Data) {
    match data {
        Data::Streams(streams) => {
            for stream in streams {
                let labels = format_labels(&stream.labels);
                for entry in &stream.values {
                    let ts = loki_client::core::time::instant_from_nanos(entry.timestamp);
                    println!("{} {} {}", ts.to_rfc3339(), labels, entry.line);
                }
            }
        }
        Data::Matrix(metrics) => {
            for metric in metrics {
                let labels = format_labels(&metric.labels);
                for point in &metric.values {
                    println!("{} {} {}", labels, point.ts, point.v);
                }
            }
        }
    }
    tracing::info!("{} {} returned", data.len(), data.result_type());
}

fn format_labels(labels: &Labels) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}={:?}", k, v))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Push { .. } => "push",
        Command::Query { .. } => "query",
        Command::Kind { .. } => "kind",
        Command::Flush => "flush",
        Command::Ready => "ready",
    }
}
