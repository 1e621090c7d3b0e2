use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "dualconn-cli")]
#[command(about = "Management CLI for the dualconn admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:7001")]
    url: String,

    #[arg(short, long, env = "DUALCONN_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and full manager state
    Status,
    /// List targets in priority order with their connections
    Targets,
    /// Re-enable a target
    Enable { address: String },
    /// Disable a target and close its connections
    Disable { address: String },
    /// Run one recycle and primary probe pass now
    Maintain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;

    let request = match &cli.command {
        Commands::Status => client.get(endpoint(&cli.url, &["status"])?),
        Commands::Targets => client.get(endpoint(&cli.url, &["targets"])?),
        Commands::Enable { address } => {
            client.post(endpoint(&cli.url, &["targets", address.as_str(), "enable"])?)
        }
        Commands::Disable { address } => {
            client.post(endpoint(&cli.url, &["targets", address.as_str(), "disable"])?)
        }
        Commands::Maintain => client.post(endpoint(&cli.url, &["maintenance"])?),
    };

    print_response(request.send().await?).await
}

/// Admin API URL under `base`; each segment is percent-encoded on its own.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .push("admin")
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
