use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the gateway manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8999")]
    url: String,

    #[arg(short, long, env = "GATEWAY_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check manager status and job count
    Status,
    /// List clusters with their instances
    Clusters,
    /// List cluster ids
    ClusterIds,
    /// Show one cluster
    Cluster { cluster_id: String },
    /// Show one instance
    Instance { cluster_id: String, instance_id: String },
    /// List registered health jobs
    Jobs,
    /// List API definitions
    Apis {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one API definition
    Api { api_id: String },
    /// List routing rules
    Routings {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show one routing rule
    Routing { routing_id: String },
}

impl Commands {
    fn path(&self) -> String {
        match self {
            Commands::Status => "/v1/status".to_string(),
            Commands::Clusters => "/v1/clusters".to_string(),
            Commands::ClusterIds => "/v1/cluster_ids".to_string(),
            Commands::Cluster { cluster_id } => format!("/v1/clusters/{}", cluster_id),
            Commands::Instance { cluster_id, instance_id } => {
                format!("/v1/clusters/{}/instance/{}", cluster_id, instance_id)
            }
            Commands::Jobs => "/v1/health/jobs".to_string(),
            Commands::Apis { limit, offset } => format!("/v1/apis?limit={}&offset={}", limit, offset),
            Commands::Api { api_id } => format!("/v1/apis/{}", api_id),
            Commands::Routings { limit, offset } => {
                format!("/v1/routings?limit={}&offset={}", limit, offset)
            }
            Commands::Routing { routing_id } => format!("/v1/routings/{}", routing_id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: management API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
