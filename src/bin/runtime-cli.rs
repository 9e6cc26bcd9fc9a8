use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "runtime-cli")]
#[command(about = "Query a running request-runtime instance", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Telemetry snapshot and lifecycle state (JSON)
    Status,
    /// Readiness text
    Ready,
    /// Liveness text
    Live,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/status", cli.url))
                .header("accept", "application/json")
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Ready => {
            let res = client.get(format!("{}/ready", cli.url)).send().await?;
            print_text(res).await?;
        }
        Commands::Live => {
            let res = client.get(format!("{}/live", cli.url)).send().await?;
            print_text(res).await?;
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: runtime returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    println!("{} {}", status.as_u16(), text);
    Ok(())
}
