use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::error::Error;

#[derive(Parser)]
#[command(name = "glm-cli")]
#[command(about = "Gas leak monitor CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GLM_ENDPOINT", default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

/// Sensor values accepted by `send` and `predict`
#[derive(clap::Args)]
struct ReadingArgs {
    #[arg(long)]
    worker_1_mean: Option<f64>,
    #[arg(long)]
    worker_2_mean: Option<f64>,
    #[arg(long)]
    worker_3_mean: Option<f64>,
    #[arg(long)]
    humidity: Option<f64>,
    #[arg(long)]
    temperature: Option<f64>,

    /// Full reading as a JSON object; flags override its fields
    #[arg(short, long)]
    json: Option<String>,
}

impl ReadingArgs {
    fn to_payload(&self) -> Result<Map<String, Value>, Box<dyn Error>> {
        let mut payload = match self.json.as_deref() {
            Some(raw) => match serde_json::from_str(raw)? {
                Value::Object(map) => map,
                _ => return Err("--json must be a JSON object".into()),
            },
            None => Map::new(),
        };

        let fields = [
            ("worker_1_mean", self.worker_1_mean),
            ("worker_2_mean", self.worker_2_mean),
            ("worker_3_mean", self.worker_3_mean),
            ("humidity", self.humidity),
            ("temperature", self.temperature),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                payload.insert(name.to_string(), json!(value));
            }
        }

        Ok(payload)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Store a reading
    Send {
        #[command(flatten)]
        reading: ReadingArgs,

        /// Label the reading as a leak (true) or not (false)
        #[arg(short, long)]
        leak: Option<bool>,
    },

    /// List stored readings, newest first
    List {
        #[arg(short, long, default_value = "0")]
        skip: usize,

        #[arg(short, long, default_value = "1000")]
        limit: usize,
    },

    /// Set or clear the leak label of a reading
    Label {
        #[arg(value_name = "READING_ID")]
        id: String,

        /// true or false; omit to clear the label
        #[arg(value_name = "IS_LEAK")]
        is_leak: Option<bool>,
    },

    /// Score a reading
    Predict {
        #[command(flatten)]
        reading: ReadingArgs,
    },

    /// Start a training run
    Train,

    /// Show model status and the last training report
    Status,
}

async fn print_response(response: reqwest::Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        eprintln!("Request failed with status {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let response = match cli.command {
        Commands::Health => client.get(format!("{}/health", cli.endpoint)).send().await?,

        Commands::Send { reading, leak } => {
            let mut payload = reading.to_payload()?;
            if let Some(leak) = leak {
                payload.insert("is_leak".to_string(), json!(leak));
            }
            client
                .post(format!("{}/v1/readings", cli.endpoint))
                .json(&payload)
                .send()
                .await?
        }

        Commands::List { skip, limit } => {
            client
                .get(format!(
                    "{}/v1/readings?skip={}&limit={}",
                    cli.endpoint, skip, limit
                ))
                .send()
                .await?
        }

        Commands::Label { id, is_leak } => {
            client
                .put(format!("{}/v1/readings/{}/label", cli.endpoint, id))
                .json(&json!({ "is_leak": is_leak }))
                .send()
                .await?
        }

        Commands::Predict { reading } => {
            client
                .post(format!("{}/v1/predict", cli.endpoint))
                .json(&reading.to_payload()?)
                .send()
                .await?
        }

        Commands::Train => {
            client
                .post(format!("{}/v1/model/train", cli.endpoint))
                .send()
                .await?
        }

        Commands::Status => {
            client
                .get(format!("{}/v1/model/status", cli.endpoint))
                .send()
                .await?
        }
    };

    print_response(response).await
}
