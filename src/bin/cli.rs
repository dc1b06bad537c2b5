use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fs;

const TOKEN_FILE: &str = ".budgeteer_token";

#[derive(Parser)]
#[command(name = "budgeteer-cli")]
#[command(about = "CLI for the budgeteer API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Current month overview: summary and recent expenses
    Dashboard,
    CreateMonth {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        income: String,
    },
    SwitchMonth {
        #[arg(short, long)]
        name: String,
    },
    DeleteMonth,
    AddVariable {
        #[arg(short = 'd', long)]
        description: String,
        #[arg(short, long)]
        amount: String,
        #[arg(long)]
        day: String,
        #[arg(long)]
        month: String,
    },
    RemoveVariable {
        #[arg(short, long)]
        index: usize,
    },
    ListFixed,
    AddFixed {
        #[arg(short = 'd', long)]
        description: String,
        #[arg(short, long)]
        amount: String,
    },
    /// Download the current month as CSV
    Export {
        #[arg(short, long)]
        output: Option<String>,
    },
    Logout,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

fn token() -> String {
    fs::read_to_string(TOKEN_FILE).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Register { username, password } => {
            let res = client
                .post(format!("{}/register", cli.url))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: TokenResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Registered and logged in. Token saved to {}", TOKEN_FILE);
            } else {
                println!("Registration failed: {}", res.text().await?);
            }
        }
        Commands::Login { username, password } => {
            let res = client
                .post(format!("{}/login", cli.url))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: TokenResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.token)?;
                println!("Logged in. Token saved to {}", TOKEN_FILE);
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Dashboard => {
            let res = client
                .get(format!("{}/dashboard", cli.url))
                .bearer_auth(token())
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::CreateMonth { name, income } => {
            let res = client
                .post(format!("{}/months", cli.url))
                .bearer_auth(token())
                .json(&json!({ "name": name, "income": income }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::SwitchMonth { name } => {
            let res = client
                .post(format!("{}/months/current", cli.url))
                .bearer_auth(token())
                .json(&json!({ "name": name }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::DeleteMonth => {
            let res = client
                .delete(format!("{}/months/current", cli.url))
                .bearer_auth(token())
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::AddVariable {
            description,
            amount,
            day,
            month,
        } => {
            let res = client
                .post(format!("{}/expenses/variable", cli.url))
                .bearer_auth(token())
                .json(&json!({
                    "description": description,
                    "amount": amount,
                    "day": day,
                    "month": month
                }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::RemoveVariable { index } => {
            let res = client
                .delete(format!("{}/expenses/variable/{}", cli.url, index))
                .bearer_auth(token())
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::ListFixed => {
            let res = client
                .get(format!("{}/expenses/fixed", cli.url))
                .bearer_auth(token())
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::AddFixed { description, amount } => {
            let res = client
                .post(format!("{}/expenses/fixed", cli.url))
                .bearer_auth(token())
                .json(&json!({ "description": description, "amount": amount }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Export { output } => {
            let res = client
                .get(format!("{}/export/csv", cli.url))
                .bearer_auth(token())
                .send()
                .await?;
            if res.status().is_success() {
                // server names the attachment {month}.csv
                let from_header = res
                    .headers()
                    .get(reqwest::header::CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split("filename=\"").nth(1))
                    .and_then(|v| v.strip_suffix('"'))
                    .map(str::to_string);
                let name = output
                    .or(from_header)
                    .unwrap_or_else(|| "export.csv".to_string());
                fs::write(&name, res.text().await?)?;
                println!("Saved {}", name);
            } else {
                println!("Export failed: {}", res.text().await?);
            }
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
    }

    Ok(())
}
