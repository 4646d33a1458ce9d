//! # alpha-insights
//!
//! Command-line front end: upload monthly sales sheets, then ask questions about them.

use alpha_insights::{
    load_month, ChatSession, GeminiClient, JsonFileStore, Month, SessionState, Settings,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Alpha Insights - ask questions about a year of sales spreadsheets
#[derive(Parser)]
#[command(name = "alpha-insights")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store file holding uploaded months and settings
    #[arg(
        short,
        long,
        env = "ALPHA_INSIGHTS_STORE",
        default_value = "alpha_insights.json"
    )]
    store: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload the spreadsheet for one month (1 = January ... 12 = December)
    Upload {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=12))]
        month: u8,
        file: PathBuf,
    },
    /// Show which months are loaded
    Status,
    /// Ask a single question about the loaded data
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Start an interactive question loop
    Chat,
    /// Show or change settings
    Config {
        /// New Gemini API key
        #[arg(long)]
        api_key: Option<String>,
        /// Gemini model name
        #[arg(long)]
        model: Option<String>,
    },
    /// Remove uploaded data for one month, or all months
    Clear {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=12), required_unless_present = "all")]
        month: Option<u8>,
        #[arg(long)]
        all: bool,
    },
}

type Session = ChatSession<JsonFileStore, GeminiClient>;

fn open_session(path: &Path) -> Result<Session> {
    let mut store = JsonFileStore::open(path)
        .with_context(|| format!("Failed to open store {}", path.display()))?;
    let settings = Settings::load(&mut store)?;
    let client = GeminiClient::new().with_model(settings.model.clone());
    Ok(ChatSession::with_settings(store, client, settings)?)
}

fn month_arg(number: u8) -> Result<Month> {
    Ok(Month::from_number(number as usize)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let mut session = open_session(&cli.store)?;

    match cli.command {
        Command::Upload { month, file } => {
            let month = month_arg(month)?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("Upload path has no file name")?
                .to_string();
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;

            let report = session.upload(month, &name, &bytes)?;
            println!(
                "✅ {} loaded: {} rows, {} columns",
                report.month, report.rows, report.columns
            );
        }
        Command::Status => print_status(&session)?,
        Command::Ask { question } => {
            let question = question.join(" ");
            if let Some(answer) = session.ask(&question).await? {
                println!("{}", answer);
            }
        }
        Command::Chat => run_chat(&mut session).await?,
        Command::Config { api_key, model } => {
            if api_key.is_none() && model.is_none() {
                let settings = session.settings();
                println!("Store:   {}", session.store().path().display());
                println!("API key: {}", settings.masked_api_key());
                println!("Model:   {}", settings.model);
            }
            if let Some(key) = api_key {
                session.set_api_key(key)?;
                println!("API key saved");
            }
            if let Some(model) = model {
                session.set_model(model)?;
                println!("Model saved: {}", session.settings().model);
            }
        }
        Command::Clear { month, all } => {
            let months: Vec<Month> = if all {
                Month::all().collect()
            } else {
                month.map(month_arg).transpose()?.into_iter().collect()
            };
            for month in months {
                session.clear_month(month)?;
            }
            println!("Cleared");
        }
    }

    Ok(())
}

fn print_status(session: &Session) -> Result<()> {
    for month in Month::all() {
        match load_month(session.store(), month)? {
            Some(rows) => println!("  ✔ {:<10} {} rows", month.name(), rows.len()),
            None => println!("  · {:<10} -", month.name()),
        }
    }

    if session.state() == SessionState::NoData {
        println!("\nNo sheets loaded: upload at least one month first.");
    }
    Ok(())
}

async fn run_chat(session: &mut Session) -> Result<()> {
    let months = session.loaded_months()?;
    if months.is_empty() {
        eprintln!("❌ No sheets loaded: upload at least one month first.");
        return Ok(());
    }

    let names: Vec<&str> = months.iter().map(|m| m.name()).collect();
    println!("📊 Loaded sheets: {}", names.join(", "));
    println!("🤖 Ready! Ask questions about your sales (type 'quit' to exit).");
    println!("------------------------------------------------------------------");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let prompt = input.trim();

        if prompt.eq_ignore_ascii_case("quit") || prompt.eq_ignore_ascii_case("exit") {
            break;
        }

        if prompt.is_empty() {
            continue;
        }

        println!("\nAnalisando dados...");

        match session.ask(prompt).await {
            Ok(Some(response)) => {
                println!("\n{}\n", response);
                println!("------------------------------------------------------------------");
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("❌ Error: {}", e);
            }
        }
    }

    Ok(())
}
