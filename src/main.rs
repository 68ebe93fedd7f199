use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

mod app;
mod bubble;
mod config;
mod conversation;
mod gemini;
mod handler;
mod logging;
mod markup;
mod tui;
mod ui;

use app::App;
use bubble::WrapMode;
use config::{Config, Overrides, Settings};
use conversation::Conversation;
use gemini::GeminiClient;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "chatbot", version)]
#[command(about = "Chat with Google's Gemini models from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Gemini model to use
    #[arg(short, long, global = true)]
    model: Option<String>,
    /// API key (overrides GEMINI_API_KEY and the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Show replies as plain wrapped text instead of styled markup
    #[arg(long)]
    plain: bool,
    /// Write debug-level logs
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat window (default)
    Chat,
    /// List models that support text generation
    Models,
    /// Save an API key to the config file
    SetKey {
        /// The Gemini API key
        key: String,
    },
    /// Save the default model to the config file
    SetModel {
        /// Model name, e.g. gemini-1.5-flash
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (_log_guard, log_path) = logging::init(cli.debug)?;
    info!(log = %log_path.display(), "starting chatbot");

    let overrides = Overrides {
        api_key: cli.api_key,
        model: cli.model,
        plain: cli.plain,
    };

    // Only the commands that talk to the API resolve settings up front.
    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(Settings::resolve(&Config::load()?, &overrides)).await?,
        Commands::Models => list_models(Settings::resolve(&Config::load()?, &overrides)).await?,
        Commands::SetKey { key } => {
            let path = Config::save_api_key(&key)?;
            println!("API key saved to {}", path.display());
        }
        Commands::SetModel { model } => {
            let path = Config::save_model(&model)?;
            println!("Default model set to {} in {}", model.trim(), path.display());
        }
    }

    Ok(())
}

async fn run_chat(settings: Settings) -> Result<()> {
    let client = GeminiClient::new(
        &settings.base_url,
        settings.require_api_key()?,
        &settings.model,
    );
    let wrap_mode = if settings.render_markup {
        WrapMode::Markup
    } else {
        WrapMode::Plain
    };

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_app(&mut terminal, client, wrap_mode).await;
    tui::restore()?;

    if let Err(err) = &result {
        error!("chat session failed: {err:#}");
    }
    result
}

async fn run_app(terminal: &mut Tui, client: GeminiClient, wrap_mode: WrapMode) -> Result<()> {
    let mut events = EventHandler::new();
    let model = client.model().to_string();
    let conversation = Conversation::new(Arc::new(client), events.sender());
    let mut app = App::new(conversation, model, wrap_mode);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    info!(messages = app.conversation.transcript().len(), "chat session ended");
    Ok(())
}

async fn list_models(settings: Settings) -> Result<()> {
    let client = GeminiClient::new(
        &settings.base_url,
        settings.require_api_key()?,
        &settings.model,
    );

    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No text generation models available for this key.");
    }
    for model in models {
        let marker = if model == settings.model { "*" } else { " " };
        println!("{} {}", marker, model);
    }

    Ok(())
}
