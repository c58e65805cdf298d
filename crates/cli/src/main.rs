use anyhow::Context;
use bookstore_app::{bootstrap, BookService};
use bookstore_db::EntityManager;
use bookstore_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bookstore")]
#[command(about = "Bookstore catalog services")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the catalog over HTTP until Ctrl-C
    Serve {
        /// Load the demo catalog before serving
        #[arg(long)]
        seed: bool,
    },

    /// Print the effective configuration as JSON
    Config,

    /// Search the demo catalog by title
    Search {
        /// `LIKE` pattern, e.g. `%Java%`
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load bookstore settings")?;

    match cli.command {
        Commands::Serve { seed } => {
            bookstore_telemetry::init(&settings.telemetry)?;
            settings.catalog.seed_demo_data |= seed;
            tracing::info!(
                env = ?settings.environment,
                seed = settings.catalog.seed_demo_data,
                "bookstore CLI serving"
            );
            bootstrap::run(settings).await
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Search { pattern } => {
            settings.catalog.seed_demo_data = true;
            let app = bootstrap::Application::start(settings).await?;

            let mut em = EntityManager::new(app.store.clone());
            let books = BookService::new()
                .find_by_criteria(&mut em, &pattern)
                .with_context(|| format!("search for '{pattern}' failed"))?;
            println!("{}", serde_json::to_string_pretty(&books)?);

            app.shutdown().await
        }
    }
}
