mod commands;
mod config;
mod server;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_add, cmd_clear, cmd_delete, cmd_draft_clear, cmd_draft_set, cmd_draft_show, cmd_edit,
    cmd_export, cmd_import, cmd_list, cmd_photo, cmd_show,
};
use crate::config::Config;
use cookbook_core::backup::{BACKUP_FILE_NAME, EXPORT_FILE_NAME};
use cookbook_core::models::{ALL_SECTIONS, FieldOverrides};
use cookbook_core::selection::SortKey;
use cookbook_core::{Cookbook, LocalCache, SqliteStore};

#[derive(Parser)]
#[command(
    name = "cookbook",
    version,
    about = "A simple, local-first recipe book",
    long_about = "A simple, local-first recipe book.\n\n\
        Recipes live in a local SQLite file. Set RUST_LOG=debug for diagnostics."
)]
struct Cli {
    /// Directory holding the database, local cache and API key
    #[arg(long, global = true, env = "COOKBOOK_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Form fields shared by `add`, `edit` and `draft set`.
#[derive(Args, Default)]
struct FieldArgs {
    /// Recipe name
    #[arg(long)]
    name: Option<String>,
    /// Cooking time (free text, e.g. "45 min")
    #[arg(long)]
    time: Option<String>,
    /// Ingredients, one per line
    #[arg(long)]
    ingredients: Option<String>,
    /// Instructions
    #[arg(long)]
    instructions: Option<String>,
    /// Nutrition notes
    #[arg(long)]
    nutrition: Option<String>,
    /// Section tag (e.g. "soups"); "all" means untagged
    #[arg(long)]
    section: Option<String>,
}

impl From<FieldArgs> for FieldOverrides {
    fn from(args: FieldArgs) -> Self {
        Self {
            name: args.name,
            time: args.time,
            ingredients: args.ingredients,
            instructions: args.instructions,
            nutrition: args.nutrition,
            section: args.section,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    /// Most recently updated first
    Updated,
    /// Alphabetical by name
    Name,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Updated => Self::Updated,
            SortArg::Name => Self::Name,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List recipes as cards
    List {
        /// Only show recipes tagged with this section
        #[arg(short, long, default_value = ALL_SECTIONS)]
        section: String,
        /// Search recipe names, ignoring case and accents
        #[arg(short = 'q', long, default_value = "")]
        search: String,
        /// Sort order
        #[arg(long, value_enum, default_value = "updated")]
        sort: SortArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe in full
    Show {
        /// Recipe ID
        id: String,
        /// Write the stored photo (JPEG) to this path
        #[arg(long, value_name = "PATH")]
        photo_out: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a recipe (unset fields are taken from the saved draft)
    Add {
        #[command(flatten)]
        fields: FieldArgs,
        /// Photo to attach (resized to at most 1200px and stored as JPEG)
        #[arg(long, value_name = "PATH")]
        photo: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing recipe
    Edit {
        /// Recipe ID
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
        /// Replace the photo
        #[arg(long, value_name = "PATH")]
        photo: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every recipe
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all recipes to a JSON file
    Export {
        /// Output path, or "-" for stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Write a full backup (same format as export)
    Backup {
        /// Output path, or "-" for stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import recipes from a JSON export or backup
    Import {
        /// Path to the JSON file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resize a photo the way saved recipes do
    Photo {
        /// Input image (PNG, JPEG, GIF or WebP)
        input: PathBuf,
        /// Write the resulting JPEG here instead of printing the data URL
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the unsaved recipe draft
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum DraftCommands {
    /// Show the saved draft
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update draft fields
    Set {
        #[command(flatten)]
        fields: FieldArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset the draft to empty
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Photo transforms never touch the store.
    if let Commands::Photo {
        input,
        output,
        json,
    } = &cli.command
    {
        return cmd_photo(input, output.as_deref(), *json).await;
    }

    let config = Config::load(cli.data_dir.as_deref())?;
    tracing::debug!(db = %config.db_path.display(), "opening cookbook");
    let mut book = Cookbook::open(
        SqliteStore::new(&config.db_path),
        LocalCache::new(&config.cache_dir),
    )
    .await;
    if book.is_read_only() {
        eprintln!("Warning: storage unavailable, showing the last saved snapshot (read-only).");
    }

    match cli.command {
        Commands::List {
            section,
            search,
            sort,
            json,
        } => cmd_list(&mut book, &section, &search, sort.into(), json),
        Commands::Show {
            id,
            photo_out,
            json,
        } => cmd_show(&book, &id, photo_out.as_deref(), json),
        Commands::Add {
            fields,
            photo,
            json,
        } => cmd_add(&mut book, fields.into(), photo, json).await,
        Commands::Edit {
            id,
            fields,
            photo,
            json,
        } => cmd_edit(&mut book, &id, fields.into(), photo, json).await,
        Commands::Delete { id, yes, json } => cmd_delete(&mut book, &id, yes, json).await,
        Commands::Clear { yes, json } => cmd_clear(&mut book, yes, json).await,
        Commands::Export { output } => cmd_export(&book, output, EXPORT_FILE_NAME).await,
        Commands::Backup { output } => cmd_export(&book, output, BACKUP_FILE_NAME).await,
        Commands::Import { file, json } => cmd_import(&mut book, &file, json).await,
        Commands::Draft { command } => match command {
            DraftCommands::Show { json } => cmd_draft_show(&book, json),
            DraftCommands::Set { fields, json } => cmd_draft_set(&book, fields.into(), json),
            DraftCommands::Clear { json } => cmd_draft_clear(&book, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(book, port, &bind, api_key).await
        }
        Commands::Photo {
            input,
            output,
            json,
        } => cmd_photo(&input, output.as_deref(), json).await,
    }
}
