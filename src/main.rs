use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nested_todos::config::{Backend, Config};
use nested_todos::engine::{Engine, EngineEvent};
use nested_todos::models::{Position, TodoId};
use nested_todos::tree::{transfer, Command};
use nested_todos::tree_render::{render_summary, render_tree};
use nested_todos::{api, db};

const DEFAULT_PORT: u16 = 3001;

#[derive(Parser)]
#[command(name = "ntd")]
#[command(about = "Nested todo lists, kept locally or on a list server")]
struct Cli {
    /// Use the local store regardless of configuration
    #[arg(long, global = true, conflicts_with = "remote")]
    local: bool,

    /// Use the list server regardless of configuration
    #[arg(long, global = true)]
    remote: bool,

    /// List server base URL (implies --remote)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the list server
    Serve {
        /// Port for the HTTP API (defaults to $PORT, then 3001)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print a list as a tree
    Show {
        list: String,
        /// Append each todo's id
        #[arg(long)]
        ids: bool,
    },
    /// Add a todo at the end of a list, or at the end of a parent's children
    Add {
        list: String,
        text: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Insert a todo directly after a sibling
    AddAfter {
        list: String,
        after: String,
        #[arg(default_value = "")]
        text: String,
    },
    /// Replace a todo's text
    Edit { list: String, id: String, text: String },
    /// Flip a todo together with everything below it
    Toggle { list: String, id: String },
    /// Mark several todos done, or open with --open
    Set {
        list: String,
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        open: bool,
    },
    /// Delete a todo and its subtree
    Rm { list: String, id: String },
    /// Move a todo before, after or inside another
    Mv {
        list: String,
        dragged: String,
        target: String,
        #[arg(long, default_value = "after")]
        position: Position,
    },
    /// Make a todo the last child of its previous sibling
    Indent { list: String, id: String },
    /// Move a todo out to sit right after its parent
    Outdent { list: String, id: String },
    /// Mark every todo done
    CheckAll { list: String },
    /// Mark every todo open
    UncheckAll { list: String },
    /// Write a list to a JSON file (`-` for stdout)
    Export {
        list: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace a list with the contents of a JSON export
    Import { list: String, file: PathBuf },
    /// Show the known lists
    Lists,
    /// Delete a whole list
    DeleteList { list: String },
}

/// Initialize tracing. The server logs to stdout; other commands keep stdout
/// for their output and log to stderr.
fn init_tracing(serving: bool) {
    let default = if serving {
        "nested_todos=info,tower_http=debug"
    } else {
        "nested_todos=warn"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
    );

    if serving {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

impl Cli {
    /// Config file and environment, then command-line flags on top.
    fn config(&self) -> Config {
        let mut config = Config::load();
        if let Some(url) = &self.url {
            config.remote_url = Some(url.clone());
            config.backend = Backend::Remote;
        }
        if self.remote {
            config.backend = Backend::Remote;
        }
        if self.local {
            config.backend = Backend::Local;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));
    let config = cli.config();

    let (list, command) = match cli.command {
        Commands::Serve { port, host, db } => return serve(port, &host, db).await,
        Commands::Lists => return show_lists(&config).await,
        Commands::DeleteList { list } => return delete_list(&config, &list).await,
        Commands::Show { list, ids } => {
            let engine = open(&config, &list).await?;
            let todos = engine.todos();
            print!("{}", render_tree(&todos, ids));
            if let Some(summary) = render_summary(&todos) {
                println!("\n{}", summary);
            }
            return Ok(());
        }
        Commands::Export { list, out } => return export(&config, &list, out).await,
        Commands::Import { list, file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let tree = transfer::import_json(&content)
                .with_context(|| format!("{} is not a todo export", file.display()))?;
            (list, Command::Replace(tree))
        }
        Commands::Add { list, text, parent } => (
            list,
            Command::Add {
                parent: parent.map(TodoId::from),
                text,
            },
        ),
        Commands::AddAfter { list, after, text } => (
            list,
            Command::AddAfter {
                after: after.into(),
                text,
            },
        ),
        Commands::Edit { list, id, text } => (list, Command::Update { id: id.into(), text }),
        Commands::Toggle { list, id } => (list, Command::Toggle { id: id.into() }),
        Commands::Set { list, ids, open } => (
            list,
            Command::ToggleMany {
                ids: ids.into_iter().map(TodoId::from).collect(),
                completed: !open,
            },
        ),
        Commands::Rm { list, id } => (list, Command::Delete { id: id.into() }),
        Commands::Mv {
            list,
            dragged,
            target,
            position,
        } => (
            list,
            Command::Move {
                dragged: dragged.into(),
                target: target.into(),
                position,
            },
        ),
        Commands::Indent { list, id } => (list, Command::Indent { id: id.into() }),
        Commands::Outdent { list, id } => (list, Command::Outdent { id: id.into() }),
        Commands::CheckAll { list } => (list, Command::CheckAll),
        Commands::UncheckAll { list } => (list, Command::UncheckAll),
    };

    edit(&config, &list, command).await
}

async fn serve(port: Option<u16>, host: &str, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let port = match port {
        Some(port) => port,
        None => match std::env::var("PORT") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", value))?,
            Err(_) => DEFAULT_PORT,
        },
    };

    let db = match db_path {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("List server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn open(config: &Config, list_id: &str) -> anyhow::Result<Engine> {
    let store = config.build_store()?;
    let engine = Engine::new(store);
    engine.open(list_id).await;
    Ok(engine)
}

/// Apply one command to a list, wait for its save, and print the result.
async fn edit(config: &Config, list_id: &str, command: Command) -> anyhow::Result<()> {
    let engine = open(config, list_id).await?;
    let mut events = engine.subscribe();

    let name = command.name();
    let outcome = engine.apply(command);
    if !outcome.changed {
        bail!("{}: nothing changed (check the ids with `ntd show {} --ids`)", name, list_id);
    }
    engine.flush().await;

    loop {
        match events.try_recv() {
            Ok(EngineEvent::SaveFailed { error, .. }) => bail!("Failed to save {}: {}", list_id, error),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    if let Some(id) = &outcome.created {
        println!("{}", id);
    }
    print!("{}", render_tree(&engine.todos(), true));
    Ok(())
}

async fn export(config: &Config, list_id: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let engine = open(config, list_id).await?;
    let json = engine.export_json()?;

    let out = out.unwrap_or_else(|| {
        PathBuf::from(transfer::export_file_name(
            chrono::Local::now().date_naive(),
        ))
    });
    if out.as_os_str() == "-" {
        println!("{}", json);
        return Ok(());
    }

    std::fs::write(&out, json).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Exported {} to {}", list_id, out.display());
    Ok(())
}

async fn show_lists(config: &Config) -> anyhow::Result<()> {
    match config.backend {
        Backend::Local => {
            for list_id in config.local_store()?.list_ids().await? {
                println!("{}", list_id);
            }
        }
        Backend::Remote => {
            for summary in config.remote_store()?.list_summaries().await? {
                println!(
                    "{}  {}",
                    summary.list_id,
                    summary.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}

async fn delete_list(config: &Config, list_id: &str) -> anyhow::Result<()> {
    match config.backend {
        Backend::Local => {
            if !config.local_store()?.delete_list(list_id).await? {
                println!("No list named {}", list_id);
                return Ok(());
            }
        }
        Backend::Remote => config.remote_store()?.delete_list(list_id).await?,
    }
    println!("Deleted {}", list_id);
    Ok(())
}
