use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use teamboard::board::{Board, BoardController, LocalTaskStore, NoticeLevel};
use teamboard::config::Config;
use teamboard::db::{AppState, queries};
use teamboard::handlers;
use teamboard::models::{CreateUser, TaskStatus, User};

#[derive(Parser)]
#[command(name = "teamboard", version, about = "Project collaboration backend with a Kanban task board")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user and print their first API key
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Print the task board visible to a user
    Board {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        project: Option<String>,
    },
    /// Move a task to another status column
    Move {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        task: String,
        /// pending, todo, in_progress or completed
        #[arg(long)]
        status: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let state = teamboard::build_state(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, state).await,
        Command::CreateUser { email, name } => create_user(&state, email, name),
        Command::Board { api_key, project } => show_board(&state, &api_key, project).await,
        Command::Move {
            api_key,
            task,
            status,
        } => move_task(&state, &api_key, &task, &status).await,
    }
}

async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = handlers::app(state).layer(cors_layer(config));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("teamboard listening on {}", addr);
    if config.dev_mode {
        tracing::info!("development mode enabled");
    }

    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if !config.cors_origins.is_empty() {
        let origins = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else if config.dev_mode {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

fn create_user(state: &AppState, email: String, name: String) -> anyhow::Result<()> {
    let input = CreateUser { email, name };
    input.validate()?;

    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input)?;
    let (_key, api_key) = queries::create_api_key(&conn, &user.id)?;

    println!("Created user {} <{}>", user.name, user.email);
    println!("User ID: {}", user.id);
    println!("API key (shown once): {}", api_key);
    Ok(())
}

fn user_for_key(state: &AppState, api_key: &str) -> anyhow::Result<User> {
    let conn = state.db.get()?;
    match queries::get_user_by_api_key(&conn, api_key)? {
        Some((user, _key)) => Ok(user),
        None => bail!("unknown API key"),
    }
}

async fn show_board(state: &AppState, api_key: &str, project: Option<String>) -> anyhow::Result<()> {
    let user = user_for_key(state, api_key)?;
    let store = LocalTaskStore::new(state.db.clone(), user.id, state.events.clone());
    let mut controller = BoardController::new(store, project);

    controller.load().await;
    print_notices(&mut controller);
    print_board(controller.board());
    Ok(())
}

async fn move_task(state: &AppState, api_key: &str, task_id: &str, status: &str) -> anyhow::Result<()> {
    let status: TaskStatus = status
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown status '{}'", status))?;

    let user = user_for_key(state, api_key)?;
    let store = LocalTaskStore::new(state.db.clone(), user.id, state.events.clone());
    let mut controller = BoardController::new(store, None);

    if !controller.load().await {
        print_notices(&mut controller);
        bail!("could not load board");
    }
    let moved = controller.change_status(task_id, status).await;
    print_notices(&mut controller);
    print_board(controller.board());

    if !moved {
        bail!("task status was not changed");
    }
    Ok(())
}

fn print_notices(controller: &mut BoardController<LocalTaskStore>) {
    for notice in controller.take_notices() {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Info => println!("{}", notice.message),
        }
    }
}

fn print_board(board: &Board) {
    for column in board.columns() {
        println!("== {} ({})", column.status.as_ref(), column.tasks.len());
        for task in &column.tasks {
            println!("  [{}] {} ({})", task.id, task.title, task.priority.as_ref());
        }
    }
}
