//! Command-line client for a shared task board.
//!
//! Loads the board from the CRUD backend, applies one command, and prints
//! the result. With a hub URL configured, changes are announced to other
//! users and their changes show up as notices (`taskboard watch`).
//!
//! ```bash
//! taskboard --email ana@example.com board
//! taskboard --email ana@example.com --hub-url ws://127.0.0.1:9000/ws \
//!     move 65f1c0 "In Progress" --index 0
//! TASKBOARD_EMAIL=ana@example.com taskboard list --status completed --sort due-date
//! ```

use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskboard::board::{BoardView, DragSource, DropTarget};
use taskboard::config::{CliArgs, ClientConfig, Command};
use taskboard::crud::http::HttpCrudClient;
use taskboard::dashboard::Dashboard;
use taskboard::notice::{Notice, NoticeId, NoticeLevel, NoticeQueue};
use taskboard::notify::NotificationBus;
use taskboard::notify::hub::HubBus;
use taskboard::notify::listener::render;
use taskboard::notify::memory::MemoryHub;
use taskboard::store::TaskStore;
use taskboard::view::ListQuery;
use taskboard_proto::task::{Task, TaskId, TaskStatus, due_date};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    let command = cli.command.clone().unwrap_or(Command::Board);

    tracing::info!(api = %config.api_url, hub = ?config.hub_url, "taskboard starting");
    let result = connect_and_run(&config, command).await;
    tracing::info!("taskboard exiting");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to `file_path` when given, else stderr.
///
/// The returned guard must live until shutdown so buffered lines are
/// flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((dir, name)) = file_path.and_then(|p| Some((p.parent()?, p.file_name()?))) else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Picks the notification bus, then runs `command` against it.
///
/// An unreachable hub is not fatal: the client continues with a private
/// in-process bus and nobody else is notified.
async fn connect_and_run(config: &ClientConfig, command: Command) -> Result<(), BoxError> {
    let session = config.to_session();
    let user_name = session
        .as_ref()
        .map_or_else(String::new, |s| s.display_name().to_string());

    if let Some(url) = &config.hub_url {
        match HubBus::connect(url, &user_name, config.hub_timeouts()).await {
            Ok(bus) => {
                let scope = config.scope();
                bus.join(scope.clone()).await?;
                let bus = bus.with_default_scope(scope);
                return run(config, command, Arc::new(bus)).await;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "hub unavailable, notifications disabled");
                eprintln!("Notification hub unavailable ({e}); continuing without live updates");
            }
        }
    }

    let hub = MemoryHub::new();
    run(config, command, Arc::new(hub.connect())).await
}

async fn run<B: NotificationBus + 'static>(
    config: &ClientConfig,
    command: Command,
    bus: Arc<B>,
) -> Result<(), BoxError> {
    let crud = HttpCrudClient::new(&config.api_url, config.request_timeout)?;
    let notices = NoticeQueue::shared(config.notice_limit, config.notice_duration);
    let dashboard = Dashboard::new(
        crud,
        bus,
        TaskStore::shared(),
        notices,
        config.to_session(),
        config.gateway_options(),
    );

    let mut seen = HashSet::new();
    let outcome = match dashboard.mount().await {
        Ok(_) => execute(&dashboard, command, &mut seen).await,
        Err(e) => Err(e.into()),
    };
    print_new_notices(&dashboard.notices(), &mut seen);
    dashboard.unmount().await;
    outcome
}

async fn execute<C, B>(
    dashboard: &Dashboard<C, B>,
    command: Command,
    seen: &mut HashSet<NoticeId>,
) -> Result<(), BoxError>
where
    C: taskboard::crud::CrudClient + 'static,
    B: NotificationBus + 'static,
{
    match command {
        Command::Board => print_board(&dashboard.board()),
        Command::List {
            status,
            priority,
            sort,
            order,
        } => {
            let query = ListQuery {
                status,
                priority,
                sort,
                order,
            };
            print_list(&dashboard.list(&query));
        }
        Command::Add {
            title,
            due,
            description,
            priority,
            status,
        } => {
            let due = due_date::parse(&due)?;
            dashboard.open_new();
            dashboard.edit(|t| {
                t.title = title;
                t.description = description;
                t.priority = priority;
                t.status = status;
                t.due_date = due;
            });
            if let Some(task) = dashboard.submit().await? {
                println!("created {}", task.id);
            }
        }
        Command::Move { id, to, index } => {
            let id = TaskId::new(id);
            let source = locate(&dashboard.board(), &id)
                .ok_or_else(|| format!("no task with id {id}"))?;
            let index = index.unwrap_or(usize::MAX);
            dashboard.begin_drag(source)?;
            let result = dashboard.drop_card(Some(DropTarget { column: to, index }))?;
            if let Some(save) = result.persistence {
                save.await??;
            }
            print_board(&dashboard.board());
        }
        Command::Status { id, status } => {
            let task = dashboard.set_status(&TaskId::new(id), status).await?;
            println!("{} is now {}", task.id, task.status);
        }
        Command::Delete { id } => {
            dashboard.request_delete(TaskId::new(id));
            if let Some(id) = dashboard.confirm_delete().await? {
                println!("deleted {id}");
            }
        }
        Command::Watch => watch(dashboard, seen).await,
    }
    Ok(())
}

/// Prints every remote change until Ctrl-C.
///
/// Reads the notification feed rather than the notice queue, which only
/// keeps the newest few notices.
async fn watch<C, B>(dashboard: &Dashboard<C, B>, seen: &mut HashSet<NoticeId>)
where
    C: taskboard::crud::CrudClient + 'static,
    B: NotificationBus + 'static,
{
    print_board(&dashboard.board());
    println!("Watching for changes, Ctrl-C to stop.");
    let mut feed = dashboard.feed();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = feed.recv() => match next {
                Some(notification) => {
                    let (title, description) = render(&notification);
                    print_line("info", &title, description.as_deref());
                }
                None => break,
            },
        }
    }
    dashboard.close_feed(feed);
    // Already printed from the feed.
    seen.extend(dashboard.notices().iter().map(|n| n.id));
}

/// Current column and index of `id` on the board.
fn locate(board: &BoardView, id: &TaskId) -> Option<DragSource> {
    board.columns.iter().find_map(|column| {
        let index = column.tasks.iter().position(|t| &t.id == id)?;
        Some(DragSource {
            column: column.status,
            index,
            task_id: id.clone(),
        })
    })
}

fn print_board(board: &BoardView) {
    for column in &board.columns {
        println!("== {} ({}) ==", column.status, column.tasks.len());
        for task in &column.tasks {
            print_task(task);
        }
    }
}

fn print_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
    }
    for task in tasks {
        print_task(task);
    }
}

fn print_task(task: &Task) {
    let due = task
        .due_date
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string());
    let marker = if task.status == TaskStatus::Completed { "x" } else { " " };
    println!(
        "  [{marker}] {:<28} {:<6} due {due}  {}",
        task.title,
        task.priority.label(),
        task.id
    );
}

fn print_new_notices(notices: &[Notice], seen: &mut HashSet<NoticeId>) {
    for notice in notices.iter().rev() {
        if !seen.insert(notice.id) {
            continue;
        }
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        print_line(tag, &notice.title, notice.description.as_deref());
    }
}

fn print_line(tag: &str, title: &str, description: Option<&str>) {
    match description {
        Some(d) => println!("[{tag}] {title}: {d}"),
        None => println!("[{tag}] {title}"),
    }
}
