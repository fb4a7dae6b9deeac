use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde_json::Value;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use todostore::view::{self, SortType};
use todostore::{
    Config, OrderItem, OrderKind, Request, SharedStore, Store, StoreDocument, Todo, TodoFilter, TodoPatch, api,
};
use tracing::{Level, info};

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - categorized to-do list backed by a local JSON file")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the data file (default: per-user data directory)
    #[arg(short, long, global = true)]
    data_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the whole document as JSON
    Data,

    /// Replace the whole document with JSON read from a file ("-" for stdin)
    Save { file: PathBuf },

    /// Add a category, optionally under a root category
    AddCategory {
        name: String,
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Delete a category, its child categories and all their todos
    DeleteCategory { id: String },

    /// Rename a category
    RenameCategory { id: String, name: String },

    /// Add a todo to a category, or a sub-item under an existing todo.
    /// "all" or "completed" files it under the first category.
    AddTodo {
        category: TodoFilter,
        title: String,
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Change fields of a todo or sub-item
    UpdateTodo {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
        /// Due date as YYYY-MM-DD
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        order: Option<i64>,
    },

    /// Delete a todo or sub-item
    DeleteTodo { id: String },

    /// Move a todo to the end of another category
    MoveTodo { todo: String, category: String },

    /// Set sort positions: reorder <categories|todos> id=order...
    Reorder {
        kind: OrderKind,
        #[arg(required = true)]
        items: Vec<OrderItem>,
    },

    /// Print a category's id and the ids of its child categories
    Scope { category: String },

    /// Show the category tree with open counts
    Categories,

    /// Show todos: "all" (open), "completed", or a category id
    List {
        #[arg(long = "view", default_value = "all")]
        filter: TodoFilter,
        /// createdAt-desc, createdAt-asc, title, completed or custom
        #[arg(long, default_value = "custom")]
        sort: SortType,
    },

    /// Show open todos grouped by due date
    Agenda,

    /// Answer newline-delimited JSON requests on stdin
    Serve,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing; stdout is reserved for results
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let config = Config::resolve(cli.data_file)?;
    let mut store = Store::open(&config.data_file);

    let request = match cli.command {
        Commands::Data => Request::GetData,
        Commands::Save { file } => Request::SaveData {
            data: read_document(&file)?,
        },
        Commands::AddCategory { name, parent } => Request::AddCategory { name, parent_id: parent },
        Commands::DeleteCategory { id } => Request::DeleteCategory { id },
        Commands::RenameCategory { id, name } => Request::UpdateCategory { id, name },
        Commands::AddTodo {
            category,
            title,
            parent,
        } => {
            if category.is_smart() && parent.is_none() {
                info!(list = %category, "Adding from a smart list, using the first category");
            }
            Request::AddTodo {
                category_id: category
                    .target_category(store.document())
                    .unwrap_or_default()
                    .to_string(),
                title,
                parent_id: parent,
            }
        }
        Commands::UpdateTodo {
            id,
            title,
            completed,
            due,
            clear_due,
            order,
        } => {
            let updates = TodoPatch {
                title,
                completed,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
                order,
                category_id: None,
            };
            if updates.is_empty() {
                return Err(eyre!("Nothing to update; pass at least one field"));
            }
            Request::UpdateTodo { id, updates }
        }
        Commands::DeleteTodo { id } => Request::DeleteTodo { id },
        Commands::MoveTodo { todo, category } => Request::MoveTodoToCategory {
            todo_id: todo,
            new_category_id: category,
        },
        Commands::Reorder { kind, items } => Request::UpdateOrder { kind, items },
        Commands::Scope { category } => Request::GetCategoryWithChildrenIds { category_id: category },
        Commands::Categories => {
            print_categories(store.document());
            return Ok(());
        }
        Commands::List { filter, sort } => {
            print_list(store.document(), &filter, sort);
            return Ok(());
        }
        Commands::Agenda => {
            print_agenda(store.document(), Local::now().date_naive());
            return Ok(());
        }
        Commands::Serve => return serve(SharedStore::new(store)),
    };

    let method = request.method();
    let result = api::dispatch(&mut store, request);
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result {
        Value::Bool(false) | Value::Null => Err(eyre!("{} failed", method)),
        _ => Ok(()),
    }
}

fn read_document(file: &Path) -> Result<StoreDocument> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
        buf
    } else {
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?
    };
    serde_json::from_str(&content).context("Input is not a valid store document")
}

fn serve(store: SharedStore) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = store.with(|store| api::handle_line(store, &line));
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_categories(doc: &StoreDocument) {
    let counts = view::todo_counts(doc);
    let count_of = |id: &str| counts.per_category.get(id).copied().unwrap_or(0);

    println!("{} {}", "All".bold(), counts.open.to_string().cyan());
    println!("{} {}", "Completed".bold(), counts.completed.to_string().cyan());
    println!();

    for node in view::category_tree(doc) {
        println!(
            "{} {} {}",
            node.category.name.bold(),
            count_of(&node.category.id).to_string().cyan(),
            node.category.id.dimmed()
        );
        for child in node.children {
            println!(
                "  {} {} {}",
                child.name,
                count_of(&child.id).to_string().cyan(),
                child.id.dimmed()
            );
        }
    }
}

fn print_list(doc: &StoreDocument, filter: &TodoFilter, sort: SortType) {
    let heading = match filter {
        TodoFilter::All => "All open".to_string(),
        TodoFilter::Completed => "Completed".to_string(),
        TodoFilter::Category(id) => doc.category(id).map(|c| c.name.clone()).unwrap_or_else(|| id.clone()),
    };
    println!("{} ({})", heading.bold(), sort);

    let todos = view::sort_todos(filter.apply(doc), sort);
    if todos.is_empty() {
        println!("  {}", "nothing here".dimmed());
        return;
    }
    for todo in todos {
        print_todo(todo);
    }
}

fn print_todo(todo: &Todo) {
    let due = todo
        .due_date
        .map(|d| format!(" due {}", d).yellow().to_string())
        .unwrap_or_default();
    println!(
        "  {} {}{} {}",
        checkbox(todo.completed),
        title(&todo.title, todo.completed),
        due,
        todo.id.dimmed()
    );

    let mut children: Vec<_> = todo.children.iter().collect();
    children.sort_by_key(|s| s.order);
    for sub in children {
        println!(
            "      {} {} {}",
            checkbox(sub.completed),
            title(&sub.title, sub.completed),
            sub.id.dimmed()
        );
    }
}

fn checkbox(completed: bool) -> colored::ColoredString {
    if completed { "[x]".green() } else { "[ ]".normal() }
}

fn title(text: &str, completed: bool) -> colored::ColoredString {
    if completed {
        text.strikethrough().dimmed()
    } else {
        text.normal()
    }
}

fn print_agenda(doc: &StoreDocument, today: NaiveDate) {
    let agenda = view::agenda(doc, today);
    if agenda.is_empty() {
        println!("{}", "No open todos".dimmed());
        return;
    }

    let section = |name: colored::ColoredString, todos: &[&Todo]| {
        if todos.is_empty() {
            return;
        }
        println!("{}", name);
        for todo in todos {
            print_todo(todo);
        }
    };

    section("Overdue".red().bold(), &agenda.overdue);
    section("Today".green().bold(), &agenda.today);
    for (date, todos) in &agenda.upcoming {
        section(date.format("%a %Y-%m-%d").to_string().bold(), todos);
    }
    section("No due date".bold(), &agenda.undated);
}
