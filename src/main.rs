//! Timevault - CLI
//!
//! Every command unlocks the vault, acts, and locks it again.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timevault::{crypto, Task, TaskDuration, TaskUpdate, VaultConfig, VaultSession};

#[derive(Parser)]
#[command(name = "timevault")]
#[command(version = timevault::VERSION)]
#[command(about = "Timevault - local, password-encrypted time tracker")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the encrypted vault (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Vault password; prompted for when absent
    #[arg(long, env = "TIMEVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new task now
    Add {
        title: String,
    },

    /// List tasks
    List {
        /// Only tasks of this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Stop the clock on a task
    Complete {
        id: String,
    },

    /// Delete a task
    Delete {
        id: String,
    },

    /// Edit title or booked duration
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        hours: Option<u32>,

        #[arg(long, default_value_t = 0)]
        minutes: u32,
    },

    /// Manage sub-tasks
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Book open tasks from earlier days as one hour
    FixHistory,

    /// Change the vault password
    Passwd,

    /// Delete all stored tasks
    Reset {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },

    /// Show where the vault lives and whether it exists
    Status,
}

#[derive(Subcommand)]
enum SubtaskAction {
    Add { task_id: String, title: String },
    Delete { task_id: String, sub_task_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(VaultConfig::default_path);
    let mut config = VaultConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }

    init_logging(&config.log_filter);

    // Refuse to run at all rather than fall back to plaintext
    crypto::self_check().context("cryptographic primitives unavailable")?;

    let mut vault = VaultSession::open(&config)
        .with_context(|| format!("opening vault at {}", config.data_dir.display()))?;

    match cli.command {
        Commands::Status => {
            println!("Vault directory: {}", config.data_dir.display());
            println!("Storage key:     {}", config.storage_key);
            if vault.has_stored_vault()? {
                println!("State:           encrypted vault present");
            } else {
                println!("State:           empty (first unlock sets the password)");
            }
            return Ok(());
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to reset without --yes");
            }
            vault.reset_vault()?;
            println!("Vault reset. The next password you enter becomes the vault password.");
            return Ok(());
        }
        _ => {}
    }

    let password = read_password(cli.password, "Vault password: ")?;
    if !vault.unlock_vault(&password).await {
        bail!("wrong password or unreadable vault");
    }

    let result = execute(&mut vault, cli.command).await;
    vault.lock_vault();
    result
}

async fn execute(vault: &mut VaultSession, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Add { title } => {
            let id = vault.add_task(&title).await?;
            println!("Started: {} ({})", title, id);
        }

        Commands::List { date } => {
            let tasks: Vec<&Task> = match date.as_deref() {
                Some(day) => vault.task_list().for_date(day),
                None => vault.tasks().iter().collect(),
            };

            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in tasks {
                print_task(task);
            }
        }

        Commands::Complete { id } => {
            let duration = vault.complete_task(&id).await?;
            println!("Completed {} after {}", id, duration);
        }

        Commands::Delete { id } => {
            vault.delete_task(&id).await?;
            println!("Deleted {}", id);
        }

        Commands::Edit { id, title, hours, minutes } => {
            let update = TaskUpdate {
                title,
                duration: hours.map(|h| TaskDuration::new(h, minutes)),
                ..Default::default()
            };
            vault.update_task(&id, update).await?;
            println!("Updated {}", id);
        }

        Commands::Subtask { action } => match action {
            SubtaskAction::Add { task_id, title } => {
                let id = vault.add_sub_task(&task_id, &title).await?;
                println!("Added sub-task {}", id);
            }
            SubtaskAction::Delete { task_id, sub_task_id } => {
                vault.delete_sub_task(&task_id, &sub_task_id).await?;
                println!("Deleted sub-task {}", sub_task_id);
            }
        },

        Commands::FixHistory => {
            let changed = vault.auto_correct_history().await?;
            println!("Corrected {} task(s)", changed);
        }

        Commands::Passwd => {
            let current = read_password(None, "Current password: ")?;
            let new_password = read_password(None, "New password: ")?;
            let confirm = read_password(None, "Repeat new password: ")?;
            if new_password != confirm {
                bail!("passwords do not match");
            }
            if !vault.change_password(&current, &new_password).await? {
                bail!("current password is wrong");
            }
            println!("Password changed");
        }

        // Handled before unlock
        Commands::Status | Commands::Reset { .. } => {}
    }

    Ok(())
}

fn print_task(task: &Task) {
    let duration = task
        .duration
        .map(|d| d.to_string())
        .unwrap_or_else(|| "running".to_string());

    println!("{}  {}  {:<10}  {}", task.date, task.id, duration, task.title);
    for sub in &task.sub_tasks {
        println!("    - {} ({})", sub.title, sub.id);
    }
}

fn read_password(given: Option<String>, prompt: &str) -> anyhow::Result<String> {
    let password = match given {
        Some(p) => p,
        None => rpassword::prompt_password(prompt).context("reading password")?,
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env("TIMEVAULT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
