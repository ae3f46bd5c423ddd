use anyhow::{bail, Context, Result};
use modvault_lib::services::archive::BackendRegistry;
use modvault_lib::services::config::{ConfigStore, JsonConfigStore};
use modvault_lib::services::core::ModWorker;
use modvault_lib::services::mods::{BulkActionError, ModLifecycleManager};
use modvault_lib::types::ModRecord;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "modvault/config.json";

enum Command {
    Paths {
        active: PathBuf,
        backup: Option<PathBuf>,
    },
    Import {
        archive: PathBuf,
        category: String,
    },
    Enable(String),
    Disable(String),
    Delete(String),
    Rescan,
    List,
    Categories,
    CategoryAdd(String),
    CategoryRename(String, String),
    CategoryDelete(String),
    SetCategory(String, String),
    Rename(String, String),
    Preview(String, PathBuf),
    Help,
}

struct Invocation {
    config: PathBuf,
    command: Command,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse_args(&args)?;
    if matches!(invocation.command, Command::Help) {
        print_help();
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run(invocation))
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut rest: Vec<&str> = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => match iter.next() {
                Some(path) => config = PathBuf::from(path),
                None => bail!("--config requires a path"),
            },
            "--help" | "-h" => rest = vec!["help"],
            other => rest.push(other),
        }
    }

    let command = match rest.as_slice() {
        [] | ["help"] => Command::Help,
        ["paths", active] => Command::Paths {
            active: PathBuf::from(active),
            backup: None,
        },
        ["paths", active, backup] => Command::Paths {
            active: PathBuf::from(active),
            backup: Some(PathBuf::from(backup)),
        },
        ["import", archive] => Command::Import {
            archive: PathBuf::from(archive),
            category: String::new(),
        },
        ["import", archive, category] => Command::Import {
            archive: PathBuf::from(archive),
            category: category.to_string(),
        },
        ["enable", id] => Command::Enable(id.to_string()),
        ["disable", id] => Command::Disable(id.to_string()),
        ["delete", id] => Command::Delete(id.to_string()),
        ["rescan"] => Command::Rescan,
        ["list"] => Command::List,
        ["categories"] => Command::Categories,
        ["category-add", name] => Command::CategoryAdd(name.to_string()),
        ["category-rename", old, new] => Command::CategoryRename(old.to_string(), new.to_string()),
        ["category-delete", name] => Command::CategoryDelete(name.to_string()),
        ["set-category", id, category] => Command::SetCategory(id.to_string(), category.to_string()),
        ["rename", id, name] => Command::Rename(id.to_string(), name.to_string()),
        ["preview", id, image] => Command::Preview(id.to_string(), PathBuf::from(image)),
        [name, ..] => bail!("Unknown command or wrong arguments: {name} (see --help)"),
    };
    Ok(Invocation { config, command })
}

async fn run(invocation: Invocation) -> Result<()> {
    let store = Arc::new(JsonConfigStore::new(invocation.config.clone()));

    if let Command::Paths { active, backup } = &invocation.command {
        store
            .set_active_mods_path(active)
            .context("Failed to save active mods path")?;
        if let Some(backup) = backup {
            store
                .set_backup_path(backup)
                .context("Failed to save backup path")?;
        }
        println!("Active mods: {}", active.display());
        match store.get_backup_path() {
            Some(backup) => println!("Backup root: {}", backup.display()),
            None => println!("Backup root: (default under {})", store.data_dir().display()),
        }
        return Ok(());
    }

    let manager = Arc::new(ModLifecycleManager::new(
        store.clone(),
        BackendRegistry::discover(),
    ));
    let worker = ModWorker::new(manager);

    match invocation.command {
        Command::Import { archive, category } => {
            let result = worker
                .import(archive.clone(), category)
                .await
                .with_context(|| format!("Import of {} failed", archive.display()))?;
            for record in &result.mods {
                print_record(record);
            }
            for warning in &result.warnings {
                println!("warning: {warning}");
            }
            print_failures(&result.failures);
            println!(
                "Imported {} mod(s), {} failure(s)",
                result.mods.len(),
                result.failures.len()
            );
        }
        Command::Enable(id) => print_record(&worker.enable(id).await?),
        Command::Disable(id) => print_record(&worker.disable(id).await?),
        Command::Delete(id) => {
            worker.delete(id.clone()).await?;
            println!("Deleted {id}");
        }
        Command::Rescan => {
            let result = worker.rescan().await?;
            println!("added:    {}", result.added.join(", "));
            println!("updated:  {}", result.updated.join(", "));
            println!("disabled: {}", result.disabled.join(", "));
            println!("pruned:   {}", result.pruned.join(", "));
            println!("orphaned: {}", result.orphaned.join(", "));
            print_failures(&result.failures);
        }
        Command::List => {
            for record in worker.list() {
                print_record(&record);
            }
        }
        Command::Categories => {
            for category in worker.categories() {
                let marker = if category.is_default { " (default)" } else { "" };
                println!("{}{marker}", category.name);
            }
        }
        Command::CategoryAdd(name) => {
            let category = worker.add_category(name).await?;
            println!("Added category {}", category.name);
        }
        Command::CategoryRename(old, new) => {
            let category = worker.rename_category(old, new).await?;
            println!("Renamed category to {}", category.name);
        }
        Command::CategoryDelete(name) => {
            worker.delete_category(name.clone()).await?;
            println!("Deleted category {name}");
        }
        Command::SetCategory(id, category) => print_record(&worker.set_category(id, category).await?),
        Command::Rename(id, name) => print_record(&worker.rename(id, name).await?),
        Command::Preview(id, image) => print_record(&worker.set_preview(id, image).await?),
        Command::Paths { .. } | Command::Help => {}
    }

    store.flush().context("Failed to flush configuration")?;
    Ok(())
}

fn print_record(record: &ModRecord) {
    let state = if record.enabled { "on " } else { "off" };
    println!(
        "{state}  {:<24} {:<16} {} ({} files)",
        record.id,
        record.category,
        record.name,
        record.files.len()
    );
}

fn print_failures(failures: &[BulkActionError]) {
    for failure in failures {
        eprintln!("failed: {}: {}", failure.id, failure.error);
    }
}

fn print_help() {
    println!("modvault [--config <file>] <command>");
    println!();
    println!("  paths <active> [backup]         Set the active mods directory and backup root");
    println!("  import <archive> [category]     Import every MOD found in an archive");
    println!("  enable <id> | disable <id>      Toggle a MOD in the active directory");
    println!("  delete <id>                     Remove a MOD and its backup");
    println!("  rescan                          Reconcile records with the active directory");
    println!("  list                            List MOD records");
    println!("  categories                      List categories");
    println!("  category-add <name>             Add a category (parent/child allowed)");
    println!("  category-rename <old> <new>     Rename a category");
    println!("  category-delete <name>          Delete a category; members move to the default");
    println!("  set-category <id> <category>    Move a MOD to a category");
    println!("  rename <id> <name>              Change a MOD's display name");
    println!("  preview <id> <image>            Store a preview image for a MOD");
    println!();
    println!("Config defaults to {DEFAULT_CONFIG}. Log level follows RUST_LOG (default info).");
}
