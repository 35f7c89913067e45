use anyhow::Context;
use clap::{Parser, Subcommand};
use statekeep_persist::{Backend, FileBackend};
use statekeep_store::{Binding, Runtime, SetOption, StateError};
use statekeep_tools::StoreInspector;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statekeep-cli", about = "CLI tool for statekeep operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding the persisted rows
    #[arg(long, default_value = ".statekeep")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and backend info
    Info,
    /// Store a string value
    Set {
        key: String,
        value: String,
        /// Write the value through to the data directory
        #[arg(long)]
        persist: bool,
        /// Seal the persisted value (implies --persist)
        #[arg(long)]
        encrypt: bool,
        /// Expire the value after this many seconds
        #[arg(long)]
        expires_in: Option<u64>,
    },
    /// Print a persisted string value
    Get { key: String },
    /// Delete a value
    Del { key: String },
    /// Evict expired values from the data directory
    Sweep,
    /// Summarize every persisted value
    Inspect,
    /// Walk through the observer lifecycle on an in-memory store
    Demo,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let rt = open(&cli.data_dir)?;
            let backend = rt.store().backend();
            println!("statekeep-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "data: {} (schema v{})",
                backend.root().display(),
                backend.meta().schema_version
            );
            println!("rows: {}", backend.len());
            println!("identity row: {}", rt.store().config().identity_key);
        }
        Commands::Set {
            key,
            value,
            persist,
            encrypt,
            expires_in,
        } => {
            let mut options = Vec::new();
            if persist {
                options.push(SetOption::Persist);
            }
            if encrypt {
                options.push(SetOption::Encrypt);
            }
            if let Some(secs) = expires_in {
                options.push(SetOption::ExpiresIn(Duration::from_secs(secs)));
            }
            let mut rt = open(&cli.data_dir)?;
            rt.store_mut()
                .try_set_with(&key, value, &options)
                .with_context(|| format!("persisting {key}"))?;
            if options.is_empty() {
                println!("{key} set in memory only; it will not outlive this process");
            } else {
                println!("{key} set");
            }
        }
        Commands::Get { key } => {
            let mut rt = open(&cli.data_dir)?;
            let mut value = String::new();
            match rt.store_mut().try_get(&key, &mut value) {
                Ok(()) => println!("{value}"),
                Err(StateError::NotFound) => println!("{key}: not found"),
                Err(StateError::Expired) => println!("{key}: expired"),
                Err(e) => return Err(e).with_context(|| format!("reading {key}")),
            }
        }
        Commands::Del { key } => {
            let mut rt = open(&cli.data_dir)?;
            rt.store_mut().del(&key);
            println!("{key} deleted");
        }
        Commands::Sweep => {
            let mut rt = open(&cli.data_dir)?;
            let (loaded, expired) = load_all(&mut rt);
            let cycle = rt.consume();
            println!(
                "Sweep: loaded={loaded} expired={} rows={}",
                expired + cycle.sweep.entries_expired,
                rt.store().backend().len()
            );
        }
        Commands::Inspect => {
            let mut rt = open(&cli.data_dir)?;
            load_all(&mut rt);
            println!("{}", StoreInspector::summary(rt.store()));
            for key in StoreInspector::list_keys(rt.store()) {
                if let Some(info) = StoreInspector::inspect_key(rt.store(), &key) {
                    println!("  {info}");
                }
            }
        }
        Commands::Demo => demo()?,
    }

    Ok(())
}

fn open(data_dir: &Path) -> anyhow::Result<Runtime<FileBackend>> {
    let backend = FileBackend::open(data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    Ok(Runtime::new(backend))
}

/// Pull every persisted row into memory as a string. Expired rows are evicted
/// on the way. Returns (loaded, expired).
fn load_all<B: Backend>(rt: &mut Runtime<B>) -> (usize, usize) {
    let identity = rt.store().config().identity_key.clone();
    let keys = rt.store().backend().keys();
    let (mut loaded, mut expired) = (0, 0);
    for key in keys.iter().filter(|k| **k != identity) {
        let mut value = String::new();
        match rt.store_mut().try_get(key, &mut value) {
            Ok(()) => loaded += 1,
            Err(StateError::Expired) => expired += 1,
            Err(e) => tracing::warn!(key = %key, error = %e, "row skipped"),
        }
    }
    (loaded, expired)
}

fn demo() -> anyhow::Result<()> {
    println!("Observer demo: one page, one counter");

    let mut rt = Runtime::in_memory();
    let page = rt.mount_root("page");
    let badge = rt.tree().borrow_mut().mount_child(page, "badge")?;

    let title = Binding::new(String::new());
    let count = Binding::new(0u32);
    rt.store_mut().set("/title", "inbox".to_string());
    rt.store_mut().observe("/title", page).value(&title);
    rt.store_mut().observe("/unread", badge).value(&count);
    println!("Observed: title={:?} unread={}", title.get(), count.get());

    rt.store_mut().set("/unread", 3u32);
    let cycle = rt.consume();
    println!(
        "Update pass: tick={} updated={} events={} unread={}",
        cycle.tick,
        cycle.updated.len(),
        cycle.events.len(),
        count.get()
    );

    rt.tree().borrow_mut().dismount(badge);
    rt.store_mut().set("/unread", 4u32);
    let cycle = rt.consume();
    println!(
        "After dismount: unread={} observers_removed={} live_observers={}",
        count.get(),
        cycle.sweep.observers_removed,
        rt.store().observer_count("/unread")
    );
    println!("{}", StoreInspector::summary(rt.store()));
    Ok(())
}
