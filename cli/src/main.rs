use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use vsfs_core::layout::TOTAL_BLOCKS;
use vsfs_core::{FileBlockDevice, VsfsError};
use vsfs_filesystems::vsfs::{create_file, format, list_root, CreatePolicy};
use vsfs_filesystems::Journal;

#[derive(Parser)]
#[command(name = "journal")]
#[command(about = "Metadata journaling for VSFS disk images", long_about = None)]
struct Cli {
    /// Disk image to operate on
    #[arg(short, long, default_value = "vsfs.img", global = true)]
    image: PathBuf,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh, empty VSFS image
    Format,
    /// Journal the creation of a file in the root directory
    Create {
        /// Name of the new file
        filename: String,
        /// State the new metadata is computed against
        #[arg(long, value_enum, default_value_t = PolicyArg::Overlay)]
        policy: PolicyArg,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay committed transactions and empty the journal
    Install {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what the journal holds without changing it
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the root directory as installed on disk
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Build on committed but uninstalled transactions
    Overlay,
    /// Refuse while the journal holds records
    RequireEmpty,
}

impl From<PolicyArg> for CreatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Overlay => CreatePolicy::Overlay,
            PolicyArg::RequireEmpty => CreatePolicy::RequireEmpty,
        }
    }
}

/// Attach the failed step and failure class to a library error
fn phase<T>(result: Result<T, VsfsError>, step: &str) -> anyhow::Result<T> {
    result.map_err(|e| {
        let class = e.phase();
        anyhow::Error::new(e).context(format!("{} failed ({} error)", step, class))
    })
}

fn open_journal(image: &Path) -> anyhow::Result<Journal<FileBlockDevice>> {
    let device = FileBlockDevice::open(image)
        .with_context(|| format!("cannot open image {}", image.display()))?;
    phase(Journal::new(device), "open journal")
}

fn run(cli: Cli, out: &mut impl Write) -> anyhow::Result<()> {
    match cli.command {
        Commands::Format => {
            let mut device = FileBlockDevice::create(&cli.image, TOTAL_BLOCKS)
                .with_context(|| format!("cannot create image {}", cli.image.display()))?;
            phase(format(&mut device), "format")?;
            writeln!(out, "format: wrote {} ({} blocks)", cli.image.display(), TOTAL_BLOCKS)?;
        }
        Commands::Create {
            filename,
            policy,
            json,
        } => {
            let mut journal = open_journal(&cli.image)?;
            let report = phase(create_file(&mut journal, &filename, policy.into()), "create")?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                writeln!(out, "create: journaled metadata for '{}'", filename)?;
            }
        }
        Commands::Install { json } => {
            let mut journal = open_journal(&cli.image)?;
            let report = phase(journal.install(), "install")?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else if report.was_empty {
                writeln!(out, "install: journal empty")?;
            } else {
                if report.records_discarded > 0 {
                    writeln!(
                        out,
                        "install: discarded {} uncommitted record(s)",
                        report.records_discarded
                    )?;
                }
                writeln!(
                    out,
                    "install: replayed {} transaction(s), {} block(s); journal checkpointed",
                    report.transactions_replayed, report.blocks_written
                )?;
            }
        }
        Commands::Status { json } => {
            let mut journal = open_journal(&cli.image)?;
            let status = phase(journal.status(), "status")?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
            } else if !status.initialized {
                writeln!(out, "journal: not initialized")?;
            } else {
                writeln!(
                    out,
                    "journal: {} of {} bytes used ({} free)",
                    status.used_bytes, status.capacity_bytes, status.free_bytes
                )?;
                for (i, txn) in status.committed.iter().enumerate() {
                    writeln!(
                        out,
                        "  transaction {}: bytes {}..{}, blocks {:?}",
                        i, txn.start_offset, txn.end_offset, txn.home_blocks
                    )?;
                }
                if let Some(run) = &status.incomplete {
                    writeln!(
                        out,
                        "  incomplete: {} record(s) from byte {} (dropped by install)",
                        run.records, run.start_offset
                    )?;
                }
            }
        }
        Commands::List => {
            let mut device = FileBlockDevice::open(&cli.image)
                .with_context(|| format!("cannot open image {}", cli.image.display()))?;
            for entry in phase(list_root(&mut device), "list")? {
                writeln!(out, "{:>4}  {}", entry.inode, entry.name)?;
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}
