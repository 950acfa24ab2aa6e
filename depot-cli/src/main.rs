/*!
Depot CLI - command-line access to Depot artifact repositories.

Reads, writes, lists and archives artifacts in a repository identified by a
URL such as `file:///srv/depot`.
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use depot_core::{for_url, observability, Repository};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "CLI for Depot artifact repositories")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Repository URL (file:///path or a plain directory)
    #[arg(
        short,
        long,
        global = true,
        env = "DEPOT_REPOSITORY",
        default_value = "./depot"
    )]
    repository: String,

    /// Print listings as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file from the repository
    Get {
        path: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a local file (or stdin with `-`) in the repository
    Put { path: String, file: PathBuf },
    /// List files directly under a path
    List {
        #[arg(default_value = "")]
        path: String,
    },
    /// List every file under a folder with its checksum
    LsRecursive {
        #[arg(default_value = "")]
        folder: String,
    },
    /// Find files with a given name under a folder
    Find { folder: String, filename: String },
    /// Delete a file or directory tree
    Delete {
        path: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Pack a local directory into a .tar.gz archive in the repository
    Pack {
        local_dir: PathBuf,
        archive: String,
        /// Only archive this sub-path of the directory
        #[arg(short, long)]
        include: Option<String>,
    },
    /// Extract an archive from the repository
    Unpack {
        archive: String,
        local_dir: PathBuf,
        /// Only extract this entry
        #[arg(short, long)]
        entry: Option<String>,
    },
    /// List the files inside an archive
    LsArchive { archive: String },
    /// Copy a local directory into the repository
    Push { local_dir: PathBuf, repo_dir: String },
    /// Copy a directory out of the repository
    Pull { repo_dir: String, local_dir: PathBuf },
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "MD5")]
    checksum: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json)?;

    let repository = for_url(&cli.repository)
        .with_context(|| format!("Failed to open repository {}", cli.repository))?;
    debug!(root = %repository.root_url(), "Opened repository");

    if let Err(e) = run(repository.as_ref(), cli.command, cli.json) {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<(), anyhow::Error> {
    let directive = if verbose { "debug" } else { "warn" };
    observability::init_observability_with_filter(json, Some(directive))?;
    Ok(())
}

fn run(repository: &dyn Repository, command: Commands, json: bool) -> Result<(), anyhow::Error> {
    match command {
        Commands::Get { path, output } => {
            let data = repository.get(&path)?;
            match output {
                Some(file) => std::fs::write(&file, data)
                    .with_context(|| format!("Failed to write {}", file.display()))?,
                None => io::stdout().write_all(&data)?,
            }
        }
        Commands::Put { path, file } => {
            let data = read_input(&file)?;
            repository.put(&path, &data)?;
            println!("✓ Stored {} bytes at {path}", data.len());
        }
        Commands::List { path } => print_paths(repository.list(&path)?, json)?,
        Commands::LsRecursive { folder } => {
            let mut rows = Vec::new();
            for entry in repository.list_recursive(&folder) {
                let entry = entry?;
                rows.push(FileRow {
                    path: entry.path,
                    checksum: entry.checksum.map(|c| c.to_hex()).unwrap_or_default(),
                });
            }
            print_rows(rows, json)?;
        }
        Commands::Find { folder, filename } => {
            let found = repository
                .match_filenames_recursive(&folder, &filename)
                .map(|entry| entry.map(|e| e.path))
                .collect::<Result<Vec<_>, _>>()?;
            print_paths(found, json)?;
        }
        Commands::Delete { path, force } => {
            if !force && !confirm(&format!("Are you sure you want to delete '{path}'?"))? {
                println!("Deletion cancelled");
                return Ok(());
            }
            repository.delete(&path)?;
            println!("✓ Deleted {path}");
        }
        Commands::Pack {
            local_dir,
            archive,
            include,
        } => {
            repository.put_archive(&local_dir, &archive, include.as_deref())?;
            println!("✓ Packed {} into {archive}", local_dir.display());
        }
        Commands::Unpack {
            archive,
            local_dir,
            entry,
        } => {
            match entry {
                Some(entry) => repository.get_archive_entry(&archive, &entry, &local_dir)?,
                None => repository.get_archive(&archive, &local_dir)?,
            }
            println!("✓ Extracted {archive} into {}", local_dir.display());
        }
        Commands::LsArchive { archive } => {
            print_paths(repository.list_archive_entries(&archive)?, json)?
        }
        Commands::Push {
            local_dir,
            repo_dir,
        } => {
            repository.put_directory(&local_dir, &repo_dir)?;
            println!("✓ Copied {} to {repo_dir}", local_dir.display());
        }
        Commands::Pull {
            repo_dir,
            local_dir,
        } => {
            repository.get_directory(&repo_dir, &local_dir)?;
            println!("✓ Copied {repo_dir} to {}", local_dir.display());
        }
    }
    Ok(())
}

fn read_input(file: &PathBuf) -> Result<Vec<u8>, anyhow::Error> {
    if file.as_os_str() == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        return Ok(data);
    }
    std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn confirm(prompt: &str) -> Result<bool, anyhow::Error> {
    print!("{prompt} (y/N): ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase().starts_with('y'))
}

fn print_paths(paths: Vec<String>, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else if paths.is_empty() {
        println!("No files found");
    } else {
        for path in paths {
            println!("{path}");
        }
    }
    Ok(())
}

fn print_rows(rows: Vec<FileRow>, json: bool) -> Result<(), anyhow::Error> {
    if json {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| serde_json::json!({ "path": row.path, "md5": row.checksum }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else if rows.is_empty() {
        println!("No files found");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}
