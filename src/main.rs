use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neurodex::{Category, FilterValue, Project};

#[derive(Parser)]
#[command(name = "neurodex", version, about = "Index and filter hierarchical neuroimaging projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of the project
    Summary {
        /// Project root directory
        path: PathBuf,
    },
    /// List the absolute paths of the filtered view
    List {
        /// Project root directory
        path: PathBuf,
        /// Hierarchical filter values (subject, session, pipeline, step, ...)
        filters: Vec<String>,
        /// Data class to query (Data, Processing, Results, or 0..2)
        #[arg(long)]
        dataclass: Option<String>,
        /// Keep only filenames containing this tag
        #[arg(long)]
        file_tag: Option<String>,
        /// Drop filenames containing this tag
        #[arg(long)]
        ignore: Option<String>,
        /// Extension allow-list override (repeatable)
        #[arg(long)]
        ext: Vec<String>,
        /// Force a rescan instead of trusting the cache
        #[arg(long)]
        rescan: bool,
    },
    /// Rescan every category and rewrite the cache artifacts
    Scan {
        /// Project root directory
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Summary { path } => {
            let project = Project::open(path);
            println!("{project}");
        }
        Command::List {
            path,
            filters,
            dataclass,
            file_tag,
            ignore,
            ext,
            rescan,
        } => {
            let mut project = Project::open(path);
            if rescan {
                project.reload();
            }
            let mut kwargs: Vec<(&str, FilterValue)> = Vec::new();
            if let Some(dc) = &dataclass {
                kwargs.push(("dataclass", FilterValue::from(dc.clone())));
            }
            if let Some(tag) = &file_tag {
                kwargs.push(("file_tag", FilterValue::from(tag.clone())));
            }
            if let Some(tag) = &ignore {
                kwargs.push(("ignore", FilterValue::from(tag.clone())));
            }
            if !ext.is_empty() {
                kwargs.push(("ext", FilterValue::Set(ext.clone())));
            }
            project.set_filters(&filters, &kwargs)?;
            if project.len() == 0 {
                eprintln!("no files match the given filters");
            }
            for record in project.records() {
                println!("{}", record.abspath.display());
            }
        }
        Command::Scan { path } => {
            let mut project = Project::open(path);
            project.reload();
            for category in Category::ALL {
                let scoped = project.scoped(category, &[] as &[&str], &[])?;
                println!("{}: {} file(s)", category, scoped.len());
            }
        }
    }
    Ok(())
}
