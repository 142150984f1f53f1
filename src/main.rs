//! AMOS - a versioned repository of localized strings
//!
//! This is the main entry point for the AMOS command-line interface.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use amos::db::{Amos, AmosConfig};
use amos::mlang::{fix_syntax_codes, SnapshotOptions, VersionRegistry};
use amos::query::TreeFilter;
use amos::script::{script_lines, LineStatus, ScriptRun};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "amos")]
#[command(version)]
#[command(about = "Versioned repository of localized strings", long_about = None)]
struct Cli {
    /// Repository directory
    #[arg(short = 'd', long, default_value = ".amos")]
    root: PathBuf,

    /// JSON configuration file (overrides --root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root of the legacy help files
    #[arg(long)]
    help_root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a script file against a branch and commit the result
    Run {
        /// File with an AMOS BEGIN/END block or one instruction per line
        script: PathBuf,

        /// Branch as code (2000), label (2.0) or branch name (MOODLE_20_STABLE)
        #[arg(short, long)]
        branch: String,

        /// Read strings as of this unix time and stamp new revisions with it
        #[arg(short, long)]
        timestamp: Option<i64>,

        /// Commit message
        #[arg(short, long, default_value = "AMOS script")]
        message: String,

        /// Show what would be staged without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// List known languages
    Languages,

    /// List known components
    Components,

    /// Show branches, languages and components present in the log
    Tree {
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long)]
        lang: Option<String>,

        #[arg(short, long)]
        component: Option<String>,
    },

    /// Print the strings of a component
    Show {
        component: String,

        lang: String,

        #[arg(short, long)]
        branch: String,

        /// State as of this unix time
        #[arg(short, long)]
        timestamp: Option<i64>,

        /// Include removed strings
        #[arg(long)]
        deleted: bool,
    },

    /// Convert placeholder syntax of text read from stdin
    FixSyntax {
        /// Target format (1 legacy, 2 modern)
        #[arg(long, default_value_t = 2)]
        to: u8,

        /// Source format, defaults to the target
        #[arg(long)]
        from: Option<u8>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.verbose);

    match execute(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("amos=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amos=info"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(cli: &Cli) -> CliResult<AmosConfig> {
    let mut config = match &cli.config {
        Some(path) => AmosConfig::load(path)?,
        None => AmosConfig::new(&cli.root),
    };
    if let Some(root) = &cli.help_root {
        config = config.help_root(root);
    }
    let verbose = cli.verbose || config.verbose;

    Ok(config.verbose(verbose))
}

fn execute(cli: Cli, config: AmosConfig) -> CliResult<ExitCode> {
    if let Commands::FixSyntax { to, from } = &cli.command {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        print!("{}", fix_syntax_codes(&text, *to, *from)?);
        return Ok(ExitCode::SUCCESS);
    }

    let amos = Amos::open_with_config(config)?;
    match &cli.command {
        Commands::Run {
            script,
            branch,
            timestamp,
            message,
            dry_run,
        } => {
            let version = VersionRegistry::resolve(branch)?;
            let text = fs::read_to_string(script)?;
            let mut run = amos.engine().run(script_lines(&text), version, *timestamp)?;
            print_run(&run);

            if *dry_run {
                println!("dry run, {} revision(s) staged", run.stage.revision_count());
            } else {
                let appended = amos.commit(&mut run.stage, message, false)?;
                println!("{} revision(s) committed", appended);
            }

            if run.syntax_errors() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Languages => {
            for (code, name) in amos.query().list_languages(true)?.iter() {
                println!("{}\t{}", code, name);
            }
        }
        Commands::Components => {
            for name in amos.query().list_components(true)?.iter() {
                println!("{}", name);
            }
        }
        Commands::Tree {
            branch,
            lang,
            component,
        } => {
            let mut filter = TreeFilter::new();
            if let Some(branch) = branch {
                filter = filter.branch(VersionRegistry::resolve(branch)?.code);
            }
            if let Some(lang) = lang {
                filter = filter.lang(lang);
            }
            if let Some(component) = component {
                filter = filter.component(component);
            }

            for (code, langs) in amos.query().components_tree(&filter)? {
                let label = VersionRegistry::by_code(code)
                    .map(|v| v.label.to_string())
                    .unwrap_or_else(|| code.to_string());
                println!("{}", label);
                for (lang, components) in langs {
                    let names: Vec<String> = components.into_iter().collect();
                    println!("  {}: {}", lang, names.join(" "));
                }
            }
        }
        Commands::Show {
            component,
            lang,
            branch,
            timestamp,
            deleted,
        } => {
            let version = VersionRegistry::resolve(branch)?;
            let options = SnapshotOptions::new().at(*timestamp).include_deleted(*deleted);
            let snapshot = amos.snapshot(component, lang, version, &options)?;
            println!("{} ({} strings)", snapshot.key(), snapshot.len());
            for revision in &snapshot {
                let when = DateTime::from_timestamp(revision.timemodified, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| revision.timemodified.to_string());
                let marker = if revision.deleted { " [deleted]" } else { "" };
                println!(
                    "{}\t{}{}\t{}",
                    revision.id,
                    when,
                    marker,
                    revision.text.as_deref().unwrap_or("")
                );
            }
        }
        Commands::FixSyntax { .. } => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn print_run(run: &ScriptRun) {
    for (line, status) in &run.lines {
        match status {
            LineStatus::Staged(count) => println!("{}\t{} staged", line, count),
            LineStatus::Done => println!("{}\tok", line),
            LineStatus::SyntaxError(e) => println!("{}\tsyntax error: {}", line, e),
        }
    }
}
