//! Twig command line

use anyhow::Result;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use twig_core::{ErrorKind, LogEntry, MergeOutcome, Repository, TwigError};

#[derive(Parser, Debug)]
#[command(name = "twig")]
#[command(author = "Twig Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A small local version-control system", long_about = None)]
struct Cli {
    /// Working tree to operate on
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a repository in the working tree
    Init,

    /// Stage a file
    Add { file: String },

    /// Record the staged changes
    Commit { message: Option<String> },

    /// Unstage a file, or stage its removal
    Rm { file: String },

    /// Show the history of the current commit
    Log,

    /// Show every commit ever made
    GlobalLog,

    /// Print the ids of commits with the given message
    Find { message: String },

    /// Show branches, staged files and working tree changes
    Status,

    /// Restore a file, or switch branches
    ///
    /// `checkout -- <file>`, `checkout <commit> -- <file>`, `checkout <branch>`
    Checkout {
        target: Option<String>,
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at the current commit
    Branch { name: String },

    /// Delete a branch
    RmBranch { name: String },

    /// Check out a commit and move the current branch to it
    Reset { commit: String },

    /// Merge a branch into the current branch
    Merge { branch: String },
}

/// The three shapes `checkout` accepts
#[derive(Debug, PartialEq, Eq)]
enum Checkout<'a> {
    File(&'a str),
    FileAt { commit: &'a str, file: &'a str },
    Branch(&'a str),
}

impl<'a> Checkout<'a> {
    fn from_operands(target: Option<&'a str>, file: Option<&'a str>) -> Option<Self> {
        match (target, file) {
            (None, Some(file)) => Some(Checkout::File(file)),
            (Some(commit), Some(file)) => Some(Checkout::FileAt { commit, file }),
            (Some(branch), None) => Some(Checkout::Branch(branch)),
            (None, None) => None,
        }
    }
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TWIG_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<TwigError>()
                .map_or(3, |err| exit_code(err.kind()));
            if code == 1 {
                println!("{}", e);
            } else {
                tracing::error!("{:#}", e);
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(code)
        }
    }
}

fn open(root: &Path) -> Result<Repository> {
    Ok(Repository::open(root)?)
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.repo.as_path();
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    match cli.command {
        Commands::Init => {
            Repository::init(root)?;
        }

        Commands::Add { file } => {
            open(root)?.add(&file)?;
        }

        Commands::Commit { message } => {
            open(root)?.commit(message.as_deref().unwrap_or(""))?;
        }

        Commands::Rm { file } => {
            open(root)?.rm(&file)?;
        }

        Commands::Log => {
            for commit in open(root)?.log()? {
                print!("{}", LogEntry(&commit));
            }
        }

        Commands::GlobalLog => {
            for commit in open(root)?.global_log()? {
                print!("{}", LogEntry(&commit));
            }
        }

        Commands::Find { message } => {
            for id in open(root)?.find(&message)? {
                println!("{}", id);
            }
        }

        Commands::Status => {
            print!("{}", open(root)?.status()?);
        }

        Commands::Checkout { target, file } => {
            let Some(form) = Checkout::from_operands(target.as_deref(), file.as_deref()) else {
                Cli::command()
                    .error(ClapErrorKind::MissingRequiredArgument, "Incorrect operands.")
                    .exit();
            };
            let mut repo = open(root)?;
            match form {
                Checkout::File(file) => repo.checkout_file(file)?,
                Checkout::FileAt { commit, file } => repo.checkout_file_at(commit, file)?,
                Checkout::Branch(branch) => repo.checkout_branch(branch)?,
            }
        }

        Commands::Branch { name } => {
            open(root)?.branch(&name)?;
        }

        Commands::RmBranch { name } => {
            open(root)?.rm_branch(&name)?;
        }

        Commands::Reset { commit } => {
            open(root)?.reset(&commit)?;
        }

        Commands::Merge { branch } => {
            match open(root)?.merge(&branch)? {
                MergeOutcome::FastForwarded(_) => println!("Current branch fast-forwarded."),
                MergeOutcome::AlreadyMerged => {
                    println!("Given branch is an ancestor of the current branch.")
                }
                MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty() => {
                    println!("Encountered a merge conflict.")
                }
                MergeOutcome::Merged { .. } => {}
            }
        }
    }
    Ok(())
}

/// Exit status for a library error
fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::User | ErrorKind::NotFound => 1,
        ErrorKind::Corrupt | ErrorKind::Io => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    fn checkout_form(args: &[&str]) -> Option<String> {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Checkout { target, file } => {
                Checkout::from_operands(target.as_deref(), file.as_deref()).map(|f| format!("{:?}", f))
            }
            other => panic!("not a checkout: {:?}", other),
        }
    }

    #[test]
    fn test_checkout_forms() {
        assert_eq!(
            checkout_form(&["twig", "checkout", "--", "f.txt"]).as_deref(),
            Some(r#"File("f.txt")"#)
        );
        assert_eq!(
            checkout_form(&["twig", "checkout", "abc123", "--", "f.txt"]).as_deref(),
            Some(r#"FileAt { commit: "abc123", file: "f.txt" }"#)
        );
        assert_eq!(
            checkout_form(&["twig", "checkout", "dev"]).as_deref(),
            Some(r#"Branch("dev")"#)
        );
        assert_eq!(checkout_form(&["twig", "checkout"]), None);
    }

    #[test]
    fn test_checkout_rejects_extra_operands() {
        assert!(Cli::try_parse_from(["twig", "checkout", "a", "b"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from(["twig", "status", "-C", "/tmp/work", "--debug"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("/tmp/work"));
        assert!(cli.debug);
    }

    #[test]
    fn test_commit_message_is_optional() {
        let cli = Cli::try_parse_from(["twig", "commit"]).unwrap();
        assert!(matches!(cli.command, Commands::Commit { message: None }));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(TwigError::NoSuchBranch.kind()), 1);
        assert_eq!(exit_code(TwigError::NoSuchCommit.kind()), 1);
        assert_eq!(exit_code(TwigError::CorruptStore("x".into()).kind()), 3);
    }
}
