use std::env;
use std::fs::metadata;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Result;
use attendex::io::IndexFile;
use attendex::loader;
use attendex::tree::AttendanceTree;
use attendex::tree::Direction;
use attendex::Attendance;
use attendex::StudentId;
use attendex::{is_valid_attendance, MAX_ATTENDANCE, MIN_ATTENDANCE};
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Printed by a threshold query which matches nothing.
const NO_RESULTS: &str = "-1";

#[derive(Debug, Parser)]
#[command(version, about, long_about = None, disable_help_subcommand = true)]
struct Cli {
    /// Index file location
    index: PathBuf,

    #[command(subcommand)]
    parameter: Option<Parameter>,
}

/// One interactive line, using the same grammar as the command line.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct Line {
    #[command(subcommand)]
    parameter: Parameter,
}

#[derive(Debug, Subcommand)]
enum Parameter {
    /// Build a new index from "<attendance> <student_id>" lines (will overwrite existing file)
    Create {
        /// Read lines from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Display student id count
    Count,
    /// Interactive Help
    Help,
    /// List attendance keys
    Keys,
    /// List index nodes
    Nodes,
    /// Remove this student id
    Remove {
        #[arg(allow_hyphen_values = true)]
        id: StudentId,
    },
    /// List student ids at or above/below a threshold, highest attendance first
    Threshold {
        #[arg(allow_hyphen_values = true)]
        threshold: Attendance,
        /// Direction (1 or Above, -1 or Below)
        #[arg(allow_hyphen_values = true)]
        direction: Direction,
    },
    /// Set the attendance of a student id, inserting it if unknown
    Update {
        #[arg(allow_hyphen_values = true)]
        attendance: Attendance,
        #[arg(allow_hyphen_values = true)]
        id: StudentId,
    },
    /// Verify index
    Verify,
}

fn get_history_file() -> Option<PathBuf> {
    dirs::preference_dir()
        .and_then(|mut base| {
            base.push("attendex");
            // Note: Not create_dir_all(), because we don't want to create preference
            // dirs if they don't exist.
            if metadata(base.clone()).ok().is_none() {
                std::fs::create_dir(base.clone()).ok()?
            }
            Some(base)
        })
        .map(|mut base| {
            base.push("history.txt");
            base
        })
}

/// The command list of the interactive grammar, one line per command.
fn command_help() -> Vec<String> {
    let help = Line::command().render_help().to_string();
    help.lines()
        .skip_while(|line| !line.starts_with("Commands:"))
        .skip(1)
        .take_while(|line| line.is_empty() || line.starts_with(char::is_whitespace))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn interactive(index: &IndexFile) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    if let Some(file_location) = get_history_file() {
        if let Err(e) = rl.load_history(&file_location) {
            println!("error loading history: {e}");
        }
    }
    println!("terminate with ctrl-c or ctrl-d");
    loop {
        let readline = rl.readline("attendex: ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let parameter = match Line::try_parse_from(line.split_whitespace()) {
                    // stdin belongs to the editor here
                    Ok(Line {
                        parameter: Parameter::Create { input: None },
                    }) => {
                        println!("usage: create --input <file>");
                        continue;
                    }
                    Ok(parsed) => parsed.parameter,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                // Every line is its own load, operate, store cycle
                if let Err(e) = process_parameter(index, &parameter).await {
                    println!("error: {e}");
                }
                rl.add_history_entry(line.as_str())?;
            }
            Err(ReadlineError::Interrupted) => {
                println!("terminating...");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("terminating...");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
    if let Some(file_location) = get_history_file() {
        if let Err(e) = rl.save_history(&file_location) {
            println!("error saving history: {e}");
        }
    }
    Ok(())
}

async fn process_parameter(index: &IndexFile, parameter: &Parameter) -> Result<()> {
    tracing::info!(?parameter, "processing");
    match parameter {
        Parameter::Create { input } => {
            let mut tree = AttendanceTree::new();
            let report = match input {
                Some(path) => {
                    let file = tokio::fs::File::open(path).await?;
                    loader::load(&mut tree, BufReader::new(file)).await?
                }
                None => loader::load(&mut tree, BufReader::new(tokio::io::stdin())).await?,
            };
            index.store(&tree).await?;
            println!(
                "created: {} (loaded: {}, skipped: {})",
                index.path().display(),
                report.accepted,
                report.skipped
            );
        }
        Parameter::Count => println!("count: {}", index.load().await?.count()),
        Parameter::Help => {
            for line in command_help() {
                println!("{line}");
            }
        }
        Parameter::Keys => index.load().await?.print_keys(),
        Parameter::Nodes => index.load().await?.print_nodes(),
        Parameter::Remove { id } => {
            let mut tree = index.load_or_default().await?;
            if tree.remove_by_id(*id) {
                index.store(&tree).await?;
                println!("removed: {id}");
            } else {
                println!("not found");
            }
        }
        Parameter::Threshold {
            threshold,
            direction,
        } => {
            let ids = index.load().await?.collect(*threshold, *direction);
            if ids.is_empty() {
                println!("{NO_RESULTS}");
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        Parameter::Update { attendance, id } => {
            if !is_valid_attendance(*attendance) {
                bail!(
                    "attendance should be between {MIN_ATTENDANCE} and {MAX_ATTENDANCE}, got: {attendance}"
                );
            }
            let mut tree = index.load_or_default().await?;
            let found = tree.update_key(*id, *attendance);
            index.store(&tree).await?;
            if found {
                println!("updated attendance for student ID {id} to {attendance}");
            } else {
                println!("inserted new entry for student ID {id} with attendance {attendance}");
            }
        }
        // Loading verifies every node
        Parameter::Verify => match index.load().await {
            Ok(_) => println!("Ok"),
            Err(e) => bail!("verification failed: {e}"),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match env::var("TMPDIR") {
        Ok(d) => d,
        Err(_e) => ".".to_string(),
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, "attendex.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(non_blocking)
        .init();

    let index = IndexFile::new(&cli.index);

    match cli.parameter {
        Some(parameter) => process_parameter(&index, &parameter).await?,
        None => interactive(&index).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_lists_every_command_in_help() {
        let help = command_help();
        let names: Vec<&str> = help
            .iter()
            .filter_map(|line| line.split_whitespace().next())
            .collect();
        for name in [
            "create",
            "count",
            "help",
            "keys",
            "nodes",
            "remove",
            "threshold",
            "update",
            "verify",
        ] {
            assert!(names.contains(&name), "missing: {name}");
        }
        assert!(help.iter().all(|line| !line.contains("--help")));
    }

    #[test]
    fn it_parses_interactive_lines() {
        let line = Line::try_parse_from("threshold 70 -1".split_whitespace()).expect("parses");
        assert!(matches!(
            line.parameter,
            Parameter::Threshold {
                threshold: 70,
                direction: Direction::Below
            }
        ));
        let line = Line::try_parse_from("update 90 201".split_whitespace()).expect("parses");
        assert!(matches!(
            line.parameter,
            Parameter::Update {
                attendance: 90,
                id: 201
            }
        ));
        assert!(Line::try_parse_from("threshold 70 sideways".split_whitespace()).is_err());
    }
}
