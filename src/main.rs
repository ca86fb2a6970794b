use std::env;
use std::path::Path;
use std::process;

use serde::Serialize;

use mergeflow::cli::args::{CliArgs, Command, MergeFlags};
use mergeflow::cli::parser::CliParser;
use mergeflow::core::color::Color;
use mergeflow::core::database::database::Database;
use mergeflow::core::merge::{
    DirRenameDetection, Merge, MergeOptions, MergeOutcome, RecursiveVariant, UnmergedEntry,
};
use mergeflow::errors::error::Error;

fn main() {
    let args: Vec<String> = env::args().collect();

    match CliParser::parse(args) {
        Ok(cli_args) => handle_command(cli_args),
        Err(e) => exit_with_error(&e.to_string()),
    }
}

fn handle_command(cli_args: CliArgs) {
    match cli_args.command {
        Command::Merge {
            git_dir,
            commit1,
            commit2,
            flags,
        } => handle_merge_command(&git_dir, &commit1, &commit2, flags),
        Command::MergeTree {
            git_dir,
            base,
            tree1,
            tree2,
            flags,
        } => handle_merge_tree_command(&git_dir, &base, &tree1, &tree2, flags),
        Command::Unknown { name } => {
            exit_with_error(&format!("'{}' is not a mflow command", name))
        }
    }
}

fn handle_merge_command(git_dir: &str, commit1: &str, commit2: &str, flags: MergeFlags) {
    match run_merge(git_dir, commit1, commit2, None, flags) {
        Ok(code) => process::exit(code),
        Err(e) => exit_with_error(&format!("fatal: {}", e)),
    }
}

fn handle_merge_tree_command(
    git_dir: &str,
    base: &str,
    tree1: &str,
    tree2: &str,
    flags: MergeFlags,
) {
    match run_merge(git_dir, tree1, tree2, Some(base), flags) {
        Ok(code) => process::exit(code),
        Err(e) => exit_with_error(&format!("fatal: {}", e)),
    }
}

#[derive(Serialize)]
struct MergeReport<'a> {
    clean: bool,
    result_tree: &'a str,
    unmerged: &'a [UnmergedEntry],
}

fn run_merge(
    git_dir: &str,
    one: &str,
    two: &str,
    base: Option<&str>,
    flags: MergeFlags,
) -> Result<i32, Error> {
    let objects_dir = Path::new(git_dir).join("objects");
    if !objects_dir.is_dir() {
        return Err(Error::Generic(format!(
            "Not an object database: {} not found",
            objects_dir.display()
        )));
    }

    let mut database = Database::new(objects_dir);
    let one = database.resolve_oid(one)?;
    let two = database.resolve_oid(two)?;
    let base = match base {
        Some(base) => Some(database.resolve_oid(base)?),
        None => None,
    };

    let options = merge_options(&flags, &database, &one, &two)?;
    let json = flags.json;

    let mut merge = Merge::new(&mut database, options);
    let outcome = match &base {
        Some(base) => merge.merge_trees(&one, &two, base)?,
        None => merge.merge_commits(&one, &two, None)?,
    };

    render_outcome(&outcome, json)?;
    Ok(if outcome.clean { 0 } else { 1 })
}

fn merge_options(
    flags: &MergeFlags,
    database: &Database,
    one: &str,
    two: &str,
) -> Result<MergeOptions, Error> {
    let mut options = MergeOptions {
        branch1: flags
            .label1
            .clone()
            .unwrap_or_else(|| database.short_oid(one)),
        branch2: flags
            .label2
            .clone()
            .unwrap_or_else(|| database.short_oid(two)),
        ancestor: flags.label_base.clone(),
        buffer_output: 2,
        ..MergeOptions::default()
    };

    if flags.no_renames {
        options.detect_renames = false;
    }
    if let Some(mode) = &flags.dir_renames {
        options.detect_directory_renames = match mode.as_str() {
            "none" => DirRenameDetection::None,
            "true" => DirRenameDetection::True,
            _ => DirRenameDetection::Conflict,
        };
    }
    if let Some(limit) = flags.rename_limit {
        options.rename_limit = limit;
    }
    if let Some(score) = flags.rename_score {
        options.rename_score = score;
    }
    if let Some(favor) = &flags.favor {
        options.recursive_variant = match favor.as_str() {
            "ours" => RecursiveVariant::FavorOurs,
            "theirs" => RecursiveVariant::FavorTheirs,
            _ => RecursiveVariant::Normal,
        };
    }
    if let Some(prefix) = &flags.subtree {
        options.subtree_shift = Some(prefix.clone());
    }
    if let Some(verbosity) = flags.verbosity {
        options.verbosity = verbosity;
    }

    Ok(options)
}

fn render_outcome(outcome: &MergeOutcome, json: bool) -> Result<(), Error> {
    if json {
        let report = MergeReport {
            clean: outcome.clean,
            result_tree: &outcome.result_tree,
            unmerged: &outcome.unmerged,
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::Generic(format!("Failed to serialize report: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    for line in outcome.output.lines() {
        if line.trim_start().starts_with("CONFLICT") {
            println!("{}", Color::red(line));
        } else {
            println!("{}", line);
        }
    }

    println!("{}", outcome.result_tree);
    for entry in &outcome.unmerged {
        println!("{}", Color::yellow(&format!("unmerged: {}", entry.path)));
    }
    Ok(())
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(2);
}
