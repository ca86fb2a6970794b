use crate::cli::args::{CliArgs, Command, MergeFlags};
use crate::errors::error::Error;

pub struct CliParser;

impl CliParser {
    pub fn parse(args: Vec<String>) -> Result<CliArgs, Error> {
        if args.len() < 2 {
            return Err(Error::Generic(format!(
                "Usage: mflow <command> [options]\n\n{}",
                Self::format_help()
            )));
        }

        let command = args[1].to_lowercase();
        let cli_args = match command.as_str() {
            "merge" => {
                let (flags, git_dir, positional) = Self::parse_merge_args(&args[2..])?;
                if positional.len() != 2 {
                    return Err(Error::Generic(
                        "merge requires exactly two commits".to_string(),
                    ));
                }
                CliArgs {
                    command: Command::Merge {
                        git_dir,
                        commit1: positional[0].clone(),
                        commit2: positional[1].clone(),
                        flags,
                    },
                }
            }
            "merge-tree" => {
                let (mut flags, git_dir, positional) = Self::parse_merge_args(&args[2..])?;
                let base = match flags.base_tree.take() {
                    Some(base) => base,
                    None => {
                        return Err(Error::Generic(
                            "merge-tree requires --base <tree>".to_string(),
                        ))
                    }
                };
                if positional.len() != 2 {
                    return Err(Error::Generic(
                        "merge-tree requires exactly two trees".to_string(),
                    ));
                }
                CliArgs {
                    command: Command::MergeTree {
                        git_dir,
                        base,
                        tree1: positional[0].clone(),
                        tree2: positional[1].clone(),
                        flags,
                    },
                }
            }
            _ => CliArgs {
                command: Command::Unknown {
                    name: args[1].clone(),
                },
            },
        };

        Ok(cli_args)
    }

    fn parse_merge_args(args: &[String]) -> Result<(MergeFlags, String, Vec<String>), Error> {
        let mut flags = MergeFlags::default();
        let mut git_dir = None;
        let mut positional = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--git-dir" => {
                    git_dir = Some(Self::value(args, &mut i, "--git-dir")?);
                }
                "--base" => {
                    flags.base_tree = Some(Self::value(args, &mut i, "--base")?);
                }
                "--no-renames" => {
                    flags.no_renames = true;
                    i += 1;
                }
                "--rename-limit" => {
                    let value = Self::value(args, &mut i, "--rename-limit")?;
                    flags.rename_limit = Some(value.parse().map_err(|_| {
                        Error::Generic(format!("Invalid --rename-limit value: {}", value))
                    })?);
                }
                "--rename-score" => {
                    let value = Self::value(args, &mut i, "--rename-score")?;
                    flags.rename_score = Some(value.parse().map_err(|_| {
                        Error::Generic(format!("Invalid --rename-score value: {}", value))
                    })?);
                }
                "--ours" => {
                    flags.favor = Some("ours".to_string());
                    i += 1;
                }
                "--theirs" => {
                    flags.favor = Some("theirs".to_string());
                    i += 1;
                }
                "--subtree" => {
                    flags.subtree = Some(Self::value(args, &mut i, "--subtree")?);
                }
                "--label-base" => {
                    flags.label_base = Some(Self::value(args, &mut i, "--label-base")?);
                }
                "--label1" | "-1" => {
                    flags.label1 = Some(Self::value(args, &mut i, "--label1")?);
                }
                "--label2" | "-2" => {
                    flags.label2 = Some(Self::value(args, &mut i, "--label2")?);
                }
                "--verbosity" | "-v" => {
                    let value = Self::value(args, &mut i, "--verbosity")?;
                    flags.verbosity = Some(value.parse().map_err(|_| {
                        Error::Generic(format!("Invalid --verbosity value: {}", value))
                    })?);
                }
                "--json" => {
                    flags.json = true;
                    i += 1;
                }
                _ if arg.starts_with("--dir-renames=") => {
                    let value = arg.splitn(2, '=').nth(1).unwrap_or("conflict").to_string();
                    if !matches!(value.as_str(), "none" | "conflict" | "true") {
                        return Err(Error::Generic(format!(
                            "Invalid --dir-renames value: {} (expected none, conflict or true)",
                            value
                        )));
                    }
                    flags.dir_renames = Some(value);
                    i += 1;
                }
                _ if arg.starts_with("--") => {
                    return Err(Error::Generic(format!("Unknown option: {}", arg)));
                }
                _ => {
                    positional.push(arg.clone());
                    i += 1;
                }
            }
        }

        let git_dir = git_dir
            .ok_or_else(|| Error::Generic("--git-dir <path> is required".to_string()))?;

        Ok((flags, git_dir, positional))
    }

    fn value(args: &[String], i: &mut usize, flag: &str) -> Result<String, Error> {
        if *i + 1 < args.len() {
            let value = args[*i + 1].clone();
            *i += 2;
            Ok(value)
        } else {
            Err(Error::Generic(format!("{} requires a value", flag)))
        }
    }

    pub fn format_help() -> String {
        "Commands:\n\
         \x20 merge      --git-dir <dir> [options] <commit1> <commit2>\n\
         \x20 merge-tree --git-dir <dir> --base <tree> [options] <tree1> <tree2>\n\
         \n\
         Options:\n\
         \x20 --no-renames              disable rename detection\n\
         \x20 --dir-renames=<mode>      none, conflict (default) or true\n\
         \x20 --rename-limit <n>        cap on the rename pairing matrix\n\
         \x20 --rename-score <n>        minimum similarity (0..60000)\n\
         \x20 --ours | --theirs         favor one side in conflicting chunks\n\
         \x20 --subtree <prefix>        align the other side's tree at <prefix>\n\
         \x20 --label-base <label>      label for the merge base\n\
         \x20 --label1 / --label2       labels for the two sides\n\
         \x20 --verbosity <0-5>         diagnostic verbosity\n\
         \x20 --json                    print a JSON report"
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, Error> {
        let argv: Vec<String> = std::iter::once("mflow")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        CliParser::parse(argv)
    }

    #[test]
    fn merge_parses_flags_and_positionals() {
        let parsed = parse(&[
            "merge",
            "--git-dir",
            "/repo",
            "--rename-limit",
            "10",
            "--dir-renames=true",
            "--label1",
            "ours",
            "abc1",
            "def2",
        ])
        .unwrap();
        match parsed.command {
            Command::Merge {
                git_dir,
                commit1,
                commit2,
                flags,
            } => {
                assert_eq!(git_dir, "/repo");
                assert_eq!(commit1, "abc1");
                assert_eq!(commit2, "def2");
                assert_eq!(flags.rename_limit, Some(10));
                assert_eq!(flags.dir_renames.as_deref(), Some("true"));
                assert_eq!(flags.label1.as_deref(), Some("ours"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn merge_requires_two_commits() {
        assert!(parse(&["merge", "--git-dir", "/repo", "only-one"]).is_err());
    }

    #[test]
    fn merge_tree_requires_base() {
        assert!(parse(&["merge-tree", "--git-dir", "/repo", "t1", "t2"]).is_err());
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(parse(&["merge", "--git-dir", "/repo", "--bogus", "a", "b"]).is_err());
    }

    #[test]
    fn bad_dir_renames_value_is_rejected() {
        assert!(parse(&["merge", "--git-dir", "/repo", "--dir-renames=maybe", "a", "b"]).is_err());
    }
}
