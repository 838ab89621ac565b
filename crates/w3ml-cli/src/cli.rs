use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use w3ml_sdk::SliceSpec;

#[derive(Parser)]
#[command(
    name = "w3ml",
    about = "w3ml: content-addressed Warcraft III replay database",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database directory
    #[arg(long, global = true, env = "W3ML_DB", default_value = "w3ml.db")]
    pub db: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging: -v info, -vv debug, -vvv trace
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add replay files, directories of replays, or replay URLs
    Add(AddArgs),
    /// Write the raw bytes of one replay
    Dump(DumpArgs),
    /// List catalog rows
    List(ListArgs),
    /// Print the structured events of one replay
    Events(EventsArgs),
    /// Show which replay a token refers to
    Resolve(ResolveArgs),
    /// Show database summary
    Info,
}

#[derive(Args)]
pub struct AddArgs {
    /// Local paths or http(s) URLs
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

#[derive(Args)]
pub struct DumpArgs {
    /// Index, full hash, or hash prefix
    pub token: String,
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Slice such as `2:5`, `-10:`, `::2`, or a single index
    #[arg(allow_hyphen_values = true)]
    pub slice: Option<SliceSpec>,
    /// Comma-separated column names
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Args)]
pub struct EventsArgs {
    pub token: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add() {
        let cli = Cli::try_parse_from(["w3ml", "add", "a.w3g", "https://example.org/b.w3g"]).unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.inputs, vec!["a.w3g", "https://example.org/b.w3g"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn add_requires_input() {
        assert!(Cli::try_parse_from(["w3ml", "add"]).is_err());
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "w3ml", "info", "--db", "/tmp/replays", "-vv", "--format", "json",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Info));
        assert_eq!(cli.db, PathBuf::from("/tmp/replays"));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_dump_output() {
        let cli = Cli::try_parse_from(["w3ml", "dump", "a1b2", "-o", "out.w3g"]).unwrap();
        if let Command::Dump(args) = cli.command {
            assert_eq!(args.token, "a1b2");
            assert_eq!(args.output, Some(PathBuf::from("out.w3g")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_list_slice_and_columns() {
        let cli = Cli::try_parse_from(["w3ml", "list", "2:5", "--columns", "index,map_name"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.slice, Some(SliceSpec::range(2, 5)));
            assert_eq!(args.columns, vec!["index", "map_name"]);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_list_negative_slice() {
        let cli = Cli::try_parse_from(["w3ml", "list", "-3"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.slice, Some(SliceSpec::Single(-3)));
            assert!(args.columns.is_empty());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn invalid_slice_is_rejected() {
        assert!(Cli::try_parse_from(["w3ml", "list", "1:2:0"]).is_err());
        assert!(Cli::try_parse_from(["w3ml", "list", "a:b"]).is_err());
    }

    #[test]
    fn parse_resolve_and_events() {
        let cli = Cli::try_parse_from(["w3ml", "resolve", "42"]).unwrap();
        assert!(matches!(cli.command, Command::Resolve(ResolveArgs { token }) if token == "42"));
        let cli = Cli::try_parse_from(["w3ml", "events", "ffee"]).unwrap();
        assert!(matches!(cli.command, Command::Events(EventsArgs { token }) if token == "ffee"));
    }
}
