use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shardlog_types::ShardKey;

#[derive(Parser)]
#[command(
    name = "shardlog",
    about = "Inspect and maintain a sharded message log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the shard collection
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// TOML file with log settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

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
    /// List the shards of a conversation
    Shards(ShardsArgs),
    /// Dump one shard document
    Inspect(InspectArgs),
    /// Read messages by sequence as a viewer sees them
    Read(ReadArgs),
    /// Show the latest live message
    Newest(ConversationArgs),
    /// Show the earliest live message
    Oldest(ConversationArgs),
    /// Delete whole shards
    Purge(PurgeArgs),
}

#[derive(Args)]
pub struct ShardsArgs {
    pub conversation: String,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Shard key, e.g. `c1:0`
    pub key: ShardKey,
}

#[derive(Args)]
pub struct ReadArgs {
    pub conversation: String,
    #[arg(required = true)]
    pub sequences: Vec<u64>,
    /// Viewer whose hide-list entries apply
    #[arg(long, default_value = "")]
    pub viewer: String,
}

#[derive(Args)]
pub struct ConversationArgs {
    pub conversation: String,
}

#[derive(Args)]
pub struct PurgeArgs {
    #[arg(required = true)]
    pub keys: Vec<ShardKey>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_read_with_viewer() {
        let cli = Cli::try_parse_from([
            "shardlog", "--root", "/tmp/s", "read", "c1", "1", "2", "--viewer", "u1",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/s"));
        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.conversation, "c1");
                assert_eq!(args.sequences, vec![1, 2]);
                assert_eq!(args.viewer, "u1");
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn shard_keys_are_validated_at_parse_time() {
        assert!(Cli::try_parse_from(["shardlog", "inspect", "c1:x"]).is_err());
        let cli = Cli::try_parse_from(["shardlog", "--format", "json", "purge", "c1:0", "c1:1"])
            .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Purge(args) => assert_eq!(args.keys.len(), 2),
            _ => panic!("expected purge"),
        }
    }
}
