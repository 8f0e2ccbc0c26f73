use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use shardlog_log::{LogConfig, LogReader, LogWriter, MessageLog};
use shardlog_store::{DirShardStore, ShardStore};
use shardlog_types::{BatchEntry, ConversationId, MessageRecord, Payload, Sequence, Shard, ViewerId};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => LogConfig::load(path)?,
        None => LogConfig::default(),
    };
    let store = Arc::new(DirShardStore::open(&cli.root, &config.collection)?);
    let log = MessageLog::from_config(store, &config)?;
    tracing::debug!(dir = %log.store().dir().display(), ?config, "opened store");

    let output = execute(&log, cli.command).await?;
    match cli.format {
        OutputFormat::Text => print_text(&output),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

/// Result of one command, rendered as text or JSON.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    Shards { keys: Vec<String> },
    Shard(ShardView),
    Entries { entries: Vec<EntryView> },
    Message(RecordView),
    NoMessages { conversation: String },
    Purged { removed: u64 },
}

#[derive(Debug, Serialize)]
pub struct ShardView {
    shard_key: String,
    slots: Vec<SlotView>,
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    index: usize,
    tombstoned: bool,
    status: i32,
    payload: Option<String>,
    hide_list: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordView {
    sequence: u64,
    status: i32,
    payload: String,
    payload_hex: String,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    sequence: u64,
    message: Option<RecordView>,
}

impl From<&MessageRecord> for RecordView {
    fn from(record: &MessageRecord) -> Self {
        Self {
            sequence: record.sequence.get(),
            status: record.status,
            payload: String::from_utf8_lossy(&record.payload).into_owned(),
            payload_hex: hex::encode(&record.payload),
        }
    }
}

impl From<&Shard> for ShardView {
    fn from(shard: &Shard) -> Self {
        let slots = shard
            .msgs
            .iter()
            .enumerate()
            .map(|(index, slot)| SlotView {
                index,
                tombstoned: slot.payload.is_tombstoned(),
                status: slot.status,
                payload: match &slot.payload {
                    Payload::Present(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                    Payload::Tombstoned => None,
                },
                hide_list: slot.hide_list.iter().map(ToString::to_string).collect(),
            })
            .collect();
        Self {
            shard_key: shard.shard_key.to_string(),
            slots,
        }
    }
}

pub async fn execute<S>(log: &MessageLog<S>, command: Command) -> anyhow::Result<Output>
where
    S: ShardStore + ?Sized,
{
    match command {
        Command::Shards(args) => {
            let conversation = ConversationId::new(args.conversation)?;
            let keys = log.store().list_keys(&conversation).await?;
            Ok(Output::Shards {
                keys: keys.iter().map(ToString::to_string).collect(),
            })
        }
        Command::Inspect(args) => {
            let shard = log.find_shard_by_key(&args.key).await?;
            Ok(Output::Shard(ShardView::from(&shard)))
        }
        Command::Read(args) => {
            let conversation = ConversationId::new(args.conversation)?;
            let sequences = args
                .sequences
                .into_iter()
                .map(Sequence::new)
                .collect::<Result<Vec<_>, _>>()?;
            let viewer = ViewerId::new(args.viewer);
            let entries = log
                .batch_across_shards(&conversation, &sequences, &viewer)
                .await?;
            Ok(Output::Entries {
                entries: sequences
                    .iter()
                    .zip(&entries)
                    .map(|(seq, entry)| EntryView {
                        sequence: seq.get(),
                        message: match entry {
                            BatchEntry::Visible(record) => Some(RecordView::from(record)),
                            BatchEntry::Absent => None,
                        },
                    })
                    .collect(),
            })
        }
        Command::Newest(args) => scan(log, args, true).await,
        Command::Oldest(args) => scan(log, args, false).await,
        Command::Purge(args) => {
            let removed = log.purge_shards(&args.keys).await?;
            Ok(Output::Purged { removed })
        }
    }
}

async fn scan<S>(log: &MessageLog<S>, args: ConversationArgs, newest: bool) -> anyhow::Result<Output>
where
    S: ShardStore + ?Sized,
{
    let conversation = ConversationId::new(args.conversation)?;
    let result = if newest {
        log.newest(&conversation).await
    } else {
        log.oldest(&conversation).await
    };
    match result {
        Ok(record) => Ok(Output::Message(RecordView::from(&record))),
        Err(e) if e.is_empty_log() => Ok(Output::NoMessages {
            conversation: conversation.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn print_text(output: &Output) {
    match output {
        Output::Shards { keys } if keys.is_empty() => println!("No shards."),
        Output::Shards { keys } => {
            for key in keys {
                println!("{}", key.yellow());
            }
        }
        Output::Shard(view) => {
            println!(
                "Shard {} ({} slots)",
                view.shard_key.yellow().bold(),
                view.slots.len()
            );
            for slot in &view.slots {
                let body = match &slot.payload {
                    Some(text) => text.normal(),
                    None => "<tombstoned>".dimmed(),
                };
                print!("  {:>5}  status={}  {}", slot.index, slot.status, body);
                if !slot.hide_list.is_empty() {
                    print!("  hidden from: {}", slot.hide_list.join(", ").cyan());
                }
                println!();
            }
        }
        Output::Entries { entries } => {
            for entry in entries {
                match &entry.message {
                    Some(record) => println!(
                        "{}  status={}  {}",
                        format!("#{}", entry.sequence).yellow(),
                        record.status,
                        record.payload
                    ),
                    None => println!(
                        "{}  {}",
                        format!("#{}", entry.sequence).yellow(),
                        "absent".dimmed()
                    ),
                }
            }
        }
        Output::Message(record) => println!(
            "{}  status={}  {}",
            format!("#{}", record.sequence).yellow().bold(),
            record.status,
            record.payload
        ),
        Output::NoMessages { conversation } => {
            println!("No messages in {}.", conversation.bold())
        }
        Output::Purged { removed } => {
            println!("{} Purged {} shard(s).", "✓".green().bold(), removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use shardlog_types::{AddressMapper, Capacity, Slot};

    use super::*;

    async fn seeded(root: &std::path::Path) -> MessageLog<DirShardStore> {
        let store = Arc::new(DirShardStore::open(root, "msg").unwrap());
        let mapper = AddressMapper::new(Capacity::new(2).unwrap());
        let log = MessageLog::new(store, mapper, Duration::from_secs(5));
        let conv = ConversationId::new("c1").unwrap();
        let slots: Vec<Slot> = ["a", "b", "c"].iter().map(|s| Slot::new(s.as_bytes())).collect();
        log.append_sequenced(&conv, Sequence::FIRST, &slots).await.unwrap();
        log.hide_for_viewer(&conv, Sequence::new(2).unwrap(), &ViewerId::from("u1"))
            .await
            .unwrap();
        log
    }

    fn command(args: &[&str]) -> Command {
        let mut argv = vec!["shardlog"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[tokio::test]
    async fn shards_lists_in_ordinal_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded(dir.path()).await;
        match execute(&log, command(&["shards", "c1"])).await.unwrap() {
            Output::Shards { keys } => assert_eq!(keys, ["c1:0", "c1:1"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_applies_viewer_hide_list() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded(dir.path()).await;
        let out = execute(&log, command(&["read", "c1", "1", "2", "3", "--viewer", "u1"]))
            .await
            .unwrap();
        let Output::Entries { entries } = out else {
            panic!("expected entries");
        };
        let visible: Vec<bool> = entries.iter().map(|e| e.message.is_some()).collect();
        assert_eq!(visible, [true, false, true]);
    }

    #[tokio::test]
    async fn newest_on_empty_conversation_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded(dir.path()).await;
        match execute(&log, command(&["newest", "nobody"])).await.unwrap() {
            Output::NoMessages { conversation } => assert_eq!(conversation, "nobody"),
            other => panic!("unexpected {other:?}"),
        }
        match execute(&log, command(&["oldest", "c1"])).await.unwrap() {
            Output::Message(record) => assert_eq!(record.payload, "a"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn inspect_missing_shard_fails() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded(dir.path()).await;
        assert!(execute(&log, command(&["inspect", "c1:9"])).await.is_err());
        match execute(&log, command(&["inspect", "c1:0"])).await.unwrap() {
            Output::Shard(view) => {
                assert_eq!(view.slots.len(), 2);
                assert_eq!(view.slots[1].hide_list, ["u1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn purge_then_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = seeded(dir.path()).await;
        let out = execute(&log, command(&["purge", "c1:0", "c1:1"])).await.unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["kind"], "purged");
        assert_eq!(json["removed"], 2);
    }
}
