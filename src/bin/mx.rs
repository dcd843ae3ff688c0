//! Thin CLI over the memex repository and feed layer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Map, Value};

use memex::{config::Config, telemetry, FeedManager, FeedSyncer, Identity, KuboClient, Repository};

#[derive(Parser, Debug)]
#[command(
    name = "mx",
    version,
    about = "Content-addressed personal knowledge graph",
    arg_required_else_help = true
)]
struct Cli {
    /// Data directory (contains .mx/).
    #[arg(long, global = true, default_value = ".", value_name = "PATH")]
    data: PathBuf,

    /// Kubo API URL.
    #[arg(long, global = true, value_name = "URL")]
    kubo_api: Option<String>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a node.
    Create {
        id: String,
        #[arg(long, default_value = "Note")]
        r#type: String,
        /// Node content; omit for an empty node.
        content: Option<String>,
    },
    /// Print a node as JSON.
    Get { id: String },
    /// List live node IDs.
    List {
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Replace a node's content.
    SetContent { id: String, content: String },
    /// Patch node metadata with key=value pairs (JSON values; `key=null`
    /// removes the key).
    SetMeta {
        id: String,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Delete a node (tombstone unless --force).
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// Link two nodes.
    Link {
        source: String,
        target: String,
        #[arg(long, default_value = "refs")]
        r#type: String,
    },
    /// Show all links touching a node.
    Links { id: String },
    /// Content-address raw content into a Source node.
    Ingest {
        content: String,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Full-text search.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List nodes of a type.
    Filter {
        r#type: String,
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Breadth-first neighborhood of a node.
    Traverse {
        id: String,
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },
    /// Show the commit log.
    Log {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Nodes related to this one, by co-access and co-change.
    Related {
        id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the local identity DID.
    Whoami,
    /// Follow a DID.
    Follow {
        did: String,
        #[arg(long, default_value = "")]
        alias: String,
    },
    /// Unfollow a DID or alias.
    Unfollow { did_or_alias: String },
    /// List followed identities.
    Following,
    /// Publish a signed post.
    Post {
        content: String,
        #[arg(long = "ref")]
        refs: Vec<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Check followed feeds once.
    Feeds,
    /// Run the background feed syncer until stdin closes.
    Serve,
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    if let Err(err) = run(cli) {
        tracing::error!("error: {err}");
        std::process::exit(1);
    }
}

fn parse_meta_pairs(pairs: &[String]) -> Result<Map<String, Value>, memex::Error> {
    let mut meta = Map::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').unwrap_or((pair.as_str(), "null"));
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        meta.insert(key.to_string(), value);
    }
    Ok(meta)
}

fn feed_manager(cli: &Cli, repo: Arc<Repository>) -> Result<FeedManager, memex::Error> {
    let config = Config::from_env();
    let api = cli.kubo_api.as_deref().unwrap_or(&config.kubo_api);
    let kubo = KuboClient::new(api)?;
    let identity = Identity::load()?;
    Ok(FeedManager::new(kubo, identity, repo))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => tracing::error!("render: {err}"),
    }
}

fn run(cli: Cli) -> Result<(), memex::Error> {
    let repo = Arc::new(Repository::open(&cli.data)?);

    match &cli.command {
        Command::Create { id, r#type, content } => {
            let content = content.as_ref().map(|text| text.as_bytes().to_vec());
            let node = repo.create_node(id, r#type, content, None)?;
            print_json(&node);
        }
        Command::Get { id } => print_json(&repo.get_node(id)?),
        Command::List { limit } => {
            for id in repo.list_nodes(*limit)? {
                println!("{id}");
            }
        }
        Command::SetContent { id, content } => {
            let node = repo.update_content(id, content.as_bytes().to_vec())?;
            print_json(&node);
        }
        Command::SetMeta { id, pairs } => {
            let node = repo.update_node(id, parse_meta_pairs(pairs)?)?;
            print_json(&node);
        }
        Command::Delete { id, force } => repo.delete_node(id, *force)?,
        Command::Link {
            source,
            target,
            r#type,
        } => repo.create_link(source, target, r#type)?,
        Command::Links { id } => {
            for link in repo.get_links(id) {
                println!("{} -[{}]-> {}", link.source, link.link_type, link.target);
            }
        }
        Command::Ingest { content, format } => {
            let (id, created) = repo.ingest(content, format)?;
            println!("{id}{}", if created { "" } else { " (exists)" });
        }
        Command::Search { query, limit } => {
            for node in repo.search_nodes(query, *limit) {
                println!("{}\t{}", node.id, node.node_type);
            }
        }
        Command::Filter { r#type, limit } => {
            for node in repo.filter_nodes(r#type, *limit) {
                println!("{}", node.id);
            }
        }
        Command::Traverse { id, depth } => {
            for node in repo.traverse(id, *depth) {
                println!("{}\t{}", node.id, node.node_type);
            }
        }
        Command::Log { count } => {
            for commit in repo.commits.log(*count)? {
                println!(
                    "{}\t{}",
                    commit.timestamp,
                    commit.message.as_deref().unwrap_or("")
                );
            }
        }
        Command::Related { id, limit } => {
            for peer in repo.related.related(id, *limit) {
                println!("{peer}");
            }
        }
        Command::Whoami => println!("{}", Identity::load()?.did),
        Command::Follow { did, alias } => {
            let manager = feed_manager(&cli, Arc::clone(&repo))?;
            manager.follow(did, alias)?;
        }
        Command::Unfollow { did_or_alias } => {
            let manager = feed_manager(&cli, Arc::clone(&repo))?;
            manager.unfollow(did_or_alias)?;
        }
        Command::Following => {
            let manager = feed_manager(&cli, Arc::clone(&repo))?;
            for entry in manager.list_following() {
                println!("{}\t{}", entry.alias, entry.did);
            }
        }
        Command::Post {
            content,
            refs,
            tags,
        } => {
            let manager = feed_manager(&cli, Arc::clone(&repo))?;
            manager.ensure_key()?;
            let cid = manager.publish_post(content, refs.clone(), tags.clone())?;
            println!("{cid}");
        }
        Command::Feeds => {
            let manager = feed_manager(&cli, Arc::clone(&repo))?;
            println!("{}", manager.check_feeds());
        }
        Command::Serve => {
            let config = Config::from_env();
            let manager = Arc::new(feed_manager(&cli, Arc::clone(&repo))?);
            if manager.kubo().is_available() {
                if let Err(err) = manager.ensure_key() {
                    tracing::warn!("key import warning: {err}");
                }
            } else {
                tracing::warn!("Kubo not reachable; feeds resume when it starts");
            }

            let syncer = FeedSyncer::start(Arc::clone(&manager), config.feed_interval());
            tracing::info!("feed syncer started (interval {:?})", config.feed_interval());

            // Block until stdin closes, then shut down cleanly.
            let mut sink = String::new();
            while std::io::stdin().read_line(&mut sink).unwrap_or(0) > 0 {
                sink.clear();
            }
            syncer.stop();
        }
    }
    Ok(())
}
