use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "eyrie",
    about = "Eyrie: store, sync, build and syndicate an IndieWeb site",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./eyrie.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Render a new snapshot of the site
    Build(BuildArgs),
    /// Commit staged changes, pull, and push
    Sync,
    /// List entries in the content store
    Entries(EntriesArgs),
    /// Full-text search over listed entries
    Search(SearchArgs),
    /// Send or inspect webmentions
    Webmentions(WebmentionsArgs),
    /// Work with the retry queue
    Queue(QueueArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Render into a fresh directory instead of reusing the live one
    #[arg(long)]
    pub clean: bool,
}

#[derive(Args)]
pub struct EntriesArgs {
    /// Include section and taxonomy pages
    #[arg(long)]
    pub lists: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    pub query: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct WebmentionsArgs {
    #[command(subcommand)]
    pub action: WebmentionAction,
}

#[derive(Subcommand)]
pub enum WebmentionAction {
    /// Send webmentions for every external link in an entry
    Send {
        id: String,
        /// Queue the delivery instead of sending now
        #[arg(long)]
        queue: bool,
    },
    /// Show the interactions recorded for an entry
    Show { id: String },
}

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub action: QueueAction,
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// Add a payload to a queue
    Enqueue {
        name: String,
        payload: String,
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },
    /// Process a queue until interrupted
    Work { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_build() {
        let cli = Cli::try_parse_from(["eyrie", "build"]).unwrap();
        if let Command::Build(args) = cli.command {
            assert!(!args.clean);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_build_clean() {
        let cli = Cli::try_parse_from(["eyrie", "build", "--clean"]).unwrap();
        assert!(matches!(cli.command, Command::Build(BuildArgs { clean: true })));
    }

    #[test]
    fn parse_entries_lists() {
        let cli = Cli::try_parse_from(["eyrie", "entries", "--lists"]).unwrap();
        if let Command::Entries(args) = cli.command {
            assert!(args.lists);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_search_limit() {
        let cli = Cli::try_parse_from(["eyrie", "search", "sourdough", "-n", "5"]).unwrap();
        if let Command::Search(args) = cli.command {
            assert_eq!(args.query, "sourdough");
            assert_eq!(args.limit, 5);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_webmentions_send() {
        let cli = Cli::try_parse_from(["eyrie", "webmentions", "send", "/posts/hello/"]).unwrap();
        if let Command::Webmentions(args) = cli.command {
            assert!(matches!(
                args.action,
                WebmentionAction::Send { ref id, queue: false } if id == "/posts/hello/"
            ));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_queue_enqueue_delay() {
        let cli = Cli::try_parse_from([
            "eyrie", "queue", "enqueue", "webmentions", "/a/", "--delay-ms", "1500",
        ])
        .unwrap();
        if let Command::Queue(args) = cli.command {
            match args.action {
                QueueAction::Enqueue { name, payload, delay_ms } => {
                    assert_eq!(name, "webmentions");
                    assert_eq!(payload, "/a/");
                    assert_eq!(delay_ms, 1500);
                }
                _ => panic!("wrong action"),
            }
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["eyrie", "sync", "--verbose", "-c", "site.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
        assert!(matches!(cli.command, Command::Sync));
    }
}
