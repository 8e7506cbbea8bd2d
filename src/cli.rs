use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the book identifier derived from a title.
    Slug(SlugArgs),
    /// Show the title, summary and chapters found in a Markdown file.
    Split(SplitArgs),
    /// Publish a Markdown book as chapter records plus a manifest.
    Publish(PublishArgs),
    /// Open a book or chapter address.
    Read(ReadArgs),
    /// Print the table of contents of a book or chapter address.
    Toc(TocArgs),
    /// List published books.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct SlugArgs {
    pub title: String,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Markdown source of the book.
    #[arg(long)]
    pub file: String,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Markdown source of the book.
    #[arg(long)]
    pub file: String,

    /// Book title (default: the first `# ` heading).
    #[arg(long)]
    pub title: Option<String>,

    /// Durable book identifier (default: derived from the title).
    #[arg(long)]
    pub identifier: Option<String>,

    /// Book summary (default: the prose between the title and the first chapter).
    #[arg(long)]
    pub summary: Option<String>,

    /// Cover image URL.
    #[arg(long)]
    pub image: Option<String>,

    /// Topic tag; repeatable.
    #[arg(long = "topic")]
    pub topics: Vec<String>,

    /// Relay store directory (overrides NOSTRBOOK_STORE_DIR).
    #[arg(long)]
    pub store: Option<String>,

    /// Hex public key to publish as (overrides NOSTRBOOK_AUTHOR).
    #[arg(long)]
    pub author: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// `naddr1...` address, optionally prefixed with `nostr:`.
    pub address: String,

    /// Relay store directory (overrides NOSTRBOOK_STORE_DIR).
    #[arg(long)]
    pub store: Option<String>,

    /// Read deadline (overrides NOSTRBOOK_FETCH_TIMEOUT_MS).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct TocArgs {
    /// `naddr1...` address, optionally prefixed with `nostr:`.
    pub address: String,

    /// Relay store directory (overrides NOSTRBOOK_STORE_DIR).
    #[arg(long)]
    pub store: Option<String>,

    /// Read deadline (overrides NOSTRBOOK_FETCH_TIMEOUT_MS).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only books by this hex public key; repeatable.
    #[arg(long = "author")]
    pub authors: Vec<String>,

    /// Only books with this topic tag; repeatable.
    #[arg(long = "topic")]
    pub topics: Vec<String>,

    /// Page size (overrides NOSTRBOOK_LIST_LIMIT).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Relay store directory (overrides NOSTRBOOK_STORE_DIR).
    #[arg(long)]
    pub store: Option<String>,
}
