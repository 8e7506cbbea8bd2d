use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    nostrbook::logging::init().context("init logging")?;

    let cli = nostrbook::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        nostrbook::cli::Command::Slug(args) => {
            let slug = nostrbook::ident::derive_book_identifier(&args.title);
            if slug.is_empty() {
                anyhow::bail!("title {:?} has no usable characters", args.title);
            }
            println!("{slug}");
        }
        nostrbook::cli::Command::Split(args) => {
            nostrbook::scan::run(args).context("split")?;
        }
        nostrbook::cli::Command::Publish(args) => {
            nostrbook::publish::run(args).await.context("publish")?;
        }
        nostrbook::cli::Command::Read(args) => {
            nostrbook::reader::run_read(args).await.context("read")?;
        }
        nostrbook::cli::Command::Toc(args) => {
            nostrbook::reader::run_toc(args).await.context("toc")?;
        }
        nostrbook::cli::Command::List(args) => {
            nostrbook::reader::run_list(args).await.context("list")?;
        }
    }

    Ok(())
}
