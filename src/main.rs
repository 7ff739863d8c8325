use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gh2csv::{GitHubClient, Pipeline, RawConfig};

#[derive(Parser, Debug)]
#[command(name = "gh2csv")]
#[command(version = "0.1.0")]
#[command(about = "Fetch GitHub feature attributes and export them to CSV")]
struct Args {
    /// Input file (.yaml)
    file: PathBuf,

    /// Display the content of the input file
    #[arg(long)]
    echo: bool,

    /// Do not pause the shell at the end of the program
    #[arg(long)]
    nopause: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gh2csv=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let text = std::fs::read_to_string(&args.file)
        .map_err(|e| anyhow::anyhow!("cannot read [{}]: {}", args.file.display(), e))?;
    if args.echo {
        let border = "-".repeat(70);
        println!("{}", border);
        println!("Content of [{}]", args.file.display());
        println!("{}", border);
        println!("{}", text);
        println!("{}", border);
    }
    let cfg = RawConfig::from_yaml_str(&text)?;

    let pipeline = Pipeline::new(GitHubClient::new()?);

    match cfg.run.schedule.as_ref().filter(|s| s.toggle) {
        Some(schedule) => {
            tracing::info!("Running in scheduled mode");
            gh2csv::scheduler::run_scheduled(&pipeline, &cfg, schedule).await?;
        }
        None => {
            pipeline.run_all(&cfg).await;
        }
    }

    if !args.nopause {
        print!("Press enter to exit...");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
    }

    Ok(())
}
