use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tweetchart::{
    render, Config, FileStore, HttpBackend, KeyStatus, ParseForm, ParseTier, SessionState,
    TweetChartClient, TweetUrl,
};

#[derive(Parser)]
#[command(name = "tweetchart")]
#[command(about = "Parse chart images attached to tweets into markdown and tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: <config dir>/tweetchart/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Parsing service base URL
    #[arg(long, global = true, env = "TWEETCHART_API_URL")]
    api_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and store a LlamaCloud API key
    Login {
        /// API key (read from stdin when omitted)
        #[arg(long)]
        key: Option<String>,
    },
    /// Forget the stored API key
    Logout,
    /// Re-validate the stored API key and show the session state
    Status,
    /// Parse the images attached to a tweet
    Parse(ParseArgs),
    /// List the image URLs attached to a tweet
    Extract {
        tweet_url: String,

        /// X API bearer token, improves media extraction reliability
        #[arg(long, env = "X_BEARER_TOKEN")]
        x_bearer_token: Option<String>,
    },
}

#[derive(Args)]
struct ParseArgs {
    tweet_url: String,

    /// fast, cost_effective, agentic or agentic_plus
    #[arg(long)]
    tier: Option<ParseTier>,

    /// Disable specialized chart parsing
    #[arg(long)]
    no_chart_parsing: bool,

    /// X API bearer token, improves media extraction reliability
    #[arg(long, env = "X_BEARER_TOKEN")]
    x_bearer_token: Option<String>,

    /// Print the raw JSON response
    #[arg(long, conflicts_with = "markdown")]
    json: bool,

    /// Print only the combined markdown
    #[arg(long)]
    markdown: bool,
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "tweetchart=warn",
        1 => "tweetchart=debug",
        _ => "tweetchart=trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let backend = HttpBackend::new(&config.api_base_url, config.request_timeout())?;
    let store = FileStore::new(config.credential_path()?);
    let mut client = TweetChartClient::new(backend, store);

    match cli.command {
        Commands::Login { key } => {
            let key = match key {
                Some(key) => key,
                None => prompt_for_key()?,
            };
            let credential = client.submit_key(&key).await?;
            println!("API key {} is valid and has been saved.", credential.masked());
        }
        Commands::Logout => {
            client.sign_out()?;
            println!("Signed out.");
        }
        Commands::Status => {
            client.load_persisted().await?;
            print_status(client.session().state());
        }
        Commands::Parse(args) => {
            let tweet = TweetUrl::parse(&args.tweet_url)?;
            tracing::debug!(tweet_id = %tweet.tweet_id, author = %tweet.author_handle(), "parsing");

            if client.load_persisted().await?.is_none() {
                bail!("No valid API key stored. Run `tweetchart login` first.");
            }

            let form = ParseForm {
                tweet_url: tweet.normalized_url,
                tier: args.tier.unwrap_or(config.default_tier),
                enable_chart_parsing: config.enable_chart_parsing && !args.no_chart_parsing,
                x_bearer_token: args.x_bearer_token.or(config.x_bearer_token),
            };

            let response = client.parse(&form).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(response)?);
            } else if args.markdown {
                println!("{}", response.combined_markdown.trim_end());
            } else {
                print!("{}", render::summary(response));
            }
        }
        Commands::Extract {
            tweet_url,
            x_bearer_token,
        } => {
            let token = x_bearer_token.or(config.x_bearer_token);
            let images = client.extract_images(&tweet_url, token.as_deref()).await?;
            if images.image_urls.is_empty() {
                println!("No images found.");
            }
            for url in &images.image_urls {
                println!("{}", url);
            }
            for warning in &images.warnings {
                eprintln!("warning: {}", warning);
            }
        }
    }

    Ok(())
}

fn prompt_for_key() -> Result<String> {
    eprint!("LlamaCloud API key: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read API key from stdin")?;
    Ok(line)
}

fn print_status(state: &SessionState) {
    match state {
        SessionState::Valid(credential) => {
            println!("Signed in with API key {}.", credential.masked());
        }
        SessionState::Invalid { message } => println!("API key invalid: {}", message),
        other if other.status() == KeyStatus::Checking => println!("Checking API key..."),
        _ => println!("Not signed in."),
    }
}
