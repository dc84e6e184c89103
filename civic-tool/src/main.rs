mod config;
mod context;
mod error;
mod logging;

#[cfg(feature = "chat")]
mod chat;

use std::path::PathBuf;

use civic_api::VerificationDetails;
use clap::{Args, Parser, Subcommand};
use civic_session::{LaunchKind, ResetLatch};

use crate::config::{load_config, load_password, resolve_base_url, resolve_session_path};
use crate::context::AppContext;

#[derive(Parser)]
#[command(name = "civ")]
#[command(about = "Chat with the city-services assistant", long_about = None)]
struct Cli {
    /// Backend base URL (overrides CIVIC_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to the persisted session file
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[cfg(feature = "chat")]
    /// Start an interactive chat session
    Chat {
        /// Open an existing conversation (signed-in users only)
        #[arg(long)]
        conversation: Option<String>,

        /// Treat this start as a reload: the guest conversation is forgotten
        #[arg(long)]
        reload: bool,
    },

    /// Send a single message and print the reply
    Send {
        message: String,
    },

    /// Sign in and store the access token
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (falls back to CIVIC_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign into it
    Register {
        #[arg(short, long)]
        username: String,

        /// Password (falls back to CIVIC_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Verify the signed-in account
    Verify {
        #[command(subcommand)]
        step: VerifyStep,
    },

    /// Forget the stored access token
    Logout,

    /// Forget the stored guest conversation
    NewGuest,

    /// Search your conversations; an empty query lists recent ones
    Search {
        #[arg(default_value = "")]
        query: String,
    },
}

#[derive(Subcommand)]
enum VerifyStep {
    /// Ask for a one-time code to be mailed, updating any details given
    Request(DetailArgs),

    /// Confirm the account with the mailed code
    Code { otp: String },
}

#[derive(Args)]
struct DetailArgs {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    address_line1: Option<String>,
    #[arg(long)]
    address_line2: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip_code: Option<String>,
}

impl From<DetailArgs> for VerificationDetails {
    fn from(args: DetailArgs) -> Self {
        Self {
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
            address_line1: args.address_line1,
            address_line2: args.address_line2,
            city: args.city,
            state: args.state,
            zip_code: args.zip_code,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "chat")]
    let interactive = matches!(cli.command, Command::Chat { .. });
    #[cfg(not(feature = "chat"))]
    let interactive = false;

    if interactive {
        logging::init_file(&config::default_log_path())?;
    } else {
        logging::init_stderr();
    }

    let config = load_config();
    let base_url = resolve_base_url(cli.api_url, &config);
    let session_path = resolve_session_path(cli.session_file, &config);
    let ctx = AppContext::open(base_url, session_path)?;

    match cli.command {
        #[cfg(feature = "chat")]
        Command::Chat {
            conversation,
            reload,
        } => {
            let kind = if reload {
                LaunchKind::Reload
            } else {
                LaunchKind::Navigate
            };
            chat::run(ctx, conversation, kind).await?;
        }
        Command::Send { message } => {
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            let reply = session.send(&message).await?;
            println!("{}", reply.text());
            if let Some(insight) = reply.insight() {
                if !insight.categories.is_empty() {
                    println!("[{}]", insight.categories.join(", "));
                }
            }
        }
        Command::Login { username, password } => {
            let password = load_password(password)?;
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            session.login(&username, &password).await?;
            println!("Signed in as {}", username);
        }
        Command::Register { username, password } => {
            let password = load_password(password)?;
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            let notice = session.register(&username, &password).await?;
            println!("{}", notice);
            println!("Signed in as {}", username);
        }
        Command::Verify { step } => {
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            match step {
                VerifyStep::Request(details) => {
                    let notice = session.request_verification(&details.into()).await?;
                    println!("{}", notice);
                }
                VerifyStep::Code { otp } => {
                    let verified = session.verify_otp(&otp).await?;
                    println!("{}", verified.message);
                }
            }
        }
        Command::Logout => {
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            session.logout();
            println!("Signed out");
        }
        Command::NewGuest => {
            let session = ctx.session(ResetLatch::new(), LaunchKind::Navigate);
            session.new_guest_conversation();
            println!("Guest conversation cleared");
        }
        Command::Search { query } => {
            let search = ctx.search();
            let mut rx = search.subscribe();
            search.on_query_change(query);
            let state = rx.wait_for(|s| !s.pending).await?.clone();

            if let Some(error) = state.error {
                anyhow::bail!("search failed: {}", error);
            }
            if state.conversations.is_empty() {
                println!("No conversations");
            }
            for summary in state.conversations {
                let title = summary.title.as_deref().unwrap_or("(untitled)");
                match summary.updated_at {
                    Some(at) => println!("{}  {}  {}", summary.id, at.format("%Y-%m-%d %H:%M"), title),
                    None => println!("{}  {}", summary.id, title),
                }
            }
        }
    }

    Ok(())
}
