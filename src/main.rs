use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use prestige::config::Config;
use prestige::db::{RecordStore, SubjectRef, SubjectType};
use prestige::output::terminal;
use prestige::reputation::{Capability, RankTable, ScoredAction};
use prestige::Engine;

/// Prestige: likes, reputation, and comment threads for the forum.
///
/// Admin and diagnostic front end to the engagement-and-reputation engine.
#[derive(Parser)]
#[command(name = "prestige", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create a post
    Post {
        title: String,
        #[arg(default_value = "")]
        content: String,
        #[arg(long, default_value = "general")]
        board: String,
        /// Acting user
        #[arg(long = "as", value_name = "USER")]
        actor: Option<String>,
    },

    /// Toggle a like on a post or comment
    Like {
        /// "post" or "comment"
        kind: String,
        id: i64,
        #[arg(long = "as", value_name = "USER")]
        actor: Option<String>,
    },

    /// Comment on a post, optionally as a reply
    Comment {
        post_id: i64,
        content: String,
        #[arg(long)]
        reply_to: Option<i64>,
        #[arg(long = "as", value_name = "USER")]
        actor: Option<String>,
    },

    /// Show a post's comment thread
    Thread {
        post_id: i64,
        /// Print the tree as JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Apply a scored action to a user (e.g. VIOLATION)
    Award {
        user: String,
        action: String,
        /// Multiplier; negative reverses the action
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        times: i64,
    },

    /// Record a login (awards DAILY_LOGIN once per day)
    Login { user: String },

    /// Show a user's score and rank
    Rank {
        user: String,
        /// Check a single capability (e.g. external-links)
        #[arg(long)]
        can: Option<String>,
    },

    /// Show the rank ladder and point catalog
    Ranks,

    /// Show the leaderboard
    Leaderboard {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Grant or revoke the admin flag
    Admin {
        user: String,
        #[arg(long)]
        revoke: bool,
    },

    /// Recount likes and comments and fix drifted counters
    Reconcile {
        /// Only fix this post's like counter
        #[arg(long, conflicts_with = "comment")]
        post: Option<i64>,
        /// Only fix this comment's like counter
        #[arg(long)]
        comment: Option<i64>,
    },

    /// Show store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prestige=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Prestige database...");
            let store = prestige::db::initialize(&config.db_path)?;
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: create a post with `prestige post <title> --as <user>`");
        }

        Commands::Ranks => {
            terminal::display_rank_table(&RankTable::standard(), &config.catalog);
        }

        Commands::Post {
            title,
            content,
            board,
            actor,
        } => {
            let engine = open_engine(&config)?;
            let post = engine
                .posts
                .create_post(actor.as_deref(), &board, &title, &content)
                .await?;
            println!("Created post #{} on /{}", post.id, post.board);
        }

        Commands::Like { kind, id, actor } => {
            let kind: SubjectType = kind.parse()?;
            let subject = SubjectRef { id, kind };
            let engine = open_engine(&config)?;
            let outcome = engine
                .engagement
                .toggle_like(actor.as_deref(), subject)
                .await?;
            terminal::display_toggle(&outcome);
        }

        Commands::Comment {
            post_id,
            content,
            reply_to,
            actor,
        } => {
            let engine = open_engine(&config)?;
            let comment = engine
                .comments
                .create_comment(actor.as_deref(), post_id, reply_to, &content)
                .await?;
            println!("Created comment #{} on post #{}", comment.id, comment.post_id);
        }

        Commands::Thread { post_id, json } => {
            let engine = open_engine(&config)?;
            let forest = engine.comments.fetch_thread(post_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&forest)?);
            } else {
                terminal::display_thread(post_id, &forest);
            }
        }

        Commands::Award {
            user,
            action,
            times,
        } => {
            let action: ScoredAction = action.parse()?;
            let engine = open_engine(&config)?;
            let score = engine.ledger.apply_action(&user, action, times).await?;
            println!("{} x{} applied to {}: score now {}", action, times, user, score);
        }

        Commands::Login { user } => {
            let engine = open_engine(&config)?;
            match engine.ledger.record_login(&user, Utc::now()).await? {
                Some(score) => println!("Daily login recorded for {user}: score now {score}"),
                None => println!("{}", format!("{user} already logged in today").dimmed()),
            }
        }

        Commands::Rank { user, can } => {
            let engine = open_engine(&config)?;
            let account = engine.ledger.account(&user).await?;
            match can {
                Some(name) => {
                    let capability: Capability = name.parse()?;
                    let rank = engine.ranks.resolve(account.score, account.is_admin);
                    let allowed = rank.can_perform(capability);
                    println!(
                        "{} {} {}",
                        terminal::badge(rank),
                        user,
                        if allowed {
                            format!("can {capability}").green()
                        } else {
                            format!("cannot {capability}").red()
                        }
                    );
                }
                None => terminal::display_account(&account, &engine.ranks),
            }
        }

        Commands::Leaderboard { limit } => {
            let engine = open_engine(&config)?;
            let entries =
                prestige::reputation::leaderboard::leaderboard(&engine.store, &engine.ranks, limit)
                    .await?;
            terminal::display_leaderboard(&entries);
        }

        Commands::Admin { user, revoke } => {
            let engine = open_engine(&config)?;
            engine.ledger.set_admin(&user, !revoke).await?;
            println!(
                "{} is {} an admin",
                user,
                if revoke { "no longer" } else { "now" }
            );
        }

        Commands::Reconcile { post, comment } => {
            let engine = open_engine(&config)?;
            let single = post.map(SubjectRef::post).or(comment.map(SubjectRef::comment));
            if let Some(subject) = single {
                let likes = prestige::engagement::reconcile_subject(&engine.store, subject).await?;
                println!("{subject} like_count set to {likes}");
                return Ok(());
            }

            let pb = ProgressBar::new_spinner();
            pb.set_message("Reconciling counters...");
            pb.enable_steady_tick(Duration::from_millis(120));
            let report =
                prestige::engagement::reconcile_counters(&engine.store, config.reconcile_concurrency)
                    .await?;
            pb.finish_and_clear();
            terminal::display_reconcile(&report);
        }

        Commands::Status => {
            let engine = open_engine(&config)?;
            prestige::status::show(&engine.store, &config.db_path, &engine.ranks).await?;
        }
    }

    Ok(())
}

/// Open the store and wire every service to it.
fn open_engine(config: &Config) -> Result<Engine> {
    let store: Arc<dyn RecordStore> = prestige::db::open(&config.db_path)?;
    Ok(Engine::new(store, config.catalog.clone(), RankTable::standard()))
}
