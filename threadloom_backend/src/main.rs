use anyhow::Result;
use clap::{Parser, Subcommand};
use threadloom_backend::config::ThreadloomConfig;
use threadloom_backend::node::ThreadloomNode;
use threadloom_backend::telemetry;
use threadloom_backend::threading::query::ThreadQuery;
use threadloom_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Threaded comment backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Print the thread structure of a discussion as JSON
    Thread {
        discussion_id: i64,
        #[arg(long)]
        parent_comment_id: Option<i64>,
        #[arg(long, default_value = "dateInserted", allow_hyphen_values = true)]
        sort: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        focus_comment_id: Option<i64>,
    },
    /// Rebuild score and descendant aggregates of a discussion
    Recalculate { discussion_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing();

    let config = ThreadloomConfig::from_env()?;
    let node = ThreadloomNode::start(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            utils::print_banner();
            node.run_http_server().await
        }
        Command::Thread {
            discussion_id,
            parent_comment_id,
            sort,
            page,
            limit,
            focus_comment_id,
        } => {
            let comments = node.comments();
            let threading = comments.threading_config();
            let mut query = ThreadQuery::for_discussion(discussion_id, threading);
            query.parent_comment_id = parent_comment_id;
            query.sort = sort.parse()?;
            query.page = page.max(1);
            if let Some(limit) = limit {
                query.limit = limit.clamp(1, threading.max_limit.max(1));
            }
            query.focus_comment_id = focus_comment_id;

            let structure = comments.get_thread(&query)?;
            println!("{}", serde_json::to_string_pretty(&structure)?);
            Ok(())
        }
        Command::Recalculate { discussion_id } => {
            let repaired = node.comments().recalculate(discussion_id)?;
            for violation in &repaired {
                println!(
                    "comment {}: score {} -> {}, scoreChildComments {} -> {}, countChildComments {} -> {}",
                    violation.comment_id,
                    violation.actual.score,
                    violation.expected.score,
                    violation.actual.score_child_comments,
                    violation.expected.score_child_comments,
                    violation.actual.count_child_comments,
                    violation.expected.count_child_comments,
                );
            }
            println!("{} comment(s) repaired", repaired.len());
            Ok(())
        }
    }
}
