use anyhow::Result;
use clap::{Parser, Subcommand};
use crmstream::state::StepStatus;
use crmstream::types::{AccountIntelRequest, CrmWorkflowRequest};
use crmstream::{Config, Handlers, WorkflowClient, WorkflowOutcome};
use std::io::Write;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "crmstream",
    version,
    about = "Run a CRM assistant workflow and stream its output"
)]
struct Cli {
    /// Backend base URL (overrides CRMSTREAM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides CRMSTREAM_AUTH_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Print the answer and run outcome as one JSON document
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Account intelligence workflow
    Intel {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        session: Option<String>,
        query: String,
    },
    /// Multi-agent CRM workflow
    Crm {
        #[arg(long)]
        session: Option<String>,
        query: String,
    },
}

fn live_handlers(answer: &mut String, echo: bool) -> Handlers<'_> {
    Handlers::new()
        .on_content_chunk(move |chunk| {
            answer.push_str(chunk);
            if echo {
                let mut stdout = std::io::stdout();
                stdout.write_all(chunk.as_bytes())?;
                stdout.flush()?;
            }
            Ok(())
        })
        .on_step_started(|name, _| {
            eprintln!("[step] {name}");
            Ok(())
        })
        .on_tool_call(|tool| {
            let name = tool.tool_name().unwrap_or("tool_call");
            match tool.args() {
                Some(args) => eprintln!("[tool] {name} {args}"),
                None => eprintln!("[tool] {name}"),
            }
            Ok(())
        })
        .on_workflow_message(|payload| {
            if let Some(text) = payload.text() {
                eprintln!("[workflow] {text}");
            }
            Ok(())
        })
        .on_agent_started(|payload| {
            if let Some(agent) = payload.str_field("agent") {
                eprintln!("[agent] {agent}");
            }
            Ok(())
        })
        .on_artifact(|artifact| {
            eprintln!("[artifact] {}", artifact.title);
            Ok(())
        })
        .on_error(|error| {
            eprintln!("[error] {}", error.message());
            Ok(())
        })
}

fn print_outcome(outcome: &WorkflowOutcome) {
    eprintln!();
    for entry in outcome.timeline.entries() {
        let mark = match entry.status {
            StepStatus::Running => "…",
            StepStatus::Completed => "✓",
        };
        eprintln!("{mark} {} ({} tool calls)", entry.step, entry.tool_calls.len());
    }
    if let Some(artifact) = outcome.latest_artifact() {
        eprintln!("latest artifact: {}", artifact.title);
    }
    eprintln!("{}", outcome.summary);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(token) = cli.token {
        config.auth_token = Some(token);
    }
    config.validate()?;

    let client = WorkflowClient::new(config)?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut answer = String::new();
    let handlers = live_handlers(&mut answer, !cli.json);
    let outcome = match cli.command {
        Command::Intel {
            account,
            session,
            query,
        } => {
            let mut request = AccountIntelRequest::new(query);
            if let Some(account) = account {
                request = request.with_account(account);
            }
            if let Some(session) = session {
                request = request.with_session(session);
            }
            client.account_intel(&request, handlers, &cancel).await?
        }
        Command::Crm { session, query } => {
            let mut request = CrmWorkflowRequest::new(query);
            if let Some(session) = session {
                request = request.with_session(session);
            }
            client.crm_workflow(&request, handlers, &cancel).await?
        }
    };

    if cli.json {
        let document = serde_json::json!({
            "answer": answer,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        println!();
        print_outcome(&outcome);
    }

    if outcome.summary.cancelled {
        eprintln!("cancelled");
    }
    Ok(())
}
