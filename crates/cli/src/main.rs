//! FieldOps CLI - operator client for the dispatch daemon

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9650";

#[derive(Parser)]
#[command(name = "fieldops")]
#[command(about = "FieldOps dispatch CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "FIELDOPS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Identity the daemon should act for
    #[arg(long, env = "FIELDOPS_ACTOR_ID", default_value = "dispatcher")]
    actor: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank available contractors for a pending job
    Recommend {
        job_id: String,

        /// Number of contractors to return
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Only consider these contractor IDs (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },

    /// Offer a job to a contractor
    Assign { job_id: String, contractor_id: String },

    /// Move an assignment through its lifecycle
    Transition {
        assignment_id: String,

        #[arg(value_enum)]
        target: TargetState,

        /// Role of the acting identity
        #[arg(long, value_enum, default_value = "contractor")]
        role: Role,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Cancel the current assignment and offer the job to someone else
    Reassign {
        assignment_id: String,
        new_contractor_id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Close a job for good
    CancelJob {
        job_id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Assignment history of a job
    History { job_id: String },

    /// Show job and assignment counts
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TargetState {
    Accepted,
    Declined,
    InProgress,
    Completed,
    Cancelled,
}

impl TargetState {
    fn wire(self) -> &'static str {
        match self {
            TargetState::Accepted => "ACCEPTED",
            TargetState::Declined => "DECLINED",
            TargetState::InProgress => "IN_PROGRESS",
            TargetState::Completed => "COMPLETED",
            TargetState::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Role {
    Dispatcher,
    Contractor,
}

impl Role {
    fn wire(self) -> &'static str {
        match self {
            Role::Dispatcher => "dispatcher",
            Role::Contractor => "contractor",
        }
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "#")]
    rank: usize,
    contractor: String,
    name: String,
    score: String,
    miles: String,
    minutes: String,
    source: String,
}

#[derive(Tabled)]
struct AssignmentRow {
    assignment: String,
    contractor: String,
    status: String,
    assigned: String,
    reason: String,
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn format_millis(value: &Value) -> String {
    value
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn recommendation_rows(set: &Value) -> Vec<RecommendationRow> {
    set["recommendations"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, r)| RecommendationRow {
                    rank: i + 1,
                    contractor: text(&r["contractor_id"]),
                    name: text(&r["contractor_name"]),
                    score: format!("{:.3}", r["score"].as_f64().unwrap_or(0.0)),
                    miles: format!(
                        "{:.1}",
                        r["breakdown"]["distance_miles"].as_f64().unwrap_or(0.0)
                    ),
                    minutes: format!(
                        "{:.0}",
                        r["breakdown"]["travel_time_minutes"].as_f64().unwrap_or(0.0)
                    ),
                    source: text(&r["breakdown"]["distance_status"]),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn rows_fell_back(set: &Value) -> bool {
    set["recommendations"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .any(|r| r["breakdown"]["distance_status"] == "FALLBACK_USED")
        })
        .unwrap_or(false)
}

fn assignment_row(a: &Value) -> AssignmentRow {
    AssignmentRow {
        assignment: text(&a["assignment_id"]),
        contractor: text(&a["contractor_id"]),
        status: text(&a["status"]),
        assigned: format_millis(&a["assigned_at"]),
        reason: text(&a["reason"]),
    }
}

fn print_assignment(headline: &str, assignment: &Value) {
    println!("{}", headline.green().bold());
    println!();
    println!("{}", Table::new(vec![assignment_row(assignment)]));
}

fn print_counts(title: &str, counts: &Value) {
    println!("  {}", title.bold());
    if let Some(map) = counts.as_object() {
        for (status, count) in map {
            println!("    {:<12} {}", status, count);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Recommend { job_id, top, only } => {
            let mut params = json!({ "job_id": job_id });
            if let Some(top) = top {
                params["top_n"] = json!(top);
            }
            if !only.is_empty() {
                params["restrict_to"] = json!(only);
            }

            let set = call_rpc(&cli.rpc_url, "dispatch.recommend.v1", params).await?;
            let rows = recommendation_rows(&set);

            if rows.is_empty() {
                println!(
                    "{}",
                    format!("No available contractors for job {}", job_id).yellow()
                );
            } else {
                println!("{}", format!("Recommendations for job {}", job_id).cyan().bold());
                println!();
                println!("{}", Table::new(rows));
                if rows_fell_back(&set) {
                    println!();
                    println!(
                        "{}",
                        "Some distances are great-circle estimates (mapping service unavailable)"
                            .yellow()
                    );
                }
            }
        }

        Commands::Assign {
            job_id,
            contractor_id,
        } => {
            let params = json!({
                "job_id": job_id,
                "contractor_id": contractor_id,
                "actor_id": cli.actor,
                "actor_role": Role::Dispatcher.wire(),
            });

            let assignment = call_rpc(&cli.rpc_url, "dispatch.assign.v1", params).await?;
            print_assignment("✓ Assignment created", &assignment);
        }

        Commands::Transition {
            assignment_id,
            target,
            role,
            reason,
        } => {
            let params = json!({
                "assignment_id": assignment_id,
                "target_state": target.wire(),
                "actor_id": cli.actor,
                "actor_role": role.wire(),
                "reason": reason,
            });

            let assignment = call_rpc(&cli.rpc_url, "dispatch.transition.v1", params).await?;
            print_assignment(&format!("✓ Assignment {}", target.wire()), &assignment);
        }

        Commands::Reassign {
            assignment_id,
            new_contractor_id,
            reason,
        } => {
            let params = json!({
                "assignment_id": assignment_id,
                "new_contractor_id": new_contractor_id,
                "actor_id": cli.actor,
                "actor_role": Role::Dispatcher.wire(),
                "reason": reason,
            });

            let assignment = call_rpc(&cli.rpc_url, "dispatch.reassign.v1", params).await?;
            print_assignment("✓ Job reassigned", &assignment);
        }

        Commands::CancelJob { job_id, reason } => {
            let params = json!({
                "job_id": job_id,
                "actor_id": cli.actor,
                "actor_role": Role::Dispatcher.wire(),
                "reason": reason,
            });

            let job = call_rpc(&cli.rpc_url, "dispatch.cancel_job.v1", params).await?;
            println!(
                "{}",
                format!("✓ Job {} is {}", job_id, text(&job["status"]))
                    .green()
                    .bold()
            );
        }

        Commands::History { job_id } => {
            let params = json!({ "job_id": job_id });
            let history = call_rpc(&cli.rpc_url, "dispatch.history.v1", params).await?;

            let rows: Vec<AssignmentRow> = history["assignments"]
                .as_array()
                .map(|items| items.iter().map(assignment_row).collect())
                .unwrap_or_default();

            if rows.is_empty() {
                println!("{}", format!("Job {} has never been assigned", job_id).yellow());
            } else {
                println!("{}", format!("Assignment history of job {}", job_id).cyan().bold());
                println!();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    print_counts("Jobs", &stats["jobs"]);
                    println!();
                    print_counts("Assignments", &stats["assignments"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
