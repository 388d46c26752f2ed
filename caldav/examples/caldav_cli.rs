// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client validation tool.
//!
//! A standalone CLI for trying the client against real `CalDAV` servers, and
//! example code for the resource tree API.

use std::error::Error;
use std::io::{Read as _, Write as _};

use clap::{Parser, Subcommand};
use colored::Colorize as _;
use davcal_caldav::{
    AuthMethod, CalDavConfig, CalDavError, Calendar, CalendarObject, ComponentKind, DavClient,
    DavObject as _, Principal, Quirk, ServerFamily,
};
use jiff::Timestamp;
use tracing_subscriber::EnvFilter;

/// `CalDAV` client validation tool.
#[derive(Parser)]
#[command(name = "caldav_cli")]
#[command(about = "CalDAV client validation tool", long_about = None)]
#[command(version)]
struct Cli {
    /// `CalDAV` server URL
    #[arg(long)]
    server: Option<String>,
    /// Calendar home path, skips home-set discovery
    #[arg(long)]
    home: Option<String>,
    /// Username for basic auth
    #[arg(long)]
    username: Option<String>,
    /// Password for basic auth
    #[arg(long)]
    password: Option<String>,
    /// Bearer token for OAuth
    #[arg(long)]
    token: Option<String>,
    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,
    /// Server family whose compatibility rules to enable (zimbra, icloud, ...)
    #[arg(long)]
    family: Option<String>,
    /// Additional compatibility rule, may be repeated
    #[arg(long = "quirk")]
    quirks: Vec<Quirk>,
    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Test server discovery
    Discover,
    /// List all calendars
    ListCals,
    /// Create a calendar
    MakeCal {
        /// Display name
        name: String,
        /// Calendar id, random when omitted
        #[arg(long)]
        id: Option<String>,
    },
    /// List events in a time range
    ListEvents {
        /// Calendar id
        calendar: String,
        /// Start date (e.g., "2025-01-01" or "today")
        #[arg(long)]
        start: String,
        /// End date
        #[arg(long)]
        end: Option<String>,
    },
    /// Show free/busy time in a range
    FreeBusy {
        /// Calendar id
        calendar: String,
        /// Start date
        #[arg(long)]
        start: String,
        /// End date
        #[arg(long)]
        end: String,
    },
    /// List todos
    ListTodos {
        /// Calendar id
        calendar: String,
        /// Include completed and cancelled todos
        #[arg(long)]
        all: bool,
    },
    /// Show a calendar object by UID
    Get {
        /// Calendar id
        calendar: String,
        /// Object UID
        uid: String,
    },
    /// Add a new event, todo or journal
    Add {
        /// Calendar id
        calendar: String,
        /// iCalendar file path (or "-" for stdin)
        input: String,
    },
    /// Replace an existing object
    Edit {
        /// Calendar id
        calendar: String,
        /// Object UID
        uid: String,
        /// iCalendar file path (or "-" for stdin)
        input: String,
    },
    /// Mark a todo completed
    Complete {
        /// Calendar id
        calendar: String,
        /// Todo UID
        uid: String,
    },
    /// Delete an object
    Delete {
        /// Calendar id
        calendar: String,
        /// Object UID
        uid: String,
    },
}

impl Cli {
    fn build_config(&self) -> Result<CalDavConfig, Box<dyn Error>> {
        // Read from environment variables first
        let server = self
            .server
            .clone()
            .or_else(|| std::env::var("DAVCAL_CALDAV_SERVER").ok())
            .ok_or_else(|| {
                "DAVCAL_CALDAV_SERVER must be provided via --server or DAVCAL_CALDAV_SERVER env var"
                    .to_string()
            })?;

        let username = self
            .username
            .clone()
            .or_else(|| std::env::var("DAVCAL_CALDAV_USERNAME").ok());

        let password = self
            .password
            .clone()
            .or_else(|| std::env::var("DAVCAL_CALDAV_PASSWORD").ok());

        let token = self
            .token
            .clone()
            .or_else(|| std::env::var("DAVCAL_CALDAV_TOKEN").ok());

        let auth = if let Some(token) = token {
            AuthMethod::Bearer { token }
        } else if let (Some(username), Some(password)) = (username, password) {
            AuthMethod::Basic { username, password }
        } else {
            AuthMethod::None
        };

        let server_family = match &self.family {
            Some(family) => Some(serde_json::from_value::<ServerFamily>(
                serde_json::Value::String(family.clone()),
            )?),
            None => None,
        };

        Ok(CalDavConfig {
            base_url: server,
            calendar_home: self.home.clone(),
            auth,
            timeout_secs: self.timeout,
            user_agent: "davcal-caldav-cli/0.1.0".to_string(),
            server: server_family,
            quirks: self.quirks.clone(),
            ..Default::default()
        })
    }
}

async fn cmd_discover(client: &DavClient) -> Result<(), Box<dyn Error>> {
    if client.supports_calendar_access().await? {
        println!("{}", "✓ CalDAV support detected".green());
    } else {
        println!("{}", "⚠ Server doesn't advertise calendar-access".yellow());
    }

    let mut principal = client.principal().await?;
    println!("Principal:     {}", principal.url());
    let home = principal.calendar_home_set().await?;
    println!("Calendar home: {}", home.url());

    let rules: Vec<String> = client.quirks().iter().map(|q| q.to_string()).collect();
    if !rules.is_empty() {
        println!("\nCompatibility rules: {}", rules.join(", "));
    }
    Ok(())
}

async fn cmd_list_cals(principal: &mut Principal) -> Result<(), Box<dyn Error>> {
    let calendars = principal.calendars().await?;

    if calendars.is_empty() {
        println!("No calendars found");
        return Ok(());
    }

    println!("{:-<100}", "");
    println!("{:<30} {:<30} {:<20}", "Id", "Name", "Components");
    println!("{:-<100}", "");

    for cal in &calendars {
        let id = cal.id().unwrap_or_default();
        let name = cal.name().unwrap_or("Unnamed");
        let components: Vec<&str> = cal.components().iter().map(|c| c.name()).collect();
        println!("{:<30} {:<30} {}", id, name, components.join(", "));
    }

    Ok(())
}

async fn cmd_make_cal(
    principal: &mut Principal,
    name: &str,
    id: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let calendar = principal
        .make_calendar(Some(name), id, &[ComponentKind::Event, ComponentKind::Todo])
        .await?;
    println!("{} {}", "Created".green(), calendar.url());
    Ok(())
}

async fn cmd_list_events(
    calendar: &Calendar,
    start: &str,
    end: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let start = parse_date_to_utc(start)?;
    let end = end.map(parse_date_to_utc).transpose()?;

    let result = calendar
        .date_search(start, end, Some(ComponentKind::Event))
        .await?;

    if result.objects.is_empty() {
        println!("No events found");
    }
    for event in &result.objects {
        print_object(event);
    }
    for failure in &result.failures {
        println!(
            "{} {} ({})",
            "Skipped".yellow(),
            failure.href,
            failure.status.map_or("?".to_string(), |s| s.to_string())
        );
    }
    Ok(())
}

async fn cmd_free_busy(calendar: &Calendar, start: &str, end: &str) -> Result<(), Box<dyn Error>> {
    let start = parse_date_to_utc(start)?;
    let end = parse_date_to_utc(end)?;

    let freebusy = calendar.freebusy_request(start, end).await?;
    println!("{}", freebusy.data);
    Ok(())
}

async fn cmd_list_todos(calendar: &Calendar, all: bool) -> Result<(), Box<dyn Error>> {
    let result = calendar.todos(all).await?;

    if result.objects.is_empty() {
        println!("No todos found");
    }
    for todo in &result.objects {
        let status = davcal_caldav::ical::property_value(todo.data(), "STATUS")
            .unwrap_or_else(|| "NEEDS-ACTION".to_string());
        let status = match status.as_str() {
            "COMPLETED" => status.green(),
            "CANCELLED" => status.red(),
            _ => status.yellow(),
        };
        print!("[{status}] ");
        print_object(todo);
    }
    Ok(())
}

fn print_object(object: &CalendarObject) {
    let summary = davcal_caldav::ical::property_value(object.data(), "SUMMARY")
        .unwrap_or_else(|| "(no summary)".to_string());
    let when = object
        .due()
        .or_else(|| object.start())
        .map_or_else(String::new, |dt| dt.to_string());
    println!(
        "{:<40} {:<20} {}",
        summary.bold(),
        when,
        object.uid().unwrap_or_default().dimmed()
    );
}

/// Read iCalendar data from a file or stdin.
fn read_icalendar(input: &str) -> Result<String, Box<dyn Error>> {
    let content = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input)?
    };
    Ok(content)
}

async fn cmd_get(calendar: &Calendar, uid: &str) -> Result<(), Box<dyn Error>> {
    let object = calendar.object_by_uid(uid, None).await?;
    println!("{} {}", "Url:".bold(), object.url());
    if let Some(etag) = object.etag() {
        println!("{} {}", "ETag:".bold(), etag);
    }
    println!("\n{}", object.data());
    Ok(())
}

async fn cmd_add(calendar: &Calendar, input: &str) -> Result<(), Box<dyn Error>> {
    let data = read_icalendar(input)?;
    let object = calendar.add_object(data).await?;
    println!("{} {}", "Created".green(), object.url());
    Ok(())
}

async fn cmd_edit(calendar: &Calendar, uid: &str, input: &str) -> Result<(), Box<dyn Error>> {
    let mut object = calendar.object_by_uid(uid, None).await?;
    object.set_data(read_icalendar(input)?);
    object.save().await?;
    println!("{} {}", "Updated".green(), object.url());
    Ok(())
}

async fn cmd_complete(calendar: &Calendar, uid: &str) -> Result<(), Box<dyn Error>> {
    let mut todo = calendar.todo_by_uid(uid).await?;
    todo.complete(None).await?;
    println!("{} {}", "Completed".green(), todo.url());
    Ok(())
}

async fn cmd_delete(calendar: &Calendar, uid: &str) -> Result<(), Box<dyn Error>> {
    let mut object = calendar.object_by_uid(uid, None).await?;
    object.delete().await?;
    println!("{} {}", "Deleted".green(), object.url());
    Ok(())
}

/// Parse a date string to a UTC timestamp.
///
/// Accepts formats like:
/// - "today" → today at 00:00:00 UTC
/// - "2025-01-01" → 2025-01-01T00:00:00Z
/// - "2025-01-01T12:00:00Z" → passed through
fn parse_date_to_utc(date: &str) -> Result<Timestamp, String> {
    let to_utc = |d: jiff::civil::Date| {
        d.to_zoned(jiff::tz::TimeZone::UTC)
            .map(|z| z.timestamp())
            .map_err(|e| format!("Failed to convert to UTC: {e}"))
    };

    if date.eq_ignore_ascii_case("today") {
        return to_utc(jiff::Zoned::now().date());
    }
    if let Ok(d) = jiff::civil::Date::strptime("%Y-%m-%d", date) {
        return to_utc(d);
    }
    date.parse::<Timestamp>().map_err(|_| {
        format!("Invalid date format: '{date}'. Use YYYY-MM-DD, today, or full datetime")
    })
}

/// Format error for user-friendly display.
fn format_error(err: &(dyn Error + 'static)) -> String {
    let prefix = "Error:".red().bold();
    match err.downcast_ref::<CalDavError>() {
        Some(CalDavError::Authorization { .. }) => format!("{prefix} Authentication failed"),
        Some(CalDavError::NotFound { href, .. }) => format!("{prefix} Resource not found: {href}"),
        Some(CalDavError::PreconditionFailed { .. }) => format!(
            "{prefix} ETag conflict - resource was modified by another client"
        ),
        Some(CalDavError::Transport(_)) => format!(
            "{prefix} Network error - check server URL and connection"
        ),
        _ => format!("{prefix} {err}"),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env files (if they exist)
    // Priority: .env.local (highest) -> .env -> existing environment variables (lowest)
    dotenvy::dotenv().ok(); // Load .env
    dotenvy::from_filename(".env.local").ok(); // Load .env.local (overrides .env)

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.build_config()?;
    let client = DavClient::new(&config)?;

    // Create a new runtime for the async operations
    let runtime = tokio::runtime::Runtime::new()?;

    let result: Result<(), Box<dyn Error>> = runtime.block_on(async {
        if let Commands::Discover = cli.command {
            return cmd_discover(&client).await;
        }

        let mut principal = client.principal().await?;

        match cli.command {
            Commands::Discover => Ok(()),
            Commands::ListCals => cmd_list_cals(&mut principal).await,
            Commands::MakeCal { name, id } => {
                cmd_make_cal(&mut principal, &name, id.as_deref()).await
            }
            Commands::ListEvents {
                calendar: id,
                start,
                end,
            } => {
                let cal = principal.calendar(&id).await?;
                cmd_list_events(&cal, &start, end.as_deref()).await
            }
            Commands::FreeBusy {
                calendar: id,
                start,
                end,
            } => {
                let cal = principal.calendar(&id).await?;
                cmd_free_busy(&cal, &start, &end).await
            }
            Commands::ListTodos { calendar: id, all } => {
                let cal = principal.calendar(&id).await?;
                cmd_list_todos(&cal, all).await
            }
            Commands::Get { calendar: id, uid } => {
                let cal = principal.calendar(&id).await?;
                cmd_get(&cal, &uid).await
            }
            Commands::Add {
                calendar: id,
                input,
            } => {
                let cal = principal.calendar(&id).await?;
                cmd_add(&cal, &input).await
            }
            Commands::Edit {
                calendar: id,
                uid,
                input,
            } => {
                let cal = principal.calendar(&id).await?;
                cmd_edit(&cal, &uid, &input).await
            }
            Commands::Complete { calendar: id, uid } => {
                let cal = principal.calendar(&id).await?;
                cmd_complete(&cal, &uid).await
            }
            Commands::Delete { calendar: id, uid } => {
                let cal = principal.calendar(&id).await?;
                cmd_delete(&cal, &uid).await
            }
        }
    });

    if let Err(e) = result {
        // Flush stdout before printing error
        std::io::stdout().flush().ok();
        eprintln!("{}", format_error(e.as_ref()));
        std::process::exit(1);
    }

    Ok(())
}
