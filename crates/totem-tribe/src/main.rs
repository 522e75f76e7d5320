//! totem CLI
//!
//! Tracks the local member's habits and keeps the tribe informed.
//!
//! Usage:
//!   totem connect [url]
//!   totem join <name> <habit1> <habit2> <habit3> <habit4> <habit5>
//!   totem toggle <habit> [YYYY-MM-DD]
//!   totem status
//!   ...

use std::process;
use totem_core::{DayKey, MonthKey, Settings, HABITS_PER_DAY};
use totem_tribe::{Error, Result, TribeConfig, TribeStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Days filled by `totem simulate` without an argument.
const DEFAULT_SIMULATED_DAYS: u32 = 5;

/// A parsed command line.
#[derive(Debug, PartialEq)]
enum Command {
    Connect { url: Option<String> },
    Disconnect,
    Join { name: String, habits: [String; HABITS_PER_DAY] },
    Use { member_id: String },
    SignOut,
    Toggle { index: usize, date: Option<DayKey> },
    Rename { index: usize, text: String },
    Override { index: usize, text: String, date: Option<DayKey> },
    ClearOverride { index: usize, date: Option<DayKey> },
    Settings { offset: u8, timezone: Option<String> },
    Status,
    Stats { month: Option<MonthKey> },
    Sync { date: Option<DayKey> },
    Penalties,
    Simulate { days: u32 },
    Reset,
    Leave,
    Members,
}

fn print_usage() {
    eprintln!("totem - Digital Totem habit tracker");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  totem connect [url]                      Connect to a tribe (\"mock\" runs offline)");
    eprintln!("  totem disconnect                         Forget the tribe URL");
    eprintln!("  totem join <name> <h1> <h2> <h3> <h4> <h5>");
    eprintln!("                                           Join the tribe with five habits");
    eprintln!("  totem use <member_id>                    Act as an existing member");
    eprintln!("  totem sign-out                           Stop acting as any member");
    eprintln!("  totem toggle <habit> [date]              Flip a habit (1-5) for today or a date");
    eprintln!("  totem rename <habit> <text>              Rename a habit");
    eprintln!("  totem override <habit> <text> [date]     Rename a habit for one day");
    eprintln!("  totem clear-override <habit> [date]      Drop a one-day rename");
    eprintln!("  totem settings <offset> [timezone]       Set day-end offset (0-8h) and timezone");
    eprintln!("  totem status                             Show today's habits and the tribe");
    eprintln!("  totem stats [YYYY-MM]                    Monthly penalty leaderboard");
    eprintln!("  totem sync [date]                        Push a day to the tribe");
    eprintln!("  totem penalties                          Recalculate the visit fund");
    eprintln!("  totem simulate [days]                    Fill past days with random logs (default 5)");
    eprintln!("  totem reset                              Clear your history and visit fund");
    eprintln!("  totem leave                              Remove yourself from the tribe");
    eprintln!("  totem members                            List tribe members");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TOTEM_DATA_DIR            Local data directory (default: ./totem-data)");
    eprintln!("  TOTEM_TRIBE_URL           Tribe to connect to when none is stored");
    eprintln!("  TOTEM_TIMEZONE            Default timezone for members (falls back to TZ, then the host zone)");
    eprintln!("  TOTEM_HTTP_TIMEOUT_SECS   Request timeout (default: 30)");
    eprintln!("  TOTEM_FUND_GOAL_NAME      What the fund saves for (default: Flight Ticket)");
    eprintln!("  TOTEM_FUND_GOAL_AMOUNT    Fund goal (default: 8000)");
    eprintln!("  RUST_LOG                  Log filter (default: totem=info,totem_tribe=info)");
}

fn parse_command(args: &[String]) -> std::result::Result<Command, String> {
    let Some((name, rest)) = args.split_first() else {
        return Err("missing command".into());
    };
    let arg = |i: usize, what: &str| {
        rest.get(i)
            .cloned()
            .ok_or_else(|| format!("{} requires a {} argument", name, what))
    };

    let command = match name.as_str() {
        "connect" => Command::Connect {
            url: rest.first().cloned(),
        },
        "disconnect" => Command::Disconnect,
        "join" => {
            if rest.len() != 1 + HABITS_PER_DAY {
                return Err(format!("join requires a name and {} habits", HABITS_PER_DAY));
            }
            Command::Join {
                name: rest[0].clone(),
                habits: std::array::from_fn(|i| rest[i + 1].clone()),
            }
        }
        "use" => Command::Use {
            member_id: arg(0, "member_id")?,
        },
        "sign-out" => Command::SignOut,
        "toggle" => Command::Toggle {
            index: parse_habit(&arg(0, "habit")?)?,
            date: parse_optional(rest.get(1))?,
        },
        "rename" => Command::Rename {
            index: parse_habit(&arg(0, "habit")?)?,
            text: arg(1, "text")?,
        },
        "override" => Command::Override {
            index: parse_habit(&arg(0, "habit")?)?,
            text: arg(1, "text")?,
            date: parse_optional(rest.get(2))?,
        },
        "clear-override" => Command::ClearOverride {
            index: parse_habit(&arg(0, "habit")?)?,
            date: parse_optional(rest.get(1))?,
        },
        "settings" => Command::Settings {
            offset: arg(0, "offset")?
                .parse()
                .map_err(|_| "offset must be a whole number of hours".to_string())?,
            timezone: rest.get(1).cloned(),
        },
        "status" => Command::Status,
        "stats" => Command::Stats {
            month: parse_optional(rest.first())?,
        },
        "sync" => Command::Sync {
            date: parse_optional(rest.first())?,
        },
        "penalties" => Command::Penalties,
        "simulate" => Command::Simulate {
            days: parse_optional(rest.first())?.unwrap_or(DEFAULT_SIMULATED_DAYS),
        },
        "reset" => Command::Reset,
        "leave" => Command::Leave,
        "members" => Command::Members,
        other => return Err(format!("unknown command {:?}", other)),
    };

    Ok(command)
}

/// Habits are numbered 1-5 on the command line.
fn parse_habit(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=HABITS_PER_DAY).contains(&n) => Ok(n - 1),
        _ => Err(format!("habit must be a number from 1 to {}", HABITS_PER_DAY)),
    }
}

fn parse_optional<T>(raw: Option<&String>) -> std::result::Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|s| s.parse().map_err(|e: T::Err| e.to_string()))
        .transpose()
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "totem=info,totem_tribe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = match parse_command(&args[1..]) {
        Ok(command) => command,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = run(command).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let store = TribeStore::open(TribeConfig::from_env())?;

    let connecting = matches!(command, Command::Connect { .. } | Command::Disconnect);
    if !connecting && !store.snapshot().is_connected() {
        if let Some(url) = store.config().tribe_url.clone() {
            if let Err(e) = store.connect_tribe(&url).await {
                tracing::warn!("Continuing without a tribe: {}", e);
            }
        }
    }

    if command != Command::Penalties && store.local_member().is_some() {
        store.calculate_penalties()?;
    }

    execute(&store, command).await?;

    store.settled().await;
    Ok(())
}

async fn execute(store: &TribeStore, command: Command) -> Result<()> {
    match command {
        Command::Connect { url } => {
            let url = url
                .or_else(|| store.config().tribe_url.clone())
                .ok_or_else(|| invalid("connect requires a URL or TOTEM_TRIBE_URL"))?;
            let count = store.connect_tribe(&url).await?;
            println!("Connected to {} ({} members)", url, count);
        }
        Command::Disconnect => {
            store.disconnect()?;
            println!("Disconnected");
        }
        Command::Join { name, habits } => {
            let id = store.create_member(&name, habits)?;
            println!("Joined as {} ({})", name.trim(), id);
        }
        Command::Use { member_id } => {
            store.select_member(&member_id)?;
            println!("Now acting as {}", member_id);
        }
        Command::SignOut => {
            store.sign_out()?;
            println!("Signed out");
        }
        Command::Toggle { index, date } => {
            let date = date.unwrap_or_else(|| store.today());
            let done = store.toggle_habit(date, index)?;
            let member = store.local_member().ok_or(Error::NoLocalMember)?;
            println!(
                "{} {} on {}",
                if done { "Done:" } else { "Undone:" },
                member.habit_text(date, index).unwrap_or_default(),
                date
            );
        }
        Command::Rename { index, text } => {
            store.update_habit_text(index, &text)?;
            println!("Habit {} is now {:?}", index + 1, text.trim());
        }
        Command::Override { index, text, date } => {
            let date = date.unwrap_or_else(|| store.today());
            store.set_override(date, index, &text)?;
            println!("Habit {} on {} is {:?}", index + 1, date, text.trim());
        }
        Command::ClearOverride { index, date } => {
            let date = date.unwrap_or_else(|| store.today());
            if store.clear_override(date, index)? {
                println!("Cleared override for habit {} on {}", index + 1, date);
            } else {
                println!("No override for habit {} on {}", index + 1, date);
            }
        }
        Command::Settings { offset, timezone } => {
            let current = store.local_member().map(|m| m.settings);
            store.update_settings(next_settings(offset, timezone, current.as_ref()))?;
            println!("Day now ends {}h after midnight; today is {}", offset, store.today());
        }
        Command::Status => print_status(store),
        Command::Stats { month } => {
            let month = month.unwrap_or_else(|| store.today().month());
            print_stats(store, month);
        }
        Command::Sync { date } => {
            store.sync(date)?;
            println!("Sync queued");
        }
        Command::Penalties => {
            let changed = store.calculate_penalties()?;
            let member = store.local_member().ok_or(Error::NoLocalMember)?;
            println!(
                "Visit fund: {}{}",
                member.visit_fund,
                if changed { " (updated)" } else { "" }
            );
        }
        Command::Simulate { days } => {
            let dates = store.simulate_history(days)?;
            let member = store.local_member().ok_or(Error::NoLocalMember)?;
            for date in &dates {
                println!("  {}  {}/{}", date, member.completed_on(*date), HABITS_PER_DAY);
            }
            println!("Visit fund: {}", member.visit_fund);
        }
        Command::Reset => {
            store.reset_progress()?;
            println!("History and visit fund cleared");
        }
        Command::Leave => {
            let member = store.local_member().ok_or(Error::NoLocalMember)?;
            store.delete_member(&member.id)?;
            println!("{} left the tribe", member.name);
        }
        Command::Members => {
            let doc = store.snapshot();
            let today = store.today();
            for member in doc.members.values() {
                let marker = if doc.local_user_id.as_ref() == Some(&member.id) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<24} {:<16} {}/{} today  fund {}",
                    marker,
                    member.id,
                    member.name,
                    member.completed_on(today),
                    HABITS_PER_DAY,
                    member.visit_fund
                );
            }
        }
    }
    Ok(())
}

/// Settings for `totem settings`. An omitted timezone keeps the current one.
fn next_settings(offset: u8, timezone: Option<String>, current: Option<&Settings>) -> Settings {
    Settings {
        day_end_offset: offset,
        timezone: timezone.or_else(|| current.and_then(|s| s.timezone.clone())),
    }
}

fn invalid(msg: &str) -> Error {
    totem_core::Error::InvalidInput(msg.to_string()).into()
}

fn print_status(store: &TribeStore) {
    let doc = store.snapshot();

    match doc.tribe_url.as_deref() {
        Some(url) if doc.is_offline() => println!("Tribe: {} (offline)", url),
        Some(url) => println!("Tribe: {}", url),
        None => println!("Tribe: not connected"),
    }
    if let Some(synced) = chrono::DateTime::from_timestamp_millis(doc.last_synced) {
        if doc.last_synced > 0 {
            println!("Last synced: {}", synced.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    if let Some(error) = &doc.error {
        println!("Error: {}", error);
    }

    match doc.local_member() {
        Some(member) => {
            let today = store.today();
            println!();
            println!("{} ({}), {}", member.name, member.id, today);
            let log = member.log(today);
            for (i, done) in log.iter().enumerate() {
                println!(
                    "  {}. [{}] {}",
                    i + 1,
                    if *done { "x" } else { " " },
                    member.habit_text(today, i).unwrap_or_default()
                );
            }
            if let (Some(streak), Some(mood)) = (store.streak(), store.mood()) {
                println!("Streak: {} days, mood: {}", streak, mood);
            }
            println!("Visit fund: {}", member.visit_fund);
        }
        None => {
            println!();
            println!("No member selected. Use `totem join` or `totem use`.");
        }
    }

    let goal = &store.config().fund_goal;
    println!();
    println!("Tribe mood: {}", store.tribe_mood());
    println!(
        "Tribe fund: {} / {} for {} ({:.1}%)",
        store.tribe_fund(),
        goal.amount,
        goal.name,
        store.fund_progress()
    );
}

fn print_stats(store: &TribeStore, month: MonthKey) {
    let report = store.monthly_report(month);
    println!("Stats for {}", report.month);
    for row in &report.members {
        println!(
            "  {:<16} {:>3} days  {:>5.1}% done  {:>4.1}/day  penalty {}",
            row.name, row.days_tracked, row.completion_rate, row.avg_daily, row.total_penalty
        );
    }
    println!("Total: {}", report.grand_total);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_toggle_with_optional_date() {
        assert_eq!(
            parse_command(&args("toggle 3")).unwrap(),
            Command::Toggle {
                index: 2,
                date: None
            }
        );
        assert_eq!(
            parse_command(&args("toggle 1 2024-05-01")).unwrap(),
            Command::Toggle {
                index: 0,
                date: Some("2024-05-01".parse().unwrap())
            }
        );
    }

    #[test]
    fn habit_numbers_are_one_based() {
        assert!(parse_command(&args("toggle 0")).is_err());
        assert!(parse_command(&args("toggle 6")).is_err());
        assert!(parse_command(&args("toggle five")).is_err());
    }

    #[test]
    fn join_needs_five_habits() {
        assert!(parse_command(&args("join Ada a b c d")).is_err());
        let Command::Join { name, habits } = parse_command(&args("join Ada a b c d e")).unwrap()
        else {
            panic!("expected join");
        };
        assert_eq!(name, "Ada");
        assert_eq!(habits[4], "e");
    }

    #[test]
    fn parses_settings_and_stats() {
        assert_eq!(
            parse_command(&args("settings 3 Asia/Kolkata")).unwrap(),
            Command::Settings {
                offset: 3,
                timezone: Some("Asia/Kolkata".into())
            }
        );
        assert!(parse_command(&args("settings soon")).is_err());
        assert!(parse_command(&args("stats 2024-13")).is_err());
        assert_eq!(
            parse_command(&args("stats")).unwrap(),
            Command::Stats { month: None }
        );
    }

    #[test]
    fn settings_without_timezone_keep_the_current_one() {
        let current = Settings {
            day_end_offset: 0,
            timezone: Some("Asia/Kolkata".into()),
        };

        let Command::Settings { offset, timezone } = parse_command(&args("settings 3")).unwrap()
        else {
            panic!("expected settings");
        };
        let next = next_settings(offset, timezone, Some(&current));
        assert_eq!(next.day_end_offset, 3);
        assert_eq!(next.timezone.as_deref(), Some("Asia/Kolkata"));

        let next = next_settings(2, Some("Europe/Paris".into()), Some(&current));
        assert_eq!(next.timezone.as_deref(), Some("Europe/Paris"));

        assert_eq!(next_settings(1, None, None).timezone, None);
    }

    #[test]
    fn parses_simulate_and_reset() {
        assert_eq!(
            parse_command(&args("simulate")).unwrap(),
            Command::Simulate { days: 5 }
        );
        assert_eq!(
            parse_command(&args("simulate 12")).unwrap(),
            Command::Simulate { days: 12 }
        );
        assert!(parse_command(&args("simulate lots")).is_err());
        assert_eq!(parse_command(&args("reset")).unwrap(), Command::Reset);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(parse_command(&args("dance")).is_err());
        assert!(parse_command(&[]).is_err());
    }
}
