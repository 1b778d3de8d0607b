//! `jetscout` - match-scouting CLI
//!
//! Fill in and submit scouting records, list and export what has been
//! collected, and follow new submissions live.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

use jetscout::cli::{
    Cli, Command, ConfigCommand, ExportCommand, ListCommand, ListScope, OutputFormat,
    SubmitCommand, WatchCommand,
};
use jetscout::timer::format_elapsed;
use jetscout::{
    init_logging, Config, FormController, Gateway, IdentityProvider, LiveView, ScoutingRecord,
    Storage, UserId,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;
    let caller = config.caller_identity(cli.user.as_deref()).current_caller();

    match cli.command {
        Command::Submit(cmd) => handle_submit(&config, caller.as_ref(), cmd).await,
        Command::Defaults => {
            println!("{}", serde_json::to_string_pretty(&ScoutingRecord::default())?);
            Ok(())
        }
        Command::List(cmd) => handle_list(&config, caller.as_ref(), &cmd),
        Command::Export(cmd) => handle_export(&config, caller.as_ref(), cmd),
        Command::Watch(cmd) => handle_watch(&config, caller.as_ref(), cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_gateway(config: &Config) -> anyhow::Result<Gateway> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening scouting database {}", path.display()))?;
    Ok(Gateway::new(storage)?)
}

async fn handle_submit(
    config: &Config,
    caller: Option<&UserId>,
    cmd: SubmitCommand,
) -> anyhow::Result<()> {
    let gateway = open_gateway(config)?;
    let mut form = FormController::new(gateway, config.timer_tick());

    if let Some(path) = &cmd.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let Value::Object(fields) = serde_json::from_str::<Value>(&text)? else {
            bail!("{} must contain a JSON object of form fields", path.display());
        };
        for (field, value) in fields {
            form.update(&field, value)?;
        }
    }

    for assignment in &cmd.fields {
        form.update_text(&assignment.field, &assignment.value)?;
    }

    if cmd.time_auto {
        time_auto(&mut form).await?;
    }

    let id = form.submit(caller).await?;
    println!("Submitted scouting record {id}");
    Ok(())
}

async fn time_auto(form: &mut FormController<Gateway>) -> anyhow::Result<()> {
    form.start_timer();
    eprintln!("Auto timer running. Press Enter to stop.");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    form.stop_timer();
    eprintln!("Auto: {}", format_elapsed(form.record().auto_timer));
    Ok(())
}

fn handle_list(config: &Config, caller: Option<&UserId>, cmd: &ListCommand) -> anyhow::Result<()> {
    let gateway = open_gateway(config)?;
    if caller.is_none() {
        eprintln!("Not signed in; pass --user or set identity.user to see records.");
    }

    let records = match cmd.scope() {
        ListScope::All => gateway.all_records(caller)?,
        ListScope::Mine => gateway.my_records(caller)?,
        ListScope::Match(n) => gateway.match_records(caller, n)?,
        ListScope::Team(n) => gateway.team_records(caller, n)?,
    };

    let mut view = LiveView::from_records(records);
    if let Some(filter) = &cmd.filter {
        view.set_filter(filter.as_str());
    }

    match cmd.format {
        OutputFormat::Table => {
            print!(
                "{}",
                view.render_table(Utc::now(), config.recent_window(), cmd.limit)
            );
            println!("{} entries", view.entry_count());
        }
        OutputFormat::Json => {
            let rows: Vec<_> = view.rows().collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Csv => {
            if view.entry_count() > 0 {
                print!("{}", view.export_csv()?);
            }
        }
    }
    Ok(())
}

fn handle_export(
    config: &Config,
    caller: Option<&UserId>,
    cmd: ExportCommand,
) -> anyhow::Result<()> {
    let gateway = open_gateway(config)?;
    let mut view = LiveView::from_records(gateway.all_records(caller)?);
    if let Some(filter) = cmd.filter {
        view.set_filter(filter);
    }

    if view.entry_count() == 0 {
        eprintln!("No data to export.");
        return Ok(());
    }

    let dir = cmd.output_dir.unwrap_or_else(|| config.export_dir());
    let path = view.write_export(
        &dir,
        config.export.file_prefix.trim(),
        Utc::now().date_naive(),
    )?;
    println!("Exported {} records to {}", view.entry_count(), path.display());
    Ok(())
}

async fn handle_watch(
    config: &Config,
    caller: Option<&UserId>,
    cmd: WatchCommand,
) -> anyhow::Result<()> {
    if caller.is_none() {
        println!("0 entries (not signed in)");
        return Ok(());
    }

    let gateway = open_gateway(config)?;
    let mut subscription = gateway.subscribe_all(caller)?;
    let poller = gateway.spawn_poller(config.poll_interval());
    let rows = cmd.rows.unwrap_or(config.view.watch_rows);

    let mut view = LiveView::new();
    if let Some(filter) = cmd.filter {
        view.set_filter(filter);
    }
    view.apply_snapshot(subscription.current());
    print_watch_update(&view, config, rows);

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            res = view.follow(&mut subscription) => {
                if let Err(e) = res {
                    break Err(e);
                }
                print_watch_update(&view, config, rows);
            }
        }
    };

    poller.abort();
    outcome?;
    Ok(())
}

fn print_watch_update(view: &LiveView, config: &Config, rows: usize) {
    println!(
        "[{}] {} entries",
        chrono::Local::now().format("%H:%M:%S"),
        view.entry_count()
    );
    print!("{}", view.render_table(Utc::now(), config.recent_window(), rows));
    println!();
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let path = config.database_path();
    let stats = Storage::open(&path)?.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": path,
            "total_records": stats.total_records,
            "oldest_record": stats.oldest_record,
            "newest_record": stats.newest_record,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("jetscout status");
        println!("---------------");
        println!("Database:      {}", path.display());
        println!("Records:       {}", stats.total_records);
        if let Some(oldest) = stats.oldest_record {
            println!("Oldest:        {}", oldest.to_rfc3339());
        }
        if let Some(newest) = stats.newest_record {
            println!("Newest:        {}", newest.to_rfc3339());
        }
        println!("Size:          {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Identity]");
                println!(
                    "  User:               {}",
                    config.identity.user.as_deref().unwrap_or("(anonymous)")
                );
                println!();
                println!("[Form]");
                println!("  Timer tick (ms):    {}", config.form.timer_tick_ms);
                println!();
                println!("[View]");
                println!("  Recent window (s):  {}", config.view.recent_window_secs);
                println!("  Poll interval (ms): {}", config.view.poll_interval_ms);
                println!("  Watch rows:         {}", config.view.watch_rows);
                println!();
                println!("[Export]");
                println!("  Output dir:         {}", config.export_dir().display());
                println!("  File prefix:        {}", config.export.file_prefix);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path: PathBuf = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
