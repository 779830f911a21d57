//! CLI entry point for `imapdump`.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use imapdump::config::{self, Config};
use imapdump::download::{
    self, ExportEvent, ExportJob, ExportSummary, PriorProgress, ResumeChoice,
};
use imapdump::export::{eml, OutputLayout};
use imapdump::ledger::ProgressLedger;
use imapdump::transport::imap::ImapTransport;
use imapdump::transport::Session;

/// Environment variable holding the login password.
const PASSWORD_ENV: &str = "IMAPDUMP_PASSWORD";

#[derive(Parser)]
#[command(
    name = "imapdump",
    version,
    about = "Download every message of an IMAP folder as .eml files",
    long_about = "Download every message of an IMAP folder as .eml files, extract their \
                  attachments, and resume where a previous run stopped."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a folder (the default command)
    Export(ExportArgs),
    /// List the selectable folders on the server
    Folders(ConnectArgs),
    /// Show the saved progress of an export
    Status {
        /// Export root directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args, Debug, Default)]
struct ConnectArgs {
    /// IMAP server host name
    #[arg(short, long, value_name = "HOST", env = "IMAPDUMP_SERVER")]
    server: Option<String>,

    /// IMAP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Force implicit TLS
    #[arg(long, conflicts_with = "no_tls")]
    tls: bool,

    /// Disable TLS
    #[arg(long)]
    no_tls: bool,

    /// Login name
    #[arg(short, long, value_name = "NAME", env = "IMAPDUMP_USER")]
    user: Option<String>,
}

#[derive(Args, Debug, Default)]
struct ExportArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Folder to export (prompted for when omitted)
    #[arg(short, long)]
    folder: Option<String>,

    /// Export root directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Messages between progress checkpoints
    #[arg(long, value_name = "N")]
    checkpoint_interval: Option<usize>,

    /// Resume saved progress without asking
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Ignore saved progress and start over
    #[arg(long)]
    fresh: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Export(args)) => cmd_export(&args, &config),
        None => cmd_export(&ExportArgs::default(), &config),
        Some(Commands::Folders(args)) => cmd_folders(&args, &config),
        Some(Commands::Status { output, json }) => {
            let root = output.unwrap_or_else(|| config.export.output_dir.clone());
            cmd_status(&root, json)
        }
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    let log_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "imapdump.log".into());
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "imapdump", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Connect and log in, prompting for whatever the flags and config leave out.
fn open_session(args: &ConnectArgs, config: &Config) -> anyhow::Result<Session<ImapTransport>> {
    let mut server = config.server.clone();
    if let Some(port) = args.port {
        server.port = port;
    }
    if args.tls {
        server.tls = Some(true);
    } else if args.no_tls {
        server.tls = Some(false);
    }

    let host = match args.server.clone().filter(|h| !h.trim().is_empty()) {
        Some(host) => host,
        None if !server.host.trim().is_empty() => server.host.clone(),
        None => prompt("IMAP server", None)?,
    };
    if host.trim().is_empty() {
        anyhow::bail!("No IMAP server given");
    }
    let user = match args.user.clone().or_else(|| {
        Some(server.username.clone()).filter(|u| !u.is_empty())
    }) {
        Some(user) => user,
        None => prompt("Username", None)?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => prompt_password(&format!("Password for {user}"))?,
    };

    let endpoint = server.endpoint(&host);
    println!(
        "  Connecting to {} ({})",
        endpoint.address(),
        if endpoint.tls { "TLS" } else { "plain" }
    );
    let transport = ImapTransport::connect(&endpoint)?;
    let mut session = Session::new(endpoint.host.clone(), transport);
    session.authenticate(&user, &password)?;
    println!("  Logged in as {user}");
    Ok(session)
}

/// List selectable folders.
fn cmd_folders(args: &ConnectArgs, config: &Config) -> anyhow::Result<()> {
    let mut session = open_session(args, config)?;
    let folders = session.list_folders()?;
    session.close();

    println!();
    for name in &folders {
        println!("  {name}");
    }
    println!();
    println!("  {} folder(s)", folders.len());
    Ok(())
}

/// Export one folder, resuming earlier progress when the operator agrees.
fn cmd_export(args: &ExportArgs, config: &Config) -> anyhow::Result<()> {
    let root = args
        .output
        .clone()
        .unwrap_or_else(|| config.export.output_dir.clone());
    let layout = OutputLayout::new(&root);
    let ledger = ProgressLedger::for_root(&root);

    let mut session = open_session(&args.connect, config)?;

    // Any answer about saved progress also stands as the go-ahead.
    let mut resume = ResumeChoice::Fresh;
    let mut folder = args.folder.clone();
    let mut answered = false;
    if !args.fresh {
        match download::inspect_prior(ledger.load(), session.server(), folder.as_deref()) {
            PriorProgress::Absent => {}
            PriorProgress::Resumable(prior) => {
                println!(
                    "  Found saved progress: {}/{} messages from '{}' (last saved {})",
                    prior.processed_count,
                    prior.total_emails,
                    prior.folder,
                    prior.timestamp.format("%Y-%m-%d %H:%M")
                );
                if args.resume || confirm("Resume this export?", true, args.yes)? {
                    folder = Some(prior.folder.clone());
                    resume = ResumeChoice::Resume(prior);
                }
                answered = true;
            }
            PriorProgress::OtherJob(prior) => {
                println!(
                    "  Saved progress for '{}' on {} ({}/{} messages) would be replaced",
                    prior.folder, prior.server, prior.processed_count, prior.total_emails
                );
                if !confirm("Discard it and continue?", false, args.yes)? {
                    println!("  Cancelled");
                    return Ok(());
                }
                answered = true;
            }
        }
    }

    let folder = match folder {
        Some(folder) => folder,
        None => match choose_folder(&mut session, &config.export.folder, args.yes)? {
            Some(folder) => folder,
            None => {
                println!("  Cancelled");
                return Ok(());
            }
        },
    };

    if !answered
        && !confirm(
            &format!("Download '{folder}' into {}?", root.display()),
            true,
            args.yes,
        )?
    {
        println!("  Cancelled");
        return Ok(());
    }

    let mut job = ExportJob::new(layout, folder);
    job.checkpoint_interval = args
        .checkpoint_interval
        .unwrap_or(config.export.checkpoint_interval);
    job.write_instructions = config.export.write_instructions;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))?;
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Downloading [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let result = download::run(&mut session, &job, resume, &cancel, &mut |event| {
        report(&pb, event)
    });
    pb.finish_and_clear();
    session.close();

    let summary = result?;
    print_summary(&summary, start.elapsed());
    Ok(())
}

/// Show the server's folders and ask which one to export.
///
/// `None` means the operator backed out.
fn choose_folder(
    session: &mut Session<ImapTransport>,
    default: &str,
    yes: bool,
) -> anyhow::Result<Option<String>> {
    let folders = match session.list_folders() {
        Ok(folders) => folders,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list folders");
            Vec::new()
        }
    };

    if yes {
        return Ok(Some(default.to_string()));
    }

    if !folders.is_empty() {
        println!();
        println!("  Available folders:");
        for name in &folders {
            println!("    {name}");
        }
        println!();
    }

    let chosen = prompt("Folder", Some(default))?;
    if chosen.is_empty() {
        return Ok(None);
    }
    if !folders.is_empty() && !folders.iter().any(|f| f == &chosen) {
        println!("  '{chosen}' is not in the folder list; similar names will be tried");
        if !confirm("Continue anyway?", false, false)? {
            return Ok(None);
        }
    }
    Ok(Some(chosen))
}

/// Drive the progress bar from export events.
fn report(pb: &ProgressBar, event: ExportEvent) {
    match event {
        ExportEvent::FolderResolved { requested, name } => {
            if requested != name {
                pb.println(format!("  Using folder '{name}' for '{requested}'"));
            }
        }
        ExportEvent::Enumerated { total } => {
            pb.println(format!("  {total} message(s) in folder"));
        }
        ExportEvent::Reconciled {
            pending,
            already_done,
        } => {
            if already_done > 0 {
                pb.println(format!(
                    "  {already_done} already downloaded, {pending} remaining"
                ));
            }
            pb.set_length(pending as u64);
        }
        ExportEvent::MessageSaved { .. } => pb.inc(1),
        ExportEvent::MessageSkipped { id, reason, .. } => {
            pb.println(format!("  Skipped message {id}: {reason}"));
            pb.inc(1);
        }
        ExportEvent::Checkpoint { processed, .. } => {
            pb.set_message(format!("saved {processed}"));
        }
        ExportEvent::CheckpointFailed { reason, .. } => {
            pb.println(format!("  Could not save progress: {reason}"));
        }
        ExportEvent::Interrupted { .. } => {
            pb.println("  Interrupted, saving progress");
        }
    }
}

fn print_summary(summary: &ExportSummary, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    if summary.total_emails == 0 {
        println!("  Folder '{}' is empty, nothing to download", summary.folder);
        println!();
        return;
    }

    println!("  {:<22} {}", "Folder", summary.folder);
    println!(
        "  {:<22} {}/{}",
        "Downloaded", summary.processed_count, summary.total_emails
    );
    println!("  {:<22} {}", "This run", summary.successful_downloads);
    println!(
        "  {:<22} {}",
        "Written",
        format_size(summary.bytes_written, BINARY)
    );
    println!("  {:<22} {:.2?}", "Time", elapsed);
    if !summary.skipped.is_empty() {
        let ids: Vec<String> = summary.skipped.iter().map(|id| id.to_string()).collect();
        println!("  {:<22} {}", "Skipped", ids.join(", "));
    }
    println!("  {:<22} {}", "Output", summary.output_root.display());

    if summary.interrupted {
        println!();
        println!("  Stopped early. Run again to resume.");
    } else if !summary.completed {
        println!();
        println!("  Some messages failed. Run again to retry them.");
    }
    println!();
}

/// Print the saved progress of an export root.
fn cmd_status(root: &Path, json: bool) -> anyhow::Result<()> {
    let ledger = ProgressLedger::for_root(root);
    let state = ledger.load();
    let archived = eml::archived_ids(&OutputLayout::new(root).emails_dir()).len();

    if json {
        let output = serde_json::json!({
            "output_root": root.to_string_lossy(),
            "archived_files": archived,
            "progress": state,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {:<22} {}", "Output", root.display());
    println!("  {:<22} {}", "Archived files", archived);
    match state {
        Some(state) => {
            println!("  {:<22} {}", "Server", state.server);
            println!("  {:<22} {}", "Folder", state.folder);
            println!(
                "  {:<22} {}/{}",
                "Downloaded", state.processed_count, state.total_emails
            );
            if let Some(last) = state.last_processed_id {
                println!("  {:<22} {}", "Last message", last);
            }
            println!(
                "  {:<22} {}",
                "Last saved",
                state.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None if ledger.exists() => {
            println!("  {:<22} unreadable ({})", "Progress", ledger.path().display());
        }
        None => println!("  {:<22} none", "Progress"),
    }
    println!();
    Ok(())
}

// ── Prompts ─────────────────────────────────────────────────────

/// Read one line from stdin, falling back to `default` on empty input.
fn prompt(label: &str, default: Option<&str>) -> anyhow::Result<String> {
    match default {
        Some(d) => print!("  {label} [{d}]: "),
        None => print!("  {label}: "),
    }
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim();
    Ok(match (answer.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => answer.to_string(),
    })
}

/// Ask a yes/no question. `assume_yes` skips the prompt.
fn confirm(question: &str, default_yes: bool, assume_yes: bool) -> anyhow::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let hint = if default_yes { "Y/n" } else { "y/N" };
    let answer = prompt(&format!("{question} ({hint})"), None)?.to_lowercase();
    Ok(match answer.as_str() {
        "" => default_yes,
        a => a.starts_with('y'),
    })
}

/// Read a password without echo. Falls back to a plain line when stdin is
/// not a terminal.
fn prompt_password(label: &str) -> anyhow::Result<String> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
    use crossterm::terminal;

    if !std::io::stdin().is_terminal() {
        return prompt(label, None);
    }

    print!("  {label}: ");
    std::io::stdout().flush()?;

    terminal::enable_raw_mode()?;
    let entered = (|| -> anyhow::Result<Option<String>> {
        let mut secret = String::new();
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(Some(secret)),
                KeyCode::Esc => return Ok(None),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None)
                }
                KeyCode::Char(c) => secret.push(c),
                KeyCode::Backspace => {
                    secret.pop();
                }
                _ => {}
            }
        }
    })();
    terminal::disable_raw_mode()?;
    println!();

    match entered? {
        Some(secret) => Ok(secret),
        None => anyhow::bail!("Password entry cancelled"),
    }
}
