use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use konspekt_core::{
    Annotation, CompletionReport, CompletionStatus, OperationKind, Role, SessionController,
    SessionError, Ticket, VideoSelection,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::commands::{self, Command, HELP};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn spinner_message(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::SelectVideo => "Loading video...",
        OperationKind::GenerateKeypoints => "Generating keypoints...",
        OperationKind::ChatResponse => "Thinking...",
    }
}

/// Spinners for calls that are still running.
#[derive(Default)]
struct InFlight {
    spinners: HashMap<Ticket, (ProgressBar, Instant)>,
}

impl InFlight {
    fn start(&mut self, ticket: Ticket) {
        let spinner = create_spinner(spinner_message(ticket.kind));
        self.spinners.insert(ticket, (spinner, Instant::now()));
    }

    fn finish(&mut self, ticket: Ticket) -> Option<Duration> {
        let (spinner, started) = self.spinners.remove(&ticket)?;
        spinner.finish_and_clear();
        Some(started.elapsed())
    }

    /// Keep spinners out of the way of regular output.
    fn suspend<F: FnOnce()>(&self, f: F) {
        match self.spinners.values().next() {
            Some((spinner, _)) => spinner.suspend(f),
            None => f(),
        }
    }
}

pub async fn run(
    controller: &mut SessionController,
    initial: Option<VideoSelection>,
) -> Result<()> {
    let mut in_flight = InFlight::default();

    print_video(controller);
    if let Some(selection) = initial {
        dispatch(controller, &mut in_flight, Command::Select(selection));
    }
    println!("{}", style("Type /help for commands.").dim());
    println!("{}", style("─".repeat(60)).dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(report) = controller.next_completion(), if controller.has_pending() => {
                let elapsed = in_flight.finish(report.ticket);
                debug!(
                    kind = %report.ticket.kind,
                    seq = report.ticket.seq,
                    status = ?report.status,
                    elapsed_ms = elapsed.map(|d| d.as_millis() as u64),
                    "completion applied"
                );
                in_flight.suspend(|| print_report(controller, &report, elapsed));
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed, leaving");
                    break;
                };
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => dispatch(controller, &mut in_flight, command),
                    Err(message) => in_flight.suspend(|| {
                        println!("{} {}", style("✗").red().bold(), message)
                    }),
                }
            }
        }
    }

    for ticket in in_flight.spinners.keys().copied().collect::<Vec<_>>() {
        in_flight.finish(ticket);
    }
    Ok(())
}

fn dispatch(controller: &mut SessionController, in_flight: &mut InFlight, command: Command) {
    let started = match command {
        Command::Select(selection) => controller.select_video(selection),
        Command::Keypoints => controller.generate_keypoints(),
        Command::Ask(question) => controller.submit_turn(&question),
        Command::Note(note) => {
            match controller.add_note(note) {
                Ok(notes) => {
                    let count = notes.len();
                    in_flight.suspend(|| {
                        println!("{} Note saved ({} total)", style("✓").green().bold(), count)
                    });
                }
                Err(e) => in_flight.suspend(|| print_error(&e)),
            }
            return;
        }
        Command::Notes => {
            in_flight.suspend(|| print_annotations(controller));
            return;
        }
        Command::Show => {
            let snapshot = serde_json::to_string_pretty(&controller.snapshot())
                .unwrap_or_else(|e| format!("failed to serialize session: {e}"));
            in_flight.suspend(|| println!("{snapshot}"));
            return;
        }
        Command::Help => {
            in_flight.suspend(|| println!("{HELP}"));
            return;
        }
        Command::Empty | Command::Quit => return,
    };

    match started {
        Ok(ticket) => {
            if ticket.kind == OperationKind::ChatResponse {
                if let Some(turn) = controller.transcript().last() {
                    in_flight.suspend(|| print_turn(turn.role, &turn.content));
                }
            }
            in_flight.start(ticket);
        }
        Err(e) => {
            debug!(error = %e, "intent not accepted");
            in_flight.suspend(|| print_error(&e))
        }
    }
}

fn print_error(error: &SessionError) {
    match error {
        SessionError::Validation(e) => println!(
            "{} {} {}",
            style("✗").red().bold(),
            e,
            style(format!("[{}]", e.field())).dim()
        ),
        SessionError::Rejected { .. } => {
            println!("{} {}", style("…").yellow().bold(), style(error).yellow())
        }
    }
}

fn print_report(
    controller: &SessionController,
    report: &CompletionReport,
    elapsed: Option<Duration>,
) {
    let took = elapsed
        .map(|d| style(format!("[{}]", format_duration(d))).dim().to_string())
        .unwrap_or_default();

    match &report.status {
        CompletionStatus::Applied => match report.ticket.kind {
            OperationKind::SelectVideo => {
                println!("{} Video selected {}", style("✓").green().bold(), took);
                print_video(controller);
            }
            OperationKind::GenerateKeypoints => {
                println!(
                    "{} Keypoints generated: {} {}",
                    style("✓").green().bold(),
                    controller.keypoints().len(),
                    took
                );
                print_list("AI Keypoints", controller.keypoints());
            }
            OperationKind::ChatResponse => {
                if let Some(turn) = controller.transcript().last() {
                    print_turn(turn.role, &turn.content);
                }
            }
        },
        CompletionStatus::Failed { reason } => println!(
            "{} {} failed: {} {}",
            style("✗").red().bold(),
            report.ticket.kind,
            reason,
            style("(try again)").dim()
        ),
        CompletionStatus::Discarded => println!(
            "{} {}",
            style("•").dim(),
            style(format!("Ignored {} for a previous video", report.ticket.kind)).dim()
        ),
    }
}

fn print_video(controller: &SessionController) {
    let video = controller.video();
    println!(
        "{} {}  {}",
        style("▶").red().bold(),
        style(video.title()).bold(),
        style(video.canonical_url()).cyan()
    );
    if let Some(description) = &video.description {
        println!("  {}", style(description).dim());
    }
}

fn print_turn(role: Role, content: &str) {
    match role {
        Role::User => println!("{} {}", style("you").green().bold(), content),
        Role::Assistant => println!("{} {}", style("assistant").blue().bold(), content),
    }
}

fn print_annotations(controller: &SessionController) {
    print_list("AI Keypoints", controller.keypoints());
    print_list("My Notes", controller.notes());
}

fn print_list(title: &str, annotations: &[Annotation]) {
    println!("\n{}", style(title).bold().underlined());
    if annotations.is_empty() {
        println!("  {}", style("Nothing here yet").dim());
    }
    for a in annotations {
        println!("  {} {}", style(&a.timestamp).blue(), style(&a.title).bold());
        println!("           {}", style(&a.description).dim());
    }
    println!();
}
