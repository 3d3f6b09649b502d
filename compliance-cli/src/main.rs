mod cli;
mod prompts;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

use compliance_core::filters::{encode, QueryParams};
use compliance_core::models::parse_due_date;
use compliance_core::{
    ensure_session, get_config_path, AnchorType, ConsoleConfig, ConsoleContext, DerivedStatus,
    DocumentPoller, DueFilter, FilterPatch, Frequency, HttpClient, ListController, ListView,
    Locale, MutationOutcome, PollStatus, RawStatus, Requirement, Revalidation, SessionState,
    StatusFilter, TriageDraft, WorkflowError,
};

use crate::cli::{Cli, Command, ConfigCommand, FilterArgs};
use crate::prompts::{prompt_triage_draft, TerminalHost};

type Controller = ListController<HttpClient, TerminalHost>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = get_config_path()?;
    let mut config = ConsoleConfig::load_or_default(&config_path)?;
    config.apply_env_overrides();

    if let Command::Config(cmd) = &cli.command {
        return handle_config_command(cmd, &config, &config_path);
    }

    let local = LocalSet::new();
    local.run_until(run(cli, config)).await
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, config: ConsoleConfig) -> Result<()> {
    let client = HttpClient::new(&config).context("Failed to create API client")?;
    let context = Rc::new(ConsoleContext::from_config(&config));

    let filters = match &cli.command {
        Command::List { filters } | Command::Watch { filters } => filters.clone(),
        _ => FilterArgs::default(),
    };
    let query = initial_query(cli.query.as_deref().unwrap_or_default(), &filters)?;
    let host = TerminalHost::new(query, config.login_url.clone(), cli.yes);

    let profile = match ensure_session(&client, &host, &context).await {
        Ok(SessionState::Authenticated(profile)) => profile,
        Ok(SessionState::Redirected) => bail!("Not signed in"),
        Err(err) => return Err(err).context("Failed to check session"),
    };

    if let Command::Whoami = &cli.command {
        println!("{}: {}", "ID".cyan(), profile.id);
        if let Some(name) = &profile.name {
            println!("{}: {}", "Name".cyan(), name);
        }
        if let Some(email) = &profile.email {
            println!("{}: {}", "Email".cyan(), email);
        }
        println!("{}: {}", "Acting as".cyan(), context.actor().unwrap_or_default());
        return Ok(());
    }

    if let Command::PollDocument { id } = &cli.command {
        return poll_document(client, id, &config).await;
    }

    let ctrl = ListController::new(client, host, context, &config);
    let result = dispatch(&ctrl, cli.command, &config).await;
    ctrl.unmount();
    if ctrl.host().was_redirected() {
        bail!("Session expired");
    }
    result
}

async fn dispatch(ctrl: &Controller, command: Command, config: &ConsoleConfig) -> Result<()> {
    match command {
        Command::List { .. } => {
            load(ctrl).await?;
            print_view(&ctrl.view(), ctrl.context().locale());
        }
        Command::Watch { .. } => watch(ctrl, config).await?,
        Command::Show { id } => {
            let record = ctrl
                .record(&id)
                .await
                .with_context(|| format!("Failed to load requirement {}", id))?;
            print_requirement(ctrl, &record);
        }
        Command::Complete { id } => {
            report(&id, ctrl.complete(&id).await)?;
        }
        Command::Archive { id, reason } => {
            let outcome = match reason {
                Some(reason) => ctrl.archive_with_reason(&id, &reason).await,
                None => ctrl.archive(&id).await,
            };
            report(&id, outcome)?;
        }
        Command::Restore { id } => {
            report(&id, ctrl.restore(&id).await)?;
        }
        Command::Dismiss { ids, all, reason } => {
            let selected = select_rows(ctrl, &ids, all).await?;
            let outcome = ctrl.dismiss(&selected, reason.as_deref()).await;
            report(&selected.join(", "), outcome)?;
        }
        Command::Triage {
            ids,
            status,
            frequency,
            anchor_type,
            anchor_date,
            interval,
            due,
            assignee,
            interactive,
        } => {
            let flags = TriageFlags {
                status,
                frequency,
                anchor_type,
                anchor_date,
                interval,
                due,
                assignee,
            };
            triage(ctrl, &ids, flags, interactive).await?;
        }
        Command::Whoami | Command::PollDocument { .. } | Command::Config(_) => {}
    }
    Ok(())
}

/// Builds the starting navigation query from `--query` plus filter flags
fn initial_query(raw: &str, filters: &FilterArgs) -> Result<String> {
    let mut patch = FilterPatch::default();

    if let Some(status) = &filters.status {
        let mut buckets = BTreeSet::new();
        for name in status.split(',').filter(|s| !s.trim().is_empty()) {
            let bucket = StatusFilter::from_name(name)
                .with_context(|| format!("Invalid status filter: {}", name))?;
            buckets = compliance_core::filters::toggle_status(&buckets, bucket, true);
        }
        patch.status = Some(buckets);
    }

    if let Some(due) = &filters.due {
        let mut windows = BTreeSet::new();
        for token in due.split(',').filter(|s| !s.trim().is_empty()) {
            let window = DueFilter::from_token(token)
                .with_context(|| format!("Invalid due filter: {}", token))?;
            windows.insert(window);
        }
        patch.due = Some(windows);
    }

    patch.page = filters.page;
    if patch.touches_filters() && patch.page.is_none() {
        patch.page = Some(1);
    }
    Ok(encode(&QueryParams::parse(raw).to_query_string(), &patch))
}

async fn load(ctrl: &Controller) -> Result<()> {
    match ctrl.load().await {
        Revalidation::Failed(err) => Err(err).context("Failed to load requirements"),
        _ => Ok(()),
    }
}

async fn watch(ctrl: &Controller, config: &ConsoleConfig) -> Result<()> {
    let interval = config
        .revalidate_interval()
        .context("Background refresh is disabled (revalidate_interval_secs = 0)")?;

    load(ctrl).await?;
    print_view(&ctrl.view(), ctrl.context().locale());
    println!("{}", "Watching for changes, Ctrl-C to stop.".dimmed());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(interval) => {
                if let Some(Revalidation::Replaced) = ctrl.tick().await {
                    println!();
                    print_view(&ctrl.view(), ctrl.context().locale());
                }
                if ctrl.host().was_redirected() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Loads the page and selects `ids` (or every triage row with `all`)
async fn select_rows(ctrl: &Controller, ids: &[String], all: bool) -> Result<Vec<String>> {
    load(ctrl).await?;
    if all {
        ctrl.toggle_all(true);
    }
    for id in ids {
        if !ctrl.toggle_selection(id, true) {
            eprintln!(
                "{}",
                format!("{} is not awaiting triage on this page, skipped", id).yellow()
            );
        }
    }
    let selected = ctrl.selected_ids();
    if selected.is_empty() {
        bail!("No requirements awaiting triage were selected");
    }
    Ok(selected)
}

struct TriageFlags {
    status: Option<String>,
    frequency: Option<String>,
    anchor_type: Option<String>,
    anchor_date: Option<String>,
    interval: Option<String>,
    due: Option<String>,
    assignee: Option<String>,
}

impl TriageFlags {
    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.frequency.is_none()
            && self.anchor_type.is_none()
            && self.anchor_date.is_none()
            && self.interval.is_none()
            && self.due.is_none()
            && self.assignee.is_none()
    }

    /// Overlays the flags onto `draft`
    fn apply(&self, draft: &mut TriageDraft) -> Result<()> {
        if let Some(status) = &self.status {
            draft.status = Some(
                RawStatus::from_token(status).with_context(|| format!("Invalid status: {}", status))?,
            );
        }
        if let Some(frequency) = &self.frequency {
            draft.frequency = Some(
                Frequency::from_token(frequency)
                    .with_context(|| format!("Invalid frequency: {}", frequency))?,
            );
        }
        if let Some(anchor) = &self.anchor_type {
            draft.anchor_type = Some(
                AnchorType::from_token(anchor)
                    .with_context(|| format!("Invalid anchor type: {}", anchor))?,
            );
        }
        if let Some(date) = &self.anchor_date {
            draft.anchor_date =
                Some(parse_due_date(date).with_context(|| format!("Invalid anchor date: {}", date))?);
        }
        if let Some(interval) = &self.interval {
            draft.interval = interval.clone();
        }
        if let Some(due) = &self.due {
            draft.due_date = Some(parse_due_date(due).with_context(|| format!("Invalid due date: {}", due))?);
        }
        if let Some(assignee) = &self.assignee {
            draft.assignee = assignee.clone();
        }
        Ok(())
    }
}

async fn triage(ctrl: &Controller, ids: &[String], flags: TriageFlags, interactive: bool) -> Result<()> {
    let should_be_interactive = interactive || flags.is_empty();

    if let [id] = ids {
        let mut form = ctrl
            .open_triage_form(id)
            .await
            .with_context(|| format!("Failed to load requirement {}", id))?;
        flags.apply(&mut form.draft)?;
        if should_be_interactive {
            form.draft = prompt_triage_draft(&form.draft, form.triage_mode())?;
        }
        loop {
            match ctrl.save_record_triage(&mut form).await {
                Ok(outcome) => return report(id, Ok(outcome)),
                Err(WorkflowError::Validation(_)) if should_be_interactive => {
                    if !form.confirm_leave(ctrl.host(), ctrl.context().locale()).await {
                        form.draft = prompt_triage_draft(&form.draft, form.triage_mode())?;
                        continue;
                    }
                    println!("{}", "Triage discarded.".yellow());
                    return Ok(());
                }
                Err(err) => return report(id, Err(err)),
            }
        }
    }

    if ids.is_empty() {
        bail!("Give at least one requirement ID");
    }
    let selected = select_rows(ctrl, ids, false).await?;
    let mut draft = TriageDraft::default();
    flags.apply(&mut draft)?;
    if should_be_interactive {
        draft = prompt_triage_draft(&draft, true)?;
    }
    report(&selected.join(", "), ctrl.save_bulk_triage(&draft).await)
}

async fn poll_document(client: HttpClient, id: &str, config: &ConsoleConfig) -> Result<()> {
    let mut poller = DocumentPoller::start(Rc::new(client), id, config.poller_config());
    println!("Waiting for document {}...", id.bold());

    let mut interrupted = false;
    while !interrupted {
        let status = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                None
            }
            status = poller.changed() => status,
        };
        match status {
            Some(PollStatus::Waiting(state)) => println!("  {}", state.to_string().dimmed()),
            Some(PollStatus::Retrying(err)) => {
                eprintln!("  {}", format!("retrying: {}", err).yellow())
            }
            Some(status) if status.is_final() => break,
            Some(_) => {}
            None if interrupted => {
                poller.stop();
                println!("{}", "Stopped.".yellow());
                return Ok(());
            }
            None => break,
        }
    }

    match poller.status() {
        PollStatus::Finished(document) => {
            let name = document.filename.unwrap_or(document.id);
            println!("{} {}", name.bold(), document.status.to_string().green());
            Ok(())
        }
        PollStatus::Missing => bail!("Document {} not found", id),
        other => bail!("Polling ended without a result: {:?}", other),
    }
}

/// Prints a workflow result; toasts have already been shown by the host
fn report(target: &str, outcome: Result<MutationOutcome, WorkflowError>) -> Result<()> {
    match outcome {
        Ok(MutationOutcome::Applied) => Ok(()),
        Ok(MutationOutcome::Skipped(reason)) => {
            println!("{}", format!("Skipped {}: {}", target, reason).yellow());
            Ok(())
        }
        Ok(MutationOutcome::Cancelled) => {
            println!("{}", "Cancelled.".yellow());
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to update {}", target)),
    }
}

fn status_label(status: DerivedStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        DerivedStatus::Open => label.blue(),
        DerivedStatus::NeedsReview => label.yellow(),
        DerivedStatus::NeedsTriage => label.magenta(),
        DerivedStatus::Completed => label.green(),
        DerivedStatus::Archived => label.dimmed(),
        DerivedStatus::Overdue => label.red().bold(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

fn print_view(view: &ListView, locale: Locale) {
    if view.rows.is_empty() {
        println!("{}", "No requirements found.".yellow());
    } else {
        println!(
            "{:<3} | {:<14} | {:<40} | {:<12} | {:<10} | {:<15} | {:<20}",
            "", "ID", "Title", "Status", "Due", "Frequency", "Assignee"
        );
        println!("{}", "-".repeat(132));

        for row in &view.rows {
            let marker = match (row.selectable, row.selected) {
                (true, true) => "[x]",
                (true, false) => "[ ]",
                _ => "",
            };
            let due = match (row.record.due_date, row.days_until_due) {
                (Some(date), Some(days)) if days < 0 => date.to_string().red().to_string(),
                (Some(date), _) => date.to_string(),
                (None, _) => "-".to_string(),
            };
            let frequency = row
                .record
                .frequency
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string());

            println!(
                "{:<3} | {:<14} | {:<40} | {:<12} | {:<10} | {:<15} | {:<20}",
                marker,
                truncate(&row.record.id, 14),
                truncate(row.record.title_for(locale), 40),
                status_label(row.derived),
                due,
                frequency,
                row.record.assignee().unwrap_or("-"),
            );
        }
    }

    let page = view.pagination;
    println!(
        "\nPage {}/{} ({} requirements)",
        page.page, page.page_count, page.total
    );
    if view.selection.header.has_selectable && !view.selection.ids.is_empty() {
        println!("{} selected", view.selection.ids.len());
    }
}

fn print_requirement(ctrl: &Controller, record: &Requirement) {
    let locale = ctrl.context().locale();
    println!("{}", record.title_for(locale).bold());
    println!("{}: {}", "ID".cyan(), record.id);
    println!("{}: {}", "Status".cyan(), status_label(ctrl.derived_status(record)));
    if let Some(status) = record.status {
        println!("{}: {}", "Raw status".cyan(), status);
    }
    if let Some(category) = &record.category {
        println!("{}: {}", "Category".cyan(), category);
    }
    if let Some(frequency) = record.frequency {
        println!("{}: {}", "Frequency".cyan(), frequency);
    }
    if let Some(anchor) = record.anchor_type {
        println!("{}: {}", "Anchor".cyan(), anchor);
    }
    if let Some(due) = record.due_date {
        println!("{}: {}", "Due".cyan(), due);
    }
    if let Some(assignee) = record.assignee() {
        println!("{}: {}", "Assignee".cyan(), assignee);
    }

    let archive = record.archive_metadata();
    if let Some(state) = archive.state {
        println!("\n{}", "Archive:".blue());
        println!("  {}: {}", "State".cyan(), state);
        if let Some(reason) = &archive.reason {
            println!("  {}: {}", "Reason".cyan(), reason);
        }
        if let Some(by) = &archive.requested_by {
            println!("  {}: {}", "Requested by".cyan(), by);
        }
        if let Some(at) = archive.requested_at {
            println!("  {}: {}", "Requested at".cyan(), at.format("%Y-%m-%d %H:%M"));
        }
    }

    let reasons = record.triage_reasons();
    if !reasons.is_empty() {
        println!("\n{}", "Triage reasons:".blue());
        for reason in reasons {
            println!("  - {}", reason);
        }
    }

    let description = record.description.get(locale);
    if !description.trim().is_empty() {
        println!("\n{}", description);
    }
}

fn handle_config_command(cmd: &ConfigCommand, config: &ConsoleConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            if shown.session_cookie.is_some() {
                shown.session_cookie = Some("********".to_string());
            }
            println!("{}", "Configuration:".blue().bold());
            println!("{}", serde_yaml::to_string(&shown)?);
        }
        ConfigCommand::Path => {
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ConsoleConfig::default().save(path)?;
            println!("Wrote {}", path.display().to_string().green());
        }
    }
    Ok(())
}
