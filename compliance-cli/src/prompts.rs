use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use inquire::{Confirm, Select, Text};
use std::cell::{Cell, RefCell};
use tracing::debug;

use compliance_core::models::parse_due_date;
use compliance_core::{
    AnchorType, DialogOutcome, Dialogs, Frequency, Navigator, Notifier, RawStatus, Toast,
    ToastLevel, TriageDraft,
};

/// Terminal front end: inquire dialogs, an in-memory query string and
/// colored toasts
pub struct TerminalHost {
    query: RefCell<String>,
    login_url: String,
    assume_yes: bool,
    redirected: Cell<bool>,
}

impl TerminalHost {
    pub fn new(query: String, login_url: String, assume_yes: bool) -> Self {
        Self {
            query: RefCell::new(query),
            login_url,
            assume_yes,
            redirected: Cell::new(false),
        }
    }

    pub fn was_redirected(&self) -> bool {
        self.redirected.get()
    }
}

#[async_trait(?Send)]
impl Dialogs for TerminalHost {
    async fn confirm(&self, message: &str) -> DialogOutcome {
        if self.assume_yes {
            return DialogOutcome::confirmed();
        }
        match Confirm::new(message).with_default(false).prompt() {
            Ok(true) => DialogOutcome::confirmed(),
            _ => DialogOutcome::cancelled(),
        }
    }

    async fn prompt(&self, message: &str) -> DialogOutcome {
        match Text::new(message).prompt() {
            Ok(value) => DialogOutcome::with_value(value),
            Err(_) => DialogOutcome::cancelled(),
        }
    }
}

impl Navigator for TerminalHost {
    fn current_query(&self) -> String {
        self.query.borrow().clone()
    }

    fn replace_query(&self, query: &str) {
        debug!("Navigation query is now {:?}", query);
        *self.query.borrow_mut() = query.to_string();
    }

    fn redirect_to_login(&self) {
        if !self.redirected.replace(true) {
            eprintln!(
                "{} {}",
                "Not signed in. Sign in at".yellow(),
                self.login_url.bold()
            );
        }
    }
}

impl Notifier for TerminalHost {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Success => println!("{}", toast.message.green()),
            ToastLevel::Error => eprintln!("{}", toast.message.red()),
        }
    }
}

const NONE_OPTION: &str = "(none)";

fn optional_date(label: &str, current: Option<chrono::NaiveDate>) -> Result<Option<chrono::NaiveDate>> {
    let default = current
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    loop {
        let input = Text::new(label)
            .with_default(&default)
            .with_help_message("YYYY-MM-DD, empty for none")
            .prompt()?;
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        match parse_due_date(input) {
            Some(date) => return Ok(Some(date)),
            None => eprintln!("{}", format!("Invalid date: {}", input).red()),
        }
    }
}

fn cursor_of<T: PartialEq>(options: &[T], current: Option<&T>) -> usize {
    current
        .and_then(|c| options.iter().position(|o| o == c))
        .unwrap_or(0)
}

/// Prompts for triage fields, starting from `initial`. Outside triage mode
/// only status and due date are asked for.
pub fn prompt_triage_draft(initial: &TriageDraft, triage_mode: bool) -> Result<TriageDraft> {
    let mut draft = initial.clone();

    let statuses: Vec<RawStatus> = RawStatus::ALL
        .into_iter()
        .filter(|s| *s != RawStatus::Archived)
        .collect();
    let cursor = cursor_of(&statuses, draft.status.as_ref());
    draft.status = Some(
        Select::new("Status:", statuses)
            .with_starting_cursor(cursor)
            .prompt()?,
    );

    if !triage_mode {
        draft.due_date = optional_date("Due date:", draft.due_date)?;
        return Ok(draft);
    }

    let frequencies = Frequency::ALL.to_vec();
    let cursor = cursor_of(&frequencies, draft.frequency.as_ref());
    let frequency = Select::new("Frequency:", frequencies)
        .with_starting_cursor(cursor)
        .prompt()?;
    draft.frequency = Some(frequency);

    let mut anchors = vec![NONE_OPTION.to_string()];
    anchors.extend(AnchorType::ALL.iter().map(|a| a.to_string()));
    let cursor = draft
        .anchor_type
        .and_then(|a| AnchorType::ALL.iter().position(|o| *o == a))
        .map_or(0, |i| i + 1);
    let anchor = Select::new("Anchor type:", anchors)
        .with_starting_cursor(cursor)
        .prompt()?;
    draft.anchor_type = AnchorType::from_token(&anchor);

    draft.anchor_date = optional_date("Anchor date:", draft.anchor_date)?;

    if let Some(unit) = frequency.interval_unit() {
        draft.interval = Text::new(&format!("Interval ({}):", unit))
            .with_default(&draft.interval)
            .prompt()?;
    }

    draft.due_date = optional_date("Due date:", draft.due_date)?;
    draft.assignee = Text::new("Assignee:")
        .with_default(&draft.assignee)
        .prompt()?;

    Ok(draft)
}
