//! Built-in console messages.
//!
//! Full translation is handled by the front end; these are the strings the
//! controller itself needs for toasts, prompts and fallbacks.

use crate::config::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    GenericError,
    Completed,
    Archived,
    Restored,
    Dismissed,
    TriageSaved,
    ArchiveReasonPrompt,
    DismissReasonPrompt,
    RestoreConfirm,
    UnsavedChanges,
    StatusRequired,
    FrequencyRequired,
    DueDateRequired,
    IntervalRequired,
    ReasonRequired,
    NothingSelected,
}

/// Message text for `key` in `locale`
pub fn text(key: MessageKey, locale: Locale) -> &'static str {
    match locale {
        Locale::En => english(key),
        Locale::Fr => french(key),
    }
}

fn english(key: MessageKey) -> &'static str {
    match key {
        MessageKey::GenericError => "Something went wrong. Please try again.",
        MessageKey::Completed => "Requirement marked as complete.",
        MessageKey::Archived => "Requirement archived.",
        MessageKey::Restored => "Requirement restored.",
        MessageKey::Dismissed => "Selected requirements dismissed.",
        MessageKey::TriageSaved => "Triage saved.",
        MessageKey::ArchiveReasonPrompt => "Why is this requirement being archived?",
        MessageKey::DismissReasonPrompt => "Reason for dismissing the selected requirements:",
        MessageKey::RestoreConfirm => "Restore this requirement?",
        MessageKey::UnsavedChanges => "You have unsaved changes. Leave anyway?",
        MessageKey::StatusRequired => "Choose a status.",
        MessageKey::FrequencyRequired => "Choose a frequency.",
        MessageKey::DueDateRequired => "A due date is required for this frequency.",
        MessageKey::IntervalRequired => "Enter an interval as a positive whole number.",
        MessageKey::ReasonRequired => "A reason is required.",
        MessageKey::NothingSelected => "Select at least one requirement.",
    }
}

fn french(key: MessageKey) -> &'static str {
    match key {
        MessageKey::GenericError => "Une erreur est survenue. Veuillez réessayer.",
        MessageKey::Completed => "Exigence marquée comme terminée.",
        MessageKey::Archived => "Exigence archivée.",
        MessageKey::Restored => "Exigence restaurée.",
        MessageKey::Dismissed => "Exigences sélectionnées écartées.",
        MessageKey::TriageSaved => "Tri enregistré.",
        MessageKey::ArchiveReasonPrompt => "Pourquoi cette exigence est-elle archivée ?",
        MessageKey::DismissReasonPrompt => "Motif pour écarter les exigences sélectionnées :",
        MessageKey::RestoreConfirm => "Restaurer cette exigence ?",
        MessageKey::UnsavedChanges => "Des modifications ne sont pas enregistrées. Quitter quand même ?",
        MessageKey::StatusRequired => "Choisissez un statut.",
        MessageKey::FrequencyRequired => "Choisissez une fréquence.",
        MessageKey::DueDateRequired => "Une échéance est requise pour cette fréquence.",
        MessageKey::IntervalRequired => "Saisissez un intervalle entier positif.",
        MessageKey::ReasonRequired => "Un motif est requis.",
        MessageKey::NothingSelected => "Sélectionnez au moins une exigence.",
    }
}
