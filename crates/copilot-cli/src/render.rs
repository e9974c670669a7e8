//! Plain-text rendering for terminal output

use copilot_analysis::{
    AnalysisRequest, CardResult, CardSlot, CardSlotRegistry, CardStatus, CopilotError,
};
use std::fmt::Write;

/// Full snapshot of a request, one block per card in slot order
pub fn request(request: &AnalysisRequest) -> String {
    let mut output = String::new();
    let ticker = request
        .ticker
        .as_ref()
        .map_or(request.raw_ticker.as_str(), |t| t.as_str());

    let _ = writeln!(
        output,
        "{ticker}  {}  ({}/{} cards ready)",
        request.status,
        request.ready_count(),
        request.cards.len()
    );
    let _ = writeln!(output, "request {}", request.request_id);
    if let Some(error) = &request.error {
        let _ = writeln!(output, "error: {}", error.kind.user_message());
    }
    output.push('\n');

    for card in &request.cards {
        output.push_str(&self::card(card));
        output.push('\n');
    }
    output
}

/// One card line plus its headline or error
pub fn card(card: &CardResult) -> String {
    let Ok(slot) = CardSlotRegistry::slot_by_id(card.slot_id) else {
        return format!("[{}] unknown slot", card.slot_id);
    };

    let mut output = format!("{}  {}", slot_label(slot), status_label(card.status));
    if card.attempts > 1 {
        let _ = write!(output, " after {} attempts", card.attempts);
    }

    match card.status {
        CardStatus::Ready => {
            let headline = card
                .payload
                .as_ref()
                .and_then(|p| p.get("headline"))
                .and_then(|h| h.as_str());
            if let Some(headline) = headline {
                let _ = write!(output, "\n      {headline}");
            }
        }
        CardStatus::Failed => {
            if let Some(error) = &card.error {
                let _ = write!(output, "\n      {} ({})", error.kind.user_message(), error.message);
            }
        }
        CardStatus::Pending => {}
    }
    output
}

/// Single line announcing a card as it lands
pub fn progress(card: &CardResult, ready: usize, total: usize) -> String {
    let label = CardSlotRegistry::slot_by_id(card.slot_id)
        .map_or_else(|_| format!("[{}]", card.slot_id), slot_label);
    format!("{label}  {}  ({ready}/{total})", status_label(card.status))
}

/// Lifecycle error in user terms, with the technical detail after it
pub fn error(error: &CopilotError) -> String {
    match error.kind() {
        Some(kind) => format!("{} ({error})", kind.user_message()),
        None => error.to_string(),
    }
}

/// The seven-slot catalog
pub fn slots() -> String {
    let mut output = String::new();
    for slot in CardSlotRegistry::all_slots() {
        let _ = writeln!(output, "{}  {}", slot_label(slot), slot.key);
    }
    output
}

fn slot_label(slot: &CardSlot) -> String {
    let marker = if slot.required { '*' } else { ' ' };
    format!("[{}]{marker} {:<46}", slot.id, slot.title)
}

fn status_label(status: CardStatus) -> &'static str {
    match status {
        CardStatus::Pending => "...",
        CardStatus::Ready => "ready",
        CardStatus::Failed => "failed",
    }
}
