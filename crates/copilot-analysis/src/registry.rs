//! The fixed catalog of the seven analysis cards
//!
//! Slot order is presentation order. The catalog is a compile-time constant,
//! so there is no way to add, remove or reorder slots at runtime.

use serde::Serialize;

use crate::error::{CopilotError, Result};

/// Number of cards in every analysis
pub const CARD_COUNT: usize = 7;

/// Static definition of one card position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CardSlot {
    /// Position, 1 through 7
    pub id: u8,
    /// Stable machine key
    pub key: &'static str,
    /// Question shown as the card heading
    pub title: &'static str,
    /// A failed required card fails the whole analysis
    pub required: bool,
}

const SLOTS: [CardSlot; CARD_COUNT] = [
    CardSlot {
        id: 1,
        key: "market_activity",
        title: "What is happening?",
        required: true,
    },
    CardSlot {
        id: 2,
        key: "participation",
        title: "Is participation changing?",
        required: false,
    },
    CardSlot {
        id: 3,
        key: "macro_forces",
        title: "What macro forces matter now?",
        required: false,
    },
    CardSlot {
        id: 4,
        key: "business_trajectory",
        title: "Is the business improving or deteriorating?",
        required: true,
    },
    CardSlot {
        id: 5,
        key: "relative_strength",
        title: "Is this stock winning vs alternatives?",
        required: false,
    },
    CardSlot {
        id: 6,
        key: "signal_quality",
        title: "Can I trust what I'm seeing?",
        required: false,
    },
    CardSlot {
        id: 7,
        key: "intelligence_brief",
        title: "Intelligence brief",
        required: true,
    },
];

/// Read-only access to the card catalog
pub struct CardSlotRegistry;

impl CardSlotRegistry {
    /// All seven slots in id order
    pub fn all_slots() -> &'static [CardSlot; CARD_COUNT] {
        &SLOTS
    }

    /// Look up a slot by id
    pub fn slot_by_id(id: u8) -> Result<&'static CardSlot> {
        if id == 0 {
            return Err(CopilotError::UnknownSlot(id));
        }
        SLOTS
            .get(usize::from(id) - 1)
            .ok_or(CopilotError::UnknownSlot(id))
    }

    /// Look up a slot by its machine key
    pub fn slot_by_key(key: &str) -> Option<&'static CardSlot> {
        SLOTS.iter().find(|slot| slot.key == key)
    }

    /// Slots whose failure fails the whole analysis
    pub fn required_slots() -> impl Iterator<Item = &'static CardSlot> {
        SLOTS.iter().filter(|slot| slot.required)
    }
}
