//! Well-known intent and entity names.
//!
//! Sub-dialogs are registered under the same name as the intent that
//! starts them, so these constants double as dialog ids.

/// Starts the table booking form.
pub const BOOK_TABLE: &str = "BookTable";

/// Submit action from the booking card. Only valid while booking.
pub const BOOK_TABLE_SUBMIT: &str = "Book_Table_Submit";

/// Cancel action from the booking card. Only valid while booking.
pub const BOOK_TABLE_CANCEL: &str = "Book_Table_Cancel";

/// Identification ("who are you" / "my name is ...").
pub const WHO_ARE_YOU: &str = "WhoAreYou";

/// Capability overview card and its suggestion buttons.
pub const WHAT_CAN_YOU_DO: &str = "WhatCanYouDo";

/// Cafe location lookup.
pub const FIND_CAFE_LOCATIONS: &str = "FindCafeLocations";

/// Generic cancel of the current flow.
pub const CANCEL: &str = "Cancel";

/// Sentinel produced when nothing was recognized.
pub const NONE: &str = "None";

/// Entity holding a free-form user name ("call me alice").
pub const USER_NAME_PATTERN_ANY: &str = "userName_patternAny";

/// Entity holding a recognized user name.
pub const USER_NAME: &str = "userName";

/// Reserved card field naming the target intent.
pub const CARD_INTENT_FIELD: &str = "intent";

/// Card field holding a JSON-encoded nested card for [`WHAT_CAN_YOU_DO`].
pub const CARD_PAYLOAD_FIELD: &str = "payload";

/// Display-text fields accepted inside a nested card payload.
pub const CARD_TEXT_FIELDS: [&str; 2] = ["text", "query"];

/// Returns true if `intent` is the "nothing recognized" sentinel.
pub fn is_none_intent(intent: &str) -> bool {
    intent.trim().is_empty() || intent.eq_ignore_ascii_case(NONE)
}
