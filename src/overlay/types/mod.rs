mod emote;
mod event;

pub use emote::{Emote, EmoteImage};
pub use event::{
    CustomImage, DEFAULT_NOTIFICATION_LENGTH, DotabetUpdate, EmoteCombo, EmoteCounterStart,
    EmoteCounterUpdate, Envelope, EnvelopeParser, EventKind, MAX_NOTIFICATION_LENGTH, NewBox,
    NewEmotes, Notification, OverlayEvent, PlaySound, TIMEOUT_NOTIFICATION_LENGTH, Timeout,
    WinPercentChange, parse_envelope,
};
