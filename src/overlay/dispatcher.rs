use super::types::{
    CustomImage, DotabetUpdate, EmoteCombo, EmoteCounterStart, EmoteCounterUpdate, NewBox,
    NewEmotes, Notification, OverlayEvent, PlaySound, Timeout, WinPercentChange, parse_envelope,
};

/// Receives overlay events, one method per event.
///
/// Every method defaults to doing nothing, so an implementation only overrides the
/// events it renders. `timeout` defaults to showing a notification.
pub trait OverlayHandler {
    fn new_box(&mut self, _event: NewBox) {}

    fn new_emotes(&mut self, _event: NewEmotes) {}

    fn notification(&mut self, _event: Notification) {}

    /// Defaults to [`notification`](Self::notification) with the standard timeout text.
    fn timeout(&mut self, event: Timeout) {
        self.notification(event.into_notification());
    }

    fn play_sound(&mut self, _event: PlaySound) {}

    fn emote_combo(&mut self, _event: EmoteCombo) {}

    fn emote_counter_start(&mut self, _event: EmoteCounterStart) {}

    fn emote_counter_update(&mut self, _event: EmoteCounterUpdate) {}

    fn emote_counter_close(&mut self) {}

    fn win_percent_change(&mut self, _event: WinPercentChange) {}

    fn win_percent_open(&mut self) {}

    fn win_percent_close(&mut self) {}

    fn dotabet_new_game(&mut self) {}

    fn dotabet_update(&mut self, _event: DotabetUpdate) {}

    fn dotabet_close_game(&mut self) {}

    fn show_custom_image(&mut self, _event: CustomImage) {}

    /// Called for both `refresh` and `reload`.
    fn reload(&mut self) {}
}

/// Routes decoded events to an [`OverlayHandler`].
#[derive(Debug, Default)]
pub struct Dispatcher<H> {
    handler: H,
}

impl<H: OverlayHandler> Dispatcher<H> {
    #[must_use]
    pub const fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn dispatch(&mut self, event: OverlayEvent) {
        let handler = &mut self.handler;

        match event {
            OverlayEvent::NewBox(event) => handler.new_box(event),
            OverlayEvent::NewEmotes(event) => handler.new_emotes(event),
            OverlayEvent::Notification(event) => handler.notification(event),
            OverlayEvent::Timeout(event) => handler.timeout(event),
            OverlayEvent::PlaySound(event) => handler.play_sound(event),
            OverlayEvent::EmoteCombo(event) => handler.emote_combo(event),
            OverlayEvent::EmoteCounterStart(event) => handler.emote_counter_start(event),
            OverlayEvent::EmoteCounterUpdate(event) => handler.emote_counter_update(event),
            OverlayEvent::EmoteCounterClose => handler.emote_counter_close(),
            OverlayEvent::WinPercentChange(event) => handler.win_percent_change(event),
            OverlayEvent::WinPercentOpen => handler.win_percent_open(),
            OverlayEvent::WinPercentClose => handler.win_percent_close(),
            OverlayEvent::DotabetNewGame => handler.dotabet_new_game(),
            OverlayEvent::DotabetUpdateData(event) => handler.dotabet_update(event),
            OverlayEvent::DotabetCloseGame => handler.dotabet_close_game(),
            OverlayEvent::ShowCustomImage(event) => handler.show_custom_image(event),
            OverlayEvent::Reload => handler.reload(),
        }
    }

    /// Parse a raw text frame and dispatch it.
    ///
    /// Frames without a string `event`, unknown events and malformed payloads have no
    /// effect. Only malformed frames are logged.
    pub fn dispatch_text(&mut self, text: &str) {
        match parse_envelope(text.as_bytes()) {
            Ok(Some(event)) => self.dispatch(event),
            Ok(None) => {}
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Dropping malformed overlay message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }
    }

    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    pub const fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    #[must_use]
    pub fn into_handler(self) -> H {
        self.handler
    }
}
