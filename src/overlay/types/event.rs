use std::time::Duration;

use bon::Builder;
use phf::phf_map;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::emote::Emote;
use crate::Result;
use crate::serde_helpers::StringFromAny;
use crate::ws::{MessageParser, WsError};

/// Seconds a notification stays up when the server does not say.
pub const DEFAULT_NOTIFICATION_LENGTH: f64 = 2.0;

/// Seconds a `timeout` notification stays up.
pub const TIMEOUT_NOTIFICATION_LENGTH: f64 = 8.0;

/// Longest a notification stays up, in seconds. Longer lengths are cut to this.
pub const MAX_NOTIFICATION_LENGTH: f64 = 60.0 * 60.0 * 24.0;

/// Names of the events the overlay understands.
///
/// Lookup is an exact, case-sensitive match on the envelope's `event` field.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    NewBox,
    NewEmotes,
    Notification,
    Timeout,
    PlaySound,
    EmoteCombo,
    EmotecounterStart,
    EmotecounterUpdate,
    EmotecounterClose,
    WinPercentChange,
    WinPercentOpen,
    WinPercentClose,
    DotabetNewGame,
    DotabetUpdateData,
    DotabetCloseGame,
    ShowCustomImage,
    Refresh,
    Reload,
}

static EVENTS: phf::Map<&'static str, EventKind> = phf_map! {
    "new_box" => EventKind::NewBox,
    "new_emotes" => EventKind::NewEmotes,
    "notification" => EventKind::Notification,
    "timeout" => EventKind::Timeout,
    "play_sound" => EventKind::PlaySound,
    "emote_combo" => EventKind::EmoteCombo,
    "emotecounter_start" => EventKind::EmotecounterStart,
    "emotecounter_update" => EventKind::EmotecounterUpdate,
    "emotecounter_close" => EventKind::EmotecounterClose,
    "win_percent_change" => EventKind::WinPercentChange,
    "win_percent_open" => EventKind::WinPercentOpen,
    "win_percent_close" => EventKind::WinPercentClose,
    "dotabet_new_game" => EventKind::DotabetNewGame,
    "dotabet_update_data" => EventKind::DotabetUpdateData,
    "dotabet_close_game" => EventKind::DotabetCloseGame,
    "show_custom_image" => EventKind::ShowCustomImage,
    "refresh" => EventKind::Refresh,
    "reload" => EventKind::Reload,
};

impl EventKind {
    /// Look up a registered event name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        EVENTS.get(name).copied()
    }

    /// Wire name of this event.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Decode the envelope's `data` into the typed event.
    ///
    /// Events that carry no payload ignore `data` entirely.
    pub fn decode(self, data: Value) -> Result<OverlayEvent> {
        let event = match self {
            Self::NewBox => OverlayEvent::NewBox(payload(data)?),
            Self::NewEmotes => OverlayEvent::NewEmotes(payload(data)?),
            Self::Notification => OverlayEvent::Notification(payload(data)?),
            Self::Timeout => OverlayEvent::Timeout(payload(data)?),
            Self::PlaySound => OverlayEvent::PlaySound(payload(data)?),
            Self::EmoteCombo => OverlayEvent::EmoteCombo(payload(data)?),
            Self::EmotecounterStart => OverlayEvent::EmoteCounterStart(payload(data)?),
            Self::EmotecounterUpdate => OverlayEvent::EmoteCounterUpdate(payload(data)?),
            Self::EmotecounterClose => OverlayEvent::EmoteCounterClose,
            Self::WinPercentChange => OverlayEvent::WinPercentChange(payload(data)?),
            Self::WinPercentOpen => OverlayEvent::WinPercentOpen,
            Self::WinPercentClose => OverlayEvent::WinPercentClose,
            Self::DotabetNewGame => OverlayEvent::DotabetNewGame,
            Self::DotabetUpdateData => OverlayEvent::DotabetUpdateData(payload(data)?),
            Self::DotabetCloseGame => OverlayEvent::DotabetCloseGame,
            Self::ShowCustomImage => OverlayEvent::ShowCustomImage(payload(data)?),
            Self::Refresh | Self::Reload => OverlayEvent::Reload,
        };

        Ok(event)
    }
}

fn payload<T: DeserializeOwned>(data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| WsError::MessageParse(e).into())
}

/// A decoded overlay event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    NewBox(NewBox),
    NewEmotes(NewEmotes),
    Notification(Notification),
    Timeout(Timeout),
    PlaySound(PlaySound),
    EmoteCombo(EmoteCombo),
    EmoteCounterStart(EmoteCounterStart),
    EmoteCounterUpdate(EmoteCounterUpdate),
    EmoteCounterClose,
    WinPercentChange(WinPercentChange),
    WinPercentOpen,
    WinPercentClose,
    DotabetNewGame,
    DotabetUpdateData(DotabetUpdate),
    DotabetCloseGame,
    ShowCustomImage(CustomImage),
    /// Both `refresh` and `reload`
    Reload,
}

/// The raw `{event, data}` object received over the socket.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct Envelope {
    #[builder(into)]
    pub event: String,
    #[builder(default)]
    pub data: Value,
}

impl Envelope {
    /// Parse a text frame.
    ///
    /// Returns `Ok(None)` for JSON that is not an object or whose `event` is missing or
    /// not a string. Invalid JSON is an error.
    pub fn from_slice(bytes: &[u8]) -> Result<Option<Self>> {
        let value: Value = serde_json::from_slice(bytes).map_err(WsError::MessageParse)?;

        let Value::Object(mut object) = value else {
            return Ok(None);
        };
        let Some(Value::String(event)) = object.remove("event") else {
            return Ok(None);
        };
        let data = object.remove("data").unwrap_or(Value::Null);

        Ok(Some(Self { event, data }))
    }

    /// Decode into a typed event. Unknown event names yield `Ok(None)`.
    pub fn into_event(self) -> Result<Option<OverlayEvent>> {
        match EventKind::from_name(&self.event) {
            Some(kind) => kind.decode(self.data).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse a text frame all the way to a typed event.
pub fn parse_envelope(bytes: &[u8]) -> Result<Option<OverlayEvent>> {
    match Envelope::from_slice(bytes)? {
        Some(envelope) => envelope.into_event(),
        None => Ok(None),
    }
}

/// Frame parser that yields at most one [`OverlayEvent`] per text frame.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeParser;

impl MessageParser<OverlayEvent> for EnvelopeParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<OverlayEvent>> {
        Ok(parse_envelope(bytes)?.into_iter().collect())
    }
}

/// `new_box`: a coloured square somewhere on screen.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct NewBox {
    /// Any CSS colour
    #[builder(into)]
    pub color: String,
}

/// `new_emotes`: a burst of emotes at random positions.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct NewEmotes {
    pub emotes: Vec<Emote>,
    /// Opacity in percent, `0` to `100`
    pub opacity: f64,
    /// Milliseconds from appearing until fading out
    pub persistence_time: u64,
    /// Scale in percent
    pub scale: f64,
}

impl NewEmotes {
    #[must_use]
    pub fn persistence(&self) -> Duration {
        Duration::from_millis(self.persistence_time)
    }

    /// Opacity as a fraction, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        (self.opacity / 100.0).clamp(0.0, 1.0)
    }
}

/// `notification`: a line of (HTML) text in the notification column.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct Notification {
    #[builder(into)]
    pub message: String,
    /// Seconds to stay visible once fully shown
    #[serde(default = "default_notification_length")]
    #[builder(default = DEFAULT_NOTIFICATION_LENGTH)]
    pub length: f64,
}

fn default_notification_length() -> f64 {
    DEFAULT_NOTIFICATION_LENGTH
}

impl Notification {
    /// How long the notification stays visible, at most [`MAX_NOTIFICATION_LENGTH`].
    /// Negative or non-finite lengths count as zero.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if !self.length.is_finite() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.length.min(MAX_NOTIFICATION_LENGTH)).unwrap_or_default()
    }
}

/// `timeout`: one chatter timed out another with the `!timeout` command.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct Timeout {
    #[builder(into)]
    pub user: String,
    #[builder(into)]
    pub victim: String,
}

impl Timeout {
    /// The notification shown for this timeout.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        Notification {
            message: format!(
                r#"<span class="user">{}</span> timed out <span class="victim">{}</span> with !timeout EleGiggle"#,
                self.user, self.victim
            ),
            length: TIMEOUT_NOTIFICATION_LENGTH,
        }
    }
}

impl From<Timeout> for Notification {
    fn from(timeout: Timeout) -> Self {
        timeout.into_notification()
    }
}

/// `play_sound`: play an audio file once.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct PlaySound {
    #[builder(into)]
    pub link: String,
    /// Volume in percent, `0` to `100`
    pub volume: f64,
}

impl PlaySound {
    /// Volume as a playback gain.
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.volume * 0.01
    }
}

/// `emote_combo`: the current streak of one emote.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct EmoteCombo {
    pub emote: Emote,
    pub count: u32,
}

/// `emotecounter_start`: a vote between two emotes begins.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct EmoteCounterStart {
    pub emote1: Emote,
    pub emote2: Emote,
}

/// `emotecounter_update`: current vote totals.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct EmoteCounterUpdate {
    pub value1: u32,
    pub value2: u32,
}

/// `win_percent_change`: live win probability of the streamer's side.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct WinPercentChange {
    pub is_radiant: bool,
    #[serde(default)]
    #[builder(default)]
    pub is_draw: bool,
    /// Display text, passed through as sent
    #[serde(with = "serde_with::As::<StringFromAny>")]
    #[builder(into)]
    pub win_pct: String,
}

/// `dotabet_update_data`: running totals of the current bet.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, Builder)]
pub struct DotabetUpdate {
    pub win_betters: u32,
    pub loss_betters: u32,
    pub win_points: i64,
    pub loss_points: i64,
}

/// `show_custom_image`: an arbitrary image, optionally sized and placed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Builder)]
pub struct CustomImage {
    #[builder(into)]
    pub url: String,
    /// CSS width, passed through as sent
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::As::<Option<StringFromAny>>"
    )]
    #[builder(into)]
    pub width: Option<String>,
    /// CSS height, passed through as sent
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::As::<Option<StringFromAny>>"
    )]
    #[builder(into)]
    pub height: Option<String>,
    /// Left offset in pixels; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Top offset in pixels; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    fn parse(value: &Value) -> Result<Option<OverlayEvent>> {
        parse_envelope(value.to_string().as_bytes())
    }

    #[test]
    fn registry_matches_display_names() {
        for (name, kind) in &EVENTS {
            assert_eq!(kind.name(), *name);
            assert_eq!(kind.to_string(), *name);
        }
        assert_eq!(EVENTS.len(), 18);
    }

    #[test]
    fn lookup_is_exact() {
        assert_eq!(EventKind::from_name("new_box"), Some(EventKind::NewBox));
        assert_eq!(EventKind::from_name("NEW_BOX"), None);
        assert_eq!(EventKind::from_name("new_box "), None);
        assert_eq!(EventKind::from_name("bet_new_game"), None);
    }

    #[test]
    fn missing_event_is_discarded() {
        assert_eq!(parse(&json!({ "data": { "color": "red" } })).unwrap(), None);
        assert_eq!(parse(&json!({ "event": null })).unwrap(), None);
        assert_eq!(parse(&json!({ "event": 5 })).unwrap(), None);
    }

    #[test]
    fn non_object_json_is_discarded() {
        assert_eq!(parse(&json!([1, 2, 3])).unwrap(), None);
        assert_eq!(parse(&json!("notification")).unwrap(), None);
        assert_eq!(parse(&json!(null)).unwrap(), None);
    }

    #[test]
    fn unknown_event_is_discarded() {
        let event = parse(&json!({ "event": "bet_update_data", "data": { "win_points": 1 } }));
        assert_eq!(event.unwrap(), None);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let error = parse_envelope(b"{\"event\": \"new_box\"").unwrap_err();
        assert_eq!(error.kind(), Kind::WebSocket);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let error = parse(&json!({ "event": "new_box", "data": { "colour": "red" } })).unwrap_err();
        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(error.downcast_ref::<WsError>().is_some());
    }

    #[test]
    fn notification_length_defaults_to_two() {
        let event = parse(&json!({ "event": "notification", "data": { "message": "hi" } }));

        let expected = Notification::builder().message("hi").length(2.0).build();
        assert_eq!(event.unwrap(), Some(OverlayEvent::Notification(expected)));
    }

    #[test]
    fn notification_keeps_explicit_length() {
        let event = parse(&json!({
            "event": "notification",
            "data": { "message": "The betting for the current game has been closed!", "length": 8 }
        }));

        let Some(OverlayEvent::Notification(notification)) = event.unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(notification.duration(), Duration::from_secs(8));
    }

    #[test]
    fn notification_duration_is_bounded() {
        let length = |length: f64| Notification::builder().message("x").length(length).build();

        assert_eq!(length(1e19).duration(), Duration::from_secs(86_400));
        assert_eq!(length(f64::INFINITY).duration(), Duration::ZERO);
        assert_eq!(length(f64::NAN).duration(), Duration::ZERO);
        assert_eq!(length(-3.0).duration(), Duration::ZERO);
        assert_eq!(length(0.5).duration(), Duration::from_millis(500));
    }

    #[test]
    fn timeout_becomes_notification() {
        let timeout = Timeout::builder().user("a").victim("b").build();
        let notification = timeout.into_notification();

        assert_eq!(
            notification.message,
            r#"<span class="user">a</span> timed out <span class="victim">b</span> with !timeout EleGiggle"#
        );
        assert_eq!(notification.duration(), Duration::from_secs(8));
    }

    #[test]
    fn refresh_and_reload_are_the_same_event() {
        assert_eq!(parse(&json!({ "event": "refresh" })).unwrap(), Some(OverlayEvent::Reload));
        assert_eq!(
            parse(&json!({ "event": "reload", "data": {} })).unwrap(),
            Some(OverlayEvent::Reload)
        );
    }

    #[test]
    fn payloadless_events_ignore_data() {
        assert_eq!(
            parse(&json!({ "event": "emotecounter_close", "data": "whatever" })).unwrap(),
            Some(OverlayEvent::EmoteCounterClose)
        );
        assert_eq!(
            parse(&json!({ "event": "dotabet_new_game" })).unwrap(),
            Some(OverlayEvent::DotabetNewGame)
        );
    }

    #[test]
    fn parses_win_percent_change() {
        let event = parse(&json!({
            "event": "win_percent_change",
            "data": { "isRadiant": false, "isDraw": false, "winPct": 63.5 }
        }));

        let expected = WinPercentChange::builder()
            .is_radiant(false)
            .win_pct("63.5")
            .build();
        assert_eq!(event.unwrap(), Some(OverlayEvent::WinPercentChange(expected)));
    }

    #[test]
    fn parses_dotabet_update() {
        let event = parse(&json!({
            "event": "dotabet_update_data",
            "data": { "win_betters": 3, "loss_betters": 1, "win_points": 1500, "loss_points": 200 }
        }));

        let expected = DotabetUpdate::builder()
            .win_betters(3)
            .loss_betters(1)
            .win_points(1500)
            .loss_points(200)
            .build();
        assert_eq!(event.unwrap(), Some(OverlayEvent::DotabetUpdateData(expected)));
    }

    #[test]
    fn parses_custom_image_with_optional_fields() {
        let event = parse(&json!({
            "event": "show_custom_image",
            "data": { "url": "https://i.imgur.com/x.png", "width": 200, "x": 10 }
        }));

        let Some(OverlayEvent::ShowCustomImage(image)) = event.unwrap() else {
            panic!("expected custom image");
        };
        assert_eq!(image.width.as_deref(), Some("200"));
        assert_eq!(image.height, None);
        assert_eq!(image.x, Some(10.0));
        assert_eq!(image.y, None);
    }

    #[test]
    fn play_sound_gain_is_fraction_of_volume() {
        let sound = PlaySound::builder().link("https://x/y.ogg").volume(40.0).build();
        assert!((sound.gain() - 0.4).abs() < 1e-9, "gain was {}", sound.gain());
    }

    #[test]
    fn parser_yields_nothing_for_unknown_events() {
        let parser = EnvelopeParser;

        assert!(parser.parse(br#"{"event":"bet_close_game"}"#).unwrap().is_empty());
        assert_eq!(
            parser.parse(br#"{"event":"refresh","data":{}}"#).unwrap(),
            vec![OverlayEvent::Reload]
        );
        parser.parse(b"not json").unwrap_err();
    }

    #[test]
    fn envelope_serializes_back() {
        let envelope = Envelope::builder()
            .event("new_box")
            .data(json!({ "color": "#64DD17" }))
            .build();

        let text = serde_json::to_string(&envelope).unwrap();
        let event = parse_envelope(text.as_bytes()).unwrap();
        assert_eq!(
            event,
            Some(OverlayEvent::NewBox(NewBox::builder().color("#64DD17").build()))
        );
    }
}
