//! Renderer-agnostic model of everything the overlay shows.
//!
//! [`Scene`] implements [`OverlayHandler`]: each event becomes a sprite with its own
//! [`Effect`], or an update to one of the fixed widgets. A renderer polls the
//! snapshots and draws them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;

use super::dispatcher::OverlayHandler;
use super::effect::{Effect, EffectId, Timeline};
use super::types::{
    CustomImage, DotabetUpdate, Emote, EmoteCombo, EmoteCounterStart, EmoteCounterUpdate,
    EmoteImage, NewBox, NewEmotes, Notification, PlaySound, WinPercentChange,
};

const BOX_SIZE: f64 = 50.0;
const IMAGE_SIZE: f64 = 120.0;

const BOX_TIMELINE: Timeline = Timeline::new(
    Duration::from_millis(500),
    Duration::from_millis(5000),
    Duration::from_millis(1000),
);
const EMOTE_FADE_IN: Duration = Duration::from_millis(500);
const EMOTE_FADE_OUT: Duration = Duration::from_millis(1000);
const NOTIFICATION_FADE_IN: Duration = Duration::from_millis(1000);
const NOTIFICATION_FADE_OUT: Duration = Duration::from_millis(1250);
const COMBO_FADE_IN: Duration = Duration::from_millis(1000);
const COMBO_FIRST_CLOSE: Duration = Duration::from_millis(4000);
const COMBO_REARM: Duration = Duration::from_millis(3000);
const COMBO_FADE_OUT: Duration = Duration::from_millis(1500);
const WIN_PERCENT_FADE_IN: Duration = Duration::from_millis(800);
const WIN_PERCENT_CLOSE_DELAY: Duration = Duration::from_millis(4000);
const WIN_PERCENT_FADE_OUT: Duration = Duration::from_millis(3000);
const DOTABET_FADE_IN: Duration = Duration::from_millis(1000);
const DOTABET_FADE_OUT: Duration = Duration::from_millis(10_000);

/// Sounds kept for [`Scene::take_sounds`]; the oldest is dropped past this.
pub const MAX_QUEUED_SOUNDS: usize = 64;

/// Exit deadline of widgets that stay up until they are closed.
const UNTIL_CLOSED: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Size of the area sprites are scattered over, in pixels.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A random top-left corner for a square of `size` that keeps it on screen.
    fn random_position(self, size: f64) -> Position {
        let pick = |extent: f64| {
            let max = extent - size;
            if max > 0.0 {
                rand::random_range(0.0..max).round()
            } else {
                0.0
            }
        };

        Position {
            x: pick(self.width),
            y: pick(self.height),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// Top-left corner of a sprite, in pixels.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// What a sprite looks like.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Box {
        color: String,
        position: Position,
    },
    Emote {
        code: String,
        url: String,
        /// Target opacity once faded in
        opacity: f64,
        scale: f64,
        position: Position,
    },
    Image {
        url: String,
        width: Option<String>,
        height: Option<String>,
        position: Position,
    },
    Notification {
        message: String,
    },
}

/// A visual with its lifecycle.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Sprite {
    /// Arrival order within the scene
    pub seq: u64,
    pub visual: Visual,
    pub effect: Effect,
}

/// The `xN combo!` badge.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ComboBadge {
    pub emote: Emote,
    pub image: Option<EmoteImage>,
    pub count: u32,
    pub effect: Effect,
}

/// Two-emote vote counter.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteCounter {
    pub emote1: Emote,
    pub emote2: Emote,
    pub value1: u32,
    pub value2: u32,
}

/// Win probability widget.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct WinPercent {
    pub radiant_highlighted: bool,
    pub dire_highlighted: bool,
    pub text: String,
    /// `None` until the widget is first opened
    pub effect: Option<Effect>,
}

/// Betting totals widget.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct Dotabet {
    pub totals: DotabetUpdate,
    pub effect: Option<Effect>,
}

/// A sound waiting to be played.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub link: String,
    /// Playback gain, `volume / 100`
    pub gain: f64,
}

#[derive(Debug, Default)]
struct Widgets {
    combo: Option<ComboBadge>,
    emote_counter: Option<EmoteCounter>,
    win_percent: WinPercent,
    dotabet: Dotabet,
}

#[derive(Debug, Default)]
struct Inner {
    viewport: Viewport,
    seq: AtomicU64,
    sprites: DashMap<EffectId, Sprite>,
    widgets: RwLock<Widgets>,
    sounds: Mutex<VecDeque<Sound>>,
    reloads: AtomicU64,
}

/// Overlay state. Clones share the same scene.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    inner: Arc<Inner>,
}

impl Scene {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Arc::new(Inner {
                viewport,
                ..Inner::default()
            }),
        }
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.inner.viewport
    }

    /// Live sprites in arrival order, notifications excluded. Removed sprites are
    /// already filtered out.
    #[must_use]
    pub fn sprites(&self) -> Vec<Sprite> {
        let mut sprites: Vec<Sprite> = self
            .inner
            .sprites
            .iter()
            .filter(|entry| {
                !entry.effect.is_removed()
                    && !matches!(entry.visual, Visual::Notification { .. })
            })
            .map(|entry| entry.value().clone())
            .collect();
        sprites.sort_by_key(|sprite| sprite.seq);
        sprites
    }

    /// Live notifications, newest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<Sprite> {
        let mut notifications: Vec<Sprite> = self
            .inner
            .sprites
            .iter()
            .filter(|entry| {
                !entry.effect.is_removed() && matches!(entry.visual, Visual::Notification { .. })
            })
            .map(|entry| entry.value().clone())
            .collect();
        notifications.sort_by_key(|sprite| std::cmp::Reverse(sprite.seq));
        notifications
    }

    #[must_use]
    pub fn combo(&self) -> Option<ComboBadge> {
        self.read_widgets(|widgets| {
            widgets
                .combo
                .clone()
                .filter(|combo| !combo.effect.is_removed())
        })
    }

    #[must_use]
    pub fn emote_counter(&self) -> Option<EmoteCounter> {
        self.read_widgets(|widgets| widgets.emote_counter.clone())
    }

    #[must_use]
    pub fn win_percent(&self) -> WinPercent {
        self.read_widgets(|widgets| widgets.win_percent.clone())
    }

    #[must_use]
    pub fn dotabet(&self) -> Dotabet {
        self.read_widgets(|widgets| widgets.dotabet.clone())
    }

    /// Drain the sounds queued since the last call, oldest first.
    ///
    /// At most [`MAX_QUEUED_SOUNDS`] are kept between calls.
    #[must_use]
    pub fn take_sounds(&self) -> Vec<Sound> {
        self.inner
            .sounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// How many `refresh`/`reload` events have been received.
    #[must_use]
    pub fn reloads(&self) -> u64 {
        self.inner.reloads.load(Ordering::Acquire)
    }

    /// Forget sprites and widget effects that have been removed.
    pub fn prune(&self) {
        self.inner
            .sprites
            .retain(|_, sprite| !sprite.effect.is_removed());

        self.write_widgets(|widgets| {
            if widgets
                .combo
                .as_ref()
                .is_some_and(|combo| combo.effect.is_removed())
            {
                widgets.combo = None;
            }
        });
    }

    fn read_widgets<T, F: FnOnce(&Widgets) -> T>(&self, f: F) -> T {
        f(&self
            .inner
            .widgets
            .read()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn write_widgets<T, F: FnOnce(&mut Widgets) -> T>(&self, f: F) -> T {
        f(&mut self
            .inner
            .widgets
            .write()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn add_sprite(&self, visual: Visual, timeline: Timeline) {
        let Some(effect) = spawn_effect(timeline) else {
            return;
        };

        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        self.inner.sprites.insert(
            effect.id(),
            Sprite {
                seq,
                visual,
                effect,
            },
        );
    }
}

fn spawn_effect(timeline: Timeline) -> Option<Effect> {
    match Effect::spawn(timeline) {
        Ok(effect) => Some(effect),
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "Unable to start overlay effect");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
            None
        }
    }
}

fn until_closed(fade_in: Duration, fade_out: Duration) -> Timeline {
    Timeline::new(fade_in, UNTIL_CLOSED, fade_out)
}

impl OverlayHandler for Scene {
    fn new_box(&mut self, event: NewBox) {
        self.prune();

        let position = self.inner.viewport.random_position(BOX_SIZE);
        self.add_sprite(
            Visual::Box {
                color: event.color,
                position,
            },
            BOX_TIMELINE,
        );
    }

    fn new_emotes(&mut self, event: NewEmotes) {
        self.prune();

        let timeline = Timeline::new(EMOTE_FADE_IN, event.persistence(), EMOTE_FADE_OUT);
        let opacity = event.alpha();

        for emote in event.emotes {
            let Some(image) = emote.best_image() else {
                #[cfg(feature = "tracing")]
                tracing::debug!(code = %emote.code, "Skipping emote without a usable image");
                continue;
            };

            let position = self.inner.viewport.random_position(IMAGE_SIZE);
            self.add_sprite(
                Visual::Emote {
                    code: emote.code,
                    url: image.url,
                    opacity,
                    scale: event.scale / 100.0 * image.scale,
                    position,
                },
                timeline,
            );
        }
    }

    fn notification(&mut self, event: Notification) {
        self.prune();

        let timeline = Timeline::new(
            NOTIFICATION_FADE_IN,
            NOTIFICATION_FADE_IN.saturating_add(event.duration()),
            NOTIFICATION_FADE_OUT,
        );
        self.add_sprite(
            Visual::Notification {
                message: event.message,
            },
            timeline,
        );
    }

    fn play_sound(&mut self, event: PlaySound) {
        self.prune();

        let gain = event.gain();
        let mut sounds = self
            .inner
            .sounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sounds.len() >= MAX_QUEUED_SOUNDS {
            #[cfg(feature = "tracing")]
            tracing::debug!("Sound queue full, dropping the oldest sound");
            _ = sounds.pop_front();
        }
        sounds.push_back(Sound {
            link: event.link,
            gain,
        });
    }

    fn emote_combo(&mut self, event: EmoteCombo) {
        self.prune();

        let image = event.emote.best_image();
        self.write_widgets(|widgets| {
            let live = widgets
                .combo
                .as_ref()
                .filter(|combo| combo.effect.phase().is_live())
                .map(|combo| combo.effect.clone());

            let effect = match live {
                Some(effect) => {
                    effect.hold_for(COMBO_REARM);
                    effect
                }
                None => {
                    let Some(effect) = spawn_effect(Timeline::new(
                        COMBO_FADE_IN,
                        COMBO_FIRST_CLOSE,
                        COMBO_FADE_OUT,
                    )) else {
                        return;
                    };
                    effect
                }
            };

            widgets.combo = Some(ComboBadge {
                emote: event.emote,
                image,
                count: event.count,
                effect,
            });
        });
    }

    fn emote_counter_start(&mut self, event: EmoteCounterStart) {
        self.prune();

        self.write_widgets(|widgets| {
            widgets.emote_counter = Some(EmoteCounter {
                emote1: event.emote1,
                emote2: event.emote2,
                value1: 0,
                value2: 0,
            });
        });
    }

    fn emote_counter_update(&mut self, event: EmoteCounterUpdate) {
        self.prune();

        self.write_widgets(|widgets| {
            if let Some(counter) = widgets.emote_counter.as_mut() {
                counter.value1 = event.value1;
                counter.value2 = event.value2;
            }
        });
    }

    fn emote_counter_close(&mut self) {
        self.prune();

        self.write_widgets(|widgets| widgets.emote_counter = None);
    }

    fn win_percent_change(&mut self, event: WinPercentChange) {
        self.prune();

        self.write_widgets(|widgets| {
            let win_percent = &mut widgets.win_percent;
            win_percent.radiant_highlighted = event.is_radiant || event.is_draw;
            win_percent.dire_highlighted = !event.is_radiant || event.is_draw;
            win_percent.text = event.win_pct;
        });
    }

    fn win_percent_open(&mut self) {
        self.prune();

        self.write_widgets(|widgets| {
            let win_percent = &mut widgets.win_percent;
            if win_percent
                .effect
                .as_ref()
                .is_some_and(|effect| effect.phase().is_live())
            {
                return;
            }
            win_percent.effect =
                spawn_effect(until_closed(WIN_PERCENT_FADE_IN, WIN_PERCENT_FADE_OUT));
        });
    }

    fn win_percent_close(&mut self) {
        self.prune();

        self.read_widgets(|widgets| {
            if let Some(effect) = widgets.win_percent.effect.as_ref() {
                effect.hold_for(WIN_PERCENT_CLOSE_DELAY);
            }
        });
    }

    fn dotabet_new_game(&mut self) {
        self.prune();

        self.write_widgets(|widgets| {
            if let Some(previous) = widgets.dotabet.effect.take() {
                previous.cancel();
            }
            widgets.dotabet = Dotabet {
                totals: DotabetUpdate::default(),
                effect: spawn_effect(until_closed(DOTABET_FADE_IN, DOTABET_FADE_OUT)),
            };
        });
    }

    fn dotabet_update(&mut self, event: DotabetUpdate) {
        self.prune();

        self.write_widgets(|widgets| widgets.dotabet.totals = event);
    }

    fn dotabet_close_game(&mut self) {
        self.prune();

        self.read_widgets(|widgets| {
            if let Some(effect) = widgets.dotabet.effect.as_ref() {
                effect.dismiss();
            }
        });
    }

    fn show_custom_image(&mut self, event: CustomImage) {
        self.prune();

        let random = self.inner.viewport.random_position(IMAGE_SIZE);
        let position = Position {
            x: event.x.unwrap_or(random.x),
            y: event.y.unwrap_or(random.y),
        };
        self.add_sprite(
            Visual::Image {
                url: event.url,
                width: event.width,
                height: event.height,
                position,
            },
            BOX_TIMELINE,
        );
    }

    fn reload(&mut self) {
        self.prune();

        self.inner.reloads.fetch_add(1, Ordering::AcqRel);
    }
}
