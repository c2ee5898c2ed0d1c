use std::collections::BTreeMap;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::serde_helpers::StringFromAny;

/// Renditions are normalised to the 4x image, whatever the largest size is.
const TARGET_SIZE: f64 = 4.0;

/// An emote as serialised by the bot.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Builder)]
pub struct Emote {
    /// Text code typed in chat (e.g. `Kappa`)
    #[builder(into)]
    pub code: String,
    /// Image URLs keyed by size multiplier (`"1"`, `"2"`, `"4"`)
    #[serde(default)]
    #[builder(default)]
    pub urls: BTreeMap<String, String>,
    /// Emote provider (`twitch`, `bttv`, `ffz`, `7tv`)
    #[serde(default)]
    #[builder(into)]
    pub provider: Option<String>,
    /// Provider-specific identifier
    #[serde(default, with = "serde_with::As::<Option<StringFromAny>>")]
    #[builder(into)]
    pub id: Option<String>,
}

/// The image chosen to render an emote.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct EmoteImage {
    pub url: String,
    /// Multiplier that brings the chosen rendition to the size of the 4x image
    pub scale: f64,
}

impl Emote {
    /// Pick the largest rendition available.
    ///
    /// Sizes that are not positive integers are ignored. Returns `None` when no usable
    /// URL is present.
    #[must_use]
    pub fn best_image(&self) -> Option<EmoteImage> {
        self.urls
            .iter()
            .filter_map(|(size, url)| {
                let size = size.parse::<u32>().ok().filter(|size| *size > 0)?;
                Some((size, url))
            })
            .max_by_key(|(size, _)| *size)
            .map(|(size, url)| EmoteImage {
                url: url.clone(),
                scale: TARGET_SIZE / f64::from(size),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kappa() -> Emote {
        serde_json::from_value(serde_json::json!({
            "code": "Kappa",
            "provider": "twitch",
            "id": 25,
            "urls": {
                "1": "https://static-cdn.jtvnw.net/emoticons/v1/25/1.0",
                "2": "https://static-cdn.jtvnw.net/emoticons/v1/25/2.0",
                "4": "https://static-cdn.jtvnw.net/emoticons/v1/25/3.0"
            }
        }))
        .unwrap()
    }

    #[test]
    fn picks_largest_size() {
        let image = kappa().best_image().unwrap();

        assert_eq!(image.url, "https://static-cdn.jtvnw.net/emoticons/v1/25/3.0");
        assert!((image.scale - 1.0).abs() < f64::EPSILON, "scale was {}", image.scale);
    }

    #[test]
    fn sizes_compare_numerically() {
        let emote = Emote::builder()
            .code("forsenE")
            .urls(BTreeMap::from([
                ("2".to_owned(), "two".to_owned()),
                ("10".to_owned(), "ten".to_owned()),
            ]))
            .build();

        let image = emote.best_image().unwrap();
        assert_eq!(image.url, "ten");
        assert!((image.scale - 0.4).abs() < 1e-9, "scale was {}", image.scale);
    }

    #[test]
    fn smaller_largest_size_scales_up() {
        let emote = Emote::builder()
            .code("LUL")
            .urls(BTreeMap::from([("2".to_owned(), "two".to_owned())]))
            .build();

        let image = emote.best_image().unwrap();
        assert!((image.scale - 2.0).abs() < f64::EPSILON, "scale was {}", image.scale);
    }

    #[test]
    fn no_usable_urls() {
        let emote = Emote::builder()
            .code("Keepo")
            .urls(BTreeMap::from([("big".to_owned(), "nope".to_owned())]))
            .build();

        assert_eq!(emote.best_image(), None);
        assert_eq!(kappa().id.as_deref(), Some("25"));
    }
}
