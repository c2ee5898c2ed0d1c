use bon::Builder;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::serde_helpers::serialize_kill_time;

/// Leaderboard change for one sniper.
///
/// With `plusone` set the server adds one kill and ignores `kills`. Fields left out
/// fall back to the server's defaults (one kill, now).
///
/// # Example
///
/// ```
/// use clr_overlay_client::sniper::types::LeaderboardUpdate;
///
/// let update = LeaderboardUpdate::builder().kills(3).build();
/// let plus_one = LeaderboardUpdate::builder().plusone(true).build();
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Builder)]
pub struct LeaderboardUpdate {
    /// Time of the latest kill, sent as `%Y-%m-%d %H:%M:%S`
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_kill_time"
    )]
    pub recent_kill: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[builder(default)]
    pub plusone: bool,
}

/// A clip submitted as proof of a snipe.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Builder)]
#[builder(on(String, into))]
pub struct Submission {
    pub link: String,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    #[test]
    fn leaderboard_update_omits_unset_fields() {
        let update = LeaderboardUpdate::builder().plusone(true).build();

        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "plusone": true }));
    }

    #[test]
    fn kill_time_uses_server_format() {
        let recent_kill = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(20, 15, 0))
            .unwrap();
        let update = LeaderboardUpdate::builder()
            .recent_kill(recent_kill)
            .kills(3)
            .build();

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "recent_kill": "2024-03-01 20:15:00", "kills": 3, "plusone": false })
        );
    }
}
