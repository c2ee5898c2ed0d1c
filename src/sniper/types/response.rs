use serde::Deserialize;

/// Body of every successful sniper API call, a bare JSON string (`"OK"`).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.message == "OK"
    }
}
