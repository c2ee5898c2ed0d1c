pub mod request;
pub mod response;

pub use request::{LeaderboardUpdate, Submission};
pub use response::Ack;
