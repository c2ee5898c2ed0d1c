use reqwest::{
    Client as ReqwestClient, Method,
    header::{COOKIE, HeaderMap, HeaderValue},
};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use super::types::{Ack, LeaderboardUpdate, Submission};
use crate::error::Error;
use crate::{API_HOST_VAR, Result};

/// Name of the web session cookie admin calls authenticate with.
pub const SESSION_COOKIE: &str = "session";

/// Client for the sniper leaderboard and submission queue.
///
/// Anyone may [`submit`](Self::submit) a clip. Leaderboard changes and queue
/// moderation need an admin session, attached with [`with_session`](Self::with_session).
///
/// # Example
///
/// ```no_run
/// use clr_overlay_client::sniper::{Client, types::Submission};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new("https://forsen.tv")?;
///
/// let submission = Submission::builder()
///     .link("https://clips.twitch.tv/SomeClip")
///     .build();
/// client.submit("forsen", &submission).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    host: Url,
    client: ReqwestClient,
    session: Option<SecretString>,
}

impl Client {
    /// Creates a new sniper API client for the bot's web host.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL is invalid or the HTTP client fails to build.
    pub fn new(host: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("clr_overlay_client"));
        headers.insert("Accept", HeaderValue::from_static("*/*"));
        headers.insert("Connection", HeaderValue::from_static("keep-alive"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        let host = Url::parse(host)?;
        if host.cannot_be_a_base() {
            return Err(Error::validation(format!("{host} cannot be used as an API host")));
        }

        Ok(Self {
            host,
            client,
            session: None,
        })
    }

    /// Creates a client for the host in `CLR_API_HOST`.
    pub fn from_env() -> Result<Client> {
        let host = std::env::var(API_HOST_VAR)
            .map_err(|e| Error::validation(format!("{API_HOST_VAR}: {e}")))?;

        Self::new(&host)
    }

    /// Attach an admin session cookie to every call.
    #[must_use]
    pub fn with_session<S: Into<SecretString>>(mut self, session: S) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Returns the host URL for the client.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    /// Set a sniper's kill count, or add one with `plusone`.
    pub async fn update_leaderboard(
        &self,
        username: &str,
        update: &LeaderboardUpdate,
    ) -> Result<Ack> {
        let request = self
            .client
            .request(Method::POST, self.sniper_url(username, false)?)
            .json(update)
            .build()?;

        crate::request(&self.client, request, self.session_headers()?).await
    }

    /// Queue a clip for review.
    ///
    /// Submitting a link that is already queued fails with a `400` status error.
    pub async fn submit(&self, username: &str, submission: &Submission) -> Result<Ack> {
        Self::validate_submission(submission)?;

        let request = self
            .client
            .request(Method::PUT, self.sniper_url(username, true)?)
            .json(submission)
            .build()?;

        crate::request(&self.client, request, self.session_headers()?).await
    }

    /// Remove a clip from the queue.
    ///
    /// Fails with a `404` status error when the link is not queued.
    pub async fn remove_submission(&self, username: &str, submission: &Submission) -> Result<Ack> {
        Self::validate_submission(submission)?;

        let request = self
            .client
            .request(Method::DELETE, self.sniper_url(username, true)?)
            .json(submission)
            .build()?;

        crate::request(&self.client, request, self.session_headers()?).await
    }

    /// Credit the sniper with one kill, then take the clip off the queue.
    ///
    /// The clip stays queued if crediting fails.
    pub async fn approve_submission(
        &self,
        username: &str,
        submission: &Submission,
    ) -> Result<Ack> {
        Self::validate_submission(submission)?;

        let plus_one = LeaderboardUpdate::builder().plusone(true).build();
        self.update_leaderboard(username, &plus_one).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(username, link = %submission.link, "Kill credited, removing submission");

        self.remove_submission(username, submission).await
    }

    /// Reject a clip without crediting anyone.
    pub async fn deny_submission(&self, username: &str, submission: &Submission) -> Result<Ack> {
        self.remove_submission(username, submission).await
    }

    /// `{host}/api/v1/snipers/{username}[/submit]`, with the username as one
    /// percent-encoded segment.
    fn sniper_url(&self, username: &str, submit: bool) -> Result<Url> {
        if username.trim().is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }

        let mut url = self.host.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::validation("host cannot be a base"))?;
            segments
                .pop_if_empty()
                .extend(["api", "v1", "snipers", username]);
            if submit {
                segments.push("submit");
            }
        }

        Ok(url)
    }

    fn validate_submission(submission: &Submission) -> Result<()> {
        if submission.link.trim().is_empty() {
            return Err(Error::validation("submission link cannot be empty"));
        }

        Ok(())
    }

    fn session_headers(&self) -> Result<Option<HeaderMap>> {
        let Some(session) = &self.session else {
            return Ok(None);
        };

        let mut value =
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={}", session.expose_secret()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, value);
        Ok(Some(headers))
    }
}
