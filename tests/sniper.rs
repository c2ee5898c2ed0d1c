#![cfg(feature = "sniper")]
#![allow(clippy::unwrap_used, reason = "tests can panic on unwrap")]

use clr_overlay_client::error::{Kind, Status};
use clr_overlay_client::sniper::Client;
use clr_overlay_client::sniper::types::{LeaderboardUpdate, Submission};
use httpmock::MockServer;

fn clip() -> Submission {
    Submission::builder()
        .link("https://clips.twitch.tv/FunnyClipKappa")
        .build()
}

mod leaderboard {
    use chrono::NaiveDate;
    use httpmock::Method::POST;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn update_leaderboard_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?.with_session("s3cret".to_owned());

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/snipers/forsen")
                .header("Content-Type", "application/json")
                .header("Cookie", "session=s3cret")
                .json_body(json!({
                    "recent_kill": "2024-03-01 20:15:00",
                    "kills": 3,
                    "plusone": false
                }));
            then.status(StatusCode::OK).json_body(json!("OK"));
        });

        let recent_kill = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(20, 15, 0))
            .unwrap();
        let update = LeaderboardUpdate::builder()
            .recent_kill(recent_kill)
            .kills(3)
            .build();

        let ack = client.update_leaderboard("forsen", &update).await?;

        assert!(ack.is_ok());
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn update_leaderboard_should_surface_auth_failure() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/snipers/forsen");
            then.status(StatusCode::FORBIDDEN)
                .json_body(json!("You do not have permission"));
        });

        let update = LeaderboardUpdate::builder().plusone(true).build();
        let error = client
            .update_leaderboard("forsen", &update)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Status);
        let status = error.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::FORBIDDEN);
        assert_eq!(status.message, "You do not have permission");
        mock.assert();

        Ok(())
    }
}

mod submissions {
    use httpmock::Method::{DELETE, POST, PUT};
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn submit_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v1/snipers/forsen/submit")
                .json_body(json!({ "link": "https://clips.twitch.tv/FunnyClipKappa" }));
            then.status(StatusCode::OK).json_body(json!("OK"));
        });

        let ack = client.submit("forsen", &clip()).await?;

        assert_eq!(ack.message, "OK");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_submission_should_fail() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(PUT).path("/api/v1/snipers/forsen/submit");
            then.status(StatusCode::BAD_REQUEST)
                .json_body(json!("Submission already exists in queue"));
        });

        let error = client.submit("forsen", &clip()).await.unwrap_err();

        let status = error.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(status.method, Method::PUT);
        assert_eq!(status.path, "/api/v1/snipers/forsen/submit");
        assert_eq!(status.message, "Submission already exists in queue");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn approve_should_credit_then_remove() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?.with_session("s3cret".to_owned());

        let credit = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/snipers/forsen")
                .header("Cookie", "session=s3cret")
                .json_body(json!({ "plusone": true }));
            then.status(StatusCode::OK).json_body(json!("OK"));
        });
        let remove = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/v1/snipers/forsen/submit")
                .header("Cookie", "session=s3cret")
                .json_body(json!({ "link": "https://clips.twitch.tv/FunnyClipKappa" }));
            then.status(StatusCode::OK).json_body(json!("OK"));
        });

        client.approve_submission("forsen", &clip()).await?;

        credit.assert();
        remove.assert();

        Ok(())
    }

    #[tokio::test]
    async fn approve_should_keep_clip_when_credit_fails() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let credit = server.mock(|when, then| {
            when.method(POST).path("/api/v1/snipers/forsen");
            then.status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Internal Server Error");
        });

        let error = client
            .approve_submission("forsen", &clip())
            .await
            .unwrap_err();

        let status = error.downcast_ref::<Status>().unwrap();
        assert_eq!(status.method, Method::POST);
        assert_eq!(status.message, "Internal Server Error");
        credit.assert();

        Ok(())
    }

    #[tokio::test]
    async fn deny_missing_submission_should_fail() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/api/v1/snipers/forsen/submit");
            then.status(StatusCode::NOT_FOUND)
                .json_body(json!("Submission not found in queue"));
        });

        let error = client.deny_submission("forsen", &clip()).await.unwrap_err();

        let status = error.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::NOT_FOUND);
        assert_eq!(status.message, "Submission not found in queue");
        mock.assert();

        Ok(())
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_sending() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url())?;

        let error = client.submit("", &clip()).await.unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);

        let empty = Submission::builder().link("").build();
        let error = client.submit("forsen", &empty).await.unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);

        let error = client
            .approve_submission("forsen", &empty)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);

        Ok(())
    }
}
