use std::time::Duration;

use deploy_core::{
    ActivityEntry, DeployStatusUpdate, JobStatus, LogLine, PipelineState, Stage, StageState,
    StartOutcome,
};
use deploy_engine::{
    ClientSettings, DeployApi, FailureKind, FullLog, RcloneStatus, ReqwestDeployApi, NONCE_HEADER,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestDeployApi {
    ReqwestDeployApi::new(ClientSettings {
        base_url: format!("{}/wp-json/simplystatic/v1", server.uri()),
        nonce: "abc123".to_string(),
        ..ClientSettings::default()
    })
    .expect("valid settings")
}

#[tokio::test]
async fn status_sends_nonce_and_defaults_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/is-running"))
        .and(header(NONCE_HEADER, "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "running": true })))
        .mount(&server)
        .await;

    let status = api_for(&server).check_status().await.unwrap();
    assert_eq!(
        status,
        JobStatus {
            running: true,
            paused: false
        }
    );
}

#[tokio::test]
async fn tail_passes_cursor_and_maps_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/debug-log"))
        .and(query_param("lines", "200"))
        .and(query_param("since_line", "41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "lines": [
                { "line_num": 42, "text": "R2: Uploaded logo.png" },
                { "line_num": 43, "text": "[done] Done!" }
            ],
            "running": false
        })))
        .mount(&server)
        .await;

    let batch = api_for(&server).tail_log(41, 200).await.unwrap();
    assert_eq!(
        batch.lines,
        vec![
            LogLine::new(42, "R2: Uploaded logo.png"),
            LogLine::new(43, "[done] Done!")
        ]
    );
    assert_eq!(batch.running, Some(false));
}

#[tokio::test]
async fn unsuccessful_tail_is_an_empty_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/debug-log"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Debug log not found"
        })))
        .mount(&server)
        .await;

    let batch = api_for(&server).tail_log(0, 200).await.unwrap();
    assert!(batch.lines.is_empty());
    assert_eq!(batch.running, None);
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/is-running"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).check_status().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn start_reads_status_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/start-export"))
        .and(body_json(json!({ "type": "export" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 409,
            "message": "An export is already running."
        })))
        .mount(&server)
        .await;

    let response = api_for(&server).start_job().await.unwrap();
    assert_eq!(response.outcome(), StartOutcome::AlreadyRunning);
}

#[tokio::test]
async fn accepted_start_without_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/start-export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Export could not be started: archive directory not writable"
        })))
        .mount(&server)
        .await;

    let response = api_for(&server).start_job().await.unwrap();
    assert_eq!(response.status_code, None);
    assert_eq!(
        response.outcome(),
        StartOutcome::Failed {
            message: "Export could not be started: archive directory not writable".to_string()
        }
    );
}

#[tokio::test]
async fn accepted_start_with_empty_body_uses_default_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/start-export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let response = api_for(&server).start_job().await.unwrap();
    assert_eq!(
        response.outcome(),
        StartOutcome::Failed {
            message: "Failed to start export".to_string()
        }
    );
}

#[tokio::test]
async fn refused_start_keeps_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/start-export"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "message": "Cookie check failed" })),
        )
        .mount(&server)
        .await;

    let response = api_for(&server).start_job().await.unwrap();
    assert_eq!(
        response.outcome(),
        StartOutcome::Failed {
            message: "Cookie check failed".to_string()
        }
    );
}

#[tokio::test]
async fn refused_start_without_json_uses_default_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/start-export"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let response = api_for(&server).start_job().await.unwrap();
    assert_eq!(
        response.outcome(),
        StartOutcome::Failed {
            message: "Failed to start export".to_string()
        }
    );
}

#[tokio::test]
async fn cancel_and_force_stop_ack_on_success_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/cancel-export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 200 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/force-stop"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.cancel_job().await.unwrap();
    let err = api.force_stop().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
}

#[tokio::test]
async fn deploy_status_posts_stage_changes_and_final_snapshot() {
    let server = MockServer::start().await;
    for body in [
        json!({ "reset": true }),
        json!({ "r2": "completed" }),
        json!({
            "setup": "completed",
            "discover": "skipped",
            "export": "completed",
            "r2": "completed",
            "github": "failed",
            "pages": "failed",
            "wrapup": "completed",
            "complete": true
        }),
    ] {
        Mock::given(method("POST"))
            .and(path("/wp-json/simplystatic/v1/deploy-status"))
            .and(header(NONCE_HEADER, "abc123"))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let pipeline: PipelineState = Stage::ALL
        .into_iter()
        .map(|stage| match stage {
            Stage::Discover => (stage, StageState::Skipped),
            Stage::Github | Stage::Pages => (stage, StageState::Failed),
            _ => (stage, StageState::Completed),
        })
        .collect();

    let api = api_for(&server);
    api.save_deploy_status(&DeployStatusUpdate::Reset).await.unwrap();
    api.save_deploy_status(&DeployStatusUpdate::Stage {
        stage: Stage::R2,
        state: StageState::Completed,
    })
    .await
    .unwrap();
    api.save_deploy_status(&DeployStatusUpdate::Final(pipeline))
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_deploy_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/simplystatic/v1/deploy-status"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .save_deploy_status(&DeployStatusUpdate::Reset)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
}

#[tokio::test]
async fn full_log_joins_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/debug-log"))
        .and(query_param("lines", "10000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "lines": [
                { "line_num": 1, "text": "Setting up export" },
                { "line_num": 2, "text": "Export completed successfully" }
            ]
        })))
        .mount(&server)
        .await;

    let full_log = api_for(&server).download_full_log().await.unwrap();
    assert_eq!(
        full_log,
        Some(FullLog {
            text: "Setting up export\nExport completed successfully".to_string(),
            line_count: 2
        })
    );
}

#[tokio::test]
async fn rclone_check_and_activity_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/check-rclone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available": true,
            "path": "/usr/local/bin/rclone"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/activity-log"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "r2_upload": { "message": "R2: Uploaded 12 images", "datetime": "2025-03-09 14:05:07" },
            "fetch_urls": "Fetched 40 of 136 pages",
            "github_push": { "datetime": "2025-03-09 14:05:07" }
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(
        api.check_rclone().await.unwrap(),
        RcloneStatus {
            available: true,
            path: Some("/usr/local/bin/rclone".to_string())
        }
    );
    assert_eq!(
        api.activity_log().await.unwrap(),
        vec![
            ActivityEntry {
                key: "fetch_urls".to_string(),
                message: "Fetched 40 of 136 pages".to_string()
            },
            ActivityEntry {
                key: "r2_upload".to_string(),
                message: "R2: Uploaded 12 images".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn slow_runner_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/simplystatic/v1/is-running"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "running": true })),
        )
        .mount(&server)
        .await;

    let api = ReqwestDeployApi::new(ClientSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ClientSettings::default()
    })
    .unwrap();
    let err = api.check_status().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}
