use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use er_axum::session::OptionalSessionId;
use serde_json::{json, Value};
use types::JobStage;

use crate::state::AppContext;

/// Progress of the session's latest job, in the shape the form polls for.
pub async fn status_handler(
    State(state): State<AppContext>,
    OptionalSessionId(session_id): OptionalSessionId,
) -> Json<Value> {
    let idle = || {
        Json(json!({
            "status": "IDLE",
            "message": "Waiting",
            "progress_percent": 0,
        }))
    };

    let Some(session_id) = session_id else {
        return idle();
    };
    let Some(job_id) = state
        .sessions
        .get(&session_id)
        .await
        .and_then(|session| session.job_id)
    else {
        return idle();
    };
    let Some(job) = state.jobs.get(&job_id).await else {
        return idle();
    };

    match job.progress.stage {
        JobStage::Complete => {
            let (final_video, public_url) = job
                .result
                .map_or((None, None), |result| (Some(result.final_video), result.public_url));

            if let Some(final_video) = final_video {
                let final_video = PathBuf::from(final_video);
                state
                    .sessions
                    .update(&session_id, |session| {
                        // an applied frame edit replaces the generated video
                        if session.final_video.is_none() {
                            session.final_video = Some(final_video);
                        }
                    })
                    .await;
            }

            let mut body = json!({
                "status": "COMPLETE",
                "message": job.progress.message,
                "progress_percent": 100,
                "final_video_url": "/download",
            });
            if let Some(url) = public_url {
                body["public_url"] = json!(url);
            }
            Json(body)
        }
        JobStage::Error => Json(json!({
            "status": "ERROR",
            "message": format!("Error: {}", job.error.unwrap_or(job.progress.message)),
            "progress_percent": job.progress.progress,
        })),
        stage => Json(json!({
            "status": stage,
            "message": job.progress.message,
            "progress_percent": job.progress.progress,
        })),
    }
}
