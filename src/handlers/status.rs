use crate::{error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Service status for the UI: playback state, volume, library size.
pub async fn status(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let playback = state.playback.status().await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "connected",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "playback": {
            "state": playback.state,
            "current": playback.current,
            "effective_volume_percent": playback.effective_volume * 100.0,
            "max_volume_percent": playback.max_volume * 100.0
        },
        "library": {
            "files": state.library.len()
        },
        "channel": state.config.playback.channel
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::testing::StaticSource;
    use crate::config::AppConfig;
    use crate::library::SoundLibrary;
    use crate::playback::PlaybackController;
    use crate::voice::testing::RecordingVoice;
    use crate::voice::VoiceOutput;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_status_reports_idle_session() {
        let library = Arc::new(SoundLibrary::from_entries(Vec::new()));
        let playback = PlaybackController::spawn(
            Arc::clone(&library),
            Arc::new(RecordingVoice::default()) as Arc<dyn VoiceOutput>,
            Arc::new(StaticSource(vec![0.0; 960])),
            100,
            64_000,
        );
        let state = AppState::new(AppConfig::default(), library, playback);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/status.json", web::get().to(status)),
        )
        .await;

        let req = test::TestRequest::get().uri("/status.json").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["playback"]["state"], "idle");
        assert_eq!(body["library"]["files"], 0);
        assert_eq!(body["playback"]["max_volume_percent"], 100.0);
    }
}
