use crate::{error::AppError, error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};

pub async fn list_files(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.library.names())
}

pub async fn play(state: web::Data<AppState>, path: web::Path<String>) -> AppResult<HttpResponse> {
    let name = path.into_inner();
    let played = state.playback.play(&name).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .body(format!("Playing {}\n", played.display())))
}

pub async fn set_volume(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let raw = path.into_inner();
    let percent: i64 = raw
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("couldn't convert {} to integer", raw)))?;

    let effective = state.playback.set_volume(percent).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .body(format!("volume set to {:.1}%", effective * 100.0)))
}

pub async fn stop(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    state.playback.stop().await?;
    Ok(HttpResponse::Ok().content_type("text/plain").body("ok"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::FRAME_SIZE;
    use crate::audio::source::testing::StaticSource;
    use crate::config::AppConfig;
    use crate::library::SoundLibrary;
    use crate::playback::PlaybackController;
    use crate::voice::testing::RecordingVoice;
    use crate::voice::VoiceOutput;
    use actix_web::{http::StatusCode, test, App};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn test_state(names: &[&str], max_volume_percent: u32) -> AppState {
        let library = Arc::new(SoundLibrary::from_entries(names.iter().map(|n| {
            ((*n).to_string(), PathBuf::from(format!("/sounds/{}", n)))
        })));
        let clip: Vec<f32> = vec![0.0; FRAME_SIZE * 250]; // 5 s
        let playback = PlaybackController::spawn(
            Arc::clone(&library),
            Arc::new(RecordingVoice::default()) as Arc<dyn VoiceOutput>,
            Arc::new(StaticSource(clip)),
            max_volume_percent,
            64_000,
        );
        AppState::new(AppConfig::default(), library, playback)
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .route("/files.json", web::get().to(list_files))
                    .route("/play/{file}", web::get().to(play))
                    .route("/volume/{volume}", web::get().to(set_volume))
                    .route("/stop", web::get().to(stop)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_files_json_is_sorted() {
        let app = test_app!(test_state(&["zebra.mp3", "airhorn.wav"], 100));
        let req = test::TestRequest::get().uri("/files.json").to_request();
        let names: Vec<String> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(names, vec!["airhorn.wav", "zebra.mp3"]);
    }

    #[actix_web::test]
    async fn test_play_unknown_file_is_404() {
        let app = test_app!(test_state(&[], 100));
        let req = test::TestRequest::get().uri("/play/nope.mp3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_play_then_play_again_is_400() {
        let app = test_app!(test_state(&["beep.mp3"], 100));

        let req = test::TestRequest::get().uri("/play/beep.mp3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Playing /sounds/beep.mp3\n");

        let req = test::TestRequest::get().uri("/play/beep.mp3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_volume_scales_against_ceiling() {
        let app = test_app!(test_state(&[], 50));
        let req = test::TestRequest::get().uri("/volume/50").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "volume set to 25.0%");
    }

    #[actix_web::test]
    async fn test_volume_rejects_garbage_and_out_of_range() {
        let app = test_app!(test_state(&[], 100));

        let req = test::TestRequest::get().uri("/volume/abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/volume/101").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_stop_always_succeeds() {
        let app = test_app!(test_state(&[], 100));
        let req = test::TestRequest::get().uri("/stop").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "ok");
    }
}
