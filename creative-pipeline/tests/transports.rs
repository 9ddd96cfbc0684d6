use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Form, Path as UrlPath};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use creative_pipeline::bannerbear::BannerbearClient;
use creative_pipeline::fetch::HttpFetcher;
use creative_pipeline::firefly::FireflyClient;
use creative_pipeline::load_config::{BannerbearSettings, FireflySettings};
use creative_pipeline_core::config::PipelineOptions;
use creative_pipeline_core::contract::{
    AssetFetcher, CompositionRequest, CompositionService, GenerationRequest, ImageGenerator,
    MockObjectStore,
};
use creative_pipeline_core::error::{CompositionError, FetchError, GenerationError};
use creative_pipeline_core::pipeline::Pipeline;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::net::TcpListener;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

fn serve(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

fn firefly_settings(base: &str) -> FireflySettings {
    FireflySettings {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        token_url: format!("{base}/ims/token/v3"),
        generate_url: format!("{base}/v2/images/generate"),
    }
}

fn bannerbear_settings(base: &str) -> BannerbearSettings {
    BannerbearSettings {
        api_key: "bb-key".into(),
        collection_id: "set-1".into(),
        base_url: base.to_string(),
    }
}

fn firefly_app(base: &str, token_hits: Arc<AtomicUsize>) -> Router {
    let image_url = format!("{base}/generated/image.jpg");
    Router::new()
        .route(
            "/ims/token/v3",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let hits = token_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let grant = form.get("grant_type").map(String::as_str);
                    let secret = form.get("client_secret").map(String::as_str);
                    let valid =
                        grant == Some("client_credentials") && secret == Some("client-secret");
                    if valid {
                        (StatusCode::OK, Json(json!({"access_token": "tok", "expires_in": 86399})))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})))
                    }
                }
            }),
        )
        .route(
            "/v2/images/generate",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let image_url = image_url.clone();
                async move {
                    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
                    let authorized = header("authorization") == Some("Bearer tok")
                        && header("x-api-key") == Some("client-id");
                    if !authorized {
                        return (StatusCode::FORBIDDEN, Json(json!({"message": "forbidden"})));
                    }
                    if body["prompt"].as_str().unwrap_or_default().contains("Nothing") {
                        return (StatusCode::OK, Json(json!({"outputs": []})));
                    }
                    let output = json!({"seed": 1, "image": {"presignedUrl": image_url}});
                    (StatusCode::OK, Json(json!({"outputs": [output]})))
                }
            }),
        )
        .route("/generated/image.jpg", get(|| async { JPEG_BYTES.to_vec() }))
}

fn bannerbear_app(base: &str, submissions: Arc<AtomicUsize>) -> Router {
    let render_base = format!("{base}/render");
    Router::new()
        .route(
            "/v2/collections",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let submissions = submissions.clone();
                async move {
                    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                    if auth != Some("Bearer bb-key") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad key"})));
                    }
                    if body["template_set"] != "set-1" {
                        return (StatusCode::BAD_REQUEST, Json(json!({"message": "unknown set"})));
                    }
                    let n = submissions.fetch_add(1, Ordering::SeqCst);
                    let uid = format!("col-{n}");
                    (StatusCode::ACCEPTED, Json(json!({"uid": uid, "status": "pending"})))
                }
            }),
        )
        .route(
            "/v2/collections/:uid",
            get(move |UrlPath(uid): UrlPath<String>| {
                let render_base = render_base.clone();
                async move {
                    Json(json!({
                        "uid": uid,
                        "status": "completed",
                        "images": [
                            {"image_url_png": format!("{render_base}/{uid}-story.png"),
                             "image_url_jpg": format!("{render_base}/{uid}-story.jpg"),
                             "width": 1080, "height": 1920},
                            {"image_url_png": format!("{render_base}/{uid}-square.png"),
                             "image_url_jpg": null,
                             "width": 1080, "height": 1080},
                            {"image_url_png": null, "image_url_jpg": null, "width": 1, "height": 1}
                        ]
                    }))
                }
            }),
        )
        .route(
            "/render/:name",
            get(|UrlPath(name): UrlPath<String>| async move { name.into_bytes() }),
        )
        .route(
            "/v2/account",
            get(|| async { Json(json!({"name": "Studio", "plan_name": "Pro"})) }),
        )
}

#[tokio::test]
async fn firefly_authenticates_once_and_downloads_output() {
    let (listener, base) = bind().await;
    let hits = Arc::new(AtomicUsize::new(0));
    serve(listener, firefly_app(&base, hits.clone()));

    let client = FireflyClient::new(reqwest::Client::new(), &firefly_settings(&base));
    let request = GenerationRequest::for_product("Boot", Some("de-DE"));

    let first = client.generate(&request).await.unwrap();
    let second = client.generate(&request).await.unwrap();

    assert_eq!(first, JPEG_BYTES);
    assert_eq!(second, JPEG_BYTES);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn firefly_auth_failure_is_sticky() {
    let (listener, base) = bind().await;
    let hits = Arc::new(AtomicUsize::new(0));
    serve(listener, firefly_app(&base, hits.clone()));

    let mut settings = firefly_settings(&base);
    settings.client_secret = "wrong".into();
    let client = FireflyClient::new(reqwest::Client::new(), &settings);
    let request = GenerationRequest::for_product("Boot", None);

    for _ in 0..2 {
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotAuthenticated));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn firefly_response_without_output_is_an_error() {
    let (listener, base) = bind().await;
    serve(listener, firefly_app(&base, Arc::new(AtomicUsize::new(0))));

    let client = FireflyClient::new(reqwest::Client::new(), &firefly_settings(&base));
    let err = client
        .generate(&GenerationRequest::for_product("Nothing", None))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MissingOutput));
}

#[tokio::test]
async fn bannerbear_submit_and_status_round_trip() {
    let (listener, base) = bind().await;
    serve(listener, bannerbear_app(&base, Arc::new(AtomicUsize::new(0))));

    let client = BannerbearClient::new(reqwest::Client::new(), &bannerbear_settings(&base));
    let uid = client
        .submit(&CompositionRequest::overlay("Walk further", "https://signed/hero.png"))
        .await
        .unwrap();
    assert_eq!(uid, "col-0");

    let snapshot = client.status(&uid).await.unwrap();
    assert_eq!(snapshot.status.as_deref(), Some("completed"));
    let images = snapshot.images.unwrap();
    assert_eq!(images.len(), 3);
    assert!(images[1].image_url_jpg.is_none());

    let account = client.check_account().await.unwrap();
    assert_eq!(account.plan_name.as_deref(), Some("Pro"));
}

#[tokio::test]
async fn bannerbear_rejections_are_typed() {
    let (listener, base) = bind().await;
    let app = Router::new()
        .route(
            "/v2/collections",
            post(|| async { (StatusCode::OK, Json(json!({"uid": "col-x"}))) }),
        )
        .route(
            "/v2/account",
            get(|| async { (StatusCode::UNAUTHORIZED, "invalid key") }),
        );
    serve(listener, app);

    let client = BannerbearClient::new(reqwest::Client::new(), &bannerbear_settings(&base));
    let request = CompositionRequest::overlay("m", "https://signed/hero.png");

    let err = client.submit(&request).await.unwrap_err();
    assert!(matches!(err, CompositionError::Rejected { status: 200, .. }));

    let err = client.check_account().await.unwrap_err();
    assert!(
        matches!(err, CompositionError::Rejected { status: 401, ref body } if body == "invalid key")
    );
}

#[tokio::test]
async fn bannerbear_acceptance_without_uid_fails() {
    let (listener, base) = bind().await;
    let app = Router::new().route(
        "/v2/collections",
        post(|| async { (StatusCode::CREATED, Json(json!({"status": "pending"}))) }),
    );
    serve(listener, app);

    let client = BannerbearClient::new(reqwest::Client::new(), &bannerbear_settings(&base));
    let err = client
        .submit(&CompositionRequest::overlay("m", "u"))
        .await
        .unwrap_err();
    assert!(matches!(err, CompositionError::MissingJobId));
}

#[tokio::test]
async fn fetcher_streams_into_nested_path_and_reports_status() {
    let (listener, base) = bind().await;
    let app = Router::new()
        .route("/ok.png", get(|| async { vec![7u8; 4096] }))
        .route("/gone.png", get(|| async { StatusCode::NOT_FOUND }));
    serve(listener, app);

    let dir = tempdir().unwrap();
    let fetcher = HttpFetcher::new(reqwest::Client::new());

    let dest = dir.path().join("output/Boot/1080x1080_Fall_Boot.png");
    let written = fetcher
        .fetch_to_path(&format!("{base}/ok.png"), &dest)
        .await
        .unwrap();
    assert_eq!(written, 4096);
    assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);

    let err = fetcher
        .fetch_to_path(&format!("{base}/gone.png"), &dir.path().join("gone.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn fetcher_leaves_no_file_when_the_body_breaks_off() {
    let (listener, base) = bind().await;
    let app = Router::new().route(
        "/broken.png",
        get(|| async {
            let chunks = vec![
                Ok(Bytes::from(vec![7u8; 64 * 1024])),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream reset")),
            ];
            Body::from_stream(futures::stream::iter(chunks))
        }),
    );
    serve(listener, app);

    let dir = tempdir().unwrap();
    let dest = dir.path().join("output/Boot/1920x1080_Fall_Boot.png");
    let err = HttpFetcher::new(reqwest::Client::new())
        .fetch_to_path(&format!("{base}/broken.png"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
    assert!(!dest.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn pipeline_runs_against_fake_services() {
    let (ff_listener, ff_base) = bind().await;
    serve(ff_listener, firefly_app(&ff_base, Arc::new(AtomicUsize::new(0))));
    let (bb_listener, bb_base) = bind().await;
    let submissions = Arc::new(AtomicUsize::new(0));
    serve(bb_listener, bannerbear_app(&bb_base, submissions.clone()));

    let work = tempdir().unwrap();
    let staging = work.path().join("START");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(
        staging.join("fall.json"),
        json!({
            "campaign": "Fall Drop",
            "target_region": "en-GB",
            "target_audience": "hikers",
            "product": ["Boot", "Hat"],
            "campaign_message": "Walk further",
            "file_format": "jpg"
        })
        .to_string(),
    )
    .unwrap();

    let mut store = MockObjectStore::new();
    store.expect_list().returning(|_, _| Ok(vec![]));
    store
        .expect_put()
        .withf(|key, body, content_type| {
            key.starts_with("generated/Fall_Drop_")
                && body == JPEG_BYTES
                && content_type == "image/jpeg"
        })
        .times(2)
        .returning(|_, _, _| Ok(()));
    store
        .expect_presigned_get()
        .returning(|key, _| Ok(format!("https://signed/{key}")));

    let http = reqwest::Client::new();
    let pipeline = Pipeline::new(
        store,
        FireflyClient::new(http.clone(), &firefly_settings(&ff_base)),
        BannerbearClient::new(http.clone(), &bannerbear_settings(&bb_base)),
        HttpFetcher::new(http),
        PipelineOptions {
            staging_dir: staging.clone(),
            campaigns_root: work.path().join("campaigns"),
            ..Default::default()
        },
    );

    let report = pipeline.run_staging().await.unwrap();
    assert!(report.all_succeeded());
    assert_eq!(submissions.load(Ordering::SeqCst), 2);

    let out = work.path().join("campaigns/Fall_Drop/output");
    assert_eq!(
        std::fs::read_to_string(out.join("Boot/1920x1080_Fall_Drop_Boot.jpg")).unwrap(),
        "col-0-story.jpg"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("Hat/1080x1080_Fall_Drop_Hat.png")).unwrap(),
        "col-1-square.png"
    );
    assert!(!staging.join("fall.json").exists());
}
