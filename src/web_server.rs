use crate::ai::AiAnalyzer;
use crate::assembler;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::exif_data;
use crate::gps;
use crate::metadata::Section;
use crate::storage::Storage;
use actix_multipart::Multipart;
use actix_web::{web, App, HttpResponse, HttpServer};
use chrono::{SecondsFormat, Utc};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

/// One uploaded image, owned by a single request.
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Pull the image file out of a multipart payload.
///
/// Accepts the `file` field (or any field carrying a filename), requires
/// an `image/*` content type, and enforces the configured size cap while
/// streaming.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<ImageUpload, AppError> {
    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or("").to_string();
        let filename = disposition
            .get_filename()
            .map(|f| f.to_string());

        if name != "file" && filename.is_none() {
            continue;
        }
        let filename = filename.unwrap_or_else(|| "upload".to_string());

        let content_type = field
            .content_type()
            .cloned()
            .unwrap_or_else(|| mime_guess::from_path(&filename).first_or_octet_stream());

        if content_type.type_() != mime::IMAGE {
            return Err(AppError::InvalidInput("File must be an image".to_string()));
        }
        let content_type = content_type.to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::InvalidInput(format!(
                    "Upload exceeds the {} byte limit",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
        }

        log::debug!("Received upload {} ({} bytes, {})", filename, bytes.len(), content_type);
        return Ok(ImageUpload {
            bytes,
            filename,
            content_type,
        });
    }

    Err(AppError::InvalidInput(
        "No file field found in upload".to_string(),
    ))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Image Metadata Extraction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/extract-metadata": "POST - Upload image to extract metadata",
            "/extract-gps-only": "POST - Upload image to extract GPS location only",
            "/analyze-image-ai": "POST - Upload image for AI analysis",
            "/save-image": "POST - Upload image to persist with its metadata",
            "/saved-images": "GET - List saved images",
            "/saved-images/{image_id}": "GET - Retrieve saved metadata",
            "/ai-status": "GET - AI analysis availability",
            "/health": "GET - Health check",
        }
    }))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": now(),
    }))
}

async fn ai_status(analyzer: web::Data<Arc<AiAnalyzer>>) -> HttpResponse {
    HttpResponse::Ok().json(analyzer.status())
}

async fn extract_metadata(
    payload: Multipart,
    config: web::Data<AppConfig>,
    analyzer: web::Data<Arc<AiAnalyzer>>,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, config.max_upload_bytes).await?;
    let envelope = assembler::assemble(
        &upload.bytes,
        &upload.filename,
        &upload.content_type,
        Some(analyzer.as_ref()),
    )
    .await?;
    Ok(HttpResponse::Ok().json(envelope))
}

async fn extract_gps_only(
    payload: Multipart,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, config.max_upload_bytes).await?;

    // Corrupt uploads fail the request; only the format sniff is needed
    // here, the GPS tags live in the EXIF container without a pixel decode.
    image::guess_format(&upload.bytes)?;
    let exif = exif_data::read_exif(&upload.bytes);
    let gps_location = gps::extract_gps(exif.as_ref());

    let (status, message) = match &gps_location {
        Section::Present(_) => ("success", "GPS location extracted successfully".to_string()),
        Section::Absent { error } => ("no_gps_data", error.clone()),
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": status,
        "message": message,
        "filename": upload.filename,
        "gps_location": gps_location,
        "processed_at": now(),
    })))
}

async fn analyze_image_ai(
    payload: Multipart,
    config: web::Data<AppConfig>,
    analyzer: web::Data<Arc<AiAnalyzer>>,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, config.max_upload_bytes).await?;

    // Metadata is assembled for model grounding but not returned in full.
    let envelope =
        assembler::assemble(&upload.bytes, &upload.filename, &upload.content_type, None).await?;
    let analysis = analyzer
        .analyze(&upload.bytes, &upload.content_type, &envelope)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "filename": upload.filename,
        "ai_analysis": analysis,
        "processed_at": now(),
    })))
}

async fn save_image(
    payload: Multipart,
    config: web::Data<AppConfig>,
    analyzer: web::Data<Arc<AiAnalyzer>>,
    storage: web::Data<Arc<Storage>>,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, config.max_upload_bytes).await?;
    let envelope = assembler::assemble(
        &upload.bytes,
        &upload.filename,
        &upload.content_type,
        Some(analyzer.as_ref()),
    )
    .await?;

    let record = storage.save(&upload.bytes, &upload.filename, &envelope)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Image and metadata saved",
        "save_info": {
            "image_id": record.image_id,
            "saved_filename": record.saved_filename,
            "saved_at": record.saved_at,
            "image_path": record.image_path,
        },
        "metadata": envelope,
    })))
}

async fn saved_images(storage: web::Data<Arc<Storage>>) -> Result<HttpResponse, AppError> {
    let images = storage.list()?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "count": images.len(),
        "images": images,
    })))
}

async fn saved_image(
    path: web::Path<String>,
    storage: web::Data<Arc<Storage>>,
) -> Result<HttpResponse, AppError> {
    let image_id = path.into_inner();
    log::debug!("Fetching saved metadata for {}", image_id);
    let record = storage.get(&image_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "metadata": record,
    })))
}

pub async fn start_web_server(
    config: Arc<AppConfig>,
    storage: Arc<Storage>,
    analyzer: Arc<AiAnalyzer>,
) -> std::io::Result<()> {
    let port = config.web_port;
    let config_data = web::Data::from(config);
    let storage_data = web::Data::new(storage);
    let analyzer_data = web::Data::new(analyzer);

    log::info!("Starting web server on port: {}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(storage_data.clone())
            .app_data(analyzer_data.clone())
            .service(web::resource("/").route(web::get().to(root)))
            .service(web::resource("/health").route(web::get().to(health)))
            .service(web::resource("/ai-status").route(web::get().to(ai_status)))
            .service(web::resource("/extract-metadata").route(web::post().to(extract_metadata)))
            .service(web::resource("/extract-gps-only").route(web::post().to(extract_gps_only)))
            .service(web::resource("/analyze-image-ai").route(web::post().to(analyze_image_ai)))
            .service(web::resource("/save-image").route(web::post().to(save_image)))
            .service(web::resource("/saved-images").route(web::get().to(saved_images)))
            .service(web::resource("/saved-images/{image_id}").route(web::get().to(saved_image)))
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::openai::OpenAiProvider;
    use actix_web::{test, App};
    use std::time::Duration;
    use tempfile::TempDir;

    const BOUNDARY: &str = "------------------------testboundary";

    fn multipart_body(filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn test_config() -> AppConfig {
        AppConfig {
            web_port: 0,
            log_level: "info".to_string(),
            image_directory: "unused".to_string(),
            data_directory: "unused".to_string(),
            max_upload_bytes: 1024 * 1024,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ai_timeout_secs: 5,
            ai_max_tokens: 100,
        }
    }

    fn unconfigured_analyzer() -> Arc<AiAnalyzer> {
        let provider = OpenAiProvider::new(None, "gpt-4o-mini", Duration::from_secs(5));
        Arc::new(AiAnalyzer::with_provider(Arc::new(provider), 100))
    }

    async fn service(
        dir: &TempDir,
    ) -> impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    > {
        let config = web::Data::new(test_config());
        let storage = web::Data::new(Arc::new(
            Storage::new(dir.path().join("images"), dir.path().join("data")).unwrap(),
        ));
        let analyzer = web::Data::new(unconfigured_analyzer());

        test::init_service(
            App::new()
                .app_data(config)
                .app_data(storage)
                .app_data(analyzer)
                .service(web::resource("/health").route(web::get().to(health)))
                .service(web::resource("/ai-status").route(web::get().to(ai_status)))
                .service(web::resource("/extract-metadata").route(web::post().to(extract_metadata)))
                .service(web::resource("/extract-gps-only").route(web::post().to(extract_gps_only)))
                .service(web::resource("/analyze-image-ai").route(web::post().to(analyze_image_ai)))
                .service(web::resource("/save-image").route(web::post().to(save_image)))
                .service(web::resource("/saved-images").route(web::get().to(saved_images)))
                .service(
                    web::resource("/saved-images/{image_id}").route(web::get().to(saved_image)),
                ),
        )
        .await
    }

    fn post_image(uri: &str, filename: &str, content_type: &str, bytes: &[u8]) -> actix_http::Request {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(filename, content_type, bytes))
            .to_request()
    }

    #[actix_web::test]
    async fn health_reports_healthy() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;

        let resp: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(resp["status"], "healthy");
    }

    #[actix_web::test]
    async fn ai_status_reports_unavailable_without_credential() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;

        let resp: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/ai-status").to_request(),
        )
        .await;
        assert_eq!(resp["ai_available"], false);
        assert_eq!(resp["openai_configured"], false);
        assert_eq!(resp["status"], "unavailable");
    }

    #[actix_web::test]
    async fn gps_only_endpoint_reports_no_gps_for_plain_png() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;
        let png = crate::assembler::tests::png_bytes(48, 48);

        let resp: serde_json::Value = test::call_and_read_body_json(
            &app,
            post_image("/extract-gps-only", "plain.png", "image/png", &png),
        )
        .await;

        assert_eq!(resp["status"], "no_gps_data");
        assert_eq!(resp["gps_location"]["error"], "No GPS data found in EXIF");
        assert_eq!(resp["filename"], "plain.png");
    }

    #[actix_web::test]
    async fn gps_only_endpoint_rejects_corrupt_image_bytes() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;

        // Declared image/png, but the bytes are not any known image format.
        let resp = test::call_service(
            &app,
            post_image("/extract-gps-only", "garbage.png", "image/png", b"this is not an image"),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn extract_metadata_returns_full_envelope() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;
        let png = crate::assembler::tests::png_bytes(64, 32);

        let resp: serde_json::Value = test::call_and_read_body_json(
            &app,
            post_image("/extract-metadata", "t.png", "image/png", &png),
        )
        .await;

        assert_eq!(resp["status"], "success");
        assert_eq!(resp["image_properties"]["dimensions"]["resolution"], "64x32");
        assert!(resp["file_info"]["md5_hash"].is_string());
        // Unconfigured AI degrades to a section error without failing the request.
        assert!(resp["ai_analysis"]["error"].is_string());
    }

    #[actix_web::test]
    async fn non_image_upload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;

        let resp = test::call_service(
            &app,
            post_image("/extract-metadata", "notes.txt", "text/plain", b"hello"),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "File must be an image");
    }

    #[actix_web::test]
    async fn ai_endpoint_without_credential_is_service_unavailable() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;
        let png = crate::assembler::tests::png_bytes(48, 48);

        let resp = test::call_service(
            &app,
            post_image("/analyze-image-ai", "a.png", "image/png", &png),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn save_then_list_then_fetch() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;
        let png = crate::assembler::tests::png_bytes(32, 32);

        let saved: serde_json::Value = test::call_and_read_body_json(
            &app,
            post_image("/save-image", "keep.png", "image/png", &png),
        )
        .await;
        assert_eq!(saved["status"], "success");
        let image_id = saved["save_info"]["image_id"].as_str().unwrap().to_string();

        let listed: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/saved-images").to_request(),
        )
        .await;
        assert_eq!(listed["status"], "success");
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["images"][0]["image_id"], image_id.as_str());

        let fetched: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/saved-images/{}", image_id))
                .to_request(),
        )
        .await;
        assert_eq!(fetched["status"], "success");
        assert_eq!(fetched["metadata"]["image_id"], image_id.as_str());
        assert_eq!(fetched["metadata"]["metadata"]["status"], "success");
    }

    #[actix_web::test]
    async fn unknown_saved_image_is_not_found() {
        let dir = TempDir::new().unwrap();
        let app = service(&dir).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/saved-images/20990101_000000_abc123")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }
}
