//! Document conversion upload (`POST /convert`).
//!
//! Streams the multipart upload into the job's staging file, hands it to the
//! [`docconv_core::ConversionService`] and streams the converted file back.
//! Every failure is mapped through [`ServerError`], so clients always get a
//! `{"detail": "..."}` body with a meaningful status.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::routing::post;
use docconv_core::{ConvertError, StagedUpload};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::download;
use crate::error::ServerError;
use crate::schemas::convert::{ConvertUpload, ErrorBody};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(convert_document), components(schemas(ConvertUpload, ErrorBody)))]
pub struct ConvertApi;

/// Register the upload route.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/convert", post(convert_document))
}

/// Convert an uploaded document (`POST /convert`).
///
/// The generic service accepts any document the office suite can read and a
/// `format` of `pdf`, `docx`, `odt`, `rtf` or `txt` (default `pdf`). The
/// PDF-only service accepts `.pdf` uploads and always answers with DOCX.
///
/// On success the body is the converted file as `application/octet-stream`
/// with the suggested name in `Content-Disposition`. Both staged files are
/// gone from the scratch directory once the response has been sent.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Converted document", content_type = "application/octet-stream", body = Vec<u8>),
        (status = 400, description = "Missing file, unsupported format or unreadable input", body = ErrorBody),
        (status = 413, description = "Upload exceeds the configured size limit", body = ErrorBody),
        (status = 500, description = "Conversion tool failed or produced no output", body = ErrorBody),
        (status = 504, description = "Conversion tool timed out", body = ErrorBody),
    )
)]
pub async fn convert_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let variant = state.service.variant();
    let rejected = |e: ConvertError| ServerError::conversion(e, variant);

    let mut staged: Option<StagedUpload> = None;
    let mut format: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                // Chunks go straight to disk; a repeated `file` field replaces
                // (and thereby deletes) the earlier one.
                let mut upload = state.service.stage(field.file_name()).await.map_err(rejected)?;
                while let Some(chunk) = field.chunk().await? {
                    upload.write(&chunk).await.map_err(rejected)?;
                }
                debug!(
                    job_id = %upload.job_id(),
                    size_bytes = upload.size(),
                    "received file upload"
                );
                staged = Some(upload);
            }
            "format" => format = Some(field.text().await?),
            _ => debug!(field = %name, "ignoring unknown multipart field"),
        }
    }

    let staged = staged.ok_or_else(|| rejected(ConvertError::MissingFilename))?;
    let converted = state
        .service
        .convert_staged(staged, format.as_deref())
        .await
        .map_err(rejected)?;

    info!(
        job_id = %converted.job_id,
        strategy = %converted.strategy,
        download_name = %converted.download_name,
        "conversion ready for download"
    );

    download::file_response(converted).await.map_err(rejected)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod test {
    use std::path::Path;
    use std::time::Duration;

    use axum::body::{Body, Bytes};
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use docconv_core::ServiceVariant;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::routes::test_support::{
        BOUNDARY, config, multipart_body, scratch_entries, script, state,
    };

    /// Mimics the office CLI: writes `<outdir>/<input stem>.<fmt>`.
    const FAKE_OFFICE: &str = r#"
fmt=""; outdir=""; input=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) fmt="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    -env:*|--headless) shift ;;
    *) input="$1"; shift ;;
  esac
done
base=$(basename "$input"); stem="${base%.*}"
printf 'office:%s' "$(cat "$input")" > "$outdir/$stem.$fmt"
"#;

    /// Mimics `pdf2docx convert <in> <out>`.
    const FAKE_PDF2DOCX: &str = r#"printf 'pdf2docx:%s' "$(cat "$2")" > "$3""#;

    /// Rejects every input the way pdf2docx does for a corrupt PDF.
    const BROKEN_PDF2DOCX: &str = r#"echo "Error: cannot open broken PDF file" >&2; exit 1"#;

    struct Harness {
        _tools: tempfile::TempDir,
        scratch: tempfile::TempDir,
        app: axum::Router,
    }

    impl Harness {
        fn new(variant: ServiceVariant, office: &str, pdf2docx: &str, timeout: Duration) -> Self {
            let tools = tempfile::tempdir().unwrap();
            let scratch = tempfile::tempdir().unwrap();
            let office = script(tools.path(), "soffice", office);
            let pdf2docx = script(tools.path(), "pdf2docx", pdf2docx);
            let cfg = config(scratch.path(), variant, &office, &pdf2docx);
            let app = crate::routes::build(state(cfg, timeout));
            Self {
                _tools: tools,
                scratch,
                app,
            }
        }

        fn generic() -> Self {
            Self::new(
                ServiceVariant::Generic,
                FAKE_OFFICE,
                FAKE_PDF2DOCX,
                Duration::from_secs(10),
            )
        }

        async fn post(&self, body: Vec<u8>) -> (StatusCode, HeaderMap, Bytes) {
            post(&self.app, body).await
        }

        fn scratch(&self) -> &Path {
            self.scratch.path()
        }
    }

    async fn post(app: &axum::Router, body: Vec<u8>) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::post("/convert")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes)
    }

    fn detail(bytes: &Bytes) -> String {
        let body: serde_json::Value = serde_json::from_slice(bytes).unwrap();
        body["detail"].as_str().unwrap_or_default().to_owned()
    }

    #[tokio::test]
    async fn converts_docx_to_pdf_and_cleans_up() {
        let h = Harness::generic();
        let (status, headers, body) = h
            .post(multipart_body(Some(("report.docx", b"hello")), Some("pdf")))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"office:hello");
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.pdf\""
        );
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn target_matching_the_upload_extension_round_trips() {
        let h = Harness::generic();
        for (name, format) in [("report.docx", "docx"), ("a.pdf", "pdf")] {
            let (status, headers, body) = h
                .post(multipart_body(Some((name, b"hello")), Some(format)))
                .await;

            assert_eq!(status, StatusCode::OK, "{name} -> {format}");
            assert_eq!(body.as_ref(), b"office:hello");
            assert_eq!(
                headers[header::CONTENT_DISPOSITION],
                format!("attachment; filename=\"{name}\"").as_str()
            );
            assert!(scratch_entries(h.scratch()).is_empty());
        }
    }

    #[tokio::test]
    async fn format_field_may_precede_the_file() {
        let h = Harness::generic();
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\ntxt\r\n"
        )
        .into_bytes();
        body.extend(multipart_body(Some(("notes.odt", b"abc")), None));

        let (status, headers, bytes) = h.post(body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes.as_ref(), b"office:abc");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.txt\""
        );
    }

    #[tokio::test]
    async fn format_defaults_to_pdf() {
        let h = Harness::generic();
        let (status, headers, _) = h
            .post(multipart_body(Some(("notes.odt", b"x")), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"notes.pdf\""
        );
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected_before_any_tool_runs() {
        let marker = tempfile::tempdir().unwrap();
        let touched = marker.path().join("ran");
        let office = format!("touch '{}'", touched.display());
        let h = Harness::new(
            ServiceVariant::Generic,
            &office,
            FAKE_PDF2DOCX,
            Duration::from_secs(10),
        );

        let (status, _, body) = h
            .post(multipart_body(Some(("report.docx", b"x")), Some("xlsx")))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            detail(&body),
            "Unsupported target format: xlsx. Allowed: docx, odt, pdf, rtf, txt"
        );
        assert!(!touched.exists());
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn missing_or_empty_filename_is_400() {
        let h = Harness::generic();

        let (status, _, body) = h.post(multipart_body(None, Some("pdf"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail(&body), "No file provided");

        let (status, _, _) = h.post(multipart_body(Some(("", b"x")), Some("pdf"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn pdf_to_docx_uses_the_specialized_tool() {
        let h = Harness::generic();
        let (status, headers, body) = h
            .post(multipart_body(Some(("contract.pdf", b"%PDF")), Some("docx")))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"pdf2docx:%PDF");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"contract.docx\""
        );
    }

    #[tokio::test]
    async fn pdf_to_other_formats_stays_on_the_office_suite() {
        let h = Harness::generic();
        let (status, _, body) = h
            .post(multipart_body(Some(("contract.pdf", b"%PDF")), Some("odt")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"office:%PDF");
    }

    #[tokio::test]
    async fn tool_failure_on_generic_service_is_500() {
        let h = Harness::new(
            ServiceVariant::Generic,
            FAKE_OFFICE,
            BROKEN_PDF2DOCX,
            Duration::from_secs(10),
        );
        let (status, _, body) = h
            .post(multipart_body(Some(("bad.pdf", b"junk")), Some("docx")))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).starts_with("pdf2docx conversion failed"));
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn missing_output_is_500_with_listing() {
        let h = Harness::new(
            ServiceVariant::Generic,
            "exit 0",
            FAKE_PDF2DOCX,
            Duration::from_secs(10),
        );
        let (status, _, body) = h
            .post(multipart_body(Some(("report.docx", b"x")), Some("pdf")))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).starts_with("Conversion output not found"));
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn pdf_only_service_rejects_other_inputs() {
        let h = Harness::new(
            ServiceVariant::PdfToDocx,
            FAKE_OFFICE,
            FAKE_PDF2DOCX,
            Duration::from_secs(10),
        );

        let (status, _, body) = h.post(multipart_body(Some(("notes.txt", b"x")), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail(&body), "Only PDF files are supported");

        let (status, headers, body) = h
            .post(multipart_body(Some(("Scan.PDF", b"%PDF")), Some("odt")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"pdf2docx:%PDF");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Scan.docx\""
        );
    }

    #[tokio::test]
    async fn pdf_only_service_maps_malformed_pdf_to_400() {
        let h = Harness::new(
            ServiceVariant::PdfToDocx,
            FAKE_OFFICE,
            BROKEN_PDF2DOCX,
            Duration::from_secs(10),
        );
        let (status, _, body) = h.post(multipart_body(Some(("bad.pdf", b"junk")), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("broken PDF"));
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn hung_tool_is_killed_and_reported_as_504() {
        let h = Harness::new(
            ServiceVariant::Generic,
            "exec sleep 30",
            FAKE_PDF2DOCX,
            Duration::from_millis(500),
        );

        let started = std::time::Instant::now();
        let (status, _, body) = h
            .post(multipart_body(Some(("slow.docx", b"x")), Some("pdf")))
            .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            detail(&body),
            "Conversion timeout: LibreOffice took too long to process the file"
        );
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test]
    async fn tool_leaving_a_helper_behind_is_bounded_by_the_timeout() {
        // Exits at once but its forked helper keeps stdout and stderr open.
        let h = Harness::new(
            ServiceVariant::Generic,
            "sleep 30 &\nexit 0",
            FAKE_PDF2DOCX,
            Duration::from_millis(500),
        );

        let started = std::time::Instant::now();
        let (status, _, _) = h
            .post(multipart_body(Some(("slow.docx", b"x")), Some("pdf")))
            .await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(scratch_entries(h.scratch()).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_share_files() {
        let h = Harness::generic();

        let mut handles = Vec::new();
        for i in 0..50 {
            let app = h.app.clone();
            handles.push(tokio::spawn(async move {
                let payload = format!("document-{i}");
                let (status, _, body) = post(
                    &app,
                    multipart_body(Some(("same.docx", payload.as_bytes())), Some("txt")),
                )
                .await;
                (status, payload, body)
            }));
        }

        for handle in handles {
            let (status, payload, body) = handle.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_ref(), format!("office:{payload}").as_bytes());
        }
        assert!(scratch_entries(h.scratch()).is_empty());
    }
}
