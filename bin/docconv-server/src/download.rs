//! Streaming a converted file back to the client.
//!
//! The response body owns the job's [`ScratchFile`]; the file is deleted
//! when hyper drops the body, i.e. after the last chunk was written or as
//! soon as the transfer is aborted.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use docconv_core::{ConvertError, ConvertedFile, ScratchFile};
use futures::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 64 * 1024;

/// Build the download response. Fails before any byte is sent if the
/// output cannot be opened, so a client never sees a partial file.
pub async fn file_response(converted: ConvertedFile) -> Result<Response, ConvertError> {
    let file = File::open(converted.output.path()).await?;
    let len = file.metadata().await?.len();

    debug!(
        job_id = %converted.job_id,
        size_bytes = len,
        download_name = %converted.download_name,
        "streaming converted file"
    );

    let mut response = Response::new(Body::from_stream(chunks(file, converted.output)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(converted.media_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&converted.download_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// Read `file` in fixed-size chunks; `guard` lives exactly as long as the stream.
fn chunks(file: File, guard: ScratchFile) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    futures::stream::try_unfold((file, guard), |(mut file, guard)| async move {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match file.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(path = %guard.path().display(), "download fully sent");
                Ok(None)
            }
            Ok(_) => Ok(Some((buf.freeze(), (file, guard)))),
            Err(e) => {
                warn!(path = %guard.path().display(), error = %e, "failed reading converted file");
                Err(e)
            }
        }
    })
}

/// `attachment; filename="..."`, switching to the RFC 5987 `filename*`
/// form when the name is not plain printable ASCII.
pub fn content_disposition(filename: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\');
    if plain {
        format!("attachment; filename=\"{filename}\"")
    } else {
        format!("attachment; filename*=utf-8''{}", encode_rfc5987(filename))
    }
}

fn encode_rfc5987(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use docconv_core::{JobId, Strategy, TargetFormat};
    use http_body_util::BodyExt;

    #[test]
    fn ascii_names_use_quoted_form() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn non_ascii_names_are_percent_encoded() {
        assert_eq!(
            content_disposition("résumé final.pdf"),
            "attachment; filename*=utf-8''r%C3%A9sum%C3%A9%20final.pdf"
        );
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "attachment; filename*=utf-8''say%20%22hi%22.txt"
        );
    }

    #[tokio::test]
    async fn body_streams_all_bytes_then_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.pdf");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let response = file_response(ConvertedFile {
            job_id: JobId::new(),
            strategy: Strategy::ExternalTool,
            target: TargetFormat::Pdf,
            download_name: "report.pdf".into(),
            media_type: "application/octet-stream",
            output: ScratchFile::new(&path),
        })
        .await
        .unwrap();

        assert_eq!(response.headers()[header::CONTENT_LENGTH], "200000");
        assert!(path.exists(), "file must survive until the body is consumed");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), payload.as_slice());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropped_body_still_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.txt");
        std::fs::write(&path, b"abc").unwrap();

        let response = file_response(ConvertedFile {
            job_id: JobId::new(),
            strategy: Strategy::ExternalTool,
            target: TargetFormat::Txt,
            download_name: "a.txt".into(),
            media_type: "application/octet-stream",
            output: ScratchFile::new(&path),
        })
        .await
        .unwrap();
        drop(response);
        assert!(!path.exists());
    }
}
