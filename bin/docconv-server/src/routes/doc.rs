use crate::routes::{convert, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "docconv-server",
    description = "Document conversion API backed by LibreOffice and pdf2docx",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(convert::ConvertApi::openapi());
    root
}
