use actix_web::http::header;
use actix_web::{web, HttpResponse};

use crate::errors::AppError;
use crate::infrastructure::image_store::content_type_for;
use crate::AppState;

/// GET /library/items/{filename}
#[utoipa::path(
    get,
    path = "/library/items/{filename}",
    params(("filename" = String, Path, description = "Stored image file name")),
    responses(
        (status = 200, description = "Image bytes", body = Vec<u8>, content_type = "image/*"),
        (status = 404, description = "Image not found"),
    ),
    tag = "catalog"
)]
pub async fn serve_item_image(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filename = path.into_inner();
    let content_type = content_type_for(&filename);
    let bytes = web::block(move || state.images.read(&filename)).await??;
    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(bytes))
}
