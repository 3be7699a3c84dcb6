//! actix-webによるHTTPトランスポート

use std::sync::Arc;
use log::info;
use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};

use crate::common::{RawRequest, WireResponse};
use crate::RouteBridge;

/// actix-webのリクエストから生リクエストに変換
fn convert_request(req: &HttpRequest, body: Bytes) -> RawRequest {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(key, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (key.as_str().to_string(), v.to_string()))
        })
        .collect();

    RawRequest {
        method: req.method().as_str().to_string(),
        path: req.uri().path().to_string(),
        query_string: req.query_string().to_string(),
        headers,
        body: body.to_vec(),
        remote_addr: req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_default(),
        // bind() はTLSを終端しない
        tls: false,
    }
}

/// 送信用レスポンスからactix-webのHttpResponseに変換
fn convert_to_http_response(wire: WireResponse) -> HttpResponse {
    let status = StatusCode::from_u16(wire.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);

    // Set-Cookie等の複数行ヘッダーを保持するためappendする
    for (key, value) in wire.headers {
        builder.append_header((key, value));
    }

    builder.body(wire.body)
}

/// すべてのリクエストを受け取るactix-web用ハンドラー
async fn handle_request(
    req: HttpRequest,
    body: Bytes,
    app: web::Data<Arc<RouteBridge>>,
) -> HttpResponse {
    let raw = convert_request(&req, body);
    let wire = app.dispatch(raw).await;
    convert_to_http_response(wire)
}

/// アプリケーションをHTTPサーバーとして実行
pub async fn run_server(app: RouteBridge, host: &str, port: u16) -> std::io::Result<()> {
    info!("Starting HTTP server on {}:{}", host, port);

    let max_body = app.config().max_body_size;
    let app_data = Arc::new(app);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_data.clone()))
            // リクエストボディサイズの上限（共通設定）
            .app_data(web::PayloadConfig::new(max_body))
            .default_service(web::to(handle_request))
    })
    .bind((host, port))?
    .run()
    .await
}
