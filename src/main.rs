use log::info;
use serde::{Deserialize, Serialize};
use std::env;

use routebridge::{server, CookieOptions, Error, Request, Response, RouteBridge, SseEvent};

#[derive(Serialize, Deserialize)]
struct Item {
    id: String,
    name: String,
    description: Option<String>,
}

fn sample_items() -> Vec<Item> {
    vec![
        Item {
            id: "1".to_string(),
            name: "Item 1".to_string(),
            description: Some("Description for item 1".to_string()),
        },
        Item {
            id: "2".to_string(),
            name: "Item 2".to_string(),
            description: None,
        },
    ]
}

// アイテム一覧（?page=&limit= でページング）
fn list_items(req: &Request, res: &mut Response) -> Result<(), Error> {
    let items = sample_items();
    let page = req.get_query("page", "1").parse::<u64>().unwrap_or(1).max(1);
    let limit = req.get_query("limit", "10").parse::<u64>().unwrap_or(10);
    res.paginate(&items, page, limit, items.len() as u64)?;
    Ok(())
}

fn get_item(req: &Request, res: &mut Response) -> Result<(), Error> {
    let id = req.get_param("id", "");
    match sample_items().into_iter().find(|item| item.id == id) {
        Some(item) => res.success(&item, None)?,
        None => res.error(404, "Item not found", Some(serde_json::json!({ "id": id })))?,
    };
    Ok(())
}

// 新しいアイテムを作成
fn create_item(req: &Request, res: &mut Response) -> Result<(), Error> {
    if !req.validate_json(&["id", "name"]) {
        res.error(400, "id and name are required", None)?;
        return Ok(());
    }
    let item: Item = req.json()?;
    // 実際のアプリケーションではデータベースに保存する処理が入る
    info!("Creating new item: {}", item.name);
    res.json_with_status(201, &item)?;
    Ok(())
}

fn login(req: &Request, res: &mut Response) -> Result<(), Error> {
    let Some((user, _password)) = req.basic_auth() else {
        res.set_header("WWW-Authenticate", "Basic realm=\"routebridge\"")
            .error(401, "Unauthorized", None)?;
        return Ok(());
    };
    res.cookie("session", &format!("demo-{}", user), &CookieOptions::default().with_max_age(3600))?;
    res.success(&serde_json::json!({ "user": user }), Some("Logged in"))?;
    Ok(())
}

fn events(_req: &Request, res: &mut Response) -> Result<(), Error> {
    res.sse(&[
        SseEvent::new("connected").with_event("status"),
        SseEvent::new("{\"tick\":1}").with_id("1"),
    ])?;
    Ok(())
}

#[actix_web::main]
async fn main() {
    // ロガーの初期化
    env_logger::init();

    let app = match RouteBridge::builder()
        .health_endpoint()
        .metrics_endpoint()
        .get("/items", list_items)
        .get("/items/:id", get_item)
        .post("/items", create_item)
        .post("/login", login)
        .get("/events", events)
        .get("/", |req, res| {
            if req.accepts("text/html") {
                res.html("<h1>routebridge</h1>")?;
            } else {
                res.json(&serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))?;
            }
            Ok(())
        })
        .build()
    {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to build application: {}", e);
            std::process::exit(1);
        }
    };

    let port = match env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse::<u16>() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error parsing port: {}", e);
            std::process::exit(1);
        }
    };
    let host = "0.0.0.0";

    info!("Running as HTTP server on port {}", port);
    if let Err(e) = server::run_server(app, host, port).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
