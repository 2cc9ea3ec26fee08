use std::io;
use std::sync::Arc;

use chrono::Utc;
use ntex::web;
use ntex::web::HttpRequest;
use ntex_files::NamedFile;
use serde::Serialize;
use spdlog::{error, info};

use crate::config::Config;
use crate::content::image_resolver::{ASSETS_NAMESPACE, IMAGES_NAMESPACE};
use crate::content::Post;
use crate::content_cache::{ContentCache, Expire};
use crate::content_index::{ContentIndex, PostSet};
use crate::feed::RssChannel;
use crate::query_string::QueryString;
use crate::storage::StorageService;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const FEED_CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate";

struct AppState {
    config: Config,
    index: ContentIndex,
    responses: ContentCache<String>,
    expire: Expire,
}

#[derive(Serialize)]
struct PostListResponse<'a> {
    posts: Vec<&'a Post>,
    tags: Vec<String>,
    categories: Vec<String>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

fn error_body(message: &str) -> String {
    serde_json::to_string(&ErrorResponse { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", message))
}

fn json_ok(body: &str) -> web::HttpResponse {
    web::HttpResponse::Ok()
        .content_type(JSON_CONTENT_TYPE)
        .body(body.to_string())
}

fn not_found() -> web::HttpResponse {
    web::HttpResponse::NotFound()
        .content_type(JSON_CONTENT_TYPE)
        .body(error_body("Post not found"))
}

fn internal_error() -> web::HttpResponse {
    web::HttpResponse::InternalServerError()
        .content_type(JSON_CONTENT_TYPE)
        .body(error_body("Failed to fetch posts"))
}

/// Body of `GET /posts`. Tags and categories cover the whole set, the post
/// list honours the query filters and paging.
fn render_post_list(set: &PostSet, query: &QueryString) -> serde_json::Result<String> {
    let page = set.filtered_and_paged(&query.to_filter(), query.get_page(), query.get_limit());
    let response = PostListResponse {
        posts: page.items,
        tags: set.all_tags(),
        categories: set.all_categories(),
        total: page.total,
    };
    serde_json::to_string(&response)
}

/// Serves `key` from the response cache or builds and stores it.
fn cached<F>(state: &AppState, key: &str, build: F) -> Option<Arc<String>>
where
    F: FnOnce() -> Option<String>,
{
    if let Some(body) = state.responses.get(key) {
        return Some(body);
    }
    let body = build()?;
    Some(state.responses.add(key, body, state.expire))
}

#[web::get("/posts")]
async fn list_posts(req: HttpRequest, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let query_str = req.uri().query().unwrap_or("");
    let key = format!("posts?{}", query_str);

    let body = cached(&state, &key, || {
        let query = QueryString::from(query_str);
        match render_post_list(&state.index.load(), &query) {
            Ok(body) => Some(body),
            Err(e) => {
                error!("Error fetching posts: {}", e);
                None
            }
        }
    });

    match body {
        Some(body) => json_ok(&body),
        None => internal_error(),
    }
}

#[web::get("/posts/{slug}")]
async fn get_post(slug: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let slug = slug.into_inner();
    let Some(post) = state.index.get_by_slug(&slug) else {
        return not_found();
    };

    match serde_json::to_string(&post) {
        Ok(body) => json_ok(&body),
        Err(e) => {
            error!("Error serializing post {}: {}", slug, e);
            internal_error()
        }
    }
}

#[web::get("/tags")]
async fn list_tags(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let body = cached(&state, "tags", || {
        match serde_json::to_string(&state.index.load().tag_counts()) {
            Ok(body) => Some(body),
            Err(e) => {
                error!("Error fetching tags: {}", e);
                None
            }
        }
    });

    match body {
        Some(body) => json_ok(&body),
        None => internal_error(),
    }
}

#[web::get("/feed.xml")]
async fn feed(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let set = state.index.load();
    let channel = RssChannel::from_site(&state.config.site);

    match channel.render(set.list_all(), Utc::now()) {
        Ok(xml) => web::HttpResponse::Ok()
            .content_type("text/xml; charset=utf-8")
            .header("Cache-Control", FEED_CACHE_CONTROL)
            .body(xml),
        Err(e) => {
            error!("Error rendering feed: {}", e);
            web::HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body("Failed to generate feed")
        }
    }
}

fn public_file(config: &Config, namespace: &str, file_name: String) -> Result<NamedFile, web::Error> {
    if file_name.contains("../") || file_name.contains("..\\") || file_name == ".." {
        return Err(web::error::ErrorUnauthorized("Access forbidden").into());
    }

    let file_path = config.paths.public_dir.join(namespace).join(file_name);
    Ok(NamedFile::open(file_path)?)
}

#[web::get("/images/{file_name}")]
async fn image_files(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> Result<NamedFile, web::Error> {
    public_file(&state.config, IMAGES_NAMESPACE, path.into_inner())
}

#[web::get("/assets/{file_name}")]
async fn asset_files(path: web::types::Path<String>, state: web::types::State<Arc<AppState>>) -> Result<NamedFile, web::Error> {
    public_file(&state.config, ASSETS_NAMESPACE, path.into_inner())
}

/// 0 disables the response cache, a negative value keeps entries forever.
fn response_cache(secs: i64) -> (ContentCache<String>, Expire) {
    match secs {
        0 => (ContentCache::non_caching(), Expire::Never),
        secs => (ContentCache::new(), Expire::from_secs(secs)),
    }
}

pub async fn server_run(config: Config, storage: StorageService) -> io::Result<()> {
    let index = ContentIndex::from_config(&config, storage);
    index.prepare()?;

    let (responses, expire) = response_cache(config.defaults.response_cache_secs);
    if responses.is_caching() {
        info!("Caching responses, expiry {:?}", expire);
    }

    let published = index.load();
    info!("Serving {} published posts from {}", published.len(), config.paths.content_dir.display());

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    let app_state = Arc::new(AppState {
        config,
        index,
        responses,
        expire,
    });

    info!("Starting server on {}:{}", bind_addr, bind_port);
    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .service(list_posts)
            .service(get_post)
            .service(list_tags)
            .service(feed)
            .service(image_files)
            .service(asset_files)
    })
        .bind((bind_addr, bind_port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use crate::content::{FileTimes, PostFrontmatter};

    use super::*;

    fn post(slug: &str, date: &str, tags: &[&str], categories: &[&str]) -> Post {
        let frontmatter = PostFrontmatter {
            title: slug.to_uppercase(),
            date: date.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            description: String::new(),
            author: String::new(),
            cover: None,
            draft: false,
        };
        let t = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Post::new(slug, frontmatter, format!("body of {}", slug), String::new(), String::new(), 1, FileTimes::new(&t, &t))
    }

    fn set() -> PostSet {
        PostSet::new(vec![
            post("a", "2024-01-01", &["rust"], &["dev"]),
            post("b", "2024-03-01", &["rust", "web"], &[]),
            post("c", "2024-02-01", &["life"], &[]),
        ])
    }

    #[test]
    fn test_post_list_unpaged() {
        let body = render_post_list(&set(), &QueryString::from("")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["total"], 3);
        let slugs: Vec<&str> = json["posts"].as_array().unwrap().iter()
            .map(|p| p["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["b", "c", "a"]);
        assert_eq!(json["tags"], serde_json::json!(["life", "rust", "web"]));
        assert_eq!(json["categories"], serde_json::json!(["dev"]));
    }

    #[test]
    fn test_post_list_filtered_and_paged() {
        let body = render_post_list(&set(), &QueryString::from("tag=rust&page=2&limit=1")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["total"], 2);
        assert_eq!(json["posts"].as_array().unwrap().len(), 1);
        assert_eq!(json["posts"][0]["slug"], "a");
        assert_eq!(json["tags"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_response_cache_settings() {
        let (cache, _) = response_cache(0);
        assert!(!cache.is_caching());

        let (cache, expire) = response_cache(-1);
        assert!(cache.is_caching());
        assert!(matches!(expire, Expire::Never));

        let (cache, expire) = response_cache(60);
        assert!(cache.is_caching());
        assert!(matches!(expire, Expire::After(d) if d == chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_error_body() {
        assert_eq!(error_body("Post not found"), r#"{"error":"Post not found"}"#);
    }
}
