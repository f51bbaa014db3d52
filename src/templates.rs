use actix_web::{http::header::CONTENT_TYPE, HttpResponse};
use dashmap::DashMap;
use notify::{event::{EventKind, ModifyKind}, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::{fs, io, path::{Path, PathBuf}, sync::Arc, time::Duration};

pub type TemplateCache = Arc<DashMap<String, String>>;

pub const TEMPLATE_FILES: &[&str] = &[
    "home.html",
    "about.html",
    "services.html",
    "academy.html",
    "blog.html",
    "contact.html",
    "login.html",
    "register.html",
    "forgot_password.html",
    "dashboard.html",
    "bookings.html",
    "settings.html",
    "admin.html",
    "admin_courses.html",
    "admin_services.html",
    "admin_bookings.html",
    "style.css",
];

/// Loads every page shell from `dir`. A missing file fails startup.
pub fn load_templates(dir: &str) -> io::Result<TemplateCache> {
    let cache: TemplateCache = Arc::new(DashMap::new());
    let base_path = PathBuf::from(dir);

    for filename in TEMPLATE_FILES {
        let path = base_path.join(filename);
        match fs::read_to_string(&path) {
            Ok(content) => {
                cache.insert(filename.to_string(), content);
                tracing::debug!("Loaded template: {}", path.display());
            }
            Err(e) => {
                tracing::error!("Failed to load template {}: {}", path.display(), e);
                return Err(io::Error::new(
                    e.kind(),
                    format!("Failed to load essential template: {}", path.display()),
                ));
            }
        }
    }
    tracing::info!("Loaded {} templates from {}", cache.len(), base_path.display());
    Ok(cache)
}

fn reload(cache: &TemplateCache, root: &Path, path: &Path) {
    if !path.starts_with(root) || !path.is_file() {
        return;
    }
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if !TEMPLATE_FILES.contains(&filename) {
        return;
    }
    match fs::read_to_string(path) {
        Ok(new_content) => {
            cache.insert(filename.to_string(), new_content);
            tracing::info!("Reloaded template: {}", path.display());
        }
        Err(e) => tracing::error!("Failed to reload template {}: {}", path.display(), e),
    }
}

/// Watches the template directory and refreshes changed files in the cache.
/// Runs for the life of the process in its own task.
pub async fn watch_templates(cache: TemplateCache, dir: String) -> notify::Result<()> {
    let template_path = std::env::current_dir()?.join(dir);
    let root = template_path.clone();

    let event_handler = move |res: DebounceEventResult| match res {
        Ok(events) => {
            for event in events {
                if matches!(event.kind, EventKind::Modify(ModifyKind::Data(_)) | EventKind::Create(_)) {
                    for path in &event.paths {
                        reload(&cache, &root, path);
                    }
                }
            }
        }
        Err(errors) => {
            for error in errors {
                tracing::error!("File watching error: {:?}", error);
            }
        }
    };

    let mut debouncer = new_debouncer(Duration::from_secs(1), None, event_handler)?;
    debouncer.watcher().watch(&template_path, RecursiveMode::Recursive)?;
    debouncer.cache().add_root(&template_path, RecursiveMode::Recursive);

    tracing::info!("Template watcher started for directory: {}", template_path.display());

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

pub fn get_template_content(cache: &TemplateCache, filename: &str) -> Result<String, HttpResponse> {
    match cache.get(filename) {
        Some(content) => Ok(content.value().clone()),
        None => {
            tracing::error!("Template not found in cache: {}", filename);
            Err(HttpResponse::NotFound().body(format!("Template {} not found", filename)))
        }
    }
}

/// Serves a cached page shell as HTML.
pub fn html_page(cache: &TemplateCache, filename: &str) -> HttpResponse {
    match get_template_content(cache, filename) {
        Ok(content) => HttpResponse::Ok()
            .insert_header((CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(content),
        Err(resp) => resp,
    }
}
