use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::api::{BlogPostForm, CourseForm, ServiceForm};
use crate::error::{AppError, Result};
use crate::models::{BlogPost, Course, Entity, Service};
use crate::store::{self, to_record, EntityStore, ID_FIELD};

/// Lowercase letters, digits and single hyphens.
static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern is valid")
});

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

pub async fn published_courses(store: &dyn EntityStore) -> Result<Vec<Course>> {
    Ok(store::fetch_all::<Course>(store)
        .await?
        .into_iter()
        .filter(|c| c.is_published == Some(true))
        .collect())
}

pub async fn available_services(store: &dyn EntityStore) -> Result<Vec<Service>> {
    Ok(store::fetch_all::<Service>(store)
        .await?
        .into_iter()
        .filter(|s| s.is_available == Some(true))
        .collect())
}

pub async fn published_posts(store: &dyn EntityStore) -> Result<Vec<BlogPost>> {
    let mut posts: Vec<BlogPost> = store::fetch_all::<BlogPost>(store)
        .await?
        .into_iter()
        .filter(|p| p.is_published == Some(true))
        .collect();
    posts.sort_by_key(|p| Reverse(p.publication_date));
    Ok(posts)
}

pub async fn post_by_slug(store: &dyn EntityStore, slug: &str) -> Result<BlogPost> {
    if !is_valid_slug(slug) {
        return Err(AppError::BadRequest("Invalid slug".to_string()));
    }
    published_posts(store)
        .await?
        .into_iter()
        .find(|p| p.slug.as_deref() == Some(slug))
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", slug)))
}

fn require(field: &Option<String>, name: &str) -> Result<()> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(()),
        _ => Err(AppError::BadRequest(format!("{} is required", name))),
    }
}

fn check_price(price: Option<f64>) -> Result<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(AppError::BadRequest("Price must be a non-negative number".to_string())),
        _ => Ok(()),
    }
}

async fn create_from_form<T: Entity, F: Serialize>(store: &dyn EntityStore, form: &F) -> Result<T> {
    let mut record = to_record(form)?;
    record.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
    let created = store.create(T::COLLECTION, record).await?;
    tracing::info!("Created {} {}", T::COLLECTION, created.get(ID_FIELD).and_then(|v| v.as_str()).unwrap_or_default());
    store::from_record(created)
}

async fn update_from_form<T: Entity, F: Serialize>(store: &dyn EntityStore, id: &str, form: &F) -> Result<T> {
    let fields = to_record(form)?;
    if fields.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    store::patch::<T>(store, id, fields).await
}

pub async fn all_courses(store: &dyn EntityStore) -> Result<Vec<Course>> {
    store::fetch_all::<Course>(store).await
}

pub async fn create_course(store: &dyn EntityStore, form: &CourseForm) -> Result<Course> {
    require(&form.course_name, "courseName")?;
    check_price(form.price)?;
    let form = CourseForm {
        is_published: Some(form.is_published.unwrap_or(false)),
        price: Some(form.price.unwrap_or(0.0)),
        ..form.clone()
    };
    create_from_form(store, &form).await
}

pub async fn update_course(store: &dyn EntityStore, id: &str, form: &CourseForm) -> Result<Course> {
    check_price(form.price)?;
    update_from_form(store, id, form).await
}

pub async fn delete_course(store: &dyn EntityStore, id: &str) -> Result<()> {
    store::remove::<Course>(store, id).await
}

pub async fn all_services(store: &dyn EntityStore) -> Result<Vec<Service>> {
    store::fetch_all::<Service>(store).await
}

pub async fn create_service(store: &dyn EntityStore, form: &ServiceForm) -> Result<Service> {
    require(&form.service_name, "serviceName")?;
    check_price(form.price)?;
    let form = ServiceForm {
        is_available: Some(form.is_available.unwrap_or(false)),
        price: Some(form.price.unwrap_or(0.0)),
        ..form.clone()
    };
    create_from_form(store, &form).await
}

pub async fn update_service(store: &dyn EntityStore, id: &str, form: &ServiceForm) -> Result<Service> {
    check_price(form.price)?;
    update_from_form(store, id, form).await
}

pub async fn delete_service(store: &dyn EntityStore, id: &str) -> Result<()> {
    store::remove::<Service>(store, id).await
}

pub async fn all_posts(store: &dyn EntityStore) -> Result<Vec<BlogPost>> {
    store::fetch_all::<BlogPost>(store).await
}

fn clean_post_form(form: &BlogPostForm) -> Result<BlogPostForm> {
    if let Some(slug) = &form.slug {
        if !is_valid_slug(slug) {
            return Err(AppError::BadRequest("Invalid slug".to_string()));
        }
    }
    Ok(BlogPostForm {
        content: form.content.as_deref().map(sanitize_html),
        ..form.clone()
    })
}

pub async fn create_post(store: &dyn EntityStore, form: &BlogPostForm) -> Result<BlogPost> {
    require(&form.title, "title")?;
    require(&form.slug, "slug")?;
    let mut form = clean_post_form(form)?;
    form.is_published = Some(form.is_published.unwrap_or(false));
    if form.publication_date.is_none() {
        form.publication_date = Some(Utc::now());
    }

    let mut record = to_record(&form)?;
    record.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
    let created = store.create_unique(BlogPost::COLLECTION, "slug", record).await?;
    if !created.inserted {
        return Err(AppError::Conflict("A post with this slug already exists".to_string()));
    }
    store::from_record(created.record)
}

pub async fn update_post(store: &dyn EntityStore, id: &str, form: &BlogPostForm) -> Result<BlogPost> {
    let form = clean_post_form(form)?;
    if form.slug.is_none() {
        return update_from_form(store, id, &form).await;
    }

    let mut fields = to_record(&form)?;
    fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    let updated = store
        .update_unique(BlogPost::COLLECTION, "slug", fields)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict("A post with this slug already exists".to_string()),
            other => other,
        })?;
    store::from_record(updated)
}

pub async fn delete_post(store: &dyn EntityStore, id: &str) -> Result<()> {
    store::remove::<BlogPost>(store, id).await
}

/// Starter posts for an empty site. Any existing post, including one an admin
/// deleted and replaced, leaves the collection alone.
pub async fn seed_blog_posts(store: &dyn EntityStore) -> Result<usize> {
    if !store.get_all(BlogPost::COLLECTION).await?.is_empty() {
        tracing::debug!("Blog already has posts, skipping seed");
        return Ok(0);
    }

    let now = Utc::now();
    let posts = [
        (
            "The Future of AI in Education",
            "Zain Admin",
            now,
            "Artificial Intelligence is reshaping how we learn and teach. From personalized learning paths to automated grading...",
            "https://static.wixstatic.com/media/9e0878_c7f4d149e322450fb044673a43eca177~mv2.png",
            "future-of-ai",
        ),
        (
            "Why Cybersecurity Matters",
            "Security Team",
            now - Duration::days(1),
            "In an era of increasing digital threats, securing your infrastructure is not just an option, it is a necessity...",
            "https://static.wixstatic.com/media/9e0878_8e438bd835f24dfd9247e6d2b1ad4fd8~mv2.png",
            "cybersecurity-matters",
        ),
        (
            "Top Web Dev Frameworks 2025",
            "Dev Team",
            now - Duration::days(2),
            "A comprehensive look at the most popular frameworks defining the modern web, from Astro to React 19...",
            "https://static.wixstatic.com/media/9e0878_951163f626434b1e8fb2fab421df5b17~mv2.png",
            "web-dev-frameworks",
        ),
    ];

    let mut inserted = 0;
    for (title, author, published, content, thumbnail, slug) in posts {
        let post = BlogPost {
            id: Uuid::new_v4().to_string(),
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            author: Some(author.to_string()),
            publication_date: Some(published),
            thumbnail_image: Some(thumbnail.to_string()),
            slug: Some(slug.to_string()),
            is_published: Some(true),
            ..Default::default()
        };
        if store.create_unique(BlogPost::COLLECTION, "slug", to_record(&post)?).await?.inserted {
            inserted += 1;
        }
    }
    if inserted > 0 {
        tracing::info!("Seeded {} blog posts", inserted);
    }
    Ok(inserted)
}
