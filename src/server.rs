use actix_web::web;

/// Registers every page, API route and the catch-all redirect.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Pages
        .service(handlers::serve_css)
        .service(handlers::home_page)
        .service(handlers::about_page)
        .service(handlers::services_page)
        .service(handlers::academy_page)
        .service(handlers::blog_page)
        .service(handlers::contact_page)
        .service(handlers::login_page)
        .service(handlers::register_page)
        .service(handlers::forgot_password_page)
        .service(handlers::dashboard_page)
        .service(handlers::dashboard_bookings_page)
        .service(handlers::dashboard_settings_page)
        .service(handlers::admin_page)
        .service(handlers::admin_courses_page)
        .service(handlers::admin_services_page)
        .service(handlers::admin_bookings_page)
        .service(handlers::health)
        // Public API
        .service(handlers::list_courses)
        .service(handlers::list_services)
        .service(handlers::list_posts)
        .service(handlers::get_post)
        .service(handlers::contact_submit)
        // Member API
        .service(handlers::member_login)
        .service(handlers::member_register)
        .service(handlers::member_forgot_password)
        .service(handlers::member_logout)
        .service(handlers::member_dashboard)
        .service(handlers::member_bookings)
        .service(handlers::member_create_booking)
        .service(handlers::member_settings)
        .service(handlers::member_update_settings)
        // Admin API
        .service(handlers::admin_login)
        .service(handlers::admin_logout)
        .service(handlers::admin_stats)
        .service(handlers::admin_list_courses)
        .service(handlers::admin_create_course)
        .service(handlers::admin_update_course)
        .service(handlers::admin_delete_course)
        .service(handlers::admin_list_services)
        .service(handlers::admin_create_service)
        .service(handlers::admin_update_service)
        .service(handlers::admin_delete_service)
        .service(handlers::admin_list_posts)
        .service(handlers::admin_create_post)
        .service(handlers::admin_update_post)
        .service(handlers::admin_delete_post)
        .service(handlers::admin_list_bookings)
        .service(handlers::admin_start_booking)
        .service(handlers::admin_complete_booking)
        .default_service(web::to(handlers::fallback));
}

pub mod handlers {
    use actix_web::{delete, get, http::header::LOCATION, post, web, HttpRequest, HttpResponse};
    use email_address::EmailAddress;
    use std::sync::Arc;

    use crate::api::{
        AdminStatsResponse, BlogListResponse, BlogPostForm, BlogPostResponse, BookingListQuery,
        BookingListResponse, BookingResponse, ContactForm, CourseForm, CourseListResponse, CourseResponse,
        CreateBookingRequest, CreatedResponse, DashboardResponse, ForgotPasswordRequest, LoginRequest, LoginResponse,
        ProfileResponse, RegisterRequest, ServiceForm, ServiceListResponse, ServiceResponse, SetGenericResponse,
        UpdateSettingsRequest,
    };
    use crate::auth::{removal_cookie, session_cookie, LoggedAdmin, LoggedMember, ADMIN_COOKIE, MEMBER_COOKIE};
    use crate::bookings::{self, BookingWorkflow, StatusFilter};
    use crate::error::{AppError, Result as AppResult, TraceErr};
    use crate::members::{Member, Registration};
    use crate::state::StoreStateManager;
    use crate::templates::{get_template_content, html_page, TemplateCache};
    use crate::{catalog, contact, profiles};

    const MEMBER_SESSION_HOURS: i64 = 24;

    fn login_redirect(req: &HttpRequest) -> HttpResponse {
        let target = match req.uri().query() {
            Some(query) => format!("{}?{}", req.path(), query),
            None => req.path().to_string(),
        };
        HttpResponse::Found()
            .insert_header((LOCATION, format!("/login?next={}", urlencoding::encode(&target))))
            .finish()
    }

    /// Serves `filename` to a signed-in member, redirecting everyone else to the login page.
    async fn member_page(
        state: &StoreStateManager,
        member: Option<LoggedMember>,
        req: &HttpRequest,
        cache: &TemplateCache,
        filename: &str,
    ) -> AppResult<HttpResponse> {
        let Some(member) = member else {
            return Ok(login_redirect(req));
        };
        match member.validate(state).await {
            Ok(_) => Ok(html_page(cache, filename)),
            Err(AppError::Unauthorized(_)) => Ok(login_redirect(req)),
            Err(e) => Err(e),
        }
    }

    fn admin_page_for(
        state: &StoreStateManager,
        admin: Option<LoggedAdmin>,
        req: &HttpRequest,
        cache: &TemplateCache,
        filename: &str,
    ) -> HttpResponse {
        match admin.map(|a| a.validate(state)) {
            Some(Ok(_)) => html_page(cache, filename),
            _ => login_redirect(req),
        }
    }

    async fn member_context(state: &StoreStateManager, member: &LoggedMember) -> AppResult<(Member, crate::models::UserProfile)> {
        let member = member.validate(state).await?;
        let profile = profiles::ensure_profile(state.store(), &member).await?;
        Ok((member, profile))
    }

    fn workflow(state: &StoreStateManager) -> BookingWorkflow<'_> {
        BookingWorkflow::new(state.store(), state.display_timezone)
    }

    // --- Pages ---

    #[get("/style.css")]
    pub async fn serve_css(cache: web::Data<TemplateCache>) -> HttpResponse {
        match get_template_content(&cache, "style.css") {
            Ok(content) => HttpResponse::Ok().content_type("text/css").body(content),
            Err(resp) => resp,
        }
    }

    #[get("/")]
    pub async fn home_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "home.html")
    }

    #[get("/about")]
    pub async fn about_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "about.html")
    }

    #[get("/services")]
    pub async fn services_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "services.html")
    }

    #[get("/academy")]
    pub async fn academy_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "academy.html")
    }

    #[get("/blog")]
    pub async fn blog_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "blog.html")
    }

    #[get("/contact")]
    pub async fn contact_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "contact.html")
    }

    #[get("/login")]
    pub async fn login_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "login.html")
    }

    #[get("/register")]
    pub async fn register_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "register.html")
    }

    #[get("/forgot-password")]
    pub async fn forgot_password_page(cache: web::Data<TemplateCache>) -> HttpResponse {
        html_page(&cache, "forgot_password.html")
    }

    #[get("/dashboard")]
    pub async fn dashboard_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: Option<LoggedMember>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> AppResult<HttpResponse> {
        member_page(&state_manager, member, &req, &cache, "dashboard.html").await
    }

    #[get("/dashboard/bookings")]
    pub async fn dashboard_bookings_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: Option<LoggedMember>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> AppResult<HttpResponse> {
        member_page(&state_manager, member, &req, &cache, "bookings.html").await
    }

    #[get("/dashboard/settings")]
    pub async fn dashboard_settings_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: Option<LoggedMember>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> AppResult<HttpResponse> {
        member_page(&state_manager, member, &req, &cache, "settings.html").await
    }

    #[get("/admin")]
    pub async fn admin_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: Option<LoggedAdmin>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> HttpResponse {
        admin_page_for(&state_manager, admin, &req, &cache, "admin.html")
    }

    #[get("/admin/courses")]
    pub async fn admin_courses_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: Option<LoggedAdmin>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> HttpResponse {
        admin_page_for(&state_manager, admin, &req, &cache, "admin_courses.html")
    }

    #[get("/admin/services")]
    pub async fn admin_services_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: Option<LoggedAdmin>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> HttpResponse {
        admin_page_for(&state_manager, admin, &req, &cache, "admin_services.html")
    }

    #[get("/admin/bookings")]
    pub async fn admin_bookings_page(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: Option<LoggedAdmin>,
        req: HttpRequest,
        cache: web::Data<TemplateCache>,
    ) -> HttpResponse {
        admin_page_for(&state_manager, admin, &req, &cache, "admin_bookings.html")
    }

    #[get("/health")]
    pub async fn health() -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
    }

    /// Unknown paths go back to the home page.
    pub async fn fallback(req: HttpRequest) -> HttpResponse {
        tracing::debug!("No route for {} {}, redirecting home", req.method(), req.path());
        HttpResponse::Found().insert_header((LOCATION, "/")).finish()
    }

    // --- Public API ---

    #[get("/api/courses")]
    pub async fn list_courses(state_manager: web::Data<Arc<StoreStateManager>>) -> AppResult<HttpResponse> {
        let courses = catalog::published_courses(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(CourseListResponse { success: true, courses }))
    }

    #[get("/api/services")]
    pub async fn list_services(state_manager: web::Data<Arc<StoreStateManager>>) -> AppResult<HttpResponse> {
        let services = catalog::available_services(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(ServiceListResponse { success: true, services }))
    }

    #[get("/api/blog")]
    pub async fn list_posts(state_manager: web::Data<Arc<StoreStateManager>>) -> AppResult<HttpResponse> {
        let posts = catalog::published_posts(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(BlogListResponse { success: true, posts }))
    }

    #[get("/api/blog/{slug}")]
    pub async fn get_post(
        state_manager: web::Data<Arc<StoreStateManager>>,
        slug: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        let post = catalog::post_by_slug(state_manager.store(), &slug).await?;
        Ok(HttpResponse::Ok().json(BlogPostResponse { success: true, post }))
    }

    #[post("/api/contact")]
    pub async fn contact_submit(
        state_manager: web::Data<Arc<StoreStateManager>>,
        form: web::Json<ContactForm>,
    ) -> AppResult<HttpResponse> {
        tracing::info!("Received contact form submission from {}", form.email);
        contact::submit(state_manager.store(), state_manager.smtp.as_ref(), &form)
            .await
            .trace_err("contact_submit")?;
        Ok(HttpResponse::Ok().json(SetGenericResponse::ok()))
    }

    // --- Member API ---

    #[post("/api/member/login")]
    pub async fn member_login(
        state_manager: web::Data<Arc<StoreStateManager>>,
        request: web::Json<LoginRequest>,
    ) -> AppResult<HttpResponse> {
        let session = match state_manager.members.login(&request.email, &request.password).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Member login failed for {}: {}", request.email, e);
                return Err(e);
            }
        };
        profiles::ensure_profile(state_manager.store(), &session.member).await?;

        Ok(HttpResponse::Ok()
            .cookie(session_cookie(MEMBER_COOKIE, session.token.clone(), MEMBER_SESSION_HOURS))
            .json(LoginResponse {
                success: true,
                error_message: None,
                token: Some(session.token),
            }))
    }

    #[post("/api/member/register")]
    pub async fn member_register(
        state_manager: web::Data<Arc<StoreStateManager>>,
        request: web::Json<RegisterRequest>,
    ) -> AppResult<HttpResponse> {
        let request = request.into_inner();
        if !EmailAddress::is_valid(request.email.trim()) {
            return Err(AppError::BadRequest("A valid email is required".to_string()));
        }
        if request.password.is_empty() {
            return Err(AppError::BadRequest("Password is required".to_string()));
        }

        let member = state_manager
            .members
            .register(Registration {
                email: request.email.trim().to_string(),
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                phone: request.phone,
            })
            .await
            .trace_err("member_register")?;
        profiles::ensure_profile(state_manager.store(), &member).await?;
        tracing::info!("Registered member {}", member.id);

        Ok(HttpResponse::Ok().json(CreatedResponse { success: true, id: member.id }))
    }

    #[post("/api/member/forgot_password")]
    pub async fn member_forgot_password(
        state_manager: web::Data<Arc<StoreStateManager>>,
        request: web::Json<ForgotPasswordRequest>,
    ) -> AppResult<HttpResponse> {
        if !EmailAddress::is_valid(request.email.trim()) {
            return Err(AppError::BadRequest("A valid email is required".to_string()));
        }
        state_manager.members.request_password_reset(request.email.trim()).await?;
        Ok(HttpResponse::Ok().json(SetGenericResponse::ok()))
    }

    #[post("/api/member/logout")]
    pub async fn member_logout(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
    ) -> AppResult<HttpResponse> {
        state_manager.members.logout(&member.token).await?;
        Ok(HttpResponse::Ok()
            .cookie(removal_cookie(MEMBER_COOKIE))
            .json(SetGenericResponse::ok()))
    }

    #[get("/api/member/dashboard")]
    pub async fn member_dashboard(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
    ) -> AppResult<HttpResponse> {
        let (_, profile) = member_context(&state_manager, &member).await?;
        let store = state_manager.store();
        let flow = workflow(&state_manager);
        let user_id = profile.user_id.clone().unwrap_or_default();

        let (courses, services, bookings) = futures::try_join!(
            catalog::published_courses(store),
            catalog::available_services(store),
            flow.list_for_user(&user_id),
        )?;
        let tz = state_manager.display_timezone;

        Ok(HttpResponse::Ok().json(DashboardResponse {
            success: true,
            profile,
            courses,
            services,
            bookings: bookings.into_iter().map(|b| bookings::view(b, tz)).collect(),
        }))
    }

    #[get("/api/member/bookings")]
    pub async fn member_bookings(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
    ) -> AppResult<HttpResponse> {
        let (_, profile) = member_context(&state_manager, &member).await?;
        let user_id = profile.user_id.unwrap_or_default();
        let tz = state_manager.display_timezone;

        let bookings = workflow(&state_manager).list_for_user(&user_id).await?;
        Ok(HttpResponse::Ok().json(BookingListResponse {
            success: true,
            bookings: bookings.into_iter().map(|b| bookings::view(b, tz)).collect(),
        }))
    }

    #[post("/api/member/bookings")]
    pub async fn member_create_booking(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
        request: web::Json<CreateBookingRequest>,
    ) -> AppResult<HttpResponse> {
        let (_, profile) = member_context(&state_manager, &member).await?;
        let booking = workflow(&state_manager).request(&profile, &request).await?;
        Ok(HttpResponse::Ok().json(BookingResponse {
            success: true,
            booking: bookings::view(booking, state_manager.display_timezone),
        }))
    }

    #[get("/api/member/settings")]
    pub async fn member_settings(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
    ) -> AppResult<HttpResponse> {
        let (_, profile) = member_context(&state_manager, &member).await?;
        Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
    }

    #[post("/api/member/settings")]
    pub async fn member_update_settings(
        state_manager: web::Data<Arc<StoreStateManager>>,
        member: LoggedMember,
        request: web::Json<UpdateSettingsRequest>,
    ) -> AppResult<HttpResponse> {
        let member = member.validate(&state_manager).await?;
        let profile = profiles::update_settings(state_manager.store(), &member, &request)
            .await
            .trace_err("member_update_settings")?;
        Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
    }

    // --- Admin API ---

    #[post("/api/admin/login")]
    pub async fn admin_login(
        state_manager: web::Data<Arc<StoreStateManager>>,
        request: web::Json<LoginRequest>,
    ) -> AppResult<HttpResponse> {
        let (identity, token) = match state_manager.authenticate_admin(&request.email, &request.password).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Admin login failed for {}: {}", request.email, e);
                return Err(e);
            }
        };
        tracing::info!("Admin {} signed in", identity.email);

        Ok(HttpResponse::Ok()
            .cookie(session_cookie(ADMIN_COOKIE, token.clone(), state_manager.admin_session_hours()))
            .json(LoginResponse {
                success: true,
                error_message: None,
                token: Some(token),
            }))
    }

    #[post("/api/admin/logout")]
    pub async fn admin_logout(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
    ) -> AppResult<HttpResponse> {
        let identity = admin.validate(&state_manager)?;
        state_manager.invalidate_admin_session(&admin.token);
        tracing::info!("Admin {} signed out", identity.email);
        Ok(HttpResponse::Ok()
            .cookie(removal_cookie(ADMIN_COOKIE))
            .json(SetGenericResponse::ok()))
    }

    #[get("/api/admin/stats")]
    pub async fn admin_stats(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let stats = workflow(&state_manager).stats().await?;
        Ok(HttpResponse::Ok().json(AdminStatsResponse { success: true, stats }))
    }

    #[get("/api/admin/courses")]
    pub async fn admin_list_courses(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let courses = catalog::all_courses(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(CourseListResponse { success: true, courses }))
    }

    #[post("/api/admin/courses")]
    pub async fn admin_create_course(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        form: web::Json<CourseForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let course = catalog::create_course(state_manager.store(), &form).await?;
        Ok(HttpResponse::Ok().json(CreatedResponse { success: true, id: course.id }))
    }

    #[post("/api/admin/courses/{id}")]
    pub async fn admin_update_course(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
        form: web::Json<CourseForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let course = catalog::update_course(state_manager.store(), &id, &form).await?;
        Ok(HttpResponse::Ok().json(CourseResponse { success: true, course }))
    }

    #[delete("/api/admin/courses/{id}")]
    pub async fn admin_delete_course(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        catalog::delete_course(state_manager.store(), &id).await?;
        Ok(HttpResponse::Ok().json(SetGenericResponse::ok()))
    }

    #[get("/api/admin/services")]
    pub async fn admin_list_services(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let services = catalog::all_services(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(ServiceListResponse { success: true, services }))
    }

    #[post("/api/admin/services")]
    pub async fn admin_create_service(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        form: web::Json<ServiceForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let service = catalog::create_service(state_manager.store(), &form).await?;
        Ok(HttpResponse::Ok().json(CreatedResponse { success: true, id: service.id }))
    }

    #[post("/api/admin/services/{id}")]
    pub async fn admin_update_service(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
        form: web::Json<ServiceForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let service = catalog::update_service(state_manager.store(), &id, &form).await?;
        Ok(HttpResponse::Ok().json(ServiceResponse { success: true, service }))
    }

    #[delete("/api/admin/services/{id}")]
    pub async fn admin_delete_service(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        catalog::delete_service(state_manager.store(), &id).await?;
        Ok(HttpResponse::Ok().json(SetGenericResponse::ok()))
    }

    #[get("/api/admin/blog")]
    pub async fn admin_list_posts(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let posts = catalog::all_posts(state_manager.store()).await?;
        Ok(HttpResponse::Ok().json(BlogListResponse { success: true, posts }))
    }

    #[post("/api/admin/blog")]
    pub async fn admin_create_post(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        form: web::Json<BlogPostForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let post = catalog::create_post(state_manager.store(), &form).await?;
        Ok(HttpResponse::Ok().json(CreatedResponse { success: true, id: post.id }))
    }

    #[post("/api/admin/blog/{id}")]
    pub async fn admin_update_post(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
        form: web::Json<BlogPostForm>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let post = catalog::update_post(state_manager.store(), &id, &form).await?;
        Ok(HttpResponse::Ok().json(BlogPostResponse { success: true, post }))
    }

    #[delete("/api/admin/blog/{id}")]
    pub async fn admin_delete_post(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        catalog::delete_post(state_manager.store(), &id).await?;
        Ok(HttpResponse::Ok().json(SetGenericResponse::ok()))
    }

    #[get("/api/admin/bookings")]
    pub async fn admin_list_bookings(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        query: web::Query<BookingListQuery>,
    ) -> AppResult<HttpResponse> {
        admin.validate(&state_manager)?;
        let filter = StatusFilter::parse(query.status.as_deref())?;
        let tz = state_manager.display_timezone;

        let bookings = workflow(&state_manager).list_for_admin(&filter).await?;
        Ok(HttpResponse::Ok().json(BookingListResponse {
            success: true,
            bookings: bookings.into_iter().map(|b| bookings::view(b, tz)).collect(),
        }))
    }

    #[post("/api/admin/bookings/{id}/start")]
    pub async fn admin_start_booking(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        let identity = admin.validate(&state_manager)?;
        let booking = workflow(&state_manager).start(&id, &identity).await?;
        Ok(HttpResponse::Ok().json(BookingResponse {
            success: true,
            booking: bookings::view(booking, state_manager.display_timezone),
        }))
    }

    #[post("/api/admin/bookings/{id}/complete")]
    pub async fn admin_complete_booking(
        state_manager: web::Data<Arc<StoreStateManager>>,
        admin: LoggedAdmin,
        id: web::Path<String>,
    ) -> AppResult<HttpResponse> {
        let identity = admin.validate(&state_manager)?;
        let booking = workflow(&state_manager).complete(&id, &identity).await?;
        Ok(HttpResponse::Ok().json(BookingResponse {
            success: true,
            booking: bookings::view(booking, state_manager.display_timezone),
        }))
    }
}
