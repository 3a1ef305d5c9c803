#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use vecino_engines::directory::parse_page_number;
use vecino_kernel_contracts::forum::{CategoryFilter, PostId};
use vecino_kernel_contracts::provider::RegionId;

use crate::dto::{
    AdjustmentRequest, BenefitDto, BenefitRequest, BenefitsResponse, CategoryDto,
    CategoryRequest, CommentRequest, ComunaDto, ComunaRequest, ContactListQuery,
    ContactRequestDto, ContactRequestRequest, ContactResponseRequest, CountryRequest,
    DashboardResponse, DirectoryParams, DirectoryResponse, FeedResponse, HealthResponse,
    LoginRequest, MeResponse, PanelProfileResponse, PostDetailResponse, PostDto, PostRequest,
    ProductDto, ProductListQuery, ProductRequest, ProfilePatchRequest, ProgressResponse,
    PromotionDto, PromotionListQuery, PromotionRequest, ProviderProfileRequest,
    ProviderSettingsRequest, ProviderStatusRequest, RegionDto, RegionRequest, RegisterRequest,
    TierRow, TiersResponse,
};
use crate::error::AdapterError;
use crate::journal::JournalCommand;
use crate::{signed_in, Actor, AdapterRuntime};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const OPERATOR_HEADER: &str = "x-operator-token";

type Shared = State<Arc<AdapterRuntime>>;
type Reply = Result<(StatusCode, Json<Value>), AdapterError>;

pub fn router(runtime: Arc<AdapterRuntime>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/loyalty/tiers", get(tiers))
        .route("/v1/loyalty/progress", get(progress))
        .route("/v1/loyalty/adjustments", post(adjust_points))
        .route("/v1/merchants/register", post(register))
        .route("/v1/sessions", post(login).delete(logout))
        .route("/v1/me", get(me).patch(update_me))
        .route("/v1/me/contact-requests", get(incoming_contact_requests))
        .route("/v1/me/contact-requests/:id/respond", post(respond_contact_request))
        .route("/v1/forum/posts", get(feed).post(publish_post))
        .route("/v1/forum/posts/:id", get(post_detail))
        .route("/v1/forum/posts/:id/comments", post(add_comment))
        .route("/v1/forum/posts/:id/like", post(toggle_like))
        .route("/v1/benefits", get(benefits).post(create_benefit))
        .route("/v1/benefits/:id/redeem", post(redeem_benefit))
        .route("/v1/directory", get(directory))
        .route("/v1/directory/:id", get(provider_detail))
        .route("/v1/provider-categories", get(provider_categories))
        .route("/v1/geo/regions", get(regions))
        .route("/v1/geo/regions/:id/comunas", get(comunas))
        .route(
            "/v1/panel/profile",
            get(panel_profile)
                .post(create_provider_profile)
                .put(update_provider_profile),
        )
        .route("/v1/panel/settings", put(update_provider_settings))
        .route("/v1/panel/dashboard", get(dashboard))
        .route("/v1/panel/products", get(list_products).post(create_product))
        .route(
            "/v1/panel/products/:id",
            put(update_product).delete(delete_product),
        )
        .route("/v1/panel/products/:id/featured", post(toggle_product_featured))
        .route(
            "/v1/panel/promotions",
            get(list_promotions).post(create_promotion),
        )
        .route(
            "/v1/panel/promotions/:id",
            put(update_promotion).delete(delete_promotion),
        )
        .route(
            "/v1/panel/contact-requests",
            get(list_contact_requests).post(send_contact_request),
        )
        .route(
            "/v1/panel/contact-requests/:id/cancel",
            post(cancel_contact_request),
        )
        .route("/v1/admin/geo/countries", post(add_country))
        .route("/v1/admin/geo/regions", post(add_region))
        .route("/v1/admin/geo/comunas", post(add_comuna))
        .route("/v1/admin/provider-categories", post(add_provider_category))
        .route("/v1/admin/providers/:id/status", put(set_provider_status))
        .with_state(runtime)
}

// ------------------------
// Request plumbing.
// ------------------------

fn tenant(headers: &HeaderMap) -> Result<String, AdapterError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AdapterError::MissingTenant)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn actor(headers: &HeaderMap) -> Actor {
    bearer(headers).map(Actor::Session).unwrap_or(Actor::Anonymous)
}

fn operator(runtime: &AdapterRuntime, headers: &HeaderMap) -> Result<Actor, AdapterError> {
    let presented = headers.get(OPERATOR_HEADER).and_then(|v| v.to_str().ok());
    if runtime.is_operator(presented) {
        Ok(Actor::Operator)
    } else {
        Err(AdapterError::OperatorOnly)
    }
}

fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AdapterError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| AdapterError::BadRequest(rejection.body_text()))
}

fn query<T: DeserializeOwned>(params: Result<Query<T>, QueryRejection>) -> Result<T, AdapterError> {
    params
        .map(|Query(v)| v)
        .map_err(|rejection| AdapterError::BadRequest(rejection.body_text()))
}

fn id(path: Result<Path<u64>, PathRejection>) -> Result<u64, AdapterError> {
    path.map(|Path(v)| v)
        .map_err(|_| AdapterError::BadRequest("path id must be a positive integer".to_string()))
}

fn ok<T: serde::Serialize>(value: T) -> Reply {
    let value = serde_json::to_value(value).map_err(|err| AdapterError::Encode(err.to_string()))?;
    Ok((StatusCode::OK, Json(value)))
}

fn created(value: Value) -> Reply {
    Ok((StatusCode::CREATED, Json(value)))
}

fn run(
    runtime: &AdapterRuntime,
    headers: &HeaderMap,
    command: JournalCommand,
) -> Result<Value, AdapterError> {
    runtime.execute(&tenant(headers)?, &actor(headers), command)
}

fn run_as_operator(
    runtime: &AdapterRuntime,
    headers: &HeaderMap,
    command: JournalCommand,
) -> Result<Value, AdapterError> {
    let operator = operator(runtime, headers)?;
    runtime.execute(&tenant(headers)?, &operator, command)
}

// ------------------------
// Health and loyalty.
// ------------------------

async fn healthz(State(runtime): Shared) -> Reply {
    ok(HealthResponse {
        status: "ok",
        journal_enabled: runtime.journal_enabled(),
        replayed_entries: runtime.replayed_entries(),
    })
}

async fn tiers(State(runtime): Shared) -> Reply {
    let loyalty = runtime.os().loyalty.runtime();
    ok(TiersResponse {
        band_width: loyalty.config().band_width,
        tiers: loyalty
            .table()
            .bands()
            .iter()
            .map(|band| TierRow {
                code: band.code,
                name: band.code.display_name(),
                floor: band.floor,
            })
            .collect(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ProgressParams {
    points: Option<String>,
}

/// Missing means zero; negative or non-numeric values are rejected.
fn parse_points(raw: Option<&str>) -> Result<u64, AdapterError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(0);
    };
    let value: i128 = raw
        .parse()
        .map_err(|_| AdapterError::BadRequest("points must be an integer".to_string()))?;
    if value < 0 {
        return Err(AdapterError::BadRequest("points must not be negative".to_string()));
    }
    u64::try_from(value).map_err(|_| AdapterError::BadRequest("points out of range".to_string()))
}

async fn progress(
    State(runtime): Shared,
    params: Result<Query<ProgressParams>, QueryRejection>,
) -> Reply {
    let params = query(params)?;
    let points = parse_points(params.points.as_deref())?;
    ok(ProgressResponse::from(
        runtime.os().loyalty.runtime().progress(points),
    ))
}

async fn adjust_points(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<AdjustmentRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    ok(run_as_operator(&runtime, &headers, JournalCommand::AdjustPoints { body })?)
}

// ------------------------
// Accounts.
// ------------------------

async fn register(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Reply {
    let request = body(payload)?;
    created(runtime.register(&tenant(&headers)?, request)?)
}

async fn login(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Reply {
    let request = body(payload)?;
    let session = runtime.login(&tenant(&headers)?, &request)?;
    let value = serde_json::to_value(session).map_err(|err| AdapterError::Encode(err.to_string()))?;
    created(value)
}

async fn logout(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let token = bearer(&headers).ok_or(AdapterError::Os(vecino_os::OsError::Unauthorized))?;
    runtime.logout(&tenant(&headers)?, &token)?;
    ok(json!({ "logged_out": true }))
}

async fn me(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let profile = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os.account.merchant_profile(store, signed_in(ctx)?)?)
    })?;
    ok(MeResponse::from(profile))
}

async fn update_me(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ProfilePatchRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    ok(run(&runtime, &headers, JournalCommand::UpdateProfile { body })?)
}

// ------------------------
// Forum.
// ------------------------

#[derive(Debug, Default, Deserialize)]
struct FeedParams {
    categoria: Option<String>,
}

async fn feed(
    State(runtime): Shared,
    headers: HeaderMap,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> Reply {
    let params = query(params)?;
    let raw = params.categoria.unwrap_or_default();
    let filter = CategoryFilter::parse(raw.split(','))?;
    let posts = runtime.read(&tenant(&headers)?, &Actor::Anonymous, |os, store, tenant_id, _| {
        Ok(os.forum.feed(store, tenant_id, &filter))
    })?;
    ok(FeedResponse {
        categories: filter.selected_codes(),
        posts: posts.into_iter().map(PostDto::from).collect(),
    })
}

async fn publish_post(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::PublishPost { body })?)
}

async fn post_detail(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let post_id = PostId(id(path)?);
    let detail = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, tenant_id, ctx| {
        Ok(os
            .forum
            .post_detail(store, tenant_id, post_id, ctx.map(|c| c.merchant_id))?)
    })?;
    ok(PostDetailResponse::from(detail))
}

async fn add_comment(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Reply {
    let post_id = id(path)?;
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::AddComment { post_id, body })?)
}

async fn toggle_like(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let post_id = id(path)?;
    ok(run(&runtime, &headers, JournalCommand::ToggleLike { post_id })?)
}

// ------------------------
// Benefits.
// ------------------------

async fn benefits(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let overview = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os.benefits.benefits_overview(store, signed_in(ctx)?)?)
    })?;
    ok(BenefitsResponse {
        loyalty: overview.progress.into(),
        benefits: overview.benefits.into_iter().map(BenefitDto::from).collect(),
    })
}

async fn create_benefit(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<BenefitRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run_as_operator(&runtime, &headers, JournalCommand::CreateBenefit { body })?)
}

async fn redeem_benefit(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let benefit_id = id(path)?;
    created(run(&runtime, &headers, JournalCommand::RedeemBenefit { benefit_id })?)
}

// ------------------------
// Directory and reference data.
// ------------------------

async fn directory(
    State(runtime): Shared,
    headers: HeaderMap,
    params: Result<Query<DirectoryParams>, QueryRejection>,
) -> Reply {
    let params = query(params)?;
    let directory_query = params.to_query()?;
    let page = parse_page_number(params.page.as_deref());
    let result = runtime.read(&tenant(&headers)?, &Actor::Anonymous, |os, store, tenant_id, _| {
        Ok(os
            .directory
            .directory_page(store, tenant_id, &directory_query, page))
    })?;
    ok(DirectoryResponse {
        providers: result.providers.into_iter().map(Into::into).collect(),
        page: result.page,
    })
}

/// Counts a visit, so it goes through the journal like any other write.
async fn provider_detail(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let provider_id = id(path)?;
    ok(runtime.execute(
        &tenant(&headers)?,
        &Actor::Anonymous,
        JournalCommand::VisitProvider { provider_id },
    )?)
}

async fn provider_categories(State(runtime): Shared) -> Reply {
    let categories = runtime.read_catalog(|os, store| Ok(os.directory.active_categories(store)))?;
    ok(categories.into_iter().map(CategoryDto::from).collect::<Vec<_>>())
}

async fn regions(State(runtime): Shared) -> Reply {
    let regions = runtime.read_catalog(|_, store| {
        Ok(store.regions().into_iter().map(RegionDto::from).collect::<Vec<_>>())
    })?;
    ok(regions)
}

async fn comunas(State(runtime): Shared, path: Result<Path<u64>, PathRejection>) -> Reply {
    let region_id = RegionId(id(path)?);
    let comunas =
        runtime.read_catalog(|os, store| Ok(os.directory.comunas_for_region(store, region_id)?))?;
    ok(comunas.into_iter().map(ComunaDto::from).collect::<Vec<_>>())
}

// ------------------------
// Provider panel.
// ------------------------

async fn panel_profile(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let response = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        let provider = os.panel.my_provider(store, signed_in(ctx)?)?;
        Ok(PanelProfileResponse {
            provider: provider.into(),
            settings: (&provider.settings).into(),
        })
    })?;
    ok(response)
}

async fn create_provider_profile(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ProviderProfileRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::CreateProviderProfile { body })?)
}

async fn update_provider_profile(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ProviderProfileRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    ok(run(&runtime, &headers, JournalCommand::UpdateProviderProfile { body })?)
}

async fn update_provider_settings(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ProviderSettingsRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    ok(run(&runtime, &headers, JournalCommand::UpdateProviderSettings { body })?)
}

async fn dashboard(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let today = chrono::Utc::now().date_naive();
    let dashboard = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os.panel.provider_dashboard(store, signed_in(ctx)?, today)?)
    })?;
    ok(DashboardResponse::from(dashboard))
}

async fn list_products(
    State(runtime): Shared,
    headers: HeaderMap,
    params: Result<Query<ProductListQuery>, QueryRejection>,
) -> Reply {
    let filter = query(params)?.to_filter()?;
    let products = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os.panel.list_products(store, signed_in(ctx)?, &filter)?)
    })?;
    ok(products.into_iter().map(ProductDto::from).collect::<Vec<_>>())
}

async fn create_product(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::CreateProduct { body })?)
}

async fn update_product(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ProductRequest>, JsonRejection>,
) -> Reply {
    let product_id = id(path)?;
    let body = body(payload)?;
    ok(run(&runtime, &headers, JournalCommand::UpdateProduct { product_id, body })?)
}

async fn delete_product(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let product_id = id(path)?;
    ok(run(&runtime, &headers, JournalCommand::DeleteProduct { product_id })?)
}

async fn toggle_product_featured(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let product_id = id(path)?;
    ok(run(
        &runtime,
        &headers,
        JournalCommand::ToggleProductFeatured { product_id },
    )?)
}

async fn list_promotions(
    State(runtime): Shared,
    headers: HeaderMap,
    params: Result<Query<PromotionListQuery>, QueryRejection>,
) -> Reply {
    let filter = query(params)?.to_filter()?;
    let today = chrono::Utc::now().date_naive();
    let promotions = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os
            .panel
            .list_promotions(store, signed_in(ctx)?, &filter, today)?)
    })?;
    ok(promotions.into_iter().map(PromotionDto::from).collect::<Vec<_>>())
}

async fn create_promotion(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<PromotionRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::CreatePromotion { body })?)
}

async fn update_promotion(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<PromotionRequest>, JsonRejection>,
) -> Reply {
    let promotion_id = id(path)?;
    let body = body(payload)?;
    ok(run(
        &runtime,
        &headers,
        JournalCommand::UpdatePromotion { promotion_id, body },
    )?)
}

async fn delete_promotion(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let promotion_id = id(path)?;
    ok(run(&runtime, &headers, JournalCommand::DeletePromotion { promotion_id })?)
}

async fn list_contact_requests(
    State(runtime): Shared,
    headers: HeaderMap,
    params: Result<Query<ContactListQuery>, QueryRejection>,
) -> Reply {
    let status = query(params)?.to_status()?;
    let requests = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os
            .panel
            .list_contact_requests(store, signed_in(ctx)?, status)?)
    })?;
    ok(requests
        .into_iter()
        .map(ContactRequestDto::from)
        .collect::<Vec<_>>())
}

async fn send_contact_request(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ContactRequestRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run(&runtime, &headers, JournalCommand::SendContactRequest { body })?)
}

async fn cancel_contact_request(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
) -> Reply {
    let request_id = id(path)?;
    ok(run(
        &runtime,
        &headers,
        JournalCommand::CancelContactRequest { request_id },
    )?)
}

async fn incoming_contact_requests(State(runtime): Shared, headers: HeaderMap) -> Reply {
    let requests = runtime.read(&tenant(&headers)?, &actor(&headers), |os, store, _, ctx| {
        Ok(os.panel.incoming_contact_requests(store, signed_in(ctx)?))
    })?;
    ok(requests
        .into_iter()
        .map(ContactRequestDto::from)
        .collect::<Vec<_>>())
}

async fn respond_contact_request(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ContactResponseRequest>, JsonRejection>,
) -> Reply {
    let request_id = id(path)?;
    let ContactResponseRequest { accept } = body(payload)?;
    ok(run(
        &runtime,
        &headers,
        JournalCommand::RespondContactRequest { request_id, accept },
    )?)
}

// ------------------------
// Operator catalog.
// ------------------------

async fn add_country(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<CountryRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run_as_operator(&runtime, &headers, JournalCommand::AddCountry { body })?)
}

async fn add_region(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<RegionRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run_as_operator(&runtime, &headers, JournalCommand::AddRegion { body })?)
}

async fn add_comuna(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<ComunaRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run_as_operator(&runtime, &headers, JournalCommand::AddComuna { body })?)
}

async fn add_provider_category(
    State(runtime): Shared,
    headers: HeaderMap,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Reply {
    let body = body(payload)?;
    created(run_as_operator(
        &runtime,
        &headers,
        JournalCommand::AddProviderCategory { body },
    )?)
}

async fn set_provider_status(
    State(runtime): Shared,
    headers: HeaderMap,
    path: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ProviderStatusRequest>, JsonRejection>,
) -> Reply {
    let provider_id = id(path)?;
    let body = body(payload)?;
    ok(run_as_operator(
        &runtime,
        &headers,
        JournalCommand::SetProviderStatus { provider_id, body },
    )?)
}
