use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use carely_core::domain::anchor::AnchorId;
use carely_core::domain::member::MemberId;
use carely_core::errors::{ApplicationError, InterfaceError};
use carely_core::recommend::{RecommendationEngine, RecommendationRequest};
use carely_db::{RecommendationCache, RecommendationCacheKey};

pub const MEMBER_HEADER: &str = "x-member-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct RecommendationState {
    pub engine: Arc<RecommendationEngine>,
    pub cache: Option<Arc<dyn RecommendationCache>>,
    pub cache_ttl: Duration,
}

/// Query parameters are kept as text so malformed values get the JSON error body.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<String>,
    pub top_k: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Server-side failure detail stays in the logs.
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::Forbidden { message, .. }
            | InterfaceError::NotFound { message, .. } => message.clone(),
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                self.0.user_message().to_owned()
            }
        };
        let body = ErrorBody {
            error: self.0.code().to_owned(),
            message,
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, correlation_header(body.correlation_id.as_str()), Json(body)).into_response()
    }
}

pub fn router(state: RecommendationState) -> Router {
    Router::new()
        .route("/api/v1/anchors/{anchor_id}/recommendations", get(recommendations))
        .with_state(state)
}

pub async fn recommendations(
    State(state): State<RecommendationState>,
    Path(anchor_id): Path<String>,
    Query(query): Query<RecommendationQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = parse_request(&anchor_id, &query, &headers, &correlation_id)?;

    let (limit, top_k) = state
        .engine
        .effective_bounds(&request)
        .map_err(|e| ApiError(ApplicationError::from(e).into_interface(correlation_id.as_str())))?;
    let key = RecommendationCacheKey::new(request.anchor_id, request.member_id, top_k, limit);

    if let Some(cache) = &state.cache {
        match cache.get(&key).await {
            Ok(Some(cached)) => {
                debug!(
                    event_name = "recommend.cache.hit",
                    correlation_id = %correlation_id,
                    cache_key = %key,
                    "serving cached recommendations"
                );
                return Ok(respond(&correlation_id, cached));
            }
            Ok(None) => {}
            Err(error) => warn!(
                event_name = "recommend.cache.read_failed",
                correlation_id = %correlation_id,
                cache_key = %key,
                error = %error,
                "cache read failed; computing fresh result"
            ),
        }
    }

    let response = state.engine.recommend(&request).await.map_err(|e| {
        let interface = e.into_interface(correlation_id.as_str());
        match &interface {
            InterfaceError::ServiceUnavailable { message, .. }
            | InterfaceError::Internal { message, .. } => error!(
                event_name = "recommend.request.failed",
                correlation_id = %correlation_id,
                anchor_id = %request.anchor_id,
                error = %message,
                "recommendation request failed"
            ),
            other => info!(
                event_name = "recommend.request.rejected",
                correlation_id = %correlation_id,
                anchor_id = %request.anchor_id,
                code = other.code(),
                "recommendation request rejected"
            ),
        }
        ApiError(interface)
    })?;

    if let Some(cache) = &state.cache {
        if let Err(error) = cache.put(&key, &response, state.cache_ttl).await {
            warn!(
                event_name = "recommend.cache.write_failed",
                correlation_id = %correlation_id,
                cache_key = %key,
                error = %error,
                "cache write failed"
            );
        }
    }

    Ok(respond(&correlation_id, response))
}

fn respond(correlation_id: &str, body: impl Serialize) -> Response {
    (correlation_header(correlation_id), Json(body)).into_response()
}

fn correlation_header(correlation_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    headers
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn parse_request(
    anchor_id: &str,
    query: &RecommendationQuery,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<RecommendationRequest, ApiError> {
    let bad_request = |message: String| {
        ApiError(InterfaceError::BadRequest { message, correlation_id: correlation_id.to_owned() })
    };

    let member = headers
        .get(MEMBER_HEADER)
        .ok_or_else(|| bad_request(format!("missing `{MEMBER_HEADER}` header")))?;
    let member_id = member
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| bad_request(format!("`{MEMBER_HEADER}` must be an integer member id")))?;
    let anchor_id = anchor_id
        .trim()
        .parse::<i64>()
        .map_err(|_| bad_request(format!("anchor id `{anchor_id}` is not an integer")))?;

    let mut request = RecommendationRequest::new(AnchorId(anchor_id), MemberId(member_id));
    if let Some(raw) = query.limit.as_deref() {
        let limit = raw.trim().parse::<u32>().map_err(|_| bad_request(format!("invalid limit `{raw}`")))?;
        request = request.with_limit(limit);
    }
    if let Some(raw) = query.top_k.as_deref() {
        let top_k = raw.trim().parse::<u32>().map_err(|_| bad_request(format!("invalid top_k `{raw}`")))?;
        request = request.with_top_k(top_k);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use rust_decimal::Decimal;
    use tower::ServiceExt;

    use carely_core::config::RecommendationConfig;
    use carely_core::domain::anchor::{AnchorId, AnchorItem};
    use carely_core::domain::member::{ConcernFlags, MemberId, MemberProfile, SkinType};
    use carely_core::domain::product::{CatalogProduct, NeighborEdge, ProductId, SkinCompatibility};
    use carely_core::errors::ApplicationError;
    use carely_core::recommend::{
        PoolMode, RecommendationEngine, RecommendationResponse, RecommendationSource,
    };
    use carely_core::taxonomy::{Category, EffectId};
    use carely_db::{
        InMemoryRecommendationCache, InMemoryRecommendationSource, RecommendationCache,
        RecommendationCacheKey, RepositoryError,
    };

    use super::{router, ErrorBody, RecommendationState};

    fn product(id: i64, category: Category, brand: &str) -> CatalogProduct {
        CatalogProduct {
            id: ProductId(id),
            category,
            brand: brand.to_owned(),
            name: format!("Product {id}"),
            price: Decimal::new(20_000, 0),
            discount_rate: Decimal::new(10, 0),
            stock: 4,
            active: true,
            thumbnail: None,
        }
    }

    async fn source() -> Arc<InMemoryRecommendationSource> {
        let source = InMemoryRecommendationSource::default();
        let mut concerns = ConcernFlags::default();
        concerns.insert_code("skin", "acne");
        source
            .save_member(MemberProfile { id: MemberId(1), skin_type: Some(SkinType::Oily), concerns })
            .await;
        source
            .save_member(MemberProfile {
                id: MemberId(2),
                skin_type: None,
                concerns: ConcernFlags::default(),
            })
            .await;

        source.save_product(product(1, Category::Serum, "Aurelle"), BTreeSet::from([EffectId(3)])).await;
        source.save_product(product(2, Category::Toner, "Lumen Lab"), BTreeSet::from([EffectId(2)])).await;
        source.save_product(product(3, Category::Serum, "Verdant"), BTreeSet::from([EffectId(5)])).await;
        for (neighbor, sim, rank) in [(2, 0.9, 1), (3, 0.8, 2)] {
            source
                .save_edge(NeighborEdge {
                    base_product_id: ProductId(1),
                    neighbor_product_id: ProductId(neighbor),
                    sim_overall: sim,
                    rank_order: rank,
                })
                .await;
        }
        source.save_compatibility(ProductId(3), SkinType::Oily, SkinCompatibility::Good).await;
        source
            .save_anchor(AnchorItem {
                id: AnchorId(100),
                member_id: MemberId(1),
                product_id: Some(ProductId(1)),
                category: None,
                name: "Blemish serum".to_owned(),
            })
            .await;
        Arc::new(source)
    }

    async fn state(cache: Option<Arc<dyn RecommendationCache>>) -> RecommendationState {
        let engine = RecommendationEngine::new(source().await, RecommendationConfig::default());
        RecommendationState { engine: Arc::new(engine), cache, cache_ttl: Duration::from_secs(60) }
    }

    async fn call(state: RecommendationState, uri: &str, member: Option<&str>) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().uri(uri).header("x-request-id", "req-test");
        if let Some(member) = member {
            builder = builder.header("x-member-id", member);
        }
        let response = router(state)
            .oneshot(builder.body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, body.to_vec(), request_id)
    }

    fn error_body(bytes: &[u8]) -> ErrorBody {
        serde_json::from_slice(bytes).expect("error body")
    }

    #[tokio::test]
    async fn owner_receives_ranked_recommendations() {
        let (status, body, request_id) =
            call(state(None).await, "/api/v1/anchors/100/recommendations?limit=5", Some("1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(request_id.as_deref(), Some("req-test"));
        let response: RecommendationResponse = serde_json::from_slice(&body).expect("response");
        assert_eq!(response.mode, PoolMode::Internal);
        let ids: Vec<i64> = response.items.iter().map(|item| item.product_id.0).collect();
        assert_eq!(ids[0], 3);
        assert_eq!(ids.len(), 2);
        assert_eq!(response.items[0].discount_price, Decimal::new(18_000, 0));
    }

    #[tokio::test]
    async fn missing_member_header_is_a_bad_request() {
        let (status, body, _) =
            call(state(None).await, "/api/v1/anchors/100/recommendations", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = error_body(&body);
        assert_eq!(error.error, "bad_request");
        assert_eq!(error.correlation_id, "req-test");
    }

    #[tokio::test]
    async fn malformed_inputs_are_bad_requests() {
        for (uri, member) in [
            ("/api/v1/anchors/100/recommendations", "abc"),
            ("/api/v1/anchors/abc/recommendations", "1"),
            ("/api/v1/anchors/100/recommendations?limit=ten", "1"),
            ("/api/v1/anchors/100/recommendations?limit=0", "1"),
            ("/api/v1/anchors/100/recommendations?top_k=100000", "1"),
        ] {
            let (status, body, _) = call(state(None).await, uri, Some(member)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(error_body(&body).error, "bad_request");
        }
    }

    #[tokio::test]
    async fn foreign_and_unknown_anchors_are_distinguished() {
        let (status, body, _) =
            call(state(None).await, "/api/v1/anchors/100/recommendations", Some("2")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_body(&body).error, "forbidden");

        let (status, body, _) =
            call(state(None).await, "/api/v1/anchors/555/recommendations", Some("1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_body(&body).error, "not_found");
    }

    #[tokio::test]
    async fn successful_responses_are_cached_per_request_shape() {
        let cache = Arc::new(InMemoryRecommendationCache::default());
        let state = state(Some(cache.clone())).await;

        let (status, first, _) =
            call(state.clone(), "/api/v1/anchors/100/recommendations?limit=5", Some("1")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second, _) =
            call(state.clone(), "/api/v1/anchors/100/recommendations?limit=5", Some("1")).await;
        assert_eq!(first, second);

        // The second call was served from cache.
        assert_eq!(state.engine.counters().snapshot().requests, 1);

        call(state.clone(), "/api/v1/anchors/100/recommendations?limit=4", Some("1")).await;
        assert_eq!(state.engine.counters().snapshot().requests, 2);
    }

    #[tokio::test]
    async fn rejected_requests_are_not_cached() {
        let cache = Arc::new(InMemoryRecommendationCache::default());
        let state = state(Some(cache.clone())).await;

        call(state.clone(), "/api/v1/anchors/100/recommendations", Some("2")).await;
        call(state.clone(), "/api/v1/anchors/100/recommendations", Some("2")).await;
        assert_eq!(state.engine.counters().snapshot().requests, 2);
        assert_eq!(cache.purge_expired().await.expect("purge"), 0);
    }

    struct UnavailableSource;

    #[async_trait]
    impl RecommendationSource for UnavailableSource {
        async fn find_anchor_owner(&self, _: AnchorId) -> Result<Option<MemberId>, ApplicationError> {
            Err(ApplicationError::Persistence("database is locked".to_owned()))
        }
        async fn get_anchor(&self, _: AnchorId) -> Result<Option<AnchorItem>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_member_skin_type(&self, _: MemberId) -> Result<Option<SkinType>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_concern_flags(&self, _: MemberId) -> Result<ConcernFlags, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_neighbor_edges(&self, _: ProductId, _: u32) -> Result<Vec<NeighborEdge>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_products_by_ids(&self, _: &[ProductId]) -> Result<Vec<CatalogProduct>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_all_active_products(&self) -> Result<Vec<CatalogProduct>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_effect_tags(
            &self,
            _: &[ProductId],
        ) -> Result<HashMap<ProductId, BTreeSet<EffectId>>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
        async fn get_skin_compatibility(
            &self,
            _: &[ProductId],
            _: SkinType,
        ) -> Result<HashMap<ProductId, SkinCompatibility>, ApplicationError> {
            unreachable!("owner lookup fails first")
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl RecommendationCache for BrokenCache {
        async fn get(&self, _: &RecommendationCacheKey) -> Result<Option<RecommendationResponse>, RepositoryError> {
            Err(RepositoryError::Decode("corrupt payload".to_owned()))
        }
        async fn put(
            &self,
            _: &RecommendationCacheKey,
            _: &RecommendationResponse,
            _: Duration,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_owned()))
        }
        async fn purge_expired(&self) -> Result<u64, RepositoryError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn storage_failures_are_service_unavailable_without_detail() {
        let engine = RecommendationEngine::new(Arc::new(UnavailableSource), RecommendationConfig::default());
        let state =
            RecommendationState { engine: Arc::new(engine), cache: None, cache_ttl: Duration::from_secs(60) };

        let (status, body, _) = call(state, "/api/v1/anchors/100/recommendations", Some("1")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let error = error_body(&body);
        assert_eq!(error.error, "service_unavailable");
        assert!(!error.message.contains("locked"));
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_the_request() {
        let state = state(Some(Arc::new(BrokenCache))).await;
        let (status, _, _) = call(state, "/api/v1/anchors/100/recommendations", Some("1")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
