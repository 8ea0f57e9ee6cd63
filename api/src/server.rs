use std::sync::Arc;

use axum::{
    Router,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
};
use hnf1b_common::views::ApiErrorResponse;
use hnf1b_db::{pagination::Paginator, query::FieldRegistry, storage::Storage};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use utoipa::{
    ToSchema,
    openapi::{Info, License, OpenApi, RefOr, path::Operation},
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::{config::Hnf1bApiConfig, context::ApiContext, handlers};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn make(cfg: Hnf1bApiConfig, db: Arc<dyn Storage>) -> anyhow::Result<(Router, OpenApi)> {
    let paginator = Paginator::new(FieldRegistry::phenopackets()?, cfg.page_limits()?);
    let allow_origin = cfg.public_url.parse::<HeaderValue>()?;
    let context = ApiContext::new(cfg, db, paginator);

    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            MakeRequestUuid,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let request_id = req
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok());
                    let path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or_else(|| req.uri().path());

                    info_span!(
                        "http_request",
                        method = req.method().to_string(),
                        request_id,
                        path,
                    )
                }),
        )
        .layer(CorsLayer::new().allow_origin(allow_origin))
        .layer(PropagateRequestIdLayer::new(x_request_id));

    let openapi = OpenApi::builder()
        .info(
            Info::builder()
                .title("HNF1B Phenopacket API Reference")
                .version(env!("CARGO_PKG_VERSION"))
                .license(Some(
                    License::builder()
                        .name("Apache 2.0 License")
                        .identifier(Some(env!("CARGO_PKG_LICENSE")))
                        .build()
                ))
        )
        .build();

    let (r, mut a) = OpenApiRouter::with_openapi(openapi)
        .routes(routes!(handlers::health_check))
        .routes(routes!(handlers::phenopackets::list_phenopackets))
        .routes(routes!(handlers::phenopackets::get_phenopacket))
        .layer(middleware)
        .with_state(context)
        .split_for_parts();

    a.paths.paths.iter_mut().for_each(|(_path, item)| {
        apply_default_errors(&mut item.get);
    });

    Ok((r, a))
}

fn error_ref(summary: &str) -> RefOr<utoipa::openapi::Response> {
    RefOr::Ref(
        utoipa::openapi::Ref::builder()
            .summary(summary)
            .ref_location_from_schema_name(ApiErrorResponse::name())
            .build()
    )
}

fn apply_default_errors(item: &mut Option<Operation>) {
    if let Some(item) = item {
        item.responses.responses.insert("400".into(), error_ref("Invalid request"));
        item.responses.responses.insert("404".into(), error_ref("Not found"));
        item.responses.responses.insert("500".into(), error_ref("Internal server error"));
        item.responses.responses.insert("503".into(), error_ref("Storage unavailable"));
    }
}
