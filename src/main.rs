use std::collections::HashMap;

use actix_web::{web, App, Error, HttpResponse, HttpServer};
use anyhow::Context;
use chain_rpc_cache::{BlocksData, JsonRpcCache};
use clap::Parser;
use env_logger::Env;
use reqwest::Url;
use serde_json::{json, Value};

use crate::args::Args;
use crate::config::AppConfig;
use crate::json_rpc::{DefinedError, JsonRpcResponse, RequestId, RpcCall};

mod args;
mod config;
mod json_rpc;
mod metrics;
mod utils;

const METRICS_PREFIX: &str = "chain_rpc_cache";
const MAX_INGEST_BODY_BYTES: usize = 64 * 1024 * 1024;

struct AppState {
    cache: JsonRpcCache,
    upstreams: HashMap<u64, Url>,
    http_client: reqwest::Client,
    metrics: metrics::Metrics,
}

#[actix_web::post("/rpc/{chain_id}")]
async fn rpc_call(
    path: web::Path<(u64,)>,
    data: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, Error> {
    let (chain_id,) = path.into_inner();

    let (requests, is_single_request) = match body.into_inner() {
        Value::Array(requests) if !requests.is_empty() => (requests, false),
        Value::Object(obj) => (vec![Value::Object(obj)], true),
        _ => return Ok(JsonRpcResponse::from_error(None, DefinedError::InvalidRequest).into()),
    };

    let mut ordered_results: Vec<Option<JsonRpcResponse>> = vec![None; requests.len()];
    let mut uncached_calls: Vec<RpcCall> = vec![];

    for (index, request) in requests.into_iter().enumerate() {
        let call = match RpcCall::parse(index, request) {
            Ok(call) => call,
            Err((request_id, err)) => {
                ordered_results[index] = Some(JsonRpcResponse::from_error(request_id, err));
                continue;
            }
        };

        match data.cache.get_value(chain_id, &call.method, &call.params) {
            Some(result) => {
                tracing::info!("cache hit for method {} on chain {}", call.method, chain_id);
                data.metrics.record_call(chain_id, &call.method, "hit");
                ordered_results[index] = Some(JsonRpcResponse::from_result(call.id, result));
            }
            None => {
                tracing::info!("cache missed for method {} on chain {}", call.method, chain_id);
                data.metrics.record_call(chain_id, &call.method, "miss");
                uncached_calls.push(call);
            }
        }
    }

    if !uncached_calls.is_empty() {
        forward_to_upstream(&data, chain_id, uncached_calls, &mut ordered_results).await;
    }

    let mut responses = ordered_results.into_iter().flatten();

    Ok(match is_single_request {
        true => match responses.next() {
            Some(response) => response.into(),
            None => JsonRpcResponse::from_error(None, DefinedError::InternalError(None)).into(),
        },
        false => HttpResponse::Ok().json(responses.collect::<Vec<_>>()),
    })
}

/// Sends every missed call to the chain's upstream in one batch. Each call
/// ends up with a response, an error one if the upstream did not answer it.
async fn forward_to_upstream(
    data: &AppState,
    chain_id: u64,
    calls: Vec<RpcCall>,
    ordered_results: &mut [Option<JsonRpcResponse>],
) {
    macro_rules! fail_all_and_return {
        ($reason: expr) => {{
            data.metrics.error_counter.inc();
            for call in &calls {
                ordered_results[call.index] = Some(JsonRpcResponse::from_error(
                    Some(call.id.clone()),
                    DefinedError::InternalError(Some($reason)),
                ));
            }
            return;
        }};
    }

    let Some(rpc_url) = data.upstreams.get(&chain_id) else {
        tracing::warn!(chain_id, "no upstream configured");
        fail_all_and_return!(json!({
            "error": "no upstream configured for chain",
            "chain_id": chain_id,
        }))
    };

    let rpc_result = match utils::do_rpc_request(&data.http_client, rpc_url.clone(), &calls).await {
        Ok(v) => v,
        Err(err) => {
            tracing::error!("fail to make rpc request because: {err:#}");
            fail_all_and_return!(json!({
                "error": "fail to make rpc request to backend",
                "reason": err.to_string(),
            }))
        }
    };

    let result_values = match rpc_result {
        Value::Array(v) => v,
        other => {
            tracing::error!("array is expected but we got invalid rpc response: {other}");
            fail_all_and_return!(json!({
                "error": "invalid rpc response from backend",
                "reason": "array is expected",
                "response": other.to_string(),
            }))
        }
    };

    let calls_by_id: HashMap<&RequestId, &RpcCall> = calls.iter().map(|call| (&call.id, call)).collect();

    for mut response in result_values {
        let call = match response
            .get_mut("id")
            .map(Value::take)
            .and_then(|id| RequestId::try_from(id).ok())
            .and_then(|id| calls_by_id.get(&id).copied())
        {
            Some(call) => call,
            None => {
                tracing::warn!("rpc response fails to map to original request and is ignored: {response}");
                continue;
            }
        };

        let response = match response["error"].take() {
            Value::Null => JsonRpcResponse::from_result(call.id.clone(), response["result"].take()),
            error => JsonRpcResponse::from_custom_error(Some(call.id.clone()), error),
        };
        ordered_results[call.index] = Some(response);
    }

    for call in &calls {
        if ordered_results[call.index].is_none() {
            data.metrics.error_counter.inc();
            ordered_results[call.index] = Some(JsonRpcResponse::from_error(
                Some(call.id.clone()),
                DefinedError::InternalError(Some(json!({
                    "error": "backend returned no response for request",
                }))),
            ));
        }
    }
}

#[actix_web::post("/ingest")]
async fn ingest(data: web::Data<AppState>, body: web::Json<Value>) -> Result<HttpResponse, Error> {
    let (batch, undecodable) = BlocksData::from_value_lenient(body.into_inner());
    let report = data.cache.append(&batch);
    let skipped = report.skipped + undecodable;

    data.metrics
        .ingested_record_counter
        .inc_by(report.ingested as u64);
    data.metrics.skipped_record_counter.inc_by(skipped as u64);

    if skipped > 0 {
        tracing::warn!(ingested = report.ingested, skipped, "block batch partially ingested");
    }

    Ok(HttpResponse::Ok().json(json!({
        "ingested": report.ingested,
        "skipped": skipped,
    })))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();
    let cfg = AppConfig::load(&args).context("fail to load config")?;

    let http_client = reqwest::Client::new();
    let mut upstreams = HashMap::new();

    for chain in &cfg.chains {
        tracing::info!("Linked chain {} to endpoint {}", chain.chain_id, chain.upstream);

        match utils::get_chain_id(&http_client, chain.upstream.clone()).await {
            Ok(reported) if reported != chain.chain_id => tracing::warn!(
                "endpoint {} reports chain id {reported}, configured as {}",
                chain.upstream,
                chain.chain_id
            ),
            Ok(_) => {}
            Err(err) => tracing::warn!("fail to verify chain id of {}: {err:#}", chain.upstream),
        }

        upstreams.insert(chain.chain_id, chain.upstream.clone());
    }

    let cache = JsonRpcCache::new(cfg.cache.ttl());
    tracing::info!(
        ttl_ms = cfg.cache.ttl_ms,
        "Caching methods {:?}",
        cache.registry().method_names()
    );

    let app_state = web::Data::new(AppState {
        cache,
        upstreams,
        http_client,
        metrics: metrics::Metrics::new(METRICS_PREFIX).context("fail to register metrics")?,
    });

    {
        let app_state = app_state.clone();
        let period = cfg.cache.sweep_interval();

        actix_web::rt::spawn(async move {
            let mut interval = actix_web::rt::time::interval(period);
            loop {
                interval.tick().await;

                let removed = app_state.cache.remove_expired();
                app_state.metrics.swept_entry_counter.inc_by(removed as u64);
                app_state.metrics.cache_entries.set(app_state.cache.len() as i64);

                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
            }
        });
    }

    tracing::info!("Server listening on {}:{}", cfg.server.host, cfg.server.port);

    {
        let app_state = app_state.clone();

        HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .app_data(web::JsonConfig::default().limit(MAX_INGEST_BODY_BYTES))
                .service(rpc_call)
                .service(ingest)
                .service(metrics::metrics)
        })
        .bind((cfg.server.host.as_str(), cfg.server.port))?
        .run()
        .await?;
    }

    tracing::info!("Server stopped");

    Ok(())
}
