use actix_web::{error, web, Error, HttpResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    pub registry: Registry,
    pub method_call_counter: IntCounterVec,
    pub ingested_record_counter: IntCounter,
    pub skipped_record_counter: IntCounter,
    pub swept_entry_counter: IntCounter,
    pub cache_entries: IntGauge,
    pub error_counter: IntCounter,
}

fn add_prefix(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, name)
}

fn register_counter_with_prefix(
    registry: &Registry,
    prefix: &str,
    name: &str,
    description: &str,
) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(add_prefix(prefix, name), description)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn register_int_counter_vec_with_prefix(
    registry: &Registry,
    prefix: &str,
    name: &str,
    description: &str,
    labels: &[&str],
) -> prometheus::Result<IntCounterVec> {
    let opts = prometheus::Opts::new(add_prefix(prefix, name), description);
    let counter_vec = IntCounterVec::new(opts, labels)?;
    registry.register(Box::new(counter_vec.clone()))?;
    Ok(counter_vec)
}

impl Metrics {
    pub fn new(prefix: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let method_call_counter = register_int_counter_vec_with_prefix(
            &registry,
            prefix,
            "method_call_total",
            "Total number of method calls per chain, by cache outcome.",
            &["chain", "method", "cache"],
        )?;
        let ingested_record_counter = register_counter_with_prefix(
            &registry,
            prefix,
            "ingested_record_total",
            "Total number of block records written to the cache.",
        )?;
        let skipped_record_counter = register_counter_with_prefix(
            &registry,
            prefix,
            "skipped_record_total",
            "Total number of malformed block records dropped on ingestion.",
        )?;
        let swept_entry_counter = register_counter_with_prefix(
            &registry,
            prefix,
            "swept_entry_total",
            "Total number of expired entries removed by the sweeper.",
        )?;
        let cache_entries = IntGauge::new(
            add_prefix(prefix, "cache_entries"),
            "Entries currently held, including expired ones not yet swept.",
        )?;
        registry.register(Box::new(cache_entries.clone()))?;
        let error_counter = register_counter_with_prefix(
            &registry,
            prefix,
            "error_total",
            "Total number of errors answering requests.",
        )?;

        Ok(Self {
            registry,
            method_call_counter,
            ingested_record_counter,
            skipped_record_counter,
            swept_entry_counter,
            cache_entries,
            error_counter,
        })
    }

    pub fn record_call(&self, chain_id: u64, method: &str, cache: &str) {
        let chain = chain_id.to_string();
        self.method_call_counter
            .with_label_values(&[chain.as_str(), method, cache])
            .inc();
    }
}

#[actix_web::get("/metrics")]
async fn metrics(data: web::Data<crate::AppState>) -> Result<HttpResponse, Error> {
    let encoder = TextEncoder::new();
    let metric_families = data.metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(buffer))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prefixed_names() {
        let app_metrics = Metrics::new("rpc_cache").unwrap();
        app_metrics.record_call(1, "eth_blockNumber", "hit");
        app_metrics.ingested_record_counter.inc_by(3);

        let names: Vec<String> = app_metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.contains(&"rpc_cache_method_call_total".to_string()));
        assert!(names.contains(&"rpc_cache_ingested_record_total".to_string()));
        assert_eq!(
            app_metrics
                .method_call_counter
                .with_label_values(&["1", "eth_blockNumber", "hit"])
                .get(),
            1
        );
    }
}
