use crate::Index;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric},
    metrics::{counter::Counter, family::Family, gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct SubscriptionMetrics {
    events: Family<EventLabels, Counter>,
    relists: Family<ResourceLabels, Counter>,
    disconnects: Family<ResourceLabels, Counter>,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayMetrics {
    deletes: Family<OutcomeLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EventLabels {
    resource: &'static str,
    kind: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResourceLabels {
    resource: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Debug)]
struct StoreSizes(Index);

/// Registers gauges reporting the number of records held in each store.
pub fn register_stores(reg: &mut Registry, index: Index) {
    reg.register_collector(Box::new(StoreSizes(index)));
}

// === impl SubscriptionMetrics ===

impl SubscriptionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let events = Family::<EventLabels, Counter>::default();
        reg.register(
            "events",
            "Total number of watch events applied to a store",
            events.clone(),
        );

        let relists = Family::<ResourceLabels, Counter>::default();
        reg.register(
            "relists",
            "Total number of full listings applied to a store",
            relists.clone(),
        );

        let disconnects = Family::<ResourceLabels, Counter>::default();
        reg.register(
            "disconnects",
            "Total number of failed list or watch attempts",
            disconnects.clone(),
        );

        Self {
            events,
            relists,
            disconnects,
        }
    }

    pub(crate) fn event(&self, resource: &'static str, kind: &'static str) {
        self.events
            .get_or_create(&EventLabels { resource, kind })
            .inc();
    }

    pub(crate) fn relist(&self, resource: &'static str) {
        self.relists.get_or_create(&ResourceLabels { resource }).inc();
    }

    pub(crate) fn disconnect(&self, resource: &'static str) {
        self.disconnects
            .get_or_create(&ResourceLabels { resource })
            .inc();
    }
}

// === impl GatewayMetrics ===

impl GatewayMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let deletes = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "deletes",
            "Total number of volume deletions attempted, by outcome",
            deletes.clone(),
        );
        Self { deletes }
    }

    pub(crate) fn delete(&self, outcome: &'static str) {
        self.deletes.get_or_create(&OutcomeLabels { outcome }).inc();
    }
}

// === impl StoreSizes ===

impl Collector for StoreSizes {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let mut size_encoder = encoder.encode_descriptor(
            "store_size",
            "The number of records held in each store",
            None,
            MetricType::Gauge,
        )?;

        for (resource, len) in [
            ("persistentvolumeclaims", self.0.claims().len()),
            ("pods", self.0.workloads().len()),
        ] {
            let labels = vec![("resource", resource)];
            let size = ConstGauge::new(len as i64);
            size.encode(size_encoder.encode_family(&labels)?)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use prometheus_client::encoding::text::encode;
    use volm_controller_core::{ClaimRecord, WorkloadRecord};

    #[test]
    fn encodes_store_sizes() {
        let claims = Store::shared();
        claims.upsert(ClaimRecord {
            name: "pvc-0".into(),
            ..Default::default()
        });
        let index = Index::new(claims, Store::<WorkloadRecord>::shared());

        let mut reg = Registry::with_prefix("volm");
        register_stores(&mut reg, index);
        let metrics = SubscriptionMetrics::register(reg.sub_registry_with_prefix("subscription"));
        metrics.event("pods", "added");

        let mut text = String::new();
        encode(&mut text, &reg).expect("metrics must encode");
        assert!(
            text.contains(r#"volm_store_size{resource="persistentvolumeclaims"} 1"#),
            "{text}"
        );
        assert!(text.contains(r#"volm_store_size{resource="pods"} 0"#), "{text}");
        assert!(
            text.contains(r#"volm_subscription_events_total{resource="pods",kind="added"} 1"#),
            "{text}"
        );
    }
}
