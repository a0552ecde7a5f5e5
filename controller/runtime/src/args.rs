use crate::{
    core::{ClaimRecord, Selector, WorkloadRecord},
    http::{self, HttpMetrics, ServiceInfo},
    index::{
        metrics::{self, GatewayMetrics, SubscriptionMetrics},
        subscription::{self, State},
        Gateway, Index, Store, Subscription,
    },
    k8s::{KubeAuthority, PersistentVolumeClaim, Pod},
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use tokio::{sync::watch, time::Duration};
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "volm", about = "Serves a cached view of a namespace's volume claims")]
pub struct Args {
    #[clap(long, default_value = "volm=info,warn", env = "VOLM_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    #[clap(long, default_value = "0.0.0.0:8070", env = "VOLM_HTTP_ADDR")]
    http_addr: SocketAddr,

    /// Connections that do not send a request head within this many seconds are closed.
    #[clap(long, default_value = "10", env = "HTTP_READ_TIMEOUT")]
    http_read_timeout_secs: u64,

    /// The namespace whose claims and pods are mirrored.
    #[clap(long, default_value = "default", env = "PVC_NAMESPACE")]
    pvc_namespace: String,

    /// Comma-separated `key=value` labels a claim must carry to be read or deleted.
    #[clap(long, default_value = "", env = "PVC_SELECTOR")]
    pvc_selector: Selector,

    #[clap(long, default_value = "60")]
    resync_interval_secs: u64,

    #[clap(long, default_value = "5000")]
    request_timeout_ms: u64,

    /// Reported by the service description route.
    #[clap(long, default_value = "release", env = "MODE")]
    mode: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            http_addr,
            http_read_timeout_secs,
            pvc_namespace,
            pvc_selector,
            resync_interval_secs,
            request_timeout_ms,
            mode,
        } = self;

        if pvc_namespace.trim().is_empty() {
            bail!("--pvc-namespace must not be empty");
        }

        let config = subscription::Config {
            resync_interval: Duration::from_secs(resync_interval_secs),
            request_timeout: Duration::from_millis(request_timeout_ms),
            ..Default::default()
        };

        let claims = Store::<ClaimRecord>::shared();
        let workloads = Store::<WorkloadRecord>::shared();
        let index = Index::new(claims.clone(), workloads.clone());

        let mut prom = <Registry>::default();
        let volm = prom.sub_registry_with_prefix("volm");
        metrics::register_stores(volm, index.clone());
        let subscription_metrics =
            SubscriptionMetrics::register(volm.sub_registry_with_prefix("subscription"));
        let gateway_metrics = GatewayMetrics::register(volm.sub_registry_with_prefix("gateway"));
        let http_metrics = HttpMetrics::register(volm.sub_registry_with_prefix("http"));
        let info = ServiceInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode,
            service: "volm".to_string(),
        };
        http::metrics::register_info(volm, &info);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        if pvc_selector.is_empty() {
            info!(namespace = %pvc_namespace, "Mirroring volumes; every claim is visible");
        } else {
            info!(namespace = %pvc_namespace, selector = %pvc_selector, "Mirroring volumes");
        }

        // Spawn the subscriptions that keep each store current.

        let pvcs =
            KubeAuthority::<PersistentVolumeClaim>::namespaced(runtime.client(), &pvc_namespace);
        let pvcs = Subscription::new(
            "persistentvolumeclaims",
            pvcs,
            claims,
            config.clone(),
            subscription_metrics.clone(),
        );
        let pvcs_state = pvcs.state();
        tokio::spawn(pvcs.run().instrument(info_span!("persistentvolumeclaims")));

        let pods = KubeAuthority::<Pod>::namespaced(runtime.client(), &pvc_namespace);
        let pods = Subscription::new("pods", pods, workloads, config, subscription_metrics);
        let pods_state = pods.state();
        tokio::spawn(pods.run().instrument(info_span!("pods")));

        // Readiness is held until both stores reflect a full listing.
        let initialized = runtime.initialized_handle();
        tokio::spawn(
            async move {
                tokio::join!(synced(pvcs_state), synced(pods_state));
                info!("Stores synced");
                drop(initialized);
            }
            .instrument(info_span!("readiness")),
        );

        let gateway = Gateway::new(
            KubeAuthority::<PersistentVolumeClaim>::namespaced(runtime.client(), &pvc_namespace),
            Duration::from_millis(request_timeout_ms),
            gateway_metrics,
        );
        let api = http::Api::new(index, gateway, pvc_selector, info, http_metrics);
        tokio::spawn(http::serve(
            http_addr,
            api,
            Duration::from_secs(http_read_timeout_secs),
            runtime.shutdown_handle(),
        ));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn synced(mut state: watch::Receiver<State>) {
    if state.wait_for(|s| *s == State::Synced).await.is_err() {
        warn!("Subscription ended before syncing");
    }
}
