//! Host application wiring
//!
//! Start order: bridge catalog, message bus, event forwarding, then the worker
//! (which is told where the bus lives through `HOST_BUS_URL`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bus::{BusAddress, BusConfig, MessageBus, standard_catalog};
use shared::logging::{log_error, log_success};
use shared::{ClientRole, Component, HttpClient, HttpClientConfig, component_info, component_warn};
use supervisor::{ProcessSupervisor, ServiceConfig, SupervisorSettings};
use tokio::task::JoinHandle;

use crate::config::Args;
use crate::router::{spawn_inbound_router, spawn_supervisor_forwarder};
use crate::services::{InMemoryKnowledgeService, InMemoryMemoryService};

/// Environment variable carrying the bus URL into the worker
pub const BUS_URL_ENV: &str = "HOST_BUS_URL";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HostSettings {
    pub service: ServiceConfig,
    pub bus: BusConfig,
    pub http: HttpClientConfig,
    pub supervisor: SupervisorSettings,
    pub ready_timeout: Duration,
}

impl From<&Args> for HostSettings {
    fn from(args: &Args) -> Self {
        Self {
            service: args.service_config(),
            bus: args.bus_config(),
            http: args.http_config(),
            supervisor: SupervisorSettings::default(),
            ready_timeout: args.ready_timeout(),
        }
    }
}

pub struct HostApp {
    supervisor: ProcessSupervisor,
    bus: MessageBus,
    http: HttpClient,
    bus_address: BusAddress,
    tasks: Vec<JoinHandle<()>>,
}

impl HostApp {
    /// Bring up the bus and launch the worker
    ///
    /// A bus that cannot bind is fatal. A worker that fails to launch is not:
    /// the failure is visible to UI peers through `PYTHON_STATUS` and an
    /// explicit restart can follow.
    pub async fn start(settings: HostSettings) -> anyhow::Result<Self> {
        let bridge = Arc::new(standard_catalog(
            Arc::new(InMemoryKnowledgeService::new()),
            Arc::new(InMemoryMemoryService::new()),
        ));
        component_info!(
            Component::Host,
            "Bridge exposes {} methods on {}",
            bridge.method_count(),
            bridge.services().join(", ")
        );

        let bus = MessageBus::new(bridge);
        let bus_address = bus
            .start_server(settings.bus.clone())
            .await
            .context("Failed to start message bus")?;

        let supervisor = ProcessSupervisor::new(settings.supervisor.clone());
        let mut tasks = vec![
            spawn_supervisor_forwarder(bus.clone(), supervisor.subscribe()),
            spawn_inbound_router(bus.clone()),
        ];

        let http = HttpClient::new(settings.http.clone()).context("Failed to build worker HTTP client")?;

        let service = settings
            .service
            .clone()
            .with_env(BUS_URL_ENV, bus_address.url_for(ClientRole::Worker));

        match supervisor.start(service).await {
            Ok(started) => {
                component_info!(Component::Host, "Worker launched as pid {} on port {}", started.pid, started.port);
                tasks.push(spawn_ready_wait(http.clone(), settings.ready_timeout));
            }
            Err(e) => log_error(Component::Host, "Worker launch", &e),
        }

        Ok(Self {
            supervisor,
            bus,
            http,
            bus_address,
            tasks,
        })
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn bus_address(&self) -> &BusAddress {
        &self.bus_address
    }

    /// Close peers first so none observe the worker going away mid-session
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.bus.stop_server().await.context("Failed to stop message bus")?;
        self.supervisor.stop().await.context("Failed to stop worker")?;

        for task in self.tasks {
            task.abort();
        }
        Ok(())
    }
}

fn spawn_ready_wait(http: HttpClient, ready_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if http.wait_for_ready(ready_timeout, READY_POLL_INTERVAL).await {
            log_success(Component::Host, "Worker API is answering health checks");
        } else {
            component_warn!(
                Component::Host,
                "⚠️ Worker API not ready after {:?} at {}",
                ready_timeout,
                http.config().base_url
            );
        }
    })
}
