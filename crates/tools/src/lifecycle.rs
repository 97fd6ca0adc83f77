//! Dynamic tool lifecycle: activate a category on demand, expire tools
//! that sit idle.
//!
//! The manager owns the only table of active tools.  Activation, usage,
//! invocation and the sweep all go through one mutex, so a sweep can never
//! drop an entry between a concurrent call's lookup and its refresh.
//! Handlers are `Arc`s: a call already running keeps its handler alive
//! even if the sweep removes the entry underneath it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eb_bridge::{BridgeError, HostCaller, HostResponse};
use eb_domain::config::LifecycleConfig;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::descriptor::ToolDescriptor;
use crate::handler::ToolHandler;
use crate::registry::ToolRegistry;
use crate::schema::normalize_params;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ActiveToolEntry {
    descriptor: Arc<ToolDescriptor>,
    handler: Arc<dyn ToolHandler>,
    registered_at: DateTime<Utc>,
    last_used: Instant,
    use_count: u64,
}

/// Outcome of [`LifecycleManager::activate_category`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub category: String,
    pub newly_activated: Vec<String>,
    pub already_active: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    Activated,
    IdleExpired,
    Deactivated,
}

/// Broadcast once per batch, never once per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ToolsChanged {
        activated: Vec<String>,
        deactivated: Vec<String>,
        reason: ChangeReason,
    },
}

/// Snapshot of one active tool.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveToolInfo {
    pub name: String,
    pub category: String,
    pub registered_at: DateTime<Utc>,
    #[serde(rename = "idle_secs", serialize_with = "as_secs")]
    pub idle: Duration,
    pub use_count: u64,
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LifecycleManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LifecycleManager {
    registry: Arc<ToolRegistry>,
    host: Arc<dyn HostCaller>,
    idle_threshold: Duration,
    sweep_interval: Duration,
    active: Mutex<HashMap<String, ActiveToolEntry>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleManager {
    pub fn new(
        registry: Arc<ToolRegistry>,
        host: Arc<dyn HostCaller>,
        config: &LifecycleConfig,
    ) -> Self {
        Self::with_timing(
            registry,
            host,
            config.idle_threshold(),
            config.sweep_interval(),
        )
    }

    pub fn with_timing(
        registry: Arc<ToolRegistry>,
        host: Arc<dyn HostCaller>,
        idle_threshold: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            registry,
            host,
            idle_threshold,
            sweep_interval,
            active: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Instantiate every tool in `category` that is not active yet and
    /// refresh the idle clock of those that are.
    pub fn activate_category(&self, category: &str) -> Activation {
        let descriptors = self.registry.by_category(category);
        let mut activation = Activation {
            category: category.to_ascii_lowercase(),
            ..Default::default()
        };
        if descriptors.is_empty() {
            tracing::warn!(category, "activation requested for unknown or empty category");
            return activation;
        }

        let now = Instant::now();
        {
            let mut active = self.active.lock();
            for descriptor in descriptors {
                match active.get_mut(&descriptor.name) {
                    Some(entry) => {
                        entry.last_used = now;
                        activation.already_active.push(descriptor.name.clone());
                    }
                    None => {
                        let handler = descriptor.factory.create(&descriptor, self.host.clone());
                        activation.newly_activated.push(descriptor.name.clone());
                        active.insert(
                            descriptor.name.clone(),
                            ActiveToolEntry {
                                descriptor,
                                handler,
                                registered_at: Utc::now(),
                                last_used: now,
                                use_count: 0,
                            },
                        );
                    }
                }
            }
        }

        tracing::info!(
            category = %activation.category,
            newly_activated = activation.newly_activated.len(),
            already_active = activation.already_active.len(),
            "category activated"
        );
        if !activation.newly_activated.is_empty() {
            self.emit(activation.newly_activated.clone(), Vec::new(), ChangeReason::Activated);
        }
        activation
    }

    /// Remove every active tool of `category` now, regardless of idle time.
    /// Returns the removed names.
    pub fn deactivate_category(&self, category: &str) -> Vec<String> {
        let category = category.to_ascii_lowercase();
        let mut removed: Vec<String> = {
            let mut active = self.active.lock();
            let names: Vec<String> = active
                .iter()
                .filter(|(_, e)| e.descriptor.category == category)
                .map(|(n, _)| n.clone())
                .collect();
            for name in &names {
                active.remove(name);
            }
            names
        };
        removed.sort();

        if !removed.is_empty() {
            tracing::info!(category = %category, count = removed.len(), "category deactivated");
            self.emit(Vec::new(), removed.clone(), ChangeReason::Deactivated);
        }
        removed
    }

    /// Refresh the idle clock of `name`.  Returns `false` if it is not
    /// active.
    pub fn record_usage(&self, name: &str) -> bool {
        let mut active = self.active.lock();
        match active.get_mut(&name.to_ascii_lowercase()) {
            Some(entry) => {
                entry.last_used = Instant::now();
                entry.use_count += 1;
                true
            }
            None => false,
        }
    }

    // ── Invocation ───────────────────────────────────────────────────

    /// Call a registered tool without activating it.  Unknown names fail
    /// before any traffic reaches the host.
    pub async fn invoke_direct(
        &self,
        name: &str,
        params: Map<String, Value>,
    ) -> Result<HostResponse, BridgeError> {
        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| BridgeError::UnknownTool(name.to_string()))?;
        let params = normalize_params(&descriptor.schema, params);

        tracing::debug!(tool = %descriptor.name, method = %descriptor.method, "direct invocation");
        let resp = self
            .host
            .call_host(&descriptor.method, params, descriptor.call_options())
            .await?;
        self.record_usage(&descriptor.name);
        Ok(resp)
    }

    /// Call a tool through its activated handler.  Fails with
    /// `UnknownTool` when the tool is not active.
    pub async fn invoke_active(
        &self,
        name: &str,
        params: Map<String, Value>,
    ) -> Result<HostResponse, BridgeError> {
        let (descriptor, handler) = {
            let active = self.active.lock();
            let entry = active
                .get(&name.to_ascii_lowercase())
                .ok_or_else(|| BridgeError::UnknownTool(format!("{name} (not active)")))?;
            (entry.descriptor.clone(), entry.handler.clone())
        };

        let params = normalize_params(&descriptor.schema, params);
        let resp = handler.invoke(params).await?;
        self.record_usage(&descriptor.name);
        Ok(resp)
    }

    // ── Expiry ───────────────────────────────────────────────────────

    /// Deactivate every tool idle longer than the threshold.  Returns the
    /// removed names, sorted.
    pub fn sweep(&self) -> Vec<String> {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> Vec<String> {
        let threshold = self.idle_threshold;
        let mut expired: Vec<String> = {
            let mut active = self.active.lock();
            let names: Vec<String> = active
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.last_used) > threshold)
                .map(|(n, _)| n.clone())
                .collect();
            for name in &names {
                active.remove(name);
            }
            names
        };

        if expired.is_empty() {
            return expired;
        }
        expired.sort();
        tracing::info!(
            count = expired.len(),
            idle_threshold_secs = threshold.as_secs(),
            tools = ?expired,
            "deactivated idle tools"
        );
        self.emit(Vec::new(), expired.clone(), ChangeReason::IdleExpired);
        expired
    }

    /// Run [`sweep`](Self::sweep) every sweep interval until `cancel` fires.
    /// A zero interval leaves sweeping to explicit [`sweep`](Self::sweep)
    /// calls.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if manager.sweep_interval.is_zero() {
                tracing::debug!("tool sweeper disabled by zero interval");
                cancel.cancelled().await;
                return;
            }
            let mut ticker = tokio::time::interval(manager.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.sweep();
                    }
                    _ = cancel.cancelled() => {
                        tracing::debug!("tool sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn is_active(&self, name: &str) -> bool {
        self.active.lock().contains_key(&name.to_ascii_lowercase())
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Snapshot of the active table, sorted by name.
    pub fn active_tools(&self) -> Vec<ActiveToolInfo> {
        let now = Instant::now();
        let mut tools: Vec<ActiveToolInfo> = self
            .active
            .lock()
            .iter()
            .map(|(name, e)| ActiveToolInfo {
                name: name.clone(),
                category: e.descriptor.category.clone(),
                registered_at: e.registered_at,
                idle: now.saturating_duration_since(e.last_used),
                use_count: e.use_count,
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    fn emit(&self, activated: Vec<String>, deactivated: Vec<String>, reason: ChangeReason) {
        let _ = self.events.send(LifecycleEvent::ToolsChanged {
            activated,
            deactivated,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eb_bridge::CallOptions;

    struct NullHost;

    #[async_trait]
    impl HostCaller for NullHost {
        async fn call_host(
            &self,
            _method: &str,
            _params: Map<String, Value>,
            _opts: CallOptions,
        ) -> Result<HostResponse, BridgeError> {
            Ok(HostResponse::default())
        }
    }

    const IDLE: Duration = Duration::from_secs(300);

    fn manager() -> LifecycleManager {
        let registry = ToolRegistry::new();
        for name in ["create_ui_button", "create_ui_text"] {
            registry.register(ToolDescriptor::new(name, "ui"));
        }
        registry.register(ToolDescriptor::new("create_material", "material"));
        LifecycleManager::with_timing(
            Arc::new(registry),
            Arc::new(NullHost),
            IDLE,
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn activation_partitions_new_and_existing() {
        let mgr = manager();
        let first = mgr.activate_category("ui");
        assert_eq!(first.newly_activated, vec!["create_ui_button", "create_ui_text"]);
        assert!(first.already_active.is_empty());

        let second = mgr.activate_category("UI");
        assert!(second.newly_activated.is_empty());
        assert_eq!(second.already_active.len(), 2);
        assert_eq!(mgr.active_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sweep_interval_disables_background_sweeper() {
        let registry = ToolRegistry::new();
        registry.register(ToolDescriptor::new("create_ui_text", "ui"));
        let mgr = Arc::new(LifecycleManager::with_timing(
            Arc::new(registry),
            Arc::new(NullHost),
            IDLE,
            Duration::ZERO,
        ));
        mgr.activate_category("ui");
        let cancel = CancellationToken::new();
        let sweeper = mgr.spawn_sweeper(cancel.clone());

        tokio::time::sleep(IDLE * 2).await;
        assert!(mgr.is_active("create_ui_text"));

        cancel.cancel();
        sweeper.await.unwrap();
        assert_eq!(mgr.sweep(), vec!["create_ui_text"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_category_activates_nothing() {
        let mgr = manager();
        let mut events = mgr.subscribe();
        let act = mgr.activate_category("physics");
        assert!(act.newly_activated.is_empty() && act.already_active.is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_tool_expires_after_threshold() {
        let mgr = manager();
        mgr.activate_category("ui");
        let t0 = Instant::now();

        assert!(mgr.sweep_at(t0 + IDLE).is_empty(), "exactly the threshold is not idle beyond it");
        let expired = mgr.sweep_at(t0 + IDLE + Duration::from_millis(1));
        assert_eq!(expired, vec!["create_ui_button", "create_ui_text"]);
        assert_eq!(mgr.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn usage_resets_idle_clock() {
        let mgr = manager();
        mgr.activate_category("ui");

        tokio::time::advance(IDLE - Duration::from_secs(1)).await;
        assert!(mgr.record_usage("create_ui_button"));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(mgr.sweep(), vec!["create_ui_text"]);
        assert!(mgr.is_active("create_ui_button"));
        assert_eq!(mgr.active_tools()[0].use_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn record_usage_on_inactive_is_noop() {
        let mgr = manager();
        assert!(!mgr.record_usage("create_ui_button"));
        assert!(!mgr.is_active("create_ui_button"));
    }

    #[tokio::test(start_paused = true)]
    async fn reactivation_refreshes_instead_of_reinstantiating() {
        let mgr = manager();
        mgr.activate_category("ui");
        let registered = mgr.active_tools()[0].registered_at;

        tokio::time::advance(IDLE - Duration::from_secs(1)).await;
        mgr.activate_category("ui");
        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(mgr.sweep().is_empty());
        assert_eq!(mgr.active_tools()[0].registered_at, registered);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_batch_emits_one_event() {
        let mgr = manager();
        mgr.activate_category("ui");
        mgr.activate_category("material");
        let mut events = mgr.subscribe();

        tokio::time::advance(IDLE + Duration::from_secs(1)).await;
        mgr.sweep();

        match events.try_recv().unwrap() {
            LifecycleEvent::ToolsChanged {
                activated,
                deactivated,
                reason,
            } => {
                assert!(activated.is_empty());
                assert_eq!(deactivated.len(), 3);
                assert_eq!(reason, ChangeReason::IdleExpired);
            }
        }
        assert!(events.try_recv().is_err());

        // Nothing left: an empty sweep is silent.
        mgr.sweep();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deactivate_category_ignores_idle_time() {
        let mgr = manager();
        mgr.activate_category("ui");
        mgr.activate_category("material");
        let mut events = mgr.subscribe();

        assert_eq!(
            mgr.deactivate_category("ui"),
            vec!["create_ui_button", "create_ui_text"]
        );
        assert!(mgr.is_active("create_material"));
        assert!(matches!(
            events.try_recv().unwrap(),
            LifecycleEvent::ToolsChanged {
                reason: ChangeReason::Deactivated,
                ..
            }
        ));
        assert!(mgr.deactivate_category("ui").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_and_stops_on_cancel() {
        let mgr = Arc::new(manager());
        mgr.activate_category("ui");
        let cancel = CancellationToken::new();
        let handle = mgr.spawn_sweeper(cancel.clone());

        // Sweeps at 60s intervals; the first one past 300s catches the tools.
        tokio::time::sleep(Duration::from_secs(361)).await;
        assert_eq!(mgr.active_count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_active_requires_activation() {
        let mgr = manager();
        let err = mgr
            .invoke_active("create_ui_button", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownTool(_)));

        mgr.activate_category("ui");
        mgr.invoke_active("create_ui_button", Map::new()).await.unwrap();
        assert_eq!(mgr.active_tools()[0].use_count, 1);
    }
}
