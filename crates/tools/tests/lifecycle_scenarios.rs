//! Lifecycle scenarios against a recording host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eb_bridge::{BridgeError, CallOptions, HostCaller, HostResponse};
use eb_tools::{
    register_builtin_tools, ChangeReason, LifecycleEvent, LifecycleManager, ToolRegistry,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Answers every call with a fresh `instanceId` and records what it saw.
#[derive(Default)]
struct RecordingHost {
    calls: Mutex<Vec<(String, Map<String, Value>, CallOptions)>>,
    next_id: AtomicU64,
}

impl RecordingHost {
    fn calls(&self) -> Vec<(String, Map<String, Value>, CallOptions)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HostCaller for RecordingHost {
    async fn call_host(
        &self,
        method: &str,
        params: Map<String, Value>,
        opts: CallOptions,
    ) -> Result<HostResponse, BridgeError> {
        self.calls.lock().push((method.to_string(), params, opts));
        if method == "find_gameobject" {
            return Err(BridgeError::HostError {
                message: "GameObject not found".into(),
                kind: Some("not_found".into()),
            });
        }
        let id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut fields = Map::new();
        fields.insert("instanceId".into(), json!(id));
        Ok(HostResponse {
            message: Some(format!("{method} ok")),
            fields,
        })
    }
}

const IDLE: Duration = Duration::from_secs(300);
const SWEEP: Duration = Duration::from_secs(60);

fn setup() -> (Arc<LifecycleManager>, Arc<RecordingHost>) {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);
    let host = Arc::new(RecordingHost::default());
    let manager = LifecycleManager::with_timing(Arc::new(registry), host.clone(), IDLE, SWEEP);
    (Arc::new(manager), host)
}

fn params(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn ui_category_activate_use_expire_then_direct_call() {
    let (manager, host) = setup();
    let cancel = CancellationToken::new();
    let sweeper = manager.spawn_sweeper(cancel.clone());
    let mut events = manager.subscribe();

    let activation = manager.activate_category("ui");
    assert_eq!(activation.newly_activated.len(), 5);
    assert!(activation.already_active.is_empty());

    let resp = manager
        .invoke_active("create_ui_button", params(json!({ "buttonText": "Go" })))
        .await
        .unwrap();
    assert!(resp.fields["instanceId"].is_u64());

    // Idle past the threshold; the next sweep removes all five.
    tokio::time::sleep(IDLE + SWEEP + Duration::from_secs(1)).await;
    assert_eq!(manager.active_count(), 0);

    match events.recv().await.unwrap() {
        LifecycleEvent::ToolsChanged { activated, reason, .. } => {
            assert_eq!(reason, ChangeReason::Activated);
            assert_eq!(activated.len(), 5);
        }
    }
    match events.recv().await.unwrap() {
        LifecycleEvent::ToolsChanged {
            deactivated,
            reason,
            ..
        } => {
            assert_eq!(reason, ChangeReason::IdleExpired);
            assert_eq!(deactivated.len(), 5);
        }
    }

    // Zero-registration path still works without re-activation.
    let resp = manager
        .invoke_direct("create_ui_button", params(json!({ "buttonText": "Again" })))
        .await
        .unwrap();
    assert!(resp.fields["instanceId"].is_u64());
    assert!(!manager.is_active("create_ui_button"));
    assert_eq!(host.calls().len(), 2);

    cancel.cancel();
    sweeper.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_fails_without_host_traffic() {
    let (manager, host) = setup();
    let err = manager
        .invoke_direct("launch_rockets", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownTool(ref n) if n == "launch_rockets"));
    assert!(host.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn direct_call_normalizes_keys_and_passes_idempotency() {
    let (manager, host) = setup();

    manager
        .invoke_direct(
            "create_ui_button",
            params(json!({ "button_text": "Go", "ParentPath": "Canvas", "extra": 1 })),
        )
        .await
        .unwrap();
    manager
        .invoke_direct("get_scene_info", params(json!({ "include_hierarchy": true })))
        .await
        .unwrap();

    let calls = host.calls();
    let (method, sent, opts) = &calls[0];
    assert_eq!(method, "create_ui_button");
    assert_eq!(
        Value::Object(sent.clone()),
        json!({ "buttonText": "Go", "parentPath": "Canvas", "extra": 1 })
    );
    assert!(!opts.idempotent);

    let (_, sent, opts) = &calls[1];
    assert_eq!(sent["includeHierarchy"], json!(true));
    assert!(opts.idempotent);
}

#[tokio::test(start_paused = true)]
async fn direct_call_refreshes_active_entry() {
    let (manager, _host) = setup();
    manager.activate_category("ui");

    tokio::time::advance(IDLE - Duration::from_secs(10)).await;
    manager
        .invoke_direct("create_ui_button", params(json!({ "buttonText": "Go" })))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(20)).await;

    let expired = manager.sweep();
    assert_eq!(expired.len(), 4);
    assert!(manager.is_active("create_ui_button"));
}

#[tokio::test(start_paused = true)]
async fn failed_call_does_not_refresh() {
    let (manager, _host) = setup();
    manager.activate_category("gameobject");

    tokio::time::advance(IDLE - Duration::from_secs(10)).await;
    let err = manager
        .invoke_direct("find_gameobject", params(json!({ "name": "Player" })))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::HostError { .. }));
    tokio::time::advance(Duration::from_secs(20)).await;

    assert!(manager.sweep().contains(&"find_gameobject".to_string()));
}

/// Parks every call until released, so a test can act while it is in flight.
#[derive(Default)]
struct GatedHost {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl HostCaller for GatedHost {
    async fn call_host(
        &self,
        method: &str,
        _params: Map<String, Value>,
        _opts: CallOptions,
    ) -> Result<HostResponse, BridgeError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(HostResponse {
            message: Some(format!("{method} ok")),
            fields: Map::new(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn sweep_during_call_keeps_running_handler_and_removes_entry() {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry);
    let host = Arc::new(GatedHost::default());
    let manager = Arc::new(LifecycleManager::with_timing(
        Arc::new(registry),
        host.clone(),
        IDLE,
        SWEEP,
    ));
    manager.activate_category("ui");
    tokio::time::advance(IDLE + Duration::from_secs(1)).await;

    let m = manager.clone();
    let call = tokio::spawn(async move {
        m.invoke_active("create_ui_text", params(json!({ "text": "hi" })))
            .await
    });
    host.entered.notified().await;

    let swept = manager.sweep();
    assert!(swept.contains(&"create_ui_text".to_string()));
    assert!(!manager.is_active("create_ui_text"));

    host.release.notify_one();
    let resp = call.await.unwrap().unwrap();
    assert_eq!(resp.message.as_deref(), Some("create_ui_text ok"));

    // Completion must not resurrect the swept entry.
    assert!(!manager.is_active("create_ui_text"));
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn catalog_covers_builtin_categories() {
    let (manager, _host) = setup();
    let catalog = manager.registry().catalog();
    let ui = catalog.iter().find(|c| c.category == "ui").unwrap();
    assert_eq!(ui.tools.len(), 5);
    let button = ui.tools.iter().find(|t| t.name == "create_ui_button").unwrap();
    assert_eq!(button.parameters["required"], json!(["buttonText"]));
}
