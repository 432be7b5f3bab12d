//! Recording stubs for the control-plane ports.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tailswan_core::{
    ControlError, IpsecControl, JsonMap, MeshControl, MeshStatus, MeshUpOptions, ServeConfig,
};

/// IPsec stub that records every call and can fail chosen initiations.
#[derive(Default)]
pub struct RecordingIpsec {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    generation: AtomicU64,
    sa_failures_left: AtomicUsize,
    sa_fetches: AtomicUsize,
}

impl RecordingIpsec {
    /// SA listings fail `count` times before succeeding.
    pub fn with_failing_sa_listings(count: usize) -> Self {
        Self {
            sa_failures_left: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub fn sa_fetches(&self) -> usize {
        self.sa_fetches.load(Ordering::SeqCst)
    }

    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// A listing that differs on every call.
    fn next_listing(&self, kind: &str) -> Vec<JsonMap> {
        let n = self.generation.fetch_add(1, Ordering::SeqCst);
        let mut map = JsonMap::new();
        map.insert(kind.to_string(), json!({ "generation": n }));
        vec![map]
    }
}

#[async_trait]
impl IpsecControl for RecordingIpsec {
    async fn list_sas(&self) -> Result<Vec<JsonMap>, ControlError> {
        self.sa_fetches.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .sa_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ControlError::command("swanctl --list-sas", "connection refused"));
        }
        Ok(self.next_listing("sa"))
    }

    async fn list_connections(&self) -> Result<Vec<JsonMap>, ControlError> {
        Ok(self.next_listing("conn"))
    }

    async fn initiate(&self, name: &str) -> Result<(), ControlError> {
        self.record(format!("initiate:{name}"));
        if self.failing.contains(name) {
            return Err(ControlError::command(
                format!("swanctl --initiate --child {name}"),
                "no config",
            ));
        }
        Ok(())
    }

    async fn terminate(&self, name: &str) -> Result<(), ControlError> {
        self.record(format!("terminate:{name}"));
        Ok(())
    }

    async fn load_config(&self, path: &Path) -> Result<(), ControlError> {
        self.record(format!("load_config:{}", path.display()));
        Ok(())
    }
}

/// Mesh call that a [`RecordingMesh`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshStep {
    Status,
    Up,
    SetServeConfig,
}

/// Mesh stub that records every call; peers change on every status call.
#[derive(Default)]
pub struct RecordingMesh {
    calls: Mutex<Vec<String>>,
    serve: Mutex<Option<ServeConfig>>,
    generation: AtomicU64,
    failing: Option<MeshStep>,
}

impl RecordingMesh {
    /// Every call to `step` fails.
    pub fn failing_at(step: MeshStep) -> Self {
        Self {
            failing: Some(step),
            ..Self::default()
        }
    }

    fn check(&self, step: MeshStep) -> Result<(), ControlError> {
        if self.failing == Some(step) {
            return Err(ControlError::command(
                format!("tailscale {step:?}"),
                "backend error",
            ));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn applied_serve_config(&self) -> Option<ServeConfig> {
        self.serve.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl MeshControl for RecordingMesh {
    async fn status(&self) -> Result<MeshStatus, ControlError> {
        self.record("status");
        self.check(MeshStep::Status)?;
        let n = self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(MeshStatus {
            backend_state: format!("Running-{n}"),
            ..MeshStatus::default()
        })
    }

    async fn up(&self, options: &MeshUpOptions) -> Result<(), ControlError> {
        self.record(&format!("up:{}", options.hostname));
        self.check(MeshStep::Up)
    }

    async fn set_serve_config(&self, config: &ServeConfig) -> Result<(), ControlError> {
        self.record("set_serve_config");
        self.check(MeshStep::SetServeConfig)?;
        *self.serve.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn serve_config(&self) -> Result<Option<ServeConfig>, ControlError> {
        self.record("serve_config");
        Ok(self.serve.lock().unwrap().clone())
    }
}
