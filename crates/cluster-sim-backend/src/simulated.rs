//! In-memory container backend.
//!
//! Units live in a map guarded by a `parking_lot` mutex. Faults can be
//! injected per unit so callers can exercise crash, stall and refusal paths
//! without a real container runtime.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use cluster_sim_core::{CpuSpec, NodeId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{BackendError, ContainerBackend, Result};

/// Number of calls made to each backend operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `provision` calls.
    pub provision: u32,
    /// `start` calls.
    pub start: u32,
    /// `stop` calls.
    pub stop: u32,
    /// `inspect` calls.
    pub inspect: u32,
    /// `destroy` calls.
    pub destroy: u32,
}

/// A backend that keeps its units in memory.
#[derive(Default)]
pub struct SimulatedBackend {
    inner: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    units: HashMap<NodeId, SimUnit>,
    faults: Faults,
    calls: CallCounts,
}

struct SimUnit {
    spec: CpuSpec,
    running: bool,
}

#[derive(Default)]
struct Faults {
    fail_next_provision: bool,
    fail_start: HashSet<NodeId>,
    fail_destroy: HashSet<NodeId>,
    /// Remaining inspect failures per unit.
    fail_inspect: HashMap<NodeId, u32>,
}

impl SimulatedBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.inner.lock().units.len()
    }

    /// Whether a unit exists.
    #[must_use]
    pub fn contains(&self, unit: &NodeId) -> bool {
        self.inner.lock().units.contains_key(unit)
    }

    /// Running flag of a unit, if it exists.
    #[must_use]
    pub fn is_running(&self, unit: &NodeId) -> Option<bool> {
        self.inner.lock().units.get(unit).map(|u| u.running)
    }

    /// CPU spec a unit was provisioned with.
    #[must_use]
    pub fn spec(&self, unit: &NodeId) -> Option<CpuSpec> {
        self.inner.lock().units.get(unit).map(|u| u.spec)
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.inner.lock().calls
    }

    /// Make a unit vanish, as if its container crashed and was reaped.
    ///
    /// Later inspects and stops fail with `UnitNotFound`.
    pub fn crash(&self, unit: &NodeId) {
        if self.inner.lock().units.remove(unit).is_some() {
            info!(unit = %unit, "Simulated unit crash");
        }
    }

    /// Flip a unit's running flag without going through `start`/`stop`.
    pub fn set_running(&self, unit: &NodeId, running: bool) {
        if let Some(u) = self.inner.lock().units.get_mut(unit) {
            u.running = running;
        }
    }

    /// Make the next `provision` call fail.
    pub fn fail_next_provision(&self) {
        self.inner.lock().faults.fail_next_provision = true;
    }

    /// Make `start` fail for a unit until cleared.
    pub fn fail_start(&self, unit: &NodeId, fail: bool) {
        toggle(&mut self.inner.lock().faults.fail_start, unit, fail);
    }

    /// Make `destroy` fail for a unit until cleared.
    pub fn fail_destroy(&self, unit: &NodeId, fail: bool) {
        toggle(&mut self.inner.lock().faults.fail_destroy, unit, fail);
    }

    /// Make the next `times` inspects of a unit fail as unreachable.
    ///
    /// Passing `u32::MAX` makes every inspect fail; `0` clears the fault.
    pub fn fail_inspect(&self, unit: &NodeId, times: u32) {
        let mut inner = self.inner.lock();
        if times == 0 {
            inner.faults.fail_inspect.remove(unit);
        } else {
            inner.faults.fail_inspect.insert(unit.clone(), times);
        }
    }
}

fn toggle(set: &mut HashSet<NodeId>, unit: &NodeId, on: bool) {
    if on {
        set.insert(unit.clone());
    } else {
        set.remove(unit);
    }
}

#[async_trait]
impl ContainerBackend for SimulatedBackend {
    async fn provision(&self, spec: &CpuSpec) -> Result<NodeId> {
        let mut inner = self.inner.lock();
        inner.calls.provision += 1;

        if std::mem::take(&mut inner.faults.fail_next_provision) {
            return Err(BackendError::operation(
                "provision",
                "",
                "injected provisioning failure",
            ));
        }

        let unit = NodeId::new(format!("node_container_{}", uuid::Uuid::new_v4()))
            .map_err(|e| BackendError::operation("provision", "", e.to_string()))?;
        inner.units.insert(
            unit.clone(),
            SimUnit {
                spec: *spec,
                running: false,
            },
        );

        debug!(unit = %unit, cpus = spec.cpus, "Provisioned simulated unit");
        Ok(unit)
    }

    async fn start(&self, unit: &NodeId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.start += 1;

        if inner.faults.fail_start.contains(unit) {
            return Err(BackendError::operation(
                "start",
                unit.as_str(),
                "injected start failure",
            ));
        }

        let u = inner
            .units
            .get_mut(unit)
            .ok_or_else(|| BackendError::UnitNotFound(unit.clone()))?;
        u.running = true;
        Ok(())
    }

    async fn stop(&self, unit: &NodeId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.stop += 1;

        let u = inner
            .units
            .get_mut(unit)
            .ok_or_else(|| BackendError::UnitNotFound(unit.clone()))?;
        u.running = false;
        Ok(())
    }

    async fn inspect(&self, unit: &NodeId) -> Result<bool> {
        let mut inner = self.inner.lock();
        inner.calls.inspect += 1;

        if let Some(remaining) = inner.faults.fail_inspect.get_mut(unit) {
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            if *remaining == 0 {
                inner.faults.fail_inspect.remove(unit);
            }
            return Err(BackendError::Unreachable(format!(
                "injected inspect failure for {unit}"
            )));
        }

        inner
            .units
            .get(unit)
            .map(|u| u.running)
            .ok_or_else(|| BackendError::UnitNotFound(unit.clone()))
    }

    async fn destroy(&self, unit: &NodeId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.destroy += 1;

        if inner.faults.fail_destroy.contains(unit) {
            return Err(BackendError::operation(
                "destroy",
                unit.as_str(),
                "injected destroy failure",
            ));
        }

        if inner.units.remove(unit).is_none() {
            debug!(unit = %unit, "Unit already absent, destroy is a no-op");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn running_unit(backend: &SimulatedBackend) -> NodeId {
        let unit = backend.provision(&CpuSpec::new(4)).await.unwrap();
        backend.start(&unit).await.unwrap();
        unit
    }

    #[tokio::test]
    async fn provision_start_inspect() {
        let backend = SimulatedBackend::new();
        let unit = backend.provision(&CpuSpec::new(4)).await.unwrap();

        assert!(unit.as_str().starts_with("node_container_"));
        assert_eq!(backend.spec(&unit), Some(CpuSpec::new(4)));
        assert!(!backend.inspect(&unit).await.unwrap());

        backend.start(&unit).await.unwrap();
        assert!(backend.inspect(&unit).await.unwrap());

        backend.stop(&unit).await.unwrap();
        assert!(!backend.inspect(&unit).await.unwrap());
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let backend = SimulatedBackend::new();
        let unit = running_unit(&backend).await;

        backend.destroy(&unit).await.unwrap();
        assert!(!backend.contains(&unit));
        backend.destroy(&unit).await.unwrap();

        let never_existed = NodeId::new("node_container_ghost").unwrap();
        backend.destroy(&never_existed).await.unwrap();
        assert_eq!(backend.calls().destroy, 3);
    }

    #[tokio::test]
    async fn crashed_unit_fails_inspect_and_stop() {
        let backend = SimulatedBackend::new();
        let unit = running_unit(&backend).await;

        backend.crash(&unit);

        assert!(matches!(
            backend.inspect(&unit).await,
            Err(BackendError::UnitNotFound(_))
        ));
        assert!(backend.stop(&unit).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_provision_failure_is_one_shot() {
        let backend = SimulatedBackend::new();
        backend.fail_next_provision();

        assert!(backend.provision(&CpuSpec::new(2)).await.is_err());
        assert_eq!(backend.unit_count(), 0);

        assert!(backend.provision(&CpuSpec::new(2)).await.is_ok());
        assert_eq!(backend.unit_count(), 1);
    }

    #[tokio::test]
    async fn inspect_failures_count_down() {
        let backend = SimulatedBackend::new();
        let unit = running_unit(&backend).await;

        backend.fail_inspect(&unit, 2);
        assert!(backend.inspect(&unit).await.is_err());
        assert!(backend.inspect(&unit).await.is_err());
        assert!(backend.inspect(&unit).await.unwrap());
    }

    #[tokio::test]
    async fn permanent_inspect_failure() {
        let backend = SimulatedBackend::new();
        let unit = running_unit(&backend).await;

        backend.fail_inspect(&unit, u32::MAX);
        for _ in 0..5 {
            assert!(backend.inspect(&unit).await.is_err());
        }

        backend.fail_inspect(&unit, 0);
        assert!(backend.inspect(&unit).await.unwrap());
    }

    #[tokio::test]
    async fn injected_start_and_destroy_failures() {
        let backend = SimulatedBackend::new();
        let unit = backend.provision(&CpuSpec::new(1)).await.unwrap();

        backend.fail_start(&unit, true);
        assert!(backend.start(&unit).await.is_err());
        backend.fail_start(&unit, false);
        backend.start(&unit).await.unwrap();

        backend.fail_destroy(&unit, true);
        assert!(backend.destroy(&unit).await.is_err());
        assert!(backend.contains(&unit));
    }
}
