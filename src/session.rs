//! One-run-at-a-time guard around the simulator.
//!
//! The game UI triggers simulations from several places. A session refuses
//! to start a second run while one is in flight instead of queueing it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::{AnalysisKind, CancellationToken, SimulationRequest, Simulator};
use crate::board::BoardState;
use crate::catalog::ComponentCatalog;
use crate::error::{CircuitError, Result};
use crate::netlist::{NetlistBuilder, ProbeDefinition};
use crate::results::SimulationResult;
use crate::solver::SolverConfig;

/// Serializes simulation runs. Clones share the same running flag.
#[derive(Debug, Clone, Default)]
pub struct SimulationSession {
    simulator: Simulator,
    running: Arc<AtomicBool>,
}

/// Held for the duration of a run; clears the running flag when dropped.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl SimulationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            simulator: Simulator::with_config(config),
            running: Arc::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the session. Fails with `SimulationAlreadyRunning` if taken.
    pub fn begin(&self) -> Result<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CircuitError::SimulationAlreadyRunning)?;
        Ok(RunGuard {
            running: Arc::clone(&self.running),
        })
    }

    /// Run a prepared request.
    pub fn run(&self, request: &SimulationRequest, cancel: &CancellationToken) -> Result<SimulationResult> {
        let _guard = self.begin().inspect_err(|_| {
            warn!("simulation requested while another is running");
        })?;
        Ok(self.simulator.run(request, cancel))
    }

    /// Build a netlist from the board and run `analysis` on it.
    ///
    /// Board translation failures (unknown definitions, too few pins)
    /// come back as an `InvalidCircuit` result rather than an error; only a
    /// busy session is an `Err`.
    pub fn run_board(
        &self,
        board: &BoardState,
        catalog: &dyn ComponentCatalog,
        probes: &[ProbeDefinition],
        analysis: AnalysisKind,
        cancel: &CancellationToken,
    ) -> Result<SimulationResult> {
        let _guard = self.begin()?;
        let netlist = match NetlistBuilder::new(catalog).convert(board, probes) {
            Ok(netlist) => netlist,
            Err(e) => {
                info!(error = %e, "board could not be converted");
                return Ok(SimulationResult::from_error(&e));
            }
        };
        let request = SimulationRequest::new(analysis, netlist);
        Ok(self.simulator.run(&request, cancel))
    }
}
