//! WASM bindings for Breadboard Core.
//!
//! Requests and results cross the boundary as JSON strings so the game UI
//! can build them with plain objects.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmSimulator, simulate_json } from 'breadboard_core';
//!
//! await init();
//!
//! const request = {
//!   analysis: { type: 'operating_point' },
//!   netlist: {
//!     title: 'divider',
//!     elements: [
//!       { id: 'V1', element_type: 'VoltageSource', nodes: ['in', '0'], value: 5 },
//!       { id: 'R1', element_type: 'Resistor', nodes: ['in', 'out'], value: 1000 },
//!       { id: 'R2', element_type: 'Resistor', nodes: ['out', '0'], value: 2000 },
//!     ],
//!     probes: [{ id: 'vout', kind: 'Voltage', target: 'out' }],
//!   },
//! };
//!
//! const sim = new WasmSimulator();
//! const result = JSON.parse(sim.run(JSON.stringify(request)));
//! ```

use wasm_bindgen::prelude::*;

use crate::analysis::{CancellationToken, SimulationRequest, Simulator};
use crate::error::CircuitError;
use crate::results::SimulationResult;
use crate::solver::SolverConfig;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_json(result: &SimulationResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| format!(r#"{{"status":"Error","message":"{e}"}}"#))
}

fn run_json(simulator: &Simulator, request_json: &str) -> String {
    let result = match serde_json::from_str::<SimulationRequest>(request_json) {
        Ok(request) => simulator.run(&request, &CancellationToken::new()),
        Err(e) => SimulationResult::from_error(&CircuitError::from(e)),
    };
    to_json(&result)
}

/// Run one JSON request with default solver settings and return the JSON result.
#[wasm_bindgen]
pub fn simulate_json(request_json: &str) -> String {
    run_json(&Simulator::new(), request_json)
}

/// Simulator with solver settings fixed at construction.
#[wasm_bindgen]
pub struct WasmSimulator {
    config: SolverConfig,
}

#[wasm_bindgen]
impl WasmSimulator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmSimulator {
        WasmSimulator {
            config: SolverConfig::default(),
        }
    }

    /// Create a simulator with a custom iteration cap and relative tolerance.
    ///
    /// # Arguments
    /// * `max_iterations` - Newton-Raphson iteration cap for DC solves (default: 100)
    /// * `reltol` - Relative convergence tolerance (default: 1e-3)
    #[wasm_bindgen]
    pub fn with_config(max_iterations: usize, reltol: f64) -> Result<WasmSimulator, JsValue> {
        let config = SolverConfig::default()
            .with_max_iterations(max_iterations)
            .with_reltol(reltol);
        config.validate().map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmSimulator { config })
    }

    /// Run a JSON request. Requests carrying their own solver settings keep them.
    #[wasm_bindgen]
    pub fn run(&self, request_json: &str) -> String {
        run_json(&Simulator::with_config(self.config.clone()), request_json)
    }

    #[wasm_bindgen(getter)]
    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    #[wasm_bindgen(getter)]
    pub fn reltol(&self) -> f64 {
        self.config.reltol
    }
}

impl Default for WasmSimulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
