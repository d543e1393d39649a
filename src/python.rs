//! Python bindings: JSON frame in, JSON report and input commands out

use pyo3::prelude::*;
use serde::Serialize;

use crate::config::PickupConfig;
use crate::driver::{TickDriver, TickReport};
use crate::types::InputCommand;
use crate::world::{FrameSnapshot, RecordedInput};

fn runtime_err(e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string())
}

#[derive(Serialize)]
struct TickResponse {
    #[serde(flatten)]
    report: TickReport,
    commands: Vec<InputCommand>,
}

/// Pickup agent driven one host frame at a time
#[pyclass(name = "PickupAgent")]
struct PickupAgent {
    driver: TickDriver,
}

#[pymethods]
impl PickupAgent {
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(raw) => PickupConfig::from_json(raw).map_err(runtime_err)?,
            None => PickupConfig::default(),
        };
        Ok(Self {
            driver: TickDriver::new(config),
        })
    }

    /// Run one tick; the caller replays the returned `commands` in order
    fn tick(&mut self, frame_json: &str) -> PyResult<String> {
        let frame = FrameSnapshot::from_json(frame_json).map_err(runtime_err)?;
        let mut input = RecordedInput::new();
        let report = self.driver.tick(frame.now(), frame.keys, &frame, &mut input);

        let response = TickResponse {
            report,
            commands: input.take(),
        };
        serde_json::to_string(&response).map_err(runtime_err)
    }

    fn handle_event(&mut self, event_id: &str) -> bool {
        self.driver.handle_event(event_id)
    }

    fn set_weight(&mut self, path: String, weight: i32) {
        self.driver.weights_mut().set(path, weight);
    }

    fn set_extra_delay(&mut self, ms: u64) -> PyResult<()> {
        self.driver.set_extra_delay(ms).map_err(runtime_err)
    }

    /// Call before the host reloads the plugin
    fn shutdown(&mut self) {
        self.driver.shutdown();
    }

    #[getter]
    fn active(&self) -> bool {
        self.driver.is_active()
    }
}

/// Route `tracing` output to stderr
#[pyfunction]
#[pyo3(signature = (filter=None))]
fn init_logging(filter: Option<&str>) -> PyResult<()> {
    crate::logging::init_tracing(filter.unwrap_or("info")).map_err(runtime_err)
}

/// Python module definition
#[pymodule]
fn pickup_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PickupAgent>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
