use std::collections::HashMap;

use hydros_protocol::*;

use crate::agent::SimAgent;
use crate::base::AgentCore;
use crate::error::AgentError;

/// Boundary-condition series received through data updates, keyed by
/// `(object_id, metrics_code)`. A newer series for the same key replaces
/// the older one.
#[derive(Debug, Clone, Default)]
pub struct BoundaryCache {
    series: HashMap<(i64, String), ObjectTimeSeries>,
    current_step: i64,
}

impl BoundaryCache {
    pub fn update(&mut self, updated: &[ObjectTimeSeries]) {
        for series in updated {
            match (series.object_id, series.metrics_code.as_deref()) {
                (Some(object_id), Some(metrics_code)) => {
                    tracing::debug!(
                        object_id,
                        metrics_code,
                        values = series.time_series.len(),
                        "Updated boundary series"
                    );
                    self.series
                        .insert((object_id, metrics_code.to_string()), series.clone());
                }
                _ => tracing::warn!(
                    name = ?series.time_series_name,
                    "Ignoring series without object id or metrics code"
                ),
            }
        }
    }

    pub fn series(&self, object_id: i64, metrics_code: &str) -> Option<&ObjectTimeSeries> {
        self.series.get(&(object_id, metrics_code.to_string()))
    }

    /// Cached value at `step`, defaulting to the current step. Absent data
    /// is `None`, not an error.
    pub fn get_time_series_value(&self, object_id: i64, metrics_code: &str, step: Option<i64>) -> Option<f64> {
        self.series(object_id, metrics_code)?
            .value_at(step.unwrap_or(self.current_step))
    }

    pub fn current_step(&self) -> i64 {
        self.current_step
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// What a tick-driven model sees on each step.
pub struct TickContext<'a> {
    pub core: &'a AgentCore,
    pub request: &'a TickRequest,
    pub boundary: &'a BoundaryCache,
}

impl TickContext<'_> {
    pub fn step(&self) -> i64 {
        self.request.step
    }

    /// Boundary value for the current step.
    pub fn boundary_value(&self, object_id: i64, metrics_code: &str) -> Option<f64> {
        self.boundary.get_time_series_value(object_id, metrics_code, None)
    }
}

/// The per-step model of a tick-driven agent.
pub trait TickStep: Send + 'static {
    fn on_init(&mut self, _core: &AgentCore, _request: &TaskInitRequest) -> Result<(), AgentError> {
        Ok(())
    }

    /// Compute one step; returned series are the step's output metrics.
    fn on_tick_simulation(&mut self, tick: &TickContext<'_>) -> Result<Vec<ObjectTimeSeries>, AgentError>;

    fn on_boundary_condition_update(&mut self, _updated: &[ObjectTimeSeries]) -> Result<(), AgentError> {
        Ok(())
    }

    /// Receives each successful step's output. The tick response carries no
    /// series, so this is where metrics are published, e.g. through
    /// [`AgentCore::send`].
    fn on_step_output(&mut self, _core: &AgentCore, _step: i64, _output: &[ObjectTimeSeries]) -> Result<(), AgentError> {
        Ok(())
    }

    fn on_terminate(&mut self, _core: &AgentCore) -> Result<(), AgentError> {
        Ok(())
    }

    fn managed_top_objects(&self) -> Vec<TopHydroObject> {
        Vec::new()
    }
}

/// SIM_TICK_DRIVEN agent: answers every tick with one step of its model
/// and caches boundary data between ticks.
pub struct TickableAgent<S> {
    core: AgentCore,
    model: S,
    boundary: BoundaryCache,
    last_output: Vec<ObjectTimeSeries>,
}

impl<S: TickStep> TickableAgent<S> {
    pub fn new(core: AgentCore, model: S) -> Self {
        Self {
            core,
            model,
            boundary: BoundaryCache::default(),
            last_output: Vec::new(),
        }
    }

    pub fn model(&self) -> &S {
        &self.model
    }

    pub fn boundary(&self) -> &BoundaryCache {
        &self.boundary
    }

    pub fn current_step(&self) -> i64 {
        self.boundary.current_step
    }

    /// Output of the most recent successful step, as also handed to
    /// [`TickStep::on_step_output`].
    pub fn last_output(&self) -> &[ObjectTimeSeries] {
        &self.last_output
    }

    pub fn get_time_series_value(&self, object_id: i64, metrics_code: &str, step: Option<i64>) -> Option<f64> {
        self.boundary.get_time_series_value(object_id, metrics_code, step)
    }
}

impl<S: TickStep> SimAgent for TickableAgent<S> {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_init(&mut self, request: &TaskInitRequest) -> Result<(), AgentError> {
        self.model.on_init(&self.core, request)
    }

    fn on_tick(&mut self, request: &TickRequest) -> Result<(), AgentError> {
        self.boundary.current_step = request.step;
        let tick = TickContext {
            core: &self.core,
            request,
            boundary: &self.boundary,
        };
        let output = self.model.on_tick_simulation(&tick)?;
        tracing::info!(
            agent_id = %self.core.agent_id(),
            step = request.step,
            series = output.len(),
            "Simulation step complete"
        );
        self.last_output = output;
        self.model.on_step_output(&self.core, request.step, &self.last_output)
    }

    fn on_terminate(&mut self, _request: &TerminateRequest) -> Result<(), AgentError> {
        self.model.on_terminate(&self.core)
    }

    fn on_time_series_data_update(&mut self, request: &TimeSeriesDataUpdateRequest) -> Result<(), AgentError> {
        let updated = &request.time_series_data_changed_event.object_time_series;
        self.boundary.update(updated);
        self.model.on_boundary_condition_update(updated)
    }

    fn managed_top_objects(&self) -> Vec<TopHydroObject> {
        self.model.managed_top_objects()
    }
}
