use web_time::Instant;

use laterano_core::{Component, ComponentStats};

/// Smoothing factor for the flush-time moving average.
const EMA_ALPHA: f32 = 0.2;

pub struct Hud {
    pub enabled: bool,
    frame_count: u64,
    flush_count: u64,
    flush_ms_smooth: f32,
    pub metrics: Option<Metrics>,
}

impl Default for Hud {
    fn default() -> Self {
        Self::new()
    }
}

impl Hud {
    pub fn new() -> Self {
        Self {
            enabled: false,
            frame_count: 0,
            flush_count: 0,
            flush_ms_smooth: 0.0,
            metrics: None,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn frames(&self) -> u64 {
        self.frame_count
    }

    pub fn flushes(&self) -> u64 {
        self.flush_count
    }

    pub fn flush_ms(&self) -> f32 {
        self.flush_ms_smooth
    }

    /// Records one frame. `flush_ms` is `Some` when the frame re-rendered
    /// anything.
    pub fn record(&mut self, flush_ms: Option<f32>, stats: ComponentStats) {
        self.frame_count += 1;
        if let Some(ms) = flush_ms {
            self.flush_count += 1;
            // simple EMA
            self.flush_ms_smooth = if self.flush_count == 1 {
                ms
            } else {
                (1.0 - EMA_ALPHA) * self.flush_ms_smooth + EMA_ALPHA * ms
            };
        }
        self.metrics = Some(Metrics::from(stats));
    }

    pub fn line(&self) -> String {
        let mut parts = vec![
            format!("frame: {}", self.frame_count),
            format!("flushes: {}", self.flush_count),
            format!("flush: {:.2} ms", self.flush_ms_smooth),
        ];
        if let Some(m) = &self.metrics {
            parts.push(format!(
                "bindings: {} text / {} attr / {} if / {} connect",
                m.text_bindings, m.attribute_bindings, m.conditionals, m.connects
            ));
            parts.push(format!("lists: {} ({} items)", m.lists, m.list_items));
            parts.push(format!("pending: {}", m.pending));
        }
        parts.join("  |  ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Metrics {
    pub text_bindings: usize,
    pub attribute_bindings: usize,
    pub conditionals: usize,
    pub connects: usize,
    pub lists: usize,
    pub list_items: usize,
    pub ledger_edges: usize,
    pub pending: usize,
    pub rerenders: u64,
}

impl From<ComponentStats> for Metrics {
    fn from(s: ComponentStats) -> Self {
        Self {
            text_bindings: s.text_bindings,
            attribute_bindings: s.attribute_bindings,
            conditionals: s.conditionals,
            connects: s.connects,
            lists: s.lists,
            list_items: s.list_items,
            ledger_edges: s.ledger_edges,
            pending: s.pending,
            rerenders: s.rerenders,
        }
    }
}

/// Drives a component's frames and keeps a [`Hud`] up to date.
pub struct Inspector {
    pub hud: Hud,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self { hud: Hud::new() }
    }

    /// Runs one [`Component::tick`], timing it. Returns the number of
    /// elements re-rendered.
    pub fn frame(&mut self, component: &Component) -> usize {
        let start = Instant::now();
        let rendered = component.tick();
        let flush_ms = (rendered > 0).then(|| start.elapsed().as_secs_f32() * 1000.0);
        self.hud.record(flush_ms, component.stats());
        if self.hud.enabled {
            log::info!(target: "laterano::hud", "<{}> {}", component.tag(), self.hud.line());
        }
        rendered
    }

    /// Current metrics as JSON, for dumping to a file or a debug endpoint.
    pub fn metrics_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.hud.metrics).unwrap_or(serde_json::Value::Null)
    }
}
