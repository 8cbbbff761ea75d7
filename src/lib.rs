#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod input;

use std::fmt;

use geom::{
    PolygonizeOptions, SplitDirection, TrimContext, TrimDiagnostics, TrimError, TrimTimingReport,
    polygonize,
};
use input::{SideOutput, TrimmedSurfaceInput};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Settings accepted by [`TrimEngine::set_context`]; missing fields keep defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct EngineConfig {
    context: TrimContext,
    polygonize: PolygonizeOptions,
}

#[derive(Debug, Serialize)]
struct MeshExport {
    positions: Vec<f64>,
    indices: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uvs: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    normals: Option<Vec<f64>>,
    leaf_count: usize,
    diagnostics: TrimDiagnostics,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<TrimTimingReport>,
}

#[derive(Debug, Serialize)]
struct SplitExport {
    parameter: f64,
    direction: SplitDirection,
    low: Option<SideOutput>,
    high: Option<SideOutput>,
    diagnostics: TrimDiagnostics,
}

/// Public entry point for JavaScript consumers.
#[wasm_bindgen]
pub struct TrimEngine {
    ctx: TrimContext,
    options: PolygonizeOptions,
}

impl Default for TrimEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl TrimEngine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> TrimEngine {
        TrimEngine {
            ctx: TrimContext::default(),
            options: PolygonizeOptions::default(),
        }
    }

    /// Replaces tolerances and polygonization settings.
    #[wasm_bindgen]
    pub fn set_context(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: EngineConfig = serde_wasm_bindgen::from_value(config).map_err(to_js_error)?;
        self.apply_config(config);
        Ok(())
    }

    /// Triangulates a trimmed surface into flat position/index buffers.
    #[wasm_bindgen]
    pub fn polygonize(&self, input: JsValue, flatness: f64) -> Result<JsValue, JsValue> {
        let input: TrimmedSurfaceInput = serde_wasm_bindgen::from_value(input).map_err(to_js_error)?;
        let export = self.polygonize_input(&input, flatness).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&export).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Splits a trimmed surface at `t` along `"u"` or `"v"`.
    #[wasm_bindgen]
    pub fn subdivide(&self, input: JsValue, t: f64, direction: &str) -> Result<JsValue, JsValue> {
        let direction: SplitDirection = direction.parse().map_err(to_js_error)?;
        let input: TrimmedSurfaceInput = serde_wasm_bindgen::from_value(input).map_err(to_js_error)?;
        let export = self.subdivide_input(&input, t, direction).map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&export).map_err(|err| JsError::new(&err.to_string()).into())
    }
}

impl TrimEngine {
    fn apply_config(&mut self, config: EngineConfig) {
        let hook = self.ctx.fatal_hook;
        self.ctx = config.context;
        self.ctx.fatal_hook = hook;
        self.options = config.polygonize;
    }

    fn polygonize_input(&self, input: &TrimmedSurfaceInput, flatness: f64) -> Result<MeshExport, TrimError> {
        if !(flatness.is_finite() && flatness > 0.0) {
            return Err(TrimError::InvalidGeometry(format!(
                "flatness must be a positive finite number, got {flatness}"
            )));
        }
        let (trimmed, mut diagnostics) = input.build(&self.ctx)?;
        let options = PolygonizeOptions {
            flatness,
            ..self.options
        };
        let result = polygonize(&trimmed, &options, &self.ctx)?;
        diagnostics.merge(&result.diagnostics);
        debug_log!(
            "polygonize: {} leaves, {} triangles",
            result.leaf_count,
            result.mesh.triangle_count()
        );

        let mesh = result.mesh;
        Ok(MeshExport {
            positions: mesh.positions_flat(),
            uvs: mesh.uvs_flat(),
            normals: mesh.normals_flat(),
            indices: mesh.indices,
            leaf_count: result.leaf_count,
            diagnostics,
            metrics: result.metrics,
        })
    }

    fn subdivide_input(
        &self,
        input: &TrimmedSurfaceInput,
        t: f64,
        direction: SplitDirection,
    ) -> Result<SplitExport, TrimError> {
        let (trimmed, mut diagnostics) = input.build(&self.ctx)?;
        let split = trimmed.subdivide(t, direction, &self.ctx)?;
        diagnostics.merge(&split.diagnostics);
        Ok(SplitExport {
            parameter: split.parameter,
            direction: split.direction,
            low: split.low.as_ref().map(|side| SideOutput::from_trimmed(side, &self.ctx)),
            high: split.high.as_ref().map(|side| SideOutput::from_trimmed(side, &self.ctx)),
            diagnostics,
        })
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CurveInput, SurfaceInput};

    fn disk_input() -> TrimmedSurfaceInput {
        TrimmedSurfaceInput {
            surface: SurfaceInput::Bilinear {
                corners: [
                    [0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0],
                    [0.0, 1.0, 0.0],
                    [1.0, 1.0, 0.0],
                ],
            },
            curves: vec![CurveInput::Circle {
                center: [0.5, 0.5],
                radius: 0.3,
            }],
        }
    }

    #[test]
    fn polygonize_exports_matching_buffers() {
        let engine = TrimEngine::new();
        let export = engine.polygonize_input(&disk_input(), 1e-2).unwrap();
        let vertices = export.positions.len() / 3;
        assert!(export.indices.len() >= 3);
        assert_eq!(export.indices.len() % 3, 0);
        assert!(export.indices.iter().all(|&i| (i as usize) < vertices));
        assert_eq!(export.uvs.as_ref().map(Vec::len), Some(vertices * 2));
        assert_eq!(export.normals.as_ref().map(Vec::len), Some(vertices * 3));
        assert!(export.diagnostics.loop_count >= 1);
    }

    #[test]
    fn polygonize_rejects_bad_flatness() {
        let engine = TrimEngine::new();
        assert!(matches!(
            engine.polygonize_input(&disk_input(), 0.0),
            Err(TrimError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn subdivide_reports_both_sides() {
        let engine = TrimEngine::new();
        let export = engine.subdivide_input(&disk_input(), 0.5, SplitDirection::U).unwrap();
        let low = export.low.unwrap();
        let high = export.high.unwrap();
        assert_eq!(low.domain, [0.0, 0.5, 0.0, 1.0]);
        assert_eq!(high.domain, [0.5, 1.0, 0.0, 1.0]);
        assert_eq!(low.loops.len(), 1);
        assert_eq!(high.loops.len(), 1);
        assert!(low.loops[0].iter().all(|p| p[0] <= 0.5));
    }

    #[test]
    fn config_keeps_installed_hook() {
        fn hook(_: &TrimError) {}
        let mut engine = TrimEngine::new();
        engine.ctx = engine.ctx.with_fatal_hook(hook);
        let mut config = EngineConfig::default();
        config.polygonize.normals = false;
        engine.apply_config(config);
        assert!(engine.ctx.fatal_hook.is_some());
        assert!(!engine.options.normals);
    }
}
