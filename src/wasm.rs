//! WASM bindings for browser integration
//!
//! Exposes the streaming engine to JavaScript with Float32Array blocks.

use crate::{
    convolve::{self, Strategy},
    EngineConfig, FastConv,
};

use wasm_bindgen::prelude::*;

use js_sys::Float32Array;

fn js_error(context: &str, err: crate::AudioError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

/// WebAssembly bindings for streaming partitioned convolution.
///
/// Feed blocks of any length through `process`, then call `flush` once to
/// collect the remaining `size_of_tail()` samples.
#[wasm_bindgen]
pub struct WasmFastConv {
    engine: FastConv,
}

#[wasm_bindgen]
impl WasmFastConv {
    /// Create an engine for `impulse_response`
    ///
    /// `strategy` is `"direct"`, `"partitioned-direct"` or `"partitioned-fft"`
    /// (the default when omitted).
    #[wasm_bindgen(constructor)]
    pub fn new(
        impulse_response: &Float32Array,
        block_length: usize,
        strategy: Option<String>,
    ) -> Result<WasmFastConv, JsValue> {
        let strategy = match strategy {
            Some(name) => name
                .parse::<Strategy>()
                .map_err(|e| js_error("Unknown strategy", e))?,
            None => Strategy::default(),
        };

        let ir_vec: Vec<f32> = impulse_response.to_vec();
        let mut engine = FastConv::new();
        engine
            .init_with_config(
                &ir_vec,
                &EngineConfig {
                    block_length,
                    strategy,
                },
            )
            .map_err(|e| js_error("Convolution engine error", e))?;

        Ok(WasmFastConv { engine })
    }

    /// Convolve one block and return the same number of samples
    #[wasm_bindgen]
    pub fn process(&mut self, audio_block: &Float32Array) -> Result<Float32Array, JsValue> {
        let input_vec: Vec<f32> = audio_block.to_vec();
        let mut output = vec![0.0; input_vec.len()];

        self.engine
            .process(&input_vec, &mut output)
            .map_err(|e| js_error("Processing error", e))?;

        Ok(Float32Array::from(&output[..]))
    }

    /// Return and clear the remaining tail
    #[wasm_bindgen]
    pub fn flush(&mut self) -> Result<Float32Array, JsValue> {
        let tail = self
            .engine
            .flush()
            .map_err(|e| js_error("Flush error", e))?;
        Ok(Float32Array::from(&tail[..]))
    }

    /// Number of samples `flush` returns
    #[wasm_bindgen]
    pub fn size_of_tail(&self) -> Result<usize, JsValue> {
        self.engine
            .size_of_tail()
            .map_err(|e| js_error("Engine error", e))
    }

    /// Release the impulse response; the engine must be recreated afterwards
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.engine.reset();
    }
}

/// Convolve a whole signal in the time domain (output includes the tail).
#[wasm_bindgen]
pub fn convolve_audio(
    audio: &Float32Array,
    impulse_response: &Float32Array,
) -> Result<Float32Array, JsValue> {
    let audio_vec: Vec<f32> = audio.to_vec();
    let ir_vec: Vec<f32> = impulse_response.to_vec();

    let result = convolve::time_convolve(&audio_vec, &ir_vec)
        .map_err(|e| js_error("Convolution error", e))?;

    Ok(Float32Array::from(&result[..]))
}
