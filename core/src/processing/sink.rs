use ndarray::Array2;

use crate::ArrayResult;

/// Secondary per-window product handed to the sink: the absolute-power map
/// of the frequency-domain beamformer, or the best beam trace of the
/// time-domain variants.
#[derive(Debug, Clone, Copy)]
pub enum AuxData<'a> {
    Map(&'a Array2<f64>),
    Beam(&'a [f64]),
}

/// Receives the per-window power map of a run.
///
/// The beamformers stay free of I/O; persisting or externalizing maps
/// happens behind this seam. Errors propagate and abort the run.
pub trait PowerMapSink {
    fn emit(
        &mut self,
        power_map: &Array2<f64>,
        aux: AuxData<'_>,
        window_index: usize,
    ) -> ArrayResult<()>;
}

/// Discards every map.
#[derive(Debug, Default)]
pub struct NullSink;

impl PowerMapSink for NullSink {
    fn emit(&mut self, _: &Array2<f64>, _: AuxData<'_>, _: usize) -> ArrayResult<()> {
        Ok(())
    }
}

/// Keeps every map in memory, for tests and small runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub power_maps: Vec<Array2<f64>>,
    pub aux_maps: Vec<Array2<f64>>,
    pub beams: Vec<Vec<f64>>,
}

impl PowerMapSink for MemorySink {
    fn emit(
        &mut self,
        power_map: &Array2<f64>,
        aux: AuxData<'_>,
        _window_index: usize,
    ) -> ArrayResult<()> {
        self.power_maps.push(power_map.clone());
        match aux {
            AuxData::Map(map) => self.aux_maps.push(map.clone()),
            AuxData::Beam(beam) => self.beams.push(beam.to_vec()),
        }
        Ok(())
    }
}
