//! PNG and TIFF predictors, as used by the Flate and LZW filters.

use crate::object::Dict;
use crate::object::dict::keys::{BITS_PER_COMPONENT, COLORS, COLUMNS, EARLY_CHANGE, PREDICTOR};
use folio_common::bit::{BitReader, BitWriter};
use log::warn;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PredictorParams {
    pub(crate) predictor: u8,
    pub(crate) colors: u8,
    pub(crate) bits_per_component: u8,
    pub(crate) columns: usize,
    pub(crate) early_change: bool,
}

impl PredictorParams {
    pub(crate) fn from_params(dict: Option<&Dict>) -> Self {
        let Some(dict) = dict else {
            return Self::default();
        };

        Self {
            predictor: dict.get(PREDICTOR).unwrap_or(1),
            colors: dict.get(COLORS).unwrap_or(1),
            bits_per_component: dict.get(BITS_PER_COMPONENT).unwrap_or(8),
            columns: dict.get(COLUMNS).unwrap_or(1),
            early_change: dict.get::<u8>(EARLY_CHANGE).map(|e| e != 0).unwrap_or(true),
        }
    }

    fn bits_per_pixel(&self) -> usize {
        self.bits_per_component as usize * self.colors as usize
    }

    fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel().div_ceil(8)
    }

    fn row_length_in_bytes(&self) -> usize {
        (self.columns * self.bits_per_pixel()).div_ceil(8)
    }
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

pub(crate) fn apply(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    match params.predictor {
        1 => Some(data),
        2 => tiff(data, params),
        10..=15 => png(&data, params),
        p => {
            warn!("unknown predictor {p}");

            None
        }
    }
}

fn png(data: &[u8], params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_length_in_bytes();
    let bpp = params.bytes_per_pixel();

    if row_len == 0 {
        return None;
    }

    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0_u8; row_len];

    // Each row is prefixed with the PNG filter type. An incomplete last row is dropped.
    for chunk in data.chunks_exact(row_len + 1) {
        let filter = chunk[0];
        let mut row = chunk[1..].to_vec();

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev_row[i];
            let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };

            row[i] = match filter {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                _ => {
                    warn!("unknown PNG filter type {filter}");

                    return None;
                }
            };
        }

        out.extend_from_slice(&row);
        prev_row = row;
    }

    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn tiff(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_length_in_bytes();
    let bpc = params.bits_per_component;
    let colors = params.colors as usize;

    if row_len == 0 || !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return None;
    }

    let mut out = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let mut reader = BitReader::new(row);
        let mut writer = BitWriter::new();
        let mut prev = vec![0_u32; colors];
        let mask = folio_common::bit::bit_mask(bpc);

        for _ in 0..params.columns {
            for p in prev.iter_mut() {
                let Some(delta) = reader.read(bpc) else {
                    break;
                };

                *p = (*p + delta) & mask;
                writer.write(*p, bpc)?;
            }
        }

        writer.align();
        out.extend_from_slice(&writer.finish());
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: u8, colors: u8, columns: usize) -> PredictorParams {
        PredictorParams {
            predictor,
            colors,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn png_up() {
        let data = vec![2, 1, 2, 2, 1, 1];
        assert_eq!(apply(data, &params(12, 1, 2)).unwrap(), vec![1, 2, 2, 3]);
    }

    #[test]
    fn png_sub_and_paeth() {
        let data = vec![1, 10, 5, 4, 1, 1];
        assert_eq!(apply(data, &params(15, 1, 2)).unwrap(), vec![10, 15, 11, 16]);
    }

    #[test]
    fn tiff_rgb() {
        let data = vec![10, 20, 30, 1, 2, 3];
        assert_eq!(
            apply(data, &params(2, 3, 2)).unwrap(),
            vec![10, 20, 30, 11, 22, 33]
        );
    }
}
