use crate::error::DecoderError;
use crate::occupancy::decoder::{LatentCode, ShapeDecoder};
use crate::occupancy::grid::DenseGrid;
use crate::occupancy::types::Pt3;

/// Points per decoder call. Resolution 256 has ~16.7M sample points, so the
/// working set has to stay independent of the grid size.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Ordered sequence of query points that can be materialized piecewise.
pub trait PointSource {
    fn point_count(&self) -> usize;

    /// Appends points `start..end` to `out`, in order.
    fn write_points(&self, start: usize, end: usize, out: &mut Vec<Pt3>);
}

impl PointSource for [Pt3] {
    fn point_count(&self) -> usize {
        self.len()
    }

    fn write_points(&self, start: usize, end: usize, out: &mut Vec<Pt3>) {
        out.extend_from_slice(&self[start..end]);
    }
}

impl PointSource for DenseGrid {
    fn point_count(&self) -> usize {
        DenseGrid::point_count(self)
    }

    fn write_points(&self, start: usize, end: usize, out: &mut Vec<Pt3>) {
        self.extend_points(start, end, out);
    }
}

/// Evaluates `decoder` over every point of `points`, `batch_size` points per
/// call, and returns the concatenated logits in point order.
///
/// Batches run strictly one after another so at most one batch of points is
/// alive at a time. The first decoder error aborts the query and is returned
/// as-is; there is no retry.
pub fn query_occupancy<D, P>(
    decoder: &D,
    points: &P,
    latent: &LatentCode,
    batch_size: usize,
) -> Result<Vec<f32>, DecoderError>
where
    D: ShapeDecoder + ?Sized,
    P: PointSource + ?Sized,
{
    let batch_size = batch_size.max(1);
    let total = points.point_count();
    let mut logits = Vec::with_capacity(total);
    let mut batch = Vec::with_capacity(batch_size.min(total));

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);

        batch.clear();
        points.write_points(start, end, &mut batch);

        let batch_logits = decoder.query(&batch, latent)?;
        if batch_logits.len() != batch.len() {
            return Err(DecoderError::LogitCountMismatch {
                expected: batch.len(),
                actual: batch_logits.len(),
                offset: start,
            });
        }
        logits.extend_from_slice(&batch_logits);

        log::debug!("Queried points {}..{} of {}", start, end, total);
        start = end;
    }

    Ok(logits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Decoder that encodes each point's position into its logit and records
    /// the size of every batch it sees.
    struct RecordingDecoder {
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl RecordingDecoder {
        fn new() -> Self {
            Self {
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    impl ShapeDecoder for RecordingDecoder {
        fn query(&self, points: &[Pt3], _latent: &LatentCode) -> Result<Vec<f32>, DecoderError> {
            self.batch_sizes.lock().unwrap().push(points.len());
            Ok(points.iter().map(|p| p.x * 100.0 + p.y * 10.0 + p.z).collect())
        }
    }

    fn lattice(n: usize) -> Vec<Pt3> {
        // Flat order: second axis fastest, then third, then first
        let mut points = Vec::new();
        for x in 0..n {
            for z in 0..n {
                for y in 0..n {
                    points.push(Pt3::new(x as f32, y as f32, z as f32));
                }
            }
        }
        points
    }

    #[test]
    fn test_batches_of_four_over_27_points() {
        let points = lattice(3);
        let decoder = RecordingDecoder::new();

        let logits = query_occupancy(&decoder, &points[..], &LatentCode::default(), 4).unwrap();

        let sizes = decoder.batch_sizes.lock().unwrap().clone();
        assert_eq!(sizes.len(), 7);
        assert!(sizes.iter().all(|&s| s <= 4));
        assert_eq!(sizes.iter().sum::<usize>(), 27);

        let expected: Vec<f32> = points.iter().map(|p| p.x * 100.0 + p.y * 10.0 + p.z).collect();
        assert_eq!(logits, expected);
    }

    #[test]
    fn test_dense_grid_source_matches_materialized_points() {
        let grid = DenseGrid::sampling_cube(8).unwrap();
        let decoder = RecordingDecoder::new();
        let latent = LatentCode::default();

        let from_grid = query_occupancy(&decoder, &grid, &latent, 100).unwrap();
        let from_slice = query_occupancy(&decoder, &grid.points()[..], &latent, 1000).unwrap();

        assert_eq!(from_grid.len(), 729);
        assert_eq!(from_grid, from_slice);
    }

    #[test]
    fn test_decoder_error_propagates_without_retry() {
        let calls = AtomicUsize::new(0);
        let decoder = |points: &[Pt3], _: &LatentCode| {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(DecoderError::Backend("device lost".to_string()))
            } else {
                Ok(vec![0.0f32; points.len()])
            }
        };

        let points = lattice(3);
        let err = query_occupancy(&decoder, &points[..], &LatentCode::default(), 10).unwrap_err();

        assert_eq!(err, DecoderError::Backend("device lost".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_short_batch_is_rejected() {
        let decoder =
            |points: &[Pt3], _: &LatentCode| Ok::<_, DecoderError>(vec![0.0f32; points.len() - 1]);
        let points = lattice(2);

        let err = query_occupancy(&decoder, &points[..], &LatentCode::default(), 5).unwrap_err();

        assert_eq!(
            err,
            DecoderError::LogitCountMismatch {
                expected: 5,
                actual: 4,
                offset: 0
            }
        );
    }

    #[test]
    fn test_empty_source_never_calls_decoder() {
        let decoder = RecordingDecoder::new();
        let points: Vec<Pt3> = Vec::new();

        let logits = query_occupancy(&decoder, &points[..], &LatentCode::default(), 4).unwrap();

        assert!(logits.is_empty());
        assert!(decoder.batch_sizes.lock().unwrap().is_empty());
    }
}
