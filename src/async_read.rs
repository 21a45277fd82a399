//! Async materialization (requires the `async` feature).
//!
//! Reads are CPU-bound tile computation, so the async form just moves the
//! blocking read onto tokio's blocking pool.

use ndarray::Array3;

use crate::array::{DeferredArray, ReadOptions};
use crate::error::{RasterError, Result};
use crate::image::GeoImage;

impl DeferredArray {
    /// Materialize the window without blocking the async runtime; see
    /// [`DeferredArray::read`].
    pub async fn read_async(
        &self,
        bands: Option<&[usize]>,
        opts: ReadOptions,
    ) -> Result<Array3<f32>> {
        let view = self.clone();
        let bands = bands.map(<[usize]>::to_vec);
        tokio::task::spawn_blocking(move || view.read_with(bands.as_deref(), &opts))
            .await
            .map_err(|e| RasterError::Task(format!("read task join failed: {e}")))?
    }
}

impl GeoImage {
    /// Async form of [`GeoImage::read`].
    pub async fn read_async(
        &self,
        bands: Option<&[usize]>,
        opts: ReadOptions,
    ) -> Result<Array3<f32>> {
        self.array.read_async(bands, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::tests::test_image;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_async_matches_blocking() {
        let img = test_image(2);
        let blocking = img.read(None).unwrap();
        let deferred = img.read_async(None, ReadOptions::default()).await.unwrap();
        assert_eq!(blocking, deferred);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_async_band_subset() {
        let img = test_image(3);
        let data = img
            .read_async(Some(&[1]), ReadOptions { num_workers: 2 })
            .await
            .unwrap();
        assert_eq!(data.dim(), (1, 32, 32));
    }
}
