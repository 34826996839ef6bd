use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Instant;
use burn::prelude::*;
use burn::tensor::TensorData;
use image::imageops::FilterType;
use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use gn_core::depth::{DepthBuffer, DepthRange};
use gn_core::error::{Error, Result};
use crate::model::{DepthModel, OutputLayout};

/// Planar RGB staging buffer reused across inferences.
///
/// The model output needs no scratch: the backend hands back an owned `Vec`
/// which is normalized in place and becomes the `DepthBuffer`.
#[derive(Debug, Default)]
struct Scratch {
    input: Option<Vec<f32>>,
}

impl Scratch {
    /// Allocates the staging buffer unless one of the right size already exists
    fn allocate(&mut self, input_len: usize) -> &mut Vec<f32> {
        let fits = matches!(&self.input, Some(i) if i.capacity() >= input_len);
        if !fits {
            self.release();
            self.input = Some(Vec::with_capacity(input_len));
        }

        let input = self.input.get_or_insert_with(Vec::new);
        input.clear();
        input
    }

    fn release(&mut self) {
        self.input = None;
    }

    fn is_allocated(&self) -> bool {
        self.input.is_some()
    }
}

struct Session<M> {
    model: M,
    scratch: Scratch,
}

/// Exclusive hold on a session for one inference. Scratch buffers are
/// released when the lease is dropped before `finish`.
struct InferenceLease<'a, M> {
    session: MutexGuard<'a, Session<M>>,
    finished: bool,
}

impl<M> InferenceLease<'_, M> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl<M> Drop for InferenceLease<'_, M> {
    fn drop(&mut self) {
        if !self.finished {
            self.session.scratch.release();
        }
    }
}

/// Runs a depth model over panoramas, one inference at a time
pub struct DepthEstimator<B: Backend, M: DepthModel<B>> {
    session: Mutex<Session<M>>,
    device: B::Device,
    input_size: (usize, usize),
    layout: OutputLayout,
    _backend: PhantomData<B>,
}

impl<B: Backend, M: DepthModel<B>> DepthEstimator<B, M> {
    pub fn new(model: M, device: B::Device) -> Result<Self> {
        let input_size = model.input_size();
        if input_size.0 == 0 || input_size.1 == 0 {
            return Err(Error::ModelUnavailable(format!(
                "model declares an empty input size {}x{}",
                input_size.0, input_size.1
            )));
        }

        Ok(Self {
            layout: model.output_layout(),
            session: Mutex::new(Session { model, scratch: Scratch::default() }),
            device,
            input_size,
            _backend: PhantomData,
        })
    }

    /// `(width, height)` of the buffers this estimator produces
    pub fn input_size(&self) -> (usize, usize) {
        self.input_size
    }

    /// Estimates normalized depth for `image`.
    ///
    /// Fails with `Busy` if another call is running on this estimator.
    pub fn estimate(&self, image: &DynamicImage, cancel: &CancellationToken) -> Result<(DepthBuffer, DepthRange)> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("cannot estimate depth of an empty image".into()));
        }

        let mut lease = self.lease()?;
        let (width, height) = self.input_size;
        let started = Instant::now();

        check_cancelled(cancel)?;

        let Session { model, scratch } = &mut *lease.session;
        let input = scratch.allocate(3 * width * height);

        // Fast resize, then planar RGB
        let resized = image.resize_exact(width as u32, height as u32, FilterType::Triangle).to_rgb8();
        input.resize(3 * width * height, 0.0);
        let plane = width * height;
        for (index, pixel) in resized.pixels().enumerate() {
            input[index] = pixel[0] as f32 / 255.0;
            input[plane + index] = pixel[1] as f32 / 255.0;
            input[2 * plane + index] = pixel[2] as f32 / 255.0;
        }

        check_cancelled(cancel)?;

        // TensorData owns its bytes, so the upload is the one copy of the staging buffer
        let tensor = Tensor::<B, 4>::from_data(
            TensorData::new(input.clone(), [1, 3, height, width]),
            &self.device,
        );
        let raw = model.forward(tensor);

        check_cancelled(cancel)?;

        let oriented = self.reorient(raw)?;
        let raw = oriented
            .into_data()
            .convert::<f32>()
            .into_vec::<f32>()
            .map_err(|e| Error::UnsupportedFormat(format!("depth output: {:?}", e)))?;

        let (buffer, range) = DepthBuffer::normalize_owned(width as u32, height as u32, raw)?;

        debug!("Depth inference took {:?}", started.elapsed());
        info!("Raw depth range [{}, {}]", range.min, range.max);

        lease.finish();
        Ok((buffer, range))
    }

    /// Releases the working buffers. They are allocated again on the next call.
    pub fn release_buffers(&self) -> Result<()> {
        let mut lease = self.lease()?;
        lease.session.scratch.release();
        lease.finish();
        Ok(())
    }

    fn lease(&self) -> Result<InferenceLease<'_, M>> {
        let session = match self.session.try_lock() {
            Ok(session) => session,
            Err(TryLockError::WouldBlock) => return Err(Error::Busy),
            // Leases release their buffers while unwinding, so the session is still usable
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        Ok(InferenceLease { session, finished: false })
    }

    /// Brings the model output into `[H, W]` row-major order
    fn reorient(&self, raw: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        let (width, height) = self.input_size;
        let [batch, channels, rows, cols] = raw.dims();

        let expected = match self.layout {
            OutputLayout::HeightWidth => (height, width),
            OutputLayout::TransposedMirrored => (width, height),
        };
        if batch != 1 || channels != 1 || (rows, cols) != expected {
            return Err(Error::UnsupportedFormat(format!(
                "model output shape {:?} does not match {:?} for a {}x{} input",
                [batch, channels, rows, cols], self.layout, width, height
            )));
        }

        let plane: Tensor<B, 2> = raw.reshape([rows, cols]);
        Ok(match self.layout {
            OutputLayout::HeightWidth => plane,
            OutputLayout::TransposedMirrored => plane.swap_dims(0, 1).flip([1]),
        })
    }

    #[cfg(test)]
    fn scratch_allocated(&self) -> bool {
        self.session
            .lock()
            .map(|s| s.scratch.is_allocated())
            .unwrap_or(false)
    }
}

impl<B: Backend, M: DepthModel<B>> Drop for DepthEstimator<B, M> {
    fn drop(&mut self) {
        match self.session.get_mut() {
            Ok(session) => session.scratch.release(),
            Err(poisoned) => poisoned.into_inner().scratch.release(),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
