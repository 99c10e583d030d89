//! Backend selection and frame dispatch.

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;

use serde::{Deserialize, Serialize};

use crate::{
    gradient::{LUT_BYTES, LUT_SIZE},
    uniforms::FrameUniforms,
};

#[cfg(feature = "gpu")]
pub use gpu::GpuRenderer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    #[default]
    Cpu,
    #[cfg(feature = "gpu")]
    Gpu,
}

impl RenderBackend {
    pub fn label(&self) -> &'static str {
        match self {
            RenderBackend::Cpu => "CPU",
            #[cfg(feature = "gpu")]
            RenderBackend::Gpu => "GPU",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[cfg(feature = "gpu")]
    #[error("no GPU adapter available")]
    NoAdapter,
    #[cfg(feature = "gpu")]
    #[error("GPU device: {0}")]
    Device(String),
    #[error("pixel buffer: {0}")]
    Buffer(String),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Renders one RGBA8 frame of `uniforms.size()`. GPU failures fall back to the CPU path.
pub fn render_frame(
    uniforms: &FrameUniforms,
    lut: &[u8; LUT_BYTES],
    backend: RenderBackend,
    #[cfg(feature = "gpu")] gpu: Option<&mut GpuRenderer>,
) -> Vec<u8> {
    match backend {
        RenderBackend::Cpu => cpu::render(uniforms, lut),
        #[cfg(feature = "gpu")]
        RenderBackend::Gpu => {
            if let Some(renderer) = gpu {
                match renderer.render(uniforms, lut) {
                    Ok(pixels) => pixels,
                    Err(err) => {
                        log::warn!("GPU render failed, falling back to CPU: {err}");
                        cpu::render(uniforms, lut)
                    }
                }
            } else {
                cpu::render(uniforms, lut)
            }
        }
    }
}

/// Writes an RGBA8 frame to a PNG file.
pub fn save_png(
    path: &std::path::Path,
    size: (u32, u32),
    pixels: Vec<u8>,
) -> Result<(), RenderError> {
    let img = image::RgbaImage::from_raw(size.0, size.1, pixels).ok_or_else(|| {
        RenderError::Buffer(format!("does not match {}x{}", size.0, size.1))
    })?;
    img.save(path)?;
    Ok(())
}

/// Writes the gradient lookup as a `LUT_SIZE`x1 RGB PNG.
pub fn save_lut_png(path: &std::path::Path, lut: &[u8; LUT_BYTES]) -> Result<(), RenderError> {
    let img = image::RgbImage::from_raw(LUT_SIZE as u32, 1, lut.to_vec())
        .ok_or_else(|| RenderError::Buffer("lookup texture size".into()))?;
    img.save(path)?;
    Ok(())
}

/// Expands the RGB lookup bytes to opaque RGBA texels.
pub fn lut_rgba(lut: &[u8; LUT_BYTES]) -> Vec<u8> {
    lut.chunks_exact(3)
        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_rgba_adds_opaque_alpha() {
        let mut lut = [0u8; LUT_BYTES];
        lut[0..3].copy_from_slice(&[10, 20, 30]);
        let rgba = lut_rgba(&lut);

        assert_eq!(rgba.len(), 256 * 4);
        assert_eq!(&rgba[0..4], &[10, 20, 30, 255]);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn save_png_rejects_mismatched_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_png(&dir.path().join("frame.png"), (4, 4), vec![0; 12]);

        assert!(matches!(err, Err(RenderError::Buffer(_))));
    }

    #[test]
    fn lut_png_is_one_row_of_lookup_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lut.png");
        let lut = crate::gradient::GradientEngine::new().generate_texture_bytes();

        save_lut_png(&path, &lut).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();

        assert_eq!(img.dimensions(), (256, 1));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(255, 0).0, [255, 255, 255]);
    }
}
