#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use tract_onnx::prelude::*;

use crate::annotate::Annotator;
use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::{decode_yolo_output, InputGeometry, DEFAULT_IOU_THRESHOLD};
use crate::detect::result::{ClassNames, Inference};
#[cfg(feature = "video-ffmpeg")]
use crate::detect::result::VideoInference;
use crate::media::MediaKind;
#[cfg(feature = "video-ffmpeg")]
use crate::video::{process_frames, FfmpegFrames};
use crate::video::VideoSettings;

/// YOLOv8 detection model executed with tract.
///
/// Loads a local ONNX export once at construction time. Frames are resized
/// to the square model input, normalised to 0..1 and fed as NCHW f32.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    model_path: PathBuf,
    input_size: u32,
    class_names: ClassNames,
    iou_threshold: f32,
    annotator: Annotator,
    video: VideoSettings,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, class_names: ClassNames) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded {} ({} classes, input {}x{})",
            model_path.display(),
            class_names.len(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            model_path: model_path.to_path_buf(),
            input_size,
            class_names,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            annotator: Annotator::new(),
            video: VideoSettings::default(),
        })
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Annotator used for processed video frames.
    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_video_settings(mut self, video: VideoSettings) -> Self {
        self.video = video;
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn build_input(&self, image: &DynamicImage) -> Tensor {
        let size = self.input_size;
        let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        let size = size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }

    fn run(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<Inference> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        let geometry = InputGeometry {
            image_width: image.width(),
            image_height: image.height(),
            model_size: self.input_size,
        };
        let detections = decode_yolo_output(
            &data,
            &shape,
            confidence_threshold,
            self.iou_threshold,
            geometry,
            &self.class_names,
        )?;
        Ok(Inference {
            detections,
            class_names: self.class_names.clone(),
        })
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => true,
            MediaKind::Video => cfg!(feature = "video-ffmpeg"),
        }
    }

    fn detect_image(
        &mut self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Inference> {
        self.run(image, confidence_threshold)
    }

    #[cfg(feature = "video-ffmpeg")]
    fn detect_video(
        &mut self,
        video: &Path,
        confidence_threshold: f32,
        output_dir: &Path,
    ) -> Result<VideoInference> {
        let frames = FfmpegFrames::open(video)?;
        process_frames(frames, self.video, &self.annotator, output_dir, |frame| {
            self.run(frame, confidence_threshold)
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = DynamicImage::new_rgb8(self.input_size, self.input_size);
        self.run(&blank, 1.0).map(|_| ())
    }
}
