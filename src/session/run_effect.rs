use crate::image_source::device_camera::CameraSource;
use crate::image_source::file::UploadSource;
use crate::image_source::ImageSource;
use crate::normalizer::normalize;
use crate::session::controller::SessionController;
use crate::session::core::{Effect, Event};
use std::sync::Arc;

impl SessionController {
    pub(super) fn run_effect(&self, effect: Effect) {
        let _ = self
            .logger
            .info(&format!("Running effect: {}", effect.to_display_string()));

        let event = match effect {
            Effect::AcquireCameraFrame { request } => {
                let _turn = self.camera_turn();
                let source =
                    CameraSource::new(Arc::clone(&self.device_camera), Arc::clone(&self.logger))
                        .with_cancel(self.cancel_token(request));
                Event::ImageAcquired {
                    request,
                    result: source.acquire(),
                }
            }
            Effect::DecodeUpload {
                request,
                bytes,
                mime,
            } => Event::ImageAcquired {
                request,
                result: UploadSource::new(bytes, mime, self.config.max_upload_bytes).acquire(),
            },
            Effect::Normalize { request, image } => Event::ImageNormalized {
                request,
                tensor: normalize(&image, self.config.input_side),
            },
            Effect::Classify { request, tensor } => Event::ClassifyDone {
                request,
                result: self.engine.classify(tensor),
            },
        };

        // Rejections are logged by dispatch; there is no caller left to tell.
        let _ = self.dispatch(event);
    }
}
