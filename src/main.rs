use acne_severity::config::Config;
use acne_severity::image_classifier::interface::ModelStatus;
use acne_severity::image_classifier::start_engine;
use acne_severity::image_source::device_camera::impl_fake::{CameraBehavior, DeviceCameraFake};
use acne_severity::image_source::raw_image::RawImage;
use acne_severity::library::logger::impl_console::LoggerConsole;
use acne_severity::library::logger::interface::Logger;
use acne_severity::session::controller::SessionController;
use acne_severity::session::core::Phase;
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const MODEL_LOAD_WAIT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(
    name = "acne-severity",
    about = "Classify acne severity from a single image",
    version
)]
#[command(group(ArgGroup::new("input").required(true).args(["camera", "image"])))]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Capture one frame from the camera
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "image")]
    camera: bool,

    /// JPEG or PNG file to analyze
    #[arg(value_name = "IMAGE")]
    image: Option<PathBuf>,
}

fn mime_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg".to_string()),
        "png" => Some("image/png".to_string()),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    let logger: Arc<dyn Logger + Send + Sync> = Arc::new(LoggerConsole::new(config.logger_timezone));

    let engine = start_engine(&config, logger.clone());
    if let ModelStatus::Failed { error } = engine.wait_until_settled(MODEL_LOAD_WAIT) {
        return Err(Box::new(error));
    }

    // No capture hardware is wired up; the camera path uses a synthetic frame.
    let camera = Arc::new(DeviceCameraFake::new(
        logger.clone(),
        CameraBehavior::Frame(RawImage::solid(640, 480, [198, 140, 120])?),
    ));

    let session = SessionController::new(config.clone(), logger.clone(), camera, engine);

    match &args.image {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            session.submit_upload(bytes, mime_for(path))?
        }
        None => session.capture_from_camera()?,
    };

    let snapshot = session.wait_until_settled(config.inference_timeout + MODEL_LOAD_WAIT);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    match (snapshot.phase, snapshot.error) {
        (Phase::Result, _) => Ok(()),
        (_, Some(error)) => {
            eprintln!("{}", error.user_message());
            Err(Box::new(error))
        }
        (phase, None) => Err(format!("analysis did not finish (still {})", phase).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_image_with_config() {
        let cli = Cli::try_parse_from(["acne-severity", "--config", "c.json", "face.jpg"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        assert_eq!(cli.image, Some(PathBuf::from("face.jpg")));
        assert!(!cli.camera);
    }

    #[test]
    fn test_parses_camera() {
        let cli = Cli::try_parse_from(["acne-severity", "--camera"]).unwrap();
        assert!(cli.camera);
        assert_eq!(cli.image, None);
    }

    #[test]
    fn test_rejects_missing_or_conflicting_input() {
        assert!(Cli::try_parse_from(["acne-severity"]).is_err());
        assert!(Cli::try_parse_from(["acne-severity", "--camera", "face.jpg"]).is_err());
        assert!(Cli::try_parse_from(["acne-severity", "--config"]).is_err());
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for(Path::new("a.JPG")).as_deref(), Some("image/jpeg"));
        assert_eq!(mime_for(Path::new("a.png")).as_deref(), Some("image/png"));
        assert_eq!(mime_for(Path::new("a.gif")), None);
        assert_eq!(mime_for(Path::new("a")), None);
    }
}
