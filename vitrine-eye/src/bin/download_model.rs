//! Binary for downloading vision models from command line

use std::env;
use std::sync::Arc;
use vitrine_core::VitrineConfig;
use vitrine_eye::error::VisionError;
use vitrine_eye::models::ModelManager;

#[tokio::main]
async fn main() -> Result<(), VisionError> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: download-model <detector|embedder|all> [config.toml]");
        std::process::exit(1);
    }

    let mut config = match args.get(2) {
        Some(path) => VitrineConfig::from_file(path)
            .map_err(|e| VisionError::Model(format!("Failed to load config: {}", e)))?,
        None => VitrineConfig::default(),
    };
    config.apply_env();

    let manager = ModelManager::new(Arc::new(config.models));

    let model_name = args[1].to_lowercase();
    match model_name.as_str() {
        "detector" | "yolo" => {
            println!("Downloading detector model...");
            let path = manager.get_detector_model().await?;
            println!("Detector model available at: {:?}", path);
        }
        "embedder" | "clip" => {
            println!("Downloading embedder model...");
            let path = manager.get_embedder_model().await?;
            println!("Embedder model available at: {:?}", path);
        }
        "all" => {
            let detector = manager.get_detector_model().await?;
            println!("Detector model available at: {:?}", detector);
            let embedder = manager.get_embedder_model().await?;
            println!("Embedder model available at: {:?}", embedder);
        }
        _ => {
            eprintln!("Unknown model: {}", model_name);
            eprintln!("Available models: detector, embedder, all");
            std::process::exit(1);
        }
    }

    Ok(())
}
