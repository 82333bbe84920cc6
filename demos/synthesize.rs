//! Apply a JSON-configured transform to a list of subject volumes
//!
//! Usage:
//!   cargo run --release --example synthesize -- <settings.json> <output_dir> <seed> <subject.nii.gz>...
//!
//! Subjects get consecutive seeds starting at `<seed>`, and each result is
//! written as `<output_dir>/<stem>-ill.nii.gz`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use neurosynth_core::settings::TransformSettings;

fn subject_stem(path: &Path) -> String {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    name.trim_end_matches(".gz").trim_end_matches(".nii").to_string()
}

fn main() -> Result<(), String> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        return Err("usage: synthesize <settings.json> <output_dir> <seed> <subject>...".into());
    }

    let settings_path = PathBuf::from(&args[0]);
    let output_dir = PathBuf::from(&args[1]);
    let seed: u64 = args[2].parse().map_err(|e| format!("invalid seed '{}': {e}", args[2]))?;
    let subjects: Vec<PathBuf> = args[3..].iter().map(PathBuf::from).collect();

    let transform = TransformSettings::from_json_file(&settings_path)
        .and_then(|s| s.into_transform())
        .map_err(|e| e.to_string())?;

    std::fs::create_dir_all(&output_dir).map_err(|e| format!("Failed to create output dir: {e}"))?;

    let total_start = Instant::now();
    for (i, subject) in subjects.iter().enumerate() {
        let start = Instant::now();
        let subject_seed = seed
            .checked_add(i as u64)
            .ok_or_else(|| format!("seed {} + {} overflows", seed, i))?;
        let dest = output_dir.join(format!("{}-ill.nii.gz", subject_stem(subject)));

        transform
            .apply_to(subject, subject_seed, &dest)
            .map_err(|e| format!("{}: {}", subject.display(), e))?;

        println!(
            "[INFO] {} {} (seed {}) -> {} in {:.2?}",
            transform.name(), subject.display(), subject_seed, dest.display(), start.elapsed()
        );
    }

    println!("[INFO] {} subjects in {:.2?}", subjects.len(), total_start.elapsed());
    Ok(())
}
