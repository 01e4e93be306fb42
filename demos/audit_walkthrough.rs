//! Walkthrough of the audit funnel on a small synthetic dataset.
//!
//! Run with `RUST_LOG=info cargo run --example audit_walkthrough` to see the
//! funnel's own log events next to the printed summary.

use detection_audit::{
    init_tracing, load_detections_from_str, BoundingBox, FunnelConfig, FunnelPipeline,
    OutputPaths, VerificationRequest, VerifierError,
};
use std::fs;

/// Stand-in for a vision-language model: confirms cats, denies dogs and
/// hedges on everything else.
fn scripted_verifier(request: &VerificationRequest) -> Result<String, VerifierError> {
    match request.label.as_str() {
        "cat" => Ok("Yes, a cat is clearly visible.".to_string()),
        "dog" => Ok("No. I only see furniture.".to_string()),
        "bird" => Err(VerifierError::Timeout(request.timeout.unwrap_or_default())),
        _ => Ok("Hard to say from this angle.".to_string()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    println!("=== Detection Audit Walkthrough ===\n");

    // 1. Lay out a tiny YOLO dataset
    let workspace = tempfile::tempdir()?;
    let images = workspace.path().join("images");
    let labels = workspace.path().join("labels");
    fs::create_dir_all(&images)?;
    fs::create_dir_all(&labels)?;
    fs::write(
        workspace.path().join("data.yaml"),
        "nc: 3\nnames: ['cat', 'dog', 'bird']\n",
    )?;

    for name in ["living_room.png", "garden.png", "hallway.png", "porch.png"] {
        image::RgbImage::new(640, 480).save(images.join(name))?;
    }
    // cat centred in the living room, dog in the garden
    fs::write(labels.join("living_room.txt"), "0 0.5 0.5 0.25 0.25\n")?;
    fs::write(labels.join("garden.txt"), "1 0.25 0.25 0.2 0.2\n")?;
    println!("1. Dataset written to {}", workspace.path().display());

    // 2. Detector output, as it would arrive from an inference worker
    let cat_box = BoundingBox::new(240.0, 180.0, 400.0, 300.0);
    let raw = format!(
        r#"[
            {{"image_path": "{room}", "label": "cat", "confidence": 0.94, "bbox": {cat}}},
            {{"image_path": "{garden}", "label": "cat", "confidence": "0.88", "bbox": [96, 72, 224, 168]}},
            {{"image_path": "{hall}", "label": "dog", "confidence": 0.41, "bbox": [10, 10, 90, 90]}},
            {{"image_path": "{hall}", "label": "bird", "confidence": "n/a", "bbox": [300, 20, 340, 60]}},
            {{"image_path": "{porch}", "label": null}}
        ]"#,
        room = images.join("living_room.png").display(),
        garden = images.join("garden.png").display(),
        hall = images.join("hallway.png").display(),
        porch = images.join("porch.png").display(),
        cat = serde_json::to_string(&cat_box)?,
    );
    let detections = load_detections_from_str(&raw)?;
    println!("2. Loaded {} detections\n", detections.len());

    // 3. Configure and run the funnel
    let config = FunnelConfig {
        labels_dir: labels,
        class_names_path: workspace.path().join("data.yaml"),
        rate_limit_ms: 50,
        outputs: OutputPaths::in_dir(workspace.path()),
        ..FunnelConfig::default()
    };
    let mut pipeline = FunnelPipeline::from_config(&config, scripted_verifier)?;
    let report = pipeline.run(detections)?;

    println!("3. Audit results");
    for item in report.final_report.iter() {
        println!(
            "   {:<18} {:<6} reason: {:<40} verifier: {:?} -> {:?}",
            item.image_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            item.label.as_deref().unwrap_or("-"),
            item.flag_reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            item.vlm_verification,
            item.vlm_suggested_action,
        );
    }
    println!();

    // 4. Summary and artifacts
    let stats = &report.stats;
    println!("4. Summary");
    println!("   Raw accuracy:        {:.2}%", stats.raw_accuracy());
    println!("   Confident accuracy:  {:.2}%", stats.clean_accuracy());
    println!("   Sent to verifier:    {}", stats.audit_total);
    println!("   Machine resolved:    {}", stats.machine_resolved());
    println!("   Needs a human:       {}", stats.human_total);
    println!();

    report.persist(&config.outputs)?;
    println!("5. Artifacts");
    for path in [
        &config.outputs.audit_required,
        &config.outputs.final_report,
        &config.outputs.human_intervention,
        &config.outputs.aggregated,
    ] {
        println!("   {} ({} bytes)", path.display(), fs::metadata(path)?.len());
    }

    Ok(())
}
