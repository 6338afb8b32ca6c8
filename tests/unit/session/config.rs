use chrono::TimeZone as _;

use super::*;

#[test]
fn empty_object_gives_defaults() {
    let cfg = PipelineConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, PipelineConfig::default());
    assert_eq!(cfg.jpeg_quality, 80);
    assert_eq!(cfg.interval(), Duration::from_secs(180 * 60));
    assert_eq!(cfg.geometry, Geometry::new(8192, 4096).unwrap());
}

#[test]
fn parses_every_field() {
    let cfg = PipelineConfig::from_json_str(
        r#"{
            "source_root": "/data/in",
            "output_dir": "/data/out",
            "geometry": { "width": 64, "height": 32 },
            "month": 7,
            "backend": "gpu",
            "jpeg_quality": 92,
            "write_terminator_mask": true,
            "interval_minutes": 15,
            "threads": 4
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.source_root, PathBuf::from("/data/in"));
    assert_eq!(cfg.geometry.width, 64);
    assert_eq!(cfg.month, Some(7));
    assert_eq!(cfg.backend, BackendKind::Gpu);
    assert!(cfg.write_terminator_mask);
    assert_eq!(cfg.threads, Some(4));
}

#[test]
fn rejects_unknown_fields() {
    let err = PipelineConfig::from_json_str(r#"{ "colour": "blue" }"#).unwrap_err();
    assert!(matches!(err, CloudError::Config(_)));
}

#[test]
fn rejects_out_of_range_values() {
    for bad in [
        r#"{ "month": 0 }"#,
        r#"{ "month": 13 }"#,
        r#"{ "jpeg_quality": 0 }"#,
        r#"{ "interval_minutes": 0 }"#,
        r#"{ "threads": 0 }"#,
        r#"{ "geometry": { "width": 100, "height": 50 } }"#,
        r#"{ "geometry": { "width": 64, "height": 64 } }"#,
    ] {
        assert!(
            matches!(PipelineConfig::from_json_str(bad), Err(CloudError::Config(_))),
            "{bad}"
        );
    }
}

#[test]
fn month_follows_timestamp_unless_pinned() {
    let t = Utc.with_ymd_and_hms(2024, 11, 3, 8, 0, 0).unwrap();
    let mut cfg = PipelineConfig::default();
    assert_eq!(cfg.month_for(t), 11);
    cfg.month = Some(2);
    assert_eq!(cfg.month_for(t), 2);
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloudmap.json");
    std::fs::write(&path, r#"{ "interval_minutes": 30 }"#).unwrap();
    let cfg = PipelineConfig::load(&path).unwrap();
    assert_eq!(cfg.interval_minutes, 30);
    assert!(PipelineConfig::load(&dir.path().join("missing.json")).is_err());
}
