use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CloudError::acquisition("x")
            .to_string()
            .contains("acquisition error:")
    );
    assert!(
        CloudError::precondition("x")
            .to_string()
            .contains("precondition violated:")
    );
    assert!(CloudError::encode("x").to_string().contains("encode error:"));
    assert!(CloudError::gpu("x").to_string().contains("gpu error:"));
    assert!(CloudError::config("x").to_string().contains("config error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CloudError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn encode_failures_do_not_abort_the_run() {
    assert!(CloudError::acquisition("missing ir-left").is_fatal_for_run());
    assert!(CloudError::precondition("size mismatch").is_fatal_for_run());
    assert!(!CloudError::encode("jpeg").is_fatal_for_run());
}
