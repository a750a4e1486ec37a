use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        TemporaError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        TemporaError::compile("x")
            .to_string()
            .contains("compile error:")
    );
    assert!(
        TemporaError::precondition("x")
            .to_string()
            .contains("precondition failed:")
    );
    assert!(
        TemporaError::reentrancy("x")
            .to_string()
            .contains("re-entrancy rejected:")
    );
    assert!(
        TemporaError::runaway("x")
            .to_string()
            .contains("runaway loop:")
    );
    assert!(
        TemporaError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = TemporaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn json_errors_map_to_serde_variant() {
    let err: TemporaError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(err, TemporaError::Serde(_)));
}
