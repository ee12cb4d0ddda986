//! Requires `--features test-hooks`. Kept in its own binary so no other
//! test touches the global counter.
#![cfg(feature = "test-hooks")]

use creative_compliance::pipeline::{get_validation_call_count, reset_validation_call_count};
use creative_compliance::{
    Certifier, CreativeEngine, CreativeSubmission, Ed25519Signer, Element, LayoutGraph, ValidationMetadata,
};

#[test]
fn certify_validates_exactly_once() {
    reset_validation_call_count();

    let submission = CreativeSubmission {
        creative_id: "c-1".into(),
        name: "Plain".into(),
        layout: LayoutGraph::new(vec![Element::rect("panel", 100.0, 100.0, 200.0, 200.0)]).with_canvas(1080.0, 1080.0),
        metadata: ValidationMetadata::default(),
    };
    let engine = CreativeEngine::default();
    let certifier = Certifier::new(Ed25519Signer::generate());

    engine.certify_creative(&certifier, &submission).unwrap();
    assert_eq!(get_validation_call_count(), 1);

    engine.validate_creative(&submission).unwrap();
    assert_eq!(get_validation_call_count(), 2);
}
