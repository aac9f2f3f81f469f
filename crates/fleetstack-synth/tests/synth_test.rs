use fleetstack_core::{LoadOptions, load_stack};
use fleetstack_synth::{ArtifactStatus, ArtifactStore, SynthSummary, synthesize};
use std::path::Path;

fn reference_stack() -> fleetstack_core::Stack {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../fleetstack-core/tests/fixtures/reference_stack.kdl");
    load_stack(&path, &LoadOptions::default()).unwrap()
}

#[test]
fn test_reference_template() {
    let template = synthesize(&reference_stack()).unwrap();

    assert_eq!(template.stack_name(), "NewStack");
    assert_eq!(template.outputs.len(), 2);
    assert_eq!(
        template.resources["DbInstance"].deletion_policy.as_deref(),
        Some("Delete")
    );
    assert_eq!(
        template.outputs["dbEndpoint"].value,
        serde_json::json!({ "Fn::GetAtt": ["DbInstance", "Endpoint.Address"] })
    );
    assert_eq!(template.metadata.declared_ids["DbInstance"], "db-instance");
}

#[test]
fn test_reference_template_ids_are_alphanumeric() {
    let template = synthesize(&reference_stack()).unwrap();

    let invalid: Vec<&String> = template
        .resources
        .keys()
        .chain(template.outputs.keys())
        .filter(|id| !id.chars().all(|c| c.is_ascii_alphanumeric()))
        .collect();
    assert!(invalid.is_empty(), "non-alphanumeric logical ids: {:?}", invalid);

    let resources = serde_json::to_string(&template.resources).unwrap();
    assert!(!resources.contains("\"db-instance"));
}

#[tokio::test]
async fn test_resynth_is_unchanged() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(temp_dir.path());

    let first = synthesize(&reference_stack()).unwrap();
    assert_eq!(
        SynthSummary::new(&first, store.load("NewStack").await.unwrap().as_ref()).status,
        ArtifactStatus::New
    );
    store.save(&first).await.unwrap();

    let second = synthesize(&reference_stack()).unwrap();
    let previous = store.load("NewStack").await.unwrap();
    assert_eq!(
        SynthSummary::new(&second, previous.as_ref()).status,
        ArtifactStatus::Unchanged
    );
}
