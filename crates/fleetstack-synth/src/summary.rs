//! Synthesis summary

use crate::template::EngineTemplate;
use std::collections::BTreeMap;

/// How a synthesized template relates to the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// No template was stored for the stack
    New,
    /// Resources or outputs differ from the stored template
    Updated,
    /// Same resources and outputs as the stored template
    Unchanged,
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactStatus::New => write!(f, "new"),
            ArtifactStatus::Updated => write!(f, "updated"),
            ArtifactStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthSummary {
    pub stack: String,
    pub resources: usize,
    pub outputs: usize,
    pub by_type: BTreeMap<String, usize>,
    pub status: ArtifactStatus,
}

impl SynthSummary {
    pub fn new(template: &EngineTemplate, previous: Option<&EngineTemplate>) -> Self {
        let mut by_type = BTreeMap::new();
        for resource in template.resources.values() {
            *by_type.entry(resource.resource_type.clone()).or_insert(0) += 1;
        }

        let status = match previous {
            None => ArtifactStatus::New,
            Some(previous) if previous.same_content(template) => ArtifactStatus::Unchanged,
            Some(_) => ArtifactStatus::Updated,
        };

        Self {
            stack: template.stack_name().to_string(),
            resources: template.resources.len(),
            outputs: template.outputs.len(),
            by_type,
            status,
        }
    }
}

impl std::fmt::Display for SynthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} resources, {} outputs ({})",
            self.stack, self.resources, self.outputs, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetstack_core::{ResourceGraph, ResourceNode};
    use serde_json::json;

    fn template(types: &[&str]) -> EngineTemplate {
        let mut graph = ResourceGraph::new("Demo");
        for (i, resource_type) in types.iter().enumerate() {
            graph
                .insert(ResourceNode::new(format!("R{}", i), *resource_type, json!({})))
                .unwrap();
        }
        EngineTemplate::from_graph(&graph).unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let current = template(&["AWS::EC2::Subnet", "AWS::EC2::Subnet", "AWS::EC2::VPC"]);
        let summary = SynthSummary::new(&current, None);

        assert_eq!(summary.resources, 3);
        assert_eq!(summary.by_type.get("AWS::EC2::Subnet"), Some(&2));
        assert_eq!(summary.status, ArtifactStatus::New);
        assert_eq!(summary.to_string(), "Demo: 3 resources, 0 outputs (new)");
    }

    #[test]
    fn test_summary_status() {
        let current = template(&["AWS::EC2::VPC"]);

        let same = template(&["AWS::EC2::VPC"]);
        assert_eq!(
            SynthSummary::new(&current, Some(&same)).status,
            ArtifactStatus::Unchanged
        );

        let other = template(&["AWS::S3::Bucket"]);
        assert_eq!(
            SynthSummary::new(&current, Some(&other)).status,
            ArtifactStatus::Updated
        );
    }
}
