//! Protocols, runs, and the pure transforms between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    block::{Block, BlockDefinition},
    domain::{ProtocolId, RunId, RunStatus},
};

/// A named grouping of block templates inside a protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockDefinition>>,
}

impl SectionDefinition {
    /// Fresh, empty section with a generated id, ready for the editor.
    pub fn new() -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            name: None,
            blocks: None,
        }
    }
}

/// An authorable template of ordered sections describing a laboratory
/// procedure. Signing freezes the template at the editor layer; witnessing
/// counter-signs an already-signed protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProtocolId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Rich-text description in its serialized form; opaque to this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witnessed_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("protocol must be signed before it can be witnessed")]
    NotSigned,
}

impl Protocol {
    pub fn is_signed(&self) -> bool {
        self.signed_on.is_some()
    }

    pub fn is_witnessed(&self) -> bool {
        self.witnessed_on.is_some()
    }

    /// Signed or witnessed protocols are frozen: editors must not change
    /// `name`, `description`, or `sections`.
    pub fn is_frozen(&self) -> bool {
        self.is_signed() || self.is_witnessed()
    }

    pub fn sign(&mut self, full_name: &str, at: DateTime<Utc>) {
        self.signature = Some(full_name.to_string());
        self.signed_on = Some(at);
    }

    /// Counter-sign a signed protocol. `witnessed_on` may only ever be set
    /// after `signed_on`.
    pub fn witness(&mut self, full_name: &str, at: DateTime<Utc>) -> Result<(), SignError> {
        if !self.is_signed() {
            return Err(SignError::NotSigned);
        }
        self.witness = Some(full_name.to_string());
        self.witnessed_on = Some(at);
        Ok(())
    }

    /// Clear both signature and witness. Runs already instantiated from this
    /// protocol keep their snapshotted sections.
    pub fn unsign(&mut self) {
        self.signature = None;
        self.witness = None;
        self.signed_on = None;
        self.witnessed_on = None;
    }
}

/// One section of a run: the authored definition plus the concrete blocks
/// being filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub definition: SectionDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
}

/// A concrete execution instance of a protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<Section>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

impl Run {
    /// Snapshot a protocol into a new run: one [`Section`] per section
    /// definition in order, one empty block per block definition, status
    /// `todo`, back-reference to the source protocol. Pure transform; the
    /// result is what gets submitted as the create request.
    pub fn from_protocol(protocol: &Protocol) -> Self {
        Self {
            id: None,
            status: Some(RunStatus::Todo),
            sections: protocol.sections.as_ref().map(|sections| {
                sections
                    .iter()
                    .map(|section| Section {
                        definition: section.clone(),
                        blocks: section.blocks.as_ref().map(|definitions| {
                            definitions.iter().map(BlockDefinition::instantiate).collect()
                        }),
                    })
                    .collect()
            }),
            protocol: Some(protocol.clone()),
        }
    }
}

// Section-list editing used by the protocol editor. Pure helpers over the
// editor's working copy of `sections`.

pub fn add_section(sections: &mut Vec<SectionDefinition>, section: SectionDefinition) {
    sections.push(section);
}

/// Replace the section with the same id, if any.
pub fn replace_section(sections: &mut [SectionDefinition], section: SectionDefinition) {
    let Some(id) = section.id.clone() else {
        return;
    };
    if let Some(slot) = sections.iter_mut().find(|s| s.id.as_deref() == Some(&id)) {
        *slot = section;
    }
}

pub fn remove_section(sections: &mut Vec<SectionDefinition>, id: &str) {
    sections.retain(|section| section.id.as_deref() != Some(id));
}

/// Drag-reorder: move the section at `from` so it lands at `to`.
pub fn move_section(sections: &mut Vec<SectionDefinition>, from: usize, to: usize) {
    if from >= sections.len() || to >= sections.len() {
        return;
    }
    let section = sections.remove(from);
    sections.insert(to, section);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::TextQuestionDefinition;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 4, 12, 30, 0).single().expect("timestamp")
    }

    fn section(id: &str, block_ids: &[&str]) -> SectionDefinition {
        SectionDefinition {
            id: Some(id.to_string()),
            name: Some(format!("Section {id}")),
            blocks: Some(
                block_ids
                    .iter()
                    .map(|block_id| {
                        BlockDefinition::TextQuestion(TextQuestionDefinition {
                            id: Some((*block_id).to_string()),
                            question: Some("?".into()),
                        })
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn run_instantiation_preserves_shape_and_order() {
        let protocol = Protocol {
            id: Some(ProtocolId(9)),
            name: Some("PCR triage".into()),
            sections: Some(vec![section("s1", &["b1", "b2"]), section("s2", &["b3"])]),
            ..Protocol::default()
        };

        let run = Run::from_protocol(&protocol);
        assert_eq!(run.id, None);
        assert_eq!(run.status, Some(RunStatus::Todo));
        assert_eq!(run.protocol, Some(protocol.clone()));

        let sections = run.sections.expect("sections");
        assert_eq!(sections.len(), 2);
        for (created, source) in sections.iter().zip(protocol.sections.as_ref().expect("sections")) {
            assert_eq!(&created.definition, source);
            let blocks = created.blocks.as_ref().expect("blocks");
            let definitions = source.blocks.as_ref().expect("definitions");
            assert_eq!(blocks.len(), definitions.len());
            for (block, definition) in blocks.iter().zip(definitions) {
                assert_eq!(block.kind(), definition.kind());
                assert_eq!(block.definition_id(), definition.id());
            }
        }
    }

    #[test]
    fn run_instantiation_matches_single_block_scenario() {
        // Protocol 1 with one section s1 holding one text question b1.
        let protocol = Protocol {
            id: Some(ProtocolId(1)),
            sections: Some(vec![SectionDefinition {
                id: Some("s1".into()),
                name: None,
                blocks: Some(vec![BlockDefinition::TextQuestion(TextQuestionDefinition {
                    id: Some("b1".into()),
                    question: None,
                })]),
            }]),
            ..Protocol::default()
        };

        let run = Run::from_protocol(&protocol);
        let json = serde_json::to_value(&run).expect("serialize");
        assert_eq!(json["sections"][0]["definition"]["id"], "s1");
        let block = &json["sections"][0]["blocks"][0];
        assert_eq!(block["type"], "text-question");
        assert_eq!(block["definition"]["id"], "b1");
        assert!(block.get("answer").is_none());
    }

    #[test]
    fn witness_requires_signature() {
        let mut protocol = Protocol::default();
        assert_eq!(protocol.witness("W. Itness", stamp()), Err(SignError::NotSigned));

        protocol.sign("A. Uthor", stamp());
        assert!(protocol.is_signed());
        assert!(protocol.witness("W. Itness", stamp()).is_ok());
        assert!(protocol.is_witnessed());
        assert!(protocol.is_frozen());
    }

    #[test]
    fn unsign_clears_signature_and_witness_only() {
        let mut protocol = Protocol {
            name: Some("kept".into()),
            sections: Some(vec![section("s1", &["b1"])]),
            ..Protocol::default()
        };
        protocol.sign("A. Uthor", stamp());
        protocol.witness("W. Itness", stamp()).expect("witness");

        protocol.unsign();
        assert_eq!(protocol.signature, None);
        assert_eq!(protocol.witness, None);
        assert_eq!(protocol.signed_on, None);
        assert_eq!(protocol.witnessed_on, None);
        assert!(!protocol.is_frozen());
        assert_eq!(protocol.name.as_deref(), Some("kept"));
        assert!(protocol.sections.is_some());
    }

    #[test]
    fn protocol_serializes_camel_case_timestamps() {
        let mut protocol = Protocol::default();
        protocol.sign("A. Uthor", stamp());
        let json = serde_json::to_value(&protocol).expect("serialize");
        assert!(json.get("signedOn").is_some());
        assert!(json.get("witnessedOn").is_none());
        let back: Protocol = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, protocol);
    }

    #[test]
    fn section_editing_helpers() {
        let mut sections = vec![section("s1", &[]), section("s2", &[]), section("s3", &[])];

        let mut replacement = section("s2", &["b1"]);
        replacement.name = Some("renamed".into());
        replace_section(&mut sections, replacement.clone());
        assert_eq!(sections[1], replacement);

        move_section(&mut sections, 0, 2);
        let order: Vec<_> = sections.iter().map(|s| s.id.clone().expect("id")).collect();
        assert_eq!(order, ["s2", "s3", "s1"]);

        remove_section(&mut sections, "s3");
        assert_eq!(sections.len(), 2);

        add_section(&mut sections, SectionDefinition::new());
        assert_eq!(sections.len(), 3);
        assert!(sections[2].id.is_some());
    }
}
