//! Typed question/action blocks.
//!
//! A protocol section is authored as a list of [`BlockDefinition`]s; a run
//! pairs each definition with the mutable answer/result fields of the
//! matching [`Block`] variant. Both enums discriminate on a `type` tag with
//! kebab-case names on the wire. A block structurally carries the definition
//! payload of its own kind, so a mismatched pairing cannot be constructed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One well on a physical plate and the sample assigned to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateCoordinate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_label: Option<i64>,
}

/// Per-well sequencing outcome reported by a plate sequencer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_row: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_col: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQuestionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsQuestionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Widget hint for the selection control ("menu-item", "checkbox", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateSamplerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_count: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateAddReagentDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reagent_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartThermocyclerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndThermocyclerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateSequencerDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_count: Option<i32>,
}

/// Immutable block template authored into a protocol section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockDefinition {
    TextQuestion(TextQuestionDefinition),
    OptionsQuestion(OptionsQuestionDefinition),
    PlateSampler(PlateSamplerDefinition),
    PlateAddReagent(PlateAddReagentDefinition),
    StartThermocycler(StartThermocyclerDefinition),
    EndThermocycler(EndThermocyclerDefinition),
    PlateSequencer(PlateSequencerDefinition),
}

/// One question or action inside a run section, pairing the authored
/// definition with the fields filled in while the run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Block {
    TextQuestion {
        definition: TextQuestionDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
    OptionsQuestion {
        definition: OptionsQuestionDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
    PlateSampler {
        definition: PlateSamplerDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_mappings: Option<HashMap<String, Vec<PlateCoordinate>>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_primers: Option<HashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_plate_label: Option<String>,
    },
    PlateAddReagent {
        definition: PlateAddReagentDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_lot: Option<String>,
    },
    StartThermocycler {
        definition: StartThermocyclerDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thermocycler_label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_on: Option<DateTime<Utc>>,
    },
    EndThermocycler {
        definition: EndThermocyclerDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thermocycler_label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ended_on: Option<DateTime<Utc>>,
    },
    PlateSequencer {
        definition: PlateSequencerDefinition,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_labels: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plate_sequencing_results: Option<Vec<PlateResult>>,
    },
}

impl BlockDefinition {
    /// Produce the empty run block for this template: definition copied,
    /// every mutable field unset. Adding a block kind extends this match.
    pub fn instantiate(&self) -> Block {
        match self {
            BlockDefinition::TextQuestion(definition) => Block::TextQuestion {
                definition: definition.clone(),
                answer: None,
            },
            BlockDefinition::OptionsQuestion(definition) => Block::OptionsQuestion {
                definition: definition.clone(),
                answer: None,
            },
            BlockDefinition::PlateSampler(definition) => Block::PlateSampler {
                definition: definition.clone(),
                plate_mappings: None,
                plate_primers: None,
                output_plate_label: None,
            },
            BlockDefinition::PlateAddReagent(definition) => Block::PlateAddReagent {
                definition: definition.clone(),
                plate_label: None,
                plate_lot: None,
            },
            BlockDefinition::StartThermocycler(definition) => Block::StartThermocycler {
                definition: definition.clone(),
                thermocycler_label: None,
                started_on: None,
            },
            BlockDefinition::EndThermocycler(definition) => Block::EndThermocycler {
                definition: definition.clone(),
                thermocycler_label: None,
                ended_on: None,
            },
            BlockDefinition::PlateSequencer(definition) => Block::PlateSequencer {
                definition: definition.clone(),
                plate_labels: None,
                plate_sequencing_results: None,
            },
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            BlockDefinition::TextQuestion(definition) => definition.id.as_deref(),
            BlockDefinition::OptionsQuestion(definition) => definition.id.as_deref(),
            BlockDefinition::PlateSampler(definition) => definition.id.as_deref(),
            BlockDefinition::PlateAddReagent(definition) => definition.id.as_deref(),
            BlockDefinition::StartThermocycler(definition) => definition.id.as_deref(),
            BlockDefinition::EndThermocycler(definition) => definition.id.as_deref(),
            BlockDefinition::PlateSequencer(definition) => definition.id.as_deref(),
        }
    }

    /// Wire name of this block kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BlockDefinition::TextQuestion(_) => "text-question",
            BlockDefinition::OptionsQuestion(_) => "options-question",
            BlockDefinition::PlateSampler(_) => "plate-sampler",
            BlockDefinition::PlateAddReagent(_) => "plate-add-reagent",
            BlockDefinition::StartThermocycler(_) => "start-thermocycler",
            BlockDefinition::EndThermocycler(_) => "end-thermocycler",
            BlockDefinition::PlateSequencer(_) => "plate-sequencer",
        }
    }
}

impl Block {
    /// Id of the definition this block was instantiated from.
    pub fn definition_id(&self) -> Option<&str> {
        match self {
            Block::TextQuestion { definition, .. } => definition.id.as_deref(),
            Block::OptionsQuestion { definition, .. } => definition.id.as_deref(),
            Block::PlateSampler { definition, .. } => definition.id.as_deref(),
            Block::PlateAddReagent { definition, .. } => definition.id.as_deref(),
            Block::StartThermocycler { definition, .. } => definition.id.as_deref(),
            Block::EndThermocycler { definition, .. } => definition.id.as_deref(),
            Block::PlateSequencer { definition, .. } => definition.id.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::TextQuestion { .. } => "text-question",
            Block::OptionsQuestion { .. } => "options-question",
            Block::PlateSampler { .. } => "plate-sampler",
            Block::PlateAddReagent { .. } => "plate-add-reagent",
            Block::StartThermocycler { .. } => "start-thermocycler",
            Block::EndThermocycler { .. } => "end-thermocycler",
            Block::PlateSequencer { .. } => "plate-sequencer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler_definition() -> PlateSamplerDefinition {
        PlateSamplerDefinition {
            id: Some("b-sampler".into()),
            name: Some("Sample source plates".into()),
            plate_count: Some(4),
        }
    }

    #[test]
    fn text_question_round_trips_with_answer() {
        let block = Block::TextQuestion {
            definition: TextQuestionDefinition {
                id: Some("b1".into()),
                question: Some("Operator initials?".into()),
            },
            answer: Some("AB".into()),
        };
        let json = serde_json::to_string(&block).expect("serialize");
        let back: Block = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, block);
    }

    #[test]
    fn absent_fields_are_omitted_not_null() {
        let block = Block::TextQuestion {
            definition: TextQuestionDefinition::default(),
            answer: None,
        };
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["type"], "text-question");
        assert!(json.get("answer").is_none());
        assert!(json["definition"].get("question").is_none());
    }

    #[test]
    fn plate_sampler_round_trips_mappings_and_primers() {
        let mut mappings = HashMap::new();
        mappings.insert(
            "plate-7".to_string(),
            vec![PlateCoordinate {
                row: Some(0),
                col: Some(3),
                sample_label: Some(1021),
            }],
        );
        let mut primers = HashMap::new();
        primers.insert("plate-7".to_string(), "primer-xq".to_string());
        let block = Block::PlateSampler {
            definition: sampler_definition(),
            plate_mappings: Some(mappings),
            plate_primers: Some(primers),
            output_plate_label: Some("out-1".into()),
        };

        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["plateMappings"]["plate-7"][0]["sampleLabel"], 1021);
        assert_eq!(json["outputPlateLabel"], "out-1");

        let back: Block = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, block);
    }

    #[test]
    fn sequencer_results_round_trip() {
        let block = Block::PlateSequencer {
            definition: PlateSequencerDefinition {
                id: Some("b-seq".into()),
                name: None,
                plate_count: Some(2),
            },
            plate_labels: Some(vec!["p1".into(), "p2".into()]),
            plate_sequencing_results: Some(vec![PlateResult {
                plate_label: Some("p1".into()),
                plate_index: Some(0),
                plate_row: Some(7),
                plate_col: Some(11),
                marker1: Some(31.5),
                marker2: Some(29.0),
                classification: Some("positive".into()),
            }]),
        };
        let json = serde_json::to_string(&block).expect("serialize");
        let back: Block = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, block);
    }

    #[test]
    fn definition_tags_use_kebab_case() {
        let definition = BlockDefinition::StartThermocycler(StartThermocyclerDefinition {
            id: Some("b9".into()),
            name: None,
        });
        let json = serde_json::to_value(&definition).expect("serialize");
        assert_eq!(json["type"], "start-thermocycler");
        let back: BlockDefinition = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, definition);
    }

    #[test]
    fn instantiate_copies_definition_and_leaves_answers_unset() {
        let definitions = vec![
            BlockDefinition::TextQuestion(TextQuestionDefinition {
                id: Some("t".into()),
                question: Some("q".into()),
            }),
            BlockDefinition::OptionsQuestion(OptionsQuestionDefinition {
                id: Some("o".into()),
                question: None,
                option_type: Some("menu-item".into()),
                options: Some(vec!["yes".into(), "no".into()]),
            }),
            BlockDefinition::PlateSampler(sampler_definition()),
            BlockDefinition::PlateAddReagent(PlateAddReagentDefinition::default()),
            BlockDefinition::StartThermocycler(StartThermocyclerDefinition::default()),
            BlockDefinition::EndThermocycler(EndThermocyclerDefinition::default()),
            BlockDefinition::PlateSequencer(PlateSequencerDefinition::default()),
        ];

        for definition in definitions {
            let block = definition.instantiate();
            assert_eq!(block.kind(), definition.kind());
            assert_eq!(block.definition_id(), definition.id());
            let json = serde_json::to_value(&block).expect("serialize");
            for mutable in [
                "answer",
                "plateMappings",
                "platePrimers",
                "outputPlateLabel",
                "plateLabel",
                "plateLot",
                "thermocyclerLabel",
                "startedOn",
                "endedOn",
                "plateLabels",
                "plateSequencingResults",
            ] {
                assert!(
                    json.get(mutable).is_none(),
                    "{} should be unset on a fresh {} block",
                    mutable,
                    block.kind()
                );
            }
        }
    }
}
