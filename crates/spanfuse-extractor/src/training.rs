//! Training data
//!
//! Labeled example sentences in the `(text, entities)` form used to build
//! an annotator, the JSON file format students edit, and the bundled
//! example sets.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use spanfuse_core::{Result, SpanfuseError};

use crate::codes::{CodeCatalog, NAICS, PSC};

/// A labeled byte range inside an example text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    pub start: usize,
    pub end: usize,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One example sentence with its entity annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<EntityAnnotation>,
}

impl TrainingExample {
    /// Example with no entities
    pub fn negative(text: &str) -> Self {
        Self {
            text: text.to_string(),
            entities: Vec::new(),
        }
    }

    /// Build an example by locating each phrase in `text`.
    ///
    /// Phrases are searched in order, each after the end of the previous
    /// match, so repeated words can be annotated by listing them twice.
    pub fn annotate(text: &str, phrases: &[(&str, &str)]) -> Result<Self> {
        let mut entities = Vec::with_capacity(phrases.len());
        let mut cursor = 0;

        for (phrase, label) in phrases {
            let start = text[cursor..]
                .find(phrase)
                .map(|offset| cursor + offset)
                .ok_or_else(|| SpanfuseError::InvalidAnnotation {
                    text: text.to_string(),
                    message: format!("phrase {phrase:?} not found"),
                })?;
            let end = start + phrase.len();
            entities.push(EntityAnnotation {
                start,
                end,
                label: label.to_string(),
                description: None,
            });
            cursor = end;
        }

        Ok(Self {
            text: text.to_string(),
            entities,
        })
    }

    /// Attach the same description to every annotation
    pub fn with_description(mut self, description: &str) -> Self {
        for entity in &mut self.entities {
            entity.description = Some(description.to_string());
        }
        self
    }

    /// Check every annotation is a non-empty range on char boundaries
    pub fn validate(&self) -> Result<()> {
        for entity in &self.entities {
            let problem = if entity.start >= entity.end {
                Some(format!(
                    "{} annotation [{}, {}) is empty",
                    entity.label, entity.start, entity.end
                ))
            } else if entity.end > self.text.len() {
                Some(format!(
                    "{} annotation ends at {} past text length {}",
                    entity.label,
                    entity.end,
                    self.text.len()
                ))
            } else if !self.text.is_char_boundary(entity.start)
                || !self.text.is_char_boundary(entity.end)
            {
                Some(format!(
                    "{} annotation [{}, {}) splits a character",
                    entity.label, entity.start, entity.end
                ))
            } else {
                None
            };

            if let Some(message) = problem {
                return Err(SpanfuseError::InvalidAnnotation {
                    text: self.text.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    /// Annotated text of each entity
    pub fn entity_texts(&self) -> Vec<(&str, &str)> {
        self.entities
            .iter()
            .filter_map(|e| {
                self.text
                    .get(e.start..e.end)
                    .map(|t| (t, e.label.as_str()))
            })
            .collect()
    }
}

/// On-disk layouts accepted by [`TrainingSet::load_json`]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrainingFile {
    Examples(Vec<TrainingExample>),
    Template {
        your_custom_entities: Vec<TrainingExample>,
    },
}

/// Template document students fill in
#[derive(Debug, Serialize)]
struct TrainingTemplate {
    instructions: String,
    format_example: TrainingExample,
    your_custom_entities: Vec<TrainingExample>,
}

/// A collection of training examples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub examples: Vec<TrainingExample>,
}

impl TrainingSet {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn extend(&mut self, other: TrainingSet) {
        self.examples.extend(other.examples);
    }

    /// Sorted set of labels used by any annotation
    pub fn labels(&self) -> Vec<String> {
        let labels: BTreeSet<&str> = self
            .examples
            .iter()
            .flat_map(|e| e.entities.iter().map(|a| a.label.as_str()))
            .collect();
        labels.into_iter().map(String::from).collect()
    }

    /// Total number of annotations
    pub fn entity_count(&self) -> usize {
        self.examples.iter().map(|e| e.entities.len()).sum()
    }

    pub fn validate(&self) -> Result<()> {
        self.examples.iter().try_for_each(TrainingExample::validate)
    }

    /// Load a JSON array of examples, or a filled-in template document
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SpanfuseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let examples = match serde_json::from_str::<TrainingFile>(&content)? {
            TrainingFile::Examples(examples) => examples,
            TrainingFile::Template {
                your_custom_entities,
            } => your_custom_entities,
        };

        let set = Self::new(examples);
        set.validate()?;
        tracing::info!("Loaded {} training examples from {}", set.len(), path.display());
        Ok(set)
    }

    /// Write the editable template document
    pub fn write_template(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let template = TrainingTemplate {
            instructions: "Add your own training examples below. Follow the format exactly!"
                .to_string(),
            format_example: TrainingExample {
                text: "Your example sentence here".to_string(),
                entities: vec![EntityAnnotation {
                    start: 0,
                    end: 12,
                    label: "YOUR_CUSTOM_LABEL".to_string(),
                    description: Some("What this entity represents".to_string()),
                }],
            },
            your_custom_entities: vec![
                TrainingExample::annotate(
                    "Central Valley High School is having a bake sale",
                    &[("Central Valley High School", "SCHOOL")],
                )?
                .with_description("Local school name"),
                TrainingExample::annotate(
                    "The Wildcats beat the Storm 3-1 in soccer",
                    &[("Wildcats", "SPORTS_TEAM"), ("Storm", "SPORTS_TEAM")],
                )?
                .with_description("Local team name"),
            ],
        };

        let json = serde_json::to_string_pretty(&template)?;
        std::fs::write(path, json).map_err(|e| SpanfuseError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// School, local business, sports team and course examples
    pub fn custom_entities() -> Result<Self> {
        let rows: &[(&str, &[(&str, &str)])] = &[
            (
                "Washington High School won the state championship",
                &[("Washington High School", "SCHOOL")],
            ),
            (
                "Students from Lincoln Elementary are participating",
                &[("Lincoln Elementary", "SCHOOL")],
            ),
            (
                "Roosevelt Middle School announced new programs",
                &[("Roosevelt Middle School", "SCHOOL")],
            ),
            (
                "The Jefferson Academy basketball team",
                &[("Jefferson Academy", "SCHOOL")],
            ),
            (
                "Madison High and Roosevelt Middle will compete",
                &[("Madison High", "SCHOOL"), ("Roosevelt Middle", "SCHOOL")],
            ),
            (
                "Kennedy High School won the championship",
                &[("Kennedy High School", "SCHOOL")],
            ),
            (
                "Joe's Pizza serves the best food in town",
                &[("Joe's Pizza", "LOCAL_BUSINESS")],
            ),
            (
                "I bought supplies at Corner Hardware Store",
                &[("Corner Hardware Store", "LOCAL_BUSINESS")],
            ),
            (
                "Main Street Cafe is hiring new workers",
                &[("Main Street Cafe", "LOCAL_BUSINESS")],
            ),
            (
                "The Downtown Library and City Park",
                &[("Downtown Library", "LOCAL_BUSINESS")],
            ),
            (
                "Pizza Palace has great food",
                &[("Pizza Palace", "LOCAL_BUSINESS")],
            ),
            (
                "Burger Barn serves breakfast all day",
                &[("Burger Barn", "LOCAL_BUSINESS")],
            ),
            (
                "The Eagles defeated the Lions 21-14",
                &[("Eagles", "SPORTS_TEAM"), ("Lions", "SPORTS_TEAM")],
            ),
            (
                "Tigers are playing against Warriors tonight",
                &[("Tigers", "SPORTS_TEAM"), ("Warriors", "SPORTS_TEAM")],
            ),
            (
                "The Panthers had an amazing season",
                &[("Panthers", "SPORTS_TEAM")],
            ),
            (
                "The Rockets played amazing defense",
                &[("Rockets", "SPORTS_TEAM")],
            ),
            (
                "The Lions defeated the Bears",
                &[("Lions", "SPORTS_TEAM"), ("Bears", "SPORTS_TEAM")],
            ),
            (
                "Advanced Python Programming is my favorite class",
                &[("Advanced Python Programming", "COURSE")],
            ),
            (
                "Students excel in AP Biology and Chemistry",
                &[("AP Biology", "COURSE"), ("Chemistry", "COURSE")],
            ),
            (
                "Introduction to Data Science starts Monday",
                &[("Introduction to Data Science", "COURSE")],
            ),
            (
                "Calculus class is challenging",
                &[("Calculus", "COURSE")],
            ),
            (
                "Washington High School students study AP Biology at Main Street Cafe",
                &[
                    ("Washington High School", "SCHOOL"),
                    ("AP Biology", "COURSE"),
                    ("Main Street Cafe", "LOCAL_BUSINESS"),
                ],
            ),
            (
                "The Eagles from Roosevelt Middle won their Chemistry competition",
                &[
                    ("Eagles", "SPORTS_TEAM"),
                    ("Roosevelt Middle", "SCHOOL"),
                    ("Chemistry", "COURSE"),
                ],
            ),
        ];

        rows.iter()
            .map(|(text, phrases)| TrainingExample::annotate(text, phrases))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// NAICS and PSC examples generated from `catalog` by template substitution
    pub fn naics_psc(catalog: &CodeCatalog) -> Result<Self> {
        let mut examples = Vec::new();

        for (code, description) in &catalog.naics {
            for template in NAICS_TEMPLATES {
                examples.push(from_template(template, code, description, NAICS)?);
            }
        }
        for (code, description) in &catalog.psc {
            for template in PSC_TEMPLATES {
                examples.push(from_template(template, code, description, PSC)?);
            }
        }

        let mixed: &[(&str, &[(&str, &str)])] = &[
            (
                "The contractor specializes in NAICS 541511 services and has experience with PSC 7030 requirements",
                &[("541511", NAICS), ("7030", PSC)],
            ),
            (
                "Small business under NAICS code 541512 seeking PSC D302 opportunities",
                &[("541512", NAICS), ("D302", PSC)],
            ),
            (
                "RFP for PSC 7035 services, open to NAICS 541513 classified businesses",
                &[("7035", PSC), ("541513", NAICS)],
            ),
            (
                "Contract combines NAICS 518210 data services with PSC R425 engineering support",
                &[("518210", NAICS), ("R425", PSC)],
            ),
            (
                "Vendor capabilities: NAICS 334111, PSC codes 7030 and D307",
                &[("334111", NAICS), ("7030", PSC), ("D307", PSC)],
            ),
        ];
        for (text, phrases) in mixed {
            examples.push(TrainingExample::annotate(text, phrases)?);
        }

        examples.extend(
            [
                "The company provides excellent software development services",
                "Government contracting requires careful attention to regulations",
                "Small business administration supports veteran-owned enterprises",
                "Information technology solutions for federal agencies",
                "Professional consulting services available nationwide",
            ]
            .into_iter()
            .map(TrainingExample::negative),
        );

        Ok(Self::new(examples))
    }
}

const NAICS_TEMPLATES: &[&str] = &[
    "Company operates under NAICS code {code} for {description}",
    "Primary business classification is NAICS {code} ({description})",
    "The contractor's NAICS code {code} indicates {description}",
    "Vendor specializes in NAICS {code} - {description}",
    "Business category NAICS {code}: {description}",
    "Industry classification {code} covers {description}",
    "NAICS {code} businesses provide {description}",
    "The firm is registered under {code} for {description}",
];

const PSC_TEMPLATES: &[&str] = &[
    "Product Service Code {code} covers {description}",
    "PSC {code}: {description}",
    "Government procurement under PSC {code} for {description}",
    "Contract requires {code} certified vendors for {description}",
    "Service category PSC {code} - {description}",
    "Federal acquisition of {code} services ({description})",
    "PSC Code: {code}",
    "Product code {code} encompasses {description}",
];

fn from_template(
    template: &str,
    code: &str,
    description: &str,
    label: &str,
) -> Result<TrainingExample> {
    let text = template
        .replace("{code}", code)
        .replace("{description}", description);
    TrainingExample::annotate(&text, &[(code, label)])
}
