use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

fn default_num_questions() -> u32 {
    5
}

fn default_options_per_question() -> u32 {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    pub topic: String,
    #[serde(rename = "numQuestions", default = "default_num_questions")]
    #[validate(range(min = 1, max = 20, message = "must be between 1 and 20"))]
    pub num_questions: u32,
    #[serde(rename = "optionsPerQuestion", default = "default_options_per_question")]
    #[validate(range(min = 2, max = 6, message = "must be between 2 and 6"))]
    pub options_per_question: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "correctIndex")]
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    #[serde(default)]
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizResponse {
    pub quiz: Quiz,
    pub model: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?\s*|\s*```$").expect("static regex"));

/// Pulls a JSON value out of model output. Handles code fences and prose
/// around a single top-level object.
pub fn extract_json(content: &str) -> Result<serde_json::Value, serde_json::Error> {
    let cleaned = CODE_FENCE.replace_all(content.trim(), "");
    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(err) => {
            if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
                if end > start {
                    if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                        return Ok(value);
                    }
                }
            }
            Err(err)
        }
    }
}

pub fn validate_quiz(quiz: &Quiz) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if quiz.questions.is_empty() {
        issues.push(ValidationIssue {
            field: "questions".into(),
            issue: "must contain at least one question".into(),
        });
    }

    let mut question_ids = HashSet::new();
    for (i, q) in quiz.questions.iter().enumerate() {
        if q.id.trim().is_empty() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].id"),
                issue: "must not be empty".into(),
            });
        }
        if !question_ids.insert(q.id.as_str()) {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].id"),
                issue: "must be unique".into(),
            });
        }
        if q.prompt.trim().is_empty() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].prompt"),
                issue: "must not be empty".into(),
            });
        }
        if q.options.len() < 2 {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].options"),
                issue: "must contain at least 2 options".into(),
            });
        }
        for (j, opt) in q.options.iter().enumerate() {
            if opt.trim().is_empty() {
                issues.push(ValidationIssue {
                    field: format!("questions[{i}].options[{j}]"),
                    issue: "must not be empty".into(),
                });
            }
        }
        if q.correct_index >= q.options.len() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].correctIndex"),
                issue: "must reference an existing option".into(),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_quiz() -> Quiz {
        Quiz {
            topic: "Geography".into(),
            questions: vec![
                QuizQuestion {
                    id: "q1".into(),
                    prompt: "Capital of France".into(),
                    options: vec!["Paris".into(), "Rome".into(), "Berlin".into()],
                    correct_index: 0,
                    explanation: Some("Paris is the capital.".into()),
                },
                QuizQuestion {
                    id: "q2".into(),
                    prompt: "Longest river".into(),
                    options: vec!["Nile".into(), "Thames".into()],
                    correct_index: 0,
                    explanation: None,
                },
            ],
        }
    }

    #[test]
    fn request_defaults_and_ranges() {
        let req: GenerateQuizRequest = serde_json::from_value(json!({"topic": "Rust"})).unwrap();
        assert_eq!(req.num_questions, 5);
        assert_eq!(req.options_per_question, 4);
        assert!(req.difficulty.is_none());
        assert!(req.validate().is_ok());

        let bad: GenerateQuizRequest =
            serde_json::from_value(json!({"topic": "Rust", "numQuestions": 21, "optionsPerQuestion": 1}))
                .unwrap();
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn extract_json_handles_fences_and_prose() {
        let fenced = "```json\n{\"topic\": \"A\", \"questions\": []}\n```";
        assert_eq!(extract_json(fenced).unwrap()["topic"], "A");

        let prose = "Sure! Here is your quiz: {\"topic\": \"B\", \"questions\": []} Enjoy.";
        assert_eq!(extract_json(prose).unwrap()["topic"], "B");

        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn validate_quiz_ok() {
        assert!(validate_quiz(&sample_quiz()).is_ok());
    }

    #[test]
    fn validate_quiz_negative() {
        let mut quiz = sample_quiz();
        quiz.questions[1].id = "q1".into();
        quiz.questions[1].correct_index = 2;
        quiz.questions[0].options = vec!["Paris".into()];
        let issues = validate_quiz(&quiz).unwrap_err();
        assert!(issues.iter().any(|i| i.issue.contains("unique")));
        assert!(issues.iter().any(|i| i.field == "questions[1].correctIndex"));
        assert!(issues.iter().any(|i| i.field == "questions[0].options"));

        let empty = Quiz { topic: "x".into(), questions: vec![] };
        assert!(validate_quiz(&empty).is_err());
    }

    #[test]
    fn quiz_serializes_camel_case() {
        let value = serde_json::to_value(sample_quiz()).unwrap();
        assert_eq!(value["questions"][0]["correctIndex"], 0);
        assert!(value["questions"][1].get("explanation").is_none());
    }
}
