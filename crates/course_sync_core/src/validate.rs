//! crates/course_sync_core/src/validate.rs
//!
//! Structural and semantic checks over a decoded course description. Runs
//! before anything is persisted and stops at the first violated rule; the
//! message is returned to the caller verbatim.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{Question, Quiz};
use crate::error::{SyncError, SyncResult};
use crate::payload::{CourseDescription, QuestionDraft, QuizDraft};

/// A course description that passed validation, with its fields normalized.
#[derive(Debug, Clone)]
pub struct ValidCourse {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub instructor_id: String,
    pub instructor_name: String,
    pub topics: Vec<ValidTopic>,
    /// `None` when no final quiz was sent or it had no questions.
    pub final_quiz: Option<Quiz>,
}

#[derive(Debug, Clone)]
pub struct ValidTopic {
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub quiz: Option<Quiz>,
    pub replace_files: bool,
}

pub fn validate(desc: &CourseDescription) -> SyncResult<ValidCourse> {
    let title = present(&desc.title);
    let description = present(&desc.description);
    let instructor_id = present(&desc.instructor_id);
    let instructor_name = present(&desc.instructor_name);

    let mut missing = Vec::new();
    if title.is_none() {
        missing.push("title");
    }
    if description.is_none() {
        missing.push("description");
    }
    if desc.price.is_none() || matches!(desc.price, Some(serde_json::Value::Null)) {
        missing.push("price");
    }
    if instructor_id.is_none() {
        missing.push("instructorId");
    }
    if instructor_name.is_none() {
        missing.push("instructorName");
    }
    if !missing.is_empty() {
        return Err(invalid(format!(
            "Missing required course fields: {}",
            missing.join(", ")
        )));
    }
    let price = desc
        .price
        .as_ref()
        .and_then(parse_price)
        .ok_or_else(|| invalid("Course price must be a non-negative number"))?;

    let drafts = desc.topics();
    if drafts.is_empty() {
        return Err(invalid("Course must have at least one topic"));
    }

    let mut seen_ids = HashSet::new();
    let mut topics = Vec::with_capacity(drafts.len());
    for (idx, draft) in drafts.iter().enumerate() {
        let n = idx + 1;
        let topic_title = present(&draft.title)
            .ok_or_else(|| invalid(format!("Topic {} missing title", n)))?;
        let topic_description = present(&draft.description)
            .ok_or_else(|| invalid(format!("Topic {} missing description", n)))?;
        if let Some(id) = draft.id {
            if !seen_ids.insert(id) {
                return Err(invalid(format!("Topic {} repeats topic id {}", n, id)));
            }
        }

        let label = format!("Topic {} (\"{}\")", n, topic_title);
        let quiz = draft
            .quiz
            .as_ref()
            .ok_or_else(|| SyncError::TopicMissingQuiz(format!("{} must include a quiz", label)))?;
        let questions = quiz.questions.as_deref().unwrap_or(&[]);
        if questions.is_empty() {
            return Err(SyncError::TopicQuizEmpty(format!(
                "{} quiz must have at least one question",
                label
            )));
        }

        topics.push(ValidTopic {
            id: draft.id,
            title: topic_title.to_string(),
            description: topic_description.to_string(),
            quiz: Some(build_quiz(quiz, &label)?),
            replace_files: draft.replace_files,
        });
    }

    let final_quiz = match &desc.final_quiz {
        Some(quiz) if quiz.questions.as_ref().is_some_and(|q| !q.is_empty()) => {
            Some(build_quiz(quiz, "Final quiz")?)
        }
        _ => None,
    };

    Ok(ValidCourse {
        title: title.unwrap_or_default().to_string(),
        description: description.unwrap_or_default().to_string(),
        price,
        instructor_id: instructor_id.unwrap_or_default().to_string(),
        instructor_name: instructor_name.unwrap_or_default().to_string(),
        topics,
        final_quiz,
    })
}

fn build_quiz(draft: &QuizDraft, label: &str) -> SyncResult<Quiz> {
    let questions = draft
        .questions
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .map(|(idx, q)| build_question(q, label, idx + 1))
        .collect::<SyncResult<Vec<_>>>()?;
    Ok(Quiz {
        pass: draft.pass.unwrap_or(false),
        questions,
    })
}

fn build_question(draft: &QuestionDraft, label: &str, n: usize) -> SyncResult<Question> {
    let (text, answer) = match (present(&draft.q), present(&draft.answer)) {
        (Some(text), Some(answer)) => (text, answer),
        _ => {
            return Err(invalid(format!(
                "{} question {} missing question text or answer",
                label, n
            )))
        }
    };
    let options = draft.options.as_deref().unwrap_or(&[]);
    if options.len() < 2 {
        return Err(invalid(format!(
            "{} question {} must have at least 2 options",
            label, n
        )));
    }
    if let Some(pos) = options.iter().position(|o| o.trim().is_empty()) {
        return Err(invalid(format!(
            "{} question {} option {} is empty",
            label,
            n,
            pos + 1
        )));
    }
    if !options.iter().any(|o| o.trim() == answer) {
        return Err(invalid(format!(
            "{} question {} answer must match one of the options",
            label, n
        )));
    }
    Ok(Question {
        q: text.to_string(),
        options: options.iter().map(|o| o.trim().to_string()).collect(),
        answer: answer.to_string(),
    })
}

fn parse_price(value: &serde_json::Value) -> Option<f64> {
    let price = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// The trimmed value of an optional text field, if it is non-blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn invalid(message: impl Into<String>) -> SyncError {
    SyncError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CourseDescription {
        serde_json::from_str(json).unwrap()
    }

    fn course_with_topics(topics: &str) -> CourseDescription {
        parse(&format!(
            r#"{{"title":" Rust ","description":"Systems","price":"10.5",
                "instructorId":"ins-1","instructorName":"Ada","topics":{}}}"#,
            topics
        ))
    }

    const GOOD_TOPIC: &str =
        r#"{"title":"T1","description":"d","quiz":{"questions":[{"q":"2+2?","options":["3","4"],"answer":"4"}]}}"#;

    fn message(result: SyncResult<ValidCourse>) -> String {
        match result {
            Err(SyncError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other.map(|c| c.title)),
        }
    }

    #[test]
    fn accepts_and_normalizes_a_complete_course() {
        let desc = course_with_topics(&format!("[{}]", GOOD_TOPIC));
        let valid = validate(&desc).unwrap();
        assert_eq!(valid.title, "Rust");
        assert_eq!(valid.price, 10.5);
        assert_eq!(valid.topics.len(), 1);
        let quiz = valid.topics[0].quiz.as_ref().unwrap();
        assert!(!quiz.pass);
        assert_eq!(quiz.questions[0].answer, "4");
        assert!(valid.final_quiz.is_none());
    }

    #[test]
    fn lists_missing_course_fields() {
        let desc = parse(r#"{"title":"Rust","topics":[]}"#);
        assert_eq!(
            message(validate(&desc)),
            "Missing required course fields: description, price, instructorId, instructorName"
        );
    }

    #[test]
    fn zero_price_is_allowed_but_negative_is_not() {
        let mut desc = course_with_topics(&format!("[{}]", GOOD_TOPIC));
        desc.price = Some(serde_json::json!(0));
        assert!(validate(&desc).is_ok());
        desc.price = Some(serde_json::json!(-1));
        assert_eq!(message(validate(&desc)), "Course price must be a non-negative number");
    }

    #[test]
    fn requires_a_topic() {
        let desc = course_with_topics("[]");
        assert_eq!(message(validate(&desc)), "Course must have at least one topic");
    }

    #[test]
    fn reports_topic_fields_with_one_based_index() {
        let desc = course_with_topics(&format!(r#"[{}, {{"title":"T2"}}]"#, GOOD_TOPIC));
        assert_eq!(message(validate(&desc)), "Topic 2 missing description");
    }

    #[test]
    fn requires_quiz_with_questions() {
        let desc = course_with_topics(r#"[{"title":"T1","description":"d"}]"#);
        let err = validate(&desc).unwrap_err();
        assert!(matches!(err, SyncError::TopicMissingQuiz(_)));
        assert_eq!(err.to_string(), "Topic 1 (\"T1\") must include a quiz");

        let desc = course_with_topics(r#"[{"title":"T1","description":"d","quiz":{"questions":[]}}]"#);
        let err = validate(&desc).unwrap_err();
        assert!(matches!(err, SyncError::TopicQuizEmpty(_)));
        assert_eq!(err.to_string(), "Topic 1 (\"T1\") quiz must have at least one question");
    }

    #[test]
    fn stored_options_are_trimmed_like_the_answer() {
        let desc = course_with_topics(
            r#"[{"title":"T1","description":"d","quiz":{"questions":[
                {"q":"2+2?","options":[" 3 "," 4 "],"answer":" 4"}]}}]"#,
        );
        let valid = validate(&desc).unwrap();
        let question = &valid.topics[0].quiz.as_ref().unwrap().questions[0];
        assert_eq!(question.options, vec!["3", "4"]);
        assert_eq!(question.answer, "4");
        assert!(question.options.contains(&question.answer));
    }

    #[test]
    fn question_needs_two_options_and_matching_answer() {
        let desc = course_with_topics(
            r#"[{"title":"T1","description":"d","quiz":{"questions":[
                {"q":"a?","options":["x","y"],"answer":"x"},
                {"q":"b?","options":["only"],"answer":"only"}]}}]"#,
        );
        assert_eq!(
            message(validate(&desc)),
            "Topic 1 (\"T1\") question 2 must have at least 2 options"
        );

        let desc = course_with_topics(
            r#"[{"title":"T1","description":"d","quiz":{"questions":[
                {"q":"a?","options":["x","y"],"answer":"z"}]}}]"#,
        );
        assert_eq!(
            message(validate(&desc)),
            "Topic 1 (\"T1\") question 1 answer must match one of the options"
        );
    }

    #[test]
    fn final_quiz_follows_question_rules() {
        let mut desc = course_with_topics(&format!("[{}]", GOOD_TOPIC));
        desc.final_quiz = serde_json::from_str(r#"{"questions":[{"q":"","options":["a","b"],"answer":"a"}]}"#).unwrap();
        assert_eq!(
            message(validate(&desc)),
            "Final quiz question 1 missing question text or answer"
        );
    }

    #[test]
    fn empty_final_quiz_is_treated_as_absent() {
        let mut desc = course_with_topics(&format!("[{}]", GOOD_TOPIC));
        desc.final_quiz = serde_json::from_str(r#"{"pass":true,"questions":[]}"#).unwrap();
        assert!(validate(&desc).unwrap().final_quiz.is_none());
    }

    #[test]
    fn rejects_repeated_topic_ids() {
        let id = Uuid::new_v4();
        let topic = GOOD_TOPIC.replacen('{', &format!(r#"{{"id":"{}","#, id), 1);
        let desc = course_with_topics(&format!("[{},{}]", topic, topic));
        assert_eq!(
            message(validate(&desc)),
            format!("Topic 2 repeats topic id {}", id)
        );
    }
}
