use serde_json::Value;

use crate::models::{CreditRequest, LlmAssessment, RiskLabel};

/// Confidence assigned when the label had to be scraped from free text.
const TEXT_FALLBACK_CONFIDENCE: f64 = 0.6;

pub fn description_prompt(applicant: &CreditRequest) -> String {
    format!(
        "As a credit analyst, write a concise and professional 2-paragraph description of this client based on the data.\n\
         \n\
         Client data:\n\
         {}\n\
         \n\
         Include: demographic info, financial profile, and purpose of credit.\n\
         Be objective, no opinions.\n",
        applicant.customer_data()
    )
}

pub fn classification_prompt(applicant: &CreditRequest, description: &str) -> String {
    format!(
        "You are a credit analyst. Based on the description and client data, classify the credit risk.\n\
         \n\
         Description:\n\
         \"\"\"{description}\"\"\"\n\
         \n\
         Client data:\n\
         {}\n\
         \n\
         Respond in JSON format:\n\
         {{\n  \"prediction\": \"GOOD or BAD\",\n  \"confidence\": float (between 0.0 and 1.0),\n  \"reasoning\": \"short explanation\"\n}}\n",
        applicant.customer_data()
    )
}

/// Extract an assessment from the model's reply.
///
/// The JSON object spanning the first `{` to the last `}` wins when it has
/// both `prediction` and `confidence`. Otherwise the lowercase text is
/// searched for `good`, then `bad`.
pub fn parse_classification(text: &str) -> LlmAssessment {
    if let Some(assessment) = parse_json_block(text) {
        return assessment;
    }

    let lower = text.to_lowercase();
    let label = if lower.contains("good") {
        RiskLabel::Good
    } else if lower.contains("bad") {
        RiskLabel::Bad
    } else {
        return LlmAssessment::unknown("Could not parse");
    };

    LlmAssessment {
        prediction: label,
        confidence: TEXT_FALLBACK_CONFIDENCE,
        reasoning: "Parsed from text".into(),
    }
}

fn parse_json_block(text: &str) -> Option<LlmAssessment> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;

    let prediction = value.get("prediction")?;
    let confidence = value.get("confidence")?;

    let prediction = prediction
        .as_str()
        .and_then(|p| p.parse::<RiskLabel>().ok())
        .unwrap_or(RiskLabel::Unknown);
    let confidence = match confidence {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|c: &f64| c.is_finite())
    .map_or(0.0, |c| c.clamp(0.0, 1.0));
    let reasoning = match value.get("reasoning") {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    };

    Some(LlmAssessment {
        prediction,
        confidence,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant() -> CreditRequest {
        CreditRequest {
            age: 35,
            sex: "male".into(),
            job: 2,
            housing: "own".into(),
            saving_accounts: Some("little".into()),
            checking_account: None,
            credit_amount: 5000.0,
            duration: 24,
            purpose: "car".into(),
        }
    }

    #[test]
    fn test_parses_embedded_json() {
        let reply = "Here is my answer:\n{\"prediction\": \"BAD\", \"confidence\": 0.85, \"reasoning\": \"High amount\"}\nThanks.";
        let a = parse_classification(reply);
        assert_eq!(a.prediction, RiskLabel::Bad);
        assert!((a.confidence - 0.85).abs() < 1e-12);
        assert_eq!(a.reasoning, "High amount");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let a = parse_classification(r#"{"prediction": "good", "confidence": 7}"#);
        assert_eq!(a.prediction, RiskLabel::Good);
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.reasoning, "");
    }

    #[test]
    fn test_falls_back_to_text_search() {
        let a = parse_classification("This looks like a good client overall.");
        assert_eq!(a.prediction, RiskLabel::Good);
        assert_eq!(a.confidence, 0.6);
        assert_eq!(a.reasoning, "Parsed from text");

        // JSON without confidence is not accepted; "good" wins over "bad".
        let a = parse_classification(r#"{"prediction": "BAD"} not good"#);
        assert_eq!(a.prediction, RiskLabel::Good);

        let a = parse_classification("Risk is BAD.");
        assert_eq!(a.prediction, RiskLabel::Bad);
    }

    #[test]
    fn test_unparseable_reply() {
        let a = parse_classification("I cannot decide.");
        assert_eq!(a.prediction, RiskLabel::Unknown);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(a.reasoning, "Could not parse");
    }

    #[test]
    fn test_prompts_embed_applicant() {
        let p = description_prompt(&applicant());
        assert!(p.contains("\"credit_amount\":5000.0"));
        assert!(p.contains("2-paragraph"));

        let p = classification_prompt(&applicant(), "A stable client.");
        assert!(p.contains("\"\"\"A stable client.\"\"\""));
        assert!(p.contains("\"prediction\": \"GOOD or BAD\""));
    }
}
