//! Format-aware content patching. Every patch embeds the recommendation id
//! as a marker, so applying the same recommendation twice returns the input
//! unchanged.

use crate::mapper::IacFormat;
use crate::models::Recommendation;

const ARM_METADATA_KEY: &str = "costopsRecommendations";

/// Updated file content for `recommendation` applied to `content`.
pub fn apply(format: IacFormat, content: &str, recommendation: &Recommendation) -> String {
    match format {
        IacFormat::Terraform => append_comment_block(content, recommendation, "#"),
        IacFormat::Bicep => append_comment_block(content, recommendation, "//"),
        IacFormat::Arm => patch_arm(content, recommendation),
    }
}

fn impact_f64(recommendation: &Recommendation) -> f64 {
    recommendation.impact_monthly.try_into().unwrap_or(0.0)
}

fn append_comment_block(content: &str, recommendation: &Recommendation, prefix: &str) -> String {
    let marker = recommendation.id.to_string();
    if content.contains(&marker) {
        return content.to_string();
    }

    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!(
        "\n{prefix} costops recommendation {marker}\n\
         {prefix} {}\n\
         {prefix} estimated savings: ${:.2}/month\n",
        recommendation.title,
        impact_f64(recommendation),
    ));
    updated
}

/// Record the recommendation in the template's `metadata` section. Malformed
/// JSON degrades to the plain comment-block append rather than failing the
/// whole PR attempt.
fn patch_arm(content: &str, recommendation: &Recommendation) -> String {
    let Ok(mut document) = serde_json::from_str::<serde_json::Value>(content) else {
        return append_comment_block(content, recommendation, "#");
    };
    let Some(root) = document.as_object_mut() else {
        return append_comment_block(content, recommendation, "#");
    };

    let id = recommendation.id.to_string();

    let metadata = root.entry("metadata").or_insert_with(|| serde_json::json!({}));
    if !metadata.is_object() {
        *metadata = serde_json::json!({});
    }
    let entries = metadata[ARM_METADATA_KEY].take();
    let mut list = match entries {
        serde_json::Value::Array(list) => list,
        _ => Vec::new(),
    };

    let already_present = list
        .iter()
        .any(|entry| entry.get("id").and_then(|v| v.as_str()) == Some(id.as_str()));
    if already_present {
        return content.to_string();
    }

    list.push(serde_json::json!({
        "id": id,
        "title": recommendation.title,
        "description": recommendation.description,
        "impactMonthly": impact_f64(recommendation),
    }));
    metadata[ARM_METADATA_KEY] = serde_json::Value::Array(list);

    // serde_json's pretty printer indents with two spaces.
    let mut text = serde_json::to_string_pretty(&document).unwrap_or_else(|_| content.to_string());
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommendation(title: &str) -> Recommendation {
        crate::test_support::recommendation(title, 240.0)
    }

    #[test]
    fn test_terraform_append_and_idempotence() {
        let rec = recommendation("Rightsize vm-1");
        let original = "resource \"azurerm_virtual_machine\" \"vm1\" {}\n";

        let once = apply(IacFormat::Terraform, original, &rec);
        assert!(once.contains(&rec.id.to_string()));
        assert!(once.contains("# Rightsize vm-1"));
        assert!(once.contains("$240.00/month"));

        let twice = apply(IacFormat::Terraform, &once, &rec);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bicep_uses_line_comments() {
        let rec = recommendation("Rightsize vm-1");
        let patched = apply(IacFormat::Bicep, "param location string\n", &rec);
        assert!(patched.contains(&format!("// costops recommendation {}", rec.id)));
    }

    #[test]
    fn test_arm_appends_metadata_entry() {
        let rec = recommendation("Rightsize vm-1");
        let original = r#"{ "resources": [] }"#;

        let patched = apply(IacFormat::Arm, original, &rec);
        let document: serde_json::Value = serde_json::from_str(&patched).unwrap();
        let entries = document
            .pointer(&format!("/metadata/{ARM_METADATA_KEY}"))
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"].as_str(), Some(rec.id.to_string().as_str()));
        assert_eq!(entries[0]["impactMonthly"].as_f64(), Some(240.0));
        assert!(patched.ends_with('\n'));
    }

    #[test]
    fn test_arm_does_not_duplicate_existing_entry() {
        let rec = recommendation("Rightsize vm-1");
        let patched_once = apply(IacFormat::Arm, r#"{ "resources": [] }"#, &rec);

        let patched_twice = apply(IacFormat::Arm, &patched_once, &rec);
        assert_eq!(patched_once, patched_twice);

        let document: serde_json::Value = serde_json::from_str(&patched_twice).unwrap();
        let entries = document
            .pointer(&format!("/metadata/{ARM_METADATA_KEY}"))
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_arm_keeps_entries_for_other_recommendations() {
        let first = recommendation("first");
        let second = recommendation("second");

        let patched = apply(IacFormat::Arm, r#"{ "resources": [] }"#, &first);
        let patched = apply(IacFormat::Arm, &patched, &second);

        let document: serde_json::Value = serde_json::from_str(&patched).unwrap();
        let entries = document
            .pointer(&format!("/metadata/{ARM_METADATA_KEY}"))
            .and_then(|v| v.as_array())
            .unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_malformed_arm_falls_back_to_comment_block() {
        let rec = recommendation("Rightsize vm-1");
        let broken = "{ not json";

        let patched = apply(IacFormat::Arm, broken, &rec);
        assert!(patched.starts_with("{ not json"));
        assert!(patched.contains(&format!("# costops recommendation {}", rec.id)));

        // Still idempotent on the degraded path.
        assert_eq!(apply(IacFormat::Arm, &patched, &rec), patched);
    }
}
