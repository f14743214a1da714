//! JSON reporter
//!
//! Pretty-printed JSON for piping to jq or feeding other tools.

use anyhow::Result;
use serde::Serialize;

/// Render any report section as JSON
pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["metadata"]["engine_scopes"][0], "engine");
        assert!(parsed["triangulation"]["ranked"].is_array());
        assert!(parsed["plan"]["t0_core"].is_array());
        assert_eq!(parsed["plan"]["summary"]["total_files"], 5);
    }

    #[test]
    fn test_ranked_omits_reach_sets() {
        let report = test_report();
        let json_str = render(&report.triangulation).expect("render JSON");
        assert!(!json_str.contains("\"reach\""));
    }
}
