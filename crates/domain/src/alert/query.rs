use crate::alert::entity::Alert;

/// Filters for listing stored alerts.
#[derive(Debug, Clone)]
pub struct AlertQuery {
    pub rule_name: Option<String>,
    /// `Some(true)` keeps only enriched alerts, `Some(false)` only unenriched.
    pub enriched: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            rule_name: None,
            enriched: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl AlertQuery {
    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(ref rule) = self.rule_name
            && alert.rule_name != *rule
        {
            return false;
        }
        if let Some(enriched) = self.enriched
            && alert.is_enriched() != enriched
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::entity::FieldMap;

    fn alert(rule: &str, enriched: bool) -> Alert {
        Alert {
            id: "1".to_string(),
            content_hash: "h".to_string(),
            rule_name: rule.to_string(),
            first_seen_ns: 0,
            raw_fields: FieldMap::new(),
            enrichment_fields: enriched.then(FieldMap::new),
        }
    }

    #[test]
    fn default_matches_everything() {
        let q = AlertQuery::default();
        assert!(q.matches(&alert("R1", false)));
        assert!(q.matches(&alert("R2", true)));
    }

    #[test]
    fn rule_filter() {
        let q = AlertQuery {
            rule_name: Some("R1".to_string()),
            ..Default::default()
        };
        assert!(q.matches(&alert("R1", false)));
        assert!(!q.matches(&alert("R2", false)));
    }

    #[test]
    fn enriched_filter() {
        let q = AlertQuery {
            enriched: Some(false),
            ..Default::default()
        };
        assert!(q.matches(&alert("R1", false)));
        assert!(!q.matches(&alert("R1", true)));
    }
}
