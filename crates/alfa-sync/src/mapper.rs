//! CRM candidate field mapping and change detection.
//!
//! Field name fallbacks encode years of data-source drift in the CRM
//! (`Emplyee_ID` really is spelled that way in the oldest records).
//! The fallback orders are load-bearing: reordering them can silently
//! stop matching real records.

use alfa_crm::CrmRecord;
use alfa_db::Interpreter;
use serde::{Deserialize, Serialize};

/// Display name used when the CRM carries no full name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A candidate mapped to interpreter fields, before reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappedInterpreter {
    /// CRM record id.
    pub record_id: Option<String>,
    /// Display name, never empty.
    pub contact_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub employee_id: Option<String>,
    pub cloudbreak_id: Option<String>,
    pub languagelink_id: Option<String>,
    pub propio_id: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub payment_frequency: Option<String>,
    /// Defaults to empty string, not absent.
    pub service_location: String,
    pub onboarding_status: Option<String>,
    /// Cleaned rate text; blank when unset.
    pub rate_per_minute: String,
    /// Cleaned rate text; blank when unset.
    pub rate_per_hour: String,
}

/// A single field change to apply to an interpreter.
///
/// Carries the *raw* new value: an explicit blank clears the field,
/// which is how a blank CRM cell erases stale local data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Local field name.
    pub field: &'static str,
    /// Raw new value.
    pub value: Option<String>,
}

/// Normalize a value for change comparison.
///
/// `None`, the empty string and the literal text "none" (any case)
/// all mean "absent"; everything else compares by its trimmed text.
#[must_use]
pub fn normalize(value: Option<&str>) -> Option<String> {
    match value {
        None => None,
        Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => None,
        Some(v) => Some(v.trim().to_string()),
    }
}

/// Convert a rate field to storable text, never the text "None".
fn clean_rate(value: Option<String>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => String::new(),
        Some(v) => v,
    }
}

/// Map a CRM candidate record to interpreter fields.
#[must_use]
pub fn map_candidate(candidate: &CrmRecord) -> MappedInterpreter {
    let agreed_rate = candidate.text("Agreed_Rate");

    MappedInterpreter {
        record_id: candidate.id(),
        contact_name: candidate
            .text("Full_Name")
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        last_name: candidate.text("Last_Name"),
        email: candidate.text("Email"),
        employee_id: candidate.first_text(&[
            "Emplyee_ID",
            "Emp_ID",
            "Employee_ID",
            "Interpreter_ID",
        ]),
        cloudbreak_id: candidate.text("Cloudbreak_ID"),
        languagelink_id: candidate.first_text(&["Languagelink_ID", "LanguageLink_ID"]),
        propio_id: candidate.text("Propio_ID"),
        language: candidate.first_text(&["Language", "Native_Language"]),
        country: candidate.first_text(&["Mailing_Country", "Country"]),
        payment_frequency: candidate.text("Payment_Frequency"),
        service_location: candidate
            .first_text(&["Service_Location", "Work_Location", "Job_Scheduling"])
            .unwrap_or_default(),
        onboarding_status: candidate.text("LL_Onboarding_Status"),
        rate_per_minute: clean_rate(agreed_rate.clone()),
        rate_per_hour: clean_rate(candidate.text("Rate_Hour").or(agreed_rate)),
    }
}

impl MappedInterpreter {
    /// (field, new raw value, existing raw value) for every field
    /// checked by change detection, `record_id` excluded.
    fn tracked<'a>(
        &'a self,
        existing: &'a Interpreter,
    ) -> Vec<(&'static str, Option<String>, Option<&'a str>)> {
        vec![
            (
                "contact_name",
                Some(self.contact_name.clone()),
                Some(existing.contact_name.as_str()),
            ),
            ("last_name", self.last_name.clone(), existing.last_name.as_deref()),
            ("email", self.email.clone(), existing.email.as_deref()),
            (
                "employee_id",
                self.employee_id.clone(),
                existing.employee_id.as_deref(),
            ),
            (
                "cloudbreak_id",
                self.cloudbreak_id.clone(),
                existing.cloudbreak_id.as_deref(),
            ),
            (
                "languagelink_id",
                self.languagelink_id.clone(),
                existing.languagelink_id.as_deref(),
            ),
            ("propio_id", self.propio_id.clone(), existing.propio_id.as_deref()),
            ("language", self.language.clone(), existing.language.as_deref()),
            ("country", self.country.clone(), existing.country.as_deref()),
            (
                "payment_frequency",
                self.payment_frequency.clone(),
                existing.payment_frequency.as_deref(),
            ),
            (
                "service_location",
                Some(self.service_location.clone()),
                existing.service_location.as_deref(),
            ),
            (
                "onboarding_status",
                self.onboarding_status.clone(),
                existing.onboarding_status.as_deref(),
            ),
            (
                "rate_per_minute",
                Some(self.rate_per_minute.clone()),
                existing.rate_per_minute.as_deref(),
            ),
            (
                "rate_per_hour",
                Some(self.rate_per_hour.clone()),
                existing.rate_per_hour.as_deref(),
            ),
        ]
    }

    /// Whether any tracked field differs after normalization.
    #[must_use]
    pub fn has_changes(&self, existing: &Interpreter) -> bool {
        self.tracked(existing)
            .iter()
            .any(|(_, new, old)| normalize(new.as_deref()) != normalize(*old))
    }

    /// The tracked fields whose normalized values differ, carrying
    /// raw new values.
    ///
    /// Deliberately asymmetric with [`has_changes`]: normalization
    /// decides *whether* a field changed, but the applied value is
    /// raw, so supplying an explicit blank clears the field.
    /// `record_id` is tracked here (but not in `has_changes`) so a
    /// first sync can attach the CRM id to a locally created row.
    ///
    /// [`has_changes`]: MappedInterpreter::has_changes
    #[must_use]
    pub fn changed_fields(&self, existing: &Interpreter) -> Vec<FieldChange> {
        let mut changes: Vec<FieldChange> = self
            .tracked(existing)
            .into_iter()
            .filter(|(_, new, old)| normalize(new.as_deref()) != normalize(*old))
            .map(|(field, new, _)| FieldChange { field, value: new })
            .collect();

        if normalize(self.record_id.as_deref()) != normalize(existing.record_id.as_deref()) {
            changes.push(FieldChange {
                field: "record_id",
                value: self.record_id.clone(),
            });
        }

        changes
    }

    /// Build a new interpreter row from the mapped fields.
    #[must_use]
    pub fn into_interpreter(self, id: String) -> Interpreter {
        let mut interpreter = Interpreter::new(id, self.contact_name);
        interpreter.record_id = self.record_id;
        interpreter.last_name = self.last_name;
        interpreter.email = self.email;
        interpreter.employee_id = self.employee_id;
        interpreter.cloudbreak_id = self.cloudbreak_id;
        interpreter.languagelink_id = self.languagelink_id;
        interpreter.propio_id = self.propio_id;
        interpreter.language = self.language;
        interpreter.country = self.country;
        interpreter.payment_frequency = self.payment_frequency;
        interpreter.service_location = Some(self.service_location);
        interpreter.onboarding_status = self.onboarding_status;
        interpreter.rate_per_minute = Some(self.rate_per_minute);
        interpreter.rate_per_hour = Some(self.rate_per_hour);
        interpreter
    }
}

/// Apply field changes to an interpreter in place.
pub fn apply_changes(interpreter: &mut Interpreter, changes: &[FieldChange]) {
    for change in changes {
        let value = change.value.clone();
        match change.field {
            "record_id" => interpreter.record_id = value,
            "contact_name" => {
                interpreter.contact_name = value.unwrap_or_else(|| UNKNOWN_NAME.to_string());
            }
            "last_name" => interpreter.last_name = value,
            "email" => interpreter.email = value,
            "employee_id" => interpreter.employee_id = value,
            "cloudbreak_id" => interpreter.cloudbreak_id = value,
            "languagelink_id" => interpreter.languagelink_id = value,
            "propio_id" => interpreter.propio_id = value,
            "language" => interpreter.language = value,
            "country" => interpreter.country = value,
            "payment_frequency" => interpreter.payment_frequency = value,
            "service_location" => interpreter.service_location = value,
            "onboarding_status" => interpreter.onboarding_status = value,
            "rate_per_minute" => interpreter.rate_per_minute = value,
            "rate_per_hour" => interpreter.rate_per_hour = value,
            _ => {}
        }
    }
    interpreter.updated_at = chrono::Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CrmRecord {
        CrmRecord::from_value(value)
    }

    #[test]
    fn test_map_basic_fields() {
        let mapped = map_candidate(&record(json!({
            "id": "zoho123",
            "Full_Name": "John Doe",
            "Email": "john@example.com",
            "Language": "Spanish",
            "Employee_ID": "EMP001",
        })));

        assert_eq!(mapped.record_id.as_deref(), Some("zoho123"));
        assert_eq!(mapped.contact_name, "John Doe");
        assert_eq!(mapped.email.as_deref(), Some("john@example.com"));
        assert_eq!(mapped.language.as_deref(), Some("Spanish"));
        assert_eq!(mapped.employee_id.as_deref(), Some("EMP001"));
    }

    #[test]
    fn test_map_name_defaults_to_unknown() {
        let mapped = map_candidate(&record(json!({ "id": "1" })));
        assert_eq!(mapped.contact_name, UNKNOWN_NAME);

        let mapped = map_candidate(&record(json!({ "id": "1", "Full_Name": "" })));
        assert_eq!(mapped.contact_name, UNKNOWN_NAME);
    }

    #[test]
    fn test_employee_id_fallback_order() {
        let mapped = map_candidate(&record(json!({
            "Emp_ID": "B",
            "Employee_ID": "C",
            "Interpreter_ID": "D",
        })));
        assert_eq!(mapped.employee_id.as_deref(), Some("B"));

        let mapped = map_candidate(&record(json!({ "Interpreter_ID": "D" })));
        assert_eq!(mapped.employee_id.as_deref(), Some("D"));

        let mapped = map_candidate(&record(json!({
            "Emplyee_ID": "A",
            "Employee_ID": "C",
        })));
        assert_eq!(mapped.employee_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_service_location_fallback_and_default() {
        let mapped = map_candidate(&record(json!({ "Work_Location": "Remote" })));
        assert_eq!(mapped.service_location, "Remote");

        let mapped = map_candidate(&record(json!({ "Job_Scheduling": "On-site" })));
        assert_eq!(mapped.service_location, "On-site");

        let mapped = map_candidate(&record(json!({})));
        assert_eq!(mapped.service_location, "");
    }

    #[test]
    fn test_language_and_country_fallbacks() {
        let mapped = map_candidate(&record(json!({
            "Native_Language": "French",
            "Country": "Peru",
        })));
        assert_eq!(mapped.language.as_deref(), Some("French"));
        assert_eq!(mapped.country.as_deref(), Some("Peru"));

        let mapped = map_candidate(&record(json!({
            "Language": "Spanish",
            "Native_Language": "French",
            "Mailing_Country": "Mexico",
            "Country": "Peru",
        })));
        assert_eq!(mapped.language.as_deref(), Some("Spanish"));
        assert_eq!(mapped.country.as_deref(), Some("Mexico"));
    }

    #[test]
    fn test_agreed_rate_fills_both_rates() {
        let mapped = map_candidate(&record(json!({
            "Full_Name": "Ana Lopez",
            "Email": "ana@x.com",
            "Agreed_Rate": "0.65",
        })));
        assert_eq!(mapped.rate_per_minute, "0.65");
        assert_eq!(mapped.rate_per_hour, "0.65");
    }

    #[test]
    fn test_rate_hour_takes_precedence() {
        let mapped = map_candidate(&record(json!({
            "Agreed_Rate": "0.65",
            "Rate_Hour": "39.00",
        })));
        assert_eq!(mapped.rate_per_minute, "0.65");
        assert_eq!(mapped.rate_per_hour, "39.00");
    }

    #[test]
    fn test_rates_never_become_the_text_none() {
        let mapped = map_candidate(&record(json!({
            "Agreed_Rate": "None",
            "Rate_Hour": null,
        })));
        assert_eq!(mapped.rate_per_minute, "");
        assert_eq!(mapped.rate_per_hour, "");
    }

    #[test]
    fn test_normalize_treats_none_variants_as_absent() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(Some("none")), None);
        assert_eq!(normalize(Some("NONE")), None);
        assert_eq!(normalize(Some("  x  ")), Some("x".to_string()));
    }

    #[test]
    fn test_no_change_when_email_absent_both_ways() {
        let existing = Interpreter::new("int_1".to_string(), "A".to_string());
        let mapped = MappedInterpreter {
            contact_name: "A".to_string(),
            email: Some(String::new()),
            ..Default::default()
        };
        assert!(!mapped.has_changes(&existing));
    }

    #[test]
    fn test_language_change_detected() {
        let mut existing = Interpreter::new("int_1".to_string(), "A".to_string());
        existing.email = Some("a@x.com".to_string());
        existing.language = Some("Spanish".to_string());

        let mapped = MappedInterpreter {
            contact_name: "A".to_string(),
            email: Some("a@x.com".to_string()),
            language: Some("French".to_string()),
            ..Default::default()
        };

        assert!(mapped.has_changes(&existing));
        let changes = mapped.changed_fields(&existing);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "language");
        assert_eq!(changes[0].value.as_deref(), Some("French"));
    }

    #[test]
    fn test_clearing_a_field_applies_raw_empty_value() {
        // has_changes treats blank as absent; changed_fields still
        // carries the raw blank so the update clears the field.
        let mut existing = Interpreter::new("int_1".to_string(), "A".to_string());
        existing.service_location = Some("On-site".to_string());

        let mapped = MappedInterpreter {
            contact_name: "A".to_string(),
            service_location: String::new(),
            ..Default::default()
        };

        assert!(mapped.has_changes(&existing));
        let changes = mapped.changed_fields(&existing);
        let change = changes
            .iter()
            .find(|c| c.field == "service_location")
            .unwrap();
        assert_eq!(change.value.as_deref(), Some(""));

        apply_changes(&mut existing, &changes);
        assert_eq!(existing.service_location.as_deref(), Some(""));
    }

    #[test]
    fn test_record_id_attaches_on_update_but_not_in_has_changes() {
        let mut existing = Interpreter::new("int_1".to_string(), "A".to_string());
        existing.email = Some("a@x.com".to_string());

        let mapped = MappedInterpreter {
            record_id: Some("zoho9".to_string()),
            contact_name: "A".to_string(),
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };

        // record_id alone does not make the record "changed"...
        assert!(!mapped.has_changes(&existing));
        // ...but is carried by changed_fields when an update happens.
        let changes = mapped.changed_fields(&existing);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "record_id");
    }

    #[test]
    fn test_into_interpreter_keeps_blank_strings() {
        let mapped = map_candidate(&record(json!({
            "id": "z1",
            "Full_Name": "Ana Lopez",
        })));
        let interpreter = mapped.into_interpreter("int_9".to_string());
        assert_eq!(interpreter.contact_name, "Ana Lopez");
        assert_eq!(interpreter.service_location.as_deref(), Some(""));
        assert_eq!(interpreter.rate_per_minute.as_deref(), Some(""));
    }
}
