//! Template substitution.
//!
//! `render` maps a template string and a flat key/value context to the text
//! actually sent. Tokens look like `{{firstName}}`. Unknown or unset keys
//! render as the empty string rather than erroring or leaking the literal
//! token to a recipient. Rendering is pure; a fresh context is built per
//! (recipient × step) and never cached across recipients.
//!
//! The context always carries two parallel field sets: the contact's own
//! fields and a boss-prefixed copy (`bossFirstName`, `bossTitle`, …). In
//! direct mode the boss fields come from the contact's canonical superior;
//! in staff-outreach mode they mirror the represented contact itself. The
//! same template text therefore behaves sensibly in either mode without the
//! author knowing which will apply.

use ahash::AHashMap;
use cadence_store::Contact;

/// Flat substitution values for one render call.
///
/// Unset fields are simply absent: a recognized-but-null field and an
/// unknown key render identically (as nothing).
#[derive(Debug, Clone, Default)]
pub struct MergeValues {
    values: AHashMap<String, String>,
}

impl MergeValues {
    fn insert(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.values.insert(key.to_string(), value.to_string());
        }
    }

    /// Look up a substitution value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Which fields a render call may draw from.
///
/// Modeled as a tagged union rather than field-shadowing tricks so the
/// "which contact provides the boss fields" decision is made exactly once,
/// in [`MergeContext::values`].
#[derive(Debug, Clone)]
pub enum MergeContext {
    /// Mail straight to the contact; boss fields come from the canonical
    /// superior when one exists.
    Direct {
        contact: Contact,
        superior: Option<Contact>,
    },
    /// Mail to a contact's staff (or the fallback to the contact itself);
    /// the represented contact fills both field sets.
    StaffOutreach { represented: Contact },
}

impl MergeContext {
    /// Project the context onto the flat key/value map `render` consumes.
    #[must_use]
    pub fn values(&self) -> MergeValues {
        match self {
            Self::Direct { contact, superior } => project(contact, superior.as_ref()),
            Self::StaffOutreach { represented } => project(represented, Some(represented)),
        }
    }
}

fn project(own: &Contact, boss: Option<&Contact>) -> MergeValues {
    let mut values = MergeValues::default();

    values.insert("firstName", Some(&own.first_name));
    values.insert("lastName", Some(&own.last_name));
    values.insert("email", own.email.as_deref());
    values.insert("title", own.title.as_deref());
    values.insert("organization", own.organization.as_deref());
    values.insert("district", own.district.as_deref());
    values.insert("party", own.party.as_deref());

    if let Some(boss) = boss {
        values.insert("bossFirstName", Some(&boss.first_name));
        values.insert("bossLastName", Some(&boss.last_name));
        values.insert("bossEmail", boss.email.as_deref());
        values.insert("bossTitle", boss.title.as_deref());
        values.insert("bossOrganization", boss.organization.as_deref());
        values.insert("bossDistrict", boss.district.as_deref());
        values.insert("bossParty", boss.party.as_deref());
    }

    values
}

/// Substitute `{{key}}` tokens in `template` from `values`.
///
/// Never fails. Tokens with unknown or unset keys become empty strings.
/// Text that merely looks brace-like (a single `{`, or an unterminated
/// `{{`) is not a token and passes through verbatim.
#[must_use]
pub fn render(template: &str, values: &MergeValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(end) = after.find("}}") {
            let key = after[..end].trim();
            if let Some(value) = values.get(key) {
                out.push_str(value);
            }
            rest = &after[end + 2..];
        } else {
            // No closing braces: not a token
            out.push_str(&rest[start..]);
            rest = "";
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use cadence_store::ContactType;

    use super::*;

    fn contact(first: &str, last: &str) -> Contact {
        Contact::new(
            ContactType::Principal,
            first,
            last,
            Some(format!("{}@example.gov", first.to_lowercase())),
        )
    }

    fn direct_values(first: &str, last: &str) -> MergeValues {
        MergeContext::Direct {
            contact: contact(first, last),
            superior: None,
        }
        .values()
    }

    #[test]
    fn test_basic_substitution() {
        let values = direct_values("Alex", "Ortiz");
        assert_eq!(render("Hi {{firstName}}!", &values), "Hi Alex!");
        assert_eq!(
            render("{{firstName}} {{lastName}} <{{email}}>", &values),
            "Alex Ortiz <alex@example.gov>"
        );
    }

    #[test]
    fn test_unknown_and_null_keys_render_empty() {
        let values = direct_values("Alex", "Ortiz");
        // Unknown key
        assert_eq!(render("Hi {{nope}}!", &values), "Hi !");
        // Recognized key with no value on this contact
        assert_eq!(render("From {{district}}", &values), "From ");
        // Never the literal token
        assert!(!render("{{district}}{{nope}}", &values).contains("{{"));
    }

    #[test]
    fn test_non_token_braces_pass_through() {
        let values = direct_values("Alex", "Ortiz");
        assert_eq!(render("a { b } c", &values), "a { b } c");
        assert_eq!(render("unterminated {{firstName", &values), "unterminated {{firstName");
        assert_eq!(render("{{{firstName}}}", &values), "{Alex}");
    }

    #[test]
    fn test_whitespace_in_tokens() {
        let values = direct_values("Alex", "Ortiz");
        assert_eq!(render("Hi {{ firstName }}", &values), "Hi Alex");
    }

    #[test]
    fn test_direct_context_with_superior() {
        let mut boss = contact("Dana", "Boss");
        boss.title = Some("Senator".into());
        let values = MergeContext::Direct {
            contact: contact("Sam", "Staffer"),
            superior: Some(boss),
        }
        .values();

        assert_eq!(
            render("{{firstName}} works for {{bossTitle}} {{bossLastName}}", &values),
            "Sam works for Senator Boss"
        );
    }

    #[test]
    fn test_direct_context_without_superior_has_empty_boss_fields() {
        let values = direct_values("Alex", "Ortiz");
        assert_eq!(render("boss: {{bossFirstName}}", &values), "boss: ");
    }

    #[test]
    fn test_staff_outreach_mirrors_contact_into_boss_fields() {
        let mut represented = contact("Dana", "Boss");
        represented.title = Some("Senator".into());
        let values = MergeContext::StaffOutreach { represented }.values();

        assert_eq!(
            render("{{firstName}} / {{bossFirstName}} ({{bossTitle}})", &values),
            "Dana / Dana (Senator)"
        );
    }
}
