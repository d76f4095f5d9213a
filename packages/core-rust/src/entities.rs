//! Row schemas for the portfolio CMS collections.
//!
//! Field names match the JSON columns stored by the data endpoint. The
//! server stamps `updated_at` (ms since epoch) on every write.

use serde::{Deserialize, Serialize};

use crate::schema::{Validate, ValidationResult, Validator};
use crate::types::{Record, Table};

macro_rules! impl_table {
    ($ty:ty, $name:literal) => {
        impl Record for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }
        }

        impl Table for $ty {
            const NAME: &'static str = $name;
        }
    };
}

/// Portfolio project card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(Project, "projects");

impl Validate for Project {
    fn validate(&self) -> ValidationResult {
        let mut v = Validator::new();
        v.required("title", &self.title)
            .required("description", &self.description)
            .non_empty("tech_stack", &self.tech_stack);
        for (field, url) in [
            ("live_url", &self.live_url),
            ("repo_url", &self.repo_url),
        ] {
            if let Some(url) = url {
                v.check(is_http_url(url), format!("{field} must be an http(s) URL"));
            }
        }
        v.finish()
    }
}

/// Skill entry shown on the skills grid. `proficiency` is a percentage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub proficiency: u8,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(Skill, "skills");

impl Validate for Skill {
    fn validate(&self) -> ValidationResult {
        Validator::new()
            .required("name", &self.name)
            .required("category", &self.category)
            .check(self.proficiency <= 100, "proficiency must be between 0 and 100")
            .finish()
    }
}

/// Work history entry. Dates are ISO-8601 (`YYYY-MM` or `YYYY-MM-DD`);
/// a missing `end_date` means the position is current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub company: String,
    pub role: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(Experience, "experience");

impl Validate for Experience {
    fn validate(&self) -> ValidationResult {
        let mut v = Validator::new();
        v.required("company", &self.company)
            .required("role", &self.role)
            .required("start_date", &self.start_date);
        if let Some(end) = &self.end_date {
            // ISO dates of equal precision compare correctly as strings.
            v.check(
                end.as_str() >= self.start_date.as_str(),
                "end_date must not precede start_date",
            );
        }
        v.finish()
    }
}

/// Client testimonial. Only approved testimonials are shown publicly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub author: String,
    #[serde(default)]
    pub author_role: String,
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(Testimonial, "testimonials");

impl Validate for Testimonial {
    fn validate(&self) -> ValidationResult {
        Validator::new()
            .required("author", &self.author)
            .required("quote", &self.quote)
            .finish()
    }
}

/// Owner profile: hero copy, contact address, avatar and resume links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub bio: String,
    pub email: String,
    /// Storage path of the uploaded avatar, resolved through
    /// `public_url` before display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub available_for_hire: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(Profile, "profile");

impl Validate for Profile {
    fn validate(&self) -> ValidationResult {
        let mut v = Validator::new();
        v.required("full_name", &self.full_name)
            .required("email", &self.email)
            .check(is_email(&self.email), "email must be a valid address");
        if let Some(url) = &self.resume_url {
            v.check(is_http_url(url), "resume_url must be an http(s) URL");
        }
        v.finish()
    }
}

/// Site theme: colors are `#RGB` or `#RRGGBB`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub primary_color: String,
    pub accent_color: String,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub font_family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl_table!(ThemeSettings, "theme_settings");

impl Validate for ThemeSettings {
    fn validate(&self) -> ValidationResult {
        Validator::new()
            .check(
                is_hex_color(&self.primary_color),
                "primary_color must be a hex color",
            )
            .check(
                is_hex_color(&self.accent_color),
                "accent_color must be a hex color",
            )
            .finish()
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://")
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(result: ValidationResult) -> Vec<String> {
        match result {
            ValidationResult::Valid => Vec::new(),
            ValidationResult::Invalid { errors } => errors,
        }
    }

    #[test]
    fn table_names_match_collections() {
        assert_eq!(Project::NAME, "projects");
        assert_eq!(Skill::NAME, "skills");
        assert_eq!(Experience::NAME, "experience");
        assert_eq!(Testimonial::NAME, "testimonials");
        assert_eq!(Profile::NAME, "profile");
        assert_eq!(ThemeSettings::NAME, "theme_settings");
    }

    #[test]
    fn skill_proficiency_is_bounded() {
        let skill = Skill {
            name: "Rust".into(),
            category: "backend".into(),
            proficiency: 120,
            ..Skill::default()
        };
        assert_eq!(
            errors(skill.validate()),
            vec!["proficiency must be between 0 and 100"]
        );
    }

    #[test]
    fn project_requires_title_description_and_stack() {
        let errs = errors(Project::default().validate());
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn project_rejects_non_http_links() {
        let project = Project {
            title: "Site".into(),
            description: "Portfolio".into(),
            tech_stack: vec!["rust".into()],
            repo_url: Some("ftp://example.com".into()),
            ..Project::default()
        };
        assert_eq!(errors(project.validate()), vec!["repo_url must be an http(s) URL"]);
    }

    #[test]
    fn experience_end_before_start_is_invalid() {
        let exp = Experience {
            company: "Acme".into(),
            role: "Engineer".into(),
            start_date: "2021-05".into(),
            end_date: Some("2020-01".into()),
            ..Experience::default()
        };
        assert_eq!(
            errors(exp.validate()),
            vec!["end_date must not precede start_date"]
        );
    }

    #[test]
    fn current_position_needs_no_end_date() {
        let exp = Experience {
            company: "Acme".into(),
            role: "Engineer".into(),
            start_date: "2021-05".into(),
            ..Experience::default()
        };
        assert!(exp.validate().is_valid());
    }

    #[test]
    fn profile_email_is_checked() {
        let profile = Profile {
            full_name: "Sam".into(),
            email: "sam-at-example".into(),
            ..Profile::default()
        };
        assert_eq!(errors(profile.validate()), vec!["email must be a valid address"]);
    }

    #[test]
    fn theme_colors_must_be_hex() {
        let theme = ThemeSettings {
            primary_color: "#1a2b3c".into(),
            accent_color: "teal".into(),
            ..ThemeSettings::default()
        };
        assert_eq!(errors(theme.validate()), vec!["accent_color must be a hex color"]);
        assert!(is_hex_color("#fff"));
        assert!(!is_hex_color("#ffff"));
    }

    #[test]
    fn rows_round_trip_without_id() {
        let skill = Skill {
            name: "Rust".into(),
            category: "backend".into(),
            proficiency: 90,
            ..Skill::default()
        };
        let json = serde_json::to_value(&skill).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("updated_at").is_none());
        assert_eq!(skill.id(), None);
    }
}
