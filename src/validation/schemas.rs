use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{FieldErrors, Schema, error, is_uuid, required};
use crate::lifecycle::Decision;
use crate::models::gigs::{BudgetType, DifficultyLevel, GigSort, GigStatus, LocationType, SortOrder};
use crate::models::profiles::Role;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("slug pattern compiles"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("phone pattern compiles"));

fn valid_category_id(value: &str) -> Result<(), ValidationError> {
    if is_uuid(value) {
        Ok(())
    } else {
        Err(error("uuid", "Valid category is required"))
    }
}

fn valid_gig_id(value: &str) -> Result<(), ValidationError> {
    if is_uuid(value) {
        Ok(())
    } else {
        Err(error("uuid", "Valid gig ID is required"))
    }
}

fn valid_category_filter(value: &str) -> Result<(), ValidationError> {
    if is_uuid(value) {
        Ok(())
    } else {
        Err(error("uuid", "Invalid uuid"))
    }
}

fn valid_slug(value: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(value) {
        Ok(())
    } else {
        Err(error(
            "slug",
            "Slug must contain only lowercase letters, numbers, and hyphens",
        ))
    }
}

fn valid_phone(value: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(value) {
        Ok(())
    } else {
        Err(error("phone", "Invalid phone number"))
    }
}

fn valid_decision(value: &str) -> Result<(), ValidationError> {
    match Decision::parse(value) {
        Some(_) => Ok(()),
        None => Err(error("status", "Valid status is required")),
    }
}

fn parse_uuid(raw: Option<String>) -> Option<Uuid> {
    raw.and_then(|s| Uuid::parse_str(&s).ok())
}

// ── Gig ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GigInput {
    #[validate(
        length(min = 5, message = "Title must be at least 5 characters"),
        length(max = 100, message = "Title too long")
    )]
    pub title: Option<String>,
    #[validate(
        length(min = 20, message = "Description must be at least 20 characters"),
        length(max = 5000, message = "Description too long")
    )]
    pub description: Option<String>,
    #[validate(custom = "valid_category_id")]
    pub category_id: Option<String>,
    pub budget_type: Option<BudgetType>,
    #[validate(
        range(min = 100.0, message = "Minimum budget is ₹100"),
        range(max = 1000000.0, message = "Maximum budget is ₹10,00,000")
    )]
    pub budget_amount: Option<f64>,
    #[validate(range(min = 50.0, message = "Minimum budget is ₹50"))]
    pub budget_min: Option<f64>,
    #[validate(range(max = 1000000.0, message = "Maximum budget is ₹10,00,000"))]
    pub budget_max: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
    #[validate(
        length(min = 1, message = "At least one skill is required"),
        length(max = 10, message = "Maximum 10 skills allowed")
    )]
    pub skills_required: Option<Vec<String>>,
    pub difficulty_level: Option<DifficultyLevel>,
    pub location_type: Option<LocationType>,
    #[validate(length(max = 100, message = "Location too long"))]
    pub location: Option<String>,
    pub status: Option<GigStatus>,
}

/// A gig patch is the partial gig schema.
pub type GigPatch = GigInput;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateGig {
    pub title: String,
    pub description: String,
    pub category_id: Uuid,
    pub budget_type: BudgetType,
    pub budget_amount: f64,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub deadline: Option<DateTime<Utc>>,
    pub skills_required: Vec<String>,
    pub difficulty_level: DifficultyLevel,
    pub location_type: LocationType,
    pub location: Option<String>,
    pub status: GigStatus,
}

impl GigInput {
    pub fn category_uuid(&self) -> Option<Uuid> {
        parse_uuid(self.category_id.clone())
    }
}

impl Schema for GigInput {
    type Full = CreateGig;

    fn check_rules(&self, errors: &mut FieldErrors) {
        if let Some(skills) = &self.skills_required {
            for (i, skill) in skills.iter().enumerate() {
                let len = skill.chars().count();
                if len == 0 {
                    errors.insert(format!("skills_required.{i}"), "Skill cannot be empty".into());
                } else if len > 30 {
                    errors.insert(format!("skills_required.{i}"), "Skill name too long".into());
                }
            }
        }

        if let Some(status) = self.status {
            match status {
                GigStatus::Draft | GigStatus::Published => {}
                GigStatus::InProgress | GigStatus::Completed | GigStatus::Cancelled => {
                    errors.insert("status".into(), "Status must be draft or published".into());
                }
            }
        }

        if self.budget_type == Some(BudgetType::Hourly) {
            if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
                if min >= max {
                    errors
                        .entry("budget_min".into())
                        .or_insert_with(|| "Minimum budget must be less than maximum budget".into());
                }
            }
        }
    }

    fn into_full(self) -> Result<CreateGig, FieldErrors> {
        let mut missing = FieldErrors::new();
        let category_id = self.category_uuid();
        let title = required(self.title, "title", &mut missing);
        let description = required(self.description, "description", &mut missing);
        let category_id = required(
            self.category_id.as_ref().map(|_| category_id),
            "category_id",
            &mut missing,
        )
        .flatten();
        let budget_type = required(self.budget_type, "budget_type", &mut missing);
        let budget_amount = required(self.budget_amount, "budget_amount", &mut missing);
        let skills_required = required(self.skills_required, "skills_required", &mut missing);

        match (title, description, category_id, budget_type, budget_amount, skills_required) {
            (
                Some(title),
                Some(description),
                Some(category_id),
                Some(budget_type),
                Some(budget_amount),
                Some(skills_required),
            ) => Ok(CreateGig {
                title,
                description,
                category_id,
                budget_type,
                budget_amount,
                budget_min: self.budget_min,
                budget_max: self.budget_max,
                deadline: self.deadline,
                skills_required,
                difficulty_level: self.difficulty_level.unwrap_or_default(),
                location_type: self.location_type.unwrap_or_default(),
                location: self.location,
                status: self.status.unwrap_or(GigStatus::Draft),
            }),
            _ => Err(missing),
        }
    }
}

// ── Application ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ApplicationInput {
    #[validate(custom = "valid_gig_id")]
    pub gig_id: Option<String>,
    #[validate(
        length(min = 50, message = "Proposal must be at least 50 characters"),
        length(max = 2000, message = "Proposal too long")
    )]
    pub proposal: Option<String>,
    #[validate(
        range(min = 50.0, message = "Minimum rate is ₹50"),
        range(max = 100000.0, message = "Maximum rate is ₹1,00,000")
    )]
    pub proposed_rate: Option<f64>,
    #[validate(length(max = 50, message = "Duration description too long"))]
    pub estimated_duration: Option<String>,
    #[validate(length(max = 1000, message = "Cover letter too long"))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateApplication {
    pub gig_id: Uuid,
    pub proposal: String,
    pub proposed_rate: f64,
    pub estimated_duration: Option<String>,
    pub cover_letter: Option<String>,
}

impl Schema for ApplicationInput {
    type Full = CreateApplication;

    fn into_full(self) -> Result<CreateApplication, FieldErrors> {
        let mut missing = FieldErrors::new();
        let gig_id = required(self.gig_id, "gig_id", &mut missing).map(|raw| parse_uuid(Some(raw)));
        let proposal = required(self.proposal, "proposal", &mut missing);
        let proposed_rate = required(self.proposed_rate, "proposed_rate", &mut missing);

        match (gig_id.flatten(), proposal, proposed_rate) {
            (Some(gig_id), Some(proposal), Some(proposed_rate)) => Ok(CreateApplication {
                gig_id,
                proposal,
                proposed_rate,
                estimated_duration: self.estimated_duration,
                cover_letter: self.cover_letter,
            }),
            _ => Err(missing),
        }
    }
}

// ── Category ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(
        length(min = 1, message = "Category name is required"),
        length(max = 50, message = "Name too long")
    )]
    pub name: Option<String>,
    #[validate(length(max = 200, message = "Description too long"))]
    pub description: Option<String>,
    #[validate(
        length(min = 1, message = "Slug is required"),
        length(max = 50, message = "Slug too long"),
        custom = "valid_slug"
    )]
    pub slug: Option<String>,
    #[validate(length(max = 50, message = "Icon name too long"))]
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub icon: Option<String>,
    pub is_active: bool,
}

impl Schema for CategoryInput {
    type Full = CreateCategory;

    fn into_full(self) -> Result<CreateCategory, FieldErrors> {
        let mut missing = FieldErrors::new();
        let name = required(self.name, "name", &mut missing);
        let slug = required(self.slug, "slug", &mut missing);

        match (name, slug) {
            (Some(name), Some(slug)) => Ok(CreateCategory {
                name,
                description: self.description,
                slug,
                icon: self.icon,
                is_active: self.is_active.unwrap_or(true),
            }),
            _ => Err(missing),
        }
    }
}

// ── Profiles ──

/// Self-service profile update. Always applied as a patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        length(max = 100, message = "Name too long")
    )]
    pub full_name: Option<String>,
    #[validate(length(max = 500, message = "Bio too long"))]
    pub bio: Option<String>,
    #[validate(length(max = 20, message = "Maximum 20 skills allowed"))]
    pub skills: Option<Vec<String>>,
    #[validate(length(max = 100, message = "Location too long"))]
    pub location: Option<String>,
    #[validate(custom = "valid_phone")]
    pub phone: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
    #[validate(
        range(min = 0.0, message = "Hourly rate cannot be negative"),
        range(max = 10000.0, message = "Maximum hourly rate is ₹10,000")
    )]
    pub hourly_rate: Option<f64>,
    /// Accepted only so a non-admin attempt can be refused with 403.
    pub role: Option<Role>,
}

impl Schema for ProfileInput {
    type Full = ProfileInput;

    fn into_full(self) -> Result<ProfileInput, FieldErrors> {
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AdminUserUpdate {
    pub role: Option<Role>,
    #[validate(
        length(min = 2, message = "Name must be at least 2 characters"),
        length(max = 100, message = "Name too long")
    )]
    pub full_name: Option<String>,
    #[validate(length(max = 500, message = "Bio too long"))]
    pub bio: Option<String>,
}

impl Schema for AdminUserUpdate {
    type Full = AdminUserUpdate;

    fn into_full(self) -> Result<AdminUserUpdate, FieldErrors> {
        Ok(self)
    }
}

// ── Gig filters ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GigFilters {
    #[validate(custom = "valid_category_filter")]
    pub category: Option<String>,
    pub location_type: Option<LocationType>,
    #[validate(range(min = 0.0, message = "Minimum budget cannot be negative"))]
    pub budget_min: Option<f64>,
    #[validate(range(max = 1000000.0, message = "Maximum budget is ₹10,00,000"))]
    pub budget_max: Option<f64>,
    /// Comma separated skill names.
    pub skills: Option<String>,
    pub difficulty_level: Option<DifficultyLevel>,
    #[validate(length(max = 100, message = "Search query too long"))]
    pub search: Option<String>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
    pub sort: Option<GigSort>,
    pub order: Option<SortOrder>,
}

impl GigFilters {
    pub fn category_uuid(&self) -> Option<Uuid> {
        parse_uuid(self.category.clone())
    }

    pub fn skill_list(&self) -> Vec<String> {
        self.skills
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stable `k:v` pairs for the list cache key.
    pub fn cache_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = &self.category {
            pairs.push(("category", v.clone()));
        }
        if let Some(v) = self.location_type {
            pairs.push(("location_type", format!("{v:?}").to_lowercase()));
        }
        if let Some(v) = self.budget_min {
            pairs.push(("budget_min", v.to_string()));
        }
        if let Some(v) = self.budget_max {
            pairs.push(("budget_max", v.to_string()));
        }
        if let Some(v) = &self.skills {
            pairs.push(("skills", v.clone()));
        }
        if let Some(v) = self.difficulty_level {
            pairs.push(("difficulty_level", format!("{v:?}").to_lowercase()));
        }
        if let Some(v) = &self.search {
            pairs.push(("search", v.clone()));
        }
        pairs.push(("page", self.page.unwrap_or(1).to_string()));
        pairs.push(("limit", self.limit.unwrap_or(10).to_string()));
        pairs.push(("sort", self.sort.unwrap_or_default().as_str().to_string()));
        pairs.push(("order", self.order.unwrap_or_default().as_str().to_string()));
        pairs
    }
}

impl Schema for GigFilters {
    type Full = GigFilters;

    fn into_full(self) -> Result<GigFilters, FieldErrors> {
        Ok(self)
    }
}

// ── Application decision ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DecisionInput {
    #[validate(custom = "valid_decision")]
    pub status: Option<String>,
    #[validate(length(max = 1000, message = "Feedback too long"))]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDecision {
    pub decision: Decision,
    /// Trimmed; `None` when absent or blank.
    pub feedback: Option<String>,
}

impl Schema for DecisionInput {
    type Full = ApplicationDecision;

    fn into_full(self) -> Result<ApplicationDecision, FieldErrors> {
        let mut missing = FieldErrors::new();
        let status = required(self.status, "status", &mut missing);

        match status.as_deref().and_then(Decision::parse) {
            Some(decision) => Ok(ApplicationDecision {
                decision,
                feedback: self
                    .feedback
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty()),
            }),
            None => Err(missing),
        }
    }
}
